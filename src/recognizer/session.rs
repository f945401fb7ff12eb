use std::time::Instant;

use uuid::Uuid;

/// One successful start-to-end lifetime of the recognizer resource
///
/// Created on a start acknowledgement, closed on the terminal end, and
/// discarded (never reused) on restart. The cursor and dedupe fields keep
/// overlapping or duplicate result batches from re-triggering downstream
/// state changes.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique id, generated fresh for each acknowledged start
    pub session_id: String,

    /// When the start acknowledgement arrived
    pub started_at: Instant,

    /// When the terminal end arrived, if it has
    pub ended_at: Option<Instant>,

    /// Result-stream index one past the last final entry consumed; interim
    /// entries are never consumed, they update in place
    pub cursor: usize,

    /// Last forwarded interim text, for de-duplication
    pub last_interim: Option<String>,

    /// Last forwarded final text, for de-duplication
    pub last_final: Option<String>,
}

impl Session {
    /// Open a fresh session with a new id and reset cursor/dedupe fields
    pub fn open() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Instant::now(),
            ended_at: None,
            cursor: 0,
            last_interim: None,
            last_final: None,
        }
    }

    /// Mark the session closed
    pub fn close(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Instant::now());
        }
    }

    /// Whether the session has reached its terminal end
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_session() {
        let session = Session::open();
        assert!(!session.session_id.is_empty());
        assert_eq!(session.cursor, 0);
        assert!(session.last_interim.is_none());
        assert!(session.last_final.is_none());
        assert!(!session.is_closed());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::open();
        let b = Session::open();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = Session::open();
        session.close();
        let first = session.ended_at;
        session.close();
        assert_eq!(session.ended_at, first);
        assert!(session.is_closed());
    }
}
