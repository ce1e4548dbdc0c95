//! Agent lifecycle state machine: `CREATED → INITIALIZING →
//! READY ↔ RUNNING → STOPPING → STOPPED`, with `ERROR` reachable from any
//! non-terminal state, `PAUSED` reachable from `RUNNING`/`READY` and
//! resuming to `READY`, and `DESTROYED` terminal.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Created,
    Initializing,
    Ready,
    Running,
    Paused,
    Stopping,
    Stopped,
    Error,
    Destroyed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Destroyed)
    }

    /// Only `READY` or `RUNNING` agents may accept tasks.
    pub fn accepts_tasks(self) -> bool {
        matches!(self, Status::Ready | Status::Running)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        if self.is_terminal() {
            return false;
        }
        if next == Error {
            return true;
        }
        match (self, next) {
            (Created, Initializing) => true,
            (Initializing, Ready) => true,
            (Ready, Running) => true,
            (Running, Ready) => true,
            (Running | Ready, Stopping) => true,
            (Stopping, Stopped) => true,
            (Running | Ready, Paused) => true,
            (Paused, Ready) => true,
            (_, Destroyed) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        assert!(Status::Created.can_transition_to(Status::Initializing));
        assert!(Status::Initializing.can_transition_to(Status::Ready));
        assert!(Status::Ready.can_transition_to(Status::Running));
        assert!(Status::Running.can_transition_to(Status::Ready));
        assert!(Status::Running.can_transition_to(Status::Stopping));
        assert!(Status::Stopping.can_transition_to(Status::Stopped));
    }

    #[test]
    fn error_reachable_from_any_non_terminal_state() {
        for status in [
            Status::Created,
            Status::Initializing,
            Status::Ready,
            Status::Running,
            Status::Paused,
            Status::Stopping,
            Status::Stopped,
        ] {
            assert!(status.can_transition_to(Status::Error), "{status:?} -> Error should be legal");
        }
        assert!(!Status::Destroyed.can_transition_to(Status::Error));
    }

    #[test]
    fn paused_only_from_running_or_ready_and_resumes_to_ready() {
        assert!(Status::Running.can_transition_to(Status::Paused));
        assert!(Status::Ready.can_transition_to(Status::Paused));
        assert!(!Status::Stopped.can_transition_to(Status::Paused));
        assert!(Status::Paused.can_transition_to(Status::Ready));
    }

    #[test]
    fn destroyed_is_terminal() {
        assert!(Status::Destroyed.is_terminal());
        assert!(!Status::Destroyed.can_transition_to(Status::Ready));
    }

    #[test]
    fn only_ready_or_running_accept_tasks() {
        assert!(Status::Ready.accepts_tasks());
        assert!(Status::Running.accepts_tasks());
        assert!(!Status::Paused.accepts_tasks());
        assert!(!Status::Stopped.accepts_tasks());
    }
}
