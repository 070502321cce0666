//! Job status state machine.
//!
//! This module lives in `core` (zero internal deps) so both the repository
//! layer and the in-memory test store share one definition of the allowed
//! edges. `JobStatus::is_terminal` and `JobStatus::can_transition_to` in
//! `db` delegate here; the Postgres queries encode the same edges in their
//! `WHERE` clauses, and the in-memory store panics on any other move.
//! Status ids match the `job_statuses` seed data (1-based SMALLSERIAL) and
//! are duplicated from the `db` crate's `JobStatus` enum for that reason.

pub mod state_machine {
    /// Queued, waiting to be claimed.
    pub const QUEUED: i16 = 1;
    /// Claimed by exactly one worker.
    pub const RUNNING: i16 = 2;
    /// Terminal success.
    pub const SUCCEEDED: i16 = 3;
    /// Terminal failure.
    pub const FAILED: i16 = 4;

    /// Returns the set of valid target status IDs reachable from `from_status`.
    ///
    /// Terminal states return an empty slice. The running -> queued edge is
    /// only taken by an explicit operator requeue.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            QUEUED => &[RUNNING],
            RUNNING => &[SUCCEEDED, FAILED, QUEUED],
            SUCCEEDED | FAILED => &[],
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!("Invalid job status transition: {from} -> {to}"))
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(status: i16) -> bool {
        matches!(status, SUCCEEDED | FAILED)
    }
}

#[cfg(test)]
mod tests {
    use super::state_machine::*;

    #[test]
    fn queued_only_moves_to_running() {
        assert!(can_transition(QUEUED, RUNNING));
        assert!(!can_transition(QUEUED, SUCCEEDED));
        assert!(!can_transition(QUEUED, FAILED));
    }

    #[test]
    fn running_can_finish_or_be_requeued() {
        assert!(can_transition(RUNNING, SUCCEEDED));
        assert!(can_transition(RUNNING, FAILED));
        assert!(can_transition(RUNNING, QUEUED));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [SUCCEEDED, FAILED] {
            assert!(is_terminal(terminal));
            assert!(valid_transitions(terminal).is_empty());
            assert!(validate_transition(terminal, QUEUED).is_err());
        }
    }

    #[test]
    fn unknown_status_has_no_transitions() {
        assert!(valid_transitions(42).is_empty());
    }
}
