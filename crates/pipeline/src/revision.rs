//! Bounded review/revise loop control.

use litessay_core::config::DEFAULT_MAX_REVISIONS;

/// What happens after a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    /// The reviewer approved the essay.
    Accept,
    /// Not approved, but the revision budget is spent; persist anyway.
    ForceAccept,
    /// Not approved; revise and review again.
    Revise,
}

impl ReviewDecision {
    pub fn proceeds_to_persist(self) -> bool {
        matches!(self, Self::Accept | Self::ForceAccept)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionController {
    max_revisions: u32,
}

impl Default for RevisionController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REVISIONS)
    }
}

impl RevisionController {
    pub fn new(max_revisions: u32) -> Self {
        Self { max_revisions }
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    /// `revision_count` is the number of revisions already applied.
    pub fn decide(&self, approved: bool, revision_count: u32) -> ReviewDecision {
        if approved {
            ReviewDecision::Accept
        } else if revision_count >= self.max_revisions {
            ReviewDecision::ForceAccept
        } else {
            ReviewDecision::Revise
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_always_accepts() {
        let controller = RevisionController::default();
        for count in 0..=3 {
            assert_eq!(controller.decide(true, count), ReviewDecision::Accept);
        }
    }

    #[test]
    fn rejection_revises_until_budget_is_spent() {
        let controller = RevisionController::default();
        assert_eq!(controller.decide(false, 0), ReviewDecision::Revise);
        assert_eq!(controller.decide(false, 1), ReviewDecision::Revise);
        assert_eq!(controller.decide(false, 2), ReviewDecision::ForceAccept);
    }

    #[test]
    fn zero_budget_never_revises() {
        let controller = RevisionController::new(0);
        assert_eq!(controller.decide(false, 0), ReviewDecision::ForceAccept);
        assert!(controller.decide(false, 0).proceeds_to_persist());
    }
}
