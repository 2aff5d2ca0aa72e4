//! Transition table.
//!
//! Every action lists every status explicitly, so adding a status fails to
//! compile until its behaviour for each action is decided.

use crate::entities::DealStatus;
use std::fmt;

/// Status-changing operations on a deal.
///
/// Creation and disputes are not listed: creation has no source status and
/// a dispute never moves the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DealAction {
    Accept,
    SubmitDraft,
    ApproveDraft,
    RequestRevision,
    Reject,
    LockFunds,
    SchedulePost,
    Complete,
}

impl DealAction {
    pub const ALL: [DealAction; 8] = [
        DealAction::Accept,
        DealAction::SubmitDraft,
        DealAction::ApproveDraft,
        DealAction::RequestRevision,
        DealAction::Reject,
        DealAction::LockFunds,
        DealAction::SchedulePost,
        DealAction::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealAction::Accept => "accept_deal",
            DealAction::SubmitDraft => "submit_draft",
            DealAction::ApproveDraft => "approve_draft",
            DealAction::RequestRevision => "request_revision",
            DealAction::Reject => "reject_deal",
            DealAction::LockFunds => "lock_funds",
            DealAction::SchedulePost => "schedule_post",
            DealAction::Complete => "complete_deal",
        }
    }
}

impl fmt::Display for DealAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up the status `action` moves a deal in status `from` to.
///
/// `None` means the action is not allowed from `from`.
pub const fn next_status(from: DealStatus, action: DealAction) -> Option<DealStatus> {
    use DealAction as A;
    use DealStatus as S;

    match action {
        // Pre-paid deals launch immediately; everything else still needs payment.
        A::Accept => match from {
            S::Locked => Some(S::Scheduled),
            S::Created
            | S::Accepted
            | S::DraftSubmitted
            | S::RevisionRequested
            | S::AwaitingPayment
            | S::Scheduled
            | S::Published => Some(S::AwaitingPayment),
            S::Completed | S::Cancelled | S::Rejected => None,
        },
        A::SubmitDraft => match from {
            S::Accepted | S::RevisionRequested => Some(S::DraftSubmitted),
            S::Created
            | S::DraftSubmitted
            | S::AwaitingPayment
            | S::Locked
            | S::Scheduled
            | S::Published
            | S::Completed
            | S::Cancelled
            | S::Rejected => None,
        },
        A::ApproveDraft => match from {
            S::DraftSubmitted => Some(S::AwaitingPayment),
            S::Created
            | S::Accepted
            | S::RevisionRequested
            | S::AwaitingPayment
            | S::Locked
            | S::Scheduled
            | S::Published
            | S::Completed
            | S::Cancelled
            | S::Rejected => None,
        },
        A::RequestRevision => match from {
            S::Created
            | S::Accepted
            | S::DraftSubmitted
            | S::RevisionRequested
            | S::AwaitingPayment
            | S::Locked
            | S::Scheduled
            | S::Published
            | S::Completed
            | S::Cancelled
            | S::Rejected => Some(S::RevisionRequested),
        },
        A::Reject => match from {
            S::Created | S::Locked => Some(S::Rejected),
            S::Accepted
            | S::DraftSubmitted
            | S::RevisionRequested
            | S::AwaitingPayment
            | S::Scheduled
            | S::Published
            | S::Completed
            | S::Cancelled
            | S::Rejected => None,
        },
        // Post-paid deals are scheduled on payment; pre-paid ones wait for the owner.
        A::LockFunds => match from {
            S::AwaitingPayment => Some(S::Scheduled),
            S::Created => Some(S::Locked),
            S::Accepted
            | S::DraftSubmitted
            | S::RevisionRequested
            | S::Locked
            | S::Scheduled
            | S::Published
            | S::Completed
            | S::Cancelled
            | S::Rejected => None,
        },
        A::SchedulePost => match from {
            S::Locked => Some(S::Scheduled),
            S::Created
            | S::Accepted
            | S::DraftSubmitted
            | S::RevisionRequested
            | S::AwaitingPayment
            | S::Scheduled
            | S::Published
            | S::Completed
            | S::Cancelled
            | S::Rejected => None,
        },
        A::Complete => match from {
            S::Scheduled => Some(S::Completed),
            S::Created
            | S::Accepted
            | S::DraftSubmitted
            | S::RevisionRequested
            | S::AwaitingPayment
            | S::Locked
            | S::Published
            | S::Completed
            | S::Cancelled
            | S::Rejected => None,
        },
    }
}

// `accept` refuses exactly the terminal statuses. Checked at build time.
const _: () = {
    let mut i = 0;
    while i < DealStatus::ALL.len() {
        let status = DealStatus::ALL[i];
        assert!(next_status(status, DealAction::Accept).is_none() == status.is_terminal());
        i += 1;
    }
};
