pub mod deal;
pub mod directory;

use adescrow_sdk::objects::DealStatus as SdkDealStatus;

/// Deal status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `adescrow_sdk::objects::DealStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "deal_status")]
pub enum DealStatus {
    Created,
    Accepted,
    DraftSubmitted,
    RevisionRequested,
    AwaitingPayment,
    Locked,
    Scheduled,
    Published,
    Completed,
    Cancelled,
    Rejected,
}

impl DealStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [DealStatus; 11] = [
        DealStatus::Created,
        DealStatus::Accepted,
        DealStatus::DraftSubmitted,
        DealStatus::RevisionRequested,
        DealStatus::AwaitingPayment,
        DealStatus::Locked,
        DealStatus::Scheduled,
        DealStatus::Published,
        DealStatus::Completed,
        DealStatus::Cancelled,
        DealStatus::Rejected,
    ];

    /// Terminal statuses accept no further lifecycle movement from `accept`.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            DealStatus::Completed | DealStatus::Cancelled | DealStatus::Rejected
        )
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(SdkDealStatus::from(*self).as_str())
    }
}

impl From<DealStatus> for SdkDealStatus {
    fn from(value: DealStatus) -> Self {
        match value {
            DealStatus::Created => SdkDealStatus::Created,
            DealStatus::Accepted => SdkDealStatus::Accepted,
            DealStatus::DraftSubmitted => SdkDealStatus::DraftSubmitted,
            DealStatus::RevisionRequested => SdkDealStatus::RevisionRequested,
            DealStatus::AwaitingPayment => SdkDealStatus::AwaitingPayment,
            DealStatus::Locked => SdkDealStatus::Locked,
            DealStatus::Scheduled => SdkDealStatus::Scheduled,
            DealStatus::Published => SdkDealStatus::Published,
            DealStatus::Completed => SdkDealStatus::Completed,
            DealStatus::Cancelled => SdkDealStatus::Cancelled,
            DealStatus::Rejected => SdkDealStatus::Rejected,
        }
    }
}

impl From<SdkDealStatus> for DealStatus {
    fn from(value: SdkDealStatus) -> Self {
        match value {
            SdkDealStatus::Created => DealStatus::Created,
            SdkDealStatus::Accepted => DealStatus::Accepted,
            SdkDealStatus::DraftSubmitted => DealStatus::DraftSubmitted,
            SdkDealStatus::RevisionRequested => DealStatus::RevisionRequested,
            SdkDealStatus::AwaitingPayment => DealStatus::AwaitingPayment,
            SdkDealStatus::Locked => DealStatus::Locked,
            SdkDealStatus::Scheduled => DealStatus::Scheduled,
            SdkDealStatus::Published => DealStatus::Published,
            SdkDealStatus::Completed => DealStatus::Completed,
            SdkDealStatus::Cancelled => DealStatus::Cancelled,
            SdkDealStatus::Rejected => DealStatus::Rejected,
        }
    }
}
