pub mod deal;
pub mod payment;
pub mod wallet;

pub use deal::{DealSnapshot, DealStatus};
pub use payment::{NANO_PER_TON, PaymentLink, to_nano};
pub use wallet::WalletScheme;
