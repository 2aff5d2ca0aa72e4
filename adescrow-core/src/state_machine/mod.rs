//! Deal lifecycle.
//!
//! [`transitions`] is the pure `(status, action) -> status` table;
//! [`DealStateMachine`] applies it to stored deal records. Status is only
//! ever assigned after a successful table lookup.

pub mod error;
pub mod machine;
pub mod transitions;

pub use error::DealError;
pub use machine::{DealStateMachine, Publication};
pub use transitions::{DealAction, next_status};
