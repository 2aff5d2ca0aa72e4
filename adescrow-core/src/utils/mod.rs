pub mod clock;
pub mod retry;
