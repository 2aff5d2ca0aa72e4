#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod directory;
pub mod entities;
pub mod events;
pub mod framework;
pub mod ledger;
pub mod processors;
pub mod state_machine;
pub mod store;
#[cfg(test)]
mod testing;
pub mod utils;
