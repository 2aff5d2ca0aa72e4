//! Shared objects for the escrowed advertising deal engine.
//!
//! Nothing in this crate touches the database; it holds the wire-level
//! types handed to API consumers and wallet clients.

pub mod objects;
