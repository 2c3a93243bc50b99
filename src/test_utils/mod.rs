//! Helpers shared by unit tests, integration tests and the demo binary
pub mod fault;
pub mod replica;
