//! Shared protocol and domain types for the reshape conversion engine.

pub mod batch;
pub mod error;
pub mod limits;
pub mod row;
pub mod wire;
