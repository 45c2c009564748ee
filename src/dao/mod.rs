//! Persistence layer: entity definitions and the pluggable event store.

pub mod event_store;
pub mod models;
pub mod storage;
