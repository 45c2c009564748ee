//! Business logic, expressed as free functions over the shared state.

/// Code submission flow and the progress cascade.
pub mod code_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Organizer event management and clock control.
pub mod event_service;
/// Health check service.
pub mod health_service;
/// Hint ledger: replay-safe reveals and coin accounting.
pub mod hint_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage reconnection loop driving degraded mode.
pub mod storage_supervisor;
/// Team membership: joining and session authentication.
pub mod team_service;
/// Authoritative clock reads and expiry.
pub mod timer_service;
