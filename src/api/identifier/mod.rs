/*
 * Responsibility
 * - /identifier/_ の JSON API (hello / logon / logoff / consent)
 * - wire format (dto) と orchestrator の橋渡し
 */
pub mod dto;
pub mod handlers;
mod routes;

pub use routes::routes;

/// Carries the request state back on 204 responses.
pub const STATE_HEADER: &str = "x-identifier-state";
