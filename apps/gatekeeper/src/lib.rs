// [[GATEKEEPER]]/apps/gatekeeper/src/lib.rs
// Purpose: Request gatekeeping in front of the API: CSRF, rate limits, roles, ownership.
// Architecture: Library root
// Dependencies: see Cargo.toml

pub mod config;
pub mod csrf;
pub mod directory;
pub mod error;
pub mod gate;
pub mod models;
pub mod observability;
pub mod ownership;
pub mod principal;
pub mod rate_limit;
pub mod redis_store;
pub mod role_gate;
pub mod security;
pub mod server;
