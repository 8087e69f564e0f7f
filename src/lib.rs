//! scorta — real-time warehouse inventory and pricing backend.
//!
//! `domain` holds the pure stock and pricing rules, `application` the
//! services and repository seams, `cache` the Redis-backed cache-aside and
//! pub/sub primitives, `realtime` the WebSocket connection manager, and
//! `infra` the Postgres, HTTP, and telemetry adapters.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod realtime;
