//! Client core for the Friends Toss Book betting service.
//!
//! The [`TossClient`] owns the authenticated HTTP gateway and the
//! [`freshness::FreshnessController`] that keeps every mounted view up to
//! date, either on a timer or as soon as a mutation announces a change.

pub mod api;
pub mod bet_flow;
pub mod client;
pub mod config;
pub mod currency;
pub mod error;
pub mod freshness;
pub mod gateway;
pub mod reporter;
pub mod session;
pub mod types;
pub mod views;

pub use client::TossClient;
pub use error::ClientError;

/// Local development backend.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
