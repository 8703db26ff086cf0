//! Core logic for compose-testkit
//!
//! This crate provides:
//! - Deterministic project names per compose file, overrides and variation
//! - Environment bring-up and tear-down through a compose runner
//! - Published address resolution gated behind retryable health probes
//! - Host network alias discovery so containers can reach the host
//! - Log retrieval for individual services

mod environment;
mod error;
mod host_network;
mod identity;
mod probe;
mod resolver;
pub mod retry;
mod testkit;

pub use environment::*;
pub use error::*;
pub use host_network::*;
pub use identity::*;
pub use probe::*;
pub use resolver::*;
pub use testkit::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
