//! Shared library for cross-cutting concerns in grant-store services.
//!
//! This crate provides centralized implementations for:
//! - Bounded backend calls with deadlines and caller cancellation
//! - Tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod deadline;
pub mod tracing_config;

pub use deadline::{BoundError, OpContext, run_bounded};
pub use tracing_config::{TracingConfig, init_tracing};
