//! Common types, configuration, and errors for sdswap
//!
//! This crate provides the foundational pieces shared by the checkpoint registry, the weight
//! cache, and the hot-swap orchestrator: the error taxonomy, the layered configuration, and the
//! device and precision types that flow between them.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
