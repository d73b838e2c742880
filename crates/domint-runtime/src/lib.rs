//! # domint-runtime
//!
//! The inter-domain interrupt protocol and the domain lifecycle built on
//! top of it.
//!
//! ## Modules
//!
//! - `interruptor` - Per-domain mailbox: send, poll, yield, join
//! - `domain` - Domain table, spawn/enter/rpc, interrupt-word glue
//! - `tls` - Thread-to-domain binding
//! - `config` - Runtime configuration
//! - `arch` - CPU pause hint for spin loops

#![allow(dead_code)]

pub mod arch;
pub mod config;
pub mod domain;
pub mod interruptor;
pub mod tls;

// Re-exports for convenience
pub use config::RuntimeConfig;
pub use domain::{
    by_id, current, enter, init, rpc, spawn, try_current, Domain, DomainHandle,
};
pub use interruptor::{InterruptHandler, InterruptRecord, Interruptor};
