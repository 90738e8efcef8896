//! services/worker/src/lib.rs
//!
//! The worker service: port adapters, the queue substrate, the two
//! background pipelines, and the HTTP surface that feeds them.

pub mod adapters;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod web;
