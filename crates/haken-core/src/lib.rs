//! Core types and engine for the Haken contract lifecycle service.
//!
//! Haken manages dispatch contracts between a staffing agency and its client
//! sites: numbering, conflict-date compliance, the approval lifecycle, worker
//! assignments, an append-only audit trail and an outbox of notifications.
//!
//! This crate has no HTTP or database dependencies. Persistence sits behind
//! [`store::ContractStore`]; delivery sits behind [`notify::NotificationSink`].

// Native `async fn` in traits; the futures carry explicit `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod advisor;
pub mod assignment;
pub mod audit;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod contract;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod number;
pub mod sequencer;
pub mod site;
pub mod snapshot;
pub mod store;
pub mod worker;

pub use engine::{ContractEngine, SweepReport, TransitionResult};
pub use error::{Error, Result};
