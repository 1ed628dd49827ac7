//! Vigil Storage - SQLite persistence layer.
//!
//! This crate backs the engine's collaborator traits with SQLite. It
//! handles:
//!
//! - Durable message storage feeding window rebuilds and batch analysis
//! - The persistent sensitive-word collection
//! - Per-entity behavioral warning counters
//! - A durable alert sink
//!
//! One [`Database`] handle implements all four of the engine's boundary
//! traits ([`vigil_core::KeywordBackend`], [`vigil_core::EventHistory`],
//! [`vigil_core::WarningLedger`], [`vigil_core::AlertSink`]).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil_core::{AnalyticsEngine, EngineConfig, SimpleTokenizer, SystemClock};
//! use vigil_storage::Database;
//!
//! let db = Database::in_memory().unwrap();
//! let engine = AnalyticsEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(db.clone()),
//!     Arc::new(db.clone()),
//!     Arc::new(db.clone()),
//!     Arc::new(db),
//!     Arc::new(SimpleTokenizer),
//! ).unwrap();
//! ```

mod database;
pub mod error;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use models::{StoredAlert, WarningRecord};
pub use pool::ConnectionPool;
pub use repository::{AlertsRepo, KeywordsRepo, MessagesRepo, WarningsRepo};
