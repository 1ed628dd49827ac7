//! Vigil Core - Behavioral analytics and alerting engine.
//!
//! Ingests a stream of canonical chat events and continuously answers two
//! questions: what happened (rolling 24h/30d usage statistics per user and
//! group) and whether to act (sensitive-content and low-activity alerting).
//! It handles:
//!
//! - Sensitive keyword storage and multi-pattern content matching
//! - Rolling-window aggregation per entity (totals, kinds, counterparts,
//!   daily buckets, last-active)
//! - Risk classification over a capped recent-message sample
//! - Threshold-triggered alerts with cooldown suppression
//! - Keyword frequency analysis over a group's recent corpus
//!
//! Transport, persistence, and notification delivery are collaborators
//! injected behind narrow traits ([`KeywordBackend`], [`EventHistory`],
//! [`WarningLedger`], [`AlertSink`], [`Tokenizer`], [`Clock`]).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil_core::{
//!     AnalyticsEngine, Clock, EngineConfig, RawMessage, SimpleTokenizer, SystemClock,
//! };
//! # fn collaborators() -> (
//! #     Arc<dyn vigil_core::KeywordBackend>,
//! #     Arc<dyn vigil_core::EventHistory>,
//! #     Arc<dyn vigil_core::WarningLedger>,
//! #     Arc<dyn vigil_core::AlertSink>,
//! # ) { unimplemented!() }
//!
//! let (keywords, history, warnings, sink) = collaborators();
//! let engine = AnalyticsEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(SystemClock),
//!     keywords,
//!     history,
//!     warnings,
//!     sink,
//!     Arc::new(SimpleTokenizer),
//! ).unwrap();
//!
//! let outcome = engine.ingest(RawMessage {
//!     user_id: Some(42),
//!     group_id: Some(1001),
//!     timestamp: Some(SystemClock.now()),
//!     kind: Some("text".to_string()),
//!     text: Some("hello".to_string()),
//! }).unwrap();
//! ```

pub mod alert;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod frequency;
pub mod keywords;
pub mod risk;
pub mod window;

pub use alert::{Alert, AlertEvaluator, AlertKind, AlertSeverity, AlertSink, AlertThresholds};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{AnalyticsEngine, EventHistory, IngestOutcome, WarningLedger};
pub use error::{EngineError, Result};
pub use event::{EntityKind, EntityRef, Event, MessageKind, RawMessage};
pub use frequency::{KeywordReport, SimpleTokenizer, TokenCount, Tokenizer, DEFAULT_TOP_N};
pub use keywords::{
    KeywordBackend, KeywordSnapshot, KeywordStore, MatchPolicy, SensitiveMatcher,
};
pub use risk::{RiskAssessment, RiskLevel};
pub use window::{Horizon, RiskSample, WindowAggregator, WindowStats};
