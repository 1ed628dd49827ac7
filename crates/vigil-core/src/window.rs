//! Rolling-window aggregation per entity.
//!
//! Every tracked entity (user or group) gets a timestamp-ordered record of
//! its recent events, trimmed on write to the longest horizon (30 days).
//! Reads filter by horizon with an inclusive cutoff: an event exactly at
//! `now - horizon` is counted, one unit older is not.
//!
//! Events for different entities may be recorded in parallel; records for
//! the same entity are applied under that entity's own lock, so concurrent
//! increments are never lost and a snapshot never mixes a half-applied
//! write across fields.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::event::{EntityKind, EntityRef, Event, MessageKind};

/// A trailing time window over which aggregates are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    /// The last 24 hours (activity alerting).
    Day,
    /// The last 30 days (statistics and reporting).
    Month,
}

impl Horizon {
    /// Length of this horizon.
    pub fn duration(&self) -> Duration {
        match self {
            Horizon::Day => Duration::hours(24),
            Horizon::Month => Duration::days(30),
        }
    }

    /// Returns the horizon name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::Day => "day",
            Horizon::Month => "month",
        }
    }

    /// Parses a horizon from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "day" | "24h" => Some(Horizon::Day),
            "month" | "30d" => Some(Horizon::Month),
            _ => None,
        }
    }
}

/// Per-entity aggregate over one horizon.
///
/// Returned only when the entity has at least one event in the horizon;
/// "no data" is `None` at the query surface, never an empty struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Total messages in the horizon.
    pub total_messages: u64,
    /// Message counts by kind.
    pub by_kind: BTreeMap<MessageKind, u64>,
    /// Distinct counterpart entities: the groups a user posted in, or the
    /// users who posted in a group.
    pub active_counterparts: BTreeSet<i64>,
    /// Message counts per calendar date in the reporting timezone.
    pub daily: BTreeMap<NaiveDate, u64>,
    /// Timestamp of the most recent message in the horizon.
    pub last_active: DateTime<Utc>,
}

impl WindowStats {
    /// Number of distinct counterpart entities.
    pub fn distinct_counterparts(&self) -> u64 {
        self.active_counterparts.len() as u64
    }
}

/// Flagged/total counts over an entity's most recent messages, used only
/// for risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskSample {
    /// Messages sampled (at most the configured cap).
    pub sampled: u64,
    /// Sampled messages the matcher flagged.
    pub flagged: u64,
}

/// Compact per-event record kept for windowed reads.
#[derive(Debug, Clone, Copy)]
struct Record {
    timestamp: DateTime<Utc>,
    kind: MessageKind,
    counterpart: Option<i64>,
    flagged: bool,
}

#[derive(Debug, Default)]
struct EntityWindow {
    /// Ordered by timestamp, oldest first.
    records: VecDeque<Record>,
}

impl EntityWindow {
    /// Inserts in timestamp order; late arrivals are placed by timestamp
    /// value, not arrival order.
    fn insert(&mut self, record: Record) {
        let at = self
            .records
            .iter()
            .rposition(|r| r.timestamp <= record.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.records.insert(at, record);
    }

    fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        while let Some(front) = self.records.front() {
            if front.timestamp < cutoff {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Maintains rolling 24h/30d aggregates per entity.
pub struct WindowAggregator {
    entities: RwLock<HashMap<EntityRef, Arc<Mutex<EntityWindow>>>>,
    clock: Arc<dyn Clock>,
    reporting_offset: FixedOffset,
}

impl WindowAggregator {
    /// Creates an aggregator with the given clock and reporting timezone
    /// offset (seconds east of UTC) for daily buckets.
    pub fn new(clock: Arc<dyn Clock>, utc_offset_secs: i32) -> Self {
        let reporting_offset =
            FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());
        Self {
            entities: RwLock::new(HashMap::new()),
            clock,
            reporting_offset,
        }
    }

    fn window(&self, entity: EntityRef) -> Arc<Mutex<EntityWindow>> {
        if let Some(window) = self.entities.read().unwrap().get(&entity) {
            return Arc::clone(window);
        }
        let mut map = self.entities.write().unwrap();
        Arc::clone(map.entry(entity).or_default())
    }

    /// Records one event into both perspectives: the acting user's window
    /// (counterpart = group) and, when present, the group's window
    /// (counterpart = user).
    pub fn record(&self, event: &Event, flagged: bool) {
        self.record_one(event.user(), event, flagged);
        if let Some(group) = event.group() {
            self.record_one(group, event, flagged);
        }
    }

    /// Records an event into a single entity's window. Used by replay,
    /// where each entity's history is fetched separately.
    pub fn record_one(&self, entity: EntityRef, event: &Event, flagged: bool) {
        let counterpart = match entity.kind {
            EntityKind::User => event.group_id,
            EntityKind::Group => Some(event.user_id),
        };
        self.record_for(
            entity,
            Record {
                timestamp: event.timestamp,
                kind: event.kind,
                counterpart,
                flagged,
            },
        );
    }

    /// Drops all retained records for an entity (replay starts clean).
    pub fn clear(&self, entity: EntityRef) {
        if let Some(window) = self.entities.read().unwrap().get(&entity) {
            window.lock().unwrap().records.clear();
        }
    }

    fn record_for(&self, entity: EntityRef, record: Record) {
        let cutoff = self.clock.now() - Horizon::Month.duration();
        let window = self.window(entity);
        let mut guard = window.lock().unwrap();
        guard.insert(record);
        guard.evict_before(cutoff);
    }

    /// Returns the aggregate over the horizon, or `None` when the entity
    /// has no events in it.
    pub fn snapshot(&self, entity: EntityRef, horizon: Horizon) -> Option<WindowStats> {
        let window = {
            let map = self.entities.read().unwrap();
            Arc::clone(map.get(&entity)?)
        };
        let guard = window.lock().unwrap();

        let cutoff = self.clock.now() - horizon.duration();
        let mut stats: Option<WindowStats> = None;

        for record in guard.records.iter().filter(|r| r.timestamp >= cutoff) {
            let stats = stats.get_or_insert_with(|| WindowStats {
                total_messages: 0,
                by_kind: BTreeMap::new(),
                active_counterparts: BTreeSet::new(),
                daily: BTreeMap::new(),
                last_active: record.timestamp,
            });

            stats.total_messages += 1;
            *stats.by_kind.entry(record.kind).or_insert(0) += 1;
            if let Some(counterpart) = record.counterpart {
                stats.active_counterparts.insert(counterpart);
            }
            let date = record
                .timestamp
                .with_timezone(&self.reporting_offset)
                .date_naive();
            *stats.daily.entry(date).or_insert(0) += 1;
            if record.timestamp > stats.last_active {
                stats.last_active = record.timestamp;
            }
        }

        stats
    }

    /// Flagged/total counts over the entity's most recent `cap` records,
    /// or `None` when the entity has no records at all.
    pub fn risk_sample(&self, entity: EntityRef, cap: usize) -> Option<RiskSample> {
        let window = {
            let map = self.entities.read().unwrap();
            Arc::clone(map.get(&entity)?)
        };
        let guard = window.lock().unwrap();
        if guard.records.is_empty() {
            return None;
        }

        let mut sample = RiskSample {
            sampled: 0,
            flagged: 0,
        };
        for record in guard.records.iter().rev().take(cap) {
            sample.sampled += 1;
            if record.flagged {
                sample.flagged += 1;
            }
        }
        Some(sample)
    }

    /// Number of entities with any retained records.
    pub fn entity_count(&self) -> usize {
        self.entities.read().unwrap().len()
    }
}
