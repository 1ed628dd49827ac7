//! The analytics engine service.
//!
//! Wires the keyword store, matcher, aggregator, classifier, and alert
//! evaluator together behind injected collaborators (clock, persistence,
//! warning bookkeeping, alert sink, tokenizer). One engine instance serves
//! one logical event stream; nothing here is a process-global.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, warn};

use crate::alert::{Alert, AlertEvaluator, AlertKind, AlertSink};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::event::{EntityRef, Event, RawMessage};
use crate::frequency::{analyze_corpus, KeywordReport, Tokenizer, DEFAULT_TOP_N};
use crate::keywords::{KeywordBackend, KeywordSnapshot, KeywordStore, SensitiveMatcher};
use crate::risk::RiskAssessment;
use crate::window::{Horizon, WindowAggregator, WindowStats};

/// Historical event query, used to rebuild windows after a restart or to
/// serve batch analysis outside the hot path.
pub trait EventHistory: Send + Sync {
    /// Returns the entity's events at or after `cutoff`, oldest first.
    fn fetch_since(&self, entity: EntityRef, cutoff: DateTime<Utc>) -> Result<Vec<Event>>;
}

/// External bookkeeping of per-entity behavioral warnings.
///
/// The engine increments it once per message that matches a sensitive
/// keyword; the alert evaluator only reads the accumulated value.
pub trait WarningLedger: Send + Sync {
    /// Current warning count for an entity.
    fn warning_count(&self, entity: EntityRef) -> Result<u64>;

    /// Adds one warning and returns the new count.
    fn record_warning(&self, entity: EntityRef) -> Result<u64>;
}

/// What one ingested message produced.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The normalized event.
    pub event: Event,
    /// Sensitive keywords found in the message text.
    pub matched: Vec<String>,
    /// Alerts emitted for this event (after cooldown suppression; sink
    /// failures are logged, not reflected here).
    pub alerts: Vec<Alert>,
}

/// Behavioral analytics and alerting engine.
pub struct AnalyticsEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    keywords: KeywordStore,
    matcher: RwLock<SensitiveMatcher>,
    aggregator: WindowAggregator,
    evaluator: AlertEvaluator,
    history: Arc<dyn EventHistory>,
    warnings: Arc<dyn WarningLedger>,
    sink: Arc<dyn AlertSink>,
    tokenizer: Arc<dyn Tokenizer>,
    /// Last publish time per (entity, kind), for cooldown suppression.
    recent_alerts: Mutex<HashMap<(EntityRef, AlertKind), DateTime<Utc>>>,
}

impl AnalyticsEngine {
    /// Creates an engine, loading the keyword set from its backend.
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        keyword_backend: Arc<dyn KeywordBackend>,
        history: Arc<dyn EventHistory>,
        warnings: Arc<dyn WarningLedger>,
        sink: Arc<dyn AlertSink>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        let keywords = KeywordStore::load(keyword_backend)?;
        let matcher = SensitiveMatcher::build(&keywords.snapshot(), config.match_policy)?;
        let aggregator = WindowAggregator::new(Arc::clone(&clock), config.utc_offset_secs);
        let evaluator = AlertEvaluator::new(config.thresholds);

        Ok(Self {
            config,
            clock,
            keywords,
            matcher: RwLock::new(matcher),
            aggregator,
            evaluator,
            history,
            warnings,
            sink,
            tokenizer,
            recent_alerts: Mutex::new(HashMap::new()),
        })
    }

    /// Ingests one raw chat message: normalize, match, aggregate, then
    /// evaluate and publish alerts.
    ///
    /// Alert publishing is fire-and-forget; sink failures are logged and
    /// never fail ingestion. A malformed message is rejected before any
    /// state is touched.
    pub fn ingest(&self, raw: RawMessage) -> Result<IngestOutcome> {
        let event = Event::normalize(raw)?;
        let matched = self.matcher.read().unwrap().find(&event.text);
        let flagged = !matched.is_empty();

        self.aggregator.record(&event, flagged);

        let mut alerts = Vec::new();
        let now = self.clock.now();

        // Warning accumulation: one warning per message with a sensitive hit.
        if flagged {
            debug!(user_id = event.user_id, keywords = ?matched, "sensitive content matched");
            match self.warnings.record_warning(event.user()) {
                Ok(count) => {
                    if let Some(alert) = self.evaluator.check_behavior(event.user(), count, now) {
                        self.deliver(alert, &mut alerts);
                    }
                }
                // Bookkeeping is external; a failed increment must not
                // block ingestion.
                Err(e) => warn!(user_id = event.user_id, error = %e, "warning ledger update failed"),
            }
        }

        if let Some(group) = event.group() {
            let stats = self.aggregator.snapshot(group, Horizon::Day);
            if let Some(alert) = self.evaluator.check_activity(group, stats.as_ref(), now) {
                self.deliver(alert, &mut alerts);
            }
        }

        Ok(IngestOutcome {
            event,
            matched,
            alerts,
        })
    }

    /// Publishes an alert unless it is inside the cooldown window for its
    /// (entity, kind).
    fn deliver(&self, alert: Alert, out: &mut Vec<Alert>) {
        if !self.cooldown_allows(alert.entity, alert.kind, alert.timestamp) {
            return;
        }
        if let Err(e) = self.sink.publish(&alert) {
            error!(kind = alert.kind.as_str(), entity = %alert.entity, error = %e,
                "alert publish failed");
        }
        out.push(alert);
    }

    fn cooldown_allows(&self, entity: EntityRef, kind: AlertKind, now: DateTime<Utc>) -> bool {
        let cooldown = Duration::seconds(self.config.alert_cooldown_secs.max(0));
        let mut recent = self.recent_alerts.lock().unwrap();
        if let Some(last) = recent.get(&(entity, kind)) {
            if now - *last < cooldown {
                return false;
            }
        }
        recent.insert((entity, kind), now);
        true
    }

    /// Rolling aggregate for an entity over a horizon; `None` when it has
    /// no events in the horizon.
    pub fn entity_stats(&self, entity: EntityRef, horizon: Horizon) -> Option<WindowStats> {
        self.aggregator.snapshot(entity, horizon)
    }

    /// Risk assessment over the entity's most recent messages; `None` when
    /// the entity has no recorded messages.
    pub fn risk_assessment(&self, entity: EntityRef) -> Result<Option<RiskAssessment>> {
        match self
            .aggregator
            .risk_sample(entity, self.config.risk_sample_size)
        {
            Some(sample) => Ok(Some(RiskAssessment::from_sample(sample)?)),
            None => Ok(None),
        }
    }

    /// Top keywords in a group's text messages over a horizon; `None` when
    /// the corpus is empty.
    ///
    /// Batch path: reads from the historical store, not the hot windows.
    pub fn top_keywords(
        &self,
        group_id: i64,
        horizon: Horizon,
        top_n: Option<usize>,
    ) -> Result<Option<KeywordReport>> {
        let group = EntityRef::group(group_id);
        let cutoff = self.clock.now() - horizon.duration();
        let events = self.history.fetch_since(group, cutoff)?;

        let texts = events
            .iter()
            .filter(|e| e.has_text())
            .map(|e| e.text.as_str());
        Ok(analyze_corpus(
            texts,
            self.tokenizer.as_ref(),
            top_n.unwrap_or(DEFAULT_TOP_N),
        ))
    }

    /// Adds a sensitive keyword. Returns true if newly added.
    pub fn add_keyword(&self, word: &str) -> Result<bool> {
        let result = self.keywords.add(word);
        // The in-memory set may have changed even when persistence failed;
        // the matcher must track it either way.
        if !matches!(result, Ok(false)) {
            self.rebuild_matcher()?;
        }
        result
    }

    /// Removes a sensitive keyword. Returns true if it existed.
    pub fn remove_keyword(&self, word: &str) -> Result<bool> {
        let result = self.keywords.remove(word);
        if !matches!(result, Ok(false)) {
            self.rebuild_matcher()?;
        }
        result
    }

    /// Point-in-time view of the sensitive keyword set.
    pub fn keyword_snapshot(&self) -> KeywordSnapshot {
        self.keywords.snapshot()
    }

    fn rebuild_matcher(&self) -> Result<()> {
        let matcher = SensitiveMatcher::build(&self.keywords.snapshot(), self.config.match_policy)?;
        *self.matcher.write().unwrap() = matcher;
        Ok(())
    }

    /// Rebuilds an entity's windows from the historical store (restart
    /// recovery). Replaces any in-memory records for the entity; returns
    /// how many events were replayed.
    pub fn rebuild(&self, entity: EntityRef) -> Result<usize> {
        let cutoff = self.clock.now() - Horizon::Month.duration();
        let events = self.history.fetch_since(entity, cutoff)?;

        self.aggregator.clear(entity);
        let matcher = self.matcher.read().unwrap();
        for event in &events {
            let flagged = matcher.is_sensitive(&event.text);
            self.aggregator.record_one(entity, event, flagged);
        }
        debug!(entity = %entity, events = events.len(), "rebuilt entity windows");
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::EngineError;
    use crate::event::{EntityKind, MessageKind};
    use crate::frequency::SimpleTokenizer;
    use crate::risk::RiskLevel;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    struct MemoryKeywords(Mutex<BTreeSet<String>>);

    impl MemoryKeywords {
        fn new(words: &[&str]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                words.iter().map(|w| w.to_string()).collect(),
            )))
        }
    }

    impl KeywordBackend for MemoryKeywords {
        fn load_all(&self) -> Result<BTreeSet<String>> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn persist_add(&self, word: &str) -> Result<()> {
            self.0.lock().unwrap().insert(word.to_string());
            Ok(())
        }
        fn persist_remove(&self, word: &str) -> Result<()> {
            self.0.lock().unwrap().remove(word);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryHistory(Mutex<Vec<Event>>);

    impl EventHistory for MemoryHistory {
        fn fetch_since(&self, entity: EntityRef, cutoff: DateTime<Utc>) -> Result<Vec<Event>> {
            let mut events: Vec<Event> = self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|e| match entity.kind {
                    EntityKind::User => e.user_id == entity.id,
                    EntityKind::Group => e.group_id == Some(entity.id),
                })
                .filter(|e| e.timestamp >= cutoff)
                .cloned()
                .collect();
            events.sort_by_key(|e| e.timestamp);
            Ok(events)
        }
    }

    #[derive(Default)]
    struct MemoryLedger(Mutex<HashMap<EntityRef, u64>>);

    impl WarningLedger for MemoryLedger {
        fn warning_count(&self, entity: EntityRef) -> Result<u64> {
            Ok(*self.0.lock().unwrap().get(&entity).unwrap_or(&0))
        }
        fn record_warning(&self, entity: EntityRef) -> Result<u64> {
            let mut map = self.0.lock().unwrap();
            let count = map.entry(entity).or_insert(0);
            *count += 1;
            Ok(*count)
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        published: Mutex<Vec<Alert>>,
        fail: Mutex<bool>,
    }

    impl AlertSink for CollectingSink {
        fn publish(&self, alert: &Alert) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(EngineError::persistence(std::io::Error::other(
                    "sink down",
                )));
            }
            self.published.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct Harness {
        engine: AnalyticsEngine,
        clock: Arc<ManualClock>,
        history: Arc<MemoryHistory>,
        sink: Arc<CollectingSink>,
    }

    fn harness(keywords: &[&str]) -> Harness {
        harness_with(keywords, EngineConfig::default())
    }

    fn harness_with(keywords: &[&str], config: EngineConfig) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ));
        let history = Arc::new(MemoryHistory::default());
        let sink = Arc::new(CollectingSink::default());
        let engine = AnalyticsEngine::new(
            config,
            clock.clone(),
            MemoryKeywords::new(keywords),
            history.clone(),
            Arc::new(MemoryLedger::default()),
            sink.clone(),
            Arc::new(SimpleTokenizer),
        )
        .unwrap();
        Harness {
            engine,
            clock,
            history,
            sink,
        }
    }

    fn raw(user: i64, group: Option<i64>, ts: DateTime<Utc>, text: &str) -> RawMessage {
        RawMessage {
            user_id: Some(user),
            group_id: group,
            timestamp: Some(ts),
            kind: Some("text".to_string()),
            text: Some(text.to_string()),
        }
    }

    #[test]
    fn ingest_matches_keywords() {
        let h = harness(&["spam", "scam"]);
        let outcome = h
            .engine
            .ingest(raw(1, Some(100), h.clock.now(), "this looks like a scam to me"))
            .unwrap();
        assert_eq!(outcome.matched, vec!["scam".to_string()]);
    }

    #[test]
    fn quiet_group_emits_low_activity_alert() {
        let mut config = EngineConfig::default();
        // Every evaluation publishes; this test inspects the last one.
        config.alert_cooldown_secs = 0;
        let h = harness_with(&[], config);
        let now = h.clock.now();

        // 8 messages in the last 24h from 5 distinct users.
        let mut last = None;
        for i in 0..8i64 {
            let user = (i % 5) + 1;
            let outcome = h
                .engine
                .ingest(raw(user, Some(100), now - Duration::hours(i), "hello there"))
                .unwrap();
            last = Some(outcome);
        }

        let stats = h
            .engine
            .entity_stats(EntityRef::group(100), Horizon::Day)
            .unwrap();
        assert_eq!(stats.total_messages, 8);
        assert_eq!(stats.distinct_counterparts(), 5);

        let alert = &last.unwrap().alerts[0];
        assert_eq!(alert.kind, AlertKind::LowActivity);
        assert!(alert.message.contains("8 messages"));
        assert!(alert.message.contains("5 active users"));
    }

    #[test]
    fn cooldown_suppresses_repeat_alerts() {
        let h = harness(&[]);
        let now = h.clock.now();

        let first = h.engine.ingest(raw(1, Some(100), now, "hi")).unwrap();
        assert_eq!(first.alerts.len(), 1);

        // Still quiet one minute later, but inside the cooldown.
        h.clock.advance(Duration::minutes(1));
        let second = h.engine.ingest(raw(2, Some(100), h.clock.now(), "hi")).unwrap();
        assert!(second.alerts.is_empty());

        // After the cooldown it fires again.
        h.clock.advance(Duration::hours(2));
        let third = h.engine.ingest(raw(3, Some(100), h.clock.now(), "hi")).unwrap();
        assert_eq!(third.alerts.len(), 1);

        assert_eq!(h.sink.published.lock().unwrap().len(), 2);
    }

    #[test]
    fn behavioral_alert_after_warning_threshold() {
        let mut config = EngineConfig::default();
        // Keep low-activity out of the way.
        config.thresholds.low_activity_messages = 0;
        let h = harness_with(&["scam"], config);

        let mut alerts = Vec::new();
        for i in 0..5i64 {
            let outcome = h
                .engine
                .ingest(raw(
                    7,
                    Some(100),
                    h.clock.now() - Duration::minutes(5 - i),
                    "another scam link",
                ))
                .unwrap();
            alerts.extend(outcome.alerts);
        }

        // Warnings 1..=3 stay silent; the 4th crosses the >3 threshold.
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::BehavioralRisk);
        assert_eq!(alerts[0].entity, EntityRef::user(7));
        assert!(alerts[0].message.contains("4 warnings"));
    }

    #[test]
    fn sink_failure_does_not_block_ingestion() {
        let h = harness(&[]);
        *h.sink.fail.lock().unwrap() = true;

        let outcome = h.engine.ingest(raw(1, Some(100), h.clock.now(), "hi")).unwrap();
        // The alert was evaluated; delivery failed and was logged.
        assert_eq!(outcome.alerts.len(), 1);
        assert!(h.sink.published.lock().unwrap().is_empty());
    }

    #[test]
    fn risk_assessment_over_sampled_messages() {
        let h = harness(&["scam"]);
        let now = h.clock.now();

        for i in 0..100i64 {
            let text = if i < 21 { "a scam" } else { "fine" };
            h.engine
                .ingest(raw(1, None, now - Duration::minutes(i), text))
                .unwrap();
        }

        let assessment = h
            .engine
            .risk_assessment(EntityRef::user(1))
            .unwrap()
            .unwrap();
        assert_eq!(assessment.sampled, 100);
        assert_eq!(assessment.flagged, 21);
        assert!((assessment.ratio - 0.21).abs() < 1e-9);
        assert_eq!(assessment.level, RiskLevel::Medium);

        assert!(h.engine.risk_assessment(EntityRef::user(2)).unwrap().is_none());
    }

    #[test]
    fn add_keyword_twice_keeps_one_occurrence() {
        let h = harness(&[]);
        assert!(h.engine.add_keyword("spam").unwrap());
        assert!(!h.engine.add_keyword("spam").unwrap());

        let snapshot = h.engine.keyword_snapshot();
        assert_eq!(snapshot.iter().filter(|w| *w == "spam").count(), 1);

        // Matcher picked the new word up.
        let outcome = h
            .engine
            .ingest(raw(1, None, h.clock.now(), "pure spam"))
            .unwrap();
        assert_eq!(outcome.matched, vec!["spam".to_string()]);
    }

    #[test]
    fn remove_keyword_updates_matcher() {
        let h = harness(&["spam"]);
        assert!(h.engine.remove_keyword("spam").unwrap());
        assert!(!h.engine.remove_keyword("spam").unwrap());

        let outcome = h
            .engine
            .ingest(raw(1, None, h.clock.now(), "pure spam"))
            .unwrap();
        assert!(outcome.matched.is_empty());
    }

    #[test]
    fn top_keywords_reads_from_history() {
        let h = harness(&[]);
        let now = h.clock.now();

        let mut events = h.history.0.lock().unwrap();
        for (i, text) in ["market update", "market news", "weather report", ""]
            .iter()
            .enumerate()
        {
            events.push(Event {
                user_id: 1,
                group_id: Some(100),
                timestamp: now - Duration::hours(i as i64),
                kind: MessageKind::Text,
                text: text.to_string(),
            });
        }
        // Outside the horizon: ignored.
        events.push(Event {
            user_id: 1,
            group_id: Some(100),
            timestamp: now - Duration::days(40),
            kind: MessageKind::Text,
            text: "ancient history".to_string(),
        });
        drop(events);

        let report = h
            .engine
            .top_keywords(100, Horizon::Month, None)
            .unwrap()
            .unwrap();
        assert_eq!(report.top[0].token, "market");
        assert_eq!(report.top[0].count, 2);
        assert!(!report.top.iter().any(|t| t.token == "ancient"));

        assert!(h
            .engine
            .top_keywords(999, Horizon::Month, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn rebuild_reproduces_live_windows() {
        let h = harness(&["scam"]);
        let now = h.clock.now();

        let mut events = Vec::new();
        for i in 0..6i64 {
            let text = if i == 0 { "a scam" } else { "hello world" };
            events.push(Event {
                user_id: (i % 3) + 1,
                group_id: Some(100),
                timestamp: now - Duration::hours(i),
                kind: MessageKind::Text,
                text: text.to_string(),
            });
        }

        // Live ingestion.
        for e in &events {
            h.engine
                .ingest(raw(e.user_id, e.group_id, e.timestamp, &e.text))
                .unwrap();
        }
        let live = h
            .engine
            .entity_stats(EntityRef::group(100), Horizon::Day)
            .unwrap();

        // Restart: replay from history.
        *h.history.0.lock().unwrap() = events;
        let replayed = h.engine.rebuild(EntityRef::group(100)).unwrap();
        assert_eq!(replayed, 6);

        let rebuilt = h
            .engine
            .entity_stats(EntityRef::group(100), Horizon::Day)
            .unwrap();
        assert_eq!(live, rebuilt);
    }

    #[test]
    fn malformed_message_is_rejected_before_state() {
        let h = harness(&[]);
        let err = h
            .engine
            .ingest(RawMessage {
                group_id: Some(100),
                timestamp: Some(h.clock.now()),
                text: Some("anonymous".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidEvent(_)));
        assert!(h
            .engine
            .entity_stats(EntityRef::group(100), Horizon::Day)
            .is_none());
    }
}
