//! Violation monitor bus
//!
//! Synchronous publish/subscribe channel for contract violations. Published
//! events are timestamped, appended to a bounded rolling history, then handed
//! to every subscriber in subscription order.
//!
//! # Invariants
//!
//! 1. The history never holds more than `capacity` events; the oldest is
//!    evicted first.
//! 2. Subscribers see events in publication order, including events published
//!    from inside an observer or from another thread. Publishers enqueue and
//!    whichever caller is already dispatching drains the queue.
//! 3. An observer that returns an error or panics is logged and skipped. The
//!    event is still retained and the remaining observers still run.
//! 4. Dropping a [`Subscription`] removes its observer before the next event
//!    is dispatched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

use crate::error::ObserverError;
use crate::status::HealthStatus;
use crate::sync;
use crate::telemetry::ContractMetrics;

/// Scope name that matches every event source
pub const ALL_SCOPES: &str = "all";

/// Classification of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    /// Data failed validation against its schema
    SchemaViolation,
    /// A performance metric moved into warning or critical
    BudgetBreach,
    /// A lookup or lifecycle error downgraded from a hook
    ContractError,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::SchemaViolation => "schema-violation",
            ViolationKind::BudgetBreach => "budget-breach",
            ViolationKind::ContractError => "contract-error",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A violation before it is stamped by the bus
#[derive(Debug, Clone)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: HealthStatus,
    pub message: String,
    pub source: Option<String>,
    pub details: serde_json::Value,
}

impl Violation {
    pub fn new(kind: ViolationKind, severity: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            source: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// A published, timestamped violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
    #[serde(default)]
    pub resolved: bool,
}

impl ViolationEvent {
    fn stamp(violation: Violation) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: violation.kind,
            severity: violation.severity,
            message: violation.message,
            source: violation.source,
            timestamp: Utc::now(),
            details: violation.details,
            resolved: false,
        }
    }

    /// Whether a subscription scope covers this event
    pub fn matches_scope(&self, scope: &str) -> bool {
        scope == ALL_SCOPES || self.source.as_deref() == Some(scope)
    }
}

/// Receiver of published violations
pub trait ViolationObserver: Send + Sync {
    fn on_violation(&self, event: &ViolationEvent) -> Result<(), ObserverError>;
}

impl<F> ViolationObserver for F
where
    F: Fn(&ViolationEvent) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_violation(&self, event: &ViolationEvent) -> Result<(), ObserverError> {
        self(event)
    }
}

/// Observer that writes each violation to the tracing log
pub struct LoggingObserver;

impl ViolationObserver for LoggingObserver {
    fn on_violation(&self, event: &ViolationEvent) -> Result<(), ObserverError> {
        tracing::warn!(
            kind = %event.kind,
            severity = %event.severity,
            source = event.source.as_deref().unwrap_or("-"),
            details = %event.details,
            "{}",
            event.message
        );
        Ok(())
    }
}

#[derive(Clone)]
struct SubscriberEntry {
    id: u64,
    scope: Option<String>,
    observer: Arc<dyn ViolationObserver>,
}

struct BusState {
    history: VecDeque<ViolationEvent>,
    capacity: usize,
    pending: VecDeque<ViolationEvent>,
    dispatching: bool,
}

struct BusInner {
    state: Mutex<BusState>,
    subscribers: Mutex<Vec<SubscriberEntry>>,
    next_id: AtomicU64,
    metrics: Arc<ContractMetrics>,
}

impl BusInner {
    fn remove_subscriber(&self, id: u64) -> bool {
        let mut subscribers = sync::lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;
        self.metrics.set_active_subscriptions(subscribers.len());
        removed
    }
}

/// Handle to an active subscription; unsubscribes when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Whether the observer is still registered
    pub fn is_active(&self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => {
                let subscribers = sync::lock(&inner.subscribers);
                subscribers.iter().any(|s| s.id == self.id)
            }
            None => false,
        }
    }

    /// Remove the observer now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove_subscriber(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// The violation publish/subscribe channel
#[derive(Clone)]
pub struct MonitorBus {
    inner: Arc<BusInner>,
}

impl MonitorBus {
    pub fn new(capacity: usize, metrics: Arc<ContractMetrics>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(BusState {
                    history: VecDeque::with_capacity(capacity.min(1024)),
                    capacity: capacity.max(1),
                    pending: VecDeque::new(),
                    dispatching: false,
                }),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                metrics,
            }),
        }
    }

    /// Stamp, retain and deliver a violation
    pub fn publish(&self, violation: Violation) -> ViolationEvent {
        let event = ViolationEvent::stamp(violation);
        self.inner
            .metrics
            .record_violation(event.kind.as_str(), event.severity.as_str());
        tracing::debug!(
            event_id = %event.id,
            kind = %event.kind,
            source = event.source.as_deref().unwrap_or("-"),
            "Publishing violation"
        );

        {
            let mut state = sync::lock(&self.inner.state);
            let keep = state.capacity - 1;
            sync::retain_newest(&mut state.history, keep);
            state.history.push_back(event.clone());
            state.pending.push_back(event.clone());
            if state.dispatching {
                return event;
            }
            state.dispatching = true;
        }

        self.drain_pending();
        event
    }

    fn drain_pending(&self) {
        loop {
            let next = {
                let mut state = sync::lock(&self.inner.state);
                match state.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        state.dispatching = false;
                        return;
                    }
                }
            };

            let subscribers = sync::lock(&self.inner.subscribers).clone();
            for subscriber in subscribers {
                if let Some(scope) = &subscriber.scope {
                    if !next.matches_scope(scope) {
                        continue;
                    }
                }
                self.notify(&subscriber, &next);
            }
        }
    }

    fn notify(&self, subscriber: &SubscriberEntry, event: &ViolationEvent) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            subscriber.observer.on_violation(event)
        }));

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        self.inner.metrics.record_observer_failure();
        tracing::error!(
            subscription = subscriber.id,
            event_id = %event.id,
            error = %failure,
            "Violation observer failed"
        );
    }

    /// Register an observer for every future event
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: ViolationObserver + 'static,
    {
        self.add_subscriber(None, Arc::new(observer))
    }

    /// Register an observer for events whose source equals `scope`.
    ///
    /// The scope `"all"` receives every event.
    pub fn subscribe_scoped<O>(&self, scope: impl Into<String>, observer: O) -> Subscription
    where
        O: ViolationObserver + 'static,
    {
        let scope = scope.into();
        let scope = if scope == ALL_SCOPES { None } else { Some(scope) };
        self.add_subscriber(scope, Arc::new(observer))
    }

    fn add_subscriber(
        &self,
        scope: Option<String>,
        observer: Arc<dyn ViolationObserver>,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = sync::lock(&self.inner.subscribers);
        subscribers.push(SubscriberEntry {
            id,
            scope,
            observer,
        });
        self.inner.metrics.set_active_subscriptions(subscribers.len());

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        sync::lock(&self.inner.subscribers).len()
    }

    /// Most recent events, newest first
    pub fn history(&self, limit: Option<usize>) -> Vec<ViolationEvent> {
        let state = sync::lock(&self.inner.state);
        let limit = limit.unwrap_or(state.history.len());
        state.history.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent events from one source, newest first
    pub fn history_for(&self, source: &str, limit: Option<usize>) -> Vec<ViolationEvent> {
        let state = sync::lock(&self.inner.state);
        state
            .history
            .iter()
            .rev()
            .filter(|e| e.matches_scope(source))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Mark an event resolved so it no longer counts against health
    pub fn resolve(&self, id: Uuid) -> bool {
        let mut state = sync::lock(&self.inner.state);
        match state.history.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                event.resolved = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        sync::lock(&self.inner.state).history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Change the capacity, evicting the oldest events if it shrinks
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = sync::lock(&self.inner.state);
        state.capacity = capacity.max(1);
        let keep = state.capacity;
        sync::retain_newest(&mut state.history, keep);
    }

    /// Empty the history; subscriptions are untouched
    pub fn clear(&self) -> usize {
        let mut state = sync::lock(&self.inner.state);
        let count = state.history.len();
        state.history.clear();
        count
    }

    /// Drop every retained event of one kind
    pub fn clear_kind(&self, kind: ViolationKind) -> usize {
        let mut state = sync::lock(&self.inner.state);
        let before = state.history.len();
        state.history.retain(|e| e.kind != kind);
        before - state.history.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("observer panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("observer panicked: {}", s)
    } else {
        "observer panicked".to_string()
    }
}
