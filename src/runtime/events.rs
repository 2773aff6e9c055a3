//! Lifecycle event bus
//!
//! Stage events fan out synchronously to every subscriber in subscription
//! order; a subscriber that errors fails the run. Events for a stage always
//! arrive as `start → complete` or `start → error`.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pipeline stages that publish events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Planning,
    Resolution,
    Transformation,
    Formatting,
    Dependencies,
    Audit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Resolution => "resolution",
            Self::Transformation => "transformation",
            Self::Formatting => "formatting",
            Self::Dependencies => "dependencies",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageEventKind {
    #[serde(rename = "stage:start")]
    Start,
    #[serde(rename = "stage:complete")]
    Complete,
    #[serde(rename = "stage:error")]
    Error,
}

/// One lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    #[serde(rename = "type")]
    pub kind: StageEventKind,

    pub stage: Stage,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageEvent {
    pub fn start(stage: Stage) -> Self {
        Self::new(StageEventKind::Start, stage)
    }

    pub fn complete(stage: Stage, attributes: Option<Value>) -> Self {
        let mut event = Self::new(StageEventKind::Complete, stage);
        event.attributes = attributes;
        event
    }

    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        let mut event = Self::new(StageEventKind::Error, stage);
        event.error = Some(message.into());
        event
    }

    fn new(kind: StageEventKind, stage: Stage) -> Self {
        Self {
            kind,
            stage,
            timestamp: Utc::now(),
            attributes: None,
            error: None,
        }
    }
}

/// Subscriber callback. Keep these fast: the bus is synchronous and a slow
/// subscriber blocks the run.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &StageEvent) -> anyhow::Result<()>;
}

impl<F> EventSubscriber for F
where
    F: Fn(&StageEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &StageEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Subscription handle returned by [`LifecycleBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Synchronous in-process event bus.
pub struct LifecycleBus {
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn EventSubscriber>)>>,
    next_id: AtomicU64,
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, subscriber));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().retain(|(sid, _)| *sid != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Publish to every subscriber in subscription order. The first
    /// subscriber error aborts publication and propagates.
    pub fn publish(&self, event: &StageEvent) -> anyhow::Result<()> {
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, subscriber)| subscriber.clone())
            .collect();
        for subscriber in subscribers {
            subscriber.on_event(event)?;
        }
        Ok(())
    }
}
