//! Audit trail shipped to OpenSearch.
//!
//! # Responsibilities
//! - Turn this crate's tracing events into structured audit documents
//! - Queue them without ever blocking the caller
//! - Index them from one background task, draining the queue on exit
//!
//! # Design Decisions
//! - The console `fmt` layer is the local record; this layer only adds the remote copy
//! - Bounded queue: a full queue drops the event and counts it
//! - Delivery failures are logged under [`DELIVERY_TARGET`], which this
//!   layer ignores, so they reach the console only
//! - No retries and no ordering guarantee beyond the queue's FIFO

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::AuditConfig;
use crate::observability::identity::{Identity, SERVICE_NAME};
use crate::observability::metrics;

/// Target for the sink's own diagnostics. Never forwarded.
pub const DELIVERY_TARGET: &str = "signalmice::audit_delivery";

/// Errors talking to the audit cluster.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to build OpenSearch client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("OpenSearch request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("OpenSearch returned {status} for index {index}")]
    Status { status: u16, index: String },
}

/// Severity as it appears in the audit document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl From<&Level> for AuditLevel {
    fn from(level: &Level) -> Self {
        if *level == Level::ERROR {
            AuditLevel::Error
        } else if *level == Level::WARN {
            AuditLevel::Warn
        } else if *level == Level::INFO {
            AuditLevel::Info
        } else {
            AuditLevel::Debug
        }
    }
}

/// One indexed audit document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    #[serde(rename = "@timestamp", serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub level: AuditLevel,
    pub message: String,
    pub hostname: String,
    pub service: String,
    #[serde(rename = "redis_key", skip_serializing_if = "String::is_empty")]
    pub monitored_key: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(
        identity: &Identity,
        level: AuditLevel,
        message: impl Into<String>,
        extra: Map<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
            hostname: identity.hostname.clone(),
            service: identity.service.clone(),
            monitored_key: identity.monitored_key.clone(),
            extra,
        }
    }
}

fn serialize_timestamp<S: Serializer>(
    ts: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&ts.format("%Y-%m-%dT%H:%M:%SZ"))
}

/// Static or per-UTC-day index naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexName {
    base: String,
    daily: bool,
}

impl IndexName {
    pub fn new(base: impl Into<String>, daily: bool) -> Self {
        Self {
            base: base.into(),
            daily,
        }
    }

    /// Index for a document recorded on `day` (UTC).
    pub fn for_day(&self, day: NaiveDate) -> String {
        if self.daily {
            format!("{}-{}", self.base, day.format("%Y-%m-%d"))
        } else {
            self.base.clone()
        }
    }

    pub fn for_event(&self, event: &AuditEvent) -> String {
        self.for_day(event.timestamp.date_naive())
    }
}

/// Should an event with this target reach the audit index?
fn is_forwarded(target: &str) -> bool {
    target != DELIVERY_TARGET
        && (target == SERVICE_NAME
            || target
                .strip_prefix(SERVICE_NAME)
                .is_some_and(|rest| rest.starts_with("::")))
}

/// Tracing layer feeding the audit queue.
pub struct AuditLayer {
    identity: Arc<Identity>,
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditLayer {
    pub fn new(identity: Arc<Identity>, tx: mpsc::Sender<AuditEvent>) -> Self {
        Self { identity, tx }
    }
}

impl<S: Subscriber> Layer<S> for AuditLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !is_forwarded(meta.target()) {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let audit = AuditEvent::new(
            &self.identity,
            AuditLevel::from(meta.level()),
            fields.message,
            fields.extra,
            Utc::now(),
        );

        match self.tx.try_send(audit) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => metrics::record_audit_dropped(),
            // Delivery task gave up (cluster unreachable at startup).
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    extra: Map<String, Value>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
        } else {
            self.extra.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }
}

/// HTTP client for the audit cluster.
#[derive(Debug, Clone)]
pub struct AuditSink {
    client: reqwest::Client,
    base_url: String,
    index: IndexName,
    credentials: Option<(String, String)>,
}

impl AuditSink {
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(AuditError::Client)?;

        let credentials = if config.username.is_empty() {
            None
        } else {
            Some((config.username.clone(), config.password.clone()))
        };

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: IndexName::new(config.index.clone(), config.use_daily_index),
            credentials,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    /// Check the cluster answers at all.
    pub async fn probe(&self) -> Result<(), AuditError> {
        let res = self
            .request(self.client.get(&self.base_url))
            .send()
            .await
            .map_err(AuditError::Request)?;
        if !res.status().is_success() {
            return Err(AuditError::Status {
                status: res.status().as_u16(),
                index: String::new(),
            });
        }
        Ok(())
    }

    /// Index one document.
    pub async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let index = self.index.for_event(event);
        let url = format!("{}/{}/_doc", self.base_url, index);

        let res = self
            .request(self.client.post(url))
            .json(event)
            .send()
            .await
            .map_err(AuditError::Request)?;

        if !res.status().is_success() {
            return Err(AuditError::Status {
                status: res.status().as_u16(),
                index,
            });
        }
        Ok(())
    }

    /// Start the single delivery task.
    pub fn spawn(self, rx: mpsc::Receiver<AuditEvent>) -> AuditHandle {
        let stop = CancellationToken::new();
        let task = tokio::spawn(self.run(rx, stop.clone()));
        AuditHandle { stop, task }
    }

    async fn run(self, mut rx: mpsc::Receiver<AuditEvent>, stop: CancellationToken) {
        if let Err(e) = self.probe().await {
            tracing::warn!(
                target: DELIVERY_TARGET,
                url = %self.base_url,
                error = %e,
                "Could not connect to OpenSearch. Logging will continue to stdout only."
            );
            return;
        }

        loop {
            tokio::select! {
                biased;
                next = rx.recv() => match next {
                    Some(event) => self.deliver_logged(&event).await,
                    None => break,
                },
                _ = stop.cancelled() => {
                    rx.close();
                    while let Some(event) = rx.recv().await {
                        self.deliver_logged(&event).await;
                    }
                    break;
                }
            }
        }
    }

    async fn deliver_logged(&self, event: &AuditEvent) {
        if let Err(e) = self.deliver(event).await {
            tracing::error!(
                target: DELIVERY_TARGET,
                error = %e,
                "Failed to send log to OpenSearch"
            );
        }
    }
}

/// Owner of the delivery task.
#[derive(Debug)]
pub struct AuditHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl AuditHandle {
    /// Stop accepting events, flush what is queued, and wait up to `grace`.
    ///
    /// Returns `false` if the queue could not be flushed in time.
    pub async fn close(self, grace: Duration) -> bool {
        self.stop.cancel();
        match tokio::time::timeout(grace, self.task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(target: DELIVERY_TARGET, "Audit queue not drained before exit");
                false
            }
        }
    }
}

/// Wire a layer and its delivery task together.
pub fn pipeline(
    config: &AuditConfig,
    identity: Arc<Identity>,
) -> Result<(AuditLayer, AuditHandle), AuditError> {
    let sink = AuditSink::new(config)?;
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    Ok((AuditLayer::new(identity, tx), sink.spawn(rx)))
}
