//! Metrics collection for authentication outcomes
//!
//! `MetricsCollector` is the pluggable backend interface; the in-memory
//! collector is enough for tests and single-process deployments and can
//! export its state as JSON or Prometheus text. `AuthMetrics` is the
//! domain-facing layer the service records into.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::auth::validator::RejectionKind;
use crate::error::{Result, RustyKeysError};

pub const AUTHENTICATIONS_TOTAL: &str = "rusty_keys_authentications_total";
pub const AUTHENTICATION_SECONDS: &str = "rusty_keys_authentication_seconds";
pub const LOGINS_TOTAL: &str = "rusty_keys_logins_total";
pub const TOKENS_ISSUED_TOTAL: &str = "rusty_keys_tokens_issued_total";
pub const TOKENS_REVOKED_TOTAL: &str = "rusty_keys_tokens_revoked_total";
pub const STORAGE_ERRORS_TOTAL: &str = "rusty_keys_storage_errors_total";

pub type Labels = BTreeMap<String, String>;

/// Metric value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Counter(u64),
    Histogram { count: u64, sum: f64 },
}

/// A single metric data point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
    pub labels: Labels,
    pub timestamp: DateTime<Utc>,
}

/// Metric collection interface
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    async fn increment_counter_by(&self, name: &str, value: u64, labels: Labels) -> Result<()>;

    async fn increment_counter(&self, name: &str, labels: Labels) -> Result<()> {
        self.increment_counter_by(name, 1, labels).await
    }

    async fn record_timing(&self, name: &str, duration: Duration, labels: Labels) -> Result<()>;

    async fn get_metrics(&self) -> Result<Vec<Metric>>;

    /// Render in `json` or `prometheus` format
    async fn export_metrics(&self, format: &str) -> Result<String>;

    async fn reset(&self) -> Result<()>;
}

/// In-memory metrics collector
#[derive(Default)]
pub struct InMemoryMetricsCollector {
    metrics: RwLock<BTreeMap<String, Metric>>,
}

impl InMemoryMetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn metric_key(name: &str, labels: &Labels) -> String {
        let mut key = name.to_string();
        for (k, v) in labels {
            key.push_str(&format!(",{}={}", k, v));
        }
        key
    }
}

fn render_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect();
    format!("{{{}}}", pairs.join(","))
}

#[async_trait]
impl MetricsCollector for InMemoryMetricsCollector {
    async fn increment_counter_by(&self, name: &str, value: u64, labels: Labels) -> Result<()> {
        let key = Self::metric_key(name, &labels);
        let mut metrics = self.metrics.write().await;

        let metric = metrics.entry(key).or_insert_with(|| Metric {
            name: name.to_string(),
            value: MetricValue::Counter(0),
            labels,
            timestamp: Utc::now(),
        });

        match &mut metric.value {
            MetricValue::Counter(count) => *count += value,
            MetricValue::Histogram { .. } => {
                return Err(RustyKeysError::ValidationError(format!(
                    "{} is a histogram, not a counter",
                    name
                )))
            }
        }
        metric.timestamp = Utc::now();
        Ok(())
    }

    async fn record_timing(&self, name: &str, duration: Duration, labels: Labels) -> Result<()> {
        let key = Self::metric_key(name, &labels);
        let mut metrics = self.metrics.write().await;

        let metric = metrics.entry(key).or_insert_with(|| Metric {
            name: name.to_string(),
            value: MetricValue::Histogram { count: 0, sum: 0.0 },
            labels,
            timestamp: Utc::now(),
        });

        match &mut metric.value {
            MetricValue::Histogram { count, sum } => {
                *count += 1;
                *sum += duration.as_secs_f64();
            }
            MetricValue::Counter(_) => {
                return Err(RustyKeysError::ValidationError(format!(
                    "{} is a counter, not a histogram",
                    name
                )))
            }
        }
        metric.timestamp = Utc::now();
        Ok(())
    }

    async fn get_metrics(&self) -> Result<Vec<Metric>> {
        let metrics = self.metrics.read().await;
        Ok(metrics.values().cloned().collect())
    }

    async fn export_metrics(&self, format: &str) -> Result<String> {
        let metrics = self.get_metrics().await?;

        match format {
            "json" => Ok(serde_json::to_string_pretty(&metrics)?),
            "prometheus" => {
                let mut output = String::new();
                let mut last_name: Option<&str> = None;

                for metric in &metrics {
                    // One TYPE line per family; the map keeps families together
                    if last_name != Some(metric.name.as_str()) {
                        let kind = match metric.value {
                            MetricValue::Counter(_) => "counter",
                            MetricValue::Histogram { .. } => "summary",
                        };
                        output.push_str(&format!("# TYPE {} {}\n", metric.name, kind));
                        last_name = Some(metric.name.as_str());
                    }

                    let labels = render_labels(&metric.labels);
                    match metric.value {
                        MetricValue::Counter(value) => {
                            output.push_str(&format!("{}{} {}\n", metric.name, labels, value));
                        }
                        MetricValue::Histogram { count, sum } => {
                            output.push_str(&format!("{}_count{} {}\n", metric.name, labels, count));
                            output.push_str(&format!("{}_sum{} {}\n", metric.name, labels, sum));
                        }
                    }
                }

                Ok(output)
            }
            _ => Err(RustyKeysError::ValidationError(format!(
                "Unsupported export format: {}",
                format
            ))),
        }
    }

    async fn reset(&self) -> Result<()> {
        self.metrics.write().await.clear();
        Ok(())
    }
}

/// Point-in-time view of the authentication counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMetricsSnapshot {
    pub authenticated: u64,
    /// Keyed by rejection kind name
    pub rejected: BTreeMap<String, u64>,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub tokens_issued: u64,
    pub tokens_revoked: u64,
    pub storage_errors: u64,
}

impl AuthMetricsSnapshot {
    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }
}

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Authentication metrics recorded by the service
///
/// Recording never fails the caller: collector errors are logged and dropped.
pub struct AuthMetrics {
    collector: Arc<dyn MetricsCollector>,
}

impl AuthMetrics {
    pub fn new(collector: Arc<dyn MetricsCollector>) -> Self {
        Self { collector }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryMetricsCollector::new()))
    }

    pub fn collector(&self) -> &Arc<dyn MetricsCollector> {
        &self.collector
    }

    async fn bump(&self, name: &str, by: u64, labels: Labels) {
        if let Err(e) = self.collector.increment_counter_by(name, by, labels).await {
            log::warn!("Failed to record metric {}: {}", name, e);
        }
    }

    pub async fn record_authentication(&self, rejection: Option<RejectionKind>, elapsed: Duration) {
        let outcome = rejection.map_or("authenticated", |kind| kind.as_str());
        self.bump(AUTHENTICATIONS_TOTAL, 1, labels(&[("outcome", outcome)]))
            .await;
        if let Err(e) = self
            .collector
            .record_timing(AUTHENTICATION_SECONDS, elapsed, Labels::new())
            .await
        {
            log::warn!("Failed to record metric {}: {}", AUTHENTICATION_SECONDS, e);
        }
    }

    pub async fn record_login(&self, succeeded: bool) {
        let outcome = if succeeded { "success" } else { "failure" };
        self.bump(LOGINS_TOTAL, 1, labels(&[("outcome", outcome)])).await;
    }

    pub async fn record_token_issued(&self) {
        self.bump(TOKENS_ISSUED_TOTAL, 1, Labels::new()).await;
    }

    pub async fn record_tokens_revoked(&self, count: usize) {
        if count > 0 {
            self.bump(TOKENS_REVOKED_TOTAL, count as u64, Labels::new())
                .await;
        }
    }

    pub async fn record_storage_error(&self, operation: &str) {
        self.bump(STORAGE_ERRORS_TOTAL, 1, labels(&[("operation", operation)]))
            .await;
    }

    pub async fn snapshot(&self) -> Result<AuthMetricsSnapshot> {
        let mut snapshot = AuthMetricsSnapshot::default();

        for metric in self.collector.get_metrics().await? {
            let value = match metric.value {
                MetricValue::Counter(value) => value,
                MetricValue::Histogram { .. } => continue,
            };
            let label = |name: &str| metric.labels.get(name).map(String::as_str);

            match metric.name.as_str() {
                AUTHENTICATIONS_TOTAL => match label("outcome") {
                    Some("authenticated") => snapshot.authenticated += value,
                    Some(kind) => *snapshot.rejected.entry(kind.to_string()).or_insert(0) += value,
                    None => {}
                },
                LOGINS_TOTAL => match label("outcome") {
                    Some("success") => snapshot.logins_succeeded += value,
                    Some("failure") => snapshot.logins_failed += value,
                    _ => {}
                },
                TOKENS_ISSUED_TOTAL => snapshot.tokens_issued += value,
                TOKENS_REVOKED_TOTAL => snapshot.tokens_revoked += value,
                STORAGE_ERRORS_TOTAL => snapshot.storage_errors += value,
                _ => {}
            }
        }

        Ok(snapshot)
    }
}

impl Default for AuthMetrics {
    fn default() -> Self {
        Self::in_memory()
    }
}
