//! Report delivery.
//!
//! Delivery is fire-and-forget: the monitor loop hands a sample over
//! and moves on. A failed delivery is logged and dropped; the cost is
//! bounded at one capped interval of credit, which the pipeline accepts
//! by design of the credit rule.

use pulse_core::ActivitySample;
use pulse_protocol::SampleRequest;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from constructing a reporter.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid ingestion endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Sink for activity samples produced by a monitor.
///
/// Both methods are synchronous and must not block: implementations
/// spawn their own delivery work. `report_teardown` exists because the
/// teardown flush is the last chance to deliver - implementations may
/// treat it differently (the HTTP reporter shortens its timeout so the
/// attempt fits inside host shutdown).
pub trait Reporter: Send + Sync {
    fn report(&self, sample: ActivitySample);

    fn report_teardown(&self, sample: ActivitySample) {
        self.report(sample);
    }
}

/// Delivery timeout for ordinary reports.
const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Teardown attempts get one short shot; the host is going away.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Delivers samples to the ingestion endpoint over HTTP.
#[derive(Debug)]
pub struct HttpReporter {
    client: reqwest::Client,
    ingest_url: String,
    token: Option<String>,
}

impl HttpReporter {
    /// Builds a reporter posting to `{base_url}/api/v1/activity`.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, MonitorError> {
        let base = base_url.trim_end_matches('/');
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(MonitorError::InvalidEndpoint {
                url: base_url.to_string(),
                reason: "expected an http:// or https:// URL".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(REPORT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            ingest_url: format!("{base}/api/v1/activity"),
            token,
        })
    }

    fn deliver(&self, sample: ActivitySample, timeout: Duration) {
        let request = SampleRequest::from_sample(&sample);
        let mut builder = self
            .client
            .post(&self.ingest_url)
            .timeout(timeout)
            .json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        // Owned copy: the spawned future outlives the sample.
        let session = sample.session_id.short().to_string();
        tokio::spawn(async move {
            match builder.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(session_id = %session, "Report delivered");
                }
                Ok(response) => {
                    warn!(
                        session_id = %session,
                        status = %response.status(),
                        "Report rejected, dropping"
                    );
                }
                Err(err) => {
                    warn!(session_id = %session, error = %err, "Report delivery failed, dropping");
                }
            }
        });
    }
}

impl Reporter for HttpReporter {
    fn report(&self, sample: ActivitySample) {
        self.deliver(sample, REPORT_TIMEOUT);
    }

    fn report_teardown(&self, sample: ActivitySample) {
        self.deliver(sample, TEARDOWN_TIMEOUT);
    }
}
