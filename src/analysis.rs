//! HTTP client for the recorded-dataset and summary endpoints.
//!
//! Both endpoints are plain GETs against the acquisition service. The dataset
//! comes back as delimited text, the summary as `{"data": {...}}` or
//! `{"error": "..."}`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::core::{parse_dataset, Dataset, Summary};
use crate::error::FetchError;

/// Source of complete recorded datasets.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch_dataset(&self) -> Result<Dataset, FetchError>;
}

/// Source of summary metrics for the most recent dataset.
#[async_trait]
pub trait SummarySource: Send + Sync {
    async fn fetch_summary(&self) -> Result<Summary, FetchError>;
}

/// Summary response body.
#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(default)]
    data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    error: Option<String>,
}

impl SummaryEnvelope {
    fn into_summary(self) -> Result<Summary, FetchError> {
        if let Some(error) = self.error {
            return Err(FetchError::SummaryUnavailable(error));
        }
        self.data
            .map(Summary::from_map)
            .ok_or_else(|| FetchError::Malformed("summary response has no data".to_string()))
    }
}

/// Client for the analysis endpoints.
pub struct AnalysisClient {
    config: ServiceConfig,
    client: reqwest::Client,
}

impl AnalysisClient {
    /// Create a new analysis client.
    pub fn new(config: ServiceConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Download and parse the full recorded dataset.
    pub async fn load_dataset(&self) -> Result<Dataset, FetchError> {
        let url = self.config.dataset_url();
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let dataset = parse_dataset(&body);
        if dataset.malformed_rows() > 0 {
            warn!(
                malformed = dataset.malformed_rows(),
                first = %dataset.rejected[0],
                "dataset contains malformed rows"
            );
        }
        debug!(%url, samples = dataset.samples.len(), "dataset loaded");
        Ok(dataset)
    }

    /// Request summary metrics.
    pub async fn load_summary(&self) -> Result<Summary, FetchError> {
        let url = self.config.summary_url();
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // The service reports analysis failures as {"error": ...} with a 500.
            return match serde_json::from_str::<SummaryEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
            {
                Some(error) => Err(FetchError::SummaryUnavailable(error)),
                None => Err(FetchError::Server {
                    status: status.as_u16(),
                    message: body,
                }),
            };
        }

        let envelope: SummaryEnvelope =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let summary = envelope.into_summary()?;
        debug!(%url, metrics = summary.metrics.len(), "summary loaded");
        Ok(summary)
    }
}

#[async_trait]
impl DatasetSource for AnalysisClient {
    async fn fetch_dataset(&self) -> Result<Dataset, FetchError> {
        self.load_dataset().await
    }
}

#[async_trait]
impl SummarySource for AnalysisClient {
    async fn fetch_summary(&self) -> Result<Summary, FetchError> {
        self.load_summary().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MetricValue;

    #[test]
    fn test_envelope_with_data() {
        let envelope: SummaryEnvelope = serde_json::from_str(
            r#"{"data": {"heart_rate": 71.0, "pr_interval": 160.2, "qtc_interval": null}}"#,
        )
        .unwrap();
        let summary = envelope.into_summary().unwrap();

        assert_eq!(summary.metrics.len(), 3);
        assert_eq!(summary.get("heart_rate"), Some(&MetricValue::Number(71.0)));
        assert_eq!(summary.get("qtc_interval"), Some(&MetricValue::Missing));
    }

    #[test]
    fn test_envelope_with_error() {
        let envelope: SummaryEnvelope =
            serde_json::from_str(r#"{"error": "ecg_data.csv is empty"}"#).unwrap();
        let err = envelope.into_summary().unwrap_err();
        assert!(err.is_summary_unavailable());
        assert!(err.to_string().contains("ecg_data.csv is empty"));
    }

    #[test]
    fn test_envelope_without_data() {
        let envelope: SummaryEnvelope = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            envelope.into_summary(),
            Err(FetchError::Malformed(_))
        ));
    }
}
