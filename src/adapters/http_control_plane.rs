use crate::error::ControlPlaneError;
use crate::ports::{ControlPlaneDecision, ControlPlanePort, StepProposal, StepResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const PROPOSE_PATH: &str = "/steps/propose";
const REPORT_PATH: &str = "/steps/report";

/// Control plane reached over JSON/HTTP.
///
/// `POST {base}/steps/propose` answers with a [`ControlPlaneDecision`];
/// `POST {base}/steps/report` answers with anything (including 204). Both
/// carry `Authorization: Bearer <api_key>` when a key is configured.
pub struct HttpControlPlane {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpControlPlane {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ControlPlaneError> {
        let endpoint = format!("{}{path}", self.base_url);
        let mut request = self.client.post(&endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ControlPlaneError::Request {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for HttpControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpControlPlane")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ControlPlanePort for HttpControlPlane {
    async fn propose_step(&self, proposal: &StepProposal) -> anyhow::Result<ControlPlaneDecision> {
        let response = self.post(PROPOSE_PATH, proposal).await?;
        let decision = response
            .json::<ControlPlaneDecision>()
            .await
            .map_err(|e| ControlPlaneError::Decode {
                endpoint: format!("{}{PROPOSE_PATH}", self.base_url),
                message: e.to_string(),
            })?;
        tracing::debug!(
            step_id = %proposal.step_id,
            approved = decision.approved,
            "control plane answered proposal"
        );
        Ok(decision)
    }

    async fn report_result(&self, result: &StepResult) -> anyhow::Result<()> {
        self.post(REPORT_PATH, result).await?;
        Ok(())
    }
}
