//! New Relic REST v2 client for alert policies and open violations.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use statuskeeper_domain::{AlertPolicy, ApiKey, Violation};
use statuskeeper_ports::AlertingPort;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Deserialize)]
struct PoliciesPage {
    #[serde(default)]
    policies: Vec<AlertPolicy>,
}

#[derive(Debug, Deserialize)]
struct ViolationsPage {
    #[serde(default)]
    violations: Vec<Violation>,
}

#[derive(Debug, Clone)]
pub struct NewRelicClient {
    http: Client,
    base_url: String,
}

impl NewRelicClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build New Relic HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        credential: &ApiKey,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, %credential, "GET");
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, credential.expose())
            .query(query)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("New Relic rejected {path}"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("invalid {path} response body"))
    }
}

#[async_trait]
impl AlertingPort for NewRelicClient {
    async fn list_policies(&self, credential: &ApiKey, page: u32) -> Result<Vec<AlertPolicy>> {
        let body: PoliciesPage = self
            .get_page(
                credential,
                "alerts_policies.json",
                &[("page", page.to_string())],
            )
            .await?;
        Ok(body.policies)
    }

    async fn list_open_violations(&self, credential: &ApiKey, page: u32) -> Result<Vec<Violation>> {
        let body: ViolationsPage = self
            .get_page(
                credential,
                "alerts_violations.json",
                &[("only_open", "true".to_string()), ("page", page.to_string())],
            )
            .await?;
        Ok(body.violations)
    }

    async fn health_check(&self, credential: &ApiKey) -> Result<()> {
        self.list_policies(credential, 1).await.map(|_| ())
    }
}
