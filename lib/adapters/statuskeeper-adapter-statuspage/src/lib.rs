//! statuspage.io client: component listing and status updates.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use statuskeeper_domain::{ApiKey, Component, ComponentStatus};
use statuskeeper_ports::StatusPagePort;

/// Component as returned by `components.json`, including group metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RawComponent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub group_id: Option<String>,
}

/// Drops group containers and prefixes grouped members with their group's
/// name, so `Backend` > `API` becomes `Backend-API`.
pub fn flatten_components(raw: Vec<RawComponent>) -> Vec<Component> {
    let groups: HashMap<String, String> = raw
        .iter()
        .filter(|c| c.group)
        .map(|c| (c.id.clone(), c.name.clone()))
        .collect();

    raw.into_iter()
        .filter(|c| !c.group)
        .map(|c| {
            let name = match c.group_id.as_deref().filter(|id| !id.is_empty()) {
                Some(group_id) => match groups.get(group_id) {
                    Some(group) => format!("{group}-{}", c.name),
                    None => {
                        warn!(component = %c.name, %group_id, "component references unknown group");
                        c.name
                    }
                },
                None => c.name,
            };
            Component::new(c.id, name, c.status)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct StatusPageClient {
    http: Client,
    page_url: String,
    api_key: ApiKey,
}

impl StatusPageClient {
    pub fn new(
        base_url: &str,
        page_id: &str,
        api_key: ApiKey,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build statuspage HTTP client")?;
        Ok(Self {
            http,
            page_url: format!("{}/pages/{page_id}", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    fn authorization(&self) -> String {
        format!("OAuth {}", self.api_key.expose())
    }

    async fn fetch_raw(&self) -> Result<Vec<RawComponent>> {
        let url = format!("{}/components.json", self.page_url);
        debug!(%url, "GET");
        self.http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .context("statuspage rejected component listing")?
            .json()
            .await
            .context("invalid components.json response body")
    }
}

#[async_trait]
impl StatusPagePort for StatusPageClient {
    async fn list_components(&self) -> Result<Vec<Component>> {
        let raw = self.fetch_raw().await?;
        let total = raw.len();
        let components = flatten_components(raw);
        debug!(total, flattened = components.len(), "components listed");
        Ok(components)
    }

    async fn update_status(&self, component: &Component, status: ComponentStatus) -> Result<()> {
        let url = format!("{}/components/{}.json", self.page_url, component.id);
        debug!(%url, component = %component.name, %status, "PATCH");
        self.http
            .patch(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .form(&[("component[status]", status.as_str())])
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("statuspage rejected update of {}", component.name))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.fetch_raw().await.map(|_| ())
    }
}
