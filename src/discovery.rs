// src/discovery.rs
//
// Pull-based discovery feed: periodically asks a Consul agent's catalog for
// the instances of each watched service id and swaps them into the registry.

use crate::{
    error::DiscoveryError,
    service_registry::{ServiceInstance, StaticRegistry},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Somewhere current instance sets can be looked up.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn lookup(&self, service_id: &str) -> Result<Vec<ServiceInstance>, DiscoveryError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogEntry {
    address: String,
    #[serde(default)]
    service_address: String,
    service_port: u16,
    #[serde(default)]
    service_meta: Option<HashMap<String, String>>,
}

impl CatalogEntry {
    fn into_instance(self, service_id: &str) -> ServiceInstance {
        // ServiceAddress is empty when the service shares the node address
        let host = if self.service_address.is_empty() {
            self.address
        } else {
            self.service_address
        };
        ServiceInstance::new(service_id, host, self.service_port)
            .with_metadata(self.service_meta.unwrap_or_default())
    }
}

/// Consul catalog over its HTTP API
#[derive(Debug, Clone)]
pub struct ConsulCatalog {
    client: Client,
    url: String,
}

impl ConsulCatalog {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        ConsulCatalog { client, url: url.into() }
    }
}

#[async_trait]
impl InstanceSource for ConsulCatalog {
    async fn lookup(&self, service_id: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        let url = format!("{}/v1/catalog/service/{}", self.url.trim_end_matches('/'), service_id);
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status { service_id: service_id.to_string(), status });
        }
        let entries: Vec<CatalogEntry> = res.json().await?;
        Ok(entries.into_iter().map(|e| e.into_instance(service_id)).collect())
    }
}

/// Refresh every id in `service_ids` once. An id whose lookup fails keeps
/// its previous instances. Returns how many ids were updated.
pub async fn refresh(
    source: &dyn InstanceSource,
    registry: &StaticRegistry,
    service_ids: &[String],
) -> usize {
    let mut updated = 0;
    for id in service_ids {
        match source.lookup(id).await {
            Ok(instances) => {
                log::debug!("discovered {} instance(s) of '{}'", instances.len(), id);
                registry.replace(id, instances);
                updated += 1;
            }
            Err(e) => log::warn!("keeping previous instances of '{}': {}", id, e),
        }
    }
    updated
}

/// Keep `registry` in sync with `source` until the task is dropped.
/// The first refresh happens one period in; callers refresh eagerly themselves.
pub async fn watch_services(
    source: Arc<dyn InstanceSource>,
    registry: Arc<StaticRegistry>,
    service_ids: Vec<String>,
    every: Duration,
) {
    log::info!("watching {:?} every {:?}", service_ids, every);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    loop {
        ticker.tick().await;
        refresh(source.as_ref(), &registry, &service_ids).await;
    }
}
