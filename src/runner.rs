// src/runner.rs
//
// Client role: fetch the greeting once through each invocation style.

use crate::{
    balanced_client::{filtered_greetings, manual_greetings, LoadBalancedClient, LoadBalancerLayer},
    config::ClientConfig,
    discovery::{refresh, watch_services, ConsulCatalog, InstanceSource},
    error::FetchError,
    fetch::{make_client, Greeting},
    load_balancer::LoadBalancer,
    service_registry::StaticRegistry,
};
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;

/// Outcome of each style, in `configured, filter, manual` order.
#[derive(Debug)]
pub struct RunReport {
    pub configured: Result<Vec<Greeting>, FetchError>,
    pub filter: Result<Vec<Greeting>, FetchError>,
    pub manual: Result<Vec<Greeting>, FetchError>,
}

fn log_outcome(style: &str, outcome: &Result<Vec<Greeting>, FetchError>) {
    match outcome {
        Ok(greetings) => {
            for g in greetings {
                log::info!("{}: {:?}", style, g);
            }
        }
        Err(e) => log::error!("{}: {}", style, e),
    }
}

/// Call `service_id` three ways and log every greeting received.
pub async fn run_styles(
    lb: Arc<LoadBalancer>,
    client: Client,
    service_id: &str,
    path: &str,
) -> RunReport {
    let strategy = lb.default_strategy();
    let logical_url = format!("http://{}/{}", service_id, path.trim_start_matches('/'));

    let configured_client = LoadBalancedClient::new(client.clone(), lb.clone());
    let mut filtered = ServiceBuilder::new()
        .layer(LoadBalancerLayer::new(lb.clone(), strategy))
        .service(client.clone());

    let (configured, filter, manual) = tokio::join!(
        async { configured_client.get_greetings(&logical_url).await.map(|g| g.collect::<Vec<_>>()) },
        async { filtered_greetings(&mut filtered, &client, &logical_url).await.map(|g| g.collect::<Vec<_>>()) },
        async { manual_greetings(&lb, &client, service_id, path, strategy).await.map(|g| g.collect::<Vec<_>>()) },
    );

    let report = RunReport { configured, filter, manual };
    log_outcome("configured", &report.configured);
    log_outcome("filter", &report.filter);
    log_outcome("manual", &report.manual);
    report
}

/// Build registry, balancer and client from `cfg`, then run every style once.
pub async fn run_client(cfg: &ClientConfig) -> Result<RunReport, FetchError> {
    let client = make_client(Duration::from_secs(cfg.request_timeout_secs))?;
    let registry = Arc::new(StaticRegistry::from_entries(cfg.instances.clone()));

    let mut watcher = None;
    if let Some(consul) = &cfg.consul {
        let source: Arc<dyn InstanceSource> = Arc::new(ConsulCatalog::new(client.clone(), consul.url.clone()));
        let ids = vec![cfg.service_id.clone()];
        refresh(source.as_ref(), &registry, &ids).await;
        watcher = Some(tokio::spawn(watch_services(
            source,
            registry.clone(),
            ids,
            Duration::from_secs(consul.refresh_secs),
        )));
    }

    let lb = Arc::new(LoadBalancer::with_strategy(registry, cfg.strategy));
    let report = run_styles(lb, client, &cfg.service_id, &cfg.path).await;

    // the registry is unused past this point
    if let Some(handle) = watcher {
        handle.abort();
    }
    Ok(report)
}
