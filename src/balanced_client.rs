// src/balanced_client.rs
//
// Three ways of reaching a logical service through the load balancer:
// a pre-configured client, a tower filter layer over any HTTP service, and
// an explicit choose-then-fetch flow.

use crate::{
    error::FetchError,
    fetch::{fetch_greetings, read_greetings, Greetings},
    load_balancer::{LoadBalancer, Strategy},
    service_registry::ServiceInstance,
};
use futures::future::{self, BoxFuture};
use reqwest::{Client, Url};
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service, ServiceExt};

/// Point `url` at `instance`, keeping its path and query.
pub fn rewrite_url(url: &Url, instance: &ServiceInstance) -> Result<Url, FetchError> {
    let base = instance.uri();
    let mut out =
        Url::parse(&base).map_err(|source| FetchError::InvalidUrl { url: base.clone(), source })?;
    out.set_path(url.path());
    out.set_query(url.query());
    Ok(out)
}

/// Resolve the logical host of `url` to a concrete instance URL.
pub fn resolve_url(lb: &LoadBalancer, strategy: Strategy, url: &Url) -> Result<Url, FetchError> {
    let service_id = url
        .host_str()
        .ok_or_else(|| FetchError::MissingHost(url.to_string()))?;
    let instance = lb.choose(service_id, strategy)?;
    rewrite_url(url, &instance)
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|source| FetchError::InvalidUrl { url: url.to_string(), source })
}

/// HTTP client whose URLs name logical services instead of hosts.
#[derive(Clone)]
pub struct LoadBalancedClient {
    client: Client,
    lb: Arc<LoadBalancer>,
    strategy: Strategy,
}

impl LoadBalancedClient {
    pub fn new(client: Client, lb: Arc<LoadBalancer>) -> Self {
        let strategy = lb.default_strategy();
        LoadBalancedClient { client, lb, strategy }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// GET e.g. `http://api/greetings`, with `api` resolved per call.
    pub async fn get_greetings(&self, url: &str) -> Result<Greetings, FetchError> {
        let target = resolve_url(&self.lb, self.strategy, &parse_url(url)?)?;
        fetch_greetings(&self.client, target.as_str()).await
    }
}

/// Tower layer rewriting logical hosts before the request leaves.
#[derive(Clone)]
pub struct LoadBalancerLayer {
    lb: Arc<LoadBalancer>,
    strategy: Strategy,
}

impl LoadBalancerLayer {
    pub fn new(lb: Arc<LoadBalancer>, strategy: Strategy) -> Self {
        LoadBalancerLayer { lb, strategy }
    }
}

impl<S> Layer<S> for LoadBalancerLayer {
    type Service = LoadBalancerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadBalancerService {
            inner,
            lb: self.lb.clone(),
            strategy: self.strategy,
        }
    }
}

#[derive(Clone)]
pub struct LoadBalancerService<S> {
    inner: S,
    lb: Arc<LoadBalancer>,
    strategy: Strategy,
}

impl<S> Service<reqwest::Request> for LoadBalancerService<S>
where
    S: Service<reqwest::Request, Response = reqwest::Response>,
    S::Error: Into<FetchError>,
    S::Future: Send + 'static,
{
    type Response = reqwest::Response;
    type Error = FetchError;
    type Future = BoxFuture<'static, Result<reqwest::Response, FetchError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut req: reqwest::Request) -> Self::Future {
        match resolve_url(&self.lb, self.strategy, req.url()) {
            Ok(target) => {
                *req.url_mut() = target;
                let fut = self.inner.call(req);
                Box::pin(async move { fut.await.map_err(Into::into) })
            }
            // inner is never called when nothing can be chosen
            Err(e) => Box::pin(future::ready(Err(e))),
        }
    }
}

/// Issue a GET for `url` through `svc` (typically a `LoadBalancerService<Client>`).
pub async fn filtered_greetings<S>(svc: &mut S, client: &Client, url: &str) -> Result<Greetings, FetchError>
where
    S: Service<reqwest::Request, Response = reqwest::Response, Error = FetchError>,
{
    let req = client.get(parse_url(url)?).build()?;
    let res = svc.ready().await?.call(req).await?;
    read_greetings(res).await
}

/// Choose an instance explicitly, log where the call goes, then fetch.
pub async fn manual_greetings(
    lb: &LoadBalancer,
    client: &Client,
    service_id: &str,
    path: &str,
    strategy: Strategy,
) -> Result<Greetings, FetchError> {
    let instance = lb.choose(service_id, strategy)?;
    let url = format!("{}/{}", instance.uri(), path.trim_start_matches('/'));
    log::info!("{}", url);
    fetch_greetings(client, &url).await
}
