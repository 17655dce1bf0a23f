use axum::{extract::Path, routing::get, Json, Router};
use greeting_lb::{
    api::{api_router, serve_api},
    balanced_client::{filtered_greetings, LoadBalancedClient, LoadBalancerLayer},
    config::{ClientConfig, ConsulSettings},
    discovery::{refresh, ConsulCatalog},
    error::{FetchError, LbError},
    fetch::{fetch_greeting, fetch_greetings, make_client, Greeting},
    load_balancer::{LoadBalancer, Strategy},
    runner::{run_client, run_styles},
    service_registry::{InstanceEntry, ServiceInstance, ServiceRegistry, StaticRegistry},
};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tower::ServiceBuilder;

fn spawn(app: Router) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_api(listener, app));
    addr
}

fn client() -> reqwest::Client {
    make_client(Duration::from_secs(5)).unwrap()
}

fn registry_for(addrs: &[SocketAddr]) -> Arc<StaticRegistry> {
    let registry = Arc::new(StaticRegistry::new());
    for a in addrs {
        registry.register(ServiceInstance::new("api", a.ip().to_string(), a.port()));
    }
    registry
}

#[tokio::test]
async fn fetch_decodes_single_greeting() {
    let addr = spawn(api_router("Hello, world!"));
    let url = format!("http://{}/greetings", addr);
    let greeting = fetch_greeting(&client(), &url).await.unwrap();
    assert_eq!(greeting, Greeting::new("Hello, world!"));
}

#[tokio::test]
async fn fetch_decodes_array_payload() {
    let app = Router::new().route(
        "/greetings",
        get(|| async { Json(json!([{"greeting": "a"}, {"greeting": "b"}])) }),
    );
    let addr = spawn(app);
    let got: Vec<_> = fetch_greetings(&client(), &format!("http://{}/greetings", addr))
        .await
        .unwrap()
        .collect();
    assert_eq!(got, vec![Greeting::new("a"), Greeting::new("b")]);
}

#[tokio::test]
async fn fetch_reports_non_success_status() {
    let addr = spawn(api_router("hi"));
    let err = fetch_greetings(&client(), &format!("http://{}/nope", addr))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn fetch_reports_connection_failure() {
    // bind then drop so nothing is listening on the port
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let err = fetch_greetings(&client(), &format!("http://{}/greetings", addr))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Request(_)));
}

#[tokio::test]
async fn configured_client_cycles_instances() {
    let first = spawn(api_router("one"));
    let second = spawn(api_router("two"));
    let lb = Arc::new(LoadBalancer::new(registry_for(&[first, second])));
    let http = LoadBalancedClient::new(client(), lb).strategy(Strategy::RoundRobin);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let g = http.get_greetings("http://api/greetings").await.unwrap().next().unwrap();
        seen.push(g.greeting);
    }
    assert_eq!(seen, vec!["one", "two", "one"]);
}

#[tokio::test]
async fn filter_layer_rewrites_logical_host() {
    let addr = spawn(api_router("filtered"));
    let lb = Arc::new(LoadBalancer::new(registry_for(&[addr])));
    let http = client();
    let mut svc = ServiceBuilder::new()
        .layer(LoadBalancerLayer::new(lb, Strategy::Random))
        .service(http.clone());

    let got: Vec<_> = filtered_greetings(&mut svc, &http, "http://api/greetings")
        .await
        .unwrap()
        .collect();
    assert_eq!(got, vec![Greeting::new("filtered")]);
}

#[tokio::test]
async fn filter_layer_without_instances_fails_fast() {
    let lb = Arc::new(LoadBalancer::new(Arc::new(StaticRegistry::new())));
    let http = client();
    let mut svc = ServiceBuilder::new()
        .layer(LoadBalancerLayer::new(lb, Strategy::Random))
        .service(http.clone());

    let err = filtered_greetings(&mut svc, &http, "http://api/greetings")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NoInstance(LbError::NoInstanceAvailable { .. })));
}

#[tokio::test]
async fn every_style_reaches_the_api() {
    let addr = spawn(api_router("Hello, world!"));
    let lb = Arc::new(LoadBalancer::new(registry_for(&[addr])));
    let report = run_styles(lb, client(), "api", "/greetings").await;

    let expected = vec![Greeting::new("Hello, world!")];
    assert_eq!(report.configured.unwrap(), expected);
    assert_eq!(report.filter.unwrap(), expected);
    assert_eq!(report.manual.unwrap(), expected);
}

#[tokio::test]
async fn run_client_uses_configured_instances() {
    let addr = spawn(api_router("from config"));
    let cfg = ClientConfig {
        instances: HashMap::from([(
            "api".to_string(),
            vec![InstanceEntry {
                host: addr.ip().to_string(),
                port: addr.port(),
                metadata: HashMap::new(),
            }],
        )]),
        ..ClientConfig::default()
    };
    let report = run_client(&cfg).await.unwrap();
    assert_eq!(report.manual.unwrap(), vec![Greeting::new("from config")]);
}

#[tokio::test]
async fn consul_catalog_feeds_registry() {
    let api_addr = spawn(api_router("discovered"));
    let catalog = Router::new().route(
        "/v1/catalog/service/:id",
        get(move |Path(id): Path<String>| async move {
            let body: Value = if id == "api" {
                json!([{
                    "Address": api_addr.ip().to_string(),
                    "ServiceAddress": "",
                    "ServicePort": api_addr.port(),
                    "ServiceMeta": {}
                }])
            } else {
                json!([])
            };
            Json(body)
        }),
    );
    let consul_addr = spawn(catalog);

    let registry = Arc::new(StaticRegistry::new());
    let source = ConsulCatalog::new(client(), format!("http://{}", consul_addr));
    let ids = vec!["api".to_string(), "ghost".to_string()];
    assert_eq!(refresh(&source, &registry, &ids).await, 2);
    assert!(registry.list_instances("ghost").is_empty());

    let lb = Arc::new(LoadBalancer::new(registry));
    let http = LoadBalancedClient::new(client(), lb);
    let g = http.get_greetings("http://api/greetings").await.unwrap().next().unwrap();
    assert_eq!(g.greeting, "discovered");
}

#[tokio::test]
async fn run_client_stops_polling_catalog_when_done() {
    let api_addr = spawn(api_router("polled"));
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let catalog = Router::new().route(
        "/v1/catalog/service/:id",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!([{
                    "Address": api_addr.ip().to_string(),
                    "ServicePort": api_addr.port()
                }]))
            }
        }),
    );
    let consul_addr = spawn(catalog);

    let cfg = ClientConfig {
        instances: HashMap::new(),
        consul: Some(ConsulSettings {
            url: format!("http://{}", consul_addr),
            refresh_secs: 1,
        }),
        ..ClientConfig::default()
    };
    let report = run_client(&cfg).await.unwrap();
    assert_eq!(report.manual.unwrap(), vec![Greeting::new("polled")]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // a live watcher would have refreshed again after one period
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
