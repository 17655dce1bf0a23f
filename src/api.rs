// src/api.rs
use crate::{config::ApiConfig, fetch::Greeting, middleware::with_api_middleware};
use axum::{extract::State, routing::get, Json, Router};
use std::{io, net::TcpListener, sync::Arc, time::Duration};

pub const GREETINGS_PATH: &str = "/greetings";

async fn greetings(State(greeting): State<Arc<Greeting>>) -> Json<Greeting> {
    Json(greeting.as_ref().clone())
}

/// Router answering `GET /greetings` with a fixed greeting.
pub fn api_router(greeting: impl Into<String>) -> Router {
    Router::new()
        .route(GREETINGS_PATH, get(greetings))
        .with_state(Arc::new(Greeting::new(greeting)))
}

/// Serve `app` on an already bound listener.
pub async fn serve_api(listener: TcpListener, app: Router) -> io::Result<()> {
    listener.set_nonblocking(true)?;
    log::info!("api listening on http://{}", listener.local_addr()?);
    let listener = tokio::net::TcpListener::from_std(listener)?;
    axum::serve(listener, app.into_make_service()).await
}

/// Run the api service described by `cfg`
pub async fn run_api(cfg: &ApiConfig) -> io::Result<()> {
    let listener = TcpListener::bind(cfg.listen)?;
    let app = with_api_middleware(
        api_router(cfg.greeting.clone()),
        Duration::from_secs(cfg.request_timeout_secs),
    );
    serve_api(listener, app).await
}
