// src/fetch.rs
use crate::error::FetchError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Greeting payload exchanged between api and client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    #[serde(alias = "greetings")]
    pub greeting: String,
}

impl Greeting {
    pub fn new(text: impl Into<String>) -> Self {
        Greeting { greeting: text.into() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    One(Greeting),
    Many(Vec<Greeting>),
}

/// Decoded records of one response, handed out once.
pub type Greetings = std::vec::IntoIter<Greeting>;

/// Shared reqwest client
pub fn make_client(timeout: Duration) -> Result<Client, FetchError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Decode a response body that holds either one greeting or an array of them.
pub fn decode_greetings(url: &str, body: &[u8]) -> Result<Greetings, FetchError> {
    let payload: Payload = serde_json::from_slice(body)
        .map_err(|source| FetchError::Decode { url: url.to_string(), source })?;
    let records = match payload {
        Payload::One(g) => vec![g],
        Payload::Many(gs) => gs,
    };
    Ok(records.into_iter())
}

/// Turn a finished response into greetings, failing on non-2xx.
pub async fn read_greetings(res: reqwest::Response) -> Result<Greetings, FetchError> {
    let url = res.url().to_string();
    let status = res.status();
    if !status.is_success() {
        return Err(FetchError::Status { url, status });
    }
    let body = res.bytes().await?;
    decode_greetings(&url, &body)
}

/// GET `url` and decode the greeting records it returns.
pub async fn fetch_greetings(client: &Client, url: &str) -> Result<Greetings, FetchError> {
    log::debug!("GET {}", url);
    let res = client.get(url).send().await?;
    read_greetings(res).await
}

/// GET `url` and keep only the first greeting.
pub async fn fetch_greeting(client: &Client, url: &str) -> Result<Greeting, FetchError> {
    fetch_greetings(client, url)
        .await?
        .next()
        .ok_or_else(|| FetchError::Empty { url: url.to_string() })
}
