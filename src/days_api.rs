use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, StatusCode};
use hyper_rustls::HttpsConnector;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DaysApiConfig;
use crate::error::StoreError;
use crate::presence::DayKey;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A day as stored by the days API.
///
/// Country flags live next to any other field the service keeps (`world`, ...) in `fields`,
/// keyed by the lower-cased country name, so an upsert sends back everything it read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDay {
    pub day: DayKey,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RemoteDay {
    pub fn new(day: DayKey) -> Self {
        RemoteDay {
            day,
            note: String::new(),
            fields: Map::new(),
        }
    }

    /// Flags are stored as 0/1 by the service, booleans are accepted too.
    pub fn flag(&self, country: &str) -> bool {
        match self.fields.get(&field_name(country)) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        }
    }

    pub fn set_flag(&mut self, country: &str, present: bool) {
        let key = field_name(country);
        let value = match self.fields.get(&key) {
            Some(Value::Bool(_)) => Value::Bool(present),
            _ => Value::from(i64::from(present)),
        };
        self.fields.insert(key, value);
    }
}

fn field_name(country: &str) -> String {
    country.to_lowercase()
}

/// Remote record store keyed by day
#[async_trait]
pub trait DayStore: Send + Sync {
    /// `Ok(None)` when the service has no record for that day yet
    async fn get_day(&self, day: DayKey) -> Result<Option<RemoteDay>, StoreError>;

    async fn upsert_day(&self, day: &RemoteDay) -> Result<(), StoreError>;
}

/// HTTP client for the days API (`/days/{YYYY-MM-DD}`, basic auth)
pub struct DaysApiClient {
    client: Client<HttpsConnector<HttpConnector>>,
    base_url: String,
    authorization: String,
}

impl DaysApiClient {
    pub fn new(config: &DaysApiConfig) -> Self {
        info!("Days API client targeting {}", config.url);

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let credentials = general_purpose::STANDARD.encode(format!("{}:{}", config.username, config.password));

        DaysApiClient {
            client: Client::builder().build(connector),
            base_url: config.url.trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", credentials),
        }
    }

    fn day_url(&self, day: DayKey) -> String {
        format!("{}/days/{}", self.base_url, day)
    }

    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, hyper::body::Bytes), StoreError> {
        let exchange = async {
            let response = self.client
                .request(request)
                .await
                .map_err(|e| StoreError::Transport(e.to_string()))?;
            let status = response.status();
            let body = hyper::body::to_bytes(response.into_body())
                .await
                .map_err(|e| StoreError::Transport(format!("reading response body (code: {}): {}", status.as_u16(), e)))?;
            Ok::<_, StoreError>((status, body))
        };

        tokio::time::timeout(REQUEST_TIMEOUT, exchange)
            .await
            .map_err(|_| StoreError::Timeout(REQUEST_TIMEOUT.as_secs()))?
    }
}

#[async_trait]
impl DayStore for DaysApiClient {
    async fn get_day(&self, day: DayKey) -> Result<Option<RemoteDay>, StoreError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.day_url(day))
            .header(hyper::header::AUTHORIZATION, &self.authorization)
            .body(Body::empty())
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let (status, body) = self.send(request).await?;
        debug!("GET day {} -> {}", day, status);

        match status {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::OK => serde_json::from_slice(&body)
                .map(Some)
                .map_err(|e| StoreError::Decode(e.to_string())),
            _ => Err(StoreError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).to_string(),
            }),
        }
    }

    async fn upsert_day(&self, day: &RemoteDay) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(day).map_err(|e| StoreError::Encode(e.to_string()))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.day_url(day.day))
            .header(hyper::header::AUTHORIZATION, &self.authorization)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let (status, body) = self.send(request).await?;
        debug!("POST day {} -> {}", day.day, status);

        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).to_string(),
            });
        }

        Ok(())
    }
}
