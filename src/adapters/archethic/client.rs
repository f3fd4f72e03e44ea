//! Archethic Node Client - Rate-limited JSON-RPC and GraphQL Client
//!
//! Wraps reqwest with a request-rate limiter, a concurrency semaphore
//! and retries for the node's JSON-RPC (`/api/rpc`) and GraphQL
//! (`/api`) endpoints.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::config::ArchethicConfig;

/// UCO amounts are integers with 8 implied decimals.
pub const UCO_DECIMALS: u32 = 8;

/// Failures talking to an Archethic node.
#[derive(Debug, Error)]
pub enum RpcError {
  /// Connection, timeout or body decoding failure.
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),
  /// Non-success HTTP status that is not worth retrying.
  #[error("node returned HTTP {status}: {body}")]
  Status { status: StatusCode, body: String },
  /// JSON-RPC error object.
  #[error("JSON-RPC error {code}: {message}")]
  Rpc { code: i64, message: String },
  /// GraphQL `errors` array.
  #[error("GraphQL error: {0}")]
  GraphQl(String),
  /// Response parsed but lacked the expected payload.
  #[error("unexpected response shape: {0}")]
  Shape(String),
  /// Retryable failures persisted past the retry budget.
  #[error("gave up after {attempts} attempts: {last}")]
  Exhausted { attempts: u32, last: String },
  /// The client is shutting down.
  #[error("client closed")]
  Closed,
}

/// Configuration for the Archethic client.
#[derive(Debug, Clone)]
pub struct ArchethicClientConfig {
  /// Node base URL, without trailing slash.
  pub endpoint: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Sustained request rate.
  pub max_requests_per_second: NonZeroU32,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
}

impl ArchethicClientConfig {
  /// Derive client settings from the `[archethic]` section.
  pub fn from_config(config: &ArchethicConfig) -> Self {
    Self {
      endpoint: config.endpoint.trim_end_matches('/').to_string(),
      timeout: Duration::from_secs(config.timeout_seconds),
      max_concurrent: config.max_concurrent.max(1),
      max_requests_per_second: NonZeroU32::new(config.max_requests_per_second)
        .unwrap_or(NonZeroU32::MIN),
      max_retries: config.max_retries,
      retry_base_delay: Duration::from_millis(200),
    }
  }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
  code: i64,
  message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
  #[serde(default)]
  result: Option<Value>,
  #[serde(default)]
  error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
  #[serde(default)]
  data: Option<Value>,
  #[serde(default)]
  errors: Option<Vec<Value>>,
}

/// Rate-limited client for one Archethic node.
pub struct ArchethicClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: ArchethicClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request-rate limiter.
  limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
  /// JSON-RPC request id counter.
  next_id: AtomicU64,
}

impl ArchethicClient {
  /// Create a new Archethic client.
  pub fn new(config: ArchethicClientConfig) -> Result<Self, RpcError> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
    let limiter = RateLimiter::direct(Quota::per_second(config.max_requests_per_second));

    Ok(Self {
      http,
      config,
      semaphore,
      limiter,
      next_id: AtomicU64::new(1),
    })
  }

  /// Node base URL.
  pub fn endpoint(&self) -> &str {
    &self.config.endpoint
  }

  /// Call a public function of a smart contract (`contract_fun`).
  #[instrument(skip(self, args), fields(contract = %contract, function = %function))]
  pub async fn call_function(
    &self,
    contract: &str,
    function: &str,
    args: Vec<Value>,
  ) -> Result<Value, RpcError> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let body = json!({
      "jsonrpc": "2.0",
      "id": id,
      "method": "contract_fun",
      "params": {
        "contract": contract,
        "function": function,
        "args": args,
      },
    });

    let url = format!("{}/api/rpc", self.config.endpoint);
    let payload = self.execute_with_retry(self.http.post(&url).json(&body)).await?;

    let response: RpcResponse = serde_json::from_value(payload)
      .map_err(|e| RpcError::Shape(format!("JSON-RPC envelope: {e}")))?;

    if let Some(error) = response.error {
      return Err(RpcError::Rpc {
        code: error.code,
        message: error.message,
      });
    }

    response
      .result
      .ok_or_else(|| RpcError::Shape("JSON-RPC response without result".to_string()))
  }

  /// Run a GraphQL query and return its `data` object.
  #[instrument(skip(self, query))]
  pub async fn graphql(&self, query: &str) -> Result<Value, RpcError> {
    let url = format!("{}/api", self.config.endpoint);
    let payload = self
      .execute_with_retry(self.http.post(&url).json(&json!({ "query": query })))
      .await?;

    let response: GraphQlResponse = serde_json::from_value(payload)
      .map_err(|e| RpcError::Shape(format!("GraphQL envelope: {e}")))?;

    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
      return Err(RpcError::GraphQl(Value::Array(errors).to_string()));
    }

    response
      .data
      .ok_or_else(|| RpcError::Shape("GraphQL response without data".to_string()))
  }

  /// UCO balance of `address`, scaled to whole UCO.
  pub async fn uco_balance(&self, address: &str) -> Result<Decimal, RpcError> {
    let query = format!("query {{ balance(address: \"{address}\") {{ uco }} }}");
    let data = self.graphql(&query).await?;
    parse_uco(&data["balance"]["uco"])
  }

  /// Execute request with rate limiting, concurrency limit and retries.
  async fn execute_with_retry(&self, request: RequestBuilder) -> Result<Value, RpcError> {
    let _permit = self.semaphore.acquire().await.map_err(|_| RpcError::Closed)?;

    let mut last_error = String::new();

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis(), "Retrying request");
        sleep(delay).await;
      }

      self.limiter.until_ready().await;

      let req = request
        .try_clone()
        .ok_or_else(|| RpcError::Shape("request body is not cloneable".to_string()))?;

      match req.send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => return Ok(response.json().await?),
          StatusCode::TOO_MANY_REQUESTS => {
            warn!("Rate limited by Archethic node, backing off");
            sleep(Duration::from_secs(2)).await;
            last_error = "rate limited".to_string();
          }
          status if status.is_server_error() => {
            warn!(status = %status, "Server error, retrying");
            last_error = format!("server error: {status}");
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Status { status, body });
          }
        },
        Err(e) => {
          warn!(error = %e, attempt, "Request failed");
          last_error = e.to_string();
        }
      }
    }

    Err(RpcError::Exhausted {
      attempts: self.config.max_retries + 1,
      last: last_error,
    })
  }

  /// Check if the node is reachable.
  pub async fn health_check(&self) -> bool {
    self.graphql("query { version { protocol } }").await.is_ok()
  }
}

/// Decode a GraphQL UCO amount (integer, possibly sent as a string).
fn parse_uco(value: &Value) -> Result<Decimal, RpcError> {
  let raw = match value {
    Value::Number(n) => n
      .as_u64()
      .ok_or_else(|| RpcError::Shape(format!("UCO amount is not an integer: {n}")))?,
    Value::String(s) => s
      .parse()
      .map_err(|_| RpcError::Shape(format!("UCO amount is not an integer: {s}")))?,
    Value::Null => 0,
    other => return Err(RpcError::Shape(format!("UCO amount has wrong type: {other}"))),
  };
  Ok(Decimal::from_i128_with_scale(i128::from(raw), UCO_DECIMALS))
}
