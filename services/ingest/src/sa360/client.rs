use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use tokio::sync::RwLock;

use adsync_common::error::{AdsyncError, AdsyncResult};
use adsync_config::{get_var, get_var_or};

use super::models::{CustomColumnMetadata, CustomColumnsResponse, SearchPage, TokenResponse};
use super::query::CUSTOMER_CLIENT_QUERY;

const DEFAULT_BASE_URL: &str = "https://searchads360.googleapis.com/v0";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Retry budget and backoff curve for rate-limited requests.
/// Delay for attempt N is `backoff_base_secs * 2^(N-1)`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub rate_limit_retries: u32,
    pub backoff_base_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_retries: 5,
            backoff_base_secs: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sa360ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub login_customer_id: String,
    pub submanager_account_ids: Vec<String>,
    pub base_url: String,
    pub token_url: String,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub backfill_start_date: String,
    pub retry: RetryConfig,
}

impl Sa360ClientConfig {
    /// Load SA360 config from environment. All Google credentials and the
    /// sub-manager id list are required; endpoints, timeouts and retry
    /// budgets have production defaults.
    pub fn from_env() -> AdsyncResult<Self> {
        let submanager_account_ids =
            parse_csv_account_ids(&get_var("SUBMANAGER_ACCOUNT_IDS")?)?;

        let timeout_secs = get_var_or("SA360_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|_| AdsyncError::Config("SA360_TIMEOUT_SECS must be an integer".into()))?;
        let page_size = get_var_or("SA360_PAGE_SIZE", "5000")
            .parse()
            .map_err(|_| AdsyncError::Config("SA360_PAGE_SIZE must be an integer".into()))?;
        let rate_limit_retries = get_var_or("SA360_RATE_LIMIT_RETRIES", "5")
            .parse()
            .map_err(|_| {
                AdsyncError::Config("SA360_RATE_LIMIT_RETRIES must be an integer".into())
            })?;

        Ok(Self {
            client_id: get_var("GOOGLE_CLIENT_ID")?,
            client_secret: get_var("GOOGLE_CLIENT_SECRET")?,
            refresh_token: get_var("GOOGLE_REFRESH_TOKEN")?,
            login_customer_id: get_var("GOOGLE_LOGIN_CUSTOMER_ID")?,
            submanager_account_ids,
            base_url: get_var_or("SA360_BASE_URL", DEFAULT_BASE_URL),
            token_url: get_var_or("SA360_TOKEN_URL", DEFAULT_TOKEN_URL),
            timeout_secs,
            page_size,
            backfill_start_date: get_var_or("SA360_BACKFILL_START_DATE", "2023-01-01"),
            retry: RetryConfig {
                rate_limit_retries,
                ..RetryConfig::default()
            },
        })
    }
}

/// Parse a comma-separated list of numeric account ids.
/// Entries are trimmed; blank entries dropped; a non-numeric entry or an
/// empty list is a configuration error.
pub fn parse_csv_account_ids(raw: &str) -> AdsyncResult<Vec<String>> {
    let ids: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect();

    if ids.is_empty() {
        return Err(AdsyncError::Config(
            "SUBMANAGER_ACCOUNT_IDS contains no account ids".into(),
        ));
    }
    for id in &ids {
        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AdsyncError::Config(format!(
                "SUBMANAGER_ACCOUNT_IDS entry {id:?} is not numeric"
            )));
        }
    }
    Ok(ids)
}

#[derive(Debug, thiserror::Error)]
pub enum Sa360ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limit retries exhausted after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    DataShape(String),
}

type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type SleepFn = Arc<dyn Fn(Duration) -> SleepFuture + Send + Sync>;

/// Authenticated SA360 gateway. The `login-customer-id` header is installed
/// at build time; the bearer token lives in a shared slot that a 401-triggered
/// refresh swaps in place, so every later request on this client sees the new
/// token. The backoff sleep is an injectable hook so tests can assert the
/// delay sequence without waiting on a clock.
#[derive(Clone)]
pub struct Sa360Client {
    http: Client,
    config: Sa360ClientConfig,
    access_token: Arc<RwLock<String>>,
    sleep: SleepFn,
}

impl Sa360Client {
    pub fn new(config: Sa360ClientConfig) -> Result<Self, Sa360ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "login-customer-id",
            HeaderValue::from_str(&config.login_customer_id)
                .map_err(|e| Sa360ClientError::Auth(format!("invalid login customer id: {e}")))?,
        );

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            config,
            access_token: Arc::new(RwLock::new(String::new())),
            sleep: Arc::new(|d: Duration| -> SleepFuture { Box::pin(tokio::time::sleep(d)) }),
        })
    }

    pub fn config(&self) -> &Sa360ClientConfig {
        &self.config
    }

    /// For testing: point at a wiremock server.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    /// For testing: point the token exchange at a wiremock server.
    #[cfg(test)]
    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.config.token_url = token_url.to_string();
        self
    }

    /// For testing: replace the backoff sleep with a recorder that completes
    /// immediately and logs each requested delay in seconds.
    #[cfg(test)]
    pub fn with_recorded_sleeps(
        mut self,
        delays: Arc<std::sync::Mutex<Vec<u64>>>,
    ) -> Self {
        self.sleep = Arc::new(move |d: Duration| -> SleepFuture {
            delays.lock().expect("delay recorder poisoned").push(d.as_secs());
            Box::pin(std::future::ready(()))
        });
        self
    }

    /// Exchange the refresh token for a fresh access token and swap it into
    /// the shared slot.
    async fn refresh_access_token(&self) -> Result<(), Sa360ClientError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Sa360ClientError::Auth(format!(
                "token refresh failed with {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        *self.access_token.write().await = token.access_token;
        Ok(())
    }

    async fn bearer_token(&self) -> Result<String, Sa360ClientError> {
        {
            let token = self.access_token.read().await;
            if !token.is_empty() {
                return Ok(token.clone());
            }
        }
        self.refresh_access_token().await?;
        Ok(self.access_token.read().await.clone())
    }

    /// Issue one logical request: refresh the token at most once on 401,
    /// back off exponentially on 429 (1 s, 2 s, 4 s, ...) within the
    /// configured budget, and fail fast on every other non-2xx.
    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, Sa360ClientError> {
        let mut auth_retried = false;
        let mut rate_limit_attempt: u32 = 0;

        loop {
            let token = self.bearer_token().await?;

            let mut request = self.http.request(method.clone(), url).bearer_auth(token);
            if let Some(json) = body {
                request = request.json(json);
            }
            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED {
                if auth_retried {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Sa360ClientError::Auth(format!(
                        "still unauthorized after token refresh: {body}"
                    )));
                }
                tracing::warn!(url, "401 from SA360, refreshing access token");
                self.refresh_access_token().await?;
                auth_retried = true;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limit_attempt += 1;
                if rate_limit_attempt > self.config.retry.rate_limit_retries {
                    return Err(Sa360ClientError::RateLimitExceeded {
                        attempts: rate_limit_attempt,
                    });
                }
                // Clamp the shift so an oversized retry budget cannot
                // overflow the delay arithmetic.
                let exponent = std::cmp::min(rate_limit_attempt - 1, 30);
                let delay = self
                    .config
                    .retry
                    .backoff_base_secs
                    .saturating_mul(1u64 << exponent);
                tracing::warn!(
                    attempt = rate_limit_attempt,
                    delay_secs = delay,
                    "rate limited by SA360, backing off"
                );
                (self.sleep)(Duration::from_secs(delay)).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(Sa360ClientError::Http { status, body });
        }
    }

    fn search_url(&self, customer_id: &str) -> String {
        format!(
            "{}/customers/{}/searchAds360:search",
            self.config.base_url, customer_id
        )
    }

    /// List the client account ids visible under a manager account.
    /// An empty hierarchy result is an empty list.
    pub async fn fetch_customer_clients(
        &self,
        submanager_id: &str,
    ) -> Result<Vec<String>, Sa360ClientError> {
        let body = serde_json::json!({ "query": CUSTOMER_CLIENT_QUERY });
        let response = self
            .send_with_retry(Method::POST, &self.search_url(submanager_id), Some(&body))
            .await?;

        let page: SearchPage = response.json().await?;
        page.results
            .into_iter()
            .map(|row| {
                row.customer_client.map(|c| c.id).ok_or_else(|| {
                    Sa360ClientError::DataShape(
                        "hierarchy result row missing customerClient".into(),
                    )
                })
            })
            .collect()
    }

    /// Fetch the custom-column definitions for one customer.
    pub async fn fetch_custom_columns(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CustomColumnMetadata>, Sa360ClientError> {
        let url = format!(
            "{}/customers/{}/customColumns",
            self.config.base_url, customer_id
        );
        let response = self.send_with_retry(Method::GET, &url, None).await?;
        let parsed: CustomColumnsResponse = response.json().await?;
        Ok(parsed.custom_columns)
    }

    /// Fetch one page from the search endpoint.
    pub async fn search_page(
        &self,
        customer_id: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<SearchPage, Sa360ClientError> {
        let mut body = serde_json::json!({
            "query": query,
            "pageSize": self.config.page_size,
        });
        if let Some(token) = page_token {
            body["pageToken"] = serde_json::Value::String(token.to_string());
        }

        let response = self
            .send_with_retry(Method::POST, &self.search_url(customer_id), Some(&body))
            .await?;
        Ok(response.json().await?)
    }
}
