//! HTTP client for the CLOB venue.
//!
//! Read endpoints are unauthenticated; order submission, listing, and
//! cancellation carry the keyed L2 headers. Transient venue failures
//! (rate limits, 5xx) get a short bounded retry with doubling delay.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, VenueError};
use crate::venue::auth::{
    sign_request, CredentialOrigin, SigningIdentity, VenueAuthSigner, VenueCredential,
};
use crate::venue::order::SubmittableOrder;
use crate::venue::{Market, VenueApi};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Transient failure classes worth a retry: rate limits, server errors,
/// and a 403 coming from the edge proxy rather than the venue itself.
fn retryable(status: reqwest::StatusCode, headers: &reqwest::header::HeaderMap) -> bool {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return true;
    }
    status == reqwest::StatusCode::FORBIDDEN && from_edge_proxy(headers)
}

/// Cloudflare blocks answer with its own headers; a venue-issued 403
/// (a genuine authorization failure) carries none of them.
fn from_edge_proxy(headers: &reqwest::header::HeaderMap) -> bool {
    if headers.contains_key("cf-ray") || headers.contains_key("cf-mitigated") {
        return true;
    }
    headers
        .get(reqwest::header::SERVER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|server| server.eq_ignore_ascii_case("cloudflare"))
}

/// A resting order as reported by the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    #[serde(default)]
    pub status: String,
    /// Condition id of the market the order rests in.
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub original_size: String,
    #[serde(default)]
    pub size_matched: String,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(alias = "orderID", alias = "orderId")]
    order_id: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "errorMsg")]
    error_msg: Option<String>,
}

/// Concrete [`VenueApi`] over the venue's HTTP surface.
pub struct VenueClient {
    http: reqwest::Client,
    api_url: String,
    auth: VenueAuthSigner,
}

impl VenueClient {
    #[must_use]
    pub fn new(api_url: &str) -> Self {
        let http = reqwest::Client::new();
        Self {
            auth: VenueAuthSigner::new(http.clone(), api_url),
            api_url: api_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Send a request, retrying rate limits, server errors, and edge-proxy
    /// blocks a bounded number of times with doubling delay.
    async fn send_with_retry(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut delay = RETRY_BASE_DELAY;
        for attempt in 1..RETRY_ATTEMPTS {
            let Some(cloned) = request.try_clone() else {
                break;
            };
            let response = cloned.send().await?;
            if !retryable(response.status(), response.headers()) {
                return Ok(response);
            }
            warn!(status = %response.status(), attempt, "Venue request throttled or blocked, retrying");
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
        Ok(request.send().await?)
    }

    /// Build an authenticated request: body plus L2 headers over
    /// `timestamp ∥ method ∥ path ∥ body`.
    fn signed(
        &self,
        credential: &VenueCredential,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::RequestBuilder> {
        let serialized = match &body {
            Some(value) => value.to_string(),
            None => String::new(),
        };
        let timestamp = chrono::Utc::now().timestamp();
        let headers = sign_request(credential, method.as_str(), path, &serialized, timestamp)?;

        let mut request = self
            .http
            .request(method, format!("{}{path}", self.api_url));
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(value) = body {
            request = request.json(&value);
        }
        Ok(request)
    }

    async fn rejection(path: &str, response: reqwest::Response) -> VenueError {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        VenueError::OrderRejected {
            detail: format!("{path} returned {status}: {detail}"),
        }
    }

    /// List the caller's resting orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderRejected` on a non-success status.
    pub async fn open_orders(&self, credential: &VenueCredential) -> Result<Vec<OpenOrder>> {
        let request = self.signed(credential, reqwest::Method::GET, "/data/orders", None)?;
        let response = self.send_with_retry(request).await?;
        if !response.status().is_success() {
            return Err(Self::rejection("/data/orders", response).await.into());
        }
        Ok(response.json().await?)
    }

    /// Cancel one resting order by id.
    ///
    /// # Errors
    ///
    /// Returns `OrderRejected` when the venue refuses the cancellation.
    pub async fn cancel_order(&self, credential: &VenueCredential, order_id: &str) -> Result<()> {
        let body = serde_json::json!({ "orderID": order_id });
        let request = self.signed(credential, reqwest::Method::DELETE, "/order", Some(body))?;
        let response = self.send_with_retry(request).await?;
        if !response.status().is_success() {
            return Err(Self::rejection("/order", response).await.into());
        }
        debug!(order_id, "Order cancelled");
        Ok(())
    }
}

#[async_trait]
impl VenueApi for VenueClient {
    async fn market(&self, condition_id: &str) -> Result<Market> {
        let request = self
            .http
            .get(format!("{}/markets/{condition_id}", self.api_url));
        let response = self.send_with_retry(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VenueError::MalformedResponse {
                endpoint: format!("/markets/{condition_id}"),
                reason: format!("status {status}"),
            }
            .into());
        }
        response
            .json()
            .await
            .map_err(|e| {
                VenueError::MalformedResponse {
                    endpoint: format!("/markets/{condition_id}"),
                    reason: e.to_string(),
                }
                .into()
            })
    }

    async fn best_bid(&self, token_id: &str) -> Result<Decimal> {
        let request = self
            .http
            .get(format!("{}/price", self.api_url))
            .query(&[("token_id", token_id), ("side", "BUY")]);
        let response = self.send_with_retry(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VenueError::MalformedResponse {
                endpoint: "/price".to_string(),
                reason: format!("status {status}"),
            }
            .into());
        }
        let body: PriceResponse = response.json().await.map_err(|e| {
            VenueError::MalformedResponse {
                endpoint: "/price".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(body.price)
    }

    async fn derive_credential(
        &self,
        identity: &SigningIdentity,
    ) -> Result<(VenueCredential, CredentialOrigin)> {
        self.auth.derive_credential(identity).await
    }

    async fn submit_order(
        &self,
        credential: &VenueCredential,
        order: &SubmittableOrder,
    ) -> Result<String> {
        let body = order.payload(&credential.api_key);
        let request = self.signed(credential, reqwest::Method::POST, "/order", Some(body))?;
        let response = self.send_with_retry(request).await?;

        if !response.status().is_success() {
            return Err(Self::rejection("/order", response).await.into());
        }

        let body: SubmitResponse = response.json().await.map_err(|e| {
            VenueError::MalformedResponse {
                endpoint: "/order".to_string(),
                reason: e.to_string(),
            }
        })?;

        if body.success == Some(false) {
            return Err(VenueError::OrderRejected {
                detail: body
                    .error_msg
                    .unwrap_or_else(|| "venue reported failure without detail".to_string()),
            }
            .into());
        }
        body.order_id.ok_or_else(|| {
            VenueError::MalformedResponse {
                endpoint: "/order".to_string(),
                reason: "response carried no order id".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_response_accepts_both_id_spellings() {
        let a: SubmitResponse =
            serde_json::from_str(r#"{"orderID":"0xabc","success":true}"#).unwrap();
        assert_eq!(a.order_id.as_deref(), Some("0xabc"));

        let b: SubmitResponse = serde_json::from_str(r#"{"orderId":"0xdef"}"#).unwrap();
        assert_eq!(b.order_id.as_deref(), Some("0xdef"));
    }

    #[test]
    fn submit_response_surfaces_error_message() {
        let rejected: SubmitResponse =
            serde_json::from_str(r#"{"success":false,"errorMsg":"not enough balance"}"#).unwrap();
        assert_eq!(rejected.success, Some(false));
        assert_eq!(rejected.error_msg.as_deref(), Some("not enough balance"));
    }

    #[test]
    fn price_response_parses_decimal_strings() {
        let body: PriceResponse = serde_json::from_str(r#"{"price":"0.54"}"#).unwrap();
        assert_eq!(body.price.to_string(), "0.54");
    }

    #[test]
    fn retry_covers_rate_limits_server_errors_and_edge_blocks() {
        use reqwest::header::HeaderMap;
        use reqwest::StatusCode;

        let plain = HeaderMap::new();
        assert!(retryable(StatusCode::TOO_MANY_REQUESTS, &plain));
        assert!(retryable(StatusCode::INTERNAL_SERVER_ERROR, &plain));
        assert!(retryable(StatusCode::BAD_GATEWAY, &plain));

        // A 403 from the edge proxy is transient; one from the venue is not
        let mut edge = HeaderMap::new();
        edge.insert("cf-ray", "8d3c1234abcd-EWR".parse().unwrap());
        assert!(retryable(StatusCode::FORBIDDEN, &edge));

        let mut cloudflare = HeaderMap::new();
        cloudflare.insert(reqwest::header::SERVER, "cloudflare".parse().unwrap());
        assert!(retryable(StatusCode::FORBIDDEN, &cloudflare));

        assert!(!retryable(StatusCode::FORBIDDEN, &plain));
        assert!(!retryable(StatusCode::NOT_FOUND, &plain));
        assert!(!retryable(StatusCode::BAD_REQUEST, &edge));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = VenueClient::new("https://clob.example.org/");
        assert_eq!(client.api_url, "https://clob.example.org");
    }
}
