use std::{sync::Arc, time::Duration};

use log::*;
use mkt_common::{Money, Secret};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Response,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use settlement_engine::traits::{ChargeRequest, PaymentMetadata, PaymentProcessor, ProcessorCharge, ProcessorError};

use crate::{config::PaymentApiConfig, errors::ServerError, helpers::calculate_signature};

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
/// Backstop for a single HTTP call. The payment gateway applies its own, usually shorter, timeout on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A payment processor that speaks JSON over HTTPS.
///
/// Every request body is signed with HMAC-SHA256 using the configured signing secret, and the signature is sent in
/// the `X-Signature` header. The checkout id goes in the `Idempotency-Key` header, so the processor never charges
/// the same checkout twice.
#[derive(Clone)]
pub struct HttpPaymentProcessor {
    base_url: String,
    signing_secret: Secret<String>,
    client: Arc<Client>,
}

impl HttpPaymentProcessor {
    pub fn new(config: &PaymentApiConfig) -> Result<Self, ServerError> {
        let mut headers = HeaderMap::with_capacity(2);
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| ServerError::InitializeError(format!("Invalid payment API key. {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        let base_url = config.api_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, signing_secret: config.signing_secret.clone(), client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        metadata: &PaymentMetadata,
    ) -> Result<T, ProcessorError> {
        let response = self.send(path, body, metadata).await?;
        response.json::<T>().await.map_err(|e| ProcessorError::Transient(format!("unreadable response. {e}")))
    }

    async fn send<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        metadata: &PaymentMetadata,
    ) -> Result<Response, ProcessorError> {
        let url = self.url(path);
        let body = serde_json::to_vec(body).map_err(|e| ProcessorError::Invalid(e.to_string()))?;
        let signature = calculate_signature(self.signing_secret.reveal(), &body);
        trace!("💳 POST {url} for checkout {}", metadata.checkout_id);
        let response = self
            .client
            .post(&url)
            .header(SIGNATURE_HEADER, signature)
            .header(IDEMPOTENCY_HEADER, metadata.checkout_id.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProcessorError::Timeout
                } else {
                    ProcessorError::Transient(e.to_string())
                }
            })?;
        let status = response.status();
        if status.is_success() {
            trace!("💳 {url} responded with {status}");
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            debug!("💳 {url} responded with {status}. {message}");
            Err(classify_status(status, message))
        }
    }
}

/// Maps a non-success status from the processor onto a [`ProcessorError`]. Only failures that might go away on their
/// own are transient.
pub fn classify_status(status: StatusCode, message: String) -> ProcessorError {
    match status.as_u16() {
        402 => ProcessorError::Declined(message),
        400 | 422 => ProcessorError::Invalid(message),
        408 | 429 => ProcessorError::Transient(format!("{status}: {message}")),
        s if (500..600).contains(&s) => ProcessorError::Transient(format!("{status}: {message}")),
        _ => ProcessorError::Invalid(format!("unexpected response {status}: {message}")),
    }
}

#[derive(Serialize)]
struct RefundBody<'a> {
    amount: Money,
    metadata: &'a PaymentMetadata,
}

#[derive(Serialize)]
struct ConfirmBody<'a> {
    metadata: &'a PaymentMetadata,
}

impl PaymentProcessor for HttpPaymentProcessor {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProcessorCharge, ProcessorError> {
        self.post("/charges", request, &request.metadata).await
    }

    async fn confirm_charge(
        &self,
        charge_id: &str,
        metadata: &PaymentMetadata,
    ) -> Result<ProcessorCharge, ProcessorError> {
        self.post(&format!("/charges/{charge_id}/confirm"), &ConfirmBody { metadata }, metadata).await
    }

    async fn refund_charge(
        &self,
        reference: &str,
        amount: Money,
        metadata: &PaymentMetadata,
    ) -> Result<(), ProcessorError> {
        self.send(&format!("/charges/{reference}/refunds"), &RefundBody { amount, metadata }, metadata).await?;
        Ok(())
    }
}
