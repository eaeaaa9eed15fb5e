use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::core::{app_error::AppError, config::PaymentsConfig};

/// Adapter for the hosted card-payment provider.
///
/// The provider implements the two-phase authorize/capture pattern: an intent
/// created with manual capture places a hold, `capture` settles it, `cancel`
/// releases it and `refund` reverses a settled charge.
#[derive(Clone)]
pub struct PaymentsClient {
    http: Client,
    api_url: String,
    secret_key: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub status: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_intent: String,
    pub payment_status: String,
}

#[derive(Serialize, Debug)]
struct CreateIntentReq<'a> {
    amount: i64,
    currency: &'a str,
    capture_method: &'a str,
    metadata: serde_json::Value,
}

impl PaymentsClient {
    pub fn new(http: Client, config: &PaymentsConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// Create a manual-capture authorization intent for the embedded payment
    /// form. The returned client secret is handed to the browser-side SDK.
    pub async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        consultation_id: Uuid,
    ) -> Result<PaymentIntent, AppError> {
        let intent: PaymentIntent = self
            .http
            .post(format!("{}/payment_intents", self.api_url))
            .bearer_auth(&self.secret_key)
            .json(&CreateIntentReq {
                amount: amount_cents,
                currency,
                capture_method: "manual",
                metadata: json!({ "consultation_id": consultation_id }),
            })
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("PaymentsProvider".into()))?
            .error_for_status()
            .context("Payment intent creation rejected")?
            .json()
            .await
            .context("Failed to parse payment intent response")?;

        Ok(intent)
    }

    /// Create a hosted checkout session pre-configured for manual capture.
    pub async fn create_checkout_session(
        &self,
        amount_cents: i64,
        currency: &str,
        consultation_id: Uuid,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, AppError> {
        let session: CheckoutSession = self
            .http
            .post(format!("{}/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "amount": amount_cents,
                "currency": currency,
                "capture_method": "manual",
                "success_url": success_url,
                "cancel_url": cancel_url,
                "metadata": { "consultation_id": consultation_id },
            }))
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("PaymentsProvider".into()))?
            .error_for_status()
            .context("Checkout session creation rejected")?
            .json()
            .await
            .context("Failed to parse checkout session response")?;

        Ok(session)
    }

    /// Re-query a hosted checkout session after the customer returns on-site.
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, AppError> {
        let session: CheckoutSession = self
            .http
            .get(format!("{}/checkout/sessions/{}", self.api_url, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("PaymentsProvider".into()))?
            .error_for_status()
            .context("Checkout session lookup rejected")?
            .json()
            .await
            .context("Failed to parse checkout session response")?;

        Ok(session)
    }

    pub async fn capture(&self, intent_id: &str) -> Result<(), AppError> {
        self.intent_action(intent_id, "capture").await
    }

    pub async fn cancel(&self, intent_id: &str) -> Result<(), AppError> {
        self.intent_action(intent_id, "cancel").await
    }

    pub async fn refund(&self, intent_id: &str) -> Result<(), AppError> {
        let _res = self
            .http
            .post(format!("{}/refunds", self.api_url))
            .bearer_auth(&self.secret_key)
            .json(&json!({ "payment_intent": intent_id }))
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("PaymentsProvider".into()))?
            .error_for_status()
            .context("Refund rejected")?;

        Ok(())
    }

    async fn intent_action(&self, intent_id: &str, action: &str) -> Result<(), AppError> {
        let _res = self
            .http
            .post(format!(
                "{}/payment_intents/{}/{}",
                self.api_url, intent_id, action
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("PaymentsProvider".into()))?
            .error_for_status()
            .with_context(|| format!("Payment intent {action} rejected"))?;

        Ok(())
    }
}
