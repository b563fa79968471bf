//! Payment API
//!
//! Card tokenization, BIN lookup and payment submission against the remote
//! payment service.

use async_trait::async_trait;
use fitdesk_checkout::{
    CardDetails, IdempotencyKey, NewMembershipPayment, PaymentMethodId, PaymentRequestPayload,
    PaymentResponse, UpgradePayment, IDENTIFICATION_TYPE,
};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::Result;
use crate::http::{HttpClient, IDEMPOTENCY_HEADER};

/// Single-use token standing in for the card details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardToken {
    pub id: String,
}

/// Body of the tokenization call
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTokenRequest<'a> {
    pub card_number: &'a str,
    pub expiration_month: String,
    pub expiration_year: String,
    pub security_code: &'a str,
    pub cardholder_name: &'a str,
    pub identification_type: &'static str,
    pub identification_number: &'a str,
}

impl<'a> From<&'a CardDetails> for CardTokenRequest<'a> {
    fn from(card: &'a CardDetails) -> Self {
        Self {
            card_number: &card.card_number,
            expiration_month: card.expiry.month_str(),
            expiration_year: card.expiry.year_str(),
            security_code: &card.security_code,
            cardholder_name: &card.cardholder_name,
            identification_type: IDENTIFICATION_TYPE,
            identification_number: &card.identification_number,
        }
    }
}

/// Remote payment service
#[async_trait]
pub trait PaymentApi: Send + Sync {
    /// Exchange card details for a token
    async fn create_card_token(&self, card: &CardDetails) -> Result<CardToken>;

    /// Authoritative payment method id for a six-digit BIN
    async fn lookup_payment_method(&self, bin: &str) -> Result<PaymentMethodId>;

    /// Charge a new membership
    async fn process_payment(&self, payment: &NewMembershipPayment) -> Result<PaymentResponse>;

    /// Charge a plan upgrade
    async fn process_upgrade(&self, payment: &UpgradePayment) -> Result<PaymentResponse>;

    /// Route a payload to the matching endpoint
    async fn submit(&self, payload: &PaymentRequestPayload) -> Result<PaymentResponse> {
        match payload {
            PaymentRequestPayload::NewMembership(p) => self.process_payment(p).await,
            PaymentRequestPayload::Upgrade(p) => self.process_upgrade(p).await,
        }
    }

    fn name(&self) -> &str;
}

/// HTTP implementation of [`PaymentApi`]
#[derive(Clone, Debug)]
pub struct HttpPaymentApi {
    http: HttpClient,
}

impl HttpPaymentApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env())
    }

    async fn post_payment<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        key: &IdempotencyKey,
    ) -> Result<PaymentResponse> {
        let request = self
            .http
            .post(path, body)
            .header(IDEMPOTENCY_HEADER, key.as_str());

        let response: PaymentResponse = self.http.send_json(request).await?;

        tracing::info!(
            path = %path,
            status = %response.status.as_str(),
            idempotency_key = %key,
            "Payment processed"
        );

        Ok(response)
    }
}

#[async_trait]
impl PaymentApi for HttpPaymentApi {
    async fn create_card_token(&self, card: &CardDetails) -> Result<CardToken> {
        let body = CardTokenRequest::from(card);
        let request = self.http.post("payments/card-token", &body);

        let token: CardToken = self.http.send_json(request).await?;
        tracing::debug!(
            last_four = %fitdesk_checkout::last_four(&card.card_number),
            "Card tokenized"
        );

        Ok(token)
    }

    async fn lookup_payment_method(&self, bin: &str) -> Result<PaymentMethodId> {
        let request = self
            .http
            .get("payments/payment-methods")
            .query(&[("bin", bin)]);

        // Bare string, quoted as JSON or plain text
        let text = self.http.send_text(request).await?;
        let id = serde_json::from_str::<String>(&text)
            .unwrap_or_else(|_| text.trim().to_string());

        tracing::debug!(bin = %bin, payment_method = %id, "BIN lookup answered");

        Ok(PaymentMethodId::from_bin_lookup(id))
    }

    async fn process_payment(&self, payment: &NewMembershipPayment) -> Result<PaymentResponse> {
        self.post_payment("payments/process", payment, &payment.idempotency_key)
            .await
    }

    async fn process_upgrade(&self, payment: &UpgradePayment) -> Result<PaymentResponse> {
        self.post_payment("payments/upgrade", payment, &payment.idempotency_key)
            .await
    }

    fn name(&self) -> &str {
        "HttpPaymentApi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitdesk_checkout::Expiry;

    #[test]
    fn test_token_request_shape() {
        let card = CardDetails {
            card_number: "4111111111111111".into(),
            expiry: Expiry { year: 2028, month: 3 },
            security_code: "123".into(),
            cardholder_name: "Ana Torres".into(),
            identification_number: "30123456".into(),
            payment_method_id: PaymentMethodId::from_bin_lookup("visa"),
        };

        let json = serde_json::to_value(CardTokenRequest::from(&card)).unwrap();
        assert_eq!(json["expirationMonth"], "03");
        assert_eq!(json["expirationYear"], "2028");
        assert_eq!(json["identificationType"], "DNI");
        assert_eq!(json["cardNumber"], "4111111111111111");
    }
}
