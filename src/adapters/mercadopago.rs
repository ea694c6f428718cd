use {
    crate::domain::{
        BoxFuture,
        error::PipelineError,
        gateway::{
            CreatedIntent, FetchedOrder, FetchedPayment, GatewayPaymentStatus, IntentRequest,
            OrderPayment, PaymentGateway,
        },
        id::GatewayPaymentId,
        money::MoneyAmount,
    },
    reqwest::{Client, StatusCode},
    serde::{Deserialize, de::DeserializeOwned},
    std::time::Duration,
};

pub const DEFAULT_BASE_URL: &str = "https://api.mercadopago.com";

/// REST client for the Mercado Pago checkout and payments API.
pub struct MercadoPagoGateway {
    http: Client,
    base_url: String,
    access_token: String,
    currency_id: String,
}

#[derive(Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: serde_json::Value,
    status: String,
    status_detail: Option<String>,
    transaction_amount: Option<f64>,
    external_reference: Option<String>,
}

#[derive(Deserialize)]
struct OrderResponse {
    #[serde(default)]
    payments: Vec<OrderPaymentResponse>,
}

#[derive(Deserialize)]
struct OrderPaymentResponse {
    id: serde_json::Value,
    status: String,
}

/// Gateway ids arrive as JSON numbers or strings depending on the endpoint.
fn id_from_json(value: &serde_json::Value) -> Result<GatewayPaymentId, PipelineError> {
    match value {
        serde_json::Value::Number(n) => GatewayPaymentId::new(n.to_string()),
        serde_json::Value::String(s) => GatewayPaymentId::new(s.as_str()),
        other => Err(PipelineError::GatewayUnavailable(format!(
            "unexpected payment id: {other}"
        ))),
    }
}

impl MercadoPagoGateway {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        currency_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            currency_id: currency_id.into(),
        })
    }

    fn preference_body(&self, request: &IntentRequest) -> serde_json::Value {
        let items: Vec<serde_json::Value> = request
            .items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "id": item.id,
                    "title": item.title,
                    "quantity": item.quantity,
                    "unit_price": item.unit_price.as_major_units(),
                    "currency_id": self.currency_id,
                })
            })
            .collect();

        serde_json::json!({
            "items": items,
            "payer": {
                "name": request.payer.name,
                "email": request.payer.email,
            },
            "back_urls": request.back_urls,
            "auto_return": "approved",
            "notification_url": request.notification_url,
            "external_reference": request.external_reference,
            "expires": true,
            "expiration_date_to": request.expires_at.to_rfc3339(),
        })
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, PipelineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, what, &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PipelineError::GatewayUnavailable(format!("{what}: unreadable body: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T, PipelineError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| PipelineError::GatewayUnavailable(format!("{what}: {e}")))?;
        Self::read_json(response, what).await
    }
}

/// 404 is the only status callers act on. Every other failure is treated as
/// the gateway being unavailable, so callbacks get redelivered.
fn status_error(status: StatusCode, what: &str, body: &str) -> PipelineError {
    if status == StatusCode::NOT_FOUND {
        PipelineError::NotFound(what.to_string())
    } else {
        PipelineError::GatewayUnavailable(format!("{what}: gateway answered {status}: {body}"))
    }
}

impl PaymentGateway for MercadoPagoGateway {
    fn create_intent<'a>(
        &'a self,
        request: &'a IntentRequest,
    ) -> BoxFuture<'a, Result<CreatedIntent, PipelineError>> {
        Box::pin(async move {
            let response = self
                .http
                .post(format!("{}/checkout/preferences", self.base_url))
                .bearer_auth(&self.access_token)
                .json(&self.preference_body(request))
                .send()
                .await
                .map_err(|e| PipelineError::GatewayUnavailable(format!("create preference: {e}")))?;

            let created: PreferenceResponse = Self::read_json(response, "create preference").await?;
            Ok(CreatedIntent {
                gateway_intent_id: created.id,
                redirect_url: created.init_point,
            })
        })
    }

    fn fetch_payment<'a>(
        &'a self,
        payment_id: &'a GatewayPaymentId,
    ) -> BoxFuture<'a, Result<FetchedPayment, PipelineError>> {
        Box::pin(async move {
            let what = format!("payment {payment_id}");
            let payment: PaymentResponse = self
                .get(&format!("/v1/payments/{payment_id}"), &what)
                .await?;

            let amount = payment
                .transaction_amount
                .map(MoneyAmount::from_major_units)
                .transpose()?
                .unwrap_or(MoneyAmount::ZERO);

            Ok(FetchedPayment {
                id: id_from_json(&payment.id)?,
                status: GatewayPaymentStatus::from_gateway(&payment.status),
                status_detail: payment.status_detail,
                amount,
                external_reference: payment.external_reference.filter(|r| !r.is_empty()),
            })
        })
    }

    fn fetch_order<'a>(
        &'a self,
        order_id: &'a str,
    ) -> BoxFuture<'a, Result<FetchedOrder, PipelineError>> {
        Box::pin(async move {
            let what = format!("merchant order {order_id}");
            let order: OrderResponse = self
                .get(&format!("/merchant_orders/{order_id}"), &what)
                .await?;

            let payments = order
                .payments
                .iter()
                .map(|p| {
                    Ok(OrderPayment {
                        id: id_from_json(&p.id)?,
                        status: GatewayPaymentStatus::from_gateway(&p.status),
                    })
                })
                .collect::<Result<Vec<_>, PipelineError>>()?;

            Ok(FetchedOrder { payments })
        })
    }
}
