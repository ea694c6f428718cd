use {
    super::registry::IntentRegistry,
    crate::domain::{
        error::PipelineError,
        gateway::{BackUrls, IntentItem, IntentRequest, Payer, PaymentGateway},
        id::ExternalReference,
        intent::AttendeeInput,
        money::MoneyAmount,
    },
    chrono::{Duration, Utc},
    serde::{Deserialize, Serialize},
    std::sync::Arc,
    uuid::Uuid,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub event_id: Uuid,
    pub attendees: Vec<AttendeeInput>,
    /// Signed so that non-positive quantities reach validation.
    pub requested_quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub external_reference: ExternalReference,
    pub redirect_url: String,
}

/// URLs handed to the gateway: where to send the buyer back, and where to
/// deliver callbacks.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub public_base_url: String,
}

impl CheckoutUrls {
    fn back_urls(&self, reference: &ExternalReference) -> BackUrls {
        let base = self.public_base_url.trim_end_matches('/');
        let page = |outcome: &str| format!("{base}/checkout/{outcome}?reference={reference}");
        BackUrls {
            success: page("success"),
            failure: page("failure"),
            pending: page("pending"),
        }
    }

    fn notification_url(&self) -> String {
        format!("{}/webhooks/gateway", self.public_base_url.trim_end_matches('/'))
    }
}

pub struct CheckoutService {
    registry: IntentRegistry,
    gateway: Arc<dyn PaymentGateway>,
    urls: CheckoutUrls,
    expiry: Duration,
}

impl CheckoutService {
    pub fn new(
        registry: IntentRegistry,
        gateway: Arc<dyn PaymentGateway>,
        urls: CheckoutUrls,
        expiry: Duration,
    ) -> Self {
        Self {
            registry,
            gateway,
            urls,
            expiry,
        }
    }

    /// Persist a pending intent, then ask the gateway for a payment intent.
    /// If the gateway call fails the intent stays pending with no gateway id.
    pub async fn start(
        &self,
        request: CheckoutRequest,
        actor: &str,
    ) -> Result<CheckoutResponse, PipelineError> {
        let event = self
            .registry
            .store()
            .event(request.event_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("event {}", request.event_id)))?;

        let intent = self
            .registry
            .create(
                &event,
                request.attendees,
                request.requested_quantity,
                actor,
            )
            .await?;

        let payer = intent
            .attendees
            .first()
            .map(|a| Payer {
                name: a.name.clone(),
                email: a.email.clone(),
            })
            .ok_or_else(|| PipelineError::Validation("at least one attendee is required".into()))?;

        // Price as recorded on the intent, not as the catalog says now.
        let unit_price = MoneyAmount::new(
            intent.total_amount.cents() / i64::from(intent.requested_quantity),
        )?;

        let gateway_request = IntentRequest {
            items: vec![IntentItem {
                id: event.id.to_string(),
                title: event.name.clone(),
                quantity: intent.requested_quantity,
                unit_price,
            }],
            payer,
            back_urls: self.urls.back_urls(&intent.external_reference),
            notification_url: self.urls.notification_url(),
            external_reference: intent.external_reference.clone(),
            expires_at: Utc::now() + self.expiry,
        };

        let created = self.gateway.create_intent(&gateway_request).await.inspect_err(|e| {
            tracing::error!(
                external_reference = %intent.external_reference,
                error = %e,
                "gateway intent creation failed"
            );
        })?;

        self.registry
            .attach_gateway_id(&intent.external_reference, &created.gateway_intent_id)
            .await?;

        tracing::info!(
            external_reference = %intent.external_reference,
            gateway_intent_id = %created.gateway_intent_id,
            "checkout started"
        );

        Ok(CheckoutResponse {
            external_reference: intent.external_reference,
            redirect_url: created.redirect_url,
        })
    }
}
