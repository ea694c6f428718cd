#![allow(dead_code)]

use {
    chrono::{Duration, Utc},
    std::{
        collections::HashMap,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    },
    ticket_sync::{
        AppState,
        adapters::signature,
        domain::{
            BoxFuture,
            error::PipelineError,
            event::Event,
            gateway::{
                CreatedIntent, FetchedOrder, FetchedPayment, GatewayPaymentStatus, IntentRequest,
                OrderPayment, PaymentGateway,
            },
            id::{ExternalReference, GatewayPaymentId},
            intent::{AttendeeInput, PaymentIntent},
            money::MoneyAmount,
            notifier::Notifier,
            store::FulfillmentStore,
            ticket::Ticket,
        },
        infra::memory::MemoryStore,
        services::{
            checkout::{CheckoutService, CheckoutUrls},
            registry::IntentRegistry,
            webhook_processor::{CallbackTopic, GatewayCallback, WebhookProcessor},
        },
    },
};

pub const WEBHOOK_SECRET: &str = "whsec-test";
pub const ADMIN_TOKEN: &str = "admin-test-token";
pub const PUBLIC_BASE_URL: &str = "https://shop.example.com";

// ── Fake gateway ───────────────────────────────────────────────────────────

/// In-process gateway double. Payments and orders are registered up front;
/// `set_unavailable` makes every call fail like a network outage.
#[derive(Default)]
pub struct FakeGateway {
    payments: Mutex<HashMap<String, FetchedPayment>>,
    orders: Mutex<HashMap<String, FetchedOrder>>,
    unavailable: AtomicBool,
    pub created: Mutex<Vec<IntentRequest>>,
    pub fetches: AtomicUsize,
    delay: Mutex<Option<std::time::Duration>>,
}

impl FakeGateway {
    pub fn put_payment(&self, payment: FetchedPayment) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id.as_str().to_string(), payment);
    }

    pub fn put_order(&self, order_id: &str, payments: Vec<(&str, GatewayPaymentStatus)>) {
        let payments = payments
            .into_iter()
            .map(|(id, status)| OrderPayment {
                id: GatewayPaymentId::new(id).unwrap(),
                status,
            })
            .collect();
        self.orders
            .lock()
            .unwrap()
            .insert(order_id.to_string(), FetchedOrder { payments });
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every fetch sleeps this long first, to widen race windows.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn pause(&self) -> Result<(), PipelineError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PipelineError::GatewayUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

impl PaymentGateway for FakeGateway {
    fn create_intent<'a>(
        &'a self,
        request: &'a IntentRequest,
    ) -> BoxFuture<'a, Result<CreatedIntent, PipelineError>> {
        Box::pin(async move {
            self.pause().await?;
            let mut created = self.created.lock().unwrap();
            created.push(request.clone());
            Ok(CreatedIntent {
                gateway_intent_id: format!("pref-{}", created.len()),
                redirect_url: format!(
                    "https://gateway.example.com/checkout?pref={}",
                    request.external_reference
                ),
            })
        })
    }

    fn fetch_payment<'a>(
        &'a self,
        payment_id: &'a GatewayPaymentId,
    ) -> BoxFuture<'a, Result<FetchedPayment, PipelineError>> {
        Box::pin(async move {
            self.pause().await?;
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.payments
                .lock()
                .unwrap()
                .get(payment_id.as_str())
                .cloned()
                .ok_or_else(|| PipelineError::NotFound(format!("payment {payment_id}")))
        })
    }

    fn fetch_order<'a>(
        &'a self,
        order_id: &'a str,
    ) -> BoxFuture<'a, Result<FetchedOrder, PipelineError>> {
        Box::pin(async move {
            self.pause().await?;
            self.orders
                .lock()
                .unwrap()
                .get(order_id)
                .cloned()
                .ok_or_else(|| PipelineError::NotFound(format!("merchant order {order_id}")))
        })
    }
}

// ── Recording notifier ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Vec<Ticket>)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(
        &'a self,
        attendee_email: &'a str,
        _event: &'a Event,
        tickets: &'a [Ticket],
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PipelineError::GatewayUnavailable("smtp down".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((attendee_email.to_string(), tickets.to_vec()));
            Ok(())
        })
    }
}

// ── Harness ────────────────────────────────────────────────────────────────

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: IntentRegistry,
    pub processor: Arc<WebhookProcessor>,
    pub checkout: Arc<CheckoutService>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let dyn_store: Arc<dyn FulfillmentStore> = store.clone();
        let registry = IntentRegistry::new(dyn_store);
        let processor = Arc::new(WebhookProcessor::new(
            registry.clone(),
            gateway.clone(),
            notifier.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            registry.clone(),
            gateway.clone(),
            CheckoutUrls {
                public_base_url: PUBLIC_BASE_URL.to_string(),
            },
            Duration::minutes(30),
        ));

        Self {
            store,
            gateway,
            notifier,
            registry,
            processor,
            checkout,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            store: self.store.clone(),
            checkout: self.checkout.clone(),
            processor: self.processor.clone(),
            webhook_secret: WEBHOOK_SECRET.into(),
            admin_token: Some(ADMIN_TOKEN.into()),
        }
    }

    pub async fn seed_event(&self, price_cents: i64, total: u32) -> Event {
        let event = Event::new(
            "Summer Fest",
            MoneyAmount::new(price_cents).unwrap(),
            total,
            Utc::now() + Duration::days(30),
            "Parque Centenario",
        )
        .unwrap();
        self.store.insert_event(&event).await.unwrap();
        event
    }

    pub async fn pending_intent(&self, event: &Event, quantity: u32) -> PaymentIntent {
        self.registry
            .create(event, attendees(quantity as usize), i64::from(quantity), "test")
            .await
            .unwrap()
    }

    pub async fn event(&self, event: &Event) -> Event {
        self.store.event(event.id).await.unwrap().unwrap()
    }

    pub async fn intent(&self, reference: &ExternalReference) -> PaymentIntent {
        self.store.find_intent(reference).await.unwrap().unwrap()
    }

    pub async fn tickets(&self, reference: &ExternalReference) -> Vec<Ticket> {
        self.store.tickets_for_intent(reference).await.unwrap()
    }
}

// ── Fixtures ───────────────────────────────────────────────────────────────

pub fn attendee(i: usize) -> AttendeeInput {
    AttendeeInput {
        name: format!("Attendee {i}"),
        email: format!("attendee{i}@example.com"),
        national_id: format!("3000000{i}"),
        phone: String::new(),
    }
}

pub fn attendees(n: usize) -> Vec<AttendeeInput> {
    (0..n).map(attendee).collect()
}

pub fn payment(
    id: &str,
    reference: &ExternalReference,
    status: GatewayPaymentStatus,
    amount: MoneyAmount,
) -> FetchedPayment {
    FetchedPayment {
        id: GatewayPaymentId::new(id).unwrap(),
        status,
        status_detail: None,
        amount,
        external_reference: Some(reference.as_str().to_string()),
    }
}

pub fn payment_callback(id: &str) -> GatewayCallback {
    GatewayCallback {
        topic: CallbackTopic::Payment,
        resource_id: id.to_string(),
    }
}

pub fn order_callback(id: &str) -> GatewayCallback {
    GatewayCallback {
        topic: CallbackTopic::MerchantOrder,
        resource_id: id.to_string(),
    }
}

/// `x-signature` header value the gateway would send for this delivery.
pub fn signature_header(resource_id: &str, request_id: &str, ts: i64) -> String {
    let manifest = signature::manifest(Some(resource_id), Some(request_id), &ts.to_string());
    let v1 = signature::sign(WEBHOOK_SECRET, &manifest).unwrap();
    format!("ts={ts},v1={v1}")
}
