pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    domain::store::FulfillmentStore,
    services::{checkout::CheckoutService, webhook_processor::WebhookProcessor},
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FulfillmentStore>,
    pub checkout: Arc<CheckoutService>,
    pub processor: Arc<WebhookProcessor>,
    pub webhook_secret: Arc<str>,
    pub admin_token: Option<Arc<str>>,
}
