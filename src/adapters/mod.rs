pub mod api_errors;
pub mod http;
pub mod mercadopago;
pub mod notifier;
pub mod signature;
pub mod webhook;
