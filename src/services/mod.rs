pub mod checkout;
pub mod issuer;
pub mod reconciler;
pub mod registry;
pub mod status;
pub mod tickets;
pub mod webhook_processor;
