pub mod audit;
pub mod error;
pub mod event;
pub mod gateway;
pub mod id;
pub mod intent;
pub mod money;
pub mod notifier;
pub mod store;
pub mod ticket;

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
