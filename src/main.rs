use {
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    ticket_sync::{
        AppState,
        adapters::{
            http::router,
            mercadopago::MercadoPagoGateway,
            notifier::{HttpNotifier, LogNotifier},
        },
        config::Config,
        domain::{event::Event, notifier::Notifier, store::FulfillmentStore},
        infra::{memory::MemoryStore, postgres::PgStore},
        services::{
            checkout::{CheckoutService, CheckoutUrls},
            reconciler::run_reconciler,
            registry::IntentRegistry,
            webhook_processor::WebhookProcessor,
        },
    },
    tokio::{signal, sync::watch},
    tower::ServiceBuilder,
    tower_http::timeout::TimeoutLayer,
};

/// Upper bound for a whole request, gateway round trips included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env().expect("invalid configuration");

    let store: Arc<dyn FulfillmentStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(3))
                .connect(url)
                .await
                .expect("failed to connect to database");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("failed to run migrations");
            tracing::info!("using postgres store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(path) = &config.seed_events {
        let raw = std::fs::read_to_string(path).expect("failed to read seed events");
        let events: Vec<Event> = serde_json::from_str(&raw).expect("invalid seed events");
        for event in &events {
            if store.event(event.id).await.expect("failed to read events").is_none() {
                store.insert_event(event).await.expect("failed to seed event");
            }
        }
        tracing::info!(count = events.len(), "events seeded");
    }

    let gateway = Arc::new(
        MercadoPagoGateway::new(
            config.gateway_base_url.clone(),
            config.access_token.clone(),
            config.currency_id.clone(),
            config.gateway_timeout,
        )
        .expect("failed to build gateway client"),
    );

    let notifier: Arc<dyn Notifier> = match &config.notifier_url {
        Some(url) => Arc::new(
            HttpNotifier::new(url.clone(), config.gateway_timeout)
                .expect("failed to build notifier client"),
        ),
        None => Arc::new(LogNotifier),
    };

    let registry = IntentRegistry::new(store.clone());
    let processor = Arc::new(WebhookProcessor::new(
        registry.clone(),
        gateway.clone(),
        notifier,
    ));
    let checkout = Arc::new(CheckoutService::new(
        registry,
        gateway,
        CheckoutUrls {
            public_base_url: config.public_base_url.clone(),
        },
        config.checkout_expiry,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = config.reconcile_interval.map(|interval| {
        tokio::spawn(run_reconciler(
            store.clone(),
            processor.clone(),
            interval,
            config.reconcile_min_age,
            shutdown_rx,
        ))
    });

    let state = AppState {
        store,
        checkout,
        processor,
        webhook_secret: config.webhook_secret.as_str().into(),
        admin_token: config.admin_token.as_deref().map(Arc::from),
    };

    let app = router(state).layer(ServiceBuilder::new().layer(TimeoutLayer::new(REQUEST_TIMEOUT)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = reconciler {
        let _ = handle.await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
