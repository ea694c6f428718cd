use {
    crate::domain::{
        BoxFuture, error::PipelineError, event::Event, notifier::Notifier, ticket::Ticket,
    },
    reqwest::Client,
    serde::Serialize,
    std::time::Duration,
};

/// Logs a delivery summary instead of sending anything. Used when no mailer
/// hook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify<'a>(
        &'a self,
        attendee_email: &'a str,
        event: &'a Event,
        tickets: &'a [Ticket],
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let codes: Vec<&str> = tickets.iter().map(|t| t.ticket_code.as_str()).collect();
            tracing::info!(
                email = %attendee_email,
                event_id = %event.id,
                event_name = %event.name,
                tickets = ?codes,
                "tickets ready for delivery"
            );
            Ok(())
        })
    }
}

#[derive(Serialize)]
struct NotificationBody<'a> {
    email: &'a str,
    event: &'a Event,
    tickets: &'a [Ticket],
}

/// POSTs issued tickets to an external mailer.
pub struct HttpNotifier {
    http: Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

impl Notifier for HttpNotifier {
    fn notify<'a>(
        &'a self,
        attendee_email: &'a str,
        event: &'a Event,
        tickets: &'a [Ticket],
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let body = NotificationBody {
                email: attendee_email,
                event,
                tickets,
            };
            let response = self
                .http
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| PipelineError::GatewayUnavailable(format!("notifier: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(PipelineError::GatewayUnavailable(format!(
                    "notifier answered {status}"
                )));
            }
            Ok(())
        })
    }
}
