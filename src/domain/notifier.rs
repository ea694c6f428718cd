use {
    super::error::PipelineError,
    super::event::Event,
    super::ticket::Ticket,
    super::BoxFuture,
};

/// Delivery of issued tickets to one attendee. Best-effort: callers log
/// failures and never roll back issuance because of them.
pub trait Notifier: Send + Sync {
    fn notify<'a>(
        &'a self,
        attendee_email: &'a str,
        event: &'a Event,
        tickets: &'a [Ticket],
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}
