use {
    super::{api_errors::ApiError, webhook::gateway_webhook_handler},
    crate::{
        AppState,
        domain::{
            error::PipelineError,
            id::{ExternalReference, TicketCode},
            ticket::Ticket,
        },
        services::{
            checkout::{CheckoutRequest, CheckoutResponse},
            status::{self, StatusView},
            tickets,
        },
    },
    axum::{
        Json, Router,
        extract::{DefaultBodyLimit, Path, State, rejection::JsonRejection},
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        routing::{get, post},
    },
};

/// Callbacks and checkout forms are small; anything larger is refused early.
pub const BODY_LIMIT_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/checkouts", post(create_checkout))
        .route("/checkouts/{reference}", get(checkout_status))
        .route("/checkouts/{reference}/tickets", get(checkout_tickets))
        .route("/webhooks/gateway", post(gateway_webhook_handler))
        .route("/tickets/{code}/redeem", post(redeem_ticket))
        .route("/admin/tickets/{code}/cancel", post(cancel_ticket))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}

fn parse_reference(raw: &str) -> Result<ExternalReference, ApiError> {
    // A malformed reference cannot name any intent.
    ExternalReference::new(raw)
        .map_err(|_| ApiError(PipelineError::NotFound(format!("payment intent {raw}"))))
}

fn parse_code(raw: &str) -> Result<TicketCode, ApiError> {
    TicketCode::new(raw).map_err(|_| ApiError(PipelineError::NotFound(format!("ticket {raw}"))))
}

async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let Json(request) =
        payload.map_err(|e| PipelineError::MalformedPayload(e.body_text()))?;
    let response = state.checkout.start(request, "checkout").await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn checkout_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    let reference = parse_reference(&reference)?;
    Ok(Json(status::get_status(&*state.store, &reference).await?))
}

async fn checkout_tickets(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let reference = parse_reference(&reference)?;
    Ok(Json(status::issued_tickets(&*state.store, &reference).await?))
}

async fn redeem_ticket(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let code = parse_code(&code)?;
    Ok(Json(tickets::redeem(&*state.store, &code, "venue").await?))
}

#[tracing::instrument(name = "admin_cancel", skip_all)]
async fn cancel_ticket(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Ticket>, ApiError> {
    authorize_admin(&state, &headers)?;
    let code = parse_code(&code)?;
    Ok(Json(tickets::cancel(&*state.store, &code, "admin").await?))
}

/// Admin routes answer 404 when no token is configured.
fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError(PipelineError::NotFound("admin routes disabled".into())));
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if constant_time_eq::constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            Ok(())
        }
        _ => Err(ApiError(PipelineError::Authentication(
            "invalid admin token".into(),
        ))),
    }
}
