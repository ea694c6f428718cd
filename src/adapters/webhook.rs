use {
    super::{api_errors::ApiError, signature},
    crate::{
        AppState,
        domain::error::PipelineError,
        services::webhook_processor::{CallbackTopic, GatewayCallback},
    },
    axum::{
        Json,
        extract::{Query, State},
        http::HeaderMap,
    },
    chrono::Utc,
    serde::Deserialize,
    std::collections::HashMap,
};

const ACTOR: &str = "webhook:gateway";

#[derive(Debug, Default, Deserialize)]
struct CallbackBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    topic: Option<String>,
    data: Option<CallbackData>,
    resource: Option<serde_json::Value>,
    live_mode: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CallbackData {
    id: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ParsedCallback {
    pub callback: GatewayCallback,
    pub live_mode: bool,
}

impl ParsedCallback {
    /// The gateway's delivery-health check.
    pub fn is_test_notification(&self) -> bool {
        !self.live_mode && self.callback.resource_id == signature::TEST_NOTIFICATION_RESOURCE_ID
    }
}

fn scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `resource` is either a bare id or a URL whose last segment is the id.
fn resource_id(value: &serde_json::Value) -> Option<String> {
    scalar(value).and_then(|raw| {
        raw.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Read topic and resource id from the JSON body, falling back to the query
/// string the gateway also populates.
pub fn parse_callback(
    query: &HashMap<String, String>,
    body: &str,
) -> Result<ParsedCallback, PipelineError> {
    let parsed: CallbackBody = if body.trim().is_empty() {
        CallbackBody::default()
    } else {
        serde_json::from_str(body)
            .map_err(|e| PipelineError::MalformedPayload(format!("callback body: {e}")))?
    };

    let from_query = |key: &str| {
        query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let topic = parsed
        .kind
        .or(parsed.topic)
        .or_else(|| from_query("type"))
        .or_else(|| from_query("topic"))
        .ok_or_else(|| PipelineError::MalformedPayload("callback carries no topic".into()))?;

    let resource = parsed
        .data
        .and_then(|d| d.id)
        .as_ref()
        .and_then(scalar)
        .or_else(|| from_query("data.id"))
        .or_else(|| from_query("id"))
        .or_else(|| parsed.resource.as_ref().and_then(resource_id))
        .ok_or_else(|| PipelineError::MalformedPayload("callback carries no resource id".into()))?;

    Ok(ParsedCallback {
        callback: GatewayCallback {
            topic: CallbackTopic::parse(&topic),
            resource_id: resource,
        },
        live_mode: parsed.live_mode.unwrap_or(true),
    })
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(
        topic = tracing::field::Empty,
        resource_id = tracing::field::Empty,
        request_id = tracing::field::Empty
    )
)]
pub async fn gateway_webhook_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let parsed = parse_callback(&query, &body).inspect_err(|e| {
        tracing::warn!(error = %e, "unreadable gateway callback");
    })?;
    let request_id = header(&headers, "x-request-id");

    tracing::Span::current()
        .record("topic", tracing::field::debug(&parsed.callback.topic))
        .record("resource_id", tracing::field::display(&parsed.callback.resource_id))
        .record("request_id", tracing::field::display(request_id.unwrap_or("-")));

    if parsed.is_test_notification() {
        tracing::info!("gateway test notification acknowledged");
        return Ok(Json(serde_json::json!({"status": "test_notification"})));
    }

    signature::verify(
        &state.webhook_secret,
        header(&headers, "x-signature"),
        request_id,
        Some(&parsed.callback.resource_id),
        Utc::now(),
    )
    .inspect_err(|e| {
        tracing::warn!(error = %e, "callback signature rejected, possible forgery");
    })?;

    let outcome = state.processor.process(&parsed.callback, ACTOR).await?;
    tracing::info!(outcome = outcome.as_str(), "callback processed");

    Ok(Json(serde_json::json!({"status": outcome.as_str()})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_payment_callback_from_body() {
        let body = r#"{"type":"payment","data":{"id":"98765"},"live_mode":true}"#;
        let parsed = parse_callback(&HashMap::new(), body).unwrap();
        assert_eq!(parsed.callback.topic, CallbackTopic::Payment);
        assert_eq!(parsed.callback.resource_id, "98765");
        assert!(!parsed.is_test_notification());
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let body = r#"{"type":"payment","data":{"id":98765}}"#;
        let parsed = parse_callback(&HashMap::new(), body).unwrap();
        assert_eq!(parsed.callback.resource_id, "98765");
    }

    #[test]
    fn falls_back_to_query_string() {
        let parsed = parse_callback(&query(&[("topic", "merchant_order"), ("id", "55")]), "").unwrap();
        assert_eq!(parsed.callback.topic, CallbackTopic::MerchantOrder);
        assert_eq!(parsed.callback.resource_id, "55");
    }

    #[test]
    fn resource_urls_yield_their_last_segment() {
        let body = r#"{"topic":"merchant_order","resource":"https://api.example.com/merchant_orders/777"}"#;
        let parsed = parse_callback(&HashMap::new(), body).unwrap();
        assert_eq!(parsed.callback.resource_id, "777");
    }

    #[test]
    fn detects_test_notification() {
        let body = r#"{"type":"payment","data":{"id":"123456"},"live_mode":false}"#;
        assert!(parse_callback(&HashMap::new(), body).unwrap().is_test_notification());

        let live = r#"{"type":"payment","data":{"id":"123456"},"live_mode":true}"#;
        assert!(!parse_callback(&HashMap::new(), live).unwrap().is_test_notification());
    }

    #[test]
    fn malformed_callbacks_are_rejected() {
        for body in ["{not json", r#"{"type":"payment"}"#, r#"{"data":{"id":"1"}}"#] {
            let err = parse_callback(&HashMap::new(), body).unwrap_err();
            assert!(matches!(err, PipelineError::MalformedPayload(_)), "{body}");
        }
    }
}
