use {
    crate::domain::error::PipelineError,
    chrono::{DateTime, Utc},
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

/// Callbacks older (or newer) than this are treated as replays.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Resource id the gateway uses for its delivery-health test notification.
pub const TEST_NOTIFICATION_RESOURCE_ID: &str = "123456";

/// Parsed `x-signature` header: `ts=<timestamp>,v1=<hex hmac>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, PipelineError> {
        let mut ts = None;
        let mut v1 = None;
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("ts", value)) => ts = Some(value.trim().to_string()),
                Some(("v1", value)) => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }
        match (ts, v1) {
            (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok(Self { ts, v1 }),
            _ => Err(PipelineError::Authentication(
                "signature header must carry ts and v1".into(),
            )),
        }
    }

    /// Seconds since the epoch; millisecond timestamps are accepted too.
    fn unix_seconds(&self) -> Result<i64, PipelineError> {
        let raw: u64 = self
            .ts
            .parse()
            .map_err(|_| PipelineError::Authentication(format!("invalid timestamp: {}", self.ts)))?;
        let secs = if raw > 10_000_000_000 { raw / 1000 } else { raw };
        i64::try_from(secs)
            .map_err(|_| PipelineError::Authentication(format!("invalid timestamp: {}", self.ts)))
    }
}

/// Canonical string the gateway signs. Absent parts are left out.
pub fn manifest(resource_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut out = String::new();
    if let Some(id) = resource_id.filter(|s| !s.is_empty()) {
        let id = if id.chars().all(|c| c.is_ascii_alphanumeric()) {
            id.to_lowercase()
        } else {
            id.to_string()
        };
        out.push_str(&format!("id:{id};"));
    }
    if let Some(request_id) = request_id.filter(|s| !s.is_empty()) {
        out.push_str(&format!("request-id:{request_id};"));
    }
    out.push_str(&format!("ts:{ts};"));
    out
}

pub fn sign(secret: &str, manifest: &str) -> Result<String, PipelineError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PipelineError::Config("invalid webhook secret".into()))?;
    mac.update(manifest.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a callback signature and its freshness.
pub fn verify(
    secret: &str,
    signature_header: Option<&str>,
    request_id: Option<&str>,
    resource_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), PipelineError> {
    let header = signature_header
        .ok_or_else(|| PipelineError::Authentication("missing x-signature header".into()))?;
    let header = SignatureHeader::parse(header)?;

    let age = now.timestamp().abs_diff(header.unix_seconds()?);
    if age > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
        return Err(PipelineError::Authentication(format!(
            "stale signature timestamp ({age}s off)"
        )));
    }

    let expected = hex::decode(&header.v1)
        .map_err(|_| PipelineError::Authentication("signature is not hex".into()))?;
    let manifest = manifest(resource_id, request_id, &header.ts);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PipelineError::Config("invalid webhook secret".into()))?;
    mac.update(manifest.as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| PipelineError::Authentication("signature mismatch".into()))
}
