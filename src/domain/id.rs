use {
    super::error::PipelineError,
    derive_more::Display,
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Locally generated correlation key between a checkout and the gateway's callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalReference(String);

impl ExternalReference {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn new(reference: impl Into<String>) -> Result<Self, PipelineError> {
        let reference = reference.into();
        let parsed = Uuid::parse_str(&reference).map_err(|_| {
            PipelineError::Validation(format!(
                "external reference must be a UUID, got: {reference}"
            ))
        })?;
        Ok(Self(parsed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Gateway payment identifier, assigned once a concrete payment exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayPaymentId(String);

impl GatewayPaymentId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::Validation(
                "gateway payment id cannot be empty".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Durable ticket identity presented at the venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketCode(String);

impl TicketCode {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().to_uppercase())
    }

    pub fn new(code: impl Into<String>) -> Result<Self, PipelineError> {
        let code = code.into().to_uppercase();
        if code.len() != 32 || !code.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PipelineError::Validation(format!(
                "ticket code must be 32 hex characters, got: {code}"
            )));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_are_unique() {
        let a = ExternalReference::generate();
        let b = ExternalReference::generate();
        assert_ne!(a, b);
        assert!(ExternalReference::new(a.as_str()).is_ok());
    }

    #[test]
    fn reference_rejects_garbage() {
        assert!(matches!(
            ExternalReference::new("not-a-uuid"),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn ticket_code_roundtrips_case_insensitively() {
        let code = TicketCode::generate();
        let lower = code.as_str().to_lowercase();
        assert_eq!(TicketCode::new(lower).unwrap(), code);
    }

    #[test]
    fn payment_id_is_trimmed() {
        let id = GatewayPaymentId::new(" 12345 ").unwrap();
        assert_eq!(id.as_str(), "12345");
        assert!(GatewayPaymentId::new("   ").is_err());
    }
}
