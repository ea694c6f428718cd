use {
    crate::{adapters::mercadopago::DEFAULT_BASE_URL, domain::error::PipelineError},
    std::{path::PathBuf, str::FromStr, time::Duration},
};

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent selects the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub webhook_secret: String,
    pub access_token: String,
    pub gateway_base_url: String,
    pub public_base_url: String,
    pub currency_id: String,
    pub checkout_expiry: chrono::Duration,
    pub gateway_timeout: Duration,
    /// `None` disables the reconciler.
    pub reconcile_interval: Option<Duration>,
    pub reconcile_min_age: Duration,
    pub notifier_url: Option<String>,
    pub admin_token: Option<String>,
    /// JSON array of events inserted at startup.
    pub seed_events: Option<PathBuf>,
}

impl Config {
    /// Read the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| PipelineError::Config(format!("{key} must be set")))
        };
        let number = |key: &str, default: u64| -> Result<u64, PipelineError> {
            optional(key).map_or(Ok(default), |raw| parse(key, &raw))
        };

        let expiry_minutes = number("CHECKOUT_EXPIRY_MINUTES", 30)?;
        if expiry_minutes == 0 {
            return Err(PipelineError::Config(
                "CHECKOUT_EXPIRY_MINUTES must be positive".into(),
            ));
        }
        let expiry_minutes = i64::try_from(expiry_minutes)
            .map_err(|_| PipelineError::Config("CHECKOUT_EXPIRY_MINUTES is too large".into()))?;

        let reconcile_secs = number("RECONCILE_INTERVAL_SECS", 300)?;

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            webhook_secret: required("GATEWAY_WEBHOOK_SECRET")?,
            access_token: required("GATEWAY_ACCESS_TOKEN")?,
            gateway_base_url: optional("GATEWAY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            public_base_url: required("PUBLIC_BASE_URL")?,
            currency_id: optional("CURRENCY_ID").unwrap_or_else(|| "ARS".to_string()),
            checkout_expiry: chrono::Duration::minutes(expiry_minutes),
            gateway_timeout: Duration::from_secs(number("GATEWAY_TIMEOUT_SECS", 10)?.max(1)),
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            reconcile_min_age: Duration::from_secs(number("RECONCILE_MIN_AGE_SECS", 600)?),
            notifier_url: optional("NOTIFIER_URL"),
            admin_token: optional("ADMIN_TOKEN"),
            seed_events: optional("SEED_EVENTS_FILE").map(PathBuf::from),
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, PipelineError> {
    raw.parse()
        .map_err(|_| PipelineError::Config(format!("{key} has an invalid value: {raw}")))
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn config(pairs: &[(&str, &str)]) -> Result<Config, PipelineError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("GATEWAY_WEBHOOK_SECRET", "secret"),
        ("GATEWAY_ACCESS_TOKEN", "token"),
        ("PUBLIC_BASE_URL", "https://shop.example.com"),
    ];

    #[test]
    fn applies_defaults() {
        let cfg = config(&REQUIRED).unwrap();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.gateway_base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.currency_id, "ARS");
        assert_eq!(cfg.checkout_expiry, chrono::Duration::minutes(30));
        assert_eq!(cfg.gateway_timeout, Duration::from_secs(10));
        assert_eq!(cfg.reconcile_interval, Some(Duration::from_secs(300)));
        assert_eq!(cfg.reconcile_min_age, Duration::from_secs(600));
        assert!(cfg.admin_token.is_none());
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        let err = config(&REQUIRED[1..]).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ref m) if m.contains("GATEWAY_WEBHOOK_SECRET")));
    }

    #[test]
    fn zero_interval_disables_reconciler() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RECONCILE_INTERVAL_SECS", "0"));
        assert!(config(&pairs).unwrap().reconcile_interval.is_none());
    }

    #[test]
    fn rejects_garbage_numbers() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("GATEWAY_TIMEOUT_SECS", "soon"));
        assert!(matches!(config(&pairs), Err(PipelineError::Config(_))));
    }
}
