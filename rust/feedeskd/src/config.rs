use rust_decimal::Decimal;
use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use tracing::{debug, info, warn};

use crate::admission::AdmissionLimits;

pub const API_KEY_VAR: &str = "LOVABLE_API_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub gateway_url: String,
    pub gateway_model: String,
    /// Missing is not fatal at start; every risk request fails instead.
    pub api_key: Option<String>,
    pub workspace: Option<PathBuf>,
    pub limits: AdmissionLimits,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AdmissionLimits::default();
        Self {
            bind: try_load(&lookup, "FEEDESK_BIND", "0.0.0.0".to_string()),
            port: try_load(&lookup, "FEEDESK_PORT", 8787),
            gateway_url: try_load(
                &lookup,
                "AI_GATEWAY_URL",
                "https://ai.gateway.lovable.dev".to_string(),
            )
            .trim_end_matches('/')
            .to_string(),
            gateway_model: try_load(
                &lookup,
                "AI_GATEWAY_MODEL",
                "google/gemini-2.5-flash".to_string(),
            ),
            api_key: lookup(API_KEY_VAR)
                .or_else(|| read_secret(API_KEY_VAR))
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            workspace: lookup("FEEDESK_WORKSPACE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            limits: AdmissionLimits {
                payment_ceiling: try_load_ceiling(
                    &lookup,
                    "FEEDESK_PAYMENT_CEILING",
                    defaults.payment_ceiling,
                ),
                fee_ceiling: try_load_ceiling(
                    &lookup,
                    "FEEDESK_FEE_CEILING",
                    defaults.fee_ceiling,
                ),
                ..defaults
            },
        }
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}

/// A ceiling of zero or below would reject every write.
fn try_load_ceiling(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Decimal,
) -> Decimal {
    let value = try_load(lookup, key, default);
    if value <= Decimal::ZERO {
        warn!("Invalid {key} value {value}: must be positive, using default: {default}");
        return default;
    }
    value
}

/// Only the predictor needs the key, and it warns about its absence itself.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");
    read_to_string(&path)
        .map_err(|_| {
            debug!("{secret_name} not found under /run/secrets");
        })
        .ok()
}
