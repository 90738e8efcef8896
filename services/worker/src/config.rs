//! services/worker/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development. Pricing, context windows, and
//! rate budgets are part of the config so tests and deployments can
//! override them without touching code.

use cat_tales_core::params::{PricingTable, TierRates};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    /// Concrete model names behind the two user-facing tiers.
    pub fast_model: String,
    pub advanced_model: String,
    /// Context window sizes (tokens) used for source-text budgeting.
    pub fast_context_tokens: u32,
    pub advanced_context_tokens: u32,
    pub gateway_timeout_secs: u64,
    pub pricing: PricingTable,
    /// Rate budgets the throttle enforces across all workers.
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
    /// Root directory for stored document blobs.
    pub storage_root: PathBuf,
    /// Worker tasks spawned per queue lane.
    pub workers_per_lane: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Looks for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to keep tests hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and database settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- API key (optional so non-AI commands still start) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Model tiers ---
        let fast_model =
            std::env::var("FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let advanced_model =
            std::env::var("ADVANCED_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let fast_context_tokens = parse_var("FAST_CONTEXT_TOKENS", 16_385)?;
        let advanced_context_tokens = parse_var("ADVANCED_CONTEXT_TOKENS", 128_000)?;
        let gateway_timeout_secs = parse_var("GATEWAY_TIMEOUT_SECS", 120)?;

        // --- Pricing (per 1K tokens) ---
        let defaults = PricingTable::default();
        let pricing = PricingTable {
            fast: TierRates {
                input_per_1k: parse_var("FAST_INPUT_COST_PER_1K", defaults.fast.input_per_1k)?,
                output_per_1k: parse_var("FAST_OUTPUT_COST_PER_1K", defaults.fast.output_per_1k)?,
            },
            advanced: TierRates {
                input_per_1k: parse_var(
                    "ADVANCED_INPUT_COST_PER_1K",
                    defaults.advanced.input_per_1k,
                )?,
                output_per_1k: parse_var(
                    "ADVANCED_OUTPUT_COST_PER_1K",
                    defaults.advanced.output_per_1k,
                )?,
            },
        };

        // --- Rate budgets and workers ---
        let requests_per_minute = parse_var("AI_REQUESTS_PER_MINUTE", 20)?;
        let tokens_per_minute = parse_var("AI_TOKENS_PER_MINUTE", 40_000)?;
        let workers_per_lane = parse_var("WORKERS_PER_LANE", 2)?;

        let storage_root = std::env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./storage"));

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            fast_model,
            advanced_model,
            fast_context_tokens,
            advanced_context_tokens,
            gateway_timeout_secs,
            pricing,
            requests_per_minute,
            tokens_per_minute,
            storage_root,
            workers_per_lane,
        })
    }

    /// The concrete model name for a tier.
    pub fn model_name(&self, tier: cat_tales_core::ModelTier) -> &str {
        match tier {
            cat_tales_core::ModelTier::Fast => &self.fast_model,
            cat_tales_core::ModelTier::Advanced => &self.advanced_model,
        }
    }

    /// The context window for a tier, in tokens.
    pub fn context_tokens(&self, tier: cat_tales_core::ModelTier) -> u32 {
        match tier {
            cat_tales_core::ModelTier::Fast => self.fast_context_tokens,
            cat_tales_core::ModelTier::Advanced => self.advanced_context_tokens,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}
