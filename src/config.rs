use anyhow::{Context, Result, ensure};
use compute::ai::{GeminiClient, LanguageModel, UnconfiguredModel};
use compute::duplicates::DuplicatePolicy;
use compute::money::CurrencyFormat;
use compute::receipt::{OcrEngine, TesseractCli};
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use sea_orm::Database;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::MAX_TOKEN_TTL_HOURS;
use crate::schemas::AppState;

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";
const MAX_DUPLICATE_TOLERANCE_DAYS: i64 = 365;

/// Runtime settings.
///
/// Values come from the built-in defaults, then an optional `finsight`
/// config file in the working directory, then `FINSIGHT_*` environment
/// variables (e.g. `FINSIGHT_GEMINI_API_KEY`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,

    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bcrypt_cost: u32,

    /// Hosted model access; the assistant degrades gracefully without it.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_timeout_secs: u64,

    pub tesseract_command: String,
    pub tesseract_language: Option<String>,

    pub preview_ttl_secs: u64,
    pub max_statement_bytes: usize,
    pub max_receipt_bytes: usize,

    pub duplicate_date_tolerance_days: i64,
    pub duplicate_amount_tolerance: Decimal,
    pub duplicate_compare_merchant: bool,

    /// Parse JSON chart hints out of free-text model answers.
    pub chart_hints: bool,
    /// ISO 4217 code used when amounts are written into narratives.
    pub currency: String,
}

impl Settings {
    /// Reads the layered configuration.
    pub fn load() -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("database_url", "sqlite://finsight.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("jwt_secret", DEFAULT_JWT_SECRET)?
            .set_default("jwt_ttl_hours", 24)?
            .set_default("bcrypt_cost", i64::from(bcrypt::DEFAULT_COST))?
            .set_default("gemini_model", compute::ai::gemini::DEFAULT_MODEL)?
            .set_default("gemini_timeout_secs", 30)?
            .set_default("tesseract_command", "tesseract")?
            .set_default("preview_ttl_secs", 15 * 60)?
            .set_default("max_statement_bytes", 20 * 1024 * 1024)?
            .set_default("max_receipt_bytes", 10 * 1024 * 1024)?
            .set_default("duplicate_date_tolerance_days", 0)?
            .set_default("duplicate_amount_tolerance", "0.00")?
            .set_default("duplicate_compare_merchant", true)?
            .set_default("chart_hints", true)?
            .set_default("currency", "USD")?
            .add_source(File::with_name("finsight").required(false))
            .add_source(Environment::with_prefix("FINSIGHT").try_parsing(true))
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;

        if settings.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("Using the built-in JWT secret; set FINSIGHT_JWT_SECRET outside development");
        }
        Ok(settings)
    }

    /// Rejects values that would break token issuing or duplicate lookups
    /// at request time.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_TOKEN_TTL_HOURS).contains(&self.jwt_ttl_hours),
            "jwt_ttl_hours must be between 1 and {MAX_TOKEN_TTL_HOURS}, got {}",
            self.jwt_ttl_hours
        );
        ensure!(
            (4..=31).contains(&self.bcrypt_cost),
            "bcrypt_cost must be between 4 and 31, got {}",
            self.bcrypt_cost
        );
        ensure!(
            (0..=MAX_DUPLICATE_TOLERANCE_DAYS).contains(&self.duplicate_date_tolerance_days),
            "duplicate_date_tolerance_days must be between 0 and {MAX_DUPLICATE_TOLERANCE_DAYS}, got {}",
            self.duplicate_date_tolerance_days
        );
        ensure!(
            !self.duplicate_amount_tolerance.is_sign_negative(),
            "duplicate_amount_tolerance must not be negative, got {}",
            self.duplicate_amount_tolerance
        );
        ensure!(self.preview_ttl_secs > 0, "preview_ttl_secs must be positive");
        Ok(())
    }

    pub fn preview_ttl(&self) -> Duration {
        Duration::from_secs(self.preview_ttl_secs)
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy {
            date_tolerance_days: self.duplicate_date_tolerance_days,
            amount_tolerance: self.duplicate_amount_tolerance,
            compare_merchant: self.duplicate_compare_merchant,
        }
    }

    /// Falls back to USD for unknown codes.
    pub fn currency_format(&self) -> CurrencyFormat {
        CurrencyFormat::from_code(&self.currency).unwrap_or_else(|| {
            warn!("Unknown currency code '{}', using USD", self.currency);
            CurrencyFormat::default()
        })
    }

    /// The hosted model client, or a stand-in that always reports itself
    /// unconfigured when no API key is set.
    pub fn language_model(&self) -> Result<Arc<dyn LanguageModel>> {
        match self.gemini_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                info!("AI assistant enabled with model {}", self.gemini_model);
                let client = GeminiClient::new(key, &self.gemini_model, Duration::from_secs(self.gemini_timeout_secs))?
                    .with_currency(self.currency_format());
                Ok(Arc::new(client))
            }
            _ => {
                warn!("FINSIGHT_GEMINI_API_KEY is not set; AI features will degrade");
                Ok(Arc::new(UnconfiguredModel))
            }
        }
    }

    pub fn ocr_engine(&self) -> Arc<dyn OcrEngine> {
        let mut tesseract = TesseractCli::new(&self.tesseract_command);
        tesseract.language = self.tesseract_language.clone();
        if !tesseract.is_available() {
            warn!("'{}' was not found; receipt OCR will be unavailable", self.tesseract_command);
        }
        Arc::new(tesseract)
    }
}

/// Connects to the database and wires the production collaborators.
pub async fn initialize_app_state(settings: Settings) -> Result<AppState> {
    info!("Connecting to database: {}", settings.database_url);
    let db = Database::connect(&settings.database_url).await?;
    debug!("Database connection established");

    let model = settings.language_model()?;
    let ocr = settings.ocr_engine();
    Ok(AppState::new(db, settings, model, ocr))
}
