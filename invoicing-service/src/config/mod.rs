//! Configuration module for invoicing-service.

use crate::models::Currency;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::Secret;
use service_core::config::{self as core_config, get_env, is_production, parse_env};
use service_core::error::AppError;
use std::env;

pub const DEFAULT_PDF_SERVICE_URL: &str = "https://api.pdfshift.io/v3/convert/html";
pub const DEFAULT_COPY_LABELS: [&str; 3] = ["CUSTOMER COPY", "COMPANY COPY", "TAX COPY"];

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Browser origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub pdf: PdfConfig,
    pub defaults: InvoiceDefaults,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// HTML-to-PDF conversion service.
#[derive(Debug, Clone)]
pub struct PdfConfig {
    pub enabled: bool,
    pub url: String,
    pub api_key: Secret<String>,
}

/// Values applied when a draft leaves them out.
#[derive(Debug, Clone)]
pub struct InvoiceDefaults {
    pub currency: Currency,
    pub tax_rate: Decimal,
    pub invoice_prefix: String,
    pub payment_terms_days: i64,
    pub notes: Option<String>,
    pub email_signature: String,
    pub print_copies: Vec<String>,
}

impl Default for InvoiceDefaults {
    fn default() -> Self {
        Self {
            currency: Currency::Kes,
            tax_rate: dec!(16),
            invoice_prefix: "INV".to_string(),
            payment_terms_days: 30,
            notes: None,
            email_signature: String::new(),
            print_copies: DEFAULT_COPY_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = is_production();

        let pdf_enabled = parse_env("PDF_SERVICE_ENABLED", false);
        let pdf_api_key = if pdf_enabled {
            get_env("PDF_SERVICE_API_KEY", None, is_prod)?
        } else {
            env::var("PDF_SERVICE_API_KEY").unwrap_or_default()
        };

        let currency_code = get_env("DEFAULT_CURRENCY", Some("KES"), is_prod)?;
        let currency = Currency::parse(&currency_code).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "DEFAULT_CURRENCY must be one of KES, USD, EUR, GBP (got {})",
                currency_code
            ))
        })?;

        let tax_rate: Decimal = get_env("DEFAULT_TAX_RATE", Some("16"), is_prod)?
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid DEFAULT_TAX_RATE: {}", e)))?;
        if tax_rate < Decimal::ZERO || tax_rate > dec!(100) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DEFAULT_TAX_RATE must be between 0 and 100"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "invoicing-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            allowed_origins: split_list(&get_env(
                "ALLOWED_ORIGINS",
                Some("http://localhost:3000"),
                is_prod,
            )?),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 2),
            },
            pdf: PdfConfig {
                enabled: pdf_enabled,
                url: get_env("PDF_SERVICE_URL", Some(DEFAULT_PDF_SERVICE_URL), is_prod)?,
                api_key: Secret::new(pdf_api_key),
            },
            defaults: InvoiceDefaults {
                currency,
                tax_rate,
                invoice_prefix: get_env("INVOICE_PREFIX", Some("INV"), is_prod)?,
                payment_terms_days: parse_env("DEFAULT_PAYMENT_TERMS_DAYS", 30),
                notes: env::var("DEFAULT_INVOICE_NOTES")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                email_signature: env::var("EMAIL_SIGNATURE").unwrap_or_default(),
                print_copies: env::var("PRINT_COPIES")
                    .map(|raw| parse_copy_labels(&raw))
                    .unwrap_or_else(|_| InvoiceDefaults::default().print_copies),
            },
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a comma-separated list of print copy labels. An empty list falls
/// back to the default labels.
pub fn parse_copy_labels(raw: &str) -> Vec<String> {
    let labels = split_list(raw);

    if labels.is_empty() {
        DEFAULT_COPY_LABELS.iter().map(|s| s.to_string()).collect()
    } else {
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_labels_are_trimmed() {
        assert_eq!(
            parse_copy_labels(" ORIGINAL , DUPLICATE,"),
            vec!["ORIGINAL".to_string(), "DUPLICATE".to_string()]
        );
    }

    #[test]
    fn empty_copy_labels_fall_back_to_defaults() {
        assert_eq!(
            parse_copy_labels(" , "),
            vec!["CUSTOMER COPY", "COMPANY COPY", "TAX COPY"]
        );
    }

    #[test]
    fn defaults_match_documented_values() {
        let defaults = InvoiceDefaults::default();
        assert_eq!(defaults.currency, Currency::Kes);
        assert_eq!(defaults.tax_rate, dec!(16));
        assert_eq!(defaults.invoice_prefix, "INV");
        assert_eq!(defaults.payment_terms_days, 30);
        assert_eq!(defaults.print_copies.len(), 3);
    }
}
