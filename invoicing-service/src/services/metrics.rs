//! Prometheus metrics for invoicing-service.
//!
//! Domain metrics live in the default `prometheus` registry. HTTP request
//! metrics from the service-core middleware go through the `metrics` facade
//! into a Prometheus recorder; `/metrics` renders both.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::OnceLock;

/// Recorder behind the `metrics` facade. `None` when another recorder was
/// already installed in this process.
static HTTP_METRICS: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

fn http_metrics() -> Option<&'static PrometheusHandle> {
    HTTP_METRICS
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "HTTP metrics recorder not installed");
                None
            }
        })
        .as_ref()
}

/// Invoice counter by status reached (created drafts, transitions, duplicates).
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoices_total",
        "Total number of invoices by status",
        &["status"] // draft, sent, paid, overdue, cancelled
    )
    .expect("Failed to register invoices_total")
});

/// Monetary amount counter by currency.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoice_amount_total",
        "Total invoice amount by currency",
        &["currency"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// PDF conversion duration by outcome.
pub static PDF_RENDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_pdf_render_duration_seconds",
        "PDF conversion duration in seconds",
        &["outcome"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register pdf_render_duration")
});

/// Submissions where the draft total and the persisted total disagree.
pub static TOTALS_DIVERGENCE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_totals_divergence_total",
        "Invoices whose draft and persisted totals differ",
        &["operation"]
    )
    .expect("Failed to register totals_divergence_total")
});

/// Initialize all metrics (forces lazy initialization and installs the HTTP
/// recorder). Safe to call more than once.
pub fn init_metrics() {
    http_metrics();
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&PDF_RENDER_DURATION);
    Lazy::force(&TOTALS_DIVERGENCE_TOTAL);
}

/// Count a failed request by error kind and hand the error back.
pub fn track_error(err: AppError) -> AppError {
    ERRORS_TOTAL.with_label_values(&[err.kind()]).inc();
    err
}

/// Track an invoice total by currency. Counters only move forward, so
/// non-positive totals are skipped.
pub fn record_invoice_amount(currency: &str, total: Decimal) {
    if let Some(amount) = total.to_f64().filter(|a| *a > 0.0) {
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[currency])
            .inc_by(amount);
    }
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut text = encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default();

    if let Some(handle) = http_metrics() {
        text.push_str(&handle.render());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn exposes_registered_metrics() {
        init_metrics();
        record_invoice_amount("KES", dec!(150.50));
        record_invoice_amount("KES", dec!(-20));
        TOTALS_DIVERGENCE_TOTAL.with_label_values(&["create"]).inc();

        let text = get_metrics();
        assert!(text.contains("invoicing_invoice_amount_total"));
        assert!(text.contains("invoicing_totals_divergence_total"));
    }

    #[test]
    fn facade_metrics_are_rendered() {
        init_metrics();
        init_metrics();
        metrics::counter!("invoicing_unit_test_events_total").increment(3);

        let text = get_metrics();
        assert!(text.contains("invoicing_unit_test_events_total 3"));
    }
}
