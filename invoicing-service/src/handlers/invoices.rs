use crate::dtos::invoices::{
    CreateInvoiceRequest, ListInvoicesQuery, PreviewRequest, PreviewResponse, RenderQuery,
    UpdateInvoiceRequest, UpdateStatusRequest,
};
use crate::models::{InvoiceDetail, InvoiceWithParties, StatusSummary};
use crate::render::EmailDraft;
use crate::services::track_error;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

/// Totals for an unsaved draft. Only the JSON shape is checked.
pub async fn preview_invoice(
    State(state): State<AppState>,
    Json(payload): Json<PreviewRequest>,
) -> Json<PreviewResponse> {
    Json(state.invoices.preview(payload))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    tracing::info!(
        client_id = %payload.client_id,
        company_id = %payload.company_id,
        line_items = payload.line_items.len(),
        "Creating invoice"
    );

    let invoice = state.invoices.create(payload).await.map_err(track_error)?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<InvoiceWithParties>>, AppError> {
    let invoices = state.invoices.list(query).await.map_err(track_error)?;
    Ok(Json(invoices))
}

pub async fn invoice_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<StatusSummary>>, AppError> {
    let summary = state.invoices.summary().await.map_err(track_error)?;
    Ok(Json(summary))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let invoice = state.invoices.get(invoice_id).await.map_err(track_error)?;
    Ok(Json(invoice))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceDetail>, AppError> {
    tracing::info!(invoice_id = %invoice_id, "Updating invoice");

    let invoice = state
        .invoices
        .update(invoice_id, payload)
        .await
        .map_err(track_error)?;

    Ok(Json(invoice))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!(invoice_id = %invoice_id, "Deleting invoice");

    state.invoices.delete(invoice_id).await.map_err(track_error)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn duplicate_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    let invoice = state
        .invoices
        .duplicate(invoice_id)
        .await
        .map_err(track_error)?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<InvoiceDetail>, AppError> {
    tracing::info!(
        invoice_id = %invoice_id,
        new_status = payload.status.as_str(),
        "Updating invoice status"
    );

    let invoice = state
        .invoices
        .change_status(invoice_id, payload)
        .await
        .map_err(track_error)?;

    Ok(Json(invoice))
}

pub async fn render_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<RenderQuery>,
) -> Result<Html<String>, AppError> {
    let html = state
        .invoices
        .render_html(invoice_id, query.template)
        .await
        .map_err(track_error)?;

    Ok(Html(html))
}

/// One labelled copy per configured print copy, ready for the browser's print dialog.
pub async fn print_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<RenderQuery>,
) -> Result<Html<String>, AppError> {
    let html = state
        .invoices
        .print_html(invoice_id, query.template)
        .await
        .map_err(track_error)?;

    Ok(Html(html))
}

pub async fn download_invoice_pdf(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<RenderQuery>,
) -> Result<impl IntoResponse, AppError> {
    let document = state
        .invoices
        .pdf(invoice_id, query.template)
        .await
        .map_err(track_error)?;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    ))
}

pub async fn email_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<EmailDraft>, AppError> {
    let draft = state.invoices.email(invoice_id).await.map_err(track_error)?;
    Ok(Json(draft))
}
