use crate::dtos::companies::{CreateCompanyRequest, UpdateCompanyRequest};
use crate::models::{Company, CreateCompany, UpdateCompany};
use crate::services::track_error;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Company not found"))
}

pub async fn create_company(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<Company>), AppError> {
    tracing::info!(name = %payload.name, "Creating company");

    let input = CreateCompany::from(payload);
    let company = state.db.create_company(&input).await.map_err(track_error)?;

    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn list_companies(State(state): State<AppState>) -> Result<Json<Vec<Company>>, AppError> {
    let companies = state.db.list_companies().await.map_err(track_error)?;
    Ok(Json(companies))
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Company>, AppError> {
    let company = state
        .db
        .get_company(company_id)
        .await
        .map_err(track_error)?
        .ok_or_else(not_found)?;

    Ok(Json(company))
}

pub async fn update_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateCompanyRequest>,
) -> Result<Json<Company>, AppError> {
    tracing::info!(company_id = %company_id, "Updating company");

    let input = UpdateCompany::from(payload);
    let company = state
        .db
        .update_company(company_id, &input)
        .await
        .map_err(track_error)?
        .ok_or_else(not_found)?;

    Ok(Json(company))
}

/// Soft delete. Invoices issued by the company keep referencing it.
pub async fn delete_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!(company_id = %company_id, "Deleting company");

    if !state.db.delete_company(company_id).await.map_err(track_error)? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
