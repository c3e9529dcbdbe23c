use crate::dtos::clients::{CreateClientRequest, ListClientsQuery, UpdateClientRequest};
use crate::models::{Client, ClientWithCompany, Company, CreateClient, UpdateClient};
use crate::services::{track_error, Database};
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::collections::HashMap;
use uuid::Uuid;

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Client not found"))
}

/// Clients can only be attached to companies that have not been deleted.
async fn ensure_company(db: &Database, company_id: Uuid) -> Result<(), AppError> {
    if db.get_company(company_id).await?.is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Company {} does not exist",
            company_id
        )));
    }
    Ok(())
}

async fn with_companies(
    db: &Database,
    clients: Vec<Client>,
) -> Result<Vec<ClientWithCompany>, AppError> {
    let mut company_ids: Vec<Uuid> = clients.iter().map(|c| c.company_id).collect();
    company_ids.sort();
    company_ids.dedup();

    let companies: HashMap<Uuid, Company> = db
        .get_companies_by_ids(&company_ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    Ok(clients
        .into_iter()
        .map(|client| ClientWithCompany {
            company: companies.get(&client.company_id).cloned(),
            client,
        })
        .collect())
}

async fn with_company(db: &Database, client: Client) -> Result<ClientWithCompany, AppError> {
    let mut embedded = with_companies(db, vec![client]).await?;
    embedded.pop().ok_or_else(not_found)
}

pub async fn create_client(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientWithCompany>), AppError> {
    tracing::info!(company_id = %payload.company_id, "Creating client");

    ensure_company(&state.db, payload.company_id)
        .await
        .map_err(track_error)?;

    let input = CreateClient::from(payload);
    let client = state.db.create_client(&input).await.map_err(track_error)?;
    let client = with_company(&state.db, client).await.map_err(track_error)?;

    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<Vec<ClientWithCompany>>, AppError> {
    let clients = state
        .db
        .list_clients(query.company_id)
        .await
        .map_err(track_error)?;
    let clients = with_companies(&state.db, clients)
        .await
        .map_err(track_error)?;

    Ok(Json(clients))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<ClientWithCompany>, AppError> {
    let client = state
        .db
        .get_client(client_id)
        .await
        .map_err(track_error)?
        .ok_or_else(not_found)?;
    let client = with_company(&state.db, client).await.map_err(track_error)?;

    Ok(Json(client))
}

pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateClientRequest>,
) -> Result<Json<ClientWithCompany>, AppError> {
    tracing::info!(client_id = %client_id, "Updating client");

    if let Some(company_id) = payload.company_id {
        ensure_company(&state.db, company_id)
            .await
            .map_err(track_error)?;
    }

    let input = UpdateClient::from(payload);
    let client = state
        .db
        .update_client(client_id, &input)
        .await
        .map_err(track_error)?
        .ok_or_else(not_found)?;
    let client = with_company(&state.db, client).await.map_err(track_error)?;

    Ok(Json(client))
}

/// Fails with 409 while the client still has invoices.
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!(client_id = %client_id, "Deleting client");

    if !state.db.delete_client(client_id).await.map_err(track_error)? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
