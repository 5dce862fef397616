use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    authz::ensure_company_scope,
    error::{AppError, AppResult},
    models::{Client, DeleteFilter, Lifecycle},
    state::AppState,
};

use super::auth::validate_email;
use super::{DeleteMode, MessageResponse};

#[derive(Deserialize)]
pub struct ClientRequest {
    pub name: String,
    pub street: String,
    pub number: i64,
    pub postal: String,
    pub city: String,
    pub province: String,
    pub phone: String,
    pub email: String,
}

impl ClientRequest {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty()
            || self.street.trim().is_empty()
            || self.city.trim().is_empty()
            || self.province.trim().is_empty()
            || self.phone.trim().is_empty()
        {
            return Err(AppError::bad_request("MISSING_REQUIRED_FIELDS"));
        }
        if self.postal.len() != 5 || !self.postal.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(AppError::bad_request("INVALID_POSTAL_CODE"));
        }
        validate_email(&self.email)
    }

    fn email_normalized(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

fn apply(client: &mut Client, payload: ClientRequest) {
    client.email = payload.email_normalized();
    client.name = payload.name.trim().to_string();
    client.street = payload.street.trim().to_string();
    client.number = payload.number;
    client.postal = payload.postal;
    client.city = payload.city.trim().to_string();
    client.province = payload.province.trim().to_string();
    client.phone = payload.phone.trim().to_string();
    client.updated_at = Utc::now();
}

pub async fn register_client(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<ClientRequest>,
) -> AppResult<Json<Client>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;
    payload.validate()?;

    // uniqueness is scoped to (email, company); the store's unique index is
    // the true arbiter under concurrent creates
    let duplicate = state
        .store
        .find_client_by_email(company_id, &payload.email_normalized(), DeleteFilter::Active)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::conflict("CLIENT_ALREADY_EXISTS"));
    }

    let now = Utc::now();
    let mut client = Client {
        id: Uuid::new_v4(),
        name: String::new(),
        street: String::new(),
        number: 0,
        postal: String::new(),
        city: String::new(),
        province: String::new(),
        phone: String::new(),
        email: String::new(),
        company: company_id,
        lifecycle: Lifecycle::default(),
        created_at: now,
        updated_at: now,
    };
    apply(&mut client, payload);
    state.store.insert_client(client.clone()).await?;

    // back-reference on the company; not atomic with the insert above
    if let Some(mut company) = state
        .store
        .find_company(company_id, DeleteFilter::Active)
        .await?
    {
        company.clients.push(client.id);
        company.updated_at = Utc::now();
        state.store.save_company(company).await?;
    }

    Ok(Json(client))
}

pub async fn list_clients(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<Vec<Client>>> {
    let company_id = ctx.require_company()?;
    let clients = state
        .store
        .list_clients(company_id, DeleteFilter::Active)
        .await?;
    Ok(Json(clients))
}

pub async fn get_client(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    let company_id = ctx.require_company()?;

    let client = state
        .store
        .find_client(client_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("CLIENT_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        client.company,
        "UNAUTHORIZED_CLIENT_ACCESS",
        "CLIENT_NOT_FOUND",
    )?;

    Ok(Json(client))
}

pub async fn update_client(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<ClientRequest>,
) -> AppResult<Json<Client>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;
    payload.validate()?;

    let mut client = state
        .store
        .find_client(client_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("CLIENT_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        client.company,
        "UNAUTHORIZED_CLIENT_UPDATE",
        "CLIENT_NOT_FOUND",
    )?;

    let email = payload.email_normalized();
    if email != client.email {
        let duplicate = state
            .store
            .find_client_by_email(company_id, &email, DeleteFilter::Active)
            .await?;
        if duplicate.is_some() {
            return Err(AppError::conflict("CLIENT_ALREADY_EXISTS"));
        }
    }

    apply(&mut client, payload);
    let client = state.store.save_client(client).await?;
    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(client_id): Path<Uuid>,
    Query(mode): Query<DeleteMode>,
) -> AppResult<Json<MessageResponse>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;

    let mut client = state
        .store
        .find_client(client_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("CLIENT_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        client.company,
        "UNAUTHORIZED_CLIENT_DELETE",
        "CLIENT_NOT_FOUND",
    )?;

    if mode.is_hard() {
        // projects referencing this client keep their now-dangling reference
        state.store.delete_client(client.id).await?;
        Ok(Json(MessageResponse::new("CLIENT_HARD_DELETED")))
    } else {
        client.lifecycle.soft_delete(Utc::now());
        client.updated_at = Utc::now();
        state.store.save_client(client).await?;
        Ok(Json(MessageResponse::new("CLIENT_SOFT_DELETED")))
    }
}

pub async fn restore_client(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;

    let mut client = state
        .store
        .find_client(client_id, DeleteFilter::IncludeDeleted)
        .await?
        .ok_or_else(|| AppError::not_found("CLIENT_NOT_FOUND"))?;
    if !client.lifecycle.is_deleted() {
        return Err(AppError::bad_request("CLIENT_NOT_SOFT_DELETED"));
    }
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        client.company,
        "UNAUTHORIZED_CLIENT_RESTORE",
        "CLIENT_NOT_FOUND",
    )?;

    client.lifecycle.restore();
    client.updated_at = Utc::now();
    let client = state.store.save_client(client).await?;
    Ok(Json(client))
}
