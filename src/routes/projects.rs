use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    authz::ensure_company_scope,
    error::{AppError, AppResult},
    models::{DeleteFilter, Lifecycle, Project},
    state::AppState,
};

use super::{DeleteMode, MessageResponse};

#[derive(Deserialize)]
pub struct ProjectRequest {
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub client: Uuid,
}

impl ProjectRequest {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() || self.description.trim().is_empty() {
            return Err(AppError::bad_request("MISSING_REQUIRED_FIELDS"));
        }
        Ok(())
    }
}

/// The referenced client must live in the caller's company; a cross-tenant
/// reference is rejected outright, independent of the lookup policy.
async fn ensure_client_in_company(
    state: &AppState,
    company_id: Uuid,
    client_id: Uuid,
) -> AppResult<()> {
    let client = state
        .store
        .find_client(client_id, DeleteFilter::Active)
        .await?;
    match client {
        Some(client) if client.company == company_id => Ok(()),
        _ => Err(AppError::forbidden("CLIENT_NOT_ASSOCIATED_WITH_COMPANY")),
    }
}

pub async fn register_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<ProjectRequest>,
) -> AppResult<Json<Project>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;
    payload.validate()?;

    let duplicate = state
        .store
        .find_project_by_name(company_id, payload.name.trim(), DeleteFilter::Active)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::conflict("PROJECT_ALREADY_EXISTS"));
    }

    ensure_client_in_company(&state, company_id, payload.client).await?;

    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        description: payload.description.trim().to_string(),
        start_date: payload.start_date,
        end_date: payload.end_date,
        client: payload.client,
        company: company_id,
        user: ctx.user.id,
        delivery_notes: Vec::new(),
        lifecycle: Lifecycle::default(),
        created_at: now,
        updated_at: now,
    };
    state.store.insert_project(project.clone()).await?;

    Ok(Json(project))
}

pub async fn list_projects(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<Vec<Project>>> {
    let company_id = ctx.require_company()?;
    let projects = state
        .store
        .list_projects(company_id, DeleteFilter::Active)
        .await?;
    Ok(Json(projects))
}

pub async fn get_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    let company_id = ctx.require_company()?;

    let project = state
        .store
        .find_project(project_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("PROJECT_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        project.company,
        "UNAUTHORIZED_PROJECT_ACCESS",
        "PROJECT_NOT_FOUND",
    )?;

    Ok(Json(project))
}

pub async fn update_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<ProjectRequest>,
) -> AppResult<Json<Project>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;
    payload.validate()?;

    let mut project = state
        .store
        .find_project(project_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("PROJECT_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        project.company,
        "UNAUTHORIZED_PROJECT_UPDATE",
        "PROJECT_NOT_FOUND",
    )?;

    ensure_client_in_company(&state, company_id, payload.client).await?;

    let name = payload.name.trim().to_string();
    if name != project.name {
        let duplicate = state
            .store
            .find_project_by_name(company_id, &name, DeleteFilter::Active)
            .await?;
        if duplicate.is_some() {
            return Err(AppError::conflict("PROJECT_NAME_ALREADY_EXISTS"));
        }
    }

    // company is never writable through this endpoint
    project.name = name;
    project.description = payload.description.trim().to_string();
    project.start_date = payload.start_date;
    project.end_date = payload.end_date;
    project.client = payload.client;
    project.updated_at = Utc::now();
    let project = state.store.save_project(project).await?;

    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(project_id): Path<Uuid>,
    Query(mode): Query<DeleteMode>,
) -> AppResult<Json<MessageResponse>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;

    let mut project = state
        .store
        .find_project(project_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("PROJECT_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        project.company,
        "UNAUTHORIZED_PROJECT_DELETE",
        "PROJECT_NOT_FOUND",
    )?;

    if mode.is_hard() {
        state.store.delete_project(project.id).await?;
        Ok(Json(MessageResponse::new("PROJECT_HARD_DELETED")))
    } else {
        project.lifecycle.soft_delete(Utc::now());
        project.updated_at = Utc::now();
        state.store.save_project(project).await?;
        Ok(Json(MessageResponse::new("PROJECT_SOFT_DELETED")))
    }
}

pub async fn list_archived_projects(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<Vec<Project>>> {
    let company_id = ctx.require_company()?;
    let projects = state
        .store
        .list_projects(company_id, DeleteFilter::DeletedOnly)
        .await?;
    Ok(Json(projects))
}

pub async fn get_archived_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    let company_id = ctx.require_company()?;

    let project = state
        .store
        .find_project(project_id, DeleteFilter::DeletedOnly)
        .await?
        .ok_or_else(|| AppError::not_found("ARCHIVED_PROJECT_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        project.company,
        "UNAUTHORIZED_PROJECT_ACCESS",
        "ARCHIVED_PROJECT_NOT_FOUND",
    )?;

    Ok(Json(project))
}

pub async fn recover_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;

    let mut project = state
        .store
        .find_project(project_id, DeleteFilter::DeletedOnly)
        .await?
        .ok_or_else(|| AppError::not_found("PROJECT_NOT_FOUND_OR_NOT_DELETED"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        project.company,
        "UNAUTHORIZED_PROJECT_RESTORE",
        "PROJECT_NOT_FOUND_OR_NOT_DELETED",
    )?;

    project.lifecycle.restore();
    project.updated_at = Utc::now();
    state.store.save_project(project).await?;

    Ok(Json(MessageResponse::new("PROJECT_RECOVERED")))
}
