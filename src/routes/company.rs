use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    error::{AppError, AppResult},
    models::{Company, DeleteFilter, Lifecycle, User},
    state::AppState,
};

use super::{DeleteMode, MessageResponse};

#[derive(Deserialize)]
pub struct CompanyRequest {
    pub name: String,
    pub cif: String,
    pub street: String,
    pub number: i64,
    pub postal: String,
    pub city: String,
    pub province: String,
}

impl CompanyRequest {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty()
            || self.street.trim().is_empty()
            || self.city.trim().is_empty()
            || self.province.trim().is_empty()
        {
            return Err(AppError::bad_request("MISSING_REQUIRED_FIELDS"));
        }
        if self.cif.trim().len() != 9 {
            return Err(AppError::bad_request("INVALID_CIF"));
        }
        if self.postal.len() != 5 || !self.postal.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(AppError::bad_request("INVALID_POSTAL_CODE"));
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct CompanyResponse {
    pub message: String,
    pub company: Company,
}

fn apply(company: &mut Company, payload: CompanyRequest) {
    company.name = payload.name.trim().to_string();
    company.cif = payload.cif.trim().to_string();
    company.street = payload.street.trim().to_string();
    company.number = payload.number;
    company.postal = payload.postal;
    company.city = payload.city.trim().to_string();
    company.province = payload.province.trim().to_string();
    company.updated_at = Utc::now();
}

/// Updates the caller's company in place, or creates one and links the caller
/// when none is associated yet.
async fn upsert_own_company(
    state: &AppState,
    mut user: User,
    payload: CompanyRequest,
) -> AppResult<Company> {
    let current = match user.company {
        Some(company_id) => {
            state
                .store
                .find_company(company_id, DeleteFilter::Active)
                .await?
        }
        None => None,
    };

    match current {
        Some(mut company) => {
            apply(&mut company, payload);
            Ok(state.store.save_company(company).await?)
        }
        None => {
            let now = Utc::now();
            let mut company = Company {
                id: Uuid::new_v4(),
                name: String::new(),
                cif: String::new(),
                street: String::new(),
                number: 0,
                postal: String::new(),
                city: String::new(),
                province: String::new(),
                clients: Vec::new(),
                logo: None,
                lifecycle: Lifecycle::default(),
                created_at: now,
                updated_at: now,
            };
            apply(&mut company, payload);
            state.store.insert_company(company.clone()).await?;

            user.company = Some(company.id);
            user.updated_at = Utc::now();
            state.store.save_user(user).await?;
            Ok(company)
        }
    }
}

/// Upsert-by-cif registration: a cif that already exists links the caller to
/// the existing company instead of erroring.
pub async fn register_company(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CompanyRequest>,
) -> AppResult<Json<CompanyResponse>> {
    payload.validate()?;

    let mut user = ctx.user;
    if let Some(existing) = state
        .store
        .find_company_by_cif(payload.cif.trim(), DeleteFilter::Active)
        .await?
    {
        user.company = Some(existing.id);
        user.updated_at = Utc::now();
        state.store.save_user(user).await?;
        return Ok(Json(CompanyResponse {
            message: "Company already exists. Linked user to existing company.".to_string(),
            company: existing,
        }));
    }

    let company = upsert_own_company(&state, user, payload).await?;
    Ok(Json(CompanyResponse {
        message: "Company information updated".to_string(),
        company,
    }))
}

pub async fn update_company(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CompanyRequest>,
) -> AppResult<Json<CompanyResponse>> {
    ctx.require_admin()?;
    payload.validate()?;

    let user = ctx.user;
    let conflicting = state
        .store
        .find_company_by_cif(payload.cif.trim(), DeleteFilter::IncludeDeleted)
        .await?;
    if let Some(other) = conflicting {
        if user.company != Some(other.id) {
            return Err(AppError::conflict("CIF_ALREADY_IN_USE"));
        }
    }

    let company = upsert_own_company(&state, user, payload).await?;
    Ok(Json(CompanyResponse {
        message: "Company updated successfully".to_string(),
        company,
    }))
}

pub async fn update_logo(
    State(state): State<AppState>,
    ctx: AuthContext,
    mut multipart: Multipart,
) -> AppResult<Json<Company>> {
    ctx.require_admin()?;
    let company_id = ctx
        .user
        .company
        .ok_or_else(|| AppError::not_found("COMPANY_NOT_ASSOCIATED"))?;

    let mut company = state
        .store
        .find_company(company_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("COMPANY_NOT_FOUND"))?;

    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("INVALID_MULTIPART_BODY"))?
    {
        if field.name() == Some("image") {
            let filename = field
                .file_name()
                .map(|name| name.to_string())
                .unwrap_or_else(|| "logo".to_string());
            let content_type = field.content_type().map(|value| value.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|_| AppError::bad_request("INVALID_MULTIPART_BODY"))?;
            upload = Some((filename, content_type, data.to_vec()));
        }
    }

    let (filename, content_type, data) =
        upload.ok_or_else(|| AppError::bad_request("NO_FILE_UPLOADED"))?;

    let key = format!("logo-{}-{}", company.id, filename);
    let url = state.storage.upload(&key, data, content_type).await?;

    company.logo = Some(url);
    company.updated_at = Utc::now();
    let company = state.store.save_company(company).await?;

    Ok(Json(company))
}

pub async fn delete_company(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(mode): Query<DeleteMode>,
) -> AppResult<Json<MessageResponse>> {
    ctx.require_admin()?;
    let company_id = ctx
        .user
        .company
        .ok_or_else(|| AppError::not_found("COMPANY_NOT_ASSOCIATED"))?;

    let mut company = state
        .store
        .find_company(company_id, DeleteFilter::IncludeDeleted)
        .await?
        .ok_or_else(|| AppError::not_found("COMPANY_NOT_ASSOCIATED"))?;

    if mode.is_hard() {
        state.store.delete_company(company.id).await?;
        Ok(Json(MessageResponse::new("COMPANY_HARD_DELETED")))
    } else {
        company.lifecycle.soft_delete(Utc::now());
        company.updated_at = Utc::now();
        state.store.save_company(company).await?;
        Ok(Json(MessageResponse::new("COMPANY_SOFT_DELETED")))
    }
}
