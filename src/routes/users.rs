use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{password, AuthContext},
    error::{AppError, AppResult},
    models::{Company, DeleteFilter, Lifecycle, Role, User},
    state::AppState,
};

use super::auth::{generate_code, validate_email};
use super::{DeleteMode, MessageResponse};

/// User record with its company reference populated, the shape every profile
/// read returns. A dangling or archived company reference comes back as
/// `null`.
#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surnames: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nif: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

async fn populate_company(state: &AppState, user: &User) -> AppResult<Option<Company>> {
    match user.company {
        Some(company_id) => Ok(state
            .store
            .find_company(company_id, DeleteFilter::Active)
            .await?),
        None => Ok(None),
    }
}

fn profile(user: User, company: Option<Company>) -> ProfileResponse {
    ProfileResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        surnames: user.surnames,
        nif: user.nif,
        role: user.role,
        is_verified: user.is_verified,
        company,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

pub async fn get_me(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ProfileResponse>> {
    let company = populate_company(&state, &ctx.user).await?;
    Ok(Json(profile(ctx.user, company)))
}

pub async fn get_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ProfileResponse>> {
    ctx.require_admin()?;

    let user = state
        .store
        .find_user(user_id, DeleteFilter::IncludeDeleted)
        .await?
        .ok_or_else(|| AppError::not_found("USER_NOT_FOUND"))?;
    if user.lifecycle.is_deleted() {
        return Err(AppError::forbidden("USER_DELETED"));
    }

    let company = populate_company(&state, &user).await?;
    Ok(Json(profile(user, company)))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub surnames: Option<String>,
    pub nif: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub user: User,
}

pub async fn update_profile(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<UpdateProfileResponse>> {
    if payload.name.is_none()
        && payload.surnames.is_none()
        && payload.nif.is_none()
        && payload.email.is_none()
    {
        return Err(AppError::bad_request("NO_FIELDS_TO_UPDATE"));
    }

    let mut user = ctx.user;
    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("NAME_REQUIRED"));
        }
        user.name = Some(name.trim().to_string());
    }
    if let Some(surnames) = payload.surnames {
        user.surnames = Some(surnames);
    }
    if let Some(nif) = payload.nif {
        user.nif = Some(nif);
    }
    if let Some(email) = payload.email {
        validate_email(&email)?;
        let email = email.trim().to_lowercase();
        if email != user.email {
            let taken = state
                .store
                .find_user_by_email(&email, DeleteFilter::IncludeDeleted)
                .await?;
            if taken.is_some() {
                return Err(AppError::conflict("USER_EXISTS"));
            }
            user.email = email;
        }
    }

    user.updated_at = Utc::now();
    let user = state.store.save_user(user).await?;

    Ok(Json(UpdateProfileResponse {
        message: "USER_UPDATED".to_string(),
        user,
    }))
}

pub async fn delete_self(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(mode): Query<DeleteMode>,
) -> AppResult<Json<MessageResponse>> {
    let mut user = ctx.user;
    if mode.is_hard() {
        state.store.delete_user(user.id).await?;
        Ok(Json(MessageResponse::new("USER_HARD_DELETED")))
    } else {
        user.lifecycle.soft_delete(Utc::now());
        user.updated_at = Utc::now();
        state.store.save_user(user).await?;
        Ok(Json(MessageResponse::new("USER_SOFT_DELETED")))
    }
}

pub async fn delete_user_by_admin(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(user_id): Path<Uuid>,
    Query(mode): Query<DeleteMode>,
) -> AppResult<Json<MessageResponse>> {
    ctx.require_admin()?;

    let mut user = state
        .store
        .find_user(user_id, DeleteFilter::IncludeDeleted)
        .await?
        .ok_or_else(|| AppError::not_found("USER_NOT_FOUND"))?;

    if mode.is_hard() {
        state.store.delete_user(user.id).await?;
        Ok(Json(MessageResponse::new("USER_HARD_DELETED")))
    } else {
        user.lifecycle.soft_delete(Utc::now());
        user.updated_at = Utc::now();
        state.store.save_user(user).await?;
        Ok(Json(MessageResponse::new("USER_SOFT_DELETED")))
    }
}

pub async fn restore_user_by_admin(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    ctx.require_admin()?;

    let mut user = state
        .store
        .find_user(user_id, DeleteFilter::IncludeDeleted)
        .await?
        .ok_or_else(|| AppError::not_found("USER_NOT_FOUND"))?;
    if !user.lifecycle.is_deleted() {
        return Err(AppError::bad_request("USER_NOT_SOFT_DELETED"));
    }

    user.lifecycle.restore();
    user.updated_at = Utc::now();
    state.store.save_user(user).await?;

    Ok(Json(MessageResponse::new("USER_RESTORED_BY_ADMIN")))
}

#[derive(Deserialize)]
pub struct GuestRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub surnames: Option<String>,
    #[serde(default)]
    pub nif: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct GuestResponse {
    pub message: String,
    pub user: User,
}

/// Invites a guest into the caller's company. Guests skip the verification
/// gate at login, so no code is issued here.
pub async fn register_guest(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<GuestRequest>,
) -> AppResult<Json<GuestResponse>> {
    let company_id = ctx
        .user
        .company
        .ok_or_else(|| AppError::bad_request("COMPANY_NOT_ASSOCIATED"))?;
    state
        .store
        .find_company(company_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("COMPANY_NOT_FOUND"))?;

    validate_email(&payload.email)?;
    let email = payload.email.trim().to_lowercase();
    if state
        .store
        .find_user_by_email(&email, DeleteFilter::IncludeDeleted)
        .await?
        .is_some()
    {
        return Err(AppError::conflict("USER_EXISTS"));
    }

    let password_hash = match &payload.password {
        Some(raw) => {
            if raw.len() < 8 {
                return Err(AppError::bad_request("PASSWORD_TOO_SHORT"));
            }
            Some(password::hash_password(raw)?)
        }
        None => None,
    };

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.clone(),
        name: Some(payload.name.trim().to_string()),
        surnames: payload.surnames,
        nif: payload.nif,
        password_hash,
        role: Role::Guest,
        is_verified: false,
        code: None,
        recovery_attempts: 0,
        company: Some(company_id),
        lifecycle: Lifecycle::default(),
        created_at: now,
        updated_at: now,
    };
    state.store.insert_user(user.clone()).await?;

    if let Some(raw_password) = &payload.password {
        let full_name = match &user.surnames {
            Some(surnames) => format!("{} {}", payload.name.trim(), surnames),
            None => payload.name.trim().to_string(),
        };
        let html = format!(
            "<h2>Hello {full_name}!</h2>\
             <p>You have been registered as a guest user.</p>\
             <p><strong>Email:</strong> {email}</p>\
             <p><strong>Password:</strong> {raw_password}</p>"
        );
        state
            .mailer
            .send(&email, "Your access credentials", None, Some(&html))
            .await?;
    }

    Ok(Json(GuestResponse {
        message: "USER_REGISTERED".to_string(),
        user,
    }))
}

#[derive(Deserialize)]
pub struct RequestResetRequest {
    pub email: String,
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<RequestResetRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = payload.email.trim().to_lowercase();
    let mut user = state
        .store
        .find_user_by_email(&email, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("USER_NOT_FOUND"))?;

    let code = generate_code();
    user.code = Some(code);
    // counter is tracked but no lockout threshold is enforced yet
    user.recovery_attempts = 0;
    user.updated_at = Utc::now();
    state.store.save_user(user).await?;

    state
        .mailer
        .send(
            &email,
            "Password recovery",
            None,
            Some(&format!(
                "<p>Your password recovery code is: <strong>{code}</strong></p>"
            )),
        )
        .await?;

    Ok(Json(MessageResponse::new("RECOVERY_CODE_SENT")))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let code = payload.code.trim();
    if code.len() != 6 || !code.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(AppError::bad_request("INVALID_CODE"));
    }
    let submitted: u32 = code
        .parse()
        .map_err(|_| AppError::bad_request("INVALID_CODE"))?;

    let email = payload.email.trim().to_lowercase();
    let mut user = match state
        .store
        .find_user_by_email(&email, DeleteFilter::Active)
        .await?
    {
        Some(user) if user.code == Some(submitted) => user,
        _ => return Err(AppError::bad_request("INVALID_CODE")),
    };

    if payload.new_password.len() < 8 {
        return Err(AppError::bad_request("PASSWORD_TOO_SHORT"));
    }

    user.password_hash = Some(password::hash_password(&payload.new_password)?);
    user.code = None;
    user.recovery_attempts = 0;
    user.updated_at = Utc::now();
    state.store.save_user(user).await?;

    Ok(Json(MessageResponse::new("PASSWORD_RESET_SUCCESS")))
}
