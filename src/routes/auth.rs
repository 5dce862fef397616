use axum::{extract::State, Json};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::typed_header::TypedHeader;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::password,
    error::{AppError, AppResult},
    models::{DeleteFilter, Lifecycle, Role, User},
    state::AppState,
};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub surnames: Option<String>,
    #[serde(default)]
    pub nif: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub verification_token: String,
    pub code: u32,
}

/// Uniform over the full 6-digit range.
pub(crate) fn generate_code() -> u32 {
    rand::thread_rng().gen_range(100_000..=999_999)
}

pub(crate) fn validate_email(email: &str) -> AppResult<()> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') || trimmed.starts_with('@') {
        return Err(AppError::bad_request("INVALID_EMAIL"));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    validate_email(&payload.email)?;
    if payload.password.len() < 8 {
        return Err(AppError::bad_request("PASSWORD_TOO_SHORT"));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("NAME_REQUIRED"));
    }

    let email = payload.email.trim().to_lowercase();
    let existing = state
        .store
        .find_user_by_email(&email, DeleteFilter::Active)
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict("USER_EXISTS"));
    }

    let now = Utc::now();
    let code = generate_code();
    let user = User {
        id: Uuid::new_v4(),
        email: email.clone(),
        name: Some(payload.name.trim().to_string()),
        surnames: payload.surnames,
        nif: payload.nif,
        password_hash: Some(password::hash_password(&payload.password)?),
        role: Role::User,
        is_verified: false,
        code: Some(code),
        recovery_attempts: 0,
        company: None,
        lifecycle: Lifecycle::default(),
        created_at: now,
        updated_at: now,
    };

    state.store.insert_user(user.clone()).await?;

    state
        .mailer
        .send(
            &email,
            &format!("Your verification code is: {code}"),
            None,
            Some(&format!("<h1>Your verification code is: {code}</h1>")),
        )
        .await?;

    let verification_token = state.jwt.generate_verification_token(&user)?;

    Ok(Json(RegisterResponse {
        message: "Registration pending verification. Check your inbox.".to_string(),
        verification_token,
        code,
    }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    let mut user = state
        .store
        .find_user_by_email(&email, DeleteFilter::IncludeDeleted)
        .await?
        .ok_or_else(|| AppError::not_found("USER_NOT_EXISTS"))?;

    if !user.is_verified && !user.role.is_guest() {
        return Err(AppError::forbidden("USER_NOT_VERIFIED"));
    }

    // guests skip the verification gate on first login
    if user.role.is_guest() && !user.is_verified {
        user.is_verified = true;
        user.updated_at = Utc::now();
        user = state.store.save_user(user).await?;
    }

    if user.lifecycle.is_deleted() {
        return Err(AppError::forbidden("USER_DELETED"));
    }

    let valid = match &user.password_hash {
        Some(hash) => password::verify_password(&payload.password, hash)?,
        None => false,
    };
    if !valid {
        return Err(AppError::unauthorized("INVALID_PASSWORD"));
    }

    let token = state.jwt.generate_access_token(&user)?;
    Ok(Json(LoginResponse { token, user }))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub message: String,
    pub token: String,
}

pub async fn verify(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(payload): Json<VerifyRequest>,
) -> AppResult<Json<VerifyResponse>> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AppError::unauthorized("NOT_TOKEN"))?;

    let claims = state
        .jwt
        .verify_token(bearer.token())
        .map_err(|_| AppError::unauthorized("INVALID_TOKEN"))?;
    if !claims.verification_pending {
        return Err(AppError::unauthorized("INVALID_TOKEN"));
    }

    let submitted: u32 = payload
        .code
        .trim()
        .parse()
        .map_err(|_| AppError::bad_request("INVALID_CODE"))?;

    let mut user = state
        .store
        .find_user(claims.sub, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("USER_NOT_FOUND"))?;

    if user.is_verified {
        return Err(AppError::bad_request("USER_VERIFIED"));
    }
    if user.code != Some(submitted) {
        return Err(AppError::payment_required("INCORRECT_CODE"));
    }

    user.is_verified = true;
    user.code = None;
    user.updated_at = Utc::now();
    let user = state.store.save_user(user).await?;

    let token = state.jwt.generate_access_token(&user)?;
    Ok(Json(VerifyResponse {
        message: "VERIFIED".to_string(),
        token,
    }))
}
