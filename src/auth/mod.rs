pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;

use crate::{error::AppError, models::DeleteFilter, models::User, state::AppState};

/// Per-request authorization context: the bearer token is verified, then the
/// user is re-loaded from the store. Tokens carry no revocation state, so the
/// store is the authority on whether the account still exists or was deleted.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized("NOT_TOKEN"))?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized("NOT_SESSION"))?;

        // verification-scoped tokens only complete verification, never grant access
        if claims.verification_pending {
            return Err(AppError::unauthorized("INVALID_TOKEN"));
        }

        let user = state
            .store
            .find_user(claims.sub, DeleteFilter::IncludeDeleted)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::not_found("USER_NOT_FOUND"))?;

        if user.lifecycle.is_deleted() {
            return Err(AppError::forbidden("USER_DELETED"));
        }

        Ok(AuthContext { user })
    }
}
