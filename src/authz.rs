//! Company-scope and role checks applied before every tenant-entity
//! operation. All checks run before any mutation is attempted.

use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{AppError, AppResult};

/// What a company-scope mismatch looks like to the caller. `Reject` answers
/// with the entity's `UNAUTHORIZED_*` code (403); `Conceal` answers exactly
/// like a miss in a company-scoped query (404), so existence is never
/// confirmed across tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossTenantPolicy {
    #[default]
    Reject,
    Conceal,
}

impl CrossTenantPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reject" => Some(CrossTenantPolicy::Reject),
            "conceal" => Some(CrossTenantPolicy::Conceal),
            _ => None,
        }
    }
}

impl AuthContext {
    /// Company-scoped operations fail fast, before any entity lookup.
    pub fn require_company(&self) -> AppResult<Uuid> {
        self.user
            .company
            .ok_or_else(|| AppError::forbidden("USER_NOT_ASSOCIATED_WITH_COMPANY"))
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.user.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("NOT_ALLOWED"))
        }
    }
}

/// Tenant-isolation check for an entity already fetched by id.
pub fn ensure_company_scope(
    policy: CrossTenantPolicy,
    caller_company: Uuid,
    entity_company: Uuid,
    unauthorized_code: &'static str,
    not_found_code: &'static str,
) -> AppResult<()> {
    if caller_company == entity_company {
        return Ok(());
    }
    match policy {
        CrossTenantPolicy::Reject => Err(AppError::forbidden(unauthorized_code)),
        CrossTenantPolicy::Conceal => Err(AppError::not_found(not_found_code)),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn parse_known_policies() {
        assert_eq!(
            CrossTenantPolicy::parse("reject"),
            Some(CrossTenantPolicy::Reject)
        );
        assert_eq!(
            CrossTenantPolicy::parse("conceal"),
            Some(CrossTenantPolicy::Conceal)
        );
        assert_eq!(CrossTenantPolicy::parse("mask"), None);
    }

    #[test]
    fn same_company_passes() {
        let company = Uuid::new_v4();
        assert!(ensure_company_scope(
            CrossTenantPolicy::Reject,
            company,
            company,
            "UNAUTHORIZED_CLIENT_ACCESS",
            "CLIENT_NOT_FOUND",
        )
        .is_ok());
    }

    #[test]
    fn mismatch_maps_to_policy_status() {
        let rejected = ensure_company_scope(
            CrossTenantPolicy::Reject,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "UNAUTHORIZED_CLIENT_ACCESS",
            "CLIENT_NOT_FOUND",
        )
        .unwrap_err();
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
        assert_eq!(rejected.code(), "UNAUTHORIZED_CLIENT_ACCESS");

        let concealed = ensure_company_scope(
            CrossTenantPolicy::Conceal,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "UNAUTHORIZED_CLIENT_ACCESS",
            "CLIENT_NOT_FOUND",
        )
        .unwrap_err();
        assert_eq!(concealed.status(), StatusCode::NOT_FOUND);
        assert_eq!(concealed.code(), "CLIENT_NOT_FOUND");
    }
}
