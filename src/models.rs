use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Guest,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_guest(self) -> bool {
        matches!(self, Role::Guest)
    }
}

/// Soft-delete state shared by every tenant entity. Restore clears both
/// fields, so a soft-delete/restore round-trip leaves the record observably
/// unchanged apart from `updated_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.deleted = true;
        self.deleted_at = Some(now);
    }

    pub fn restore(&mut self) {
        self.deleted = false;
        self.deleted_at = None;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Query mode threaded through every store read. Standard queries see active
/// records only; restore and archive listings opt in explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFilter {
    Active,
    IncludeDeleted,
    DeletedOnly,
}

impl DeleteFilter {
    pub fn admits(self, lifecycle: &Lifecycle) -> bool {
        match self {
            DeleteFilter::Active => !lifecycle.deleted,
            DeleteFilter::IncludeDeleted => true,
            DeleteFilter::DeletedOnly => lifecycle.deleted,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surnames: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nif: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    // verification or password-reset code, whichever was issued last
    #[serde(skip_serializing)]
    pub code: Option<u32>,
    #[serde(skip_serializing)]
    pub recovery_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Uuid>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub cif: String,
    pub street: String,
    pub number: i64,
    pub postal: String,
    pub city: String,
    pub province: String,
    // back-references; entries may dangle after a hard delete
    pub clients: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub street: String,
    pub number: i64,
    pub postal: String,
    pub city: String,
    pub province: String,
    pub phone: String,
    pub email: String,
    pub company: Uuid,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub client: Uuid,
    pub company: Uuid,
    pub user: Uuid,
    // ordered; entries may dangle after a note hard delete
    pub delivery_notes: Vec<Uuid>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Format-dependent payload of a delivery note. Each variant carries exactly
/// the fields its format requires, so a payload missing them fails to parse
/// before any write happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum NoteDetail {
    Hours { hours: f64 },
    Material { material: String, quantity: f64 },
}

impl NoteDetail {
    pub fn format(&self) -> &'static str {
        match self {
            NoteDetail::Hours { .. } => "hours",
            NoteDetail::Material { .. } => "material",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryNote {
    pub id: Uuid,
    pub company: Uuid,
    pub project_id: Uuid,
    pub client_id: Uuid,
    // responsible user, bound automatically for the hours format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub created_by: Uuid,
    #[serde(flatten)]
    pub detail: NoteDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    pub pending: bool,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryNote {
    pub fn is_signed(&self) -> bool {
        self.sign.is_some()
    }
}
