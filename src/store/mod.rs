pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Client, Company, DeleteFilter, DeliveryNote, Project, User};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document-store facade: one collection per entity, filter-by-field reads,
/// atomic single-document writes. Every read takes an explicit [`DeleteFilter`]
/// so soft-deleted records never leak into a query that did not ask for them.
///
/// There are no multi-document transactions; callers that chain dependent
/// writes accept the partial-failure window.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // users
    async fn insert_user(&self, user: User) -> StoreResult<()>;
    async fn find_user(&self, id: Uuid, filter: DeleteFilter) -> StoreResult<Option<User>>;
    async fn find_user_by_email(
        &self,
        email: &str,
        filter: DeleteFilter,
    ) -> StoreResult<Option<User>>;
    /// Replaces the stored document; fails with [`StoreError::NotFound`] when
    /// the record was hard-deleted underneath the caller.
    async fn save_user(&self, user: User) -> StoreResult<User>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    // companies
    async fn insert_company(&self, company: Company) -> StoreResult<()>;
    async fn find_company(&self, id: Uuid, filter: DeleteFilter) -> StoreResult<Option<Company>>;
    async fn find_company_by_cif(
        &self,
        cif: &str,
        filter: DeleteFilter,
    ) -> StoreResult<Option<Company>>;
    async fn save_company(&self, company: Company) -> StoreResult<Company>;
    async fn delete_company(&self, id: Uuid) -> StoreResult<()>;

    // clients
    async fn insert_client(&self, client: Client) -> StoreResult<()>;
    async fn find_client(&self, id: Uuid, filter: DeleteFilter) -> StoreResult<Option<Client>>;
    async fn find_client_by_email(
        &self,
        company: Uuid,
        email: &str,
        filter: DeleteFilter,
    ) -> StoreResult<Option<Client>>;
    async fn list_clients(&self, company: Uuid, filter: DeleteFilter) -> StoreResult<Vec<Client>>;
    async fn save_client(&self, client: Client) -> StoreResult<Client>;
    async fn delete_client(&self, id: Uuid) -> StoreResult<()>;

    // projects
    async fn insert_project(&self, project: Project) -> StoreResult<()>;
    async fn find_project(&self, id: Uuid, filter: DeleteFilter) -> StoreResult<Option<Project>>;
    async fn find_project_by_name(
        &self,
        company: Uuid,
        name: &str,
        filter: DeleteFilter,
    ) -> StoreResult<Option<Project>>;
    async fn list_projects(&self, company: Uuid, filter: DeleteFilter)
        -> StoreResult<Vec<Project>>;
    async fn save_project(&self, project: Project) -> StoreResult<Project>;
    async fn delete_project(&self, id: Uuid) -> StoreResult<()>;

    // delivery notes
    async fn insert_note(&self, note: DeliveryNote) -> StoreResult<()>;
    async fn find_note(&self, id: Uuid, filter: DeleteFilter)
        -> StoreResult<Option<DeliveryNote>>;
    async fn list_notes(
        &self,
        company: Uuid,
        filter: DeleteFilter,
    ) -> StoreResult<Vec<DeliveryNote>>;
    async fn save_note(&self, note: DeliveryNote) -> StoreResult<DeliveryNote>;
    async fn delete_note(&self, id: Uuid) -> StoreResult<()>;
}
