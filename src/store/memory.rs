use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Client, Company, DeleteFilter, DeliveryNote, Project, User};

use super::{DataStore, StoreError, StoreResult};

/// In-process document store. Each collection is an id-keyed map guarded by
/// its own lock, so every operation is a single-document read or write.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    companies: RwLock<HashMap<Uuid, Company>>,
    clients: RwLock<HashMap<Uuid, Client>>,
    projects: RwLock<HashMap<Uuid, Project>>,
    notes: RwLock<HashMap<Uuid, DeliveryNote>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_creation<T, F>(mut records: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<chrono::Utc>,
{
    records.sort_by_key(|record| created_at(record));
    records
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn insert_user(&self, user: User) -> StoreResult<()> {
        self.users.write().await.insert(user.id, user);
        Ok(())
    }

    async fn find_user(&self, id: Uuid, filter: DeleteFilter) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .get(&id)
            .filter(|user| filter.admits(&user.lifecycle))
            .cloned())
    }

    async fn find_user_by_email(
        &self,
        email: &str,
        filter: DeleteFilter,
    ) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| user.email == email && filter.admits(&user.lifecycle))
            .cloned())
    }

    async fn save_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn insert_company(&self, company: Company) -> StoreResult<()> {
        self.companies.write().await.insert(company.id, company);
        Ok(())
    }

    async fn find_company(&self, id: Uuid, filter: DeleteFilter) -> StoreResult<Option<Company>> {
        let companies = self.companies.read().await;
        Ok(companies
            .get(&id)
            .filter(|company| filter.admits(&company.lifecycle))
            .cloned())
    }

    async fn find_company_by_cif(
        &self,
        cif: &str,
        filter: DeleteFilter,
    ) -> StoreResult<Option<Company>> {
        let companies = self.companies.read().await;
        Ok(companies
            .values()
            .find(|company| company.cif == cif && filter.admits(&company.lifecycle))
            .cloned())
    }

    async fn save_company(&self, company: Company) -> StoreResult<Company> {
        let mut companies = self.companies.write().await;
        if !companies.contains_key(&company.id) {
            return Err(StoreError::NotFound);
        }
        companies.insert(company.id, company.clone());
        Ok(company)
    }

    async fn delete_company(&self, id: Uuid) -> StoreResult<()> {
        self.companies
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn insert_client(&self, client: Client) -> StoreResult<()> {
        self.clients.write().await.insert(client.id, client);
        Ok(())
    }

    async fn find_client(&self, id: Uuid, filter: DeleteFilter) -> StoreResult<Option<Client>> {
        let clients = self.clients.read().await;
        Ok(clients
            .get(&id)
            .filter(|client| filter.admits(&client.lifecycle))
            .cloned())
    }

    async fn find_client_by_email(
        &self,
        company: Uuid,
        email: &str,
        filter: DeleteFilter,
    ) -> StoreResult<Option<Client>> {
        let clients = self.clients.read().await;
        Ok(clients
            .values()
            .find(|client| {
                client.company == company
                    && client.email == email
                    && filter.admits(&client.lifecycle)
            })
            .cloned())
    }

    async fn list_clients(&self, company: Uuid, filter: DeleteFilter) -> StoreResult<Vec<Client>> {
        let clients = self.clients.read().await;
        let matching = clients
            .values()
            .filter(|client| client.company == company && filter.admits(&client.lifecycle))
            .cloned()
            .collect();
        Ok(sorted_by_creation(matching, |client| client.created_at))
    }

    async fn save_client(&self, client: Client) -> StoreResult<Client> {
        let mut clients = self.clients.write().await;
        if !clients.contains_key(&client.id) {
            return Err(StoreError::NotFound);
        }
        clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn delete_client(&self, id: Uuid) -> StoreResult<()> {
        self.clients
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn insert_project(&self, project: Project) -> StoreResult<()> {
        self.projects.write().await.insert(project.id, project);
        Ok(())
    }

    async fn find_project(&self, id: Uuid, filter: DeleteFilter) -> StoreResult<Option<Project>> {
        let projects = self.projects.read().await;
        Ok(projects
            .get(&id)
            .filter(|project| filter.admits(&project.lifecycle))
            .cloned())
    }

    async fn find_project_by_name(
        &self,
        company: Uuid,
        name: &str,
        filter: DeleteFilter,
    ) -> StoreResult<Option<Project>> {
        let projects = self.projects.read().await;
        Ok(projects
            .values()
            .find(|project| {
                project.company == company
                    && project.name == name
                    && filter.admits(&project.lifecycle)
            })
            .cloned())
    }

    async fn list_projects(
        &self,
        company: Uuid,
        filter: DeleteFilter,
    ) -> StoreResult<Vec<Project>> {
        let projects = self.projects.read().await;
        let matching = projects
            .values()
            .filter(|project| project.company == company && filter.admits(&project.lifecycle))
            .cloned()
            .collect();
        Ok(sorted_by_creation(matching, |project| project.created_at))
    }

    async fn save_project(&self, project: Project) -> StoreResult<Project> {
        let mut projects = self.projects.write().await;
        if !projects.contains_key(&project.id) {
            return Err(StoreError::NotFound);
        }
        projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<()> {
        self.projects
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn insert_note(&self, note: DeliveryNote) -> StoreResult<()> {
        self.notes.write().await.insert(note.id, note);
        Ok(())
    }

    async fn find_note(
        &self,
        id: Uuid,
        filter: DeleteFilter,
    ) -> StoreResult<Option<DeliveryNote>> {
        let notes = self.notes.read().await;
        Ok(notes
            .get(&id)
            .filter(|note| filter.admits(&note.lifecycle))
            .cloned())
    }

    async fn list_notes(
        &self,
        company: Uuid,
        filter: DeleteFilter,
    ) -> StoreResult<Vec<DeliveryNote>> {
        let notes = self.notes.read().await;
        let matching = notes
            .values()
            .filter(|note| note.company == company && filter.admits(&note.lifecycle))
            .cloned()
            .collect();
        Ok(sorted_by_creation(matching, |note| note.created_at))
    }

    async fn save_note(&self, note: DeliveryNote) -> StoreResult<DeliveryNote> {
        let mut notes = self.notes.write().await;
        if !notes.contains_key(&note.id) {
            return Err(StoreError::NotFound);
        }
        notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn delete_note(&self, id: Uuid) -> StoreResult<()> {
        self.notes
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
