use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

use fieldnote::auth::jwt::JwtService;
use fieldnote::auth::password;
use fieldnote::authz::CrossTenantPolicy;
use fieldnote::config::AppConfig;
use fieldnote::mailer::Mailer;
use fieldnote::models::{Lifecycle, Role, User};
use fieldnote::pdf::BasicPdfRenderer;
use fieldnote::routes;
use fieldnote::state::AppState;
use fieldnote::storage::ObjectStorage;
use fieldnote::store::{DataStore, MemoryStore};

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    upload_calls: Mutex<usize>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String> {
        let stored = StoredObject {
            key: filename.to_string(),
            bytes,
            content_type,
        };
        self.objects
            .lock()
            .await
            .insert(stored.key.clone(), stored);
        *self.upload_calls.lock().await += 1;
        Ok(format!("https://fake-storage/{filename}"))
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn upload_calls(&self) -> usize {
        *self.upload_calls.lock().await
    }
}

#[allow(dead_code)]
#[derive(Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: Option<String>,
}

#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<SentEmail>>,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _text: Option<&str>,
        html: Option<&str>,
    ) -> Result<()> {
        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.map(|value| value.to_string()),
        });
        Ok(())
    }
}

impl FakeMailer {
    #[allow(dead_code)]
    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    router: Router,
    storage: Arc<FakeStorage>,
    mailer: Arc<FakeMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(CrossTenantPolicy::Reject)
    }

    pub fn with_policy(policy: CrossTenantPolicy) -> Self {
        let config = AppConfig {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            access_token_expiry_minutes: 120,
            verification_token_expiry_minutes: 10,
            cross_tenant_access: policy,
            cors_allowed_origin: None,
            email_from: "no-reply@test.local".to_string(),
            smtp_host: None,
            smtp_username: None,
            smtp_password: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            public_storage_url: None,
        };

        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(FakeStorage::default());
        let mailer = Arc::new(FakeMailer::default());
        let jwt = JwtService::from_config(&config).expect("jwt service");
        let state = AppState::new(
            store.clone(),
            storage.clone(),
            mailer.clone(),
            Arc::new(BasicPdfRenderer),
            jwt,
            config,
        );
        let router = routes::create_router(state.clone());

        Self {
            state,
            store,
            router,
            storage,
            mailer,
        }
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    #[allow(dead_code)]
    pub fn mailer(&self) -> Arc<FakeMailer> {
        self.mailer.clone()
    }

    pub async fn insert_user(
        &self,
        email: &str,
        password: &str,
        role: Role,
        company: Option<Uuid>,
    ) -> Result<Uuid> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: Some("Test".to_string()),
            surnames: None,
            nif: None,
            password_hash: Some(password::hash_password(password)?),
            role,
            is_verified: true,
            code: None,
            recovery_attempts: 0,
            company,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(user.clone()).await?;
        Ok(user.id)
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/auth/login", &LoginPayload { email, password }, None)
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(Deserialize)]
        struct LoginResponse {
            token: String,
        }
        let parsed: LoginResponse = read_json(response).await?;
        Ok(parsed.token)
    }

    /// Inserts a verified admin, logs in, and registers a company via the
    /// upsert endpoint. Returns the access token and the company id.
    pub async fn admin_with_company(&self, email: &str, cif: &str) -> Result<(String, Uuid)> {
        self.insert_user(email, "admin-pass", Role::Admin, None)
            .await?;
        let token = self.login_token(email, "admin-pass").await?;
        let company_id = self.register_company(&token, cif).await?;
        Ok((token, company_id))
    }

    pub async fn register_company(&self, token: &str, cif: &str) -> Result<Uuid> {
        let payload = serde_json::json!({
            "name": "Obras del Norte SL",
            "cif": cif,
            "street": "Calle Mayor",
            "number": 3,
            "postal": "28001",
            "city": "Madrid",
            "province": "Madrid",
        });
        let response = self
            .patch_json("/api/user/company", &payload, Some(token))
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "company registration failed with status {}",
            response.status()
        );

        #[derive(Deserialize)]
        struct CompanyEnvelope {
            company: CompanyId,
        }
        #[derive(Deserialize)]
        struct CompanyId {
            id: Uuid,
        }
        let parsed: CompanyEnvelope = read_json(response).await?;
        Ok(parsed.company.id)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: Option<&str>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body)?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.request(
            Method::POST,
            path,
            Body::from(body),
            Some("application/json"),
            token,
        )
        .await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.request(
            Method::PUT,
            path,
            Body::from(body),
            Some("application/json"),
            token,
        )
        .await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.request(
            Method::PATCH,
            path,
            Body::from(body),
            Some("application/json"),
            token,
        )
        .await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.request(Method::GET, path, Body::empty(), None, token)
            .await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.request(Method::DELETE, path, Body::empty(), None, token)
            .await
    }

    #[allow(dead_code)]
    pub async fn upload_file(
        &self,
        method: Method,
        path: &str,
        field: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        self.request(
            method,
            path,
            Body::from(body),
            Some(&format!("multipart/form-data; boundary={boundary}")),
            Some(token),
        )
        .await
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body)
        .map_err(|err| anyhow!("failed to parse response body: {err}"))
}

#[allow(dead_code)]
pub async fn error_code(response: hyper::Response<Body>) -> Result<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    let parsed: ErrorBody = read_json(response).await?;
    Ok(parsed.error)
}
