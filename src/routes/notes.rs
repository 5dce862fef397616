use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    authz::ensure_company_scope,
    error::{AppError, AppResult},
    models::{Client, DeleteFilter, DeliveryNote, Lifecycle, NoteDetail, Project, User},
    pdf::NoteSnapshot,
    state::AppState,
};

use super::DeleteMode;

/// `{status, message, data}` envelope used by every delivery-note endpoint.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    fn success(message: &str, data: T) -> Self {
        Self {
            status: "success",
            message: message.to_string(),
            data,
        }
    }
}

#[derive(Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
    pub message: String,
}

impl StatusMessage {
    fn success(message: &str) -> Self {
        Self {
            status: "success",
            message: message.to_string(),
        }
    }
}

/// Note with its references populated where they still resolve; a dangling
/// reference simply leaves the populated field out.
#[derive(Serialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub note: DeliveryNote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<Client>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

async fn populate(state: &AppState, note: DeliveryNote) -> AppResult<NoteView> {
    let project = state
        .store
        .find_project(note.project_id, DeleteFilter::Active)
        .await?;
    let client = state
        .store
        .find_client(note.client_id, DeleteFilter::Active)
        .await?;
    let user = match note.user_id {
        Some(user_id) => state.store.find_user(user_id, DeleteFilter::Active).await?,
        None => None,
    };
    Ok(NoteView {
        note,
        project,
        client,
        user,
    })
}

fn parse_detail(raw: &Value) -> AppResult<NoteDetail> {
    serde_json::from_value(raw.clone())
        .map_err(|err| AppError::bad_request(format!("VALIDATION_ERROR: {err}")))
}

#[derive(Deserialize)]
struct CreateNoteRequest {
    project_id: Uuid,
    #[serde(default)]
    description: Option<String>,
}

pub async fn register_note(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(raw): Json<Value>,
) -> AppResult<(StatusCode, Json<Envelope<DeliveryNote>>)> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;

    // conditional requirements are enforced here, before any write
    let detail = parse_detail(&raw)?;
    let payload: CreateNoteRequest = serde_json::from_value(raw)
        .map_err(|err| AppError::bad_request(format!("VALIDATION_ERROR: {err}")))?;

    let mut project = state
        .store
        .find_project(payload.project_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("PROJECT_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        project.company,
        "UNAUTHORIZED_PROJECT_ACCESS",
        "PROJECT_NOT_FOUND",
    )?;

    let now = Utc::now();
    let note = DeliveryNote {
        id: Uuid::new_v4(),
        company: company_id,
        project_id: project.id,
        // the client comes from the project, not the payload
        client_id: project.client,
        user_id: matches!(detail, NoteDetail::Hours { .. }).then_some(ctx.user.id),
        created_by: ctx.user.id,
        detail,
        description: payload.description,
        sign: None,
        pdf: None,
        pending: true,
        lifecycle: Lifecycle::default(),
        created_at: now,
        updated_at: now,
    };
    state.store.insert_note(note.clone()).await?;

    // second write; a failure here leaves the note without a back-reference
    project.delivery_notes.push(note.id);
    project.updated_at = now;
    state.store.save_project(project).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            "Delivery note registered successfully",
            note,
        )),
    ))
}

pub async fn update_note(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(note_id): Path<Uuid>,
    Json(raw): Json<Value>,
) -> AppResult<Json<Envelope<DeliveryNote>>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;

    let mut note = state
        .store
        .find_note(note_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("DELIVERY_NOTE_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        note.company,
        "UNAUTHORIZED_DELIVERY_NOTE_UPDATE",
        "DELIVERY_NOTE_NOT_FOUND",
    )?;

    if raw.get("format").is_some() {
        let detail = parse_detail(&raw)?;
        note.user_id = matches!(detail, NoteDetail::Hours { .. }).then_some(ctx.user.id);
        note.detail = detail;
    }
    if let Some(description) = raw.get("description") {
        note.description = match description {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            _ => return Err(AppError::bad_request("VALIDATION_ERROR: description must be a string")),
        };
    }

    note.updated_at = Utc::now();
    let note = state.store.save_note(note).await?;

    Ok(Json(Envelope::success(
        "Delivery note updated successfully",
        note,
    )))
}

pub async fn list_notes(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<Envelope<Vec<NoteView>>>> {
    let company_id = ctx.require_company()?;

    let notes = state
        .store
        .list_notes(company_id, DeleteFilter::Active)
        .await?;
    let mut views = Vec::with_capacity(notes.len());
    for note in notes {
        views.push(populate(&state, note).await?);
    }

    Ok(Json(Envelope::success(
        "Delivery notes retrieved successfully",
        views,
    )))
}

pub async fn get_note(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(note_id): Path<Uuid>,
) -> AppResult<Json<Envelope<NoteView>>> {
    let company_id = ctx.require_company()?;

    let note = state
        .store
        .find_note(note_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("DELIVERY_NOTE_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        note.company,
        "UNAUTHORIZED_DELIVERY_NOTE_ACCESS",
        "DELIVERY_NOTE_NOT_FOUND",
    )?;

    Ok(Json(Envelope::success(
        "Delivery note retrieved successfully",
        populate(&state, note).await?,
    )))
}

pub async fn delete_note(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(note_id): Path<Uuid>,
    Query(mode): Query<DeleteMode>,
) -> AppResult<Json<StatusMessage>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;

    let mut note = state
        .store
        .find_note(note_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("DELIVERY_NOTE_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        note.company,
        "UNAUTHORIZED_DELIVERY_NOTE_DELETE",
        "DELIVERY_NOTE_NOT_FOUND",
    )?;

    // a signed note is permanently undeletable: no unsign operation exists
    if note.is_signed() {
        return Err(AppError::forbidden("CANNOT_DELETE_SIGNED_DELIVERY_NOTE"));
    }

    if mode.is_hard() {
        // the parent project keeps its now-dangling reference
        state.store.delete_note(note.id).await?;
        Ok(Json(StatusMessage::success(
            "Delivery note permanently deleted",
        )))
    } else {
        note.lifecycle.soft_delete(Utc::now());
        note.updated_at = Utc::now();
        state.store.save_note(note).await?;
        Ok(Json(StatusMessage::success("Delivery note soft-deleted")))
    }
}

#[derive(Serialize)]
pub struct PdfResponse {
    pub status: &'static str,
    pub message: String,
    pub pdf_url: String,
}

pub async fn get_note_pdf(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(note_id): Path<Uuid>,
) -> AppResult<Json<PdfResponse>> {
    let company_id = ctx.require_company()?;

    let mut note = state
        .store
        .find_note(note_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("DELIVERY_NOTE_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        note.company,
        "UNAUTHORIZED_DELIVERY_NOTE_ACCESS",
        "DELIVERY_NOTE_NOT_FOUND",
    )?;

    // idempotent: an existing reference is returned unchanged
    if let Some(pdf_url) = note.pdf.clone() {
        return Ok(Json(PdfResponse {
            status: "success",
            message: "PDF already generated".to_string(),
            pdf_url,
        }));
    }

    let snapshot = build_snapshot(&state, &note, None).await?;
    let bytes = state.pdf.render(&snapshot)?;
    let pdf_url = state
        .storage
        .upload(
            &format!("deliverynote-{}.pdf", note.id),
            bytes,
            Some("application/pdf".to_string()),
        )
        .await?;

    note.pdf = Some(pdf_url.clone());
    note.updated_at = Utc::now();
    state.store.save_note(note).await?;

    Ok(Json(PdfResponse {
        status: "success",
        message: "PDF generated and uploaded successfully".to_string(),
        pdf_url,
    }))
}

#[derive(Serialize)]
pub struct SignatureData {
    pub sign: String,
    pub pdf: String,
}

pub async fn upload_signature(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(note_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<Envelope<SignatureData>>> {
    let company_id = ctx.require_company()?;

    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("INVALID_MULTIPART_BODY"))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(|name| name.to_string())
                .unwrap_or_else(|| "signature".to_string());
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

    let mut note = state
        .store
        .find_note(note_id, DeleteFilter::Active)
        .await?
        .ok_or_else(|| AppError::not_found("DELIVERY_NOTE_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        note.company,
        "UNAUTHORIZED_DELIVERY_NOTE_ACCESS",
        "DELIVERY_NOTE_NOT_FOUND",
    )?;

    let sign_url = state
        .storage
        .upload(
            &format!("signature-{}-{}", note.id, filename),
            data.clone(),
            content_type,
        )
        .await?;
    note.sign = Some(sign_url.clone());

    // re-render with the signature embedded, overwriting the previous PDF
    let snapshot = build_snapshot(&state, &note, Some(data)).await?;
    let bytes = state.pdf.render(&snapshot)?;
    let pdf_url = state
        .storage
        .upload(
            &format!("deliverynote-{}.pdf", note.id),
            bytes,
            Some("application/pdf".to_string()),
        )
        .await?;

    note.pdf = Some(pdf_url.clone());
    note.updated_at = Utc::now();
    state.store.save_note(note).await?;

    Ok(Json(Envelope::success(
        "Signature uploaded and PDF regenerated",
        SignatureData {
            sign: sign_url,
            pdf: pdf_url,
        },
    )))
}

pub async fn restore_note(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(note_id): Path<Uuid>,
) -> AppResult<Json<Envelope<DeliveryNote>>> {
    ctx.require_admin()?;
    let company_id = ctx.require_company()?;

    let mut note = state
        .store
        .find_note(note_id, DeleteFilter::IncludeDeleted)
        .await?
        .ok_or_else(|| AppError::not_found("DELIVERY_NOTE_NOT_FOUND"))?;
    ensure_company_scope(
        state.config.cross_tenant_access,
        company_id,
        note.company,
        "UNAUTHORIZED_DELIVERY_NOTE_RESTORE",
        "DELIVERY_NOTE_NOT_FOUND",
    )?;
    if !note.lifecycle.is_deleted() {
        return Err(AppError::bad_request("DELIVERY_NOTE_NOT_SOFT_DELETED"));
    }

    note.lifecycle.restore();
    note.updated_at = Utc::now();
    let note = state.store.save_note(note).await?;

    Ok(Json(Envelope::success(
        "Delivery note restored successfully",
        note,
    )))
}

/// Resolves the note's references for rendering. Missing records (hard-deleted
/// or archived) degrade to placeholders rather than failing the render.
async fn build_snapshot(
    state: &AppState,
    note: &DeliveryNote,
    signature: Option<Vec<u8>>,
) -> AppResult<NoteSnapshot> {
    let company = state
        .store
        .find_company(note.company, DeleteFilter::IncludeDeleted)
        .await?;
    let client = state
        .store
        .find_client(note.client_id, DeleteFilter::IncludeDeleted)
        .await?;
    let project = state
        .store
        .find_project(note.project_id, DeleteFilter::IncludeDeleted)
        .await?;
    let responsible = match note.user_id {
        Some(user_id) => {
            state
                .store
                .find_user(user_id, DeleteFilter::IncludeDeleted)
                .await?
        }
        None => None,
    };

    Ok(NoteSnapshot {
        note_id: note.id,
        issued_on: note.created_at.format("%Y-%m-%d").to_string(),
        company_name: company.map(|c| c.name).unwrap_or_else(|| "-".to_string()),
        client_name: client
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "-".to_string()),
        client_address: client
            .as_ref()
            .map(|c| format!("{} {}, {} {} ({})", c.street, c.number, c.postal, c.city, c.province))
            .unwrap_or_else(|| "-".to_string()),
        client_email: client.map(|c| c.email),
        project_name: project.map(|p| p.name).unwrap_or_else(|| "-".to_string()),
        detail: note.detail.clone(),
        description: note.description.clone(),
        responsible: responsible.map(|user| user.name.unwrap_or(user.email)),
        signature,
    })
}
