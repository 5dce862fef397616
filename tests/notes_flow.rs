mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{error_code, read_json, TestApp};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use fieldnote::models::DeleteFilter;
use fieldnote::store::DataStore;

#[derive(Deserialize)]
struct Envelope<T> {
    status: String,
    data: T,
}

#[derive(Deserialize)]
struct NoteBody {
    id: Uuid,
    format: String,
    #[serde(default)]
    user_id: Option<Uuid>,
    #[serde(default)]
    sign: Option<String>,
    #[serde(default)]
    pdf: Option<String>,
    pending: bool,
}

#[derive(Deserialize)]
struct PdfBody {
    pdf_url: String,
}

#[derive(Deserialize)]
struct SignatureBody {
    sign: String,
    pdf: String,
}

async fn workspace(app: &TestApp, email: &str, cif: &str) -> Result<(String, Uuid)> {
    let (token, _company) = app.admin_with_company(email, cif).await?;

    let client = app
        .post_json(
            "/api/client/register",
            &json!({
                "name": "Client",
                "street": "Calle Rio",
                "number": 4,
                "postal": "28004",
                "city": "Madrid",
                "province": "Madrid",
                "phone": "600777888",
                "email": format!("client-{cif}@test.com"),
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(client.status(), StatusCode::OK);
    #[derive(Deserialize)]
    struct ClientBody {
        id: Uuid,
    }
    let client: ClientBody = read_json(client).await?;

    let project = app
        .post_json(
            "/api/project",
            &json!({
                "name": format!("Project {cif}"),
                "description": "Site works",
                "start_date": "2024-02-01T00:00:00Z",
                "end_date": "2024-08-31T00:00:00Z",
                "client": client.id,
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(project.status(), StatusCode::OK);
    #[derive(Deserialize)]
    struct ProjectBody {
        id: Uuid,
    }
    let project: ProjectBody = read_json(project).await?;

    Ok((token, project.id))
}

#[tokio::test]
async fn hours_note_binds_the_acting_user() -> Result<()> {
    let app = TestApp::new();
    let (token, project_id) = workspace(&app, "pm@notes.test", "N11111111").await?;

    let created = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_id,
                "format": "hours",
                "hours": 6.5,
                "description": "First fix",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let envelope: Envelope<NoteBody> = read_json(created).await?;
    assert_eq!(envelope.status, "success");
    assert_eq!(envelope.data.format, "hours");
    assert!(envelope.data.pending);
    assert!(envelope.data.user_id.is_some());
    assert!(envelope.data.sign.is_none());
    assert!(envelope.data.pdf.is_none());

    // the note id lands on the parent project's ordered list
    let project = app
        .store
        .find_project(project_id, DeleteFilter::Active)
        .await?
        .expect("project exists");
    assert_eq!(project.delivery_notes, vec![envelope.data.id]);

    Ok(())
}

#[tokio::test]
async fn material_note_without_quantity_fails_before_any_write() -> Result<()> {
    let app = TestApp::new();
    let (token, project_id) = workspace(&app, "pm@notes.test", "N22222222").await?;

    let response = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_id,
                "format": "material",
                "material": "cement",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_code(response).await?.contains("VALIDATION_ERROR"));

    let project = app
        .store
        .find_project(project_id, DeleteFilter::Active)
        .await?
        .expect("project exists");
    assert!(project.delivery_notes.is_empty());
    assert!(app
        .store
        .list_notes(project.company, DeleteFilter::IncludeDeleted)
        .await?
        .is_empty());

    Ok(())
}

#[tokio::test]
async fn pdf_generation_is_idempotent() -> Result<()> {
    let app = TestApp::new();
    let (token, project_id) = workspace(&app, "pm@notes.test", "N33333333").await?;

    let created = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_id,
                "format": "material",
                "material": "gravel",
                "quantity": 12,
            }),
            Some(&token),
        )
        .await?;
    let envelope: Envelope<NoteBody> = read_json(created).await?;
    let note_id = envelope.data.id;

    let first = app
        .get(&format!("/api/deliverynote/pdf/{note_id}"), Some(&token))
        .await?;
    assert_eq!(first.status(), StatusCode::OK);
    let first_pdf: PdfBody = read_json(first).await?;
    assert_eq!(app.storage().upload_calls().await, 1);

    let second = app
        .get(&format!("/api/deliverynote/pdf/{note_id}"), Some(&token))
        .await?;
    assert_eq!(second.status(), StatusCode::OK);
    let second_pdf: PdfBody = read_json(second).await?;

    // cached reference returned unchanged, nothing re-uploaded
    assert_eq!(first_pdf.pdf_url, second_pdf.pdf_url);
    assert_eq!(app.storage().upload_calls().await, 1);

    let stored = app
        .storage()
        .get(&format!("deliverynote-{note_id}.pdf"))
        .await
        .expect("pdf stored");
    assert!(stored.bytes.starts_with(b"%PDF"));

    Ok(())
}

#[tokio::test]
async fn signature_upload_regenerates_the_pdf() -> Result<()> {
    let app = TestApp::new();
    let (token, project_id) = workspace(&app, "pm@notes.test", "N44444444").await?;

    let created = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_id,
                "format": "hours",
                "hours": 3,
            }),
            Some(&token),
        )
        .await?;
    let envelope: Envelope<NoteBody> = read_json(created).await?;
    let note_id = envelope.data.id;

    let first = app
        .get(&format!("/api/deliverynote/pdf/{note_id}"), Some(&token))
        .await?;
    let _: PdfBody = read_json(first).await?;
    let unsigned_pdf = app
        .storage()
        .get(&format!("deliverynote-{note_id}.pdf"))
        .await
        .expect("pdf stored")
        .bytes;

    let signed = app
        .upload_file(
            Method::PATCH,
            &format!("/api/deliverynote/sign/{note_id}"),
            "file",
            "signature.png",
            "image/png",
            b"fake-png-bytes",
            &token,
        )
        .await?;
    assert_eq!(signed.status(), StatusCode::OK);
    let signature: Envelope<SignatureBody> = read_json(signed).await?;
    assert!(signature.data.sign.contains(&format!("signature-{note_id}")));
    assert!(signature.data.pdf.contains(&format!("deliverynote-{note_id}")));

    // the stored PDF was overwritten with the signature-bearing render
    let signed_pdf = app
        .storage()
        .get(&format!("deliverynote-{note_id}.pdf"))
        .await
        .expect("pdf stored")
        .bytes;
    assert_ne!(unsigned_pdf, signed_pdf);

    let fetched = app
        .get(&format!("/api/deliverynote/{note_id}"), Some(&token))
        .await?;
    let fetched: Envelope<NoteBody> = read_json(fetched).await?;
    assert!(fetched.data.sign.is_some());
    assert!(fetched.data.pdf.is_some());

    Ok(())
}

#[tokio::test]
async fn signed_note_rejects_soft_and_hard_delete() -> Result<()> {
    let app = TestApp::new();
    let (token, project_id) = workspace(&app, "pm@notes.test", "N55555555").await?;

    let created = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_id,
                "format": "material",
                "material": "bricks",
                "quantity": 500,
            }),
            Some(&token),
        )
        .await?;
    let envelope: Envelope<NoteBody> = read_json(created).await?;
    let note_id = envelope.data.id;

    let signed = app
        .upload_file(
            Method::PATCH,
            &format!("/api/deliverynote/sign/{note_id}"),
            "file",
            "signature.png",
            "image/png",
            b"fake-png-bytes",
            &token,
        )
        .await?;
    assert_eq!(signed.status(), StatusCode::OK);

    let soft = app
        .delete(&format!("/api/deliverynote/{note_id}"), Some(&token))
        .await?;
    assert_eq!(soft.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        error_code(soft).await?,
        "CANNOT_DELETE_SIGNED_DELIVERY_NOTE"
    );

    let hard = app
        .delete(
            &format!("/api/deliverynote/{note_id}?soft=false"),
            Some(&token),
        )
        .await?;
    assert_eq!(hard.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        error_code(hard).await?,
        "CANNOT_DELETE_SIGNED_DELIVERY_NOTE"
    );

    // still present and still signed
    let fetched = app
        .get(&format!("/api/deliverynote/{note_id}"), Some(&token))
        .await?;
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched: Envelope<NoteBody> = read_json(fetched).await?;
    assert!(fetched.data.sign.is_some());

    Ok(())
}

#[tokio::test]
async fn unsigned_note_soft_delete_and_restore() -> Result<()> {
    let app = TestApp::new();
    let (token, project_id) = workspace(&app, "pm@notes.test", "N66666666").await?;

    let created = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_id,
                "format": "hours",
                "hours": 2,
            }),
            Some(&token),
        )
        .await?;
    let envelope: Envelope<NoteBody> = read_json(created).await?;
    let note_id = envelope.data.id;

    let soft = app
        .delete(&format!("/api/deliverynote/{note_id}"), Some(&token))
        .await?;
    assert_eq!(soft.status(), StatusCode::OK);

    let hidden = app
        .get(&format!("/api/deliverynote/{note_id}"), Some(&token))
        .await?;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let restored = app
        .patch_json(
            &format!("/api/deliverynote/restore/{note_id}"),
            &json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(restored.status(), StatusCode::OK);

    let restore_again = app
        .patch_json(
            &format!("/api/deliverynote/restore/{note_id}"),
            &json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(restore_again.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_code(restore_again).await?,
        "DELIVERY_NOTE_NOT_SOFT_DELETED"
    );

    Ok(())
}

#[tokio::test]
async fn notes_are_isolated_between_tenants() -> Result<()> {
    let app = TestApp::new();
    let (token_a, project_a) = workspace(&app, "a@one.test", "N77777777").await?;
    let (token_b, _project_b) = workspace(&app, "b@two.test", "N88888888").await?;

    let created = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_a,
                "format": "hours",
                "hours": 1,
            }),
            Some(&token_a),
        )
        .await?;
    let envelope: Envelope<NoteBody> = read_json(created).await?;

    let foreign_read = app
        .get(
            &format!("/api/deliverynote/{}", envelope.data.id),
            Some(&token_b),
        )
        .await?;
    assert_eq!(foreign_read.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        error_code(foreign_read).await?,
        "UNAUTHORIZED_DELIVERY_NOTE_ACCESS"
    );

    let listed = app.get("/api/deliverynote", Some(&token_b)).await?;
    let listed: Envelope<Vec<Value>> = read_json(listed).await?;
    assert!(listed.data.is_empty());

    // creating against another tenant's project is also rejected
    let cross_create = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_a,
                "format": "hours",
                "hours": 1,
            }),
            Some(&token_b),
        )
        .await?;
    assert_eq!(cross_create.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        error_code(cross_create).await?,
        "UNAUTHORIZED_PROJECT_ACCESS"
    );

    Ok(())
}

#[tokio::test]
async fn note_update_switches_format_and_rebinding() -> Result<()> {
    let app = TestApp::new();
    let (token, project_id) = workspace(&app, "pm@notes.test", "N99999999").await?;

    let created = app
        .post_json(
            "/api/deliverynote",
            &json!({
                "project_id": project_id,
                "format": "hours",
                "hours": 4,
            }),
            Some(&token),
        )
        .await?;
    let envelope: Envelope<NoteBody> = read_json(created).await?;
    let note_id = envelope.data.id;
    assert!(envelope.data.user_id.is_some());

    let updated = app
        .put_json(
            &format!("/api/deliverynote/{note_id}"),
            &json!({
                "format": "material",
                "material": "sand",
                "quantity": 9,
                "description": "Switched to material",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(updated.status(), StatusCode::OK);
    let updated: Envelope<NoteBody> = read_json(updated).await?;
    assert_eq!(updated.data.format, "material");
    // material notes carry no responsible user
    assert!(updated.data.user_id.is_none());

    let invalid = app
        .put_json(
            &format!("/api/deliverynote/{note_id}"),
            &json!({
                "format": "material",
                "material": "sand",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
