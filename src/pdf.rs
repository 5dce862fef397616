use anyhow::Result;
use uuid::Uuid;

use crate::models::NoteDetail;

/// Everything the renderer needs, resolved up front: a delivery note plus the
/// display fields of its referenced records. Dangling references are resolved
/// to placeholders by the caller, never here.
#[derive(Debug, Clone)]
pub struct NoteSnapshot {
    pub note_id: Uuid,
    pub issued_on: String,
    pub company_name: String,
    pub client_name: String,
    pub client_address: String,
    pub client_email: Option<String>,
    pub project_name: String,
    pub detail: NoteDetail,
    pub description: Option<String>,
    pub responsible: Option<String>,
    pub signature: Option<Vec<u8>>,
}

/// Pure function of the snapshot: same fields in, same bytes out.
pub trait PdfRenderer: Send + Sync + 'static {
    fn render(&self, snapshot: &NoteSnapshot) -> Result<Vec<u8>>;
}

/// Single-page renderer writing the PDF object graph directly: one page, one
/// Type1 Helvetica font, one content stream of text lines.
pub struct BasicPdfRenderer;

impl PdfRenderer for BasicPdfRenderer {
    fn render(&self, snapshot: &NoteSnapshot) -> Result<Vec<u8>> {
        let content = content_stream(snapshot);
        Ok(assemble(&content))
    }
}

fn content_stream(snapshot: &NoteSnapshot) -> String {
    let mut lines = vec![
        format!("Delivery note {}", snapshot.note_id),
        format!("Date: {}", snapshot.issued_on),
        format!("Company: {}", snapshot.company_name),
        String::new(),
        format!("Deliver to: {}", snapshot.client_name),
        snapshot.client_address.clone(),
    ];
    if let Some(email) = &snapshot.client_email {
        lines.push(email.clone());
    }
    lines.push(String::new());
    lines.push(format!("Project: {}", snapshot.project_name));
    match &snapshot.detail {
        NoteDetail::Hours { hours } => {
            lines.push(format!("Labor (hours): {hours}"));
            if let Some(responsible) = &snapshot.responsible {
                lines.push(format!("Carried out by: {responsible}"));
            }
        }
        NoteDetail::Material { material, quantity } => {
            lines.push(format!("Material: {material} x {quantity}"));
        }
    }
    if let Some(description) = &snapshot.description {
        lines.push(String::new());
        lines.push(description.clone());
    }
    lines.push(String::new());
    match &snapshot.signature {
        Some(image) => lines.push(format!("Signed (signature image, {} bytes)", image.len())),
        None => lines.push("Unsigned".to_string()),
    }

    let mut stream = String::from("BT\n/F1 16 Tf\n50 792 Td\n(DELIVERY NOTE) Tj\n/F1 10 Tf\n");
    stream.push_str("0 -28 Td\n");
    for line in &lines {
        stream.push_str(&format!("({}) Tj\n0 -14 Td\n", escape_text(line)));
    }
    stream.push_str("ET\n");
    stream
}

fn assemble(content: &str) -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

fn escape_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' | '(' | ')' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}
