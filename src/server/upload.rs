use super::error::ApiError;
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// The `file` part of an upload form.
pub struct UploadedPdf {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Pull the `file` field out of a multipart form.
///
/// The part must declare `application/pdf`; other fields are drained and
/// ignored. The bytes themselves are not inspected here, the rasterizer
/// does that.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<UploadedPdf, ApiError> {
    let mut file: Option<UploadedPdf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| form_error("Failed to read form field", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                if field.content_type() != Some(PDF_CONTENT_TYPE) {
                    tracing::warn!("Uploaded file is not a PDF.");
                    return Err(ApiError::BadRequest("The file must be a PDF".into()));
                }
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| form_error("Failed to read file data", e))?
                    .to_vec();
                file = Some(UploadedPdf { filename, data });
            }
            _ => {
                field
                    .bytes()
                    .await
                    .map_err(|e| form_error(&format!("Failed to read field '{name}'"), e))?;
            }
        }
    }

    file.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))
}

fn form_error(context: &str, e: MultipartError) -> ApiError {
    let message = format!("{}: {}", context, e.body_text());
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::BadRequest(message)
    }
}
