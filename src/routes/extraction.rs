use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::services::extraction_service::{image_type_from_file_name, ExtractedWords};
use crate::AppState;

/// Accepts a multipart upload with a single `image` field and returns the
/// vocabulary words read from it.
#[axum::debug_handler]
pub async fn extract_words(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractedWords>> {
    let mut image: Option<(Bytes, String)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        Error::BadRequest(e.to_string())
    })? {
        if field.name() != Some("image") {
            continue;
        }

        let declared = field.content_type().map(str::to_string);
        let from_name = field.file_name().and_then(image_type_from_file_name);
        let content_type = match (declared, from_name) {
            (Some(ct), _) if ct != "application/octet-stream" => ct,
            (_, Some(guessed)) => guessed.to_string(),
            (Some(ct), None) => ct,
            (None, None) => String::new(),
        };

        let data = field.bytes().await.map_err(|e| {
            if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
                Error::PayloadTooLarge(format!(
                    "Image exceeds the {} byte upload limit",
                    state.max_upload_bytes
                ))
            } else {
                Error::BadRequest(e.to_string())
            }
        })?;
        image = Some((data, content_type));
        break;
    }

    let (data, content_type) =
        image.ok_or_else(|| Error::BadRequest("Missing 'image' field".to_string()))?;

    if data.len() > state.max_upload_bytes {
        return Err(Error::PayloadTooLarge(format!(
            "Image is {} bytes, the limit is {}",
            data.len(),
            state.max_upload_bytes
        )));
    }

    let extracted = state
        .extraction_service
        .extract_words(data, &content_type)
        .await?;
    tracing::info!(count = extracted.words.len(), model = %extracted.model, "words extracted");
    Ok(Json(extracted))
}
