use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::services::llm_service::{complete_with_fallback, ChatCompletion};
use crate::utils::text::normalize_words;

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/webp", "image/gif"];

const EXTRACTION_PROMPT: &str = r#"You read photos and scans of vocabulary lists.
Return every vocabulary word or short phrase that appears in the list, in reading order.
Ignore numbering, page headers, translations and definitions.
Respond with a JSON object: { "words": ["first", "second", ...] }"#;

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedWords {
    pub words: Vec<String>,
    pub model: String,
}

#[derive(Clone)]
pub struct ExtractionService {
    chat: Arc<dyn ChatCompletion>,
    models: Vec<String>,
    max_words: usize,
}

impl ExtractionService {
    pub fn new(chat: Arc<dyn ChatCompletion>, models: Vec<String>, max_words: usize) -> Self {
        Self {
            chat,
            models,
            max_words,
        }
    }

    pub async fn extract_words(&self, image: Bytes, content_type: &str) -> Result<ExtractedWords> {
        let mime = normalize_image_type(content_type).ok_or_else(|| {
            Error::BadRequest(format!(
                "Unsupported image type '{}'. Allowed: {}",
                content_type,
                ALLOWED_IMAGE_TYPES.join(", ")
            ))
        })?;
        if image.is_empty() {
            return Err(Error::BadRequest("Uploaded image is empty".to_string()));
        }

        tracing::info!(bytes = image.len(), mime, "extracting words from image");

        let messages = vec![
            serde_json::json!({ "role": "system", "content": EXTRACTION_PROMPT }),
            serde_json::json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": "Extract the vocabulary words from this image." },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{};base64,{}", mime, BASE64.encode(&image)),
                            "detail": "high"
                        }
                    }
                ]
            }),
        ];

        let max_words = self.max_words;
        let output = complete_with_fallback(
            self.chat.as_ref(),
            &self.models,
            &messages,
            Some(0.0),
            |reply| {
                let raw = parse_word_list(reply)
                    .ok_or_else(|| Error::Upstream("reply did not contain a word list".to_string()))?;
                Ok(normalize_words(raw, max_words))
            },
        )
        .await?;

        tracing::info!(model = %output.model, count = output.value.len(), "word extraction finished");

        Ok(ExtractedWords {
            words: output.value,
            model: output.model,
        })
    }
}

/// Maps a declared content type onto one of the accepted image types.
pub fn normalize_image_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => Some("image/jpeg"),
        other => ALLOWED_IMAGE_TYPES.iter().copied().find(|t| *t == other),
    }
}

/// Guesses an image type from a file name when the upload carries none.
pub fn image_type_from_file_name(file_name: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Accepts `{"words": [...]}` or a bare array; entries may be strings or
/// objects carrying a `word` field.
fn parse_word_list(reply: &JsonValue) -> Option<Vec<String>> {
    let items = reply
        .get("words")
        .and_then(|w| w.as_array())
        .or_else(|| reply.as_array())?;

    Some(
        items
            .iter()
            .filter_map(|item| match item {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Object(_) => item.get("word").and_then(|w| w.as_str()).map(str::to_string),
                _ => None,
            })
            .collect(),
    )
}
