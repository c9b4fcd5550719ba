use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateGenerationSessionRequest {
    #[validate(length(min = 1, max = 500, message = "Provide between 1 and 500 words"))]
    pub words: Vec<String>,
}
