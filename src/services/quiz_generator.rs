use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::question::{FillInDetails, MultipleChoiceDetails, QuestionDetails, QuizQuestion};
use crate::models::section::SectionKind;
use crate::services::llm_service::{complete_with_fallback, ChatCompletion};
use crate::services::shuffle::shuffle_choices;
use crate::utils::text::fold;

pub const BLANK: &str = "____";
const MAX_CHOICES: usize = 4;

/// Extra input a section receives from the sections it depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionContext {
    pub avoid_sentences: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratedSection {
    pub questions: Vec<QuizQuestion>,
    /// `None` when nothing had to be generated.
    pub model: Option<String>,
}

#[async_trait]
pub trait SectionGenerator: Send + Sync {
    async fn generate(
        &self,
        section: SectionKind,
        words: &[String],
        context: &SectionContext,
    ) -> Result<GeneratedSection>;
}

#[derive(Clone)]
pub struct QuizGenerator {
    chat: Arc<dyn ChatCompletion>,
    models: Vec<String>,
}

impl QuizGenerator {
    pub fn new(chat: Arc<dyn ChatCompletion>, models: Vec<String>) -> Self {
        Self { chat, models }
    }

    fn build_messages(
        &self,
        section: SectionKind,
        words: &[String],
        context: &SectionContext,
    ) -> Vec<JsonValue> {
        let (system_prompt, example) = match section {
            SectionKind::DefinitionChoice => (
                r#"You write vocabulary quizzes for language learners.
For every word given, write one multiple-choice question whose prompt is a short learner-friendly definition of the word.
The choices are four words: the target word plus three plausible distractors of the same part of speech.
Never use the target word inside its definition. Respond with a JSON object containing a 'questions' array."#,
                serde_json::json!({
                    "word": "meticulous",
                    "prompt": "Showing great attention to detail; very careful and precise.",
                    "choices": ["meticulous", "reckless", "hasty", "vague"],
                    "answer": "meticulous",
                    "explanation": "Meticulous describes careful, precise work."
                }),
            ),
            SectionKind::SentenceChoice => (
                r#"You write vocabulary quizzes for language learners.
For every word given, write one natural example sentence where the word is replaced by a blank written as ____.
The choices are four words: the target word plus three distractors that do not fit the sentence.
Respond with a JSON object containing a 'questions' array."#,
                serde_json::json!({
                    "word": "reluctant",
                    "prompt": "She was ____ to lend him her car after the last accident.",
                    "choices": ["eager", "reluctant", "generous", "curious"],
                    "answer": "reluctant",
                    "explanation": "Reluctant means unwilling, which fits her hesitation."
                }),
            ),
            SectionKind::SentenceFillIn => (
                r#"You write vocabulary quizzes for language learners.
For every word given, write one natural sentence where the word is replaced by a blank written as ____.
The learner must type the missing word, so the sentence must make the word clearly recoverable.
Add a short hint such as the first letter or the part of speech.
Do not reuse any sentence listed in 'avoid_sentences'. Respond with a JSON object containing a 'questions' array."#,
                serde_json::json!({
                    "word": "thrive",
                    "prompt": "Tomatoes ____ in warm, sunny weather.",
                    "answer": "thrive",
                    "hint": "verb, starts with 't'"
                }),
            ),
        };

        let user_data = serde_json::json!({
            "section": section.key(),
            "words": words,
            "avoid_sentences": context.avoid_sentences,
            "schema_example": { "questions": [example] }
        });

        vec![
            serde_json::json!({ "role": "system", "content": system_prompt }),
            serde_json::json!({ "role": "user", "content": user_data.to_string() }),
        ]
    }
}

#[async_trait]
impl SectionGenerator for QuizGenerator {
    async fn generate(
        &self,
        section: SectionKind,
        words: &[String],
        context: &SectionContext,
    ) -> Result<GeneratedSection> {
        if words.is_empty() {
            return Ok(GeneratedSection {
                questions: vec![],
                model: None,
            });
        }

        let messages = self.build_messages(section, words, context);
        let output = complete_with_fallback(
            self.chat.as_ref(),
            &self.models,
            &messages,
            Some(0.7),
            |reply| {
                let questions = sanitize_questions(section, reply, words);
                if questions.is_empty() {
                    Err(Error::Upstream("reply contained no usable questions".to_string()))
                } else {
                    Ok(questions)
                }
            },
        )
        .await?;

        let mut questions = output.value;
        if questions.len() < words.len() {
            tracing::warn!(
                section = %section,
                model = %output.model,
                "model covered {} of {} words",
                questions.len(),
                words.len()
            );
        }
        if section.is_multiple_choice() {
            shuffle_choices(&mut questions);
        }

        Ok(GeneratedSection {
            questions,
            model: Some(output.model),
        })
    }
}

/// Coerces a model reply into questions for `words`, one per word at most,
/// numbered from 1.
pub fn sanitize_questions(section: SectionKind, raw: &JsonValue, words: &[String]) -> Vec<QuizQuestion> {
    let items = raw
        .get("questions")
        .and_then(|a| a.as_array())
        .or_else(|| raw.as_array())
        .cloned()
        .unwrap_or_default();

    let canonical: HashMap<String, &String> = words.iter().map(|w| (fold(w), w)).collect();
    let mut covered = HashSet::new();
    let mut questions = Vec::new();

    for item in &items {
        let Some(word) = item
            .get("word")
            .and_then(|w| w.as_str())
            .and_then(|w| canonical.get(&fold(w)))
        else {
            continue;
        };
        if covered.contains(&fold(word)) {
            continue;
        }

        let coerced = if section.is_multiple_choice() {
            coerce_multiple_choice(item, word)
        } else {
            coerce_fill_in(item, word)
        };

        if let Some(mut q) = coerced {
            covered.insert(fold(word));
            q.id = questions.len() as i32 + 1;
            questions.push(q);
        }
    }

    questions
}

fn prompt_of(item: &JsonValue) -> Option<String> {
    item.get("prompt")
        .or_else(|| item.get("question"))
        .and_then(|p| p.as_str())
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

fn optional_text(item: &JsonValue, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn coerce_multiple_choice(item: &JsonValue, word: &str) -> Option<QuizQuestion> {
    let prompt = prompt_of(item)?;

    let mut seen = HashSet::new();
    let mut choices: Vec<String> = item
        .get("choices")
        .or_else(|| item.get("options"))
        .and_then(|c| c.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|c| c.as_str())
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty() && seen.insert(fold(c)))
                .collect()
        })
        .unwrap_or_default();

    let correct_index = match choices.iter().position(|c| fold(c) == fold(word)) {
        Some(i) if i < MAX_CHOICES => {
            choices[i] = word.to_string();
            choices.truncate(MAX_CHOICES);
            i
        }
        _ => {
            choices.retain(|c| fold(c) != fold(word));
            choices.truncate(MAX_CHOICES - 1);
            choices.push(word.to_string());
            choices.len() - 1
        }
    };

    if choices.len() < 2 {
        return None;
    }

    Some(QuizQuestion {
        id: 0,
        word: word.to_string(),
        prompt,
        details: QuestionDetails::MultipleChoice(MultipleChoiceDetails {
            choices,
            correct_index,
        }),
        explanation: optional_text(item, "explanation"),
    })
}

fn coerce_fill_in(item: &JsonValue, word: &str) -> Option<QuizQuestion> {
    let prompt = blank_out(&prompt_of(item)?, word)?;

    Some(QuizQuestion {
        id: 0,
        word: word.to_string(),
        prompt,
        details: QuestionDetails::FillIn(FillInDetails {
            answer: word.to_string(),
            hint: optional_text(item, "hint"),
        }),
        explanation: optional_text(item, "explanation"),
    })
}

/// Ensures the sentence carries a blank, replacing the first spelled-out
/// occurrence of `word` when the model forgot to blank it.
fn blank_out(prompt: &str, word: &str) -> Option<String> {
    if prompt.contains(BLANK) {
        return Some(prompt.to_string());
    }

    // Lowercase offsets only line up with the input when casing keeps byte lengths.
    let lower = prompt.to_lowercase();
    let target = word.to_lowercase();
    let (pos, len) = if lower.len() == prompt.len() && target.len() == word.len() {
        (find_whole_word(&lower, &target)?, target.len())
    } else {
        (find_whole_word(prompt, word)?, word.len())
    };

    let mut blanked = String::with_capacity(prompt.len());
    blanked.push_str(&prompt[..pos]);
    blanked.push_str(BLANK);
    blanked.push_str(&prompt[pos + len..]);
    Some(blanked)
}

/// Byte offset of the first occurrence of `word` not embedded in a longer word.
fn find_whole_word(text: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    text.match_indices(word).map(|(pos, _)| pos).find(|&pos| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
