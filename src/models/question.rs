use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(default)]
    pub id: i32,
    /// The vocabulary word this question tests.
    pub word: String,
    pub prompt: String,
    #[serde(flatten)]
    pub details: QuestionDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionDetails {
    MultipleChoice(MultipleChoiceDetails),
    FillIn(FillInDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoiceDetails {
    pub choices: Vec<String>,
    pub correct_index: usize,
}

impl MultipleChoiceDetails {
    pub fn correct_choice(&self) -> Option<&str> {
        self.choices.get(self.correct_index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillInDetails {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl QuizQuestion {
    pub fn multiple_choice(&self) -> Option<&MultipleChoiceDetails> {
        match &self.details {
            QuestionDetails::MultipleChoice(mc) => Some(mc),
            QuestionDetails::FillIn(_) => None,
        }
    }
}
