use serde::{Deserialize, Serialize};
use std::fmt;

/// The three question-type sections a generation session is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    /// Pick the word that matches a definition.
    #[serde(rename = "questions_type_1")]
    DefinitionChoice,
    /// Pick the word that completes a sentence.
    #[serde(rename = "questions_type_2")]
    SentenceChoice,
    /// Type the word that completes a sentence.
    #[serde(rename = "questions_type_3")]
    SentenceFillIn,
}

impl SectionKind {
    pub const ALL: [SectionKind; 3] = [
        SectionKind::DefinitionChoice,
        SectionKind::SentenceChoice,
        SectionKind::SentenceFillIn,
    ];

    pub fn number(self) -> u8 {
        match self {
            SectionKind::DefinitionChoice => 1,
            SectionKind::SentenceChoice => 2,
            SectionKind::SentenceFillIn => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(SectionKind::DefinitionChoice),
            2 => Some(SectionKind::SentenceChoice),
            3 => Some(SectionKind::SentenceFillIn),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    pub fn is_multiple_choice(self) -> bool {
        !matches!(self, SectionKind::SentenceFillIn)
    }

    /// The section whose completion starts this one, if any.
    pub fn depends_on(self) -> Option<SectionKind> {
        match self {
            SectionKind::SentenceFillIn => Some(SectionKind::SentenceChoice),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            SectionKind::DefinitionChoice => "questions_type_1",
            SectionKind::SentenceChoice => "questions_type_2",
            SectionKind::SentenceFillIn => "questions_type_3",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Pending,
    Generating,
    Ready,
    Error,
}

impl SectionStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, SectionStatus::Ready | SectionStatus::Error)
    }
}
