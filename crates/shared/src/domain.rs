use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionId {
    SleepQuality,
    PhysicalActivityHours,
    Diet,
    StressLevel,
}

impl QuestionId {
    /// Declaration order; also the order answers are sent in.
    pub const ALL: [QuestionId; 4] = [
        QuestionId::SleepQuality,
        QuestionId::PhysicalActivityHours,
        QuestionId::Diet,
        QuestionId::StressLevel,
    ];

    pub fn key(self) -> &'static str {
        match self {
            QuestionId::SleepQuality => "sleep_quality",
            QuestionId::PhysicalActivityHours => "physical_activity_hours",
            QuestionId::Diet => "diet",
            QuestionId::StressLevel => "stress_level",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key)
    }

    pub fn spec(self) -> &'static QuestionSpec {
        match self {
            QuestionId::SleepQuality => &QUESTIONS[0],
            QuestionId::PhysicalActivityHours => &QUESTIONS[1],
            QuestionId::Diet => &QUESTIONS[2],
            QuestionId::StressLevel => &QUESTIONS[3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Choice { options: &'static [&'static str] },
    Range { min: i64, max: i64 },
    FreeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionSpec {
    pub id: QuestionId,
    pub prompt: &'static str,
    pub kind: QuestionKind,
}

pub static QUESTIONS: [QuestionSpec; 4] = [
    QuestionSpec {
        id: QuestionId::SleepQuality,
        prompt: "Como você classificaria seu sono (bom/regular/ruim)",
        kind: QuestionKind::Choice {
            options: &["bom", "regular", "ruim"],
        },
    },
    QuestionSpec {
        id: QuestionId::PhysicalActivityHours,
        prompt: "Quantas horas de atividade física por semana?",
        kind: QuestionKind::Range { min: 0, max: 100 },
    },
    QuestionSpec {
        id: QuestionId::Diet,
        prompt: "Como descreveria sua alimentação?",
        kind: QuestionKind::Choice {
            options: &["boa", "regular", "precisa melhorar"],
        },
    },
    QuestionSpec {
        id: QuestionId::StressLevel,
        prompt: "Nível de estresse diário (0-10)",
        kind: QuestionKind::Range { min: 0, max: 10 },
    },
];

/// A single response value as it travels on the wire: choices and free text
/// are JSON strings, bounded numbers are JSON integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(i64),
    Text(String),
}

impl Answer {
    pub fn text(value: impl Into<String>) -> Self {
        Answer::Text(value.into())
    }
}

impl QuestionSpec {
    /// Turns raw user input into a typed answer. Choice tokens are matched
    /// case-insensitively and stored in their canonical spelling. Numbers are
    /// not clamped here; see [`QuestionSpec::normalize`].
    pub fn parse_answer(&self, raw: &str) -> Result<Answer, ValidationError> {
        let trimmed = raw.trim();
        match self.kind {
            QuestionKind::Choice { options } => options
                .iter()
                .find(|option| option.eq_ignore_ascii_case(trimmed))
                .map(|option| Answer::text(*option))
                .ok_or_else(|| self.invalid_choice(trimmed, options)),
            QuestionKind::Range { .. } => {
                trimmed
                    .parse::<i64>()
                    .map(Answer::Number)
                    .map_err(|_| ValidationError::NotANumber {
                        id: self.id,
                        prompt: self.prompt,
                        value: trimmed.to_string(),
                    })
            }
            QuestionKind::FreeText => Ok(Answer::text(trimmed)),
        }
    }

    /// Checks that a held answer is acceptable for submission.
    pub fn check(&self, answer: &Answer) -> Result<(), ValidationError> {
        match (self.kind, answer) {
            (QuestionKind::Choice { options }, Answer::Text(value)) => {
                if options.contains(&value.as_str()) {
                    Ok(())
                } else if value.trim().is_empty() {
                    Err(self.unanswered())
                } else {
                    Err(self.invalid_choice(value, options))
                }
            }
            (QuestionKind::Range { .. }, Answer::Number(_)) => Ok(()),
            (QuestionKind::FreeText, Answer::Text(value)) if !value.trim().is_empty() => Ok(()),
            (QuestionKind::FreeText, Answer::Text(_)) => Err(self.unanswered()),
            (QuestionKind::Range { min, max }, Answer::Text(value)) => {
                Err(ValidationError::WrongKind {
                    id: self.id,
                    prompt: self.prompt,
                    value: value.clone(),
                    expected: format!("a whole number between {min} and {max}"),
                })
            }
            (_, Answer::Number(value)) => Err(ValidationError::WrongKind {
                id: self.id,
                prompt: self.prompt,
                value: value.to_string(),
                expected: "a text answer".to_string(),
            }),
        }
    }

    /// Coerces numeric answers into the declared range.
    pub fn normalize(&self, answer: &Answer) -> Answer {
        match (self.kind, answer) {
            (QuestionKind::Range { min, max }, Answer::Number(value)) => {
                Answer::Number((*value).clamp(min, max))
            }
            _ => answer.clone(),
        }
    }

    pub fn unanswered(&self) -> ValidationError {
        ValidationError::Unanswered {
            id: self.id,
            prompt: self.prompt,
        }
    }

    fn invalid_choice(&self, value: &str, options: &[&str]) -> ValidationError {
        ValidationError::InvalidChoice {
            id: self.id,
            prompt: self.prompt,
            value: value.to_string(),
            expected: options.join(", "),
        }
    }
}
