//! Form state holder: identity fields, the declared answer slots and the
//! optional logo. Nothing in here touches the network or the filesystem
//! except [`FormState::attach_logo`], which delegates to the encoder.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use shared::{
    domain::{Answer, QuestionId},
    error::ValidationError,
    protocol::{EncodedImage, ResponseKeys, ResponseMap, SubmissionPayload},
};
use tracing::debug;

use crate::logo::{LogoEncoder, LogoError};

/// One slot per declared question; unanswered slots hold `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSet {
    slots: BTreeMap<QuestionId, Option<Answer>>,
}

impl Default for AnswerSet {
    fn default() -> Self {
        Self {
            slots: QuestionId::ALL.into_iter().map(|id| (id, None)).collect(),
        }
    }
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: QuestionId) -> Option<&Answer> {
        self.slots.get(&id).and_then(Option::as_ref)
    }

    pub fn set(&mut self, id: QuestionId, answer: Answer) {
        self.slots.insert(id, Some(answer));
    }

    pub fn clear(&mut self, id: QuestionId) {
        self.slots.insert(id, None);
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, Option<&Answer>)> {
        self.slots.iter().map(|(id, answer)| (*id, answer.as_ref()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (id, answer) in self.iter() {
            let spec = id.spec();
            match answer {
                Some(answer) => spec.check(answer)?,
                None => return Err(spec.unanswered()),
            }
        }
        Ok(())
    }

    /// Validated, range-clamped responses in declaration order.
    pub fn to_responses(&self, keys: ResponseKeys) -> Result<ResponseMap, ValidationError> {
        self.validate()?;
        let entries = self
            .iter()
            .filter_map(|(id, answer)| {
                answer.map(|answer| (keys.key_for(id).to_string(), id.spec().normalize(answer)))
            })
            .collect();
        Ok(ResponseMap::new(entries))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    name: String,
    email: String,
    answers: AnswerSet,
    logo: Option<EncodedImage>,
    pending_logo: Option<PathBuf>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn logo(&self) -> Option<&EncodedImage> {
        self.logo.as_ref()
    }

    /// A file chosen by the user that will be encoded at submit time.
    pub fn pending_logo(&self) -> Option<&Path> {
        self.pending_logo.as_deref()
    }

    pub fn set_name(&mut self, value: impl Into<String>) {
        self.name = value.into();
    }

    pub fn set_email(&mut self, value: impl Into<String>) {
        self.email = value.into();
    }

    pub fn set_answer(&mut self, id: QuestionId, value: Answer) {
        self.answers.set(id, value);
    }

    /// String-keyed variant for presentation code. Undeclared keys are
    /// ignored and reported by returning `false`.
    pub fn set_answer_by_key(&mut self, key: &str, value: Answer) -> bool {
        match QuestionId::from_key(key) {
            Some(id) => {
                self.answers.set(id, value);
                true
            }
            None => {
                debug!(key, "ignoring answer for undeclared question");
                false
            }
        }
    }

    /// Replaces the logo and drops any file still waiting to be encoded.
    pub fn set_logo(&mut self, logo: Option<EncodedImage>) {
        self.logo = logo;
        self.pending_logo = None;
    }

    /// Defers encoding to submit time, so the file is read again on every
    /// submit. [`FormState::attach_logo`] encodes once instead.
    pub fn select_logo_file(&mut self, path: impl Into<PathBuf>) {
        self.pending_logo = Some(path.into());
    }

    /// Encodes `path` right away; on failure nothing changes.
    pub async fn attach_logo(
        &mut self,
        path: &Path,
        encoder: &LogoEncoder,
    ) -> Result<(), LogoError> {
        let encoded = encoder.encode(path).await?;
        self.set_logo(Some(encoded));
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        self.answers.validate()
    }

    /// Builds the request body. `logo` is passed in so the caller decides
    /// whether a pending file has been encoded yet.
    pub fn to_payload(
        &self,
        keys: ResponseKeys,
        logo: Option<EncodedImage>,
    ) -> Result<SubmissionPayload, ValidationError> {
        self.validate()?;
        Ok(SubmissionPayload {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            responses: self.answers.to_responses(keys)?,
            logo_base64: logo,
        })
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
