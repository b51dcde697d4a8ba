use crate::error::{AppError, AppResult};

/// Validated feedback text. Construction is the only validation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSubmission {
    text: String,
}

impl FeedbackSubmission {
    pub fn parse(text: &str, max_chars: usize) -> AppResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "feedback text cannot be empty".to_string(),
            ));
        }
        let length = trimmed.chars().count();
        if length > max_chars {
            return Err(AppError::Validation(format!(
                "feedback text is {length} characters, limit is {max_chars}"
            )));
        }
        Ok(Self {
            text: trimmed.to_string(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
