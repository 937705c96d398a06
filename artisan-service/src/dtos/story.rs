use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

const MAX_ANSWERS: usize = 10;
const MAX_ANSWER_CHARS: usize = 2000;

fn validate_answers(answers: &[String]) -> Result<(), ValidationError> {
    if answers.len() > MAX_ANSWERS {
        return Err(ValidationError::new("too_many_answers"));
    }
    if answers.iter().any(|a| a.chars().count() > MAX_ANSWER_CHARS) {
        return Err(ValidationError::new("answer_too_long"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct QuestionsParams {
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionsResponse {
    pub language: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoryRequest {
    #[serde(default)]
    #[validate(length(max = 100))]
    pub language: String,
    #[validate(custom(function = "validate_answers"))]
    pub answers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoryResponse {
    pub story: String,
}
