use crate::dtos::{QuestionsParams, QuestionsResponse, StoryRequest, StoryResponse};
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn story_questions(
    State(state): State<AppState>,
    Query(params): Query<QuestionsParams>,
) -> Result<Json<QuestionsResponse>, AppError> {
    let language = match params.language.trim() {
        "" => "English".to_string(),
        language => language.to_string(),
    };

    let questions = state.storyteller.questions_for(&language).await?;

    Ok(Json(QuestionsResponse {
        language,
        questions,
    }))
}

#[tracing::instrument(skip(state, request), fields(answers = request.answers.len()))]
pub async fn generate_story(
    State(state): State<AppState>,
    Json(request): Json<StoryRequest>,
) -> Result<Json<StoryResponse>, AppError> {
    request.validate()?;

    let story = state
        .storyteller
        .compose_story(&request.language, &request.answers)
        .await?;

    Ok(Json(StoryResponse { story }))
}
