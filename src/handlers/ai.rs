// src/handlers/ai.rs

//! AI endpoints. Both go through the shared rotating client, so a quota
//! failure on one key is retried on the next before the caller sees an error.

use crate::error::Result;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

pub const REQUIREMENTS_SYSTEM_INSTRUCTION: &str = "You are an expert SDV (Software Defined Vehicle) Systems Engineer. \
Your goal is to help users define vehicle features into structured requirements compliant with ISO 26262 and ASPICE. \
Ask clarifying questions about safety levels (ASIL), performance, and hardware constraints. \
Return responses in a helpful, professional tone.";

#[derive(Debug, Deserialize, Validate)]
pub struct RequirementsRequest {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CodeRequest {
    #[validate(length(min = 1, message = "requirement must not be empty"))]
    pub requirement: String,
    #[serde(default = "default_language")]
    #[validate(length(min = 1, message = "language must not be empty"))]
    pub language: String,
}

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TextResponse {
    pub text: String,
}

/// Prompt for the code generator.
pub fn code_prompt(language: &str, requirement: &str) -> String {
    format!(
        "Generate a MISRA-compliant {language} microservice for the following SDV requirement:\n\
         \"{requirement}\"\n\n\
         Include:\n\
         1. The code implementation.\n\
         2. RAG Citations (simulated) for MISRA rules applied.\n\
         3. A brief explanation of the architecture.\n\n\
         Format the output as Markdown."
    )
}

/// `POST /api/ai/requirements`: one conversational turn with the requirements assistant.
#[instrument(skip_all)]
pub async fn requirements_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RequirementsRequest>, JsonRejection>,
) -> Result<Json<TextResponse>> {
    let Json(request) = payload?;
    request.validate()?;
    info!(prompt.len = request.prompt.len(), "Requirements assistant request");

    let text = state
        .client
        .converse(
            &state.config.gemini.model,
            Some(REQUIREMENTS_SYSTEM_INSTRUCTION),
            &request.prompt,
        )
        .await?;
    Ok(Json(TextResponse { text }))
}

/// `POST /api/ai/code`: one-shot code generation for a requirement.
#[instrument(skip_all, fields(language = tracing::field::Empty))]
pub async fn code_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CodeRequest>, JsonRejection>,
) -> Result<Json<TextResponse>> {
    let Json(request) = payload?;
    request.validate()?;
    tracing::Span::current().record("language", request.language.as_str());

    let prompt = code_prompt(&request.language, &request.requirement);
    let text = state
        .client
        .one_shot(&state.config.gemini.model, &Value::String(prompt), None)
        .await?;
    Ok(Json(TextResponse { text }))
}
