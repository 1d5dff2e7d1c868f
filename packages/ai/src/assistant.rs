// ABOUTME: Assembly assistant built on a generative model
// ABOUTME: Builds prompts, calls the model and decodes replies into structured answers

use std::sync::Arc;

use chrono::Utc;
use droneguide_core::{strip_data_url_prefix, ProjectContext};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::analysis::{AssemblyAnalysis, PartsIdentification, StepInstructions, VoiceAnswer};
use crate::decode::Decoded;
use crate::prompts;
use crate::service::{AIServiceResult, GenerativeModel, InlineImage, ModelRequest};

/// Decoded model answer, and whether it came from well-formed JSON
#[derive(Debug, Clone, PartialEq)]
pub struct Analyzed<T> {
    pub value: T,
    pub parsed: bool,
}

#[derive(Clone)]
pub struct AssemblyAssistant {
    model: Arc<dyn GenerativeModel>,
}

impl AssemblyAssistant {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    async fn ask<T: DeserializeOwned>(
        &self,
        request: ModelRequest,
        fallback: impl FnOnce(String) -> T,
    ) -> AIServiceResult<Analyzed<T>> {
        let response = self.model.generate(request).await?;
        let decoded = Decoded::<T>::decode(&response.data);
        let parsed = decoded.is_parsed();
        debug!(parsed, tokens = response.usage.total_tokens(), "Decoded model reply");
        Ok(Analyzed {
            value: decoded.resolve(fallback),
            parsed,
        })
    }

    /// Review a frame of the build against the step the user is on
    pub async fn validate_assembly(
        &self,
        image: &str,
        step: u32,
        context: Option<&ProjectContext>,
    ) -> AIServiceResult<Analyzed<AssemblyAnalysis>> {
        info!(step, has_context = context.is_some(), "Validating assembly step");
        let prompt = prompts::validation_prompt(step, &render_context(context));
        self.ask(with_image(prompt, image), AssemblyAnalysis::fallback)
            .await
    }

    /// Answer a spoken question about the current frame
    pub async fn answer_query(
        &self,
        query: &str,
        image: &str,
        step: u32,
        context: Option<&ProjectContext>,
    ) -> AIServiceResult<Analyzed<VoiceAnswer>> {
        info!(step, has_context = context.is_some(), "Answering voice query");
        let prompt = prompts::voice_prompt(query, step, &render_context(context));
        self.ask(with_image(prompt, image), VoiceAnswer::fallback)
            .await
    }

    pub async fn step_instructions(
        &self,
        step: u32,
        context: Option<&ProjectContext>,
    ) -> AIServiceResult<Analyzed<StepInstructions>> {
        let prompt = prompts::instructions_prompt(step, &render_context(context));
        self.ask(ModelRequest::text(prompt), |raw| {
            StepInstructions::fallback(step, raw)
        })
        .await
    }

    pub async fn identify_parts(
        &self,
        image: &str,
        context: Option<&ProjectContext>,
    ) -> AIServiceResult<Analyzed<PartsIdentification>> {
        let prompt = prompts::identify_parts_prompt(&render_context(context));
        self.ask(with_image(prompt, image), PartsIdentification::fallback)
            .await
    }

    /// Short personalised greeting for a new project
    pub async fn welcome_message(&self, drone_type: Option<&str>) -> AIServiceResult<String> {
        let response = self
            .model
            .generate(ModelRequest::text(prompts::welcome_prompt(drone_type)))
            .await?;
        Ok(response.data.trim().to_string())
    }

    /// Round-trip a trivial prompt to confirm the model is reachable
    pub async fn test_connection(&self) -> AIServiceResult<String> {
        let response = self
            .model
            .generate(ModelRequest::text("Test connection"))
            .await?;
        Ok(response.data)
    }
}

fn render_context(context: Option<&ProjectContext>) -> String {
    context
        .map(|ctx| prompts::build_context(ctx, Utc::now()))
        .unwrap_or_default()
}

fn with_image(prompt: String, image: &str) -> ModelRequest {
    ModelRequest::with_image(prompt, InlineImage::jpeg(strip_data_url_prefix(image)))
}
