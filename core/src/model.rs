// agentline/src/model.rs

//! Defines the `LanguageModel` collaborator each stage calls, and two small
//! implementations for wiring fixed or closure-backed responses.
//!
//! The orchestrator never parses or validates what a model returns; that is the job
//! of the stage logic that built the prompt.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// An opaque asynchronous text-completion service.
///
/// Failures surface as `anyhow::Error`; the calling stage catches them and records
/// a business failure on the run.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
  async fn invoke(&self, prompt: &str, system_prompt: Option<&str>) -> anyhow::Result<String>;
}

// --- Static Model ---

/// Answers every prompt with the same text.
#[derive(Debug, Clone)]
pub struct StaticModel {
  response: String,
}

impl StaticModel {
  pub fn new(response: impl Into<String>) -> Self {
    Self {
      response: response.into(),
    }
  }
}

#[async_trait]
impl LanguageModel for StaticModel {
  async fn invoke(&self, _prompt: &str, _system_prompt: Option<&str>) -> anyhow::Result<String> {
    Ok(self.response.clone())
  }
}

// --- Functional Model ---

/// Produces responses by invoking a user-supplied asynchronous function.
///
/// The function receives owned copies of the prompt and the optional system prompt.
pub struct FnModel<F, Fut>
where
  F: Fn(String, Option<String>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
  respond: F,
  _phantom_fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnModel<F, Fut>
where
  F: Fn(String, Option<String>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
  pub fn new(respond: F) -> Self {
    Self {
      respond,
      _phantom_fut: PhantomData,
    }
  }
}

#[async_trait]
impl<F, Fut> LanguageModel for FnModel<F, Fut>
where
  F: Fn(String, Option<String>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
  async fn invoke(&self, prompt: &str, system_prompt: Option<&str>) -> anyhow::Result<String> {
    (self.respond)(prompt.to_string(), system_prompt.map(str::to_string)).await
  }
}
