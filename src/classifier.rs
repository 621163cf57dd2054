//! Intent classification through a hosted language model.
//!
//! Defines the [`LanguageModel`] trait and its implementations:
//! - **[`GeminiModel`]**: calls the Gemini `generateContent` API.
//! - **[`DisabledModel`]**: always fails; every question routes to `GENERAL`.
//!
//! [`Classifier`] wraps a model and never fails: a model error, an empty
//! reply, or an unrecognizable reply all resolve to [`Category::General`].
//! It makes exactly one model call per question and does not retry.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use notebook_router_core::category::{classification_prompt, match_reply, Category, MatchKind};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClassifierConfig;

/// A one-shot text completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Complete `prompt` and return the reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ============ Disabled Model ============

/// A model that refuses every call.
///
/// Used when `classifier.provider = "disabled"`.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Language model is disabled")
    }
}

// ============ Gemini Model ============

/// Gemini text model over the Generative Language REST API.
///
/// The API key is read from the environment variable named by
/// `classifier.api_key_env` at construction time. A missing key is not an
/// error until the first call, so that a misconfigured key degrades routing
/// to `GENERAL` instead of preventing start-up.
pub struct GeminiModel {
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiModel {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; questions will be routed to GENERAL",
                config.api_key_env
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Gemini API key not set"))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_gemini_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidates"))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    Ok(text)
}

/// Create the [`LanguageModel`] named by `classifier.provider`.
pub fn create_model(config: &ClassifierConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "gemini" => Ok(Arc::new(GeminiModel::new(config)?)),
        other => bail!("Unknown classifier provider: {}", other),
    }
}

// ============ Classifier ============

/// Routes questions to categories. Never fails.
#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn LanguageModel>,
}

impl Classifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Classify `question` into one routable category.
    pub async fn classify(&self, question: &str) -> Category {
        let prompt = classification_prompt(question);

        let reply = match self.model.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(model = self.model.model_name(), "Classification failed: {:#}", e);
                return Category::General;
            }
        };

        match match_reply(&reply) {
            Some((category, MatchKind::Exact)) => {
                tracing::info!("Classified {:?} -> {}", question, category);
                category
            }
            Some((category, MatchKind::Fuzzy)) => {
                tracing::info!("Classified {:?} -> {} (fuzzy match)", question, category);
                category
            }
            None => {
                tracing::warn!(
                    "Could not classify {:?}. Response: {:?}. Defaulting to GENERAL.",
                    question,
                    reply.trim()
                );
                Category::General
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedModel {
        reply: Result<String, String>,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for FixedModel {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            assert!(prompt.contains("USER QUERY:"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(|e| anyhow!(e))
        }
    }

    #[tokio::test]
    async fn exact_label_is_returned() {
        let model = FixedModel::replying("EXEOL_SEPT_E2\n");
        let classifier = Classifier::new(model.clone());
        assert_eq!(classifier.classify("Sept E2?").await, Category::ExeolSeptE2);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn substring_fallback() {
        let classifier = Classifier::new(FixedModel::replying("The answer is EXEOL_OPA because..."));
        assert_eq!(classifier.classify("OPA dilution").await, Category::ExeolOpa);
    }

    #[tokio::test]
    async fn model_failure_defaults_to_general_without_retry() {
        let model = FixedModel::failing("quota exceeded");
        let classifier = Classifier::new(model.clone());
        assert_eq!(classifier.classify("anything").await, Category::General);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrecognizable_or_empty_reply_defaults_to_general() {
        for reply in ["", "   ", "I am not sure", "UNKNOWN"] {
            let classifier = Classifier::new(FixedModel::replying(reply));
            assert_eq!(classifier.classify("q").await, Category::General, "{:?}", reply);
        }
    }

    #[tokio::test]
    async fn disabled_model_routes_to_general() {
        let classifier = Classifier::new(Arc::new(DisabledModel));
        assert_eq!(classifier.classify("Cidex vs OPA").await, Category::General);
    }

    #[tokio::test]
    async fn gemini_without_key_fails_before_network() {
        let config = ClassifierConfig {
            api_key_env: "NBR_TEST_UNSET_GEMINI_KEY".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            ..ClassifierConfig::default()
        };
        let model = GeminiModel::new(&config).unwrap();
        let err = model.complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn gemini_response_parts_are_joined() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "EXEOL_" }, { "text": "GTA" }] } }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "EXEOL_GTA");
        assert!(parse_gemini_response(&serde_json::json!({ "candidates": [] })).is_err());
    }

    #[test]
    fn create_model_by_provider() {
        let mut config = ClassifierConfig {
            provider: "disabled".to_string(),
            ..ClassifierConfig::default()
        };
        assert_eq!(create_model(&config).unwrap().model_name(), "disabled");
        config.provider = "other".to_string();
        assert!(create_model(&config).is_err());
    }
}
