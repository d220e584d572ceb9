use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::AppError;
use crate::llm::{Completion, LlmProvider, LlmRequest};

/// Marker inserted around paragraph breaks so the model keeps the paragraph count.
pub const PARAGRAPH_MARKER: &str = "[PARAGRAPH_BREAK]";

pub const SYSTEM_INSTRUCTION: &str = "You are a professional Nepali news editor. \
Generate a short and relevant headline, then rewrite the article in totally new style and structure \
by not losing originality using standard journalistic Nepali. Result must be in the same paragraph count. \
No need to mention Explanation of changes, Key Changes & style notes just focus on best rewritting result.";

/// Integration style of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    AzureStyle,
    OpenRouterStyle,
}

/// Backend and model a provider key resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderRoute {
    pub backend: Backend,
    pub model: &'static str,
}

/// Every provider the rewrite endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKey {
    AzureGpt41,
    AzureGpt41Nano,
    AzureGpt41Mini,
    AzureGrok,
    OpenRouterGpt41Nano,
    OpenRouterDeepseek,
    OpenRouterGpt35,
    OpenRouterGemma,
    OpenRouterClaude3,
}

impl ProviderKey {
    pub const ALL: [ProviderKey; 9] = [
        ProviderKey::AzureGpt41,
        ProviderKey::AzureGpt41Nano,
        ProviderKey::OpenRouterGpt41Nano,
        ProviderKey::OpenRouterDeepseek,
        ProviderKey::AzureGpt41Mini,
        ProviderKey::AzureGrok,
        ProviderKey::OpenRouterGpt35,
        ProviderKey::OpenRouterGemma,
        ProviderKey::OpenRouterClaude3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKey::AzureGpt41 => "azure_gpt41",
            ProviderKey::AzureGpt41Nano => "azure_gpt41_nano",
            ProviderKey::AzureGpt41Mini => "azure_gpt41_mini",
            ProviderKey::AzureGrok => "azure_grok",
            ProviderKey::OpenRouterGpt41Nano => "openrouter_gpt41_nano",
            ProviderKey::OpenRouterDeepseek => "openrouter_deepseek",
            ProviderKey::OpenRouterGpt35 => "openrouter_gpt35",
            ProviderKey::OpenRouterGemma => "openrouter_gemma",
            ProviderKey::OpenRouterClaude3 => "openrouter_claude3",
        }
    }

    pub fn route(self) -> ProviderRoute {
        use Backend::*;
        let (backend, model) = match self {
            ProviderKey::AzureGpt41 => (AzureStyle, "openai/gpt-4.1"),
            ProviderKey::AzureGpt41Nano => (AzureStyle, "openai/gpt-4.1-nano"),
            ProviderKey::AzureGpt41Mini => (AzureStyle, "openai/gpt-4.1-mini"),
            ProviderKey::AzureGrok => (AzureStyle, "xai/grok-3-mini"),
            ProviderKey::OpenRouterGpt41Nano => (OpenRouterStyle, "openai/gpt-4.1-nano"),
            ProviderKey::OpenRouterDeepseek => (OpenRouterStyle, "deepseek/deepseek-r1-0528:free"),
            ProviderKey::OpenRouterGpt35 => (OpenRouterStyle, "openai/gpt-3.5-turbo"),
            ProviderKey::OpenRouterGemma => (OpenRouterStyle, "google/gemma-3-27b-it:free"),
            ProviderKey::OpenRouterClaude3 => (OpenRouterStyle, "anthropic/claude-3-haiku"),
        };
        ProviderRoute { backend, model }
    }

    /// Human-readable name used in user-facing messages
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKey::AzureGpt41 => "Azure GPT-4.1",
            ProviderKey::AzureGpt41Nano => "Azure GPT-4.1 Nano",
            ProviderKey::AzureGpt41Mini => "Azure GPT-4.1 Mini",
            ProviderKey::AzureGrok => "Azure Grok",
            ProviderKey::OpenRouterGpt41Nano => "OpenRouter GPT-4.1 Nano",
            ProviderKey::OpenRouterDeepseek => "OpenRouter DeepSeek",
            ProviderKey::OpenRouterGpt35 => "OpenRouter GPT-3.5",
            ProviderKey::OpenRouterGemma => "OpenRouter Gemma",
            ProviderKey::OpenRouterClaude3 => "OpenRouter Claude-3",
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AppError::invalid(format!("Invalid API selected: {}", s)))
    }
}

/// Normalized result of one rewrite attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Success(String),
    RateLimited,
    Failure,
}

/// Routes rewrite requests to the provider family their key names.
#[derive(Clone)]
pub struct Rewriter {
    azure: Arc<dyn LlmProvider>,
    openrouter: Arc<dyn LlmProvider>,
}

impl Rewriter {
    pub fn new(azure: Arc<dyn LlmProvider>, openrouter: Arc<dyn LlmProvider>) -> Self {
        Self { azure, openrouter }
    }

    /// Rewrite `article_text` with the provider named by `provider_key`.
    ///
    /// Input is validated before any provider is contacted; exactly one
    /// provider call is made per invocation and it is never retried.
    pub async fn rewrite(&self, article_text: &str, provider_key: &str) -> Result<RewriteOutcome, AppError> {
        if article_text.trim().is_empty() {
            return Err(AppError::invalid("News content cannot be empty"));
        }
        let key: ProviderKey = provider_key.parse().map_err(|e| {
            error!("Invalid API selected: {}", provider_key);
            e
        })?;

        let route = key.route();
        let provider = match route.backend {
            Backend::AzureStyle => &self.azure,
            Backend::OpenRouterStyle => &self.openrouter,
        };

        info!("Trying {:?} model: {}", route.backend, route.model);
        let request = LlmRequest::new(route.model, SYSTEM_INSTRUCTION, build_prompt(article_text));

        // A panicking adapter surfaces as a JoinError instead of unwinding through here
        let provider = Arc::clone(provider);
        let completion = match tokio::spawn(async move { provider.generate(request).await }).await {
            Ok(completion) => completion,
            Err(e) => {
                error!("{:?} adapter for model {} aborted: {}", route.backend, route.model, e);
                Completion::Unavailable
            }
        };

        let outcome = match completion {
            Completion::RateLimited => {
                warn!("Rate limit reached for {:?} model {}", route.backend, route.model);
                RewriteOutcome::RateLimited
            }
            Completion::Text(text) if !text.trim().is_empty() => {
                info!("Successfully got response from {:?} model: {}", route.backend, route.model);
                RewriteOutcome::Success(format_output(text.trim()))
            }
            Completion::Text(_) | Completion::Unavailable => {
                warn!("No response from {:?} model {}", route.backend, route.model);
                RewriteOutcome::Failure
            }
        };
        Ok(outcome)
    }
}

/// Wrap every paragraph break with [`PARAGRAPH_MARKER`].
pub fn mark_paragraphs(article: &str) -> String {
    article.replace("\n\n", &format!("\n\n{}\n\n", PARAGRAPH_MARKER))
}

pub fn build_prompt(article: &str) -> String {
    format!("Original news:\n{}\n\nRewritten news:\n", mark_paragraphs(article))
}

/// Re-join double-newline separated paragraphs. Pass-through by construction.
pub fn format_output(raw: &str) -> String {
    raw.split("\n\n").collect::<Vec<_>>().join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_round_trips() {
        for key in ProviderKey::ALL {
            assert_eq!(key.as_str().parse::<ProviderKey>().unwrap(), key);
        }
    }

    #[test]
    fn unknown_key_is_invalid_input() {
        let err = "openai_gpt5".parse::<ProviderKey>().unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn routes_match_provider_family() {
        assert_eq!(
            ProviderKey::AzureGrok.route(),
            ProviderRoute { backend: Backend::AzureStyle, model: "xai/grok-3-mini" }
        );
        assert_eq!(ProviderKey::OpenRouterGemma.route().backend, Backend::OpenRouterStyle);
        assert_eq!(ProviderKey::OpenRouterClaude3.display_name(), "OpenRouter Claude-3");
    }

    #[test]
    fn paragraph_breaks_are_marked() {
        let marked = mark_paragraphs("पहिलो अनुच्छेद\n\nदोस्रो अनुच्छेद");
        assert_eq!(marked, "पहिलो अनुच्छेद\n\n[PARAGRAPH_BREAK]\n\nदोस्रो अनुच्छेद");
    }

    #[test]
    fn prompt_shape() {
        let prompt = build_prompt("one\n\ntwo");
        assert!(prompt.starts_with("Original news:\none\n\n[PARAGRAPH_BREAK]\n\ntwo"));
        assert!(prompt.ends_with("\n\nRewritten news:\n"));
    }

    #[test]
    fn format_output_is_pass_through() {
        let text = "शीर्षक\n\nअनुच्छेद एक\n\nअनुच्छेद दुई";
        assert_eq!(format_output(text), text);
    }
}
