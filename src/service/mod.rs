//! Language service boundary: translation and span detection.
//!
//! The orchestrators only see [`LanguageService`]; the concrete client is
//! built lazily by a [`ServiceProvider`] from the current
//! [`ServiceConfig`] and reused until the configuration changes.

pub mod openai;

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use openai::OpenAiClient;

/// Default Responses API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/responses";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-5-mini-2025-08-07";

/// Default translation instructions.
pub const DEFAULT_TRANSLATE_INSTRUCTIONS: &str = "与えられた英語を情報処理学会論文誌の形式の日本語に翻訳してください。翻訳結果以外の内容を含めないでください。";

/// Raw span-detection answer: the tokens the service saw and the
/// bracket-annotated stream, e.g. `(O the results ) (C clear )`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanDetection {
    /// Whitespace tokens echoed by the service
    #[serde(default)]
    pub tokens: Vec<String>,

    /// Bracket-annotated token stream
    #[serde(default)]
    pub bracket: String,
}

impl SpanDetection {
    /// Parse a detection from the service's output text.
    ///
    /// Tolerates a surrounding markdown code fence.
    pub fn parse(output: &str) -> Result<Self> {
        let json = strip_code_fence(output);
        serde_json::from_str(json).map_err(Error::from)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Translation and span-detection capability.
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Translate one text block.
    async fn translate(&self, text: &str) -> Result<String>;

    /// Detect object/complement spans in one text block.
    async fn detect_spans(&self, text: &str) -> Result<SpanDetection>;
}

/// Connection settings for the language service.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Responses API endpoint
    pub endpoint: String,

    /// Bearer credential
    #[serde(default)]
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Instructions sent with every translation request
    pub translate_instructions: String,

    /// Per-request timeout
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl ServiceConfig {
    /// Create a configuration with defaults and the given credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Set the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the translation instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.translate_instructions = instructions.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether a non-blank credential is configured.
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Identity of the client this configuration produces.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{:?}",
            self.endpoint,
            self.api_key.trim(),
            self.model,
            self.translate_instructions,
            self.timeout
        )
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            translate_instructions: DEFAULT_TRANSLATE_INSTRUCTIONS.to_string(),
            timeout: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &if self.has_credential() { "<set>" } else { "<empty>" })
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

type ServiceFactory = dyn Fn(&ServiceConfig) -> Result<Arc<dyn LanguageService>> + Send + Sync;

/// Builds and caches the language service for the current configuration.
pub struct ServiceProvider {
    factory: Arc<ServiceFactory>,
    cached: Mutex<Option<(String, Arc<dyn LanguageService>)>>,
}

impl ServiceProvider {
    /// Create a provider from a factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&ServiceConfig) -> Result<Arc<dyn LanguageService>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            cached: Mutex::new(None),
        }
    }

    /// Provider building [`OpenAiClient`]s.
    pub fn openai() -> Self {
        Self::new(|config| {
            let client = OpenAiClient::new(config.clone())?;
            Ok(Arc::new(client) as Arc<dyn LanguageService>)
        })
    }

    /// Provider that always hands out the same service.
    pub fn fixed(service: Arc<dyn LanguageService>) -> Self {
        Self::new(move |_| Ok(Arc::clone(&service)))
    }

    /// Service for `config`, rebuilt only when the configuration changed.
    pub fn get(&self, config: &ServiceConfig) -> Result<Arc<dyn LanguageService>> {
        let key = config.cache_key();
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_key, service)) = cached.as_ref() {
            if *cached_key == key {
                return Ok(Arc::clone(service));
            }
        }
        log::debug!("building language service for model {}", config.model);
        let service = (self.factory)(config)?;
        *cached = Some((key, Arc::clone(&service)));
        Ok(service)
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider").finish_non_exhaustive()
    }
}
