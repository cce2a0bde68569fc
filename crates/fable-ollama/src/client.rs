//! Ollama daemon client implementation

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::{debug, info, warn};

use fable_core::{
    ChatMessage, Error, Generation, GenerationBackend, GenerationFailure, ProviderKind, Result,
};

use crate::config::OllamaConfig;

/// Ollama daemon client
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
    models: Vec<ModelInfo>,
    current_model: RwLock<String>,
}

/// A model as listed by `GET /api/tags`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub family: Option<String>,
}

/// Human readable description of the active model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub size: String,
    pub modified_at: String,
    pub family: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

impl OllamaClient {
    /// Connect to the daemon and select a model.
    ///
    /// With `model` set, it must be among the loaded models; otherwise the
    /// first listed model is used. A daemon that cannot be listed counts as
    /// having no models.
    pub async fn connect(config: OllamaConfig, model: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let models = match fetch_models(&client, &config).await {
            Ok(models) => models,
            Err(e) => {
                warn!(host = %config.host, error = %e, "failed to list Ollama models");
                Vec::new()
            }
        };

        let first = models.first().ok_or(Error::NoModelsAvailable)?;
        let selected = match model {
            Some(name) => {
                if !models.iter().any(|m| m.name == name) {
                    return Err(Error::ModelNotFound {
                        model: name.to_string(),
                        available: models.iter().map(|m| m.name.clone()).collect(),
                    });
                }
                name.to_string()
            }
            None => first.name.clone(),
        };

        let client = Self {
            config,
            client,
            models,
            current_model: RwLock::new(selected),
        };

        let summary = client.model_info();
        info!(
            model = %summary.name,
            size = %summary.size,
            family = %summary.family,
            "Ollama backend ready"
        );

        Ok(client)
    }

    /// List the models currently loaded in the daemon
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        fetch_models(&self.client, &self.config).await
    }

    /// Models that were available when the client connected
    pub fn available_models(&self) -> &[ModelInfo] {
        &self.models
    }

    /// The model used for generation
    pub fn model(&self) -> String {
        match self.current_model.read() {
            Ok(model) => model.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Switch to another listed model
    pub fn set_model(&self, name: &str) -> Result<()> {
        if !self.models.iter().any(|m| m.name == name) {
            return Err(Error::ModelNotFound {
                model: name.to_string(),
                available: self.models.iter().map(|m| m.name.clone()).collect(),
            });
        }

        let mut current = match self.current_model.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = name.to_string();
        info!(model = %name, "switched Ollama model");
        Ok(())
    }

    /// Describe the active model; unknown fields read `unknown`
    pub fn model_info(&self) -> ModelSummary {
        let name = self.model();
        match self.models.iter().find(|m| m.name == name) {
            Some(info) => ModelSummary {
                name,
                size: format_size(info.size),
                modified_at: info
                    .modified_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string()),
                family: info
                    .details
                    .as_ref()
                    .and_then(|d| d.family.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
            },
            None => ModelSummary {
                name,
                size: "unknown".to_string(),
                modified_at: "unknown".to_string(),
                family: "unknown".to_string(),
            },
        }
    }

    fn request_failure(&self, err: reqwest::Error) -> GenerationFailure {
        if err.is_timeout() {
            GenerationFailure::Timeout(self.config.timeout())
        } else {
            GenerationFailure::Transport(err.to_string())
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, GenerationFailure>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.config.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_failure(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationFailure::Server {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GenerationFailure::Malformed(e.to_string()))
    }
}

async fn fetch_models(client: &Client, config: &OllamaConfig) -> Result<Vec<ModelInfo>> {
    let response = client
        .get(config.endpoint("tags"))
        .send()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::Network(format!(
            "listing models failed with status {}",
            response.status()
        )));
    }

    let tags: TagsResponse = response
        .json()
        .await
        .map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(tags.models)
}

/// Format a byte count with binary units, e.g. `4.7 GB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn describe(&self) -> String {
        format!("ollama ({})", self.model())
    }

    async fn generate(&self, prompt: &str) -> Generation {
        let model = self.model();
        debug!(model = %model, prompt_len = prompt.len(), "Ollama generate");

        let request = GenerateRequest {
            model: &model,
            prompt,
            stream: false,
        };
        let response: GenerateResponse = self.post("generate", &request).await.map_err(|e| {
            warn!(model = %model, error = %e, "Ollama generation failed");
            e
        })?;
        Ok(response.response)
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Generation {
        let model = self.model();
        let request = ChatRequest {
            model: &model,
            messages,
            stream: false,
        };
        let response: ChatResponse = self.post("chat", &request).await.map_err(|e| {
            warn!(model = %model, error = %e, "Ollama chat failed");
            e
        })?;
        Ok(response.message.content)
    }
}
