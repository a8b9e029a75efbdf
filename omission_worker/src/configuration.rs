use std::path::PathBuf;

use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub qdrant: QdrantSettings,
    pub embeddings: EmbeddingsSettings,
    pub llm: LlmSettings,
    pub documents: DocumentsSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub grpc_port: u16,
    pub api_key: Option<Secret<String>>,
    /// Name of the descriptor collection, declared idempotently at startup.
    pub collection: String,
    /// Dimensionality of the configured embedding model.
    pub collection_vector_size: u64,
}

impl QdrantSettings {
    pub fn get_grpc_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.grpc_port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingsSettings {
    pub backend: EmbeddingsBackend,
    pub model: String,
    /// Vision-capable model for image embeddings, when the deployment has one.
    pub multimodal_model: Option<String>,
    /// Inference endpoint, required for the `remote` backend.
    pub endpoint: Option<String>,
    pub api_key: Option<Secret<String>>,
    /// Pair extracted page images with a vision-model embedding at ingestion.
    #[serde(default)]
    pub embed_images: bool,
}

/// Where embeddings are computed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingsBackend {
    /// Hosted inference endpoint.
    Remote,
    /// In-process rust-bert model; needs the `local-embeddings` feature.
    Local,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmSettings {
    pub api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsSettings {
    pub marketing_doc: PathBuf,
    pub clinical_doc: PathBuf,
    /// Where extracted page images are written, one file per occurrence.
    pub images_output_dir: PathBuf,
}

/// Extracts app settings from configuration files and env variables
///
/// `base.yaml` should contain shared settings for all environments.
/// A specific env file should be created for each environment: `develop.yaml`, `local.yaml` and `production.yaml`
/// The environment is set with the env var `APP_ENVIRONMENT`.
/// If `APP_ENVIRONMENT` is not set, `develop.yaml` is the default.
///
/// Settings are also taken from environment variables: with a prefix of APP and '__' as separator
/// For ex: `APP_LLM__API_KEY=sk-...` would set `Settings.llm.api_key`
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    // Detects the running environment.
    // Default to `develop` if unspecified.
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "develop".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // Adds in settings from environment variables (with a prefix of APP and '__' as separator)
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

/// The possible runtime environment for our application.
pub enum Environment {
    Develop,
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Develop => "develop",
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "develop" => Ok(Self::Develop),
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `develop`, `local` or `production`.",
                other
            )),
        }
    }
}
