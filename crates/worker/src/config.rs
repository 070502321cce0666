use std::str::FromStr;
use std::time::Duration;

use litessay_core::config::{
    PipelineConfig, DEFAULT_EXPAND_CONTEXT_WINDOW, DEFAULT_MAX_REVISIONS,
    DEFAULT_MAX_SEGMENT_CHARS, DEFAULT_SUMMARY_CHUNK_SIZE, DEFAULT_TOP_K_EVIDENCE,
};
use litessay_providers::gutenberg::{DEFAULT_GUTENDEX_URL, DEFAULT_TEXT_URL};
use litessay_providers::openai::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};
use litessay_providers::pinecone::{DEFAULT_CLOUD, DEFAULT_INDEX, DEFAULT_REGION};
use litessay_providers::{GutenbergConfig, OpenAiConfig, PineconeConfig};

const DEFAULT_POLL_SECS: u64 = 3;
const DEFAULT_HEARTBEAT_SECS: u64 = 30;
const DEFAULT_REQUEUE_STALE_SECS: f64 = 300.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid ({value:?}): {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Worker configuration loaded from environment variables.
///
/// Built once at startup and passed by reference; nothing reads the
/// environment after that.
///
/// | Env Var                   | Default                                         |
/// |---------------------------|-------------------------------------------------|
/// | `DATABASE_URL`            | required                                        |
/// | `WORKER_POLL_SECS`        | `3`                                             |
/// | `HEARTBEAT_INTERVAL_SECS` | `30`, must be below `REQUEUE_STALE_SECS`         |
/// | `REQUEUE_STALE_SECS`      | `300`                                           |
/// | `MAX_SEGMENT_CHARS`       | `2000`                                          |
/// | `TOP_K_EVIDENCE`          | `8`                                             |
/// | `SUMMARY_CHUNK_SIZE`      | `40`                                            |
/// | `EXPAND_CONTEXT_WINDOW`   | `3`                                             |
/// | `MAX_REVISIONS`           | `2`                                             |
/// | `OPENAI_API_KEY`          | required by `run`                               |
/// | `OPENAI_BASE_URL`         | `https://api.openai.com/v1`                     |
/// | `OPENAI_CHAT_MODEL`       | `gpt-5-mini`                                    |
/// | `OPENAI_EMBEDDING_MODEL`  | `text-embedding-3-small`                        |
/// | `PINECONE_API_KEY`        | required by `run`                               |
/// | `PINECONE_INDEX`          | `literary-essays`                               |
/// | `PINECONE_CLOUD`          | `aws`                                           |
/// | `PINECONE_REGION`         | `us-east-1`                                     |
/// | `GUTENBERG_TEXT_URL`      | `https://www.gutenberg.org/ebooks/{id}.txt.utf-8` |
/// | `GUTENDEX_URL`            | `https://gutendex.com/books`                    |
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Heartbeat age after which `requeue` treats a running job as stale.
    pub requeue_stale_secs: f64,
    pub pipeline: PipelineConfig,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_chat_model: String,
    pub openai_embedding_model: String,
    pub pinecone_api_key: Option<String>,
    pub pinecone_index: String,
    pub pinecone_cloud: String,
    pub pinecone_region: String,
    pub gutenberg: GutenbergConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let pipeline = PipelineConfig {
            max_segment_chars: parse_or(&get, "MAX_SEGMENT_CHARS", DEFAULT_MAX_SEGMENT_CHARS)?,
            top_k_evidence: parse_or(&get, "TOP_K_EVIDENCE", DEFAULT_TOP_K_EVIDENCE)?,
            summary_chunk_size: parse_or(&get, "SUMMARY_CHUNK_SIZE", DEFAULT_SUMMARY_CHUNK_SIZE)?,
            expand_context_window: parse_or(
                &get,
                "EXPAND_CONTEXT_WINDOW",
                DEFAULT_EXPAND_CONTEXT_WINDOW,
            )?,
            max_revisions: parse_or(&get, "MAX_REVISIONS", DEFAULT_MAX_REVISIONS)?,
        };
        pipeline.validate().map_err(|e| ConfigError::Invalid {
            var: "pipeline settings",
            value: format!("{pipeline:?}"),
            reason: e.to_string(),
        })?;

        let requeue_stale_secs: f64 = parse_or(&get, "REQUEUE_STALE_SECS", DEFAULT_REQUEUE_STALE_SECS)?;
        if !requeue_stale_secs.is_finite() || requeue_stale_secs < 0.0 {
            return Err(ConfigError::Invalid {
                var: "REQUEUE_STALE_SECS",
                value: requeue_stale_secs.to_string(),
                reason: "must be a non-negative number".into(),
            });
        }

        // A live worker must always look fresh to a non-forced requeue.
        let heartbeat_secs: u64 =
            parse_or(&get, "HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_SECS)?.max(1);
        if heartbeat_secs as f64 >= requeue_stale_secs {
            return Err(ConfigError::Invalid {
                var: "HEARTBEAT_INTERVAL_SECS",
                value: heartbeat_secs.to_string(),
                reason: format!("must be below REQUEUE_STALE_SECS ({requeue_stale_secs})"),
            });
        }

        Ok(Self {
            database_url,
            poll_interval: Duration::from_secs(parse_or(&get, "WORKER_POLL_SECS", DEFAULT_POLL_SECS)?),
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            requeue_stale_secs,
            pipeline,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: text("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            openai_chat_model: text("OPENAI_CHAT_MODEL", DEFAULT_CHAT_MODEL),
            openai_embedding_model: text("OPENAI_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            pinecone_api_key: get("PINECONE_API_KEY"),
            pinecone_index: text("PINECONE_INDEX", DEFAULT_INDEX),
            pinecone_cloud: text("PINECONE_CLOUD", DEFAULT_CLOUD),
            pinecone_region: text("PINECONE_REGION", DEFAULT_REGION),
            gutenberg: GutenbergConfig {
                text_url: text("GUTENBERG_TEXT_URL", DEFAULT_TEXT_URL),
                gutendex_url: text("GUTENDEX_URL", DEFAULT_GUTENDEX_URL),
            },
        })
    }

    pub fn openai(&self) -> Result<OpenAiConfig, ConfigError> {
        let api_key = self
            .openai_api_key
            .clone()
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        Ok(OpenAiConfig {
            base_url: self.openai_base_url.clone(),
            chat_model: self.openai_chat_model.clone(),
            embedding_model: self.openai_embedding_model.clone(),
            ..OpenAiConfig::new(api_key)
        })
    }

    pub fn pinecone(&self) -> Result<PineconeConfig, ConfigError> {
        let api_key = self
            .pinecone_api_key
            .clone()
            .ok_or(ConfigError::Missing("PINECONE_API_KEY"))?;
        Ok(PineconeConfig {
            index_name: self.pinecone_index.clone(),
            cloud: self.pinecone_cloud.clone(),
            region: self.pinecone_region.clone(),
            ..PineconeConfig::new(api_key)
        })
    }

    /// Log the effective settings. Secrets are reported as set or missing.
    pub fn log_summary(&self) {
        let secret = |v: &Option<String>| if v.is_some() { "set" } else { "missing" };
        tracing::info!(
            poll_secs = self.poll_interval.as_secs(),
            heartbeat_secs = self.heartbeat_interval.as_secs(),
            max_segment_chars = self.pipeline.max_segment_chars,
            top_k_evidence = self.pipeline.top_k_evidence,
            summary_chunk_size = self.pipeline.summary_chunk_size,
            expand_context_window = self.pipeline.expand_context_window,
            max_revisions = self.pipeline.max_revisions,
            chat_model = %self.openai_chat_model,
            embedding_model = %self.openai_embedding_model,
            pinecone_index = %self.pinecone_index,
            openai_api_key = secret(&self.openai_api_key),
            pinecone_api_key = secret(&self.pinecone_api_key),
            "Loaded worker configuration",
        );
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
