use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::tag::LabelSet;
use crate::error::{AppError, AppResult};
use crate::workflow::retry::RetryPolicy;

const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_HF_BASE_URL: &str = "https://router.huggingface.co/hf-inference";
pub const DEFAULT_SUMMARIZATION_MODEL: &str = "sshleifer/distilbart-cnn-12-6";
pub const DEFAULT_ZERO_SHOT_MODEL: &str = "facebook/bart-large-mnli";
pub const DEFAULT_SENTIMENT_MODEL: &str = "distilbert/distilbert-base-uncased-finetuned-sst-2-english";
pub const DEFAULT_COLLECTION_PATH: &str = "user_tickets/demo_user/tickets";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";

/// Resolved runtime configuration. Secrets arrive here from the environment
/// or the stored config file and are handed to clients at construction.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub hf_api_token: Option<String>,
    pub hf_base_url: String,
    pub summarization_model: String,
    pub zero_shot_model: String,
    pub sentiment_model: String,
    pub sentiment_enabled: bool,
    pub labels: LabelSet,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub classify_timeout: Duration,
    pub summary_max_chars: usize,
    pub max_input_chars: usize,
    pub firestore: Option<FirestoreConfig>,
    pub bind_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub credentials_path: Option<PathBuf>,
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    pub emulator_host: Option<String>,
    pub collection_path: String,
}

impl FirestoreConfig {
    /// Explicit project id, otherwise `project_id` from the service
    /// credential file.
    pub fn resolve_project_id(&self) -> AppResult<String> {
        if let Some(project_id) = &self.project_id {
            return Ok(project_id.clone());
        }
        let path = self.credentials_path.as_deref().ok_or_else(|| {
            AppError::Configuration("Firestore project id not configured".to_string())
        })?;
        read_project_id(path)
    }
}

fn read_project_id(path: &Path) -> AppResult<String> {
    #[derive(Deserialize)]
    struct ServiceAccount {
        project_id: Option<String>,
    }

    let contents = fs::read_to_string(path).map_err(|err| {
        AppError::Configuration(format!(
            "cannot read Firestore credentials at {}: {err}",
            path.display()
        ))
    })?;
    let account: ServiceAccount = serde_json::from_str(&contents).map_err(|err| {
        AppError::Configuration(format!("invalid Firestore credentials file: {err}"))
    })?;
    account
        .project_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            AppError::Configuration("Firestore credentials file has no project_id".to_string())
        })
}

/// On-disk settings written by `config init`. Every field is optional; the
/// environment overrides whatever is stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredConfig {
    pub hf_api_token: Option<String>,
    pub hf_base_url: Option<String>,
    pub summarization_model: Option<String>,
    pub zero_shot_model: Option<String>,
    pub sentiment_model: Option<String>,
    pub sentiment_enabled: Option<String>,
    pub labels: Option<String>,
    pub max_attempts: Option<String>,
    pub firestore_credentials: Option<String>,
    pub firestore_project_id: Option<String>,
    pub firestore_access_token: Option<String>,
    pub firestore_collection: Option<String>,
    pub bind_address: Option<String>,
}

impl StoredConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|err| AppError::Configuration(format!("invalid config file: {err}"))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| AppError::Configuration(format!("failed to write config: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }
}

pub fn config_directory() -> AppResult<PathBuf> {
    if let Some(dir) = env::var_os("INTELLIROUTE_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(dir).join("intelliroute"));
    }
    env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config").join("intelliroute"))
        .ok_or_else(|| AppError::Configuration("cannot locate a config directory".to_string()))
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        let stored = StoredConfig::load()?;
        Self::resolve(stored, |name| env::var(name).ok())
    }

    /// Layers `lookup` (normally the process environment) over `stored`.
    pub fn resolve(
        stored: StoredConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        let pick = |name: &str, fallback: Option<String>| {
            lookup(name)
                .or(fallback)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let labels = match pick("INTELLIROUTE_LABELS", stored.labels) {
            Some(list) => LabelSet::parse_list(&list).map_err(AppError::Configuration)?,
            None => LabelSet::default(),
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_number(
                "max attempts",
                pick("INTELLIROUTE_MAX_ATTEMPTS", stored.max_attempts),
                defaults.max_attempts,
            )?,
            base_delay: Duration::from_millis(parse_number(
                "retry base delay",
                pick("INTELLIROUTE_RETRY_BASE_MS", None),
                defaults.base_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_number(
                "retry max delay",
                pick("INTELLIROUTE_RETRY_MAX_MS", None),
                defaults.max_delay.as_millis() as u64,
            )?),
        };
        if retry.max_attempts == 0 {
            return Err(AppError::Configuration(
                "max attempts must be at least 1".to_string(),
            ));
        }

        let summary_max_chars = parse_number(
            "summary length",
            pick("INTELLIROUTE_SUMMARY_MAX_CHARS", None),
            280,
        )?;
        if summary_max_chars == 0 {
            return Err(AppError::Configuration(
                "summary length must be at least 1".to_string(),
            ));
        }

        let sentiment_enabled = match pick("INTELLIROUTE_SENTIMENT", stored.sentiment_enabled) {
            Some(value) => parse_flag(&value)?,
            None => true,
        };

        let credentials_path =
            pick("INTELLIROUTE_FIRESTORE_CREDENTIALS", stored.firestore_credentials)
                .map(PathBuf::from);
        let project_id = pick("FIRESTORE_PROJECT_ID", stored.firestore_project_id);
        let firestore = if credentials_path.is_some() || project_id.is_some() {
            Some(FirestoreConfig {
                credentials_path,
                project_id,
                access_token: pick("FIRESTORE_ACCESS_TOKEN", stored.firestore_access_token),
                emulator_host: pick("FIRESTORE_EMULATOR_HOST", None),
                collection_path: pick("INTELLIROUTE_FIRESTORE_COLLECTION", stored.firestore_collection)
                    .unwrap_or_else(|| DEFAULT_COLLECTION_PATH.to_string()),
            })
        } else {
            None
        };

        Ok(Self {
            hf_api_token: pick("HF_API_TOKEN", stored.hf_api_token),
            hf_base_url: pick("INTELLIROUTE_HF_BASE_URL", stored.hf_base_url)
                .unwrap_or_else(|| DEFAULT_HF_BASE_URL.to_string()),
            summarization_model: pick("INTELLIROUTE_SUMMARIZATION_MODEL", stored.summarization_model)
                .unwrap_or_else(|| DEFAULT_SUMMARIZATION_MODEL.to_string()),
            zero_shot_model: pick("INTELLIROUTE_ZERO_SHOT_MODEL", stored.zero_shot_model)
                .unwrap_or_else(|| DEFAULT_ZERO_SHOT_MODEL.to_string()),
            sentiment_model: pick("INTELLIROUTE_SENTIMENT_MODEL", stored.sentiment_model)
                .unwrap_or_else(|| DEFAULT_SENTIMENT_MODEL.to_string()),
            sentiment_enabled,
            labels,
            retry,
            request_timeout: Duration::from_secs(parse_number(
                "request timeout",
                pick("INTELLIROUTE_REQUEST_TIMEOUT_SECS", None),
                30,
            )?),
            classify_timeout: Duration::from_secs(parse_number(
                "classification timeout",
                pick("INTELLIROUTE_CLASSIFY_TIMEOUT_SECS", None),
                120,
            )?),
            summary_max_chars,
            max_input_chars: parse_number(
                "input length",
                pick("INTELLIROUTE_MAX_INPUT_CHARS", None),
                10_000,
            )?,
            firestore,
            bind_address: pick("INTELLIROUTE_BIND", stored.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: Option<String>, default: T) -> AppResult<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Configuration(format!("invalid {field}: '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_flag(value: &str) -> AppResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Configuration(format!(
            "expected true/false, got '{other}'"
        ))),
    }
}
