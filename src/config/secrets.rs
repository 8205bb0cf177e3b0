//! Secret resolution
//!
//! Credentials are looked up across an ordered list of sources; the first
//! non-empty value wins. The standard order is the secrets file, then the
//! process environment, then a `.env` file.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::{Error, Result};

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const GROQ_API_KEY: &str = "GROQ_API_KEY";
pub const ELEVENLABS_API_KEY: &str = "ELEVENLABS_API_KEY";

/// Every secret the assistant needs to start, in reporting order
pub const REQUIRED_SECRETS: [&str; 4] = [
    OPENAI_API_KEY,
    OPENAI_BASE_URL,
    GROQ_API_KEY,
    ELEVENLABS_API_KEY,
];

/// Default secrets file name, looked up in the working directory
pub const DEFAULT_SECRETS_FILE: &str = ".secrets.toml";

/// Default dotenv file name, looked up in the working directory
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Where a secret may come from
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// TOML file of top-level `KEY = "value"` pairs
    File(PathBuf),
    /// Process environment
    Environment,
    /// dotenv file, read without modifying the process environment
    DotEnv(PathBuf),
    /// Fixed values
    Static(HashMap<String, String>),
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "secrets file {}", path.display()),
            Self::Environment => f.write_str("environment"),
            Self::DotEnv(path) => write!(f, "dotenv file {}", path.display()),
            Self::Static(_) => f.write_str("static values"),
        }
    }
}

impl SecretSource {
    /// Snapshot this source's values for the required keys
    ///
    /// Unreadable or malformed files are logged and treated as empty.
    fn load(&self) -> HashMap<String, String> {
        match self {
            Self::File(path) => load_toml_secrets(path),
            Self::Environment => REQUIRED_SECRETS
                .iter()
                .filter_map(|key| std::env::var(key).ok().map(|v| ((*key).to_string(), v)))
                .collect(),
            Self::DotEnv(path) => load_dotenv(path),
            Self::Static(values) => values.clone(),
        }
    }
}

pub(crate) fn load_toml_secrets(path: &Path) -> HashMap<String, String> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no secrets file");
        return HashMap::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read secrets file");
            return HashMap::new();
        }
    };

    match toml::from_str::<toml::Table>(&content) {
        Ok(table) => table
            .into_iter()
            .filter_map(|(k, v)| match v {
                toml::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse secrets file, ignoring it"
            );
            HashMap::new()
        }
    }
}

fn load_dotenv(path: &Path) -> HashMap<String, String> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter
            .filter_map(|item| match item {
                Ok(pair) => Some(pair),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping bad dotenv line");
                    None
                }
            })
            .collect(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no dotenv file");
            HashMap::new()
        }
    }
}

/// Resolved credentials
#[derive(Debug)]
pub struct Secrets {
    pub openai_api_key: SecretString,
    pub openai_base_url: String,
    pub groq_api_key: SecretString,
    pub elevenlabs_api_key: SecretString,
}

/// Resolves secrets across prioritized sources
#[derive(Debug, Clone)]
pub struct SecretResolver {
    sources: Vec<SecretSource>,
}

impl SecretResolver {
    /// Resolver over the given sources, highest priority first
    #[must_use]
    pub const fn new(sources: Vec<SecretSource>) -> Self {
        Self { sources }
    }

    /// Secrets file, then environment, then dotenv file
    #[must_use]
    pub fn standard(secrets_file: PathBuf, env_file: PathBuf) -> Self {
        Self::new(vec![
            SecretSource::File(secrets_file),
            SecretSource::Environment,
            SecretSource::DotEnv(env_file),
        ])
    }

    /// Sources in lookup order
    #[must_use]
    pub fn sources(&self) -> &[SecretSource] {
        &self.sources
    }

    /// Find which source supplies each required secret
    ///
    /// Returns `(name, Some(source))` for found secrets and `(name, None)`
    /// for missing ones, in [`REQUIRED_SECRETS`] order.
    #[must_use]
    pub fn report(&self) -> Vec<(&'static str, Option<&SecretSource>)> {
        let loaded: Vec<_> = self.sources.iter().map(|s| (s, s.load())).collect();

        REQUIRED_SECRETS
            .iter()
            .map(|key| {
                let source = loaded
                    .iter()
                    .find(|(_, values)| values.get(*key).is_some_and(|v| !v.trim().is_empty()))
                    .map(|(source, _)| *source);
                (*key, source)
            })
            .collect()
    }

    /// Resolve all required secrets
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingSecrets` listing every secret no source
    /// supplies
    pub fn resolve(&self) -> Result<Secrets> {
        let loaded: Vec<HashMap<String, String>> =
            self.sources.iter().map(SecretSource::load).collect();

        let lookup = |key: &str| {
            loaded
                .iter()
                .filter_map(|values| values.get(key))
                .map(|v| v.trim())
                .find(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut found: HashMap<&str, String> = HashMap::new();
        let mut missing = Vec::new();
        for key in REQUIRED_SECRETS {
            match lookup(key) {
                Some(value) => {
                    found.insert(key, value);
                }
                None => missing.push(key.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(Error::MissingSecrets(missing));
        }

        let mut take = |key: &str| found.remove(key).unwrap_or_default();
        let secrets = Secrets {
            openai_api_key: SecretString::from(take(OPENAI_API_KEY)),
            openai_base_url: take(OPENAI_BASE_URL),
            groq_api_key: SecretString::from(take(GROQ_API_KEY)),
            elevenlabs_api_key: SecretString::from(take(ELEVENLABS_API_KEY)),
        };

        tracing::debug!(sources = self.sources.len(), "resolved secrets");
        Ok(secrets)
    }
}

/// Write secrets to a TOML file, replacing any existing one
///
/// # Errors
///
/// Returns error if serialization or writing fails
pub fn write_secrets_file(path: &Path, values: &[(&str, String)]) -> Result<()> {
    let table: toml::Table = values
        .iter()
        .map(|(k, v)| ((*k).to_string(), toml::Value::String(v.clone())))
        .collect();

    let content = toml::to_string(&table)
        .map_err(|e| Error::Config(format!("failed to serialize secrets: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
