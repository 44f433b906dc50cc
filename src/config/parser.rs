use crate::config::types::{ApiConfig, Config};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs with different settings can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Looks up the API access token
///
/// The environment variable named by `access-token-env` wins; otherwise the
/// first line of `access-token-file` is used.
pub fn load_access_token(api: &ApiConfig) -> Result<String, ConfigError> {
    if let Ok(token) = std::env::var(&api.access_token_env) {
        let token = token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    let missing = || ConfigError::MissingCredential {
        env: api.access_token_env.clone(),
        file: api.access_token_file.display().to_string(),
    };

    let content = std::fs::read_to_string(&api.access_token_file).map_err(|_| missing())?;
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(missing)
}

/// Reads the newline-delimited list of source names
pub fn load_sources(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let sources = parse_sources(&content);
    if sources.is_empty() {
        return Err(ConfigError::EmptySources(path.display().to_string()));
    }
    Ok(sources)
}

/// Splits a sources file into names, skipping blanks, `#` comments and repeats
pub fn parse_sources(content: &str) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for line in content.lines() {
        let name = line.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        if !sources.iter().any(|s| s == name) {
            sources.push(name.to_string());
        }
    }
    sources
}
