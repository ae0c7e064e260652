//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{DuplicatePolicy, UploaderConfig};
use super::secret::secret_string;
use crate::domain::errors::UploaderError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Configuration file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "phi-uploader.toml";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into UploaderConfig
/// 4. Applies environment variable overrides (PHI_UPLOADER_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file is missing or unreadable, a referenced
/// environment variable is unset, or the result fails validation.
///
/// # Examples
///
/// ```no_run
/// use phi_uploader::config::loader::load_config;
///
/// let config = load_config("phi-uploader.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<UploaderConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(UploaderError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        UploaderError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: UploaderConfig = toml::from_str(&contents)
        .map_err(|e| UploaderError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        UploaderError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if it
/// exists, or falls back to defaults
///
/// An explicitly given path must exist. Environment overrides apply in
/// every case.
pub fn load_config_or_default(path: Option<&str>) -> Result<UploaderConfig> {
    if let Some(path) = path {
        return load_config(path);
    }

    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        return load_config(DEFAULT_CONFIG_FILE);
    }

    let mut config = UploaderConfig::default();
    apply_env_overrides(&mut config);
    config.validate().map_err(|e| {
        UploaderError::Configuration(format!("Configuration validation failed: {e}"))
    })?;
    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| UploaderError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(UploaderError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the PHI_UPLOADER_* prefix
///
/// Variables follow the pattern PHI_UPLOADER_<SECTION>_<KEY>, for example
/// PHI_UPLOADER_API_BASE_URL. Unparseable numeric or boolean values are
/// ignored.
fn apply_env_overrides(config: &mut UploaderConfig) {
    if let Ok(val) = std::env::var("PHI_UPLOADER_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Ok(val) = std::env::var("PHI_UPLOADER_API_BASE_URL") {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("PHI_UPLOADER_API_EMAIL") {
        config.api.email = Some(val);
    }
    if let Ok(val) = std::env::var("PHI_UPLOADER_API_PASSWORD") {
        config.api.password = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("PHI_UPLOADER_API_TLS_VERIFY") {
        if let Ok(verify) = val.parse() {
            config.api.tls_verify = verify;
        }
    }
    if let Ok(val) = std::env::var("PHI_UPLOADER_API_TIMEOUT_SECONDS") {
        if let Ok(timeout) = val.parse() {
            config.api.timeout_seconds = timeout;
        }
    }
    if let Ok(val) = std::env::var("PHI_UPLOADER_API_MAX_RETRIES") {
        if let Ok(retries) = val.parse() {
            config.api.retry.max_retries = retries;
        }
    }

    if let Ok(val) = std::env::var("PHI_UPLOADER_BUILD_ROOT") {
        config.build.root = val;
    }
    if let Ok(val) = std::env::var("PHI_UPLOADER_BUILD_TEMPLATE") {
        config.build.template = Some(val);
    }
    if let Ok(val) = std::env::var("PHI_UPLOADER_BUILD_DATASET") {
        config.build.dataset = Some(val);
    }

    if let Ok(val) = std::env::var("PHI_UPLOADER_UPLOAD_PATIENT_DUPLICATE_POLICY") {
        match val.to_lowercase().as_str() {
            "uploaded" => config.upload.patient_duplicate_policy = DuplicatePolicy::Uploaded,
            "not_uploaded" => {
                config.upload.patient_duplicate_policy = DuplicatePolicy::NotUploaded
            }
            _ => tracing::warn!(value = %val, "Ignoring invalid patient duplicate policy override"),
        }
    }

    if let Ok(val) = std::env::var("PHI_UPLOADER_LOGGING_LOCAL_ENABLED") {
        if let Ok(enabled) = val.parse() {
            config.logging.local_enabled = enabled;
        }
    }
    if let Ok(val) = std::env::var("PHI_UPLOADER_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("PHI_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${PHI_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("PHI_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("PHI_LOADER_MISSING_VAR");
        let input = "password = \"${PHI_LOADER_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("PHI_LOADER_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("PHI_LOADER_COMMENTED_VAR");
        let input = "# password = \"${PHI_LOADER_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent-phi-uploader.toml");
        assert!(matches!(result, Err(UploaderError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[api]
base_url = "http://localhost:3000/api/v1"
email = "uploader@example.org"
password = "pass"

[build]
dataset = "WashU"

[upload]
patient_duplicate_policy = "not_uploaded"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.api.base_url, "http://localhost:3000/api/v1");
        assert_eq!(config.api.email.as_deref(), Some("uploader@example.org"));
        assert_eq!(
            config.api.password.as_ref().unwrap().expose_secret(),
            "pass"
        );
        assert_eq!(config.build.dataset.as_deref(), Some("WashU"));
        assert_eq!(
            config.upload.patient_duplicate_policy,
            DuplicatePolicy::NotUploaded
        );
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[api]\nbase_url = \"ftp://example.org\"\n")
            .unwrap();
        temp_file.flush().unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }
}
