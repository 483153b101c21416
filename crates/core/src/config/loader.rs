use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment prefix for config overrides, e.g. `TALLY_SCHEDULER__CLUSTERS=4`.
pub const ENV_PREFIX: &str = "TALLY_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[scheduler]
clusters = 3

[runner]
parallel = true
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.scheduler.clusters, 3);
        assert!(config.runner.parallel);
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let toml = r#"
[scheduler]
clusters = "many"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/tally.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
accounts_path = "/srv/accounts.json"

[crash_recovery]
restart_failed_worker = true
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.accounts_path.to_str().unwrap(), "/srv/accounts.json");
        assert!(config.crash_recovery.restart_failed_worker);
        assert_eq!(config.scheduler.clusters, 1);
    }
}
