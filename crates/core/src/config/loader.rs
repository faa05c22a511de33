use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides, e.g. `PLAZZA_KITCHEN__COOKS=4`
const ENV_PREFIX: &str = "PLAZZA_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(Figment::new().merge(Toml::file(path)))
}

/// Like [`load_config`], but falls back to defaults when the file is absent
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!("No configuration file at {:?}, using defaults", path);
        extract(Figment::from(Serialized::defaults(Config::default())))
    }
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[link]
port = 5000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.link.port, 5000);
    }

    #[test]
    fn test_load_config_from_str_invalid() {
        let toml = r#"
[kitchen]
cooks = "many"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/plazza.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_or_default_without_file() {
        let config = load_config_or_default(Path::new("/nonexistent/plazza.toml")).unwrap();
        assert_eq!(config.kitchen.cooks, 3);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[link]
host = "127.0.0.1"
port = 4343

[kitchen]
cooks = 2
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.link.port, 4343);
        assert_eq!(config.kitchen.cooks, 2);
        assert_eq!(config.kitchen.cooking_multiplier, 1.0);
    }
}
