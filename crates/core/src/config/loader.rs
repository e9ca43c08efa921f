use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// `REFINERY_PROCESSING__CONCURRENCY=8` overrides `processing.concurrency`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("REFINERY_").split("__"))
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
[paths]
input_dir = "/in"
output_dir = "/out"

[processing]
concurrency = 2
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.processing.concurrency, 2);
    }

    #[test]
    fn test_load_config_from_str_missing_paths() {
        let toml = r#"
[processing]
concurrency = 2
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config(Path::new("/nonexistent/refinery.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[paths]
input_dir = "/library/incoming"
output_dir = "/library/sorted"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.paths.output_dir.to_str(), Some("/library/sorted"));
        assert_eq!(config.logging.format, crate::config::LogFormat::Json);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "refinery.toml",
                r#"
[paths]
input_dir = "/in"
output_dir = "/out"
"#,
            )?;
            jail.set_env("REFINERY_PROCESSING__CONCURRENCY", "12");

            let config = load_config(Path::new("refinery.toml"))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.processing.concurrency, 12);
            Ok(())
        });
    }
}
