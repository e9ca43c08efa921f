use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Input and output directories are set and differ
/// - Concurrency and file timeout are not 0
/// - Enabled media kinds have at least one extension
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let paths = &config.paths;
    if paths.input_dir.as_os_str().is_empty() {
        return Err(invalid("paths.input_dir cannot be empty"));
    }
    if paths.output_dir.as_os_str().is_empty() {
        return Err(invalid("paths.output_dir cannot be empty"));
    }
    if paths.input_dir == paths.output_dir {
        return Err(invalid("paths.input_dir and paths.output_dir must differ"));
    }

    if config.processing.concurrency == 0 {
        return Err(invalid("processing.concurrency cannot be 0"));
    }
    if config.processing.file_timeout_secs == 0 {
        return Err(invalid("processing.file_timeout_secs cannot be 0"));
    }

    if config.audio.enabled && config.audio.extensions.is_empty() {
        return Err(invalid("audio.extensions cannot be empty when audio is enabled"));
    }
    if config.video.enabled && config.video.extensions.is_empty() {
        return Err(invalid("video.extensions cannot be empty when video is enabled"));
    }
    if !config.audio.enabled && !config.video.enabled {
        return Err(invalid("at least one of audio or video must be enabled"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use std::path::PathBuf;

    fn config() -> Config {
        load_config_from_str(
            r#"
[paths]
input_dir = "/in"
output_dir = "/out"
"#,
        )
        .unwrap()
    }

    fn assert_invalid(config: &Config, field: &str) {
        let err = validate_config(config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains(field), "{} not in {}", field, err);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&config()).is_ok());
    }

    #[test]
    fn test_validate_concurrency_zero_fails() {
        let mut config = config();
        config.processing.concurrency = 0;
        assert_invalid(&config, "processing.concurrency");
    }

    #[test]
    fn test_validate_same_directories_fails() {
        let mut config = config();
        config.paths.output_dir = PathBuf::from("/in");
        assert_invalid(&config, "must differ");
    }

    #[test]
    fn test_validate_timeout_zero_fails() {
        let mut config = config();
        config.processing.file_timeout_secs = 0;
        assert_invalid(&config, "file_timeout_secs");
    }

    #[test]
    fn test_validate_enabled_kind_without_extensions_fails() {
        let mut config = config();
        config.audio.extensions.clear();
        assert_invalid(&config, "audio.extensions");

        config.audio.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_everything_disabled_fails() {
        let mut config = config();
        config.audio.enabled = false;
        config.video.enabled = false;
        assert_invalid(&config, "at least one");
    }
}
