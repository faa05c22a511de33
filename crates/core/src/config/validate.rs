use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Link port is not 0
/// - HTTP port is not 0 when the endpoint is enabled
/// - Kitchens have at least one cook
/// - Cooking multiplier is a positive number
/// - Request timeout is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.link.port == 0 {
        return Err(ConfigError::ValidationError(
            "link.port cannot be 0".to_string(),
        ));
    }

    if config.http.enabled && config.http.port == 0 {
        return Err(ConfigError::ValidationError(
            "http.port cannot be 0".to_string(),
        ));
    }

    if config.kitchen.cooks == 0 {
        return Err(ConfigError::ValidationError(
            "kitchen.cooks must be at least 1".to_string(),
        ));
    }

    let multiplier = config.kitchen.cooking_multiplier;
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "kitchen.cooking_multiplier must be positive, got {}",
            multiplier
        )));
    }

    if config.kitchen.request_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "kitchen.request_timeout_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}
