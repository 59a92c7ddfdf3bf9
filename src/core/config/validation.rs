use super::Config;
use crate::core::error::{AppError, Result};
use std::time::Duration;

pub(crate) fn validate_config(config: &Config) -> Result<()> {
    if config.hello_name.trim().is_empty() {
        return Err(AppError::Config("smtp.hello_name must not be empty".to_string()));
    }
    if config.hello_name.chars().any(char::is_whitespace) {
        return Err(AppError::Config(format!(
            "smtp.hello_name '{}' must not contain whitespace",
            config.hello_name
        )));
    }
    if config.command_timeout.is_zero() {
        return Err(AppError::Config(
            "smtp.command_timeout_ms must be greater than zero".to_string(),
        ));
    }
    if config.single_connect_timeout == Some(Duration::ZERO) {
        return Err(AppError::Config(
            "smtp.connect_timeout_ms must be greater than zero".to_string(),
        ));
    }
    if config.single_greeting_timeout == Some(Duration::ZERO) {
        return Err(AppError::Config(
            "smtp.greeting_timeout_ms must be greater than zero".to_string(),
        ));
    }
    if config.server_port == 0 {
        return Err(AppError::Config("server.port must not be 0".to_string()));
    }
    if config.bind_address.trim().is_empty() {
        return Err(AppError::Config("server.bind_address must not be empty".to_string()));
    }
    Ok(())
}
