//! Layered construction of [`Config`]: defaults, then file values, then
//! explicit overrides (usually CLI flags), then validation.

use super::file::ConfigFile;
use super::validation::validate_config;
use super::Config;
use crate::core::error::Result;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every value present in the parsed file on top of the current state.
    pub fn apply_file(mut self, file: &ConfigFile, path: Option<String>) -> Self {
        let smtp = &file.smtp;
        if let Some(ref name) = smtp.hello_name {
            self.config.hello_name = name.clone();
        }
        if let Some(accept) = smtp.accept_invalid_certs {
            self.config.accept_invalid_certs = accept;
        }
        if let Some(ms) = smtp.command_timeout_ms {
            self.config.command_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = smtp.connect_timeout_ms {
            self.config.single_connect_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = smtp.greeting_timeout_ms {
            self.config.single_greeting_timeout = Some(Duration::from_millis(ms));
        }

        if let Some(ref addr) = file.server.bind_address {
            self.config.bind_address = addr.clone();
        }
        if let Some(port) = file.server.port {
            self.config.server_port = port;
        }

        self.config.loaded_config_path = path;
        self
    }

    pub fn hello_name(mut self, name: Option<String>) -> Self {
        if let Some(name) = name {
            self.config.hello_name = name;
        }
        self
    }

    pub fn accept_invalid_certs(mut self, accept: Option<bool>) -> Self {
        if let Some(accept) = accept {
            self.config.accept_invalid_certs = accept;
        }
        self
    }

    pub fn connect_timeout_ms(mut self, ms: Option<u64>) -> Self {
        if let Some(ms) = ms {
            self.config.single_connect_timeout = Some(Duration::from_millis(ms));
        }
        self
    }

    pub fn greeting_timeout_ms(mut self, ms: Option<u64>) -> Self {
        if let Some(ms) = ms {
            self.config.single_greeting_timeout = Some(Duration::from_millis(ms));
        }
        self
    }

    pub fn command_timeout_ms(mut self, ms: Option<u64>) -> Self {
        if let Some(ms) = ms {
            self.config.command_timeout = Duration::from_millis(ms);
        }
        self
    }

    pub fn bind_address(mut self, addr: Option<String>) -> Self {
        if let Some(addr) = addr {
            self.config.bind_address = addr;
        }
        self
    }

    pub fn server_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.config.server_port = port;
        }
        self
    }

    pub fn build(self) -> Result<Config> {
        validate_config(&self.config)?;
        tracing::debug!("Configuration built: {:?}", self.config);
        Ok(self.config)
    }
}
