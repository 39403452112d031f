//! Configuration validation.

use crate::schema::ExtensionConfig;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &ExtensionConfig) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::validate_api(config, &mut result);
        Self::validate_timeouts(config, &mut result);
        Self::validate_bus(config, &mut result);
        result
    }

    fn validate_api(config: &ExtensionConfig, result: &mut ValidationResult) {
        let url = &config.api.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "api.base_url",
                "base_url must start with http:// or https://",
            ));
        }

        if config.api.token.is_none() {
            result.add_warning(ValidationWarning::new(
                "api.token",
                "API token is not set, guidance requests will be rejected",
            ));
        }
    }

    fn validate_timeouts(config: &ExtensionConfig, result: &mut ValidationResult) {
        if config.locator.timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "locator.timeout_ms",
                "timeout_ms must be greater than 0",
            ));
        }
        if config.bus.request_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "bus.request_timeout_ms",
                "request_timeout_ms must be greater than 0",
            ));
        }
        if config.api.request_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "api.request_timeout_secs",
                "request_timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_bus(config: &ExtensionConfig, result: &mut ValidationResult) {
        for origin in &config.bus.allowed_external_origins {
            if !origin.contains("://") {
                result.add_warning(ValidationWarning::new(
                    "bus.allowed_external_origins",
                    format!("'{}' has no scheme and matches any origin containing it", origin),
                ));
            }
        }
    }
}
