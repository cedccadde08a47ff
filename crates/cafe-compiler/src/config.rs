//! Target runtime configuration
//!
//! Names of the runtime classes and canonical method symbols the generated
//! methods refer to. Defaults describe the JVM `org.python` runtime and a
//! TOML document may override any subset of keys.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a target configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse TOML
    #[error("Failed to parse target config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid target config: {0}")]
    ValidationError(String),
}

/// Target platform names used by descriptors, markers and injected calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetConfig {
    /// Boxed value class every callable returns (internal name)
    pub object_class: String,

    /// Keyword-argument table class (internal name)
    pub kwargs_class: String,

    /// Descriptor of the process argument vector
    pub argv_descriptor: String,

    /// Calling-convention marker for plain functions and entry points
    pub function_marker: String,

    /// Calling-convention marker for instance methods
    pub instance_method_marker: String,

    /// Calling-convention marker for constructors
    pub constructor_marker: String,

    /// Platform constructor method name
    pub constructor_name: String,

    /// Descriptor of the superclass zero-argument initializer
    pub initializer_descriptor: String,

    /// Platform entry-point method name
    pub entry_point_name: String,

    /// Batch worker threads (defaults to the number of CPUs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            object_class: "org/python/Object".to_string(),
            kwargs_class: "java/util/Hashtable".to_string(),
            argv_descriptor: "[Ljava/lang/String;".to_string(),
            function_marker: "org/python/Function".to_string(),
            instance_method_marker: "org/python/InstanceMethod".to_string(),
            constructor_marker: "org/python/Constructor".to_string(),
            constructor_name: "<init>".to_string(),
            initializer_descriptor: "()V".to_string(),
            entry_point_name: "main".to_string(),
            workers: None,
        }
    }
}

impl TargetConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TargetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("object_class", &self.object_class),
            ("kwargs_class", &self.kwargs_class),
            ("argv_descriptor", &self.argv_descriptor),
            ("function_marker", &self.function_marker),
            ("instance_method_marker", &self.instance_method_marker),
            ("constructor_marker", &self.constructor_marker),
            ("constructor_name", &self.constructor_name),
            ("initializer_descriptor", &self.initializer_descriptor),
            ("entry_point_name", &self.entry_point_name),
        ];
        for (key, value) in names {
            if value.is_empty() {
                return Err(ConfigError::ValidationError(format!("{key} cannot be empty")));
            }
        }

        if !self.initializer_descriptor.starts_with("()") {
            return Err(ConfigError::ValidationError(format!(
                "initializer_descriptor must take no arguments, got {}",
                self.initializer_descriptor
            )));
        }

        if self.workers == Some(0) {
            return Err(ConfigError::ValidationError(
                "workers must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Field descriptor of the boxed value class
    pub fn object_descriptor(&self) -> String {
        format!("L{};", self.object_class)
    }

    /// Number of batch workers for `jobs` callables
    pub fn worker_count(&self, jobs: usize) -> usize {
        let workers = self.workers.unwrap_or_else(num_cpus::get);
        workers.min(jobs).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TargetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.object_descriptor(), "Lorg/python/Object;");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TargetConfig::from_toml_str(
            r#"
            object_class = "com/example/PyObject"
            workers = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.object_class, "com/example/PyObject");
        assert_eq!(config.kwargs_class, "java/util/Hashtable");
        assert_eq!(config.workers, Some(2));
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = TargetConfig::from_toml_str(r#"entry_point_name = """#);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_initializer_with_arguments_rejected() {
        let result = TargetConfig::from_toml_str(r#"initializer_descriptor = "(I)V""#);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = TargetConfig::from_toml_str("workers = 0");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = TargetConfig::from_toml_str("object_class = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_worker_count_bounds() {
        let config = TargetConfig {
            workers: Some(8),
            ..TargetConfig::default()
        };
        assert_eq!(config.worker_count(3), 3);
        assert_eq!(config.worker_count(20), 8);
        assert_eq!(config.worker_count(0), 1);
    }
}
