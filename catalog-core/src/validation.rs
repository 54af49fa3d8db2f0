//! Domain input validation for sources and collection tasks.
//!
//! Kept deliberately small: the data model's own constructors
//! (`Task::new`, etc.) already clamp out-of-range values, so this module only covers
//! checks that must reject rather than silently clamp (malformed URLs, empty names).

/// Validation error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid {field}: {message}")]
    Field { field: String, message: String },

    #[error("Multiple validation errors: {0}")]
    Multiple(String),
}

/// Validation result
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates an upstream source's base URL.
pub struct UrlValidator {
    allow_https_only: bool,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self {
            allow_https_only: false,
        }
    }
}

impl UrlValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn https_only(mut self) -> Self {
        self.allow_https_only = true;
        self
    }

    pub fn validate(&self, url: &str) -> ValidationResult<()> {
        match url::Url::parse(url) {
            Ok(parsed) => {
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ValidationError::Field {
                        field: "url".to_string(),
                        message: "must use http or https".to_string(),
                    });
                }
                if self.allow_https_only && parsed.scheme() != "https" {
                    return Err(ValidationError::Field {
                        field: "url".to_string(),
                        message: "must use HTTPS".to_string(),
                    });
                }
                Ok(())
            }
            Err(_) => Err(ValidationError::Field {
                field: "url".to_string(),
                message: "must be a valid URL".to_string(),
            }),
        }
    }
}

/// Validates a `Source` before it is persisted.
pub struct SourceValidator;

impl SourceValidator {
    pub fn validate_name(name: &str) -> ValidationResult<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::Field {
                field: "name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if name.len() > 200 {
            return Err(ValidationError::Field {
                field: "name".to_string(),
                message: "must be at most 200 characters".to_string(),
            });
        }
        Ok(())
    }

    pub fn validate_base_url(base_url: &str) -> ValidationResult<()> {
        UrlValidator::new().validate(base_url)
    }

    pub fn validate_weight(weight: i32) -> ValidationResult<()> {
        if weight < 0 {
            return Err(ValidationError::Field {
                field: "weight".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Validates a `TaskConfig` before a task is enqueued (§4.E).
pub struct TaskConfigValidator;

impl TaskConfigValidator {
    /// `page_end == -1` means "no upper bound" (§9 Open Question resolution, see DESIGN.md).
    pub fn validate_page_range(page_start: i32, page_end: i32) -> ValidationResult<()> {
        if page_start < 1 {
            return Err(ValidationError::Field {
                field: "page_start".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if page_end != -1 && page_end < page_start {
            return Err(ValidationError::Field {
                field: "page_end".to_string(),
                message: "must be -1 (unbounded) or >= page_start".to_string(),
            });
        }
        Ok(())
    }

    pub fn validate_max_videos(max_videos: Option<i64>) -> ValidationResult<()> {
        if let Some(max) = max_videos {
            if max <= 0 {
                return Err(ValidationError::Field {
                    field: "max_videos".to_string(),
                    message: "must be positive when set".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Batch validator for aggregating multiple field checks into one error.
#[derive(Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate_field<F>(&mut self, _field: &str, result: ValidationResult<F>) -> &mut Self {
        if let Err(e) = result {
            self.errors.push(e);
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else if self.errors.len() == 1 {
            Err(self.errors.into_iter().next().unwrap())
        } else {
            let messages: Vec<String> = self.errors.iter().map(std::string::ToString::to_string).collect();
            Err(ValidationError::Multiple(messages.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        let validator = UrlValidator::new().https_only();
        assert!(validator.validate("https://example.com").is_ok());
        assert!(validator.validate("http://example.com").is_err());
        assert!(validator.validate("not-a-url").is_err());
    }

    #[test]
    fn test_source_validation() {
        assert!(SourceValidator::validate_name("").is_err());
        assert!(SourceValidator::validate_name("My CMS").is_ok());
        assert!(SourceValidator::validate_base_url("ftp://example.com").is_err());
        assert!(SourceValidator::validate_base_url("https://example.com/api.php").is_ok());
        assert!(SourceValidator::validate_weight(-1).is_err());
        assert!(SourceValidator::validate_weight(0).is_ok());
    }

    #[test]
    fn test_task_config_page_range() {
        assert!(TaskConfigValidator::validate_page_range(1, -1).is_ok());
        assert!(TaskConfigValidator::validate_page_range(1, 10).is_ok());
        assert!(TaskConfigValidator::validate_page_range(0, 10).is_err());
        assert!(TaskConfigValidator::validate_page_range(10, 5).is_err());
    }

    #[test]
    fn test_task_config_max_videos() {
        assert!(TaskConfigValidator::validate_max_videos(None).is_ok());
        assert!(TaskConfigValidator::validate_max_videos(Some(100)).is_ok());
        assert!(TaskConfigValidator::validate_max_videos(Some(0)).is_err());
    }

    #[test]
    fn test_batch_validation() {
        let mut validator = Validator::new();
        validator
            .validate_field("name", SourceValidator::validate_name(""))
            .validate_field("weight", SourceValidator::validate_weight(-5));
        assert!(!validator.is_valid());
        assert!(validator.into_result().is_err());
    }
}
