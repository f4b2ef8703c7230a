//! Validation traits and types for ferry core types.
//!
//! Policies and filters report every problem they find through
//! [`ValidationErrors`]; callers that only care about the first failure
//! convert the collection into [`Error::BadRequest`] with `?`.

use std::fmt;

use crate::error::Error;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field or path that failed validation (e.g. `filters[1].value`).
    pub field: String,
    /// A human-readable description of the validation failure.
    pub message: String,
    /// The kind of validation that failed.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Creates a new validation error.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferry_core::validation::{ValidationError, ValidationErrorKind};
    ///
    /// let error = ValidationError::new(
    ///     "trigger.trigger_settings.cron",
    ///     "the cron string cannot be empty",
    ///     ValidationErrorKind::Required,
    /// );
    /// assert_eq!(error.field, "trigger.trigger_settings.cron");
    /// ```
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        kind: ValidationErrorKind,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind,
        }
    }

    /// Creates a validation error for a required field that is missing.
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("'{field}' is required"),
            field,
            kind: ValidationErrorKind::Required,
        }
    }

    /// Creates a validation error for an invalid format.
    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Format)
    }

    /// Creates a validation error for a value out of range.
    pub fn range(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Range)
    }

    /// Creates a validation error for a constraint violation.
    pub fn constraint(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Constraint)
    }

    /// Returns the same error with `prefix` prepended to its field path.
    #[must_use]
    pub fn nested(mut self, prefix: &str) -> Self {
        self.field = if self.field.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}.{}", self.field)
        };
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// The category of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required field was not provided.
    Required,
    /// The value format is invalid.
    Format,
    /// The value is outside the allowed range.
    Range,
    /// A business constraint was violated.
    Constraint,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Format => write!(f, "format"),
            Self::Range => write!(f, "range"),
            Self::Constraint => write!(f, "constraint"),
        }
    }
}

/// A collection of validation errors, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty validation errors collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validation error to the collection.
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Returns true if there are no validation errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of validation errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns an iterator over the validation errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Returns the first error, if any.
    #[must_use]
    pub fn first(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    /// Merges another collection into this one, prefixing its field paths.
    pub fn merge_nested(&mut self, prefix: &str, other: Self) {
        self.errors
            .extend(other.errors.into_iter().map(|e| e.nested(prefix)));
    }

    /// Converts to a `Result`: `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collection itself when it holds at least one error.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = ValidationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no validation errors"),
            [only] => write!(f, "{only}"),
            errors => {
                write!(f, "{} (and {} more)", errors[0], errors.len() - 1)
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        let reason = errors
            .first()
            .map_or_else(|| "validation failed".to_string(), |e| e.message.clone());
        Self::BadRequest { reason }
    }
}

/// Trait for types that can be validated.
///
/// # Examples
///
/// ```
/// use ferry_core::validation::{Validate, ValidationError, ValidationErrors};
///
/// struct Namespace(String);
///
/// impl Validate for Namespace {
///     fn validate(&self) -> Result<(), ValidationErrors> {
///         let mut errors = ValidationErrors::new();
///         if self.0.is_empty() {
///             errors.add(ValidationError::required("namespace"));
///         }
///         errors.into_result()
///     }
/// }
///
/// assert!(!Namespace(String::new()).is_valid());
/// ```
pub trait Validate {
    /// Validates this instance and returns every error found.
    ///
    /// # Errors
    ///
    /// Returns `ValidationErrors` containing all validation failures found.
    fn validate(&self) -> Result<(), ValidationErrors>;

    /// Returns true if this instance is valid.
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
