//! Classified error taxonomy for resilience decisions.
//!
//! This module provides the structured error value used across the crate:
//! every failure carries a stable code, a severity, a category, contextual
//! metadata, and a recoverability flag. Retry predicates, circuit breaking,
//! and alerting rules all key off these fields.
//!
//! # Error Handling Example
//!
//! ```rust
//! use failguard::{ClassifiedError, ErrorCategory};
//!
//! fn handle_error(err: ClassifiedError) {
//!     // Check if we should retry
//!     if err.is_retryable() {
//!         println!("Retryable error: {}", err);
//!     }
//!
//!     // Get user-friendly message
//!     println!("Tell user: {}", err.user_message());
//!
//!     // Check error category for routing
//!     match err.category() {
//!         ErrorCategory::Network | ErrorCategory::ExternalApi => {
//!             println!("Dependency issue, may clear up on its own");
//!         }
//!         ErrorCategory::Validation | ErrorCategory::UserInput => {
//!             println!("Fix the request and try again");
//!         }
//!         _ => {
//!             println!("System issue, investigate");
//!         }
//!     }
//! }
//! ```
//!
//! # Result Type
//!
//! Use [`FailguardResult<T>`] as a convenient alias for
//! `Result<T, ClassifiedError>`:
//!
//! ```rust
//! use failguard::FailguardResult;
//!
//! fn my_function() -> FailguardResult<String> {
//!     Ok("Success".to_string())
//! }
//! ```

use crate::logging::log_debug;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenient result type for failguard operations.
pub type FailguardResult<T> = std::result::Result<T, ClassifiedError>;

/// Stable error code constants.
///
/// Use these when constructing errors or matching on [`ClassifiedError::code`]
/// so downstream consumers (alert rules, dashboards) see consistent strings.
pub mod codes {
    /// Network-level failure (connectivity, DNS, resets).
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

    /// Storage/database access failure.
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";

    /// Input failed validation rules.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";

    /// Caller identity could not be established.
    pub const AUTHENTICATION_ERROR: &str = "AUTHENTICATION_ERROR";

    /// Caller identity established but lacks permission.
    pub const AUTHORIZATION_ERROR: &str = "AUTHORIZATION_ERROR";

    /// A third-party service failed.
    pub const EXTERNAL_API_ERROR: &str = "EXTERNAL_API_ERROR";

    /// Failure that could not be classified more precisely.
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

    /// All retry attempts were consumed without success.
    pub const RETRY_EXHAUSTED: &str = "RETRY_EXHAUSTED";

    /// Circuit breaker rejected the call while open.
    pub const CIRCUIT_BREAKER_OPEN: &str = "CIRCUIT_BREAKER_OPEN";

    /// Circuit breaker rejected the call: half-open trial limit reached.
    pub const CIRCUIT_BREAKER_HALF_OPEN_LIMIT: &str = "CIRCUIT_BREAKER_HALF_OPEN_LIMIT";
}

/// Severity level for logging and alerting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Expected failure (e.g., validation). Log at info/debug level.
    Low,

    /// Action failed but system is stable. Worth monitoring.
    Medium,

    /// Action failed and user flow is degraded. Investigate.
    High,

    /// System is unusable or data integrity is at risk. Alert immediately.
    Critical,
}

/// High-level categorization of errors for routing and policy decisions.
///
/// The retry predicate and circuit breaker both key off this, so
/// constructors must map failures to the right category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connectivity-level failures. Usually transient.
    Network,

    /// Storage access failures.
    Database,

    /// Caller identity could not be established.
    Authentication,

    /// Caller lacks permission for the operation.
    Authorization,

    /// Input failed validation rules.
    Validation,

    /// A third-party dependency failed.
    ExternalApi,

    /// Internal failures (bugs, invariant violations).
    System,

    /// Malformed or unusable user input.
    UserInput,
}

impl ErrorCategory {
    /// Stable code associated with this category.
    pub fn default_code(self) -> &'static str {
        match self {
            Self::Network => codes::NETWORK_ERROR,
            Self::Database => codes::DATABASE_ERROR,
            Self::Authentication => codes::AUTHENTICATION_ERROR,
            Self::Authorization => codes::AUTHORIZATION_ERROR,
            Self::Validation => codes::VALIDATION_ERROR,
            Self::ExternalApi => codes::EXTERNAL_API_ERROR,
            Self::System | Self::UserInput => codes::UNKNOWN_ERROR,
        }
    }

    /// Message safe to show to end users for this category.
    pub fn default_user_message(self) -> &'static str {
        match self {
            Self::Network => {
                "Connection problem. Please check your internet connection and try again"
            }
            Self::Database => "We're having trouble accessing data right now. Please try again",
            Self::Authentication => "Your session has expired. Please sign in again",
            Self::Authorization => "You do not have permission to perform this action",
            Self::Validation => "Some of the provided information is invalid. Please review it",
            Self::ExternalApi => "An external service is unavailable. Please try again later",
            Self::UserInput => "Please check your input and try again",
            Self::System => "An unexpected error occurred. Please try again",
        }
    }

    /// Whether failures in this category are recoverable by default.
    ///
    /// Authorization failures are the one kind that retrying or re-submitting
    /// can never fix; unknown system failures default to not recoverable.
    pub fn default_recoverable(self) -> bool {
        !matches!(self, Self::Authorization | Self::System)
    }
}

/// Contextual metadata attached to a classified error.
///
/// The `metadata` map is a typed open map: callers may attach arbitrary
/// JSON-like values without the taxonomy knowing their shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Component where the failure originated (e.g. "party-service").
    pub component: Option<String>,

    /// Action being performed when the failure occurred.
    pub action: Option<String>,

    /// Identifier of the affected user, if known.
    pub user_id: Option<String>,

    /// Identifier of the affected session, if known.
    pub session_id: Option<String>,

    /// Caller-supplied key/value details.
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// When the failure was observed. Set at construction, never mutated.
    pub timestamp: DateTime<Utc>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            component: None,
            action: None,
            user_id: None,
            session_id: None,
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }
}

impl ErrorContext {
    /// Create an empty context stamped with the current time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the originating component.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set the action being performed.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the affected user.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the affected session.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach a metadata value. Values that fail to serialize are skipped.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
        self
    }
}

/// A structured failure value with stable code, severity, category, and
/// context.
///
/// Construction is pure: no logging, no I/O. `code` and `category` are fixed
/// for the life of the value (there are no setters for them).
///
/// # Creating Errors
///
/// Use the specialized constructors where the failure kind is known; their
/// defaults are what retry and alerting rules key off:
///
/// | Constructor | category | severity | recoverable |
/// |-------------|----------|----------|-------------|
/// | [`network`](Self::network) | Network | Medium | yes |
/// | [`database`](Self::database) | Database | High | yes |
/// | [`validation`](Self::validation) | Validation | Low | yes |
/// | [`authentication`](Self::authentication) | Authentication | High | yes |
/// | [`authorization`](Self::authorization) | Authorization | High | no |
/// | [`external_api`](Self::external_api) | ExternalApi | Medium | yes |
///
/// For failures of unknown shape, [`from_failure`](Self::from_failure)
/// classifies heuristically from the message text.
#[derive(Error, Debug)]
#[error("{code}: {message}")]
pub struct ClassifiedError {
    message: String,
    code: String,
    severity: ErrorSeverity,
    category: ErrorCategory,
    context: ErrorContext,
    recoverable: bool,
    user_message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ClassifiedError {
    /// Construct a classified error from its parts.
    ///
    /// `recoverable` and `user_message` default from the category; override
    /// them with [`recoverable_flag`](Self::recoverable_flag) and
    /// [`with_user_message`](Self::with_user_message).
    pub fn new(
        message: impl Into<String>,
        code: impl Into<String>,
        severity: ErrorSeverity,
        category: ErrorCategory,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            severity,
            category,
            context: ErrorContext::new(),
            recoverable: category.default_recoverable(),
            user_message: category.default_user_message().to_string(),
            source: None,
        }
    }

    /// Human diagnostic text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Stable identifier, e.g. `NETWORK_ERROR`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Severity for logging and alerting decisions.
    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    /// Category for routing and policy decisions.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Contextual metadata attached at the failure site.
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Whether the caller may reasonably retry or re-submit.
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Message safe to show to end users.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Whether this error is transient enough for the retry executor.
    ///
    /// Network and external-API failures retry by default; anything else
    /// retries only when explicitly marked recoverable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::Network | ErrorCategory::ExternalApi
        ) || self.recoverable
    }

    /// Attach context, replacing the default empty context.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    /// Override the recoverability flag.
    pub fn recoverable_flag(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Override the user-facing message.
    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = user_message.into();
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // =========================================================================
    // Specialized constructors
    // =========================================================================
    //
    // These fix the category/severity/recoverable combinations that the retry
    // predicate and alert rules depend on. Do not change the defaults without
    // auditing those call sites.

    /// Network-level failure: Network / Medium / recoverable.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(
            message,
            codes::NETWORK_ERROR,
            ErrorSeverity::Medium,
            ErrorCategory::Network,
        )
    }

    /// Storage access failure: Database / High / recoverable.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(
            message,
            codes::DATABASE_ERROR,
            ErrorSeverity::High,
            ErrorCategory::Database,
        )
    }

    /// Validation failure: Validation / Low / recoverable.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            message,
            codes::VALIDATION_ERROR,
            ErrorSeverity::Low,
            ErrorCategory::Validation,
        )
    }

    /// Authentication failure: Authentication / High / recoverable.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(
            message,
            codes::AUTHENTICATION_ERROR,
            ErrorSeverity::High,
            ErrorCategory::Authentication,
        )
    }

    /// Authorization failure: Authorization / High / not recoverable.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(
            message,
            codes::AUTHORIZATION_ERROR,
            ErrorSeverity::High,
            ErrorCategory::Authorization,
        )
    }

    /// Third-party dependency failure: ExternalApi / Medium / recoverable.
    pub fn external_api(message: impl Into<String>) -> Self {
        Self::new(
            message,
            codes::EXTERNAL_API_ERROR,
            ErrorSeverity::Medium,
            ErrorCategory::ExternalApi,
        )
    }

    /// Classify a generic failure.
    ///
    /// Idempotent: an error that is already a [`ClassifiedError`] is returned
    /// unchanged (the supplied context is ignored in that case). Anything
    /// else is classified from its message text via [`classify_message`] and
    /// wrapped, preserving the original as source.
    pub fn from_failure(err: anyhow::Error, context: ErrorContext) -> Self {
        let err = match err.downcast::<ClassifiedError>() {
            Ok(classified) => return classified,
            Err(err) => err,
        };

        let message = err.to_string();
        let (category, severity) = classify_message(&message);
        log_debug!(
            code = category.default_code(),
            category = ?category,
            "Classified generic failure from message text"
        );

        Self::new(&message, category.default_code(), severity, category)
            .with_context(context)
            .recoverable_flag(category.default_recoverable())
            .with_source(BoxedCause(err.into()))
    }
}

impl From<anyhow::Error> for ClassifiedError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_failure(err, ErrorContext::new())
    }
}

/// Adapter so an `anyhow::Error` chain can sit in the `source` slot.
#[derive(Debug)]
struct BoxedCause(Box<dyn std::error::Error + Send + Sync>);

impl std::fmt::Display for BoxedCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for BoxedCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Map free-text failure messages to a category and severity.
///
/// Substring matching is a known fragile heuristic kept for compatibility
/// with callers that raise bare messages. It lives in this one pure function
/// so call sites can migrate to explicit constructors without touching the
/// rest of the taxonomy. Matching is case-insensitive; a validation message
/// containing the word "network" will still misclassify.
pub fn classify_message(message: &str) -> (ErrorCategory, ErrorSeverity) {
    let lower = message.to_lowercase();

    if lower.contains("network") || lower.contains("fetch") {
        (ErrorCategory::Network, ErrorSeverity::Medium)
    } else if lower.contains("unauthorized") || lower.contains("auth") {
        (ErrorCategory::Authentication, ErrorSeverity::High)
    } else if lower.contains("forbidden") {
        (ErrorCategory::Authorization, ErrorSeverity::High)
    } else {
        (ErrorCategory::System, ErrorSeverity::Medium)
    }
}
