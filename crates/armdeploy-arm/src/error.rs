//! Error types for template deployments

use crate::protocol::ErrorDetail;
use armdeploy_config::MissingVariables;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Configuration missing or invalid
    E001InvalidConfig,
    /// E002: Local file unreadable or malformed
    E002LocalFile,
    /// E003: Token exchange failed
    E003Authentication,
    /// E004: Resource group operation rejected
    E004Provisioning,
    /// E005: Deployment rejected or failed
    E005Deployment,
    /// E006: Template failed dry-run validation
    E006ValidationFailed,
    /// E007: Transport-level failure talking to a remote endpoint
    E007Transport,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidConfig => "E001",
            Self::E002LocalFile => "E002",
            Self::E003Authentication => "E003",
            Self::E004Provisioning => "E004",
            Self::E005Deployment => "E005",
            Self::E006ValidationFailed => "E006",
            Self::E007Transport => "E007",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while deploying a template
#[derive(Debug, Error)]
pub enum DeployError {
    /// Missing or invalid local configuration; no remote call was made
    #[error("[{code}] {message}")]
    Config { code: ErrorCode, message: String },

    /// A local file could not be read or parsed
    #[error("[{code}] Failed to load '{path}': {reason}")]
    Io {
        code: ErrorCode,
        path: String,
        reason: String,
    },

    /// Client-credentials token exchange failed
    #[error("[{code}] Authentication failed for tenant '{tenant}': {reason}")]
    Auth {
        code: ErrorCode,
        tenant: String,
        reason: String,
    },

    /// Resource group create/delete was rejected
    #[error("[{code}] Resource group '{group}' {operation} failed: {reason}")]
    Provisioning {
        code: ErrorCode,
        group: String,
        operation: &'static str,
        reason: String,
    },

    /// Deployment was rejected or ended in a failed state. `payload` is the
    /// remote error exactly as received.
    #[error("[{code}] Deployment '{deployment}' failed: {payload}")]
    Deployment {
        code: ErrorCode,
        deployment: String,
        payload: String,
    },

    /// Dry-run validation reported a structured error
    #[error("[{code}] Deployment '{deployment}' failed validation: {}", .detail.message.as_deref().unwrap_or("-"))]
    ValidationFailed {
        code: ErrorCode,
        deployment: String,
        detail: ErrorDetail,
    },

    /// The request never produced an HTTP response
    #[error("[{code}] Request to {url} failed: {reason}")]
    Http {
        code: ErrorCode,
        url: String,
        reason: String,
    },
}

impl DeployError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::E001InvalidConfig,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Io {
            code: ErrorCode::E002LocalFile,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn auth(tenant: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            code: ErrorCode::E003Authentication,
            tenant: tenant.into(),
            reason: reason.into(),
        }
    }

    pub fn provisioning(
        group: impl Into<String>,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Provisioning {
            code: ErrorCode::E004Provisioning,
            group: group.into(),
            operation,
            reason: reason.into(),
        }
    }

    pub fn deployment(deployment: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Deployment {
            code: ErrorCode::E005Deployment,
            deployment: deployment.into(),
            payload: payload.into(),
        }
    }

    pub fn validation_failed(deployment: impl Into<String>, detail: ErrorDetail) -> Self {
        Self::ValidationFailed {
            code: ErrorCode::E006ValidationFailed,
            deployment: deployment.into(),
            detail,
        }
    }

    pub fn http(url: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::Http {
            code: ErrorCode::E007Transport,
            url: url.into(),
            reason: format!("{:#}", error),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config { code, .. }
            | Self::Io { code, .. }
            | Self::Auth { code, .. }
            | Self::Provisioning { code, .. }
            | Self::Deployment { code, .. }
            | Self::ValidationFailed { code, .. }
            | Self::Http { code, .. } => *code,
        }
    }
}

impl From<MissingVariables> for DeployError {
    fn from(err: MissingVariables) -> Self {
        DeployError::config(err.to_string())
    }
}

/// Result type alias for DeployError
pub type Result<T> = std::result::Result<T, DeployError>;
