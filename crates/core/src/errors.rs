use thiserror::Error;

use crate::eligibility::Rejection;
use crate::feature::FeatureError;
use crate::ports::{PlatformError, StoreError};
use crate::promotion::PromotionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("content is not eligible for showcasing: {}", .0.as_str())]
    Ineligible(Rejection),
    #[error("guild has no stored settings")]
    GuildNotConfigured,
    #[error("showcasing is disabled for this guild")]
    ShowcasingDisabled,
    #[error("malformed gateway payload: {0}")]
    MalformedEvent(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    /// Stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<PlatformError> for ApplicationError {
    fn from(value: PlatformError) -> Self {
        Self::Integration(value.to_string())
    }
}

impl From<PromotionError> for ApplicationError {
    fn from(value: PromotionError) -> Self {
        match value {
            PromotionError::Store(error) => error.into(),
            PromotionError::Platform(error) => error.into(),
            PromotionError::MalformedEvent(detail) => DomainError::MalformedEvent(detail).into(),
        }
    }
}

impl From<FeatureError> for ApplicationError {
    fn from(value: FeatureError) -> Self {
        match value {
            FeatureError::NotConfigured => DomainError::GuildNotConfigured.into(),
            FeatureError::Disabled => DomainError::ShowcasingDisabled.into(),
            FeatureError::Ineligible(rejection) => DomainError::Ineligible(rejection).into(),
            FeatureError::Store(error) => error.into(),
            FeatureError::Platform(error) => error.into(),
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
