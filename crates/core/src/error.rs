use std::fmt;

use snafu::Snafu;

use crate::classify::ClassifiedError;

/// Reason a session operation was refused before reaching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precondition {
    NoActiveService,
    EmptyMessage,
    RequestPending,
    /// The session was reset or re-selected while an exchange was in flight.
    SessionChanged,
}

impl Precondition {
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NoActiveService => "Please choose a service before sending a message.",
            Self::EmptyMessage => "Please type a message first.",
            Self::RequestPending => "Please wait for the current reply before sending another message.",
            Self::SessionChanged => "The conversation was restarted before the reply arrived.",
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoActiveService => "no active service",
            Self::EmptyMessage => "message is empty",
            Self::RequestPending => "a request is already pending",
            Self::SessionChanged => "session changed while the request was in flight",
        };
        formatter.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("'{email}' is not a valid email address"))]
    InvalidEmail { stage: &'static str, email: String },
    #[snafu(display("service '{service_id}' is not registered"))]
    InvalidService {
        stage: &'static str,
        service_id: String,
    },
    #[snafu(display("precondition failed on `{stage}`: {precondition}"))]
    PreconditionFailed {
        stage: &'static str,
        precondition: Precondition,
    },
    #[snafu(display("exchange failed with {}: {error}", error.category()))]
    Exchange {
        stage: &'static str,
        error: ClassifiedError,
    },
}

impl SessionError {
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Exchange { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Stable message suitable for showing to the user.
    pub fn user_message(&self) -> &str {
        match self {
            Self::InvalidEmail { .. } => "Please enter a valid email address to continue.",
            Self::InvalidService { .. } => "Please choose one of the available services.",
            Self::PreconditionFailed { precondition, .. } => precondition.user_message(),
            Self::Exchange { error, .. } => error.message(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RegistryError {
    #[snafu(display("service '{service_id}' is registered more than once"))]
    DuplicateService {
        stage: &'static str,
        service_id: String,
    },
    #[snafu(display("service id must not be blank"))]
    BlankServiceId { stage: &'static str },
}

pub type RegistryResult<T> = Result<T, RegistryError>;
