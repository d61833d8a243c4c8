use thiserror::Error;

/// A collaborator could not be reached or rejected the request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("tabular store unavailable: {0}")]
    Store(String),
    #[error("document service unavailable: {0}")]
    Documents(String),
    #[error("channel service unavailable: {0}")]
    Channels(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    BackendUnavailable(#[from] BackendError),
    #[error("canonicalized answer from `{raw}` is empty")]
    ValidationFailed { raw: String },
    #[error("puzzle name must not be empty")]
    EmptyName,
    #[error("bulk import abandoned: channel creation for `{puzzle}` failed: {source}")]
    PartialImportFailure {
        puzzle: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The command could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The puzzle sheet or chat service is unavailable. Please retry shortly."
            }
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::ServiceUnavailable { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl DirectoryError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<DirectoryError> for InterfaceError {
    fn from(value: DirectoryError) -> Self {
        let message = value.to_string();
        match value {
            DirectoryError::ValidationFailed { .. } | DirectoryError::EmptyName => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            DirectoryError::BackendUnavailable(_) | DirectoryError::PartialImportFailure { .. } => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
