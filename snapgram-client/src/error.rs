use snapgram_common::{file::FileRejection, form::ValidationErrors};
use snapgram_remote::client::RemoteError;
use thiserror::Error;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

pub const RETRY_PROMPT: &str = "Something went wrong. Please try again.";

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("File rejected: {0}")]
    File(#[from] FileRejection),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ClientError {
    /// Whether the failure happened before anything was sent to the service.
    #[must_use]
    pub fn is_local(&self) -> bool {
        match self {
            ClientError::Validation(_) | ClientError::File(_) => true,
            ClientError::Remote(_) => false,
        }
    }

    /// Text to show the user. Remote failures all collapse into a retry prompt.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(errors) => errors
                .0
                .iter()
                .map(|error| format!("{}: {}", error.field, error.message))
                .collect::<Vec<_>>()
                .join("\n"),
            ClientError::File(rejection) => rejection.to_string(),
            ClientError::Remote(_) => RETRY_PROMPT.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ClientError, RETRY_PROMPT};
    use snapgram_common::{
        file::accept_files,
        form::{Field, FieldError, ValidationErrors},
    };
    use snapgram_remote::client::RemoteError;

    #[test]
    fn only_remote_failures_reach_the_service() {
        let validation = ClientError::Validation(ValidationErrors(vec![FieldError {
            field: Field::Caption,
            message: "Minimum 5 characters.".to_owned(),
        }]));
        let file = ClientError::File(accept_files(["notes.txt"]).unwrap_err());
        let remote = ClientError::Remote(RemoteError::Unauthorized);

        assert!(validation.is_local());
        assert!(file.is_local());
        assert!(!remote.is_local());

        assert_eq!(validation.user_message(), "caption: Minimum 5 characters.");
        assert_eq!(remote.user_message(), RETRY_PROMPT);
    }
}
