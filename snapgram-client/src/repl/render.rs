use crate::repl::CommandError;
use serde::Serialize;
use snapgram_client::error::ClientError;
use snapgram_common::model::{
    Id,
    post::{Post, SavedPost},
    user::{User, UserMarker},
};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct FieldMessage {
    pub field: String,
    pub message: String,
}

/// One line of terminal output, printed as JSON.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Post {
        post: Post,
    },
    Posts {
        posts: Vec<Post>,
    },
    Page {
        /// 1-based number of the page within the feed.
        page: usize,
        posts: Vec<Post>,
        has_next_page: bool,
    },
    SearchResults {
        term: String,
        posts: Vec<Post>,
    },
    User {
        user: Option<User>,
    },
    Session {
        user_id: Id<UserMarker>,
    },
    Saved {
        saved: SavedPost,
    },
    Message {
        message: String,
    },
    FieldErrors {
        errors: Vec<FieldMessage>,
    },
    Error {
        message: String,
    },
}

impl Output {
    pub fn message(message: impl Into<String>) -> Self {
        Output::Message {
            message: message.into(),
        }
    }

    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&CommandError> for Output {
    fn from(value: &CommandError) -> Self {
        match value {
            CommandError::Client(ClientError::Validation(errors)) => Output::FieldErrors {
                errors: errors
                    .0
                    .iter()
                    .map(|error| FieldMessage {
                        field: error.field.to_string(),
                        message: error.message.clone(),
                    })
                    .collect(),
            },
            CommandError::Client(err) => Output::Error {
                message: err.user_message(),
            },
            other => Output::Error {
                message: other.to_string(),
            },
        }
    }
}
