use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiboxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AiboxError>;

/// Login and registration failures. The `Display` text is the message shown
/// to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("username and password must not be empty")]
    EmptyCredentials,

    #[error("username cannot be used: {0}")]
    InvalidUsername(String),

    #[error("username already exists")]
    DuplicateUser,

    #[error("user not found")]
    UnknownUser,

    #[error("wrong password")]
    WrongPassword,

    #[error("could not save user store: {0}")]
    Storage(String),
}

/// Why a chat request produced no reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatFailure {
    /// The endpoint answered with a non-200 status.
    #[error("Error: {status} - {body}")]
    Remote { status: u16, body: String },

    /// The request never produced a usable response.
    #[error("Connection error: {description}")]
    Transport { description: String },
}

impl ChatFailure {
    pub fn transport(description: impl Into<String>) -> Self {
        Self::Transport {
            description: description.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("a reply is still being generated")]
    Busy,

    #[error("no request is awaiting a reply")]
    NotAwaitingReply,

    #[error(transparent)]
    Auth(#[from] AuthError),
}
