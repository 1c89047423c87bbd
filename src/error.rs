use std::{io, path::PathBuf, str::Utf8Error};

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("Unable to read credentials file {}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Credentials file {} is not valid UTF-8", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: Utf8Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Missing required credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
    #[error("Authentication parameter {0} was not provided")]
    MissingParameter(&'static str),
    #[error("Invalid redirect uri {uri}: {reason}")]
    InvalidRedirectUri { uri: String, reason: String },
    #[error("{0}")]
    Callback(String),
    #[error("Token cache error: {0}")]
    TokenCache(String),
    #[error("Error from spotify client")]
    Client(#[from] rspotify::ClientError),
    #[error("I/O error during authentication")]
    Io(#[from] io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub(crate) fn callback_error(msg: impl Into<String>) -> AuthError {
    AuthError::Callback(msg.into())
}
