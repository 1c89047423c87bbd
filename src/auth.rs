use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::{
    credentials::{load_credentials, CredentialSet},
    error::{AuthError, SessionError},
};

pub const CLIENT_ID_KEY: &str = "SPOTIPY_CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "SPOTIPY_CLIENT_SECRET";
pub const REDIRECT_URI_KEY: &str = "SPOTIPY_REDIRECT_URI";

pub const PLAYLIST_READ_PRIVATE: &str = "playlist-read-private";

/// What to do when a required credential key is absent from the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingKeyPolicy {
    /// Refuse to build parameters, reporting every missing key.
    #[default]
    FailFast,
    /// Pass absent keys through as `None` and let the session factory decide.
    Defer,
}

/// Parameters handed to a [`SessionFactory`].
#[derive(Clone, PartialEq, Eq)]
pub struct AuthParams {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: String,
}

impl AuthParams {
    pub fn from_credentials(
        creds: &CredentialSet,
        policy: MissingKeyPolicy,
    ) -> Result<AuthParams, AuthError> {
        if policy == MissingKeyPolicy::FailFast {
            let missing: Vec<&'static str> = [CLIENT_ID_KEY, CLIENT_SECRET_KEY, REDIRECT_URI_KEY]
                .into_iter()
                .filter(|key| !creds.contains_key(key))
                .collect();
            if !missing.is_empty() {
                return Err(AuthError::MissingCredentials(missing));
            }
        }

        Ok(AuthParams {
            client_id: creds.lookup(CLIENT_ID_KEY).map(String::from),
            client_secret: creds.lookup(CLIENT_SECRET_KEY).map(String::from),
            redirect_uri: creds.lookup(REDIRECT_URI_KEY).map(String::from),
            scope: PLAYLIST_READ_PRIVATE.to_string(),
        })
    }

    pub fn require_client_id(&self) -> Result<&str, AuthError> {
        require(&self.client_id, CLIENT_ID_KEY)
    }

    pub fn require_client_secret(&self) -> Result<&str, AuthError> {
        require(&self.client_secret, CLIENT_SECRET_KEY)
    }

    pub fn require_redirect_uri(&self) -> Result<&str, AuthError> {
        require(&self.redirect_uri, REDIRECT_URI_KEY)
    }
}

fn require<'a>(param: &'a Option<String>, key: &'static str) -> Result<&'a str, AuthError> {
    param.as_deref().ok_or(AuthError::MissingParameter(key))
}

impl std::fmt::Debug for AuthParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthParams")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Something that turns credentials into an authenticated API session.
#[async_trait]
pub trait SessionFactory {
    type Session;

    async fn create_session(&self, params: AuthParams) -> Result<Self::Session, AuthError>;
}

/// Loads the credentials file at `path` and builds one session from it.
pub async fn init_session<F>(
    factory: &F,
    path: impl AsRef<Path>,
    policy: MissingKeyPolicy,
) -> Result<F::Session, SessionError>
where
    F: SessionFactory + Sync,
{
    let creds = load_credentials(path)?;
    let params = AuthParams::from_credentials(&creds, policy)?;
    info!(scope = %params.scope, "creating session");
    Ok(factory.create_session(params).await?)
}
