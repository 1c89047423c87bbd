use std::path::PathBuf;

use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng};
use rspotify::{prelude::*, AuthCodeSpotify, Config, Credentials, OAuth};
use tracing::{debug, info, warn};

use crate::{
    auth::{AuthParams, SessionFactory},
    error::{callback_error, AuthError},
};

mod callback;

use callback::CallbackCaptureServer;

pub const DEFAULT_TOKEN_CACHE_PATH: &str = ".spotify_token_cache.json";

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub token_cache_path: PathBuf,
    /// Open the authorization prompt in a browser instead of only printing it.
    pub open_browser: bool,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        SpotifyConfig {
            token_cache_path: PathBuf::from(DEFAULT_TOKEN_CACHE_PATH),
            open_browser: true,
        }
    }
}

/// Session factory backed by `rspotify`'s authorization code client.
#[derive(Debug, Clone, Default)]
pub struct SpotifySessionFactory {
    config: SpotifyConfig,
}

impl SpotifySessionFactory {
    pub fn new(config: SpotifyConfig) -> SpotifySessionFactory {
        SpotifySessionFactory { config }
    }

    fn client(&self, params: &AuthParams) -> Result<AuthCodeSpotify, AuthError> {
        let creds = Credentials::new(
            params.require_client_id()?,
            params.require_client_secret()?,
        );
        let oauth = OAuth {
            redirect_uri: params.require_redirect_uri()?.to_string(),
            scopes: params.scope.split_whitespace().map(String::from).collect(),
            state: generate_state(),
            ..Default::default()
        };
        let config = Config {
            token_cached: true,
            cache_path: self.config.token_cache_path.clone(),
            ..Default::default()
        };

        Ok(AuthCodeSpotify::with_config(creds, oauth, config))
    }

    /// Installs a token from the cache, refreshing it if it has expired.
    /// Returns false when the full authorization flow is still needed.
    async fn restore_cached_token(&self, spotify: &AuthCodeSpotify) -> Result<bool, AuthError> {
        if !self.config.token_cache_path.exists() {
            debug!(path = %self.config.token_cache_path.display(), "no token cache yet");
            return Ok(false);
        }

        let token = match spotify.read_token_cache(true).await {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable token cache");
                return Ok(false);
            }
        };
        let expired = token.is_expired();

        *spotify
            .get_token()
            .lock()
            .await
            .map_err(|_| AuthError::TokenCache("token lock is unavailable".to_string()))? =
            Some(token);

        if !expired {
            info!("using cached token");
            return Ok(true);
        }

        match spotify.refresh_token().await {
            Ok(()) => {
                info!("refreshed cached token");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "unable to refresh cached token");
                Ok(false)
            }
        }
    }

    async fn authorize(&self, spotify: &AuthCodeSpotify) -> Result<(), AuthError> {
        let oauth = spotify.get_oauth();
        let server = CallbackCaptureServer::bind(&oauth.redirect_uri, &oauth.state)?;
        let authorize_url = spotify.get_authorize_url(false)?;
        let open_browser = self.config.open_browser;

        let code =
            tokio::task::spawn_blocking(move || server.capture(&authorize_url, open_browser))
                .await
                .map_err(|e| callback_error(format!("Auth code capture did not finish: {e}")))??;

        spotify.request_token(&code).await?;
        info!("obtained new access token");
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for SpotifySessionFactory {
    type Session = AuthCodeSpotify;

    async fn create_session(&self, params: AuthParams) -> Result<AuthCodeSpotify, AuthError> {
        let spotify = self.client(&params)?;

        if !self.restore_cached_token(&spotify).await? {
            self.authorize(&spotify).await?;
        }

        Ok(spotify)
    }
}

fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MissingKeyPolicy, CLIENT_SECRET_KEY};
    use crate::credentials::CredentialSet;

    fn params(text: &str, policy: MissingKeyPolicy) -> AuthParams {
        AuthParams::from_credentials(&CredentialSet::parse(text), policy).unwrap()
    }

    const FULL: &str = "SPOTIPY_CLIENT_ID=my-id\nSPOTIPY_CLIENT_SECRET=my-secret\nSPOTIPY_REDIRECT_URI=http://127.0.0.1:8888/callback\n";

    #[test]
    fn client_carries_params_and_cache_path() {
        let factory = SpotifySessionFactory::new(SpotifyConfig {
            token_cache_path: PathBuf::from("/tmp/plauth-test-cache.json"),
            open_browser: false,
        });
        let spotify = factory
            .client(&params(FULL, MissingKeyPolicy::FailFast))
            .unwrap();

        let oauth = spotify.get_oauth();
        assert_eq!(oauth.redirect_uri, "http://127.0.0.1:8888/callback");
        assert!(oauth.scopes.contains("playlist-read-private"));
        assert_eq!(oauth.state.len(), 64);
        assert!(spotify.get_config().token_cached);
        assert_eq!(
            spotify.get_config().cache_path,
            PathBuf::from("/tmp/plauth-test-cache.json")
        );
    }

    #[test]
    fn authorize_url_includes_client_and_state() {
        let factory = SpotifySessionFactory::default();
        let spotify = factory
            .client(&params(FULL, MissingKeyPolicy::FailFast))
            .unwrap();
        let url = spotify.get_authorize_url(false).unwrap();

        assert!(url.contains("client_id=my-id"));
        assert!(url.contains(&format!("state={}", spotify.get_oauth().state)));
        assert!(url.contains("playlist-read-private"));
    }

    #[test]
    fn states_are_random() {
        assert_ne!(generate_state(), generate_state());
        assert!(generate_state().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn missing_token_cache_needs_full_authorization() {
        let dir = tempfile::tempdir().unwrap();
        let factory = SpotifySessionFactory::new(SpotifyConfig {
            token_cache_path: dir.path().join("token.json"),
            open_browser: false,
        });
        let spotify = factory
            .client(&params(FULL, MissingKeyPolicy::FailFast))
            .unwrap();

        assert!(!factory.restore_cached_token(&spotify).await.unwrap());
        assert!(spotify.get_token().lock().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deferred_missing_secret_fails_in_factory() {
        let factory = SpotifySessionFactory::default();
        let params = params(
            "SPOTIPY_CLIENT_ID=my-id\nSPOTIPY_REDIRECT_URI=http://127.0.0.1:8888/callback\n",
            MissingKeyPolicy::Defer,
        );

        let err = factory.create_session(params).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingParameter(CLIENT_SECRET_KEY)));
    }
}
