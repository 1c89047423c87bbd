pub mod auth;
pub mod credentials;
pub mod error;
pub mod spotify;

pub use auth::{init_session, AuthParams, MissingKeyPolicy, SessionFactory};
pub use credentials::{
    load_credentials, load_default_credentials, CredentialEntry, CredentialSet,
    DEFAULT_CREDENTIALS_PATH,
};
pub use error::{AuthError, CredentialError, SessionError};
pub use spotify::{SpotifyConfig, SpotifySessionFactory};
