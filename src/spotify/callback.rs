use std::net::SocketAddr;

use serde::Deserialize;
use tiny_http::{Header, Response, Server};
use tracing::{info, warn};
use url::Url;

use crate::error::{callback_error, AuthError};

const CLOSE_WINDOW_HTML: &str = "<html><body><script>window.close();</script></body></html>";

#[derive(Deserialize, Debug, Default)]
pub(crate) struct AuthCodeCallback {
    code: Option<String>,
    error: Option<String>,
    state: Option<String>,
}

impl AuthCodeCallback {
    fn parse_for_code(self, state: &str) -> Result<String, AuthError> {
        if let Some(error) = self.error {
            return Err(callback_error(format!(
                "Authorization callback returned an error: {error}"
            )));
        }
        if self.state.as_deref() != Some(state) {
            return Err(callback_error(
                "State sent to Spotify does not match the one returned",
            ));
        }
        self.code
            .ok_or_else(|| callback_error("Auth code not present in callback"))
    }
}

/// Parses a redirect uri the capture server can listen on.
pub(crate) fn parse_redirect_uri(uri: &str) -> Result<Url, AuthError> {
    let invalid = |reason: &str| AuthError::InvalidRedirectUri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid("only http redirect uris can be captured locally"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

/// One-shot http listener on the redirect uri that waits for the
/// authorization code callback.
pub(crate) struct CallbackCaptureServer {
    server: Server,
    redirect: Url,
    state: String,
}

impl CallbackCaptureServer {
    pub(crate) fn bind(
        redirect_uri: &str,
        state: &str,
    ) -> Result<CallbackCaptureServer, AuthError> {
        let redirect = parse_redirect_uri(redirect_uri)?;
        let host = redirect.host_str().unwrap_or("127.0.0.1");
        let port = redirect.port_or_known_default().unwrap_or(80);

        let server = Server::http(format!("{host}:{port}"))
            .map_err(|e| callback_error(format!("Unable to start http server: {e}")))?;

        Ok(CallbackCaptureServer {
            server,
            redirect,
            state: state.to_string(),
        })
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Sends the user to `authorize_url` and blocks until the callback
    /// arrives, returning the authorization code.
    pub(crate) fn capture(
        self,
        authorize_url: &str,
        open_browser: bool,
    ) -> Result<String, AuthError> {
        if open_browser && webbrowser::open(authorize_url).is_ok() {
            info!("opened authorization prompt in browser");
        } else {
            if open_browser {
                warn!("unable to open browser");
            }
            println!("Open this url to authorize the application:\n{authorize_url}");
        }

        info!(addr = ?self.local_addr(), "waiting for authorization callback");
        let request = self.server.recv()?;
        let url = request.url().to_string();

        let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
        if path != self.redirect.path() {
            request.respond(Response::from_string("Not found").with_status_code(404))?;
            return Err(callback_error(format!(
                "Auth code callback url was malformed: {path}"
            )));
        }

        let callback = serde_urlencoded::from_str::<AuthCodeCallback>(query)
            .map_err(|e| callback_error(format!("Error while parsing auth code callback: {e}")))?;
        let code = callback.parse_for_code(&self.state);

        let response = Response::from_string(CLOSE_WINDOW_HTML);
        let response = match Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]) {
            Ok(header) => response.with_header(header),
            Err(()) => response,
        };
        request.respond(response)?;

        code
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::TcpStream,
        thread,
    };

    use super::*;

    fn callback(code: Option<&str>, error: Option<&str>, state: Option<&str>) -> AuthCodeCallback {
        AuthCodeCallback {
            code: code.map(String::from),
            error: error.map(String::from),
            state: state.map(String::from),
        }
    }

    #[test]
    fn returns_code_when_state_matches() {
        let code = callback(Some("abc"), None, Some("xyz")).parse_for_code("xyz");
        assert_eq!(code.unwrap(), "abc");
    }

    #[test]
    fn rejects_error_callback() {
        let err = callback(None, Some("access_denied"), Some("xyz"))
            .parse_for_code("xyz")
            .unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn rejects_state_mismatch() {
        assert!(callback(Some("abc"), None, Some("other"))
            .parse_for_code("xyz")
            .is_err());
        assert!(callback(Some("abc"), None, None).parse_for_code("xyz").is_err());
    }

    #[test]
    fn rejects_missing_code() {
        assert!(callback(None, None, Some("xyz")).parse_for_code("xyz").is_err());
    }

    #[test]
    fn decodes_callback_query() {
        let cb: AuthCodeCallback =
            serde_urlencoded::from_str("code=a%2Bb&state=xyz").unwrap();
        assert_eq!(cb.parse_for_code("xyz").unwrap(), "a+b");
    }

    #[test]
    fn redirect_uri_must_be_http() {
        assert!(parse_redirect_uri("http://127.0.0.1:8888/callback").is_ok());
        assert!(matches!(
            parse_redirect_uri("https://example.com/callback"),
            Err(AuthError::InvalidRedirectUri { .. })
        ));
        assert!(matches!(
            parse_redirect_uri("not a url"),
            Err(AuthError::InvalidRedirectUri { .. })
        ));
    }

    #[test]
    fn captures_code_from_local_request() {
        let server = CallbackCaptureServer::bind("http://127.0.0.1:0/callback", "xyz").unwrap();
        let addr = server.local_addr().unwrap();

        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .write_all(
                    b"GET /callback?code=abc&state=xyz HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
                )
                .unwrap();
            let mut body = String::new();
            stream.read_to_string(&mut body).unwrap();
            body
        });

        let code = server.capture("http://127.0.0.1/authorize", false).unwrap();
        assert_eq!(code, "abc");
        assert!(client.join().unwrap().contains("window.close()"));
    }

    #[test]
    fn rejects_request_on_wrong_path() {
        let server = CallbackCaptureServer::bind("http://127.0.0.1:0/callback", "xyz").unwrap();
        let addr = server.local_addr().unwrap();

        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .write_all(
                    b"GET /favicon.ico HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
                )
                .unwrap();
            let mut body = String::new();
            stream.read_to_string(&mut body).unwrap();
        });

        assert!(server.capture("http://127.0.0.1/authorize", false).is_err());
        client.join().unwrap();
    }
}
