use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::url::Url;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope};

use super::credential::Credential;
use super::refresh::credential_from_token;
use super::secrets::ClientSecrets;
use super::InteractiveAuthorizer;
use crate::config::UPLOAD_SCOPE;

const SUCCESS_PAGE: &str = "The authentication flow has completed. You may close this window.";
const FAILURE_PAGE: &str = "The authentication flow failed. Check the terminal for details.";

/// Installed-app authorization: a browser consent page redirecting back to
/// a one-shot listener on the loopback interface.
pub struct LoopbackFlow {
    port: u16,
    scopes: Vec<String>,
    open_browser: bool,
}

impl LoopbackFlow {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            scopes: vec![UPLOAD_SCOPE.to_string()],
            open_browser: true,
        }
    }

    /// Only print the consent URL instead of also launching a browser.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }
}

impl InteractiveAuthorizer for LoopbackFlow {
    fn acquire_interactively(&self, secrets: &ClientSecrets) -> Result<Credential> {
        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .context("cannot bind the loopback redirect listener")?;
        let port = listener.local_addr()?.port();

        let client = secrets
            .oauth_client()?
            .set_redirect_uri(RedirectUrl::new(format!("http://127.0.0.1:{port}/"))?);
        let consent = Consent::new(&client, &self.scopes);

        eprintln!("Please visit this URL to authorize this application:\n{}", consent.url);
        if self.open_browser {
            try_open_browser(consent.url.as_str());
        }

        let (mut stream, _) = listener
            .accept()
            .context("failed waiting for the authorization redirect")?;
        let outcome = read_redirect(&stream)
            .and_then(|params| extract_code(params, consent.state.secret()));
        let page = if outcome.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
        respond(&mut stream, page);
        let code = outcome?;

        info!("authorization code received, exchanging for a token");
        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(consent.verifier)
            .request(http_client)
            .with_context(|| format!("code exchange at {} failed", secrets.token_uri))?;
        Ok(credential_from_token(&token, secrets, &self.scopes, None))
    }
}

/// One consent attempt: the URL to visit plus the secrets needed to
/// validate the redirect and redeem its code.
struct Consent {
    url: Url,
    state: CsrfToken,
    verifier: PkceCodeVerifier,
}

impl Consent {
    fn new(client: &BasicClient, scopes: &[String]) -> Self {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(challenge)
            // Google only returns a refresh token for offline access with forced consent
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Self {
            url,
            state,
            verifier,
        }
    }
}

/// Read the request line of the redirect and return its query parameters.
fn read_redirect(stream: &TcpStream) -> Result<Vec<(String, String)>> {
    let mut line = String::new();
    BufReader::new(stream)
        .read_line(&mut line)
        .context("cannot read the authorization redirect")?;
    parse_request_line(&line)
}

fn parse_request_line(line: &str) -> Result<Vec<(String, String)>> {
    // GET /?state=...&code=... HTTP/1.1
    let target = line
        .split_whitespace()
        .nth(1)
        .context("malformed redirect request")?;
    let url = Url::parse("http://127.0.0.1")?.join(target)?;
    Ok(url.query_pairs().into_owned().collect())
}

fn extract_code(params: Vec<(String, String)>, expected_state: &str) -> Result<String> {
    let get = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };
    if let Some(error) = get("error") {
        bail!("authorization was denied: {error}");
    }
    if get("state").as_deref() != Some(expected_state) {
        bail!("state mismatch in authorization redirect");
    }
    get("code").context("authorization redirect carried no code")
}

fn respond(stream: &mut TcpStream, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()) {
        warn!("could not answer the browser: {e}");
    }
}

fn try_open_browser(url: &str) {
    let opener = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", "", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };
    if let Err(e) = opener {
        warn!("could not launch a browser ({e}); open the URL manually");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BasicClient {
        ClientSecrets::from_json(r#"{"installed": {"client_id": "cid", "client_secret": "cs"}}"#)
            .unwrap()
            .oauth_client()
            .unwrap()
            .set_redirect_uri(RedirectUrl::new("http://127.0.0.1:8080/".to_string()).unwrap())
    }

    #[test]
    fn test_consent_url_params() {
        let consent = Consent::new(&client(), &[UPLOAD_SCOPE.to_string()]);
        let params: Vec<(String, String)> = consent.url.query_pairs().into_owned().collect();
        let get = |k: &str| params.iter().find(|(pk, _)| pk == k).map(|(_, v)| v.as_str());

        assert!(consent.url.as_str().starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("client_id"), Some("cid"));
        assert_eq!(get("redirect_uri"), Some("http://127.0.0.1:8080/"));
        assert_eq!(get("scope"), Some(UPLOAD_SCOPE));
        assert_eq!(get("state"), Some(consent.state.secret().as_str()));
        assert_eq!(get("code_challenge_method"), Some("S256"));
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(get("prompt"), Some("consent"));
        // base64url of a SHA-256 digest, no padding
        assert_eq!(get("code_challenge").map(str::len), Some(43));
    }

    #[test]
    fn test_each_consent_is_fresh() {
        let client = client();
        let a = Consent::new(&client, &[]);
        let b = Consent::new(&client, &[]);
        assert_ne!(a.state.secret(), b.state.secret());
        assert_ne!(a.verifier.secret(), b.verifier.secret());
    }

    #[test]
    fn test_redirect_parsing() {
        let params = parse_request_line("GET /?state=abc&code=4%2F0Ad HTTP/1.1\r\n").unwrap();
        assert_eq!(extract_code(params, "abc").unwrap(), "4/0Ad");

        let params = parse_request_line("GET /?state=other&code=c HTTP/1.1").unwrap();
        assert!(extract_code(params, "abc").is_err());

        let params = parse_request_line("GET /?error=access_denied&state=abc HTTP/1.1").unwrap();
        let err = extract_code(params, "abc").unwrap_err();
        assert!(err.to_string().contains("access_denied"));

        assert!(parse_request_line("").is_err());
    }
}
