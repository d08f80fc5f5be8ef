//! HTTP client for a Supabase-compatible backend
//!
//! Talks to three REST surfaces of one project:
//! - `/auth/v1`    identity (password grant, user lookup, logout)
//! - `/storage/v1` blob storage (upload, public address, remove, download)
//! - `/rest/v1`    PostgREST row access for the tracks table
//!
//! Every request carries the project's anon key in the `apikey` header;
//! calls made on behalf of a user also carry `Authorization: Bearer`.
//! No client-side timeouts are configured.

mod auth;
mod rows;
mod storage;

use std::sync::RwLock;

use mvault_common::config::BackendConfig;
use mvault_common::Identity;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::watch;

use super::{BackendError, BackendResult};

/// Characters left unescaped inside one storage path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Tokens of the signed-in user
#[derive(Debug, Clone)]
struct AuthSession {
    access_token: String,
    identity: Identity,
}

/// Client for one backend project
pub struct SupabaseClient {
    http: Client,
    config: BackendConfig,
    session: RwLock<Option<AuthSession>>,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl SupabaseClient {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("mvault/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (identity_tx, _) = watch::channel(None);

        Ok(Self {
            http,
            config,
            session: RwLock::new(None),
            identity_tx,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url, path)
    }

    /// Storage object address: `/storage/v1/object/{bucket}/{path}`
    fn object_url(&self, path: &str) -> String {
        self.endpoint(&format!(
            "/storage/v1/object/{}/{}",
            self.config.bucket,
            encode_path(path)
        ))
    }

    fn table_url(&self) -> String {
        self.endpoint(&format!("/rest/v1/{}", self.config.table))
    }

    fn access_token(&self) -> BackendResult<String> {
        self.session
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(BackendError::Unauthenticated)
    }

    /// Request with the anon key only
    fn anon(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
    }

    /// Request on behalf of the signed-in user
    fn authed(&self, builder: RequestBuilder) -> BackendResult<RequestBuilder> {
        let token = self.access_token()?;
        Ok(builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token))
    }

    fn set_session(&self, session: Option<AuthSession>) {
        let identity = session.as_ref().map(|s| s.identity.clone());
        *self.session.write().unwrap() = session;
        self.identity_tx.send_replace(identity);
    }
}

/// Percent-encode each `/`-separated segment of a storage path
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Error body shapes returned by the auth, storage and PostgREST services
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .message
            .or(parsed.msg)
            .or(parsed.error_description)
            .or(parsed.error)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

/// Pass successful responses through, map the rest to `BackendError`
async fn check(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    Err(match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthenticated,
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            BackendError::Rejected(message)
        }
        _ => BackendError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        SupabaseClient::new(BackendConfig {
            url: "https://proj.example.test".to_string(),
            anon_key: "anon".to_string(),
            bucket: "music".to_string(),
            table: "tracks".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(
            encode_path("tracks/u1/abc_My Song (live).mp3"),
            "tracks/u1/abc_My%20Song%20%28live%29.mp3"
        );
    }

    #[test]
    fn test_object_url() {
        assert_eq!(
            client().object_url("tracks/u1/a b.mp3"),
            "https://proj.example.test/storage/v1/object/music/tracks/u1/a%20b.mp3"
        );
        assert_eq!(
            client().table_url(),
            "https://proj.example.test/rest/v1/tracks"
        );
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#),
            "The resource already exists"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(r#"{"code":400,"msg":"bad"}"#), "bad");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_unauthenticated_without_session() {
        assert!(matches!(
            client().access_token(),
            Err(BackendError::Unauthenticated)
        ));
    }
}
