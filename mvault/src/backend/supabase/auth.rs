//! Identity over `/auth/v1`

use async_trait::async_trait;
use mvault_common::Identity;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{check, AuthSession, SupabaseClient};
use crate::backend::{BackendError, BackendResult, IdentityProvider};

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserBody> for Identity {
    fn from(user: UserBody) -> Self {
        Identity {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
    user: UserBody,
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn current_identity(&self) -> BackendResult<Option<Identity>> {
        let token = match self.access_token() {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };

        let response = self
            .http
            .get(self.endpoint("/auth/v1/user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        match check(response).await {
            Ok(response) => {
                let user: UserBody = response
                    .json()
                    .await
                    .map_err(|e| BackendError::Decode(e.to_string()))?;
                Ok(Some(user.into()))
            }
            Err(BackendError::Unauthenticated) | Err(BackendError::Status { status: 403, .. }) => {
                debug!("Stored access token rejected, clearing session");
                self.set_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Identity> {
        let response = self
            .anon(self.http.post(self.endpoint("/auth/v1/token")))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            return Err(BackendError::InvalidCredentials);
        }

        let body: TokenBody = check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let identity: Identity = body.user.into();
        self.set_session(Some(AuthSession {
            access_token: body.access_token,
            identity: identity.clone(),
        }));
        Ok(identity)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let token = match self.access_token() {
            Ok(token) => token,
            Err(_) => return Ok(()),
        };

        let result = self
            .http
            .post(self.endpoint("/auth/v1/logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .send()
            .await;

        // The local session is dropped even when the revoke call fails
        self.set_session(None);

        match result {
            Ok(response) => check(response).await.map(|_| ()),
            Err(e) => {
                warn!(error = %e, "Logout request failed, local session cleared");
                Err(e.into())
            }
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }
}
