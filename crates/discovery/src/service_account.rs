//! DC/OS service-account login
//!
//! A service account signs `{uid}` with its RS256 private key and trades the
//! JWT for a session token at the cluster's login endpoint.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceAccountError {
    #[error("Invalid service account credentials: {0}")]
    Credentials(#[from] serde_json::Error),

    #[error("Signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Login request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Login rejected with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Service-account credential as stored in `DCOS_SERVICE_ACCOUNT_CREDENTIAL`
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub uid: String,
    pub private_key: String,
    pub login_endpoint: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("uid", &self.uid)
            .field("private_key", &"<redacted>")
            .field("login_endpoint", &self.login_endpoint)
            .finish()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    uid: &'a str,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    uid: &'a str,
    token: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

impl ServiceAccount {
    /// Parse the credential JSON (`uid`, `private_key`, `login_endpoint`)
    pub fn from_json(raw: &str) -> Result<Self, ServiceAccountError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Sign the login JWT
    pub fn sign(&self) -> Result<String, ServiceAccountError> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        let claims = Claims { uid: &self.uid };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &key,
        )?)
    }

    /// Exchange a signed JWT for a session token
    pub async fn login(&self, client: &Client) -> Result<String, ServiceAccountError> {
        let jwt = self.sign()?;
        let resp = client
            .post(&self.login_endpoint)
            .json(&LoginRequest {
                uid: &self.uid,
                token: &jwt,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceAccountError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let login: LoginResponse = resp.json().await?;
        Ok(login.token)
    }
}
