use crate::{
    client_utils::{envelope, send_json},
    Credentials, FolioConfig, FolioError, FolioResult, Session, SessionUser,
};
use reqwest::Client;

/// Exchanges credentials for a session token.
pub struct AuthClient {
    client: Client,
    login_url: String,
}

impl AuthClient {
    pub fn new(config: &FolioConfig) -> FolioResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            login_url: format!("{}/auth/login", config.api_base_url),
        })
    }

    /// Log in and return the user the backend issued a token for.
    pub async fn login(&self, credentials: &Credentials) -> FolioResult<SessionUser> {
        if credentials.email.trim().is_empty() {
            return Err(FolioError::MissingField("email"));
        }
        if credentials.password.is_empty() {
            return Err(FolioError::MissingField("password"));
        }

        let body = send_json(self.client.post(&self.login_url).json(credentials)).await?;
        let envelope = envelope(&body);
        if envelope.success == Some(false) {
            return Err(FolioError::Unauthorized(
                envelope.reason().unwrap_or("invalid credentials").to_string(),
            ));
        }

        let user: SessionUser = envelope
            .data
            .ok_or_else(|| FolioError::Invariant("auth", "login reply has no data".to_string()))
            .and_then(|data| {
                serde_json::from_value(data)
                    .map_err(|e| FolioError::Invariant("auth", format!("unexpected user: {e}")))
            })?;
        if user.token.is_empty() {
            return Err(FolioError::Invariant(
                "auth",
                "login reply has an empty token".to_string(),
            ));
        }
        Ok(user)
    }

    /// Log in and store the result in `session`.
    pub async fn login_into(
        &self,
        session: &Session,
        credentials: &Credentials,
    ) -> FolioResult<SessionUser> {
        let user = self.login(credentials).await?;
        session.login(user.clone());
        Ok(user)
    }
}
