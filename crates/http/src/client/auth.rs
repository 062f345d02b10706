//! Authentication API client methods

use super::credentials::Credentials;
use super::{AmsClient, ClientError};
use ams_core::{LoginRequest, LoginResponse, SignupRequest, UserAccount};
use reqwest::Method;

impl AmsClient {
    /// Log in and persist the returned credential pair
    ///
    /// A 401 here means wrong username or password, so the refresh protocol
    /// is bypassed.
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            ams_username: username.into(),
            ams_user_password: password.into(),
        };
        let request = self.request(Method::POST, "/users/login").json(&body);
        let response: LoginResponse = self.execute_public(request).await?;

        let (Some(access_token), Some(refresh_token)) =
            (response.access_token.clone(), response.refresh_token.clone())
        else {
            return Err(ClientError::InvalidResponse(
                "login response is missing accessToken or refreshToken".into(),
            ));
        };

        self.credential_store()
            .save(&Credentials {
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
                username: Some(response.ams_username.clone()),
                user_id: Some(response.id),
            })
            .await?;

        info!(username = %response.ams_username, "Logged in");
        Ok(response)
    }

    /// Create a dashboard account
    pub async fn signup(&self, request: &SignupRequest) -> Result<UserAccount, ClientError> {
        let req = self.request(Method::POST, "/users/createUser").json(request);
        self.execute_public(req).await
    }

    /// End the session
    ///
    /// The server call is best effort; local credentials are cleared either
    /// way.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if self.is_authenticated().await? {
            let request = self.request(Method::POST, "/users/logout");
            if let Err(e) = self.gateway().send_unguarded(super::build(request)?).await {
                warn!(error = %e, "Server-side logout failed");
            }
        }

        self.credential_store().clear().await?;
        info!("Logged out");
        Ok(())
    }
}
