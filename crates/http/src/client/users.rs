//! Account management client methods

use super::{AmsClient, ClientError};
use ams_core::{UserAccount, UserUpdate};
use reqwest::Method;

impl AmsClient {
    /// Fetch a user account
    pub async fn get_user(&self, id: i64) -> Result<UserAccount, ClientError> {
        let request = self.request(Method::GET, &format!("/users/getUser/{id}"));
        self.execute(request).await
    }

    /// Fetch the logged-in user's account
    pub async fn current_user(&self) -> Result<UserAccount, ClientError> {
        let id = self.credentials().await?.user_id.ok_or_else(|| {
            ClientError::AuthenticationFailed("not logged in".to_string())
        })?;
        self.get_user(id).await
    }

    /// Update account settings
    ///
    /// When the logged-in user renames themselves the stored username follows.
    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<UserAccount, ClientError> {
        let request = self
            .request(Method::PUT, &format!("/users/updateUser/{id}"))
            .json(update);
        let account: UserAccount = self.execute(request).await?;

        let store = self.credential_store();
        let mut credentials = store.load().await?;
        if credentials.user_id == Some(account.id)
            && credentials.username.as_deref() != Some(account.ams_username.as_str())
        {
            credentials.username = Some(account.ams_username.clone());
            store.save(&credentials).await?;
        }

        Ok(account)
    }

    /// List all dashboard accounts
    pub async fn list_users(&self) -> Result<Vec<UserAccount>, ClientError> {
        let request = self.request(Method::GET, "/users/AllAmsUsers");
        self.execute(request).await
    }

    /// Delete a dashboard account
    pub async fn delete_user(&self, id: i64) -> Result<(), ClientError> {
        let request = self.request(Method::DELETE, &format!("/users/deleteUser/{id}"));
        self.execute_empty(request).await
    }
}
