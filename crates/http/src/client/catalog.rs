//! Reference data used by the intake form

use super::{AmsClient, ClientError};
use ams_core::Category;
use reqwest::Method;

impl AmsClient {
    /// List client categories
    pub async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        let request = self.request(Method::GET, "/categories");
        self.execute(request).await
    }

    /// Preview the next serial number for the intake form
    ///
    /// The server assigns the definitive number on registration.
    pub async fn generate_serial(&self) -> Result<i64, ClientError> {
        let request = self.request(Method::GET, "/serial/generate");
        self.execute(request).await
    }
}
