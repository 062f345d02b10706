//! Client registry methods

use super::{AmsClient, ClientError};
use ams_core::{ClientIntake, ClientRecord, ClientUpdate, Roster};
use reqwest::Method;

impl AmsClient {
    /// List every registered client
    pub async fn list_clients(&self) -> Result<Vec<ClientRecord>, ClientError> {
        let request = self.request(Method::GET, "/clients/all");
        self.execute(request).await
    }

    /// Fetch clients and categories together and join them
    pub async fn roster(&self) -> Result<Roster, ClientError> {
        let (clients, categories) = tokio::try_join!(self.list_clients(), self.list_categories())?;
        Ok(Roster::assemble(clients, &categories))
    }

    /// Fetch a client by id
    pub async fn get_client(&self, id: i64) -> Result<ClientRecord, ClientError> {
        let request = self.request(Method::GET, &format!("/clients/{id}"));
        self.execute(request).await
    }

    /// Look a client up by serial number
    pub async fn find_client_by_serial(&self, serial: i64) -> Result<ClientRecord, ClientError> {
        let request = self.request(Method::GET, &format!("/clients/findClient/serial/{serial}"));
        self.execute(request).await
    }

    /// Register a client from the intake form
    pub async fn register_client(&self, intake: &ClientIntake) -> Result<ClientRecord, ClientError> {
        let request = self.request(Method::POST, "/clients/register").json(intake);
        self.execute(request).await
    }

    /// Save an inline edit
    pub async fn update_client(
        &self,
        id: i64,
        update: &ClientUpdate,
    ) -> Result<ClientRecord, ClientError> {
        let request = self
            .request(Method::PUT, &format!("/clients/updateClient/{id}"))
            .json(update);
        self.execute(request).await
    }

    /// Delete a client
    pub async fn delete_client(&self, id: i64) -> Result<(), ClientError> {
        let request = self.request(Method::DELETE, &format!("/clients/deleteClient/{id}"));
        self.execute_empty(request).await
    }
}
