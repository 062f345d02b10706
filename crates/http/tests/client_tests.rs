//! Integration tests for the AMS HTTP client

use ams_core::{ClientIntake, ClientUpdate, SignupRequest, UserUpdate};
use ams_http::client::credentials::{
    CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore,
};
use ams_http::{AmsClient, ClientError};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn logged_in(user_id: i64) -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_credentials(Credentials {
        access_token: Some("access-1".to_string()),
        refresh_token: Some("refresh-1".to_string()),
        username: Some("nurse".to_string()),
        user_id: Some(user_id),
    }))
}

fn client_for(server: &MockServer, store: Arc<MemoryCredentialStore>) -> AmsClient {
    AmsClient::builder()
        .base_url(server.uri())
        .credential_store(store)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_client_builder() {
    let client = AmsClient::builder()
        .base_url("http://localhost:8080/api/")
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080/api");
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = AmsClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_login_persists_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/login"))
        .and(body_json(json!({
            "amsUsername": "nurse",
            "amsUserPassword": "secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-1",
            "refreshToken": "refresh-1",
            "amsUsername": "nurse",
            "amsUserFname": "Ada",
            "amsUserLname": "Obi",
            "id": 7
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let client = client_for(&mock_server, store.clone());

    let response = client.login("nurse", "secret").await.unwrap();
    assert_eq!(response.id, 7);
    assert_eq!(response.display_name(), "Ada Obi");

    let stored = store.snapshot();
    assert_eq!(stored.access_token.as_deref(), Some("access-1"));
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(stored.username.as_deref(), Some("nurse"));
    assert_eq!(stored.user_id, Some(7));
    assert!(client.is_authenticated().await.unwrap());
}

#[tokio::test]
async fn test_login_without_tokens_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-1",
            "amsUsername": "nurse",
            "id": 7
        })))
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let client = client_for(&mock_server, store.clone());

    let result = client.login("nurse", "secret").await;
    assert!(matches!(result, Err(ClientError::InvalidResponse(_))));
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_login_bad_credentials_skips_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid credentials"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "x"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, logged_in(7));

    match client.login("nurse", "wrong").await {
        Err(ClientError::AuthenticationFailed(message)) => {
            assert_eq!(message, "Invalid credentials")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_signup() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/createUser"))
        .and(body_json(json!({
            "amsUserFname": "Ada",
            "amsUserLname": "Obi",
            "amsUsername": "ada",
            "amsPassword": "pw"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9,
            "amsUserFname": "Ada",
            "amsUserLname": "Obi",
            "amsUsername": "ada"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = AmsClient::new(mock_server.uri()).unwrap();
    let account = client
        .signup(&SignupRequest {
            ams_user_fname: "Ada".to_string(),
            ams_user_lname: "Obi".to_string(),
            ams_username: "ada".to_string(),
            ams_password: "pw".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(account.id, 9);
}

#[tokio::test]
async fn test_signup_conflict_keeps_server_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/createUser"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Username already exists"})),
        )
        .mount(&mock_server)
        .await;

    let client = AmsClient::new(mock_server.uri()).unwrap();
    let result = client
        .signup(&SignupRequest {
            ams_user_fname: "Ada".to_string(),
            ams_user_lname: "Obi".to_string(),
            ams_username: "ada".to_string(),
            ams_password: "pw".to_string(),
        })
        .await;

    match result {
        Err(ClientError::BadRequest(message)) => {
            let body: serde_json::Value = serde_json::from_str(&message).unwrap();
            assert_eq!(body["message"], "Username already exists");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_logout_clears_credentials_even_if_server_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/logout"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = logged_in(7);
    let client = client_for(&mock_server, store.clone());

    client.logout().await.unwrap();
    assert!(store.snapshot().is_empty());
    assert!(!client.is_authenticated().await.unwrap());
}

#[tokio::test]
async fn test_logout_without_session_skips_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = AmsClient::new(mock_server.uri()).unwrap();
    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_roster_joins_clients_and_categories() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "kpClientId": 1,
                "kpClientFName": "Jane",
                "kpClientLName": "Doe",
                "kpClientSerialNumber": 5000,
                "registeredBy": "nurse",
                "categoryId": 2,
                "kpClientTimeAssigned": "2024-03-01T09:15:30"
            },
            {
                "kpClientId": null,
                "kpClientFName": "Broken",
                "kpClientLName": "Row",
                "kpClientSerialNumber": 5001,
                "registeredBy": "nurse",
                "categoryId": 2
            }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Breastfeeding"},
            {"id": 2, "name": "Outreach"}
        ])))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, logged_in(7));
    let roster = client.roster().await.unwrap();

    assert_eq!(roster.len(), 1);
    assert_eq!(roster.entries()[0].category_name, "Outreach");
}

#[tokio::test]
async fn test_find_client_by_serial() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients/findClient/serial/5003"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kpClientId": 3,
            "kpClientFName": "Jane",
            "kpClientLName": "Doe",
            "kpClientSerialNumber": 5003,
            "registeredBy": "nurse",
            "categoryId": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, logged_in(7));
    let record = client.find_client_by_serial(5003).await.unwrap();
    assert_eq!(record.kp_client_id, Some(3));
}

#[tokio::test]
async fn test_find_client_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients/findClient/serial/1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Client not found"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, logged_in(7));
    let result = client.find_client_by_serial(1).await;
    assert!(matches!(result, Err(ClientError::NotFound(_))));
}

#[tokio::test]
async fn test_register_update_delete_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/clients/register"))
        .and(body_json(json!({
            "kpClientFName": "Jane",
            "kpClientLName": "Doe",
            "registeredBy": "nurse",
            "categoryId": 1,
            "newCategoryName": null
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "kpClientId": 10,
            "kpClientFName": "Jane",
            "kpClientLName": "Doe",
            "kpClientSerialNumber": 5010,
            "registeredBy": "nurse",
            "categoryId": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/clients/updateClient/10"))
        .and(body_json(json!({
            "kpClientFName": "Janet",
            "kpClientLName": "Doe",
            "categoryId": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kpClientId": 10,
            "kpClientFName": "Janet",
            "kpClientLName": "Doe",
            "kpClientSerialNumber": 5010,
            "registeredBy": "nurse",
            "categoryId": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/clients/deleteClient/10"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, logged_in(7));

    let created = client
        .register_client(&ClientIntake {
            kp_client_f_name: "Jane".to_string(),
            kp_client_l_name: "Doe".to_string(),
            registered_by: "nurse".to_string(),
            category_id: Some(1),
            new_category_name: None,
            kp_client_serial_number: None,
        })
        .await
        .unwrap();
    assert_eq!(created.kp_client_serial_number, Some(5010));

    let mut update = ClientUpdate::from_record(&created);
    update.kp_client_f_name = "Janet".to_string();
    let updated = client.update_client(10, &update).await.unwrap();
    assert_eq!(updated.kp_client_f_name, "Janet");

    client.delete_client(10).await.unwrap();
}

#[tokio::test]
async fn test_generate_serial_and_categories() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/serial/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(5042)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Breastfeeding"}])),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, logged_in(7));
    assert_eq!(client.generate_serial().await.unwrap(), 5042);

    let categories = client.list_categories().await.unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Breastfeeding");
}

#[tokio::test]
async fn test_update_user_renames_stored_username() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/getUser/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "amsUserFname": "Ada",
            "amsUserLname": "Obi",
            "amsUsername": "nurse"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/users/updateUser/7"))
        .and(body_json(json!({
            "amsUserFname": "Ada",
            "amsUserLname": "Obi",
            "amsUsername": "head-nurse"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "amsUserFname": "Ada",
            "amsUserLname": "Obi",
            "amsUsername": "head-nurse"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = logged_in(7);
    let client = client_for(&mock_server, store.clone());

    let account = client.current_user().await.unwrap();
    let mut update = UserUpdate::from_account(&account);
    update.ams_username = "head-nurse".to_string();
    client.update_user(account.id, &update).await.unwrap();

    assert_eq!(
        client.current_username().await.unwrap().as_deref(),
        Some("head-nurse")
    );
    assert_eq!(store.snapshot().access_token.as_deref(), Some("access-1"));
}

#[tokio::test]
async fn test_current_user_requires_login() {
    let client = AmsClient::new("http://127.0.0.1:9").unwrap();
    let result = client.current_user().await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_session_survives_client_restart_with_file_store() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::TempDir::new().unwrap();
    let session_path = dir.path().join("session.json");

    Mock::given(method("POST"))
        .and(path("/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-1",
            "refreshToken": "refresh-1",
            "amsUsername": "nurse",
            "id": 7
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/AllAmsUsers"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let first = AmsClient::builder()
        .base_url(mock_server.uri())
        .credential_store(Arc::new(FileCredentialStore::new(&session_path)))
        .build()
        .unwrap();
    first.login("nurse", "secret").await.unwrap();
    drop(first);

    let store = Arc::new(FileCredentialStore::new(&session_path));
    assert_eq!(
        store.load().await.unwrap().username.as_deref(),
        Some("nurse")
    );

    let second = AmsClient::builder()
        .base_url(mock_server.uri())
        .credential_store(store)
        .build()
        .unwrap();
    assert!(second.list_users().await.unwrap().is_empty());
}
