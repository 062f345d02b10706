use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Credentials submitted to the login endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub ams_username: String,
    pub ams_user_password: String,
}

/// Body returned by a successful login
///
/// Both tokens are optional on the wire so that a malformed response can be
/// reported as such instead of as an opaque decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub ams_username: String,
    #[serde(default)]
    pub ams_user_fname: Option<String>,
    #[serde(default)]
    pub ams_user_lname: Option<String>,
    pub id: i64,
}

impl LoginResponse {
    /// Display name of the authenticated user
    pub fn display_name(&self) -> String {
        match (&self.ams_user_fname, &self.ams_user_lname) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.ams_username.clone(),
        }
    }
}

/// Signup form submitted to create a dashboard account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub ams_user_fname: String,
    pub ams_user_lname: String,
    pub ams_username: String,
    pub ams_password: String,
}

/// Dashboard account as returned by the user endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: i64,
    #[serde(default)]
    pub ams_user_fname: Option<String>,
    #[serde(default)]
    pub ams_user_lname: Option<String>,
    pub ams_username: String,
}

/// Account settings update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub ams_user_fname: String,
    pub ams_user_lname: String,
    pub ams_username: String,
    /// Omitted or empty keeps the current password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ams_password: Option<String>,
}

impl UserUpdate {
    /// Start an update from the account's current values
    pub fn from_account(account: &UserAccount) -> Self {
        Self {
            ams_user_fname: account.ams_user_fname.clone().unwrap_or_default(),
            ams_user_lname: account.ams_user_lname.clone().unwrap_or_default(),
            ams_username: account.ams_username.clone(),
            ams_password: None,
        }
    }
}

/// Client category (e.g. a programme the client is enrolled in)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Registered client as returned by the client endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    #[serde(default)]
    pub kp_client_id: Option<i64>,
    pub kp_client_f_name: String,
    pub kp_client_l_name: String,
    #[serde(default)]
    pub kp_client_serial_number: Option<i64>,
    #[serde(default)]
    pub registered_by: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub new_category_name: Option<String>,
    #[serde(default)]
    pub kp_client_time_assigned: Option<NaiveDateTime>,
}

impl ClientRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.kp_client_f_name, self.kp_client_l_name)
    }
}

/// Intake form body for registering a new client
///
/// Exactly one of `category_id` and `new_category_name` is expected; the
/// server assigns the definitive serial number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIntake {
    pub kp_client_f_name: String,
    pub kp_client_l_name: String,
    pub registered_by: String,
    pub category_id: Option<i64>,
    pub new_category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kp_client_serial_number: Option<i64>,
}

/// Inline edit of an existing client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdate {
    pub kp_client_f_name: String,
    pub kp_client_l_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
}

impl ClientUpdate {
    /// Start an update from the client's current values
    pub fn from_record(record: &ClientRecord) -> Self {
        Self {
            kp_client_f_name: record.kp_client_f_name.clone(),
            kp_client_l_name: record.kp_client_l_name.clone(),
            category_id: record.category_id,
        }
    }
}

/// Body of the token refresh exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}
