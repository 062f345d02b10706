//! CLI commands

use ams_core::{
    ClientIntake, ClientRecord, ClientUpdate, RosterFilter, SignupRequest, UserAccount, UserUpdate,
};
use ams_http::AmsClient;
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login {
        /// Account username
        username: String,

        /// Account password (prompted for when absent)
        #[arg(long, env = "AMS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create a dashboard account
    Signup {
        /// Account username
        username: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// Account password (prompted for when absent)
        #[arg(long, env = "AMS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// End the session and forget stored credentials
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List client categories
    Categories,

    /// Generate the next client serial number
    Serial,

    /// Client roster operations
    Clients {
        #[command(subcommand)]
        command: ClientCommands,
    },

    /// Settings of the logged-in account
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Dashboard user administration
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// List registered clients
    List {
        /// Only clients in this category ("all" for every category)
        #[arg(long)]
        category: Option<String>,

        /// Match names, registering user, or a serial number prefix
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one client by id
    Show { id: i64 },

    /// Look a client up by serial number
    Find { serial: i64 },

    /// Register a new client
    Register {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// Existing category id
        #[arg(long, required_unless_present = "new_category", conflicts_with = "new_category")]
        category_id: Option<i64>,

        /// Create a new category with this name
        #[arg(long)]
        new_category: Option<String>,
    },

    /// Edit a client's name or category
    Update {
        id: i64,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        category_id: Option<i64>,
    },

    /// Delete a client
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Show account details
    Show,

    /// Change account details
    Update {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        username: Option<String>,

        /// New password; the current one is kept when absent
        #[arg(long, env = "AMS_NEW_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List dashboard users
    List,

    /// Delete a dashboard user
    Delete { id: i64 },
}

/// Renders command results as text or JSON on stdout
#[derive(Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

impl Commands {
    pub async fn execute(self, client: &AmsClient, output: Output) -> Result<()> {
        match self {
            Commands::Login { username, password } => {
                let password = password_or_prompt(password)?;
                let response = client.login(username, password).await?;
                info!(user_id = response.id, "Session stored");
                output.emit(
                    &json!({ "username": response.ams_username, "id": response.id }),
                    || format!("Logged in as {}", response.display_name()),
                )
            }
            Commands::Signup {
                username,
                first_name,
                last_name,
                password,
            } => {
                let request = SignupRequest {
                    ams_user_fname: first_name,
                    ams_user_lname: last_name,
                    ams_username: username,
                    ams_password: password_or_prompt(password)?,
                };
                let account = client.signup(&request).await?;
                output.emit(&account, || {
                    format!("Created account {} (id {})", account.ams_username, account.id)
                })
            }
            Commands::Logout => {
                client.logout().await?;
                output.emit(&json!({ "loggedOut": true }), || "Logged out".to_string())
            }
            Commands::Whoami => {
                let credentials = client.credentials().await?;
                let logged_in = credentials.access_token.is_some();
                output.emit(
                    &json!({
                        "loggedIn": logged_in,
                        "username": credentials.username,
                        "id": credentials.user_id,
                    }),
                    || match (&credentials.username, logged_in) {
                        (Some(username), true) => username.clone(),
                        _ => "Not logged in".to_string(),
                    },
                )
            }
            Commands::Categories => {
                let categories = client.list_categories().await?;
                output.emit(&categories, || {
                    categories
                        .iter()
                        .map(|c| format!("{:>5}  {}", c.id, c.name))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            Commands::Serial => {
                let serial = client.generate_serial().await?;
                output.emit(&json!({ "serial": serial }), || serial.to_string())
            }
            Commands::Clients { command } => command.execute(client, output).await,
            Commands::Account { command } => command.execute(client, output).await,
            Commands::Users { command } => command.execute(client, output).await,
        }
    }
}

impl ClientCommands {
    pub async fn execute(self, client: &AmsClient, output: Output) -> Result<()> {
        match self {
            ClientCommands::List { category, search } => {
                let roster = client.roster().await?;
                let filter = RosterFilter { category, search };
                let entries = roster.filter(&filter);
                output.emit(&entries, || {
                    if entries.is_empty() {
                        return "No clients found".to_string();
                    }
                    let mut lines = vec![format!(
                        "{:>5}  {:>8}  {:<30}  {:<16}  {}",
                        "ID", "SERIAL", "NAME", "CATEGORY", "REGISTERED BY"
                    )];
                    lines.extend(entries.iter().map(|entry| {
                        format!(
                            "{:>5}  {:>8}  {:<30}  {:<16}  {}",
                            entry.id,
                            entry.serial_number,
                            entry.record.full_name(),
                            entry.category_name,
                            entry.record.registered_by.as_deref().unwrap_or("-"),
                        )
                    }));
                    lines.join("\n")
                })
            }
            ClientCommands::Show { id } => {
                let record = client.get_client(id).await?;
                output.emit(&record, || describe_client(&record))
            }
            ClientCommands::Find { serial } => {
                let record = client.find_client_by_serial(serial).await?;
                output.emit(&record, || describe_client(&record))
            }
            ClientCommands::Register {
                first_name,
                last_name,
                category_id,
                new_category,
            } => {
                let registered_by = client
                    .current_username()
                    .await?
                    .context("Not logged in; run `ams login` first")?;

                let intake = ClientIntake {
                    kp_client_f_name: first_name,
                    kp_client_l_name: last_name,
                    registered_by,
                    category_id,
                    new_category_name: new_category,
                    // Assigned by the server
                    kp_client_serial_number: None,
                };
                let record = client.register_client(&intake).await?;
                output.emit(&record, || format!("Registered\n{}", describe_client(&record)))
            }
            ClientCommands::Update {
                id,
                first_name,
                last_name,
                category_id,
            } => {
                if first_name.is_none() && last_name.is_none() && category_id.is_none() {
                    bail!("Nothing to update; pass --first-name, --last-name or --category-id");
                }

                let current = client.get_client(id).await?;
                let mut update = ClientUpdate::from_record(&current);
                if let Some(first_name) = first_name {
                    update.kp_client_f_name = first_name;
                }
                if let Some(last_name) = last_name {
                    update.kp_client_l_name = last_name;
                }
                if category_id.is_some() {
                    update.category_id = category_id;
                }

                let record = client.update_client(id, &update).await?;
                output.emit(&record, || format!("Updated\n{}", describe_client(&record)))
            }
            ClientCommands::Delete { id } => {
                client.delete_client(id).await?;
                output.emit(&json!({ "deleted": id }), || format!("Deleted client {id}"))
            }
        }
    }
}

impl AccountCommands {
    pub async fn execute(self, client: &AmsClient, output: Output) -> Result<()> {
        match self {
            AccountCommands::Show => {
                let account = client.current_user().await?;
                output.emit(&account, || describe_account(&account))
            }
            AccountCommands::Update {
                first_name,
                last_name,
                username,
                password,
            } => {
                let current = client.current_user().await?;
                let mut update = UserUpdate::from_account(&current);
                if let Some(first_name) = first_name {
                    update.ams_user_fname = first_name;
                }
                if let Some(last_name) = last_name {
                    update.ams_user_lname = last_name;
                }
                if let Some(username) = username {
                    update.ams_username = username;
                }
                update.ams_password = password.filter(|p| !p.is_empty());

                let account = client.update_user(current.id, &update).await?;
                output.emit(&account, || {
                    format!("Account updated\n{}", describe_account(&account))
                })
            }
        }
    }
}

impl UserCommands {
    pub async fn execute(self, client: &AmsClient, output: Output) -> Result<()> {
        match self {
            UserCommands::List => {
                let users = client.list_users().await?;
                output.emit(&users, || {
                    users
                        .iter()
                        .map(|u| format!("{:>5}  {}", u.id, u.ams_username))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            UserCommands::Delete { id } => {
                client.delete_user(id).await?;
                output.emit(&json!({ "deleted": id }), || format!("Deleted user {id}"))
            }
        }
    }
}

/// Use the given password, or read one line from stdin
fn password_or_prompt(password: Option<String>) -> Result<String> {
    let password = match password {
        Some(password) => password,
        None => {
            eprint!("Password: ");
            std::io::stderr().flush()?;
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .context("Failed to read password")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

fn describe_client(record: &ClientRecord) -> String {
    let mut lines = vec![format!("Name:          {}", record.full_name())];
    if let Some(id) = record.kp_client_id {
        lines.push(format!("ID:            {id}"));
    }
    if let Some(serial) = record.kp_client_serial_number {
        lines.push(format!("Serial:        {serial}"));
    }
    if let Some(category_id) = record.category_id {
        lines.push(format!("Category ID:   {category_id}"));
    }
    if let Some(registered_by) = &record.registered_by {
        lines.push(format!("Registered by: {registered_by}"));
    }
    if let Some(assigned) = record.kp_client_time_assigned {
        lines.push(format!("Assigned:      {}", assigned.format("%Y-%m-%d %H:%M")));
    }
    lines.join("\n")
}

fn describe_account(account: &UserAccount) -> String {
    format!(
        "Username:   {}\nFirst name: {}\nLast name:  {}\nID:         {}",
        account.ams_username,
        account.ams_user_fname.as_deref().unwrap_or("-"),
        account.ams_user_lname.as_deref().unwrap_or("-"),
        account.id,
    )
}
