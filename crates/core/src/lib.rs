//! AMS core types and utilities

pub mod roster;
pub mod types;

pub use roster::{Roster, RosterEntry, RosterFilter};
pub use types::{
    Category, ClientIntake, ClientRecord, ClientUpdate, LoginRequest, LoginResponse,
    RefreshRequest, RefreshResponse, SignupRequest, UserAccount, UserUpdate,
};
