//! Client roster: the client list joined with category names
//!
//! The dashboard's client table and find-client page both work on this view.
//! Rows the server returns without an id or serial number cannot be edited
//! or deleted and are dropped during assembly.

use crate::types::{Category, ClientRecord};
use serde::Serialize;
use std::collections::HashMap;

/// Name shown for a client whose category id does not resolve
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Category filter value that matches every client
pub const ALL_CATEGORIES: &str = "all";

/// One row of the roster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub id: i64,
    pub serial_number: i64,
    pub category_name: String,
    pub record: ClientRecord,
}

impl RosterEntry {
    fn matches_search(&self, needle: &str) -> bool {
        let record = &self.record;
        let haystacks = [
            record.kp_client_f_name.to_lowercase(),
            record.kp_client_l_name.to_lowercase(),
            record.full_name().to_lowercase(),
            record
                .registered_by
                .as_deref()
                .unwrap_or_default()
                .to_lowercase(),
        ];

        haystacks.iter().any(|h| h.contains(needle))
            || self.serial_number.to_string().starts_with(needle)
    }
}

/// Category and free-text filter applied to the roster
#[derive(Debug, Clone, Default)]
pub struct RosterFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl RosterFilter {
    pub fn category(mut self, name: impl Into<String>) -> Self {
        self.category = Some(name.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    fn accepts(&self, entry: &RosterEntry) -> bool {
        let category_ok = match self.category.as_deref() {
            None | Some(ALL_CATEGORIES) => true,
            Some(name) => entry.category_name == name,
        };

        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(text) => entry.matches_search(&text.to_lowercase()),
        };

        category_ok && search_ok
    }
}

/// Client list merged with category names, in server order
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Join clients with categories, dropping rows without an id or serial
    pub fn assemble(clients: Vec<ClientRecord>, categories: &[Category]) -> Self {
        let names: HashMap<i64, &str> = categories
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect();

        let entries = clients
            .into_iter()
            .filter_map(|record| {
                let id = record.kp_client_id?;
                let serial_number = record.kp_client_serial_number?;
                let category_name = record
                    .category_id
                    .and_then(|cid| names.get(&cid).copied())
                    .unwrap_or(UNKNOWN_CATEGORY)
                    .to_string();

                Some(RosterEntry {
                    id,
                    serial_number,
                    category_name,
                    record,
                })
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries accepted by `filter`, in roster order
    pub fn filter(&self, filter: &RosterFilter) -> Vec<&RosterEntry> {
        self.entries.iter().filter(|e| filter.accepts(e)).collect()
    }
}
