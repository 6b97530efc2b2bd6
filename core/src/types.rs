//! Domain DTOs for the alias API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! integration tests catch drift between the two crates. Everything the
//! server sends is deserialized through serde derives so a missing or
//! mistyped field fails the whole parse instead of yielding a half-filled
//! record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque API credential sent in the `Authentication` header.
///
/// `Debug` is redacted so the key never reaches a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// A forwarding address owned by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alias {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// An external correspondent of an alias, reachable through its reverse alias.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub id: u64,
    #[serde(rename = "contact", alias = "email")]
    pub email: String,
    pub reverse_alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_alias_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<i64>,
}

/// One page of contacts. The service wraps the list in `{"contacts": [...]}`;
/// older deployments answer with the bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContactPage {
    Wrapped { contacts: Vec<Contact> },
    Bare(Vec<Contact>),
}

impl ContactPage {
    pub(crate) fn into_contacts(self) -> Vec<Contact> {
        match self {
            ContactPage::Wrapped { contacts } | ContactPage::Bare(contacts) => contacts,
        }
    }
}

/// Request payload for creating a custom alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlias {
    pub alias_prefix: String,
    pub alias_suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Request payload for adding a contact to an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContact {
    pub contact: String,
}

/// What the user may create, as reported by the options endpoint.
///
/// `domains` is derived from `suffixes` once, while parsing: the text after
/// the first `@` of each suffix. Suffixes without `@` contribute nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUserOptions", into = "RawUserOptions")]
pub struct UserOptions {
    pub can_create: bool,
    pub prefix_suggestion: String,
    pub suffixes: Vec<String>,
    pub domains: Vec<String>,
}

impl UserOptions {
    pub fn new(can_create: bool, prefix_suggestion: impl Into<String>, suffixes: Vec<String>) -> Self {
        let domains = suffixes
            .iter()
            .filter_map(|suffix| suffix.split_once('@').map(|(_, domain)| domain.to_string()))
            .collect();
        Self {
            can_create,
            prefix_suggestion: prefix_suggestion.into(),
            suffixes,
            domains,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawUserOptions {
    can_create: bool,
    prefix_suggestion: String,
    suffixes: Vec<String>,
}

impl From<RawUserOptions> for UserOptions {
    fn from(raw: RawUserOptions) -> Self {
        UserOptions::new(raw.can_create, raw.prefix_suggestion, raw.suffixes)
    }
}

impl From<UserOptions> for RawUserOptions {
    fn from(options: UserOptions) -> Self {
        RawUserOptions {
            can_create: options.can_create,
            prefix_suggestion: options.prefix_suggestion,
            suffixes: options.suffixes,
        }
    }
}
