use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

pub const PAGE_SIZE: usize = 20;
pub const DOMAIN: &str = "mock.simplelogin.test";
pub const DEFAULT_API_KEY: &str = "test-api-key";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alias {
    pub id: u64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    pub id: u64,
    pub contact: String,
    pub reverse_alias: String,
    pub reverse_alias_address: String,
    pub creation_timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactList {
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserOptions {
    pub can_create: bool,
    pub prefix_suggestion: String,
    pub suffixes: Vec<String>,
}

#[derive(Deserialize)]
pub struct NewAlias {
    pub alias_prefix: String,
    pub alias_suffix: String,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct NewContact {
    pub contact: String,
}

#[derive(Deserialize)]
pub struct OptionsQuery {
    pub hostname: Option<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page_id: usize,
}

#[derive(Default)]
pub struct Store {
    next_id: u64,
    aliases: BTreeMap<u64, Alias>,
    contacts: BTreeMap<u64, Vec<Contact>>,
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_alias(&mut self, email: String, note: Option<String>) -> Option<Alias> {
        if self.aliases.values().any(|a| a.email == email) {
            return None;
        }
        let alias = Alias {
            id: self.next_id(),
            email,
            note,
            enabled: true,
        };
        self.contacts.insert(alias.id, Vec::new());
        self.aliases.insert(alias.id, alias.clone());
        Some(alias)
    }

    /// `Err(NOT_FOUND)` for an unknown alias, `Err(CONFLICT)` for an
    /// address already in its contact list.
    pub fn add_contact(&mut self, alias_id: u64, email: String) -> Result<Contact, StatusCode> {
        if !self.aliases.contains_key(&alias_id) {
            return Err(StatusCode::NOT_FOUND);
        }
        let id = self.next_id();
        let list = self.contacts.entry(alias_id).or_default();
        if list.iter().any(|c| c.contact == email) {
            return Err(StatusCode::CONFLICT);
        }
        let address = format!("ra+{id}@{DOMAIN}");
        let contact = Contact {
            id,
            reverse_alias: format!("\"{email}\" <{address}>"),
            reverse_alias_address: address,
            contact: email,
            creation_timestamp: 1_600_000_000 + id as i64,
        };
        list.push(contact.clone());
        Ok(contact)
    }

    pub fn contact_ids(&self, alias_id: u64) -> Vec<u64> {
        self.contacts
            .get(&alias_id)
            .map(|list| list.iter().map(|c| c.id).collect())
            .unwrap_or_default()
    }

    pub fn remove_contact(&mut self, contact_id: u64) -> bool {
        self.contacts.values_mut().any(|list| {
            let before = list.len();
            list.retain(|c| c.id != contact_id);
            list.len() != before
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub api_key: Arc<str>,
    pub store: Arc<RwLock<Store>>,
}

impl AppState {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: Arc::from(api_key),
            store: Arc::new(RwLock::new(Store::default())),
        }
    }
}

pub fn app() -> Router {
    app_with_state(AppState::new(DEFAULT_API_KEY))
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/v3/alias/options", get(user_options))
        .route("/api/alias/custom/new", post(create_alias))
        .route("/api/aliases/{alias_id}/contacts", get(list_contacts).post(create_contact))
        .route("/api/contacts/{contact_id}", delete(delete_contact))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::new(DEFAULT_API_KEY)).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock alias server listening");
    }
    axum::serve(listener, app_with_state(state)).await
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    match headers.get("Authentication").and_then(|v| v.to_str().ok()) {
        Some(key) if key == &*state.api_key => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// The prefix suggestion is the first label of the hostname, if any.
pub fn suggest_prefix(hostname: Option<&str>) -> String {
    hostname
        .and_then(|h| h.trim_start_matches("www.").split('.').next())
        .unwrap_or_default()
        .to_string()
}

async fn user_options(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OptionsQuery>,
) -> Result<Json<UserOptions>, StatusCode> {
    authorize(&state, &headers)?;
    Ok(Json(UserOptions {
        can_create: true,
        prefix_suggestion: suggest_prefix(query.hostname.as_deref()),
        suffixes: vec![format!(".mock@{DOMAIN}"), format!("@{DOMAIN}")],
    }))
}

async fn create_alias(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewAlias>,
) -> Result<(StatusCode, Json<Alias>), StatusCode> {
    authorize(&state, &headers)?;
    if !input.alias_suffix.contains('@') || input.alias_prefix.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let email = format!("{}{}", input.alias_prefix, input.alias_suffix);
    let alias = state
        .store
        .write()
        .await
        .add_alias(email, input.note)
        .ok_or(StatusCode::CONFLICT)?;
    Ok((StatusCode::CREATED, Json(alias)))
}

async fn list_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(alias_id): Path<u64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ContactList>, StatusCode> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    let all = store.contacts.get(&alias_id).ok_or(StatusCode::NOT_FOUND)?;
    let contacts = all
        .iter()
        .skip(query.page_id.saturating_mul(PAGE_SIZE))
        .take(PAGE_SIZE)
        .cloned()
        .collect();
    Ok(Json(ContactList { contacts }))
}

async fn create_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(alias_id): Path<u64>,
    Json(input): Json<NewContact>,
) -> Result<(StatusCode, Json<Contact>), StatusCode> {
    authorize(&state, &headers)?;
    let contact = state.store.write().await.add_contact(alias_id, input.contact)?;
    Ok((StatusCode::CREATED, Json(contact)))
}

async fn delete_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<u64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    authorize(&state, &headers)?;
    if state.store.write().await.remove_contact(contact_id) {
        Ok(Json(serde_json::json!({ "deleted": true })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
