//! Client core for an email-alias forwarding service.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). On top of the client,
//! `ContactSync` keeps the paginated contact list of one alias with a single
//! in-flight fetch, refresh-resets-pagination, and delete.
//!
//! # Design
//! - `AliasClient` is stateless: base URL plus API key.
//! - Each operation is split into `build_*` (produces request) and
//!   `parse_*` (consumes response), so the I/O boundary is explicit.
//! - `ContactSync` hands out begin/finish tickets; hosts that can block
//!   implement `Transport` instead.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod error;
pub mod http;
pub mod settings;
pub mod sync;
pub mod types;

pub use client::AliasClient;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, AUTH_HEADER};
pub use settings::{Settings, SettingsError};
pub use sync::{ContactSync, FetchMode, PendingDelete, PendingFetch, SyncEvent};
pub use types::{Alias, ApiKey, Contact, NewAlias, NewContact, UserOptions};
