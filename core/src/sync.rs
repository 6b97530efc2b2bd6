//! Paginated contact list for one alias.
//!
//! # Design
//! `ContactSync` is a sans-IO state machine. `begin_*` applies the in-flight
//! guard and hands out a ticket holding the request to send; `finish_*`
//! consumes the ticket together with whatever the host's HTTP stack
//! returned and applies it. State changes only on success, so a failed
//! fetch never disturbs what was already loaded.
//!
//! A ticket returned by `begin_load_next` / `begin_refresh` must be passed
//! back to `finish_fetch`; until then every further begin call is dropped.
//! There is no cancellation.
//!
//! Hosts that are happy to block can use `load_next`, `refresh` and
//! `delete`, which run the round-trip through a `Transport`.

use tracing::{debug, warn};

use crate::client::AliasClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::Contact;

/// Why a page is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Append the page after what is already loaded.
    Next,
    /// Fetch page 0 and replace everything on success.
    Refresh,
}

/// A page fetch that has passed the in-flight guard.
#[derive(Debug)]
#[must_use = "a pending fetch keeps the guard set until it is finished"]
pub struct PendingFetch {
    page: u32,
    mode: FetchMode,
    request: HttpRequest,
    prior_more_available: bool,
}

impl PendingFetch {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// The request the host must execute.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

/// A delete request for one contact.
#[derive(Debug)]
pub struct PendingDelete {
    contact_id: u64,
    request: HttpRequest,
}

impl PendingDelete {
    pub fn contact_id(&self) -> u64 {
        self.contact_id
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

/// What a successful fetch did to the local collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// `count` contacts from `page` were appended.
    Appended { page: u32, count: usize },
    /// A refresh replaced the whole collection with `count` contacts.
    Replaced { count: usize },
    /// The server returned an empty page; nothing more to load.
    Exhausted,
}

/// Owns the contacts loaded so far for one alias and the pagination cursor.
#[derive(Debug, Clone)]
pub struct ContactSync {
    client: AliasClient,
    alias_id: u64,
    contacts: Vec<Contact>,
    last_fetched_page: Option<u32>,
    more_available: bool,
    in_flight: bool,
}

impl ContactSync {
    pub fn new(client: AliasClient, alias_id: u64) -> Self {
        Self {
            client,
            alias_id,
            contacts: Vec::new(),
            last_fetched_page: None,
            more_available: true,
            in_flight: false,
        }
    }

    pub fn alias_id(&self) -> u64 {
        self.alias_id
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn more_available(&self) -> bool {
        self.more_available
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight
    }

    pub fn last_fetched_page(&self) -> Option<u32> {
        self.last_fetched_page
    }

    /// Start fetching the page after the last one loaded.
    ///
    /// Returns `None`, and issues nothing, when the list is exhausted or a
    /// fetch is already in flight.
    pub fn begin_load_next(&mut self) -> Option<PendingFetch> {
        if !self.more_available || self.in_flight {
            debug!(
                alias_id = self.alias_id,
                more_available = self.more_available,
                in_flight = self.in_flight,
                "load_next dropped"
            );
            return None;
        }
        let page = self.last_fetched_page.map_or(0, |p| p + 1);
        Some(self.start(page, FetchMode::Next, true))
    }

    /// Start re-fetching page 0. Dropped (returns `None`) while another
    /// fetch is in flight.
    pub fn begin_refresh(&mut self) -> Option<PendingFetch> {
        if self.in_flight {
            debug!(alias_id = self.alias_id, "refresh dropped: fetch in flight");
            return None;
        }
        let prior = self.more_available;
        self.more_available = true;
        Some(self.start(0, FetchMode::Refresh, prior))
    }

    fn start(&mut self, page: u32, mode: FetchMode, prior_more_available: bool) -> PendingFetch {
        self.in_flight = true;
        debug!(alias_id = self.alias_id, page, ?mode, "fetch started");
        PendingFetch {
            page,
            mode,
            request: self.client.build_list_contacts(self.alias_id, page),
            prior_more_available,
        }
    }

    /// Apply the outcome of a fetch started by `begin_load_next` or
    /// `begin_refresh`. The guard is released on every path.
    pub fn finish_fetch(
        &mut self,
        pending: PendingFetch,
        outcome: Result<HttpResponse, ApiError>,
    ) -> Result<SyncEvent, ApiError> {
        self.in_flight = false;
        let parsed = outcome.and_then(|response| self.client.parse_list_contacts(response));
        let page = match parsed {
            Ok(page) => page,
            Err(err) => {
                warn!(alias_id = self.alias_id, page = pending.page, error = %err, "fetch failed");
                self.more_available = pending.prior_more_available;
                return Err(err);
            }
        };

        let event = match pending.mode {
            FetchMode::Next if page.is_empty() => {
                self.more_available = false;
                SyncEvent::Exhausted
            }
            FetchMode::Next => {
                let count = page.len();
                self.contacts.extend(page);
                self.last_fetched_page = Some(pending.page);
                SyncEvent::Appended {
                    page: pending.page,
                    count,
                }
            }
            FetchMode::Refresh if page.is_empty() => {
                self.contacts.clear();
                self.last_fetched_page = None;
                self.more_available = false;
                SyncEvent::Exhausted
            }
            FetchMode::Refresh => {
                let count = page.len();
                self.contacts = page;
                self.last_fetched_page = Some(0);
                SyncEvent::Replaced { count }
            }
        };
        debug!(
            alias_id = self.alias_id,
            ?event,
            total = self.contacts.len(),
            "fetch applied"
        );
        Ok(event)
    }

    /// Deletes are independent of the fetch guard.
    pub fn begin_delete(&self, contact_id: u64) -> PendingDelete {
        PendingDelete {
            contact_id,
            request: self.client.build_delete_contact(contact_id),
        }
    }

    /// On success removes the contact and returns it. `Ok(None)` means the
    /// server deleted an id that was not loaded locally.
    pub fn finish_delete(
        &mut self,
        pending: PendingDelete,
        outcome: Result<HttpResponse, ApiError>,
    ) -> Result<Option<Contact>, ApiError> {
        if let Err(err) = outcome.and_then(|response| self.client.parse_delete_contact(response)) {
            warn!(contact_id = pending.contact_id, error = %err, "delete failed");
            return Err(err);
        }
        let removed = self
            .contacts
            .iter()
            .position(|c| c.id == pending.contact_id)
            .map(|idx| self.contacts.remove(idx));
        debug!(contact_id = pending.contact_id, found = removed.is_some(), "contact deleted");
        Ok(removed)
    }

    /// Blocking `begin_load_next` + `finish_fetch`. `Ok(None)` when dropped.
    pub fn load_next<T: Transport>(&mut self, transport: &T) -> Result<Option<SyncEvent>, ApiError> {
        match self.begin_load_next() {
            Some(pending) => self.run_fetch(pending, transport).map(Some),
            None => Ok(None),
        }
    }

    /// Blocking `begin_refresh` + `finish_fetch`. `Ok(None)` when dropped.
    pub fn refresh<T: Transport>(&mut self, transport: &T) -> Result<Option<SyncEvent>, ApiError> {
        match self.begin_refresh() {
            Some(pending) => self.run_fetch(pending, transport).map(Some),
            None => Ok(None),
        }
    }

    pub fn delete<T: Transport>(&mut self, transport: &T, contact_id: u64) -> Result<Option<Contact>, ApiError> {
        let pending = self.begin_delete(contact_id);
        let outcome = transport.execute(pending.request.clone());
        self.finish_delete(pending, outcome)
    }

    fn run_fetch<T: Transport>(&mut self, pending: PendingFetch, transport: &T) -> Result<SyncEvent, ApiError> {
        let outcome = transport.execute(pending.request.clone());
        self.finish_fetch(pending, outcome)
    }
}
