//! C-ABI wrapper around `alias-core`.
//!
//! # Overview
//! Exposes the alias client and the paginated contact list through
//! `extern "C"` functions so a mobile host (Swift, Kotlin/JNI) can build
//! requests, run them on its own HTTP stack and hand the responses back.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `alias_build_*` / `alias_parse_*` mirror the core client 1:1.
//! - The contact list is driven with tickets: `alias_sync_begin_*` returns a
//!   pending operation (or null when the guard drops the call), the host
//!   executes its request, and `alias_sync_finish_*` consumes the ticket.
//! - A single `FfiAliasResult` envelope with `FfiDataTag` + `void* data`
//!   conveys success payloads and errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `alias_free_*` function to release them.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::catch_unwind;

use alias_core::http::HttpResponse;
use alias_core::{ApiError, ApiKey, NewAlias, NewContact};

use types::*;

/// Borrow a C string as `&str`, treating invalid UTF-8 as empty.
///
/// # Safety
/// `s` must be non-null and NUL-terminated.
unsafe fn str_arg<'a>(s: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(s) }.to_str().unwrap_or("")
}

unsafe fn opt_str_arg(s: *const c_char) -> Option<String> {
    if s.is_null() {
        None
    } else {
        Some(unsafe { str_arg(s) }.to_string())
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client bound to `base_url` that authenticates with `api_key`.
///
/// Returns null if either argument is null or if an internal panic occurs.
/// The caller must free the returned pointer with `alias_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn alias_client_new(base_url: *const c_char, api_key: *const c_char) -> *mut FfiAliasClient {
    catch_unwind(|| {
        if base_url.is_null() || api_key.is_null() {
            return std::ptr::null_mut();
        }
        let url = unsafe { str_arg(base_url) };
        let key = unsafe { str_arg(api_key) };
        let client = alias_core::AliasClient::new(url, ApiKey::new(key));
        Box::into_raw(Box::new(FfiAliasClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `alias_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn alias_client_free(client: *mut FfiAliasClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Build a request for one page of an alias's contacts.
///
/// Returns null if `client` is null.
/// The caller must free the returned pointer with `alias_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn alias_build_list_contacts(
    client: *const FfiAliasClient,
    alias_id: u64,
    page: u32,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        FfiHttpRequest::from_core(client.inner.build_list_contacts(alias_id, page))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request adding `contact` (an email address) to an alias.
///
/// Returns null if `client` or `contact` is null, or if serialization fails.
#[unsafe(no_mangle)]
pub extern "C" fn alias_build_create_contact(
    client: *const FfiAliasClient,
    alias_id: u64,
    contact: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() || contact.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let input = NewContact {
            contact: unsafe { str_arg(contact) }.to_string(),
        };
        match client.inner.build_create_contact(alias_id, &input) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request deleting a contact by id.
#[unsafe(no_mangle)]
pub extern "C" fn alias_build_delete_contact(client: *const FfiAliasClient, contact_id: u64) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        FfiHttpRequest::from_core(client.inner.build_delete_contact(contact_id))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request for the user's alias options. `hostname` may be null.
#[unsafe(no_mangle)]
pub extern "C" fn alias_build_fetch_user_options(
    client: *const FfiAliasClient,
    hostname: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let hostname = unsafe { opt_str_arg(hostname) };
        FfiHttpRequest::from_core(client.inner.build_fetch_user_options(hostname.as_deref()))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a request creating a custom alias. `note` may be null.
///
/// Returns null if `client`, `prefix` or `suffix` is null.
#[unsafe(no_mangle)]
pub extern "C" fn alias_build_create_alias(
    client: *const FfiAliasClient,
    prefix: *const c_char,
    suffix: *const c_char,
    note: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() || prefix.is_null() || suffix.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let input = NewAlias {
            alias_prefix: unsafe { str_arg(prefix) }.to_string(),
            alias_suffix: unsafe { str_arg(suffix) }.to_string(),
            note: unsafe { opt_str_arg(note) },
        };
        match client.inner.build_create_alias(&input) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        String::new()
    } else {
        unsafe { str_arg(resp.body) }.to_string()
    };
    HttpResponse {
        status: u16::try_from(resp.status).ok(),
        body,
    }
}

/// Turn the host's outcome into what the core expects: a transport error
/// message wins over the response.
///
/// # Safety
/// Non-null pointers must be valid for reads.
unsafe fn host_outcome(
    response: *const FfiHttpResponse,
    transport_error: *const c_char,
) -> Option<Result<HttpResponse, ApiError>> {
    if !transport_error.is_null() {
        return Some(Err(ApiError::transport(unsafe { str_arg(transport_error) })));
    }
    if response.is_null() {
        return None;
    }
    Some(Ok(ffi_response_to_core(unsafe { &*response })))
}

/// Shared shape of every `alias_parse_*` function.
fn parse_with<T>(
    client: *const FfiAliasClient,
    response: *const FfiHttpResponse,
    parse: impl FnOnce(&alias_core::AliasClient, HttpResponse) -> Result<T, ApiError>,
    wrap: impl FnOnce(T) -> *mut FfiAliasResult,
) -> *mut FfiAliasResult {
    if client.is_null() {
        return FfiAliasResult::null_arg("client");
    }
    if response.is_null() {
        return FfiAliasResult::null_arg("response");
    }
    let client = unsafe { &*client };
    let resp = ffi_response_to_core(unsafe { &*response });
    match parse(&client.inner, resp) {
        Ok(value) => wrap(value),
        Err(e) => FfiAliasResult::from_error(e),
    }
}

/// Parse a list-contacts response. `data_tag = ContactList` on success.
#[unsafe(no_mangle)]
pub extern "C" fn alias_parse_list_contacts(
    client: *const FfiAliasClient,
    response: *const FfiHttpResponse,
) -> *mut FfiAliasResult {
    catch_unwind(|| {
        parse_with(
            client,
            response,
            |c, r| c.parse_list_contacts(r),
            FfiAliasResult::ok_contact_list,
        )
    })
    .unwrap_or_else(|_| FfiAliasResult::panic("panic in alias_parse_list_contacts"))
}

/// Parse a create-contact response. `data_tag = Contact` on success (201).
#[unsafe(no_mangle)]
pub extern "C" fn alias_parse_create_contact(
    client: *const FfiAliasClient,
    response: *const FfiHttpResponse,
) -> *mut FfiAliasResult {
    catch_unwind(|| {
        parse_with(
            client,
            response,
            |c, r| c.parse_create_contact(r),
            FfiAliasResult::ok_contact,
        )
    })
    .unwrap_or_else(|_| FfiAliasResult::panic("panic in alias_parse_create_contact"))
}

/// Parse a delete-contact response. `data_tag = None` on success (any 2xx).
#[unsafe(no_mangle)]
pub extern "C" fn alias_parse_delete_contact(
    client: *const FfiAliasClient,
    response: *const FfiHttpResponse,
) -> *mut FfiAliasResult {
    catch_unwind(|| {
        parse_with(
            client,
            response,
            |c, r| c.parse_delete_contact(r),
            |()| FfiAliasResult::ok_empty(),
        )
    })
    .unwrap_or_else(|_| FfiAliasResult::panic("panic in alias_parse_delete_contact"))
}

/// Parse a user-options response. `data_tag = UserOptions` on success.
#[unsafe(no_mangle)]
pub extern "C" fn alias_parse_fetch_user_options(
    client: *const FfiAliasClient,
    response: *const FfiHttpResponse,
) -> *mut FfiAliasResult {
    catch_unwind(|| {
        parse_with(
            client,
            response,
            |c, r| c.parse_fetch_user_options(r),
            FfiAliasResult::ok_user_options,
        )
    })
    .unwrap_or_else(|_| FfiAliasResult::panic("panic in alias_parse_fetch_user_options"))
}

/// Parse a create-alias response. `data_tag = Alias` on success (201).
#[unsafe(no_mangle)]
pub extern "C" fn alias_parse_create_alias(
    client: *const FfiAliasClient,
    response: *const FfiHttpResponse,
) -> *mut FfiAliasResult {
    catch_unwind(|| {
        parse_with(
            client,
            response,
            |c, r| c.parse_create_alias(r),
            FfiAliasResult::ok_alias,
        )
    })
    .unwrap_or_else(|_| FfiAliasResult::panic("panic in alias_parse_create_alias"))
}

// ---------------------------------------------------------------------------
// Contact list
// ---------------------------------------------------------------------------

/// Create the contact list for `alias_id`. The client is copied, so it may
/// be freed independently. Free with `alias_sync_free`.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_new(client: *const FfiAliasClient, alias_id: u64) -> *mut FfiContactSync {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let sync = alias_core::ContactSync::new(client.inner.clone(), alias_id);
        Box::into_raw(Box::new(FfiContactSync { inner: sync }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a contact list. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_free(sync: *mut FfiContactSync) {
    if !sync.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(sync) });
        });
    }
}

/// Start loading the next page. Returns null when the call is dropped
/// (exhausted list or a fetch already in flight); no request must be sent.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_begin_load_next(sync: *mut FfiContactSync) -> *mut FfiPendingFetch {
    catch_unwind(|| {
        if sync.is_null() {
            return std::ptr::null_mut();
        }
        let sync = unsafe { &mut *sync };
        match sync.inner.begin_load_next() {
            Some(pending) => Box::into_raw(Box::new(FfiPendingFetch { inner: pending })),
            None => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Start re-fetching page 0. Returns null when a fetch is in flight.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_begin_refresh(sync: *mut FfiContactSync) -> *mut FfiPendingFetch {
    catch_unwind(|| {
        if sync.is_null() {
            return std::ptr::null_mut();
        }
        let sync = unsafe { &mut *sync };
        match sync.inner.begin_refresh() {
            Some(pending) => Box::into_raw(Box::new(FfiPendingFetch { inner: pending })),
            None => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// The request a pending fetch needs executed. Free with `alias_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn alias_pending_fetch_request(pending: *const FfiPendingFetch) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if pending.is_null() {
            return std::ptr::null_mut();
        }
        let pending = unsafe { &*pending };
        FfiHttpRequest::from_core(pending.inner.request().clone())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Page number a pending fetch targets.
#[unsafe(no_mangle)]
pub extern "C" fn alias_pending_fetch_page(pending: *const FfiPendingFetch) -> u32 {
    if pending.is_null() {
        return 0;
    }
    catch_unwind(|| unsafe { &*pending }.inner.page()).unwrap_or(0)
}

/// Finish a fetch. Consumes and frees `pending`.
///
/// Pass the host's response, or a non-null `transport_error` message when
/// the request produced no response. `data_tag = SyncEvent` on success.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_finish_fetch(
    sync: *mut FfiContactSync,
    pending: *mut FfiPendingFetch,
    response: *const FfiHttpResponse,
    transport_error: *const c_char,
) -> *mut FfiAliasResult {
    catch_unwind(|| {
        if sync.is_null() {
            return FfiAliasResult::null_arg("sync");
        }
        if pending.is_null() {
            return FfiAliasResult::null_arg("pending");
        }
        let Some(outcome) = (unsafe { host_outcome(response, transport_error) }) else {
            return FfiAliasResult::null_arg("response");
        };
        let sync = unsafe { &mut *sync };
        let pending = unsafe { Box::from_raw(pending) };
        match sync.inner.finish_fetch(pending.inner, outcome) {
            Ok(event) => FfiAliasResult::ok_sync_event(event),
            Err(e) => FfiAliasResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiAliasResult::panic("panic in alias_sync_finish_fetch"))
}

/// Start deleting a contact. Deletes do not wait for in-flight fetches.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_begin_delete(sync: *const FfiContactSync, contact_id: u64) -> *mut FfiPendingDelete {
    catch_unwind(|| {
        if sync.is_null() {
            return std::ptr::null_mut();
        }
        let sync = unsafe { &*sync };
        let pending = sync.inner.begin_delete(contact_id);
        Box::into_raw(Box::new(FfiPendingDelete { inner: pending }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// The request a pending delete needs executed. Free with `alias_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn alias_pending_delete_request(pending: *const FfiPendingDelete) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if pending.is_null() {
            return std::ptr::null_mut();
        }
        let pending = unsafe { &*pending };
        FfiHttpRequest::from_core(pending.inner.request().clone())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Finish a delete. Consumes and frees `pending`.
///
/// On success `data_tag = Contact` with the removed contact, or `None` when
/// the id was not in the loaded list.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_finish_delete(
    sync: *mut FfiContactSync,
    pending: *mut FfiPendingDelete,
    response: *const FfiHttpResponse,
    transport_error: *const c_char,
) -> *mut FfiAliasResult {
    catch_unwind(|| {
        if sync.is_null() {
            return FfiAliasResult::null_arg("sync");
        }
        if pending.is_null() {
            return FfiAliasResult::null_arg("pending");
        }
        let Some(outcome) = (unsafe { host_outcome(response, transport_error) }) else {
            return FfiAliasResult::null_arg("response");
        };
        let sync = unsafe { &mut *sync };
        let pending = unsafe { Box::from_raw(pending) };
        match sync.inner.finish_delete(pending.inner, outcome) {
            Ok(Some(contact)) => FfiAliasResult::ok_contact(contact),
            Ok(None) => FfiAliasResult::ok_empty(),
            Err(e) => FfiAliasResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiAliasResult::panic("panic in alias_sync_finish_delete"))
}

/// Snapshot of the loaded contacts. `data_tag = ContactList`.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_contacts(sync: *const FfiContactSync) -> *mut FfiAliasResult {
    catch_unwind(|| {
        if sync.is_null() {
            return FfiAliasResult::null_arg("sync");
        }
        let sync = unsafe { &*sync };
        FfiAliasResult::ok_contact_list(sync.inner.contacts().to_vec())
    })
    .unwrap_or_else(|_| FfiAliasResult::panic("panic in alias_sync_contacts"))
}

#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_len(sync: *const FfiContactSync) -> u32 {
    if sync.is_null() {
        return 0;
    }
    catch_unwind(|| unsafe { &*sync }.inner.len() as u32).unwrap_or(0)
}

/// Whether the list footer should keep asking for more.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_more_available(sync: *const FfiContactSync) -> bool {
    if sync.is_null() {
        return false;
    }
    catch_unwind(|| unsafe { &*sync }.inner.more_available()).unwrap_or(false)
}

#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_is_fetching(sync: *const FfiContactSync) -> bool {
    if sync.is_null() {
        return false;
    }
    catch_unwind(|| unsafe { &*sync }.inner.is_fetching()).unwrap_or(false)
}

/// Last page loaded, or -1 when nothing has been loaded.
#[unsafe(no_mangle)]
pub extern "C" fn alias_sync_last_fetched_page(sync: *const FfiContactSync) -> i64 {
    if sync.is_null() {
        return -1;
    }
    catch_unwind(|| unsafe { &*sync }.inner.last_fetched_page().map_or(-1, i64::from)).unwrap_or(-1)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a request returned by any `alias_build_*` or `alias_pending_*`
/// function. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn alias_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        unsafe {
            free_c_string(req.url);
            free_c_string(req.body);
            for h in reclaim_vec(req.headers, req.headers_len) {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    });
}

/// Free a pending fetch that will never be finished. The contact list stays
/// marked as fetching; only use this when tearing the list down.
#[unsafe(no_mangle)]
pub extern "C" fn alias_free_pending_fetch(pending: *mut FfiPendingFetch) {
    if !pending.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(pending) });
        });
    }
}

/// Free a pending delete that will never be finished. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn alias_free_pending_delete(pending: *mut FfiPendingDelete) {
    if !pending.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(pending) });
        });
    }
}

/// Free a result returned by any `alias_parse_*` or `alias_sync_*`
/// function. Safe to call with null. Uses `data_tag` to find the payload type.
#[unsafe(no_mangle)]
pub extern "C" fn alias_free_result(result: *mut FfiAliasResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        unsafe { free_c_string(result.error_message) };
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Contact => {
                let contact = unsafe { Box::from_raw(result.data as *mut FfiContact) };
                unsafe { contact.free_fields() };
            }
            FfiDataTag::ContactList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiContactList) };
                for contact in unsafe { reclaim_vec(list.items, list.len) } {
                    unsafe { contact.free_fields() };
                }
            }
            FfiDataTag::Alias => {
                let alias = unsafe { Box::from_raw(result.data as *mut FfiAlias) };
                unsafe {
                    free_c_string(alias.email);
                    free_c_string(alias.note);
                }
            }
            FfiDataTag::UserOptions => {
                let options = unsafe { Box::from_raw(result.data as *mut FfiUserOptions) };
                unsafe {
                    free_c_string(options.prefix_suggestion);
                    options.suffixes.free();
                    options.domains.free();
                }
            }
            FfiDataTag::SyncEvent => {
                drop(unsafe { Box::from_raw(result.data as *mut FfiSyncEvent) });
            }
            FfiDataTag::None => {}
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn alias_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| unsafe { free_c_string(s) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    const BASE: &str = "http://localhost:3000";

    fn new_client() -> *mut FfiAliasClient {
        let url = CString::new(BASE).unwrap();
        let key = CString::new("ffi-key").unwrap();
        alias_client_new(url.as_ptr(), key.as_ptr())
    }

    fn text(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    fn header(req: &FfiHttpRequest, name: &str) -> Option<String> {
        let headers = unsafe { std::slice::from_raw_parts(req.headers, req.headers_len as usize) };
        headers
            .iter()
            .find(|h| text(h.key).eq_ignore_ascii_case(name))
            .map(|h| text(h.value))
    }

    fn page_body(ids: std::ops::Range<u64>) -> CString {
        let contacts: Vec<serde_json::Value> = ids
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "contact": format!("c{id}@ext.test"),
                    "reverse_alias": format!("ra{id}"),
                })
            })
            .collect();
        CString::new(serde_json::json!({ "contacts": contacts }).to_string()).unwrap()
    }

    #[test]
    fn client_new_and_free() {
        let client = new_client();
        assert!(!client.is_null());
        alias_client_free(client);
    }

    #[test]
    fn client_new_null_returns_null() {
        let key = CString::new("k").unwrap();
        assert!(alias_client_new(std::ptr::null(), key.as_ptr()).is_null());
        let url = CString::new(BASE).unwrap();
        assert!(alias_client_new(url.as_ptr(), std::ptr::null()).is_null());
    }

    #[test]
    fn client_free_null_is_safe() {
        alias_client_free(std::ptr::null_mut());
    }

    #[test]
    fn build_list_contacts_has_page_and_auth() {
        let client = new_client();
        let req = alias_build_list_contacts(client, 7, 2);
        assert!(!req.is_null());

        let req_ref = unsafe { &*req };
        assert_eq!(req_ref.method, FfiHttpMethod::Get);
        assert_eq!(text(req_ref.url), format!("{BASE}/api/aliases/7/contacts?page_id=2"));
        assert_eq!(header(req_ref, "Authentication").as_deref(), Some("ffi-key"));
        assert!(req_ref.body.is_null());

        alias_free_request(req);
        alias_client_free(client);
    }

    #[test]
    fn build_null_client_returns_null() {
        assert!(alias_build_list_contacts(std::ptr::null(), 1, 0).is_null());
        assert!(alias_build_delete_contact(std::ptr::null(), 1).is_null());
        assert!(alias_build_fetch_user_options(std::ptr::null(), std::ptr::null()).is_null());
    }

    #[test]
    fn build_create_contact_produces_json_body() {
        let client = new_client();
        let contact = CString::new("friend@ext.test").unwrap();
        let req = alias_build_create_contact(client, 3, contact.as_ptr());
        assert!(!req.is_null());

        let req_ref = unsafe { &*req };
        assert_eq!(req_ref.method, FfiHttpMethod::Post);
        assert_eq!(text(req_ref.url), format!("{BASE}/api/aliases/3/contacts"));
        assert_eq!(header(req_ref, "content-type").as_deref(), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(&text(req_ref.body)).unwrap();
        assert_eq!(body["contact"], "friend@ext.test");

        alias_free_request(req);
        alias_client_free(client);
    }

    #[test]
    fn build_create_contact_null_contact_returns_null() {
        let client = new_client();
        assert!(alias_build_create_contact(client, 3, std::ptr::null()).is_null());
        alias_client_free(client);
    }

    #[test]
    fn build_delete_contact() {
        let client = new_client();
        let req = alias_build_delete_contact(client, 42);
        let req_ref = unsafe { &*req };
        assert_eq!(req_ref.method, FfiHttpMethod::Delete);
        assert_eq!(text(req_ref.url), format!("{BASE}/api/contacts/42"));
        alias_free_request(req);
        alias_client_free(client);
    }

    #[test]
    fn build_user_options_with_and_without_hostname() {
        let client = new_client();
        let req = alias_build_fetch_user_options(client, std::ptr::null());
        assert_eq!(text(unsafe { &*req }.url), format!("{BASE}/api/v3/alias/options"));
        alias_free_request(req);

        let host = CString::new("shop.test").unwrap();
        let req = alias_build_fetch_user_options(client, host.as_ptr());
        assert_eq!(
            text(unsafe { &*req }.url),
            format!("{BASE}/api/v3/alias/options?hostname=shop.test")
        );
        alias_free_request(req);
        alias_client_free(client);
    }

    #[test]
    fn build_create_alias_omits_null_note() {
        let client = new_client();
        let prefix = CString::new("news").unwrap();
        let suffix = CString::new(".x@sl.test").unwrap();
        let req = alias_build_create_alias(client, prefix.as_ptr(), suffix.as_ptr(), std::ptr::null());
        let body: serde_json::Value = serde_json::from_str(&text(unsafe { &*req }.body)).unwrap();
        assert_eq!(body["alias_prefix"], "news");
        assert_eq!(body["alias_suffix"], ".x@sl.test");
        assert!(body.get("note").is_none());
        alias_free_request(req);
        alias_client_free(client);
    }

    #[test]
    fn parse_list_contacts_two_items() {
        let client = new_client();
        let body = page_body(1..3);
        let resp = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };
        let result = alias_parse_list_contacts(client, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::ContactList);

        let list = unsafe { &*(r.data as *const FfiContactList) };
        let items = unsafe { std::slice::from_raw_parts(list.items, list.len as usize) };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);
        assert_eq!(text(items[1].email), "c2@ext.test");
        assert!(items[0].reverse_alias_address.is_null());

        alias_free_result(result);
        alias_client_free(client);
    }

    #[test]
    fn parse_error_statuses_map_to_codes() {
        let client = new_client();
        let body = CString::new("").unwrap();
        for (status, code) in [
            (401, FfiErrorCode::InvalidApiKey),
            (500, FfiErrorCode::InternalServerError),
            (502, FfiErrorCode::BadGateway),
            (404, FfiErrorCode::UnknownStatus),
            (-1, FfiErrorCode::UnknownResponseStatus),
        ] {
            let resp = FfiHttpResponse {
                status,
                body: body.as_ptr(),
            };
            let result = alias_parse_list_contacts(client, &resp);
            let r = unsafe { &*result };
            assert_eq!(r.error_code, code, "status {status}");
            assert!(!r.error_message.is_null());
            assert!(r.data.is_null());
            alias_free_result(result);
        }
        alias_client_free(client);
    }

    #[test]
    fn parse_create_contact_conflict_is_duplicated() {
        let client = new_client();
        let body = CString::new(r#"{"error":"exists"}"#).unwrap();
        let resp = FfiHttpResponse {
            status: 409,
            body: body.as_ptr(),
        };
        let result = alias_parse_create_contact(client, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Duplicated);
        assert_eq!(r.http_status, 409);
        alias_free_result(result);
        alias_client_free(client);
    }

    #[test]
    fn parse_user_options_exposes_domains() {
        let client = new_client();
        let body = CString::new(
            r#"{"can_create":true,"prefix_suggestion":"shop","suffixes":[[".a@one.test","sig"],["@two.test","sig"]]}"#,
        )
        .unwrap();
        let resp = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };
        let result = alias_parse_fetch_user_options(client, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok, "{}", text(r.error_message));
        assert_eq!(r.data_tag, FfiDataTag::UserOptions);

        let options = unsafe { &*(r.data as *const FfiUserOptions) };
        assert!(options.can_create);
        assert_eq!(text(options.prefix_suggestion), "shop");
        let domains = unsafe { std::slice::from_raw_parts(options.domains.items, options.domains.len as usize) };
        let domains: Vec<String> = domains.iter().map(|d| text(*d)).collect();
        assert_eq!(domains, ["one.test", "two.test"]);

        alias_free_result(result);
        alias_client_free(client);
    }

    #[test]
    fn parse_create_alias_success() {
        let client = new_client();
        let body = CString::new(r#"{"id":9,"email":"news.x@sl.test","note":"hi","enabled":true}"#).unwrap();
        let resp = FfiHttpResponse {
            status: 201,
            body: body.as_ptr(),
        };
        let result = alias_parse_create_alias(client, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::Alias);
        let alias = unsafe { &*(r.data as *const FfiAlias) };
        assert_eq!(alias.id, 9);
        assert_eq!(text(alias.note), "hi");
        alias_free_result(result);
        alias_client_free(client);
    }

    #[test]
    fn parse_delete_accepts_any_success() {
        let client = new_client();
        let resp = FfiHttpResponse {
            status: 204,
            body: std::ptr::null(),
        };
        let result = alias_parse_delete_contact(client, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::None);
        alias_free_result(result);
        alias_client_free(client);
    }

    #[test]
    fn parse_null_arguments() {
        let body = CString::new("{}").unwrap();
        let resp = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };
        let result = alias_parse_list_contacts(std::ptr::null(), &resp);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        alias_free_result(result);

        let client = new_client();
        let result = alias_parse_list_contacts(client, std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        alias_free_result(result);
        alias_client_free(client);
    }

    /// Answer a pending fetch with a canned page.
    fn finish_with(sync: *mut FfiContactSync, pending: *mut FfiPendingFetch, body: &CString) -> FfiSyncEventKind {
        let resp = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };
        let result = alias_sync_finish_fetch(sync, pending, &resp, std::ptr::null());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::SyncEvent);
        let kind = unsafe { &*(r.data as *const FfiSyncEvent) }.kind;
        alias_free_result(result);
        kind
    }

    #[test]
    fn sync_pages_until_empty() {
        let client = new_client();
        let sync = alias_sync_new(client, 5);
        alias_client_free(client);
        assert_eq!(alias_sync_last_fetched_page(sync), -1);
        assert!(alias_sync_more_available(sync));

        let pending = alias_sync_begin_load_next(sync);
        assert!(!pending.is_null());
        assert_eq!(alias_pending_fetch_page(pending), 0);
        assert!(alias_sync_is_fetching(sync));
        // A second load while the first is in flight is dropped.
        assert!(alias_sync_begin_load_next(sync).is_null());
        assert!(alias_sync_begin_refresh(sync).is_null());

        let req = alias_pending_fetch_request(pending);
        assert_eq!(
            text(unsafe { &*req }.url),
            format!("{BASE}/api/aliases/5/contacts?page_id=0")
        );
        alias_free_request(req);

        assert_eq!(finish_with(sync, pending, &page_body(1..21)), FfiSyncEventKind::Appended);
        assert_eq!(alias_sync_len(sync), 20);
        assert_eq!(alias_sync_last_fetched_page(sync), 0);

        let pending = alias_sync_begin_load_next(sync);
        assert_eq!(alias_pending_fetch_page(pending), 1);
        assert_eq!(finish_with(sync, pending, &page_body(21..41)), FfiSyncEventKind::Appended);

        let pending = alias_sync_begin_load_next(sync);
        assert_eq!(finish_with(sync, pending, &page_body(0..0)), FfiSyncEventKind::Exhausted);
        assert_eq!(alias_sync_len(sync), 40);
        assert!(!alias_sync_more_available(sync));
        assert!(alias_sync_begin_load_next(sync).is_null());

        let pending = alias_sync_begin_refresh(sync);
        assert_eq!(alias_pending_fetch_page(pending), 0);
        assert_eq!(finish_with(sync, pending, &page_body(1..21)), FfiSyncEventKind::Replaced);
        assert_eq!(alias_sync_len(sync), 20);
        assert!(alias_sync_more_available(sync));

        alias_sync_free(sync);
    }

    #[test]
    fn sync_transport_error_leaves_list_retryable() {
        let client = new_client();
        let sync = alias_sync_new(client, 5);
        alias_client_free(client);

        let pending = alias_sync_begin_load_next(sync);
        let message = CString::new("connection refused").unwrap();
        let result = alias_sync_finish_fetch(sync, pending, std::ptr::null(), message.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Transport);
        assert!(text(r.error_message).contains("connection refused"));
        alias_free_result(result);

        assert!(!alias_sync_is_fetching(sync));
        assert_eq!(alias_sync_len(sync), 0);
        let pending = alias_sync_begin_load_next(sync);
        assert_eq!(alias_pending_fetch_page(pending), 0);
        alias_free_pending_fetch(pending);
        alias_sync_free(sync);
    }

    #[test]
    fn sync_delete_removes_contact() {
        let client = new_client();
        let sync = alias_sync_new(client, 5);
        alias_client_free(client);
        let pending = alias_sync_begin_load_next(sync);
        finish_with(sync, pending, &page_body(1..4));

        let pending = alias_sync_begin_delete(sync, 2);
        let req = alias_pending_delete_request(pending);
        assert_eq!(text(unsafe { &*req }.url), format!("{BASE}/api/contacts/2"));
        alias_free_request(req);

        let resp = FfiHttpResponse {
            status: 200,
            body: std::ptr::null(),
        };
        let result = alias_sync_finish_delete(sync, pending, &resp, std::ptr::null());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::Contact);
        assert_eq!(unsafe { &*(r.data as *const FfiContact) }.id, 2);
        alias_free_result(result);
        assert_eq!(alias_sync_len(sync), 2);

        // Unknown ids succeed without a payload.
        let pending = alias_sync_begin_delete(sync, 99);
        let result = alias_sync_finish_delete(sync, pending, &resp, std::ptr::null());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::None);
        alias_free_result(result);

        let contacts = alias_sync_contacts(sync);
        let list = unsafe { &*((*contacts).data as *const FfiContactList) };
        let items = unsafe { std::slice::from_raw_parts(list.items, list.len as usize) };
        assert_eq!(items.iter().map(|c| c.id).collect::<Vec<_>>(), [1, 3]);
        alias_free_result(contacts);

        alias_sync_free(sync);
    }

    #[test]
    fn sync_null_handles() {
        assert!(alias_sync_new(std::ptr::null(), 1).is_null());
        assert!(alias_sync_begin_load_next(std::ptr::null_mut()).is_null());
        assert_eq!(alias_sync_len(std::ptr::null()), 0);
        assert!(!alias_sync_more_available(std::ptr::null()));
        assert_eq!(alias_sync_last_fetched_page(std::ptr::null()), -1);

        let result = alias_sync_finish_fetch(std::ptr::null_mut(), std::ptr::null_mut(), std::ptr::null(), std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        alias_free_result(result);
        alias_sync_free(std::ptr::null_mut());
    }

    #[test]
    fn free_null_is_safe() {
        alias_free_request(std::ptr::null_mut());
        alias_free_result(std::ptr::null_mut());
        alias_free_string(std::ptr::null_mut());
        alias_free_pending_fetch(std::ptr::null_mut());
        alias_free_pending_delete(std::ptr::null_mut());
    }

    /// Play the host: run every request the FFI layer hands out over real
    /// HTTP against the mock server.
    fn execute(agent: &ureq::Agent, req: *mut FfiHttpRequest) -> (i32, CString) {
        let r = unsafe { &*req };
        let url = text(r.url);
        let headers = unsafe { std::slice::from_raw_parts(r.headers, r.headers_len as usize) };
        let result = match r.method {
            FfiHttpMethod::Post => {
                let mut b = agent.post(&url);
                for h in headers {
                    b = b.header(text(h.key), text(h.value));
                }
                b.send(text(r.body).as_bytes())
            }
            FfiHttpMethod::Get | FfiHttpMethod::Delete => {
                let mut b = if r.method == FfiHttpMethod::Get {
                    agent.get(&url)
                } else {
                    agent.delete(&url)
                };
                for h in headers {
                    b = b.header(text(h.key), text(h.value));
                }
                b.call()
            }
        };
        alias_free_request(req);
        let mut response = result.unwrap();
        let status = i32::from(response.status().as_u16());
        let body = response.body_mut().read_to_string().unwrap();
        (status, CString::new(body).unwrap())
    }

    #[test]
    fn end_to_end_against_mock_server() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                mock_server::run_with_state(listener, mock_server::AppState::new("ffi-key")).await
            })
            .unwrap();
        });

        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        let url = CString::new(format!("http://{addr}")).unwrap();
        let key = CString::new("ffi-key").unwrap();
        let client = alias_client_new(url.as_ptr(), key.as_ptr());

        let prefix = CString::new("ffi").unwrap();
        let suffix = CString::new(format!("@{}", mock_server::DOMAIN)).unwrap();
        let (status, body) = execute(
            &agent,
            alias_build_create_alias(client, prefix.as_ptr(), suffix.as_ptr(), std::ptr::null()),
        );
        let resp = FfiHttpResponse {
            status,
            body: body.as_ptr(),
        };
        let result = alias_parse_create_alias(client, &resp);
        let alias_id = unsafe { &*((*result).data as *const FfiAlias) }.id;
        alias_free_result(result);

        for i in 0..3 {
            let contact = CString::new(format!("p{i}@ext.test")).unwrap();
            let (status, body) = execute(&agent, alias_build_create_contact(client, alias_id, contact.as_ptr()));
            let resp = FfiHttpResponse {
                status,
                body: body.as_ptr(),
            };
            let result = alias_parse_create_contact(client, &resp);
            assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
            alias_free_result(result);
        }

        let sync = alias_sync_new(client, alias_id);
        let pending = alias_sync_begin_load_next(sync);
        let (status, body) = execute(&agent, alias_pending_fetch_request(pending));
        let resp = FfiHttpResponse {
            status,
            body: body.as_ptr(),
        };
        let result = alias_sync_finish_fetch(sync, pending, &resp, std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
        alias_free_result(result);
        assert_eq!(alias_sync_len(sync), 3);

        let pending = alias_sync_begin_load_next(sync);
        let (status, body) = execute(&agent, alias_pending_fetch_request(pending));
        let resp = FfiHttpResponse {
            status,
            body: body.as_ptr(),
        };
        let result = alias_sync_finish_fetch(sync, pending, &resp, std::ptr::null());
        let event = unsafe { &*((*result).data as *const FfiSyncEvent) };
        assert_eq!(event.kind, FfiSyncEventKind::Exhausted);
        alias_free_result(result);

        alias_sync_free(sync);
        alias_client_free(client);
    }
}
