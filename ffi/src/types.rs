//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! tagged enums with explicit discriminants. Conversion functions live here
//! to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use alias_core::error::ApiError;
use alias_core::http::HttpMethod;
use alias_core::{Alias, Contact, PendingDelete, PendingFetch, SyncEvent, UserOptions};

/// Opaque handle to an `AliasClient`.
pub struct FfiAliasClient {
    pub(crate) inner: alias_core::AliasClient,
}

/// Opaque handle to the contact list of one alias.
pub struct FfiContactSync {
    pub(crate) inner: alias_core::ContactSync,
}

/// Opaque ticket for a fetch that passed the in-flight guard. Must be handed
/// back to `alias_sync_finish_fetch`, which also frees it.
pub struct FfiPendingFetch {
    pub(crate) inner: PendingFetch,
}

/// Opaque ticket for a contact delete. Freed by `alias_sync_finish_delete`.
pub struct FfiPendingDelete {
    pub(crate) inner: PendingDelete,
}

/// Allocate a C string. Interior NULs cannot occur in JSON-derived text; if
/// one does the string comes back empty rather than aborting.
pub(crate) fn c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

fn c_string_opt(s: Option<String>) -> *mut c_char {
    s.map_or(std::ptr::null_mut(), c_string)
}

/// Leak a `Vec` as a pointer/length pair. Empty vectors become null.
fn leak_vec<T>(items: Vec<T>) -> (*mut T, u32) {
    let len = items.len() as u32;
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let mut boxed = items.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    std::mem::forget(boxed);
    (ptr, len)
}

/// Reclaim a pointer/length pair produced by `leak_vec`.
///
/// # Safety
/// `ptr` must come from `leak_vec` with the same `len`, and not be freed twice.
pub(crate) unsafe fn reclaim_vec<T>(ptr: *mut T, len: u32) -> Vec<T> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    let slice = std::ptr::slice_from_raw_parts_mut(ptr, len as usize);
    unsafe { Box::from_raw(slice) }.into_vec()
}

/// Free a C string produced by `c_string`. Null is ignored.
///
/// # Safety
/// `s` must come from `CString::into_raw` and not be freed twice.
pub(crate) unsafe fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Delete = 2,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: alias_core::HttpRequest) -> *mut Self {
        let headers: Vec<FfiHeader> = req
            .headers
            .into_iter()
            .map(|(k, v)| FfiHeader {
                key: c_string(k),
                value: c_string(v),
            })
            .collect();
        let (headers, headers_len) = leak_vec(headers);

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: c_string(req.url),
            headers,
            headers_len,
            body: c_string_opt(req.body),
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// `status` is negative when the host has no status code for the reply.
/// The FFI layer reads but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: i32,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiAliasResult`.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    InvalidApiKey = 1,
    Duplicated = 2,
    InternalServerError = 3,
    BadGateway = 4,
    UnknownResponseStatus = 5,
    UnknownStatus = 6,
    Transport = 7,
    Parse = 8,
    Serialization = 9,
    Panic = 10,
    NullArg = 11,
}

/// Tag that tells `alias_free_result` what `FfiAliasResult::data` points to.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    Contact = 1,
    ContactList = 2,
    Alias = 3,
    UserOptions = 4,
    SyncEvent = 5,
}

#[repr(C)]
pub struct FfiContact {
    pub id: u64,
    pub email: *mut c_char,
    pub reverse_alias: *mut c_char,
    /// Null when the server did not send it.
    pub reverse_alias_address: *mut c_char,
}

impl FfiContact {
    pub(crate) fn from_core(contact: Contact) -> Self {
        FfiContact {
            id: contact.id,
            email: c_string(contact.email),
            reverse_alias: c_string(contact.reverse_alias),
            reverse_alias_address: c_string_opt(contact.reverse_alias_address),
        }
    }

    /// # Safety
    /// Fields must have been allocated by `from_core`.
    pub(crate) unsafe fn free_fields(&self) {
        unsafe {
            free_c_string(self.email);
            free_c_string(self.reverse_alias);
            free_c_string(self.reverse_alias_address);
        }
    }
}

#[repr(C)]
pub struct FfiContactList {
    pub items: *mut FfiContact,
    pub len: u32,
}

#[repr(C)]
pub struct FfiAlias {
    pub id: u64,
    pub email: *mut c_char,
    /// Null when the alias has no note.
    pub note: *mut c_char,
    pub enabled: bool,
}

#[repr(C)]
pub struct FfiStringList {
    pub items: *mut *mut c_char,
    pub len: u32,
}

impl FfiStringList {
    fn from_core(strings: Vec<String>) -> Self {
        let (items, len) = leak_vec(strings.into_iter().map(c_string).collect());
        FfiStringList { items, len }
    }

    /// # Safety
    /// Must have been built by `from_core` and not freed before.
    pub(crate) unsafe fn free(&self) {
        for s in unsafe { reclaim_vec(self.items, self.len) } {
            unsafe { free_c_string(s) };
        }
    }
}

#[repr(C)]
pub struct FfiUserOptions {
    pub can_create: bool,
    pub prefix_suggestion: *mut c_char,
    pub suffixes: FfiStringList,
    pub domains: FfiStringList,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiSyncEventKind {
    Appended = 0,
    Replaced = 1,
    Exhausted = 2,
}

#[repr(C)]
pub struct FfiSyncEvent {
    pub kind: FfiSyncEventKind,
    /// Page that was appended; 0 for the other kinds.
    pub page: u32,
    pub count: u32,
}

/// Result envelope for all parse and sync operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data`
/// points to the payload (tagged by `data_tag`, possibly `None`).
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string, and `data` is null.
#[repr(C)]
pub struct FfiAliasResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

impl FfiAliasResult {
    fn ok(data_tag: FfiDataTag, data: *mut c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiAliasResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            data_tag,
            data,
        }))
    }

    fn failure(error_code: FfiErrorCode, http_status: u16, msg: String) -> *mut Self {
        Box::into_raw(Box::new(FfiAliasResult {
            error_code,
            error_message: c_string(msg),
            http_status,
            data_tag: FfiDataTag::None,
            data: std::ptr::null_mut(),
        }))
    }

    pub(crate) fn ok_empty() -> *mut Self {
        Self::ok(FfiDataTag::None, std::ptr::null_mut())
    }

    pub(crate) fn ok_contact(contact: Contact) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiContact::from_core(contact)));
        Self::ok(FfiDataTag::Contact, data as *mut c_void)
    }

    pub(crate) fn ok_contact_list(contacts: Vec<Contact>) -> *mut Self {
        let (items, len) = leak_vec(contacts.into_iter().map(FfiContact::from_core).collect());
        let data = Box::into_raw(Box::new(FfiContactList { items, len }));
        Self::ok(FfiDataTag::ContactList, data as *mut c_void)
    }

    pub(crate) fn ok_alias(alias: Alias) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiAlias {
            id: alias.id,
            email: c_string(alias.email),
            note: c_string_opt(alias.note),
            enabled: alias.enabled,
        }));
        Self::ok(FfiDataTag::Alias, data as *mut c_void)
    }

    pub(crate) fn ok_user_options(options: UserOptions) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiUserOptions {
            can_create: options.can_create,
            prefix_suggestion: c_string(options.prefix_suggestion),
            suffixes: FfiStringList::from_core(options.suffixes),
            domains: FfiStringList::from_core(options.domains),
        }));
        Self::ok(FfiDataTag::UserOptions, data as *mut c_void)
    }

    pub(crate) fn ok_sync_event(event: SyncEvent) -> *mut Self {
        let ffi = match event {
            SyncEvent::Appended { page, count } => FfiSyncEvent {
                kind: FfiSyncEventKind::Appended,
                page,
                count: count as u32,
            },
            SyncEvent::Replaced { count } => FfiSyncEvent {
                kind: FfiSyncEventKind::Replaced,
                page: 0,
                count: count as u32,
            },
            SyncEvent::Exhausted => FfiSyncEvent {
                kind: FfiSyncEventKind::Exhausted,
                page: 0,
                count: 0,
            },
        };
        let data = Box::into_raw(Box::new(ffi));
        Self::ok(FfiDataTag::SyncEvent, data as *mut c_void)
    }

    /// Build an error result from an `ApiError`.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let (code, status) = match &err {
            ApiError::InvalidApiKey => (FfiErrorCode::InvalidApiKey, 401),
            ApiError::Duplicated => (FfiErrorCode::Duplicated, 409),
            ApiError::InternalServerError => (FfiErrorCode::InternalServerError, 500),
            ApiError::BadGateway => (FfiErrorCode::BadGateway, 502),
            ApiError::UnknownResponseStatus => (FfiErrorCode::UnknownResponseStatus, 0),
            ApiError::UnknownStatus { status } => (FfiErrorCode::UnknownStatus, *status),
            ApiError::Transport(_) => (FfiErrorCode::Transport, 0),
            ApiError::Parse { .. } => (FfiErrorCode::Parse, 0),
            ApiError::Serialization(_) => (FfiErrorCode::Serialization, 0),
        };
        Self::failure(code, status, err.to_string())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, 0, format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, 0, msg.to_string())
    }
}
