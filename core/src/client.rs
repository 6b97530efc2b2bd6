//! Stateless HTTP request builder and response parser for the alias API.
//!
//! # Design
//! `AliasClient` holds the base URL and the API key and carries no mutable
//! state between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The caller executes the actual HTTP round-trip.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, AUTH_HEADER};
use crate::types::{Alias, ApiKey, Contact, ContactPage, NewAlias, NewContact, UserOptions};

/// Synchronous, stateless client for the alias API.
#[derive(Debug, Clone)]
pub struct AliasClient {
    base_url: String,
    api_key: ApiKey,
}

impl AliasClient {
    pub fn new(base_url: &str, api_key: ApiKey) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_list_contacts(&self, alias_id: u64, page: u32) -> HttpRequest {
        self.request(
            HttpMethod::Get,
            format!("{}/api/aliases/{alias_id}/contacts?page_id={page}", self.base_url),
            None,
        )
    }

    pub fn build_create_contact(&self, alias_id: u64, input: &NewContact) -> Result<HttpRequest, ApiError> {
        let body = to_json(input)?;
        Ok(self.request(
            HttpMethod::Post,
            format!("{}/api/aliases/{alias_id}/contacts", self.base_url),
            Some(body),
        ))
    }

    pub fn build_delete_contact(&self, contact_id: u64) -> HttpRequest {
        self.request(
            HttpMethod::Delete,
            format!("{}/api/contacts/{contact_id}", self.base_url),
            None,
        )
    }

    /// `hostname` lets the server tailor the prefix suggestion to the site
    /// the user is signing up on.
    pub fn build_fetch_user_options(&self, hostname: Option<&str>) -> HttpRequest {
        let url = match hostname {
            Some(hostname) => {
                let encoded: String = url::form_urlencoded::byte_serialize(hostname.as_bytes()).collect();
                format!("{}/api/v3/alias/options?hostname={encoded}", self.base_url)
            }
            None => format!("{}/api/v3/alias/options", self.base_url),
        };
        self.request(HttpMethod::Get, url, None)
    }

    pub fn build_create_alias(&self, input: &NewAlias) -> Result<HttpRequest, ApiError> {
        let body = to_json(input)?;
        Ok(self.request(
            HttpMethod::Post,
            format!("{}/api/alias/custom/new", self.base_url),
            Some(body),
        ))
    }

    pub fn parse_list_contacts(&self, response: HttpResponse) -> Result<Vec<Contact>, ApiError> {
        check_status(&response, 200)?;
        let page: ContactPage = from_json(&response.body)?;
        Ok(page.into_contacts())
    }

    pub fn parse_create_contact(&self, response: HttpResponse) -> Result<Contact, ApiError> {
        check_create_status(&response)?;
        from_json(&response.body)
    }

    /// Any 2xx counts as deleted; the body is ignored.
    pub fn parse_delete_contact(&self, response: HttpResponse) -> Result<(), ApiError> {
        match response.status {
            Some(status) if (200..300).contains(&status) => Ok(()),
            _ => Err(classify_failure(&response)),
        }
    }

    pub fn parse_fetch_user_options(&self, response: HttpResponse) -> Result<UserOptions, ApiError> {
        check_status(&response, 200)?;
        from_json(&response.body)
    }

    pub fn parse_create_alias(&self, response: HttpResponse) -> Result<Alias, ApiError> {
        check_create_status(&response)?;
        from_json(&response.body)
    }

    fn request(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        let mut headers = vec![(AUTH_HEADER.to_string(), self.api_key.value().to_string())];
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        debug!(method = method.as_str(), %url, "built request");
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

fn to_json<T: Serialize>(input: &T) -> Result<String, ApiError> {
    serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(ApiError::parse::<T>)
}

/// Pass `expected` through, map everything else onto the error taxonomy.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == Some(expected) {
        return Ok(());
    }
    Err(classify_failure(response))
}

/// Create endpoints answer 201 and use 409 for an existing resource.
fn check_create_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == Some(409) {
        return Err(ApiError::Duplicated);
    }
    check_status(response, 201)
}

fn classify_failure(response: &HttpResponse) -> ApiError {
    match response.status {
        None => ApiError::UnknownResponseStatus,
        Some(401) => ApiError::InvalidApiKey,
        Some(500) => ApiError::InternalServerError,
        Some(502) => ApiError::BadGateway,
        Some(status) => ApiError::UnknownStatus { status },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AliasClient {
        AliasClient::new("https://app.simplelogin.io", ApiKey::new("key-123"))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body)
    }

    #[test]
    fn build_list_contacts_produces_correct_request() {
        let req = client().build_list_contacts(42, 3);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://app.simplelogin.io/api/aliases/42/contacts?page_id=3");
        assert_eq!(req.header("authentication"), Some("key-123"));
        assert!(req.header("content-type").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn build_delete_contact_produces_correct_request() {
        let req = client().build_delete_contact(9);
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "https://app.simplelogin.io/api/contacts/9");
        assert_eq!(req.header(AUTH_HEADER), Some("key-123"));
    }

    #[test]
    fn build_create_contact_has_json_body() {
        let req = client()
            .build_create_contact(
                5,
                &NewContact {
                    contact: "bob@example.com".into(),
                },
            )
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://app.simplelogin.io/api/aliases/5/contacts");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["contact"], "bob@example.com");
    }

    #[test]
    fn build_fetch_user_options_with_and_without_hostname() {
        let plain = client().build_fetch_user_options(None);
        assert_eq!(plain.url, "https://app.simplelogin.io/api/v3/alias/options");

        let with_host = client().build_fetch_user_options(Some("shop.example.com"));
        assert_eq!(
            with_host.url,
            "https://app.simplelogin.io/api/v3/alias/options?hostname=shop.example.com"
        );

        let escaped = client().build_fetch_user_options(Some("a b&c"));
        assert!(escaped.url.ends_with("?hostname=a+b%26c"), "{}", escaped.url);
    }

    #[test]
    fn build_create_alias_includes_note_only_when_present() {
        let mut input = NewAlias {
            alias_prefix: "news".into(),
            alias_suffix: ".abc@simplelogin.co".into(),
            note: None,
        };
        let req = client().build_create_alias(&input).unwrap();
        assert_eq!(req.url, "https://app.simplelogin.io/api/alias/custom/new");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["alias_prefix"], "news");
        assert!(body.get("note").is_none());

        input.note = Some("newsletters".into());
        let req = client().build_create_alias(&input).unwrap();
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["note"], "newsletters");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = AliasClient::new("http://localhost:3000/", ApiKey::new("k"));
        let req = client.build_delete_contact(1);
        assert_eq!(req.url, "http://localhost:3000/api/contacts/1");
    }

    #[test]
    fn parse_list_contacts_success() {
        let body = r#"{"contacts":[
            {"id":1,"contact":"a@x.com","reverse_alias":"ra-a"},
            {"id":2,"contact":"b@x.com","reverse_alias":"ra-b"}
        ]}"#;
        let contacts = client().parse_list_contacts(response(200, body)).unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].email, "a@x.com");
        assert_eq!(contacts[1].reverse_alias, "ra-b");
    }

    #[test]
    fn list_status_codes_map_to_taxonomy() {
        let c = client();
        assert_eq!(c.parse_list_contacts(response(401, "")).unwrap_err(), ApiError::InvalidApiKey);
        assert_eq!(
            c.parse_list_contacts(response(500, "")).unwrap_err(),
            ApiError::InternalServerError
        );
        assert_eq!(c.parse_list_contacts(response(502, "")).unwrap_err(), ApiError::BadGateway);
        assert_eq!(
            c.parse_list_contacts(response(409, "")).unwrap_err(),
            ApiError::UnknownStatus { status: 409 }
        );
        assert_eq!(
            c.parse_list_contacts(response(201, "[]")).unwrap_err(),
            ApiError::UnknownStatus { status: 201 }
        );
        let missing = HttpResponse {
            status: None,
            body: String::new(),
        };
        assert_eq!(
            c.parse_list_contacts(missing).unwrap_err(),
            ApiError::UnknownResponseStatus
        );
    }

    #[test]
    fn parse_list_contacts_bad_json() {
        let err = client().parse_list_contacts(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Parse { .. }));
    }

    #[test]
    fn parse_create_alias_success_and_conflict() {
        let c = client();
        let alias = c
            .parse_create_alias(response(201, r#"{"id":3,"email":"news.abc@simplelogin.co"}"#))
            .unwrap();
        assert_eq!(alias.id, 3);
        assert_eq!(alias.email, "news.abc@simplelogin.co");

        assert_eq!(c.parse_create_alias(response(409, "")).unwrap_err(), ApiError::Duplicated);
        assert_eq!(
            c.parse_create_alias(response(200, "{}")).unwrap_err(),
            ApiError::UnknownStatus { status: 200 }
        );
    }

    #[test]
    fn parse_create_contact_conflict_is_duplicated() {
        let err = client().parse_create_contact(response(409, "")).unwrap_err();
        assert_eq!(err, ApiError::Duplicated);
    }

    #[test]
    fn parse_fetch_user_options_missing_field_is_parse_failure() {
        let err = client()
            .parse_fetch_user_options(response(200, r#"{"can_create":true,"suffixes":[]}"#))
            .unwrap_err();
        match err {
            ApiError::Parse { target, .. } => assert_eq!(target, "UserOptions"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_fetch_user_options_success() {
        let options = client()
            .parse_fetch_user_options(response(
                200,
                r#"{"can_create":true,"prefix_suggestion":"shop","suffixes":[".x@sl.co"]}"#,
            ))
            .unwrap();
        assert_eq!(options.domains, vec!["sl.co"]);
    }

    #[test]
    fn parse_delete_contact_accepts_any_2xx() {
        let c = client();
        assert!(c.parse_delete_contact(response(200, r#"{"deleted":true}"#)).is_ok());
        assert!(c.parse_delete_contact(response(204, "")).is_ok());
        assert_eq!(
            c.parse_delete_contact(response(404, "")).unwrap_err(),
            ApiError::UnknownStatus { status: 404 }
        );
        assert_eq!(c.parse_delete_contact(response(401, "")).unwrap_err(), ApiError::InvalidApiKey);
    }
}
