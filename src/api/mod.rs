//! Read API over the record store
//!
//! Handlers are stateless: each one reads the store fresh and returns an
//! [`ApiResponse`] holding an HTTP-style status code and the JSON envelope
//! `{ success, message, ... }`. Routing them onto a transport is left to the
//! caller; the binary prints them for the `--list`, `--lookup`, `--search` and
//! `--metadata` modes.

mod handlers;

pub use handlers::{get_by_registration, index, list_all, metadata, search_by_product};

use serde_json::Value;

/// Route of the full listing
pub const LIST_PATH: &str = "/api/bpom";

/// Route of the product-name search
pub const SEARCH_PATH: &str = "/api/bpom/search";

/// Route of the store metadata
pub const METADATA_PATH: &str = "/api/bpom/metadata";

/// Query parameter carrying the search term
pub const SEARCH_PARAM: &str = "namaProduk";

/// A handler result: status code plus JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn bad_request(body: Value) -> Self {
        Self { status: 400, body }
    }

    pub fn not_found(body: Value) -> Self {
        Self { status: 404, body }
    }

    /// Returns true for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads the `message` field of the envelope, if present
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    /// Pretty-prints the body the way the store file is written
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body.to_string())
    }
}
