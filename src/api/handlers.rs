//! Endpoint handlers

use crate::api::{ApiResponse, LIST_PATH, METADATA_PATH, SEARCH_PARAM, SEARCH_PATH};
use crate::record::Record;
use crate::storage::Storage;
use serde_json::json;

/// `GET /` - describes the available endpoints
pub fn index() -> ApiResponse {
    ApiResponse::ok(json!({
        "message": "Welcome to the BPOM REST API!",
        "description": "This API provides data about BPOM registered products.",
        "endpoints": {
            "getAllData": {
                "method": "GET",
                "path": LIST_PATH,
                "description": "Retrieve all BPOM data",
            },
            "getByRegistrationNumber": {
                "method": "GET",
                "path": format!("{}/:registrationNumber", LIST_PATH),
                "description": "Retrieve data by registration number",
            },
            "searchByProductName": {
                "method": "GET",
                "path": format!("{}?{}=<query>", SEARCH_PATH, SEARCH_PARAM),
                "description": "Search for data by product name",
            },
            "getMetadata": {
                "method": "GET",
                "path": METADATA_PATH,
                "description": "Retrieve metadata such as last update time",
            },
        },
        "example": {
            "searchByProductName": format!("{}?{}=Paracetamol", SEARCH_PATH, SEARCH_PARAM),
        },
    }))
}

/// `GET /api/bpom` - every stored record, in store order
pub fn list_all(store: &dyn Storage) -> ApiResponse {
    let document = store.read();
    ApiResponse::ok(json!({
        "success": true,
        "message": "Retrieved all BPOM data successfully.",
        "data": document.data,
    }))
}

/// `GET /api/bpom/:registrationNumber` - exact match on the registration number
///
/// # Arguments
///
/// * `store` - The record store
/// * `registration_number` - Number to look up, compared verbatim
///
/// # Returns
///
/// 200 with the record, or 404 when no record has that number
pub fn get_by_registration(store: &dyn Storage, registration_number: &str) -> ApiResponse {
    let document = store.read();
    match document.find(registration_number) {
        Some(record) => ApiResponse::ok(json!({
            "success": true,
            "message": format!("Data found for registration number: {}", registration_number),
            "data": record,
        })),
        None => ApiResponse::not_found(json!({
            "success": false,
            "message": format!("No data found for registration number: {}", registration_number),
        })),
    }
}

/// `GET /api/bpom/search?namaProduk=<q>` - case-insensitive substring search
///
/// A missing or blank query is a 400. Records without a product name never
/// match. No matches is a 404.
pub fn search_by_product(store: &dyn Storage, query: Option<&str>) -> ApiResponse {
    let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        return ApiResponse::bad_request(json!({
            "success": false,
            "message": format!("Query parameter \"{}\" is required.", SEARCH_PARAM),
        }));
    };

    let needle = query.to_lowercase();
    let document = store.read();
    let matches: Vec<&Record> = document
        .data
        .iter()
        .filter(|record| {
            record
                .product_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect();

    if matches.is_empty() {
        ApiResponse::not_found(json!({
            "success": false,
            "message": format!("No products found matching \"{}\".", query),
        }))
    } else {
        ApiResponse::ok(json!({
            "success": true,
            "message": format!("Found {} products matching \"{}\".", matches.len(), query),
            "data": matches,
        }))
    }
}

/// `GET /api/bpom/metadata` - the store's `lastUpdated` stamp
pub fn metadata(store: &dyn Storage) -> ApiResponse {
    let document = store.read();
    ApiResponse::ok(json!({
        "success": true,
        "message": "Retrieved metadata successfully.",
        "metadata": { "lastUpdated": document.last_updated },
    }))
}
