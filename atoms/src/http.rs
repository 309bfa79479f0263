use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::error::AtomError;

/// JSON response with the permissive CORS origin every handler sets.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub fn error_response(err: &AtomError) -> Result<Response<Body>, Error> {
    json_response(err.status(), &serde_json::json!({ "error": err.to_string() }))
}

pub fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn not_found() -> Result<Response<Body>, Error> {
    json_response(StatusCode::NOT_FOUND, &serde_json::json!({"error": "Not found"}))
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({"error": "Method not allowed"}),
    )
}

/// Parse a JSON body, turning malformed input into a 400 instead of a Lambda error.
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AtomError> {
    serde_json::from_slice(body).map_err(|e| AtomError::validation(format!("Invalid request body: {}", e)))
}
