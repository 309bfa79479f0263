use lambda_http::{http::StatusCode, Body, Error, Response};

use super::service::{gallery, list_departments};
use crate::http::{error_response, json_response};

/// HTTP Handler: GET /media/departments
pub fn list_departments_handler() -> Result<Response<Body>, Error> {
    json_response(StatusCode::OK, &list_departments())
}

/// HTTP Handler: GET /media/departments/{folder}
pub fn gallery_handler(asset_base_url: &str, folder: &str) -> Result<Response<Body>, Error> {
    match gallery(asset_base_url, folder) {
        Ok(g) => json_response(StatusCode::OK, &g),
        Err(e) => error_response(&e),
    }
}
