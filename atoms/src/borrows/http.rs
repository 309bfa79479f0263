use lambda_http::{http::StatusCode, Body, Error, Response};

use super::service::list_borrows;
use crate::http::{error_response, json_response};
use crate::store::ProfileStore;

/// HTTP Handler: GET /borrows
pub async fn list_borrows_handler<S>(store: &S, user_id: &str) -> Result<Response<Body>, Error>
where
    S: ProfileStore + ?Sized,
{
    match list_borrows(store, user_id).await {
        Ok(borrows) => json_response(StatusCode::OK, &borrows),
        Err(e) => {
            tracing::error!("❌ list_borrows_handler failed: user_id={}, error={}", user_id, e);
            error_response(&e)
        }
    }
}
