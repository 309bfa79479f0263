use lambda_http::{http::StatusCode, Body, Error, Response};

use super::model::{AdminAllowList, UpdateRolePayload, UpdateUserPayload};
use super::service::{get_user, set_user_role, update_user};
use crate::http::{error_response, json_response, parse_body};
use crate::store::ProfileStore;

/// HTTP Handler: GET /users/me
pub async fn get_user_handler<S>(
    store: &S,
    user_id: &str,
    allow_list: &AdminAllowList,
) -> Result<Response<Body>, Error>
where
    S: ProfileStore + ?Sized,
{
    match get_user(store, user_id, allow_list).await {
        Ok(user) => json_response(StatusCode::OK, &user),
        Err(e) => error_response(&e),
    }
}

/// HTTP Handler: PATCH /users/me
pub async fn update_user_handler<S>(
    store: &S,
    user_id: &str,
    body: &[u8],
    allow_list: &AdminAllowList,
) -> Result<Response<Body>, Error>
where
    S: ProfileStore + ?Sized,
{
    let payload: UpdateUserPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    match update_user(store, user_id, payload, allow_list).await {
        Ok(user) => json_response(StatusCode::OK, &user),
        Err(e) => {
            tracing::error!("❌ update_user_handler failed: user_id={}, error={}", user_id, e);
            error_response(&e)
        }
    }
}

/// HTTP Handler: PATCH /staff/users/{id}
pub async fn set_role_handler<S>(
    store: &S,
    user_id: &str,
    body: &[u8],
    allow_list: &AdminAllowList,
) -> Result<Response<Body>, Error>
where
    S: ProfileStore + ?Sized,
{
    let payload: UpdateRolePayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    match set_user_role(store, user_id, &payload.user_role, allow_list).await {
        Ok(user) => json_response(StatusCode::OK, &user),
        Err(e) => error_response(&e),
    }
}
