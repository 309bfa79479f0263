use std::sync::Arc;

use circulation_block as circulation;
use lambda_http::http::header::{HeaderValue, VARY};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use libris_atoms::http::{error_response, method_not_allowed, not_found};
use libris_atoms::{books, borrows, media, users};
use libris_shared::session::authenticate;
use libris_shared::{auth, AppConfig, AppState, SessionContext};

fn with_cors_headers(mut resp: Response<Body>, config: &AppConfig, request_origin: Option<&str>) -> Response<Body> {
    let cors_origin = auth::get_cors_origin(config, request_origin);

    let headers = resp.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_str(&cors_origin).unwrap_or_else(|_| HeaderValue::from_static("*")),
    );
    if cors_origin != "*" {
        headers.insert("Access-Control-Allow-Credentials", HeaderValue::from_static("true"));
    }
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization,Cookie"),
    );
    headers.append(VARY, HeaderValue::from_static("Origin"));

    resp
}

fn finalize_response(
    resp: Result<Response<Body>, Error>,
    config: &AppConfig,
    request_origin: Option<&str>,
) -> Result<Response<Body>, Error> {
    resp.map(|r| with_cors_headers(r, config, request_origin))
}

/// Main Lambda handler - public routes first, then everything behind a session
pub(crate) async fn function_handler(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    let request_origin = event.headers().get("Origin").and_then(|v| v.to_str().ok());
    tracing::info!("🚀 API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if *method == Method::OPTIONS {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp, &state.config, request_origin));
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Public routes (no token)
    let public = match (method, parts.as_slice()) {
        (&Method::POST, ["login"]) => Some(auth::login(&state, body).await),
        (&Method::POST, ["signup"]) => Some(auth::signup(&state, body).await),
        (&Method::POST, ["password-reset"]) => Some(auth::password_reset(&state, body).await),
        (_, ["login"] | ["signup"] | ["password-reset"]) => Some(method_not_allowed()),
        // GET /categories - the ten classification codes
        (&Method::GET, ["categories"]) => Some(books::list_categories_handler()),
        // GET /media/departments - department galleries
        (&Method::GET, ["media", "departments"]) => Some(media::list_departments_handler()),
        // GET /media/departments/{folder} - image urls of one gallery
        (&Method::GET, ["media", "departments", folder]) => {
            Some(media::gallery_handler(&state.config.asset_base_url, folder))
        }
        _ => None,
    };
    if let Some(resp) = public {
        return finalize_response(resp, &state.config, request_origin);
    }

    // All other routes require a session
    let session = match authenticate(
        state.identity.as_ref(),
        state.ledger.as_ref(),
        &state.config.admin_emails,
        event.headers(),
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("⚠️ rejected {} {}: {}", method, path, e);
            return finalize_response(error_response(&e), &state.config, request_origin);
        }
    };

    let query = |name: &str| {
        event
            .query_string_parameters_ref()
            .and_then(|params| params.first(name))
            .map(str::to_string)
    };

    let resp = route(&state, method, parts.as_slice(), body, session, query).await;
    finalize_response(resp, &state.config, request_origin)
}

async fn route<Q>(
    state: &AppState,
    method: &Method,
    parts: &[&str],
    body: &[u8],
    session: SessionContext,
    query: Q,
) -> Result<Response<Body>, Error>
where
    Q: Fn(&str) -> Option<String>,
{
    let ledger = state.ledger.as_ref();
    let blobs = state.blobs.as_ref();
    let allow_list = &state.config.admin_emails;
    let user_id = session.user_id.as_str();

    match (method, parts) {
        // --- SESSION ---
        (&Method::POST, ["logout"]) => auth::logout(state, session.clone()).await,

        // --- PROFILE ---
        (&Method::GET, ["users", "me"]) => users::get_user_handler(ledger, user_id, allow_list).await,
        (&Method::PATCH, ["users", "me"]) => users::update_user_handler(ledger, user_id, body, allow_list).await,

        // --- BOOKS ---
        // GET /books?category= - list books, optionally one category
        (&Method::GET, ["books"]) => {
            let category = query("category");
            books::list_books_handler(ledger, category.as_deref()).await
        }
        (&Method::POST, ["books"]) => match session.require_staff() {
            Ok(()) => books::create_book_handler(ledger, body).await,
            Err(e) => denied(&session, &e),
        },
        (&Method::PATCH, ["books", book_id, "stock"]) => match session.require_staff() {
            Ok(()) => books::adjust_stock_handler(ledger, book_id, body).await,
            Err(e) => denied(&session, &e),
        },
        (&Method::DELETE, ["books", book_id]) => match session.require_staff() {
            Ok(()) => books::delete_book_handler(ledger, book_id).await,
            Err(e) => denied(&session, &e),
        },

        // --- BORROWS ---
        (&Method::GET, ["borrows"]) => borrows::list_borrows_handler(ledger, user_id).await,
        (&Method::POST, ["borrows"]) => circulation::borrow_handler(ledger, blobs, user_id, body).await,
        // POST /borrows/return - legacy name + date key
        (&Method::POST, ["borrows", "return"]) => {
            circulation::legacy_return_handler(ledger, blobs, user_id, body).await
        }
        (&Method::POST, ["borrows", entry_id, "return"]) => {
            circulation::return_handler(ledger, blobs, user_id, entry_id, body).await
        }

        // --- STAFF DASHBOARD ---
        (&Method::GET, ["staff", "users"]) => match session.require_staff() {
            Ok(()) => circulation::list_users_handler(ledger, allow_list).await,
            Err(e) => denied(&session, &e),
        },
        (&Method::PATCH, ["staff", "users", target_id]) => match session.require_admin() {
            Ok(()) => users::set_role_handler(ledger, target_id, body, allow_list).await,
            Err(e) => denied(&session, &e),
        },
        (&Method::GET, ["staff", "borrows"]) => match session.require_staff() {
            Ok(()) => {
                let (search, level, status) = (query("search"), query("level"), query("status"));
                circulation::list_all_borrows_handler(ledger, search.as_deref(), level.as_deref(), status.as_deref())
                    .await
            }
            Err(e) => denied(&session, &e),
        },
        (&Method::GET, ["staff", "inventory"]) => match session.require_staff() {
            Ok(()) => circulation::inventory_handler(ledger).await,
            Err(e) => denied(&session, &e),
        },

        _ => not_found(),
    }
}

fn denied(session: &SessionContext, err: &libris_atoms::AtomError) -> Result<Response<Body>, Error> {
    tracing::warn!(user_id = %session.user_id, role = %session.role, "🚫 {}", err);
    error_response(err)
}
