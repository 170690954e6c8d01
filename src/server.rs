use std::sync::Arc;
use std::{fs, io};

use ntex::http::{header, ResponseBuilder, StatusCode};
use ntex::util::Bytes;
use ntex::web;
use ntex::web::HttpRequest;
use ntex_files::NamedFile;
use serde::{Deserialize, Serialize};
use spdlog::{error, info, warn};

use crate::auth::AccessGate;
use crate::config::Config;
use crate::cookie::{expired_session_cookie, find_cookie, session_cookie};
use crate::error::{PublishError, Result};
use crate::page_id::PageId;
use crate::page_store::PageStore;
use crate::publisher::{publish, Upload, UploadRequest, UploadResponse};
use crate::session::{SessionAuthenticator, SessionKeys, SESSION_COOKIE};
use crate::view::Views;

/// Everything a handler needs. Built once at startup and shared read-only.
pub struct AppContext {
    pub gate: AccessGate,
    pub store: PageStore,
    pub views: Views,
}

type State = web::types::State<Arc<AppContext>>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LoginForm {
    username: String,
    password: String,
}

impl AppContext {
    pub fn new(gate: AccessGate, store: PageStore, views: Views) -> AppContext {
        AppContext { gate, store, views }
    }

    pub fn from_config(config: &Config) -> Result<AppContext> {
        let keys = match config.auth.session_key_file {
            Some(ref key_file) => SessionKeys::load_or_generate(key_file)?,
            None => SessionKeys::generate()?,
        };
        let gate = AccessGate::new(config.credentials(), SessionAuthenticator::new(keys));
        let store = PageStore::open(&config.paths.storage_dir)?;

        Ok(Self::new(gate, store, Views::load()?))
    }
}

fn session_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get_all(header::COOKIE)
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookies| find_cookie(cookies, SESSION_COOKIE).map(str::to_string))
}

fn redirect(location: &str) -> web::HttpResponse {
    web::HttpResponse::Found()
        .header(header::LOCATION, location)
        .finish()
}

// Some(response) when the caller has to log in first.
fn require_login(req: &HttpRequest, ctx: &AppContext) -> Option<web::HttpResponse> {
    let token = session_token(req);
    if ctx.gate.is_open(token.as_deref()) {
        None
    } else {
        Some(redirect("/login"))
    }
}

fn error_response(err: &PublishError, failure: &str) -> web::HttpResponse {
    if !err.is_client_error() {
        error!("{}: {}", failure, err);
        return web::HttpResponse::InternalServerError().json(&ErrorBody { error: failure });
    }

    let mut builder = match err {
        PublishError::NotFound(_) => web::HttpResponse::NotFound(),
        PublishError::Auth => web::HttpResponse::Unauthorized(),
        _ => web::HttpResponse::BadRequest(),
    };
    builder.json(&ErrorBody { error: &err.to_string() })
}

fn html_response(mut builder: ResponseBuilder, body: String) -> web::HttpResponse {
    builder.content_type("text/html; charset=utf-8").body(body)
}

#[web::get("/login")]
async fn login_page(state: State) -> web::HttpResponse {
    html_response(web::HttpResponse::Ok(), state.views.login(None))
}

#[web::post("/login")]
async fn login(body: Bytes, state: State) -> web::HttpResponse {
    let form: LoginForm = serde_urlencoded::from_bytes(&body).unwrap_or_default();

    match state.gate.login(&form.username, &form.password) {
        Ok(token) => web::HttpResponse::Found()
            .header(header::SET_COOKIE, session_cookie(&token))
            .header(header::LOCATION, "/")
            .finish(),
        Err(PublishError::Auth) => {
            warn!("Failed login attempt for user {:?}", form.username);
            html_response(web::HttpResponse::Unauthorized(), state.views.login(Some("Invalid username or password")))
        }
        Err(e) => {
            error!("Failed to create session: {}", e);
            html_response(web::HttpResponse::InternalServerError(), state.views.login(Some("Failed to create session")))
        }
    }
}

#[web::get("/logout")]
async fn logout() -> web::HttpResponse {
    web::HttpResponse::Found()
        .header(header::SET_COOKIE, expired_session_cookie())
        .header(header::LOCATION, "/login")
        .finish()
}

#[web::get("/")]
async fn index(req: HttpRequest, state: State) -> web::HttpResponse {
    if let Some(to_login) = require_login(&req, &state) {
        return to_login;
    }
    html_response(web::HttpResponse::Ok(), state.views.panel(state.gate.credentials().is_enabled()))
}

#[web::post("/api/upload")]
async fn upload(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if let Some(to_login) = require_login(&req, &state) {
        return to_login;
    }

    let checked = match serde_json::from_slice::<UploadRequest>(&body)
        .map_err(|e| PublishError::Validation(e.to_string()))
        .and_then(Upload::try_from)
    {
        Ok(checked) => checked,
        Err(e) => return error_response(&e, "Failed to publish page"),
    };

    match publish(&state.store, &checked).await {
        Ok(id) => web::HttpResponse::Ok().json(&UploadResponse { url: id.url() }),
        Err(e) => error_response(&e, "Failed to publish page"),
    }
}

#[web::get("/api/pages")]
async fn list_pages(req: HttpRequest, state: State) -> web::HttpResponse {
    if let Some(to_login) = require_login(&req, &state) {
        return to_login;
    }

    match state.store.list() {
        Ok(pages) => web::HttpResponse::Ok().json(&pages),
        Err(e) => error_response(&e, "Could not list pages"),
    }
}

#[web::delete("/api/pages/{id}")]
async fn delete_page(req: HttpRequest, id: web::types::Path<String>, state: State) -> web::HttpResponse {
    if let Some(to_login) = require_login(&req, &state) {
        return to_login;
    }

    let id = id.into_inner();
    match state.store.delete(&id) {
        Ok(()) => {
            info!("Deleted page {}", id);
            web::HttpResponse::Ok().json(&MessageBody { message: "Page deleted successfully" })
        }
        Err(e) => error_response(&e, "Failed to delete page"),
    }
}

#[web::get("/api/pages/{id}/source")]
async fn download_source(req: HttpRequest, id: web::types::Path<String>, state: State) -> web::HttpResponse {
    if let Some(to_login) = require_login(&req, &state) {
        return to_login;
    }

    let id = id.into_inner();
    let source = state.store.source_path(&id).and_then(|path| {
        fs::read(&path).map_err(|e| PublishError::io("failed to read source file", path, e))
    });
    match source {
        Ok(bytes) => web::HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .header(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}_source.txt\"", id))
            .body(bytes),
        Err(e) => error_response(&e, "Failed to read page source"),
    }
}

// Begin: Published pages --------
// Only something that could be a page is redirected. `/favicon.ico` and
// friends get the 404 view.
#[web::get("/{id}")]
async fn page_wo_slash(id: web::types::Path<String>, state: State) -> web::HttpResponse {
    match PageId::parse(&id) {
        Ok(id) => web::HttpResponse::TemporaryRedirect()
            .header(header::LOCATION, id.url())
            .finish(),
        Err(_) => html_response(web::HttpResponse::NotFound(), state.views.not_found()),
    }
}

/// Failure serving a published page. Missing pages get the 404 view.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct PageError(#[from] PublishError);

impl web::WebResponseError for PageError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            PublishError::Validation(_) => StatusCode::BAD_REQUEST,
            PublishError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self, req: &HttpRequest) -> web::HttpResponse {
        let status = self.status_code();
        match req.app_state::<Arc<AppContext>>() {
            Some(ctx) if status == StatusCode::NOT_FOUND => {
                html_response(web::HttpResponse::build(status), ctx.views.not_found())
            }
            _ => error_response(&self.0, "Failed to serve page"),
        }
    }
}

#[web::get("/{id}/")]
async fn page(id: web::types::Path<String>, state: State) -> std::result::Result<NamedFile, PageError> {
    let path = state.store.rendered_path(&id)?;
    NamedFile::open(&path)
        .map_err(|e| PageError(PublishError::io("failed to open page", path, e)))
}
// End: Published pages --------

async fn not_found(state: State) -> web::HttpResponse {
    html_response(web::HttpResponse::NotFound(), state.views.not_found())
}

/// Registers every route. `/{id}` comes last so it never shadows the fixed
/// paths.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(login_page)
        .service(login)
        .service(logout)
        .service(index)
        .service(upload)
        .service(list_pages)
        .service(delete_page)
        .service(download_source)
        .service(page)
        .service(page_wo_slash);
}

fn check_storage(ctx: &AppContext, prune: bool) -> Result<()> {
    if prune {
        ctx.store.prune_incomplete()?;
        return Ok(());
    }
    for id in ctx.store.find_incomplete()? {
        warn!("Page {} is incomplete. Set store.prune_incomplete to remove it", id);
    }
    Ok(())
}

pub async fn server_run(config: Config) -> io::Result<()> {
    let ctx = AppContext::from_config(&config).map_err(io::Error::other)?;
    check_storage(&ctx, config.store.prune_incomplete).map_err(io::Error::other)?;

    if ctx.gate.credentials().is_enabled() {
        info!("Authentication enabled");
    } else {
        warn!("No credentials configured, the publishing panel is open to anyone");
    }
    info!("Serving pages from {}", ctx.store.root_dir().display());

    let ctx = Arc::new(ctx);
    let max_upload_bytes = config.server.max_upload_bytes;

    web::HttpServer::new(move || {
        web::App::new()
            .state(ctx.clone())
            .state(web::types::PayloadConfig::new(max_upload_bytes))
            .configure(configure)
            .default_service(web::route().to(not_found))
    })
        .bind((config.server.address.as_str(), config.server.port))?
        .run()
        .await
}
