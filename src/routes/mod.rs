use crate::error::{BlogError, BlogResult};
use crate::middleware::AuthenticatedUser;
use crate::models::Notification;
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{web, HttpResponse};
use tera::{Context, Tera};

pub mod auth;
pub mod blog;
pub mod pages;

const HTML: &str = "text/html; charset=utf-8";

/// Every page route of the site. Registration order matters where a literal
/// segment competes with a path parameter (`/posts/create/`).
pub fn config_site(cfg: &mut web::ServiceConfig) {
    blog::config_blog(cfg);
    auth::config_auth(cfg);
    pages::config_pages(cfg);
}

/// Context shared by all pages: the viewer and any pending notification.
pub fn base_context(viewer: Option<&AuthenticatedUser>, notification: Option<Notification>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &viewer);
    ctx.insert("notification", &notification);
    ctx
}

pub fn render(tera: &Tera, template: &str, ctx: &Context) -> BlogResult<HttpResponse> {
    render_with_status(tera, template, ctx, StatusCode::OK)
}

pub fn render_with_status(tera: &Tera, template: &str, ctx: &Context, status: StatusCode) -> BlogResult<HttpResponse> {
    let rendered = tera.render(template, ctx)?;
    Ok(HttpResponse::build(status).content_type(HTML).body(rendered))
}

pub fn redirect(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, location.as_ref()))
        .finish()
}

/// Error page rendered from a fixed template. Falls back to plain text if the
/// template itself cannot be rendered.
pub fn error_page(tera: &Tera, template: &str, status: StatusCode) -> HttpResponse {
    match render_with_status(tera, template, &base_context(None, None), status) {
        Ok(response) => response,
        Err(e) => {
            log::error!("Failed to render error page '{}': {}", template, e);
            HttpResponse::build(status)
                .content_type("text/plain; charset=utf-8")
                .body(status.canonical_reason().unwrap_or("Error"))
        }
    }
}

/// Turns the outcome of a page handler into the response sent to the browser.
pub fn respond(tera: &Tera, result: BlogResult<HttpResponse>) -> HttpResponse {
    match result {
        Ok(response) => response,
        Err(BlogError::NotFound) => error_page(tera, "pages/404.html", StatusCode::NOT_FOUND),
        Err(BlogError::PermissionDenied { redirect_to }) => redirect(redirect_to),
        Err(BlogError::BadRequest(message)) => {
            log::warn!("Bad request: {}", message);
            HttpResponse::BadRequest()
                .content_type("text/plain; charset=utf-8")
                .body(message)
        }
        Err(e) => {
            log::error!("Request failed: {}", e);
            error_page(tera, "pages/500.html", StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn replace_with_template<B>(
    res: ServiceResponse<B>,
    template: &str,
    status: StatusCode,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    // Pages already rendered by a handler pass through untouched.
    let is_html = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if is_html {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let tera = res.request().app_data::<web::Data<Tera>>().cloned();
    let (req, _) = res.into_parts();
    let response = match tera {
        Some(tera) => error_page(&tera, template, status),
        None => HttpResponse::build(status).finish(),
    };
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

fn render_csrf_failure<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    log::warn!("CSRF verification failed for {}", res.request().path());
    replace_with_template(res, "pages/403csrf.html", StatusCode::FORBIDDEN)
}

fn render_not_found<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    replace_with_template(res, "pages/404.html", StatusCode::NOT_FOUND)
}

fn render_server_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    replace_with_template(res, "pages/500.html", StatusCode::INTERNAL_SERVER_ERROR)
}

/// Renders the fixed error templates for error responses no page handler
/// rendered itself. The CSRF extractor reports rejected tokens as 403 or 422.
pub fn error_handlers<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::FORBIDDEN, render_csrf_failure)
        .handler(StatusCode::UNPROCESSABLE_ENTITY, render_csrf_failure)
        .handler(StatusCode::NOT_FOUND, render_not_found)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, render_server_error)
}
