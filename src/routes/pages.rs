use crate::middleware::AuthenticatedUser;
use crate::routes::{base_context, render, render_with_status, respond};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use tera::Tera;

pub fn config_pages(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/pages")
            .route("/about/", web::get().to(about))
            .route("/rules/", web::get().to(rules)),
    );
}

async fn about(tera: web::Data<Tera>, viewer: Option<AuthenticatedUser>) -> HttpResponse {
    respond(&tera, render(&tera, "pages/about.html", &base_context(viewer.as_ref(), None)))
}

async fn rules(tera: web::Data<Tera>, viewer: Option<AuthenticatedUser>) -> HttpResponse {
    respond(&tera, render(&tera, "pages/rules.html", &base_context(viewer.as_ref(), None)))
}

/// Fallback for every path no route matched.
pub async fn page_not_found(tera: web::Data<Tera>, viewer: Option<AuthenticatedUser>) -> HttpResponse {
    let ctx = base_context(viewer.as_ref(), None);
    respond(&tera, render_with_status(&tera, "pages/404.html", &ctx, StatusCode::NOT_FOUND))
}
