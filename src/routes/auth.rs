use crate::error::BlogResult;
use crate::helper::blog_helpers::{self, get_conn};
use crate::helper::form_helpers::{
    add_error, collect_errors, FormErrors, LoginForm, LoginSubmission, RegistrationForm, RegistrationSubmission,
    Submission,
};
use crate::middleware::{self, AuthenticatedUser};
use crate::models::db_operations::users_db_operations;
use crate::models::Notification;
use crate::routes::{base_context, redirect, render, respond};
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tera::Tera;
use validator::Validate;

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/registration/", web::get().to(show_registration_form))
            .route("/registration/", web::post().to(handle_registration))
            .route("/login/", web::get().to(show_login_form))
            .route("/login/", web::post().to(handle_login))
            .route("/logout/", web::get().to(handle_logout)),
    );
}

// --- Registration ---

fn render_registration(
    tera: &Tera,
    form: &RegistrationForm,
    errors: &FormErrors,
    csrf_token: &str,
) -> BlogResult<HttpResponse> {
    let mut ctx = base_context(None, None);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "registration/registration_form.html", &ctx)
}

async fn show_registration_form(tera: web::Data<Tera>, viewer: Option<AuthenticatedUser>, token: CsrfToken) -> HttpResponse {
    if let Some(viewer) = viewer {
        return redirect(format!("/profile/{}/", viewer.username));
    }
    let result = render_registration(&tera, &RegistrationForm::default(), &FormErrors::new(), token.get());
    respond(&tera, result)
}

async fn handle_registration(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    session: Session,
    form: Csrf<web::Form<RegistrationSubmission>>,
) -> HttpResponse {
    let (csrf_token, form) = form.into_inner().into_inner().into_form();
    let result = get_conn(&pool).and_then(|conn| match blog_helpers::register_user(&conn, &form)? {
        Submission::Saved(_) => {
            middleware::set_notification(
                &session,
                &Notification {
                    message: "Your account has been created. You can log in now.".to_string(),
                    r#type: "success".to_string(),
                },
            )?;
            Ok(redirect("/auth/login/"))
        }
        Submission::Rejected(errors) => render_registration(&tera, &form, &errors, &csrf_token),
    });
    respond(&tera, result)
}

// --- Login and logout ---

fn render_login(
    tera: &Tera,
    session: &Session,
    form: &LoginForm,
    errors: &FormErrors,
    next: Option<&str>,
    csrf_token: &str,
) -> BlogResult<HttpResponse> {
    let mut ctx = base_context(None, middleware::take_notification(session));
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("next", &next);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "registration/login.html", &ctx)
}

async fn show_login_form(
    tera: web::Data<Tera>,
    session: Session,
    viewer: Option<AuthenticatedUser>,
    query: web::Query<NextQuery>,
    token: CsrfToken,
) -> HttpResponse {
    let next = middleware::safe_next(query.next.as_deref());
    if let Some(viewer) = viewer {
        log::debug!("User '{}' is already logged in", viewer.username);
        return redirect(next.unwrap_or_else(|| "/".to_string()));
    }
    let result = render_login(&tera, &session, &LoginForm::default(), &FormErrors::new(), next.as_deref(), token.get());
    respond(&tera, result)
}

async fn handle_login(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    session: Session,
    form: Csrf<web::Form<LoginSubmission>>,
) -> HttpResponse {
    let (csrf_token, form, next) = form.into_inner().into_inner().into_form();
    let next = middleware::safe_next(next.as_deref());

    let result = get_conn(&pool).and_then(|conn| {
        if let Err(e) = form.validate() {
            let errors = collect_errors(&e);
            return render_login(&tera, &session, &form, &errors, next.as_deref(), &csrf_token);
        }

        match users_db_operations::verify_credentials(&conn, &form.username, &form.password)? {
            Some((user_id, username)) => {
                middleware::start_session(&session, user_id, &username)?;
                if let Err(e) = users_db_operations::update_last_login_time(&conn, user_id) {
                    log::error!("Failed to record login time for user {}: {}", user_id, e);
                }
                log::info!("User '{}' logged in", username);
                Ok(redirect(next.clone().unwrap_or_else(|| "/".to_string())))
            }
            None => {
                log::warn!("Failed login attempt for username '{}'", form.username);
                let mut errors = FormErrors::new();
                add_error(
                    &mut errors,
                    "__all__",
                    "Please enter a correct username and password. Note that both fields may be case-sensitive.",
                );
                render_login(&tera, &session, &form, &errors, next.as_deref(), &csrf_token)
            }
        }
    });
    respond(&tera, result)
}

async fn handle_logout(session: Session, viewer: Option<AuthenticatedUser>) -> HttpResponse {
    if let Some(viewer) = &viewer {
        log::info!("User '{}' logged out", viewer.username);
    }
    middleware::end_session(&session);
    redirect("/")
}
