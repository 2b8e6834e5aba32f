use crate::models::Notification;
use actix_csrf::CsrfMiddleware;
use actix_session::{Session, SessionExt, SessionInsertError};
use actix_web::{dev, error::InternalError, http::header, http::Method, FromRequest, HttpRequest, HttpResponse};
use rand::rngs::StdRng;
use serde::Serialize;
use std::future::{ready, Ready};
use url::form_urlencoded;

const SESSION_USER_ID: &str = "user_id";
const SESSION_USERNAME: &str = "username";
const SESSION_NOTIFICATION: &str = "notification";

/// Name of the double-submit cookie written by [`csrf_middleware`].
pub const CSRF_COOKIE_NAME: &str = "Csrf-Token";

/// GET routes that render a form and therefore hand out a CSRF token.
const FORM_PAGES: &[&str] = &[
    "/posts/create/",
    "/posts/{post_id}/",
    "/posts/{post_id}/edit/",
    "/posts/{post_id}/delete/",
    "/posts/{post_id}/comment/",
    "/posts/{post_id}/edit_comment/{comment_id}/",
    "/posts/{post_id}/delete_comment/{comment_id}/",
    "/edit_profile/",
    "/auth/login/",
    "/auth/registration/",
];

/// The logged-in user, as recorded in the session cookie.
///
/// Extracting it from an anonymous request fails with a redirect to the login
/// page, so handlers that take it are login-only. Use
/// `Option<AuthenticatedUser>` where anonymous visitors are welcome.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        if let (Ok(Some(id)), Ok(Some(username))) =
            (session.get::<i64>(SESSION_USER_ID), session.get::<String>(SESSION_USERNAME))
        {
            ready(Ok(AuthenticatedUser { id, username }))
        } else {
            let next = req.uri().path_and_query().map_or(req.path(), |pq| pq.as_str());
            let response = HttpResponse::Found()
                .append_header((header::LOCATION, login_url(next)))
                .finish();
            ready(Err(InternalError::from_response("Login required.", response).into()))
        }
    }
}

pub fn login_url(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login/?next={}", encoded)
}

/// Accepts `next` only when it points back into this site.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
        .map(str::to_string)
}

pub fn start_session(session: &Session, user_id: i64, username: &str) -> Result<(), SessionInsertError> {
    session.renew();
    session.insert(SESSION_USER_ID, user_id)?;
    session.insert(SESSION_USERNAME, username)
}

/// Keeps the session in step after the user renamed themselves.
pub fn refresh_session_username(session: &Session, username: &str) -> Result<(), SessionInsertError> {
    session.insert(SESSION_USERNAME, username)
}

pub fn end_session(session: &Session) {
    session.purge();
}

/// Queues a one-shot message for the next rendered page.
pub fn set_notification(session: &Session, notification: &Notification) -> Result<(), SessionInsertError> {
    session.insert(SESSION_NOTIFICATION, notification)
}

pub fn take_notification(session: &Session) -> Option<Notification> {
    let notification = session.get::<Notification>(SESSION_NOTIFICATION).ok().flatten();
    if notification.is_some() {
        session.remove(SESSION_NOTIFICATION);
    }
    notification
}

pub fn csrf_middleware() -> CsrfMiddleware<StdRng> {
    FORM_PAGES
        .iter()
        .fold(CsrfMiddleware::<StdRng>::new(), |csrf, pattern| csrf.set_cookie(Method::GET, *pattern))
}

/// Double-submit check for forms that cannot go through the `Csrf` extractor
/// (multipart bodies): the submitted token must equal the cookie.
pub fn csrf_token_matches(req: &HttpRequest, submitted: &str) -> bool {
    match req.cookie(CSRF_COOKIE_NAME) {
        Some(cookie) => !submitted.is_empty() && cookie.value() == submitted,
        None => false,
    }
}
