mod common;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use blogicum::config::{Config, WebConfig};
use blogicum::middleware::csrf_middleware;
use blogicum::models::db_operations::posts_db_operations;
use blogicum::{routes, DbPool};
use chrono::{Duration, Utc};
use common::*;
use tera::Tera;

fn test_config() -> Config {
    Config {
        web: WebConfig { host: "127.0.0.1".into(), port: 8000 },
        database_path: "/tmp/blogicum-test".into(),
        media_path: std::env::temp_dir().join("blogicum-test-media").display().to_string(),
        log_level: "debug".into(),
        session_secret_key: String::new(),
        use_secure_cookies: false,
        max_image_upload_mb: 1,
    }
}

macro_rules! blog_app {
    ($pool:expr) => {
        test::init_service(
            App::new()
                .wrap(routes::error_handlers())
                .app_data(web::Data::new(Tera::new("templates/**/*.html").unwrap()))
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new($pool.clone()))
                .service(
                    web::scope("")
                        .wrap(csrf_middleware())
                        .wrap(SessionMiddleware::new(CookieSessionStore::default(), Key::generate()))
                        .configure(routes::config_site)
                        .default_service(web::to(routes::pages::page_not_found)),
                ),
        )
        .await
    };
}

/// Fetches the login page, posts the credentials with its CSRF token and
/// returns (CSRF cookie, session cookie).
macro_rules! log_in {
    ($app:expr, $username:expr, $password:expr) => {{
        let resp = test::call_service(&$app, test::TestRequest::get().uri("/auth/login/").to_request()).await;
        let csrf_cookie: Cookie<'static> = resp
            .response()
            .cookies()
            .next()
            .map(|c| c.into_owned())
            .expect("login page sets the CSRF cookie");
        let req = test::TestRequest::post()
            .uri("/auth/login/")
            .cookie(csrf_cookie.clone())
            .set_form([("csrf_token", csrf_cookie.value()), ("username", $username), ("password", $password)])
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "login as {}", $username);
        let session_cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() != csrf_cookie.name())
            .map(|c| c.into_owned())
            .expect("login sets the session cookie");
        (csrf_cookie, session_cookie)
    }};
}

/// Seeds a small blog and returns (public post id, unpublished post id).
/// Both posts belong to anna; boris has no posts.
fn seed(pool: &DbPool) -> (i64, i64) {
    let conn = pool.get().unwrap();
    let anna = add_user_with_password(&conn, "anna", "correct horse");
    add_user_with_password(&conn, "boris", "battery staple");
    let travel = add_category(&conn, "travel", true);
    add_category(&conn, "secret", false);
    let today = Utc::now() - Duration::hours(1);
    let public = add_post(&conn, &anna, NewPost::published("Alps", today).in_category(travel));
    let draft = add_post(&conn, &anna, NewPost::published("Draft", today).hidden());
    (public, draft)
}

fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_web::test]
async fn public_pages_render() {
    let pool = memory_pool();
    let (public, _) = seed(&pool);
    let app = blog_app!(pool);

    for path in ["/", "/?page=99", "/?page=abc", "/pages/about/", "/pages/rules/", "/profile/anna/"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(path).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {}", path);
    }

    let resp = test::call_service(&app, test::TestRequest::get().uri(&format!("/posts/{}/", public)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("Alps"));
}

#[actix_web::test]
async fn hidden_content_answers_not_found() {
    let pool = memory_pool();
    let (_, draft) = seed(&pool);
    let app = blog_app!(pool);

    let paths = vec![
        format!("/posts/{}/", draft),
        "/posts/9999/".to_string(),
        "/posts/not-a-number/".to_string(),
        "/category/secret/".to_string(),
        "/profile/nobody/".to_string(),
        "/no/such/page/".to_string(),
    ];
    for path in paths {
        let resp = test::call_service(&app, test::TestRequest::get().uri(&path).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "GET {}", path);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("Page not found"), "GET {}", path);
    }
}

#[actix_web::test]
async fn login_only_pages_redirect_anonymous_visitors() {
    let pool = memory_pool();
    let (public, _) = seed(&pool);
    let app = blog_app!(pool);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/posts/create/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=%2Fposts%2Fcreate%2F");

    let edit = format!("/posts/{}/edit/", public);
    let resp = test::call_service(&app, test::TestRequest::get().uri(&edit).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).starts_with("/auth/login/?next="));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/edit_profile/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[actix_web::test]
async fn login_with_csrf_token_starts_a_session() {
    let pool = memory_pool();
    let (_, draft) = seed(&pool);
    let app = blog_app!(pool);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/auth/login/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let csrf_cookie: Cookie<'static> = resp
        .response()
        .cookies()
        .next()
        .map(|c| c.into_owned())
        .expect("login page sets the CSRF cookie");

    let bad = test::TestRequest::post()
        .uri("/auth/login/")
        .cookie(csrf_cookie.clone())
        .set_form([("csrf_token", csrf_cookie.value()), ("username", "anna"), ("password", "wrong password")])
        .to_request();
    let resp = test::call_service(&app, bad).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("Please enter a correct username and password"));

    let next = format!("/posts/{}/", draft);
    let good = test::TestRequest::post()
        .uri("/auth/login/")
        .cookie(csrf_cookie.clone())
        .set_form([
            ("csrf_token", csrf_cookie.value()),
            ("username", "anna"),
            ("password", "correct horse"),
            ("next", next.as_str()),
        ])
        .to_request();
    let resp = test::call_service(&app, good).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), next);
    let session_cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() != csrf_cookie.name())
        .map(|c| c.into_owned())
        .expect("login sets the session cookie");

    // The author now reaches their own unpublished post.
    let resp = test::call_service(&app, test::TestRequest::get().uri(&next).cookie(session_cookie).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}

#[actix_web::test]
async fn non_owner_edit_redirects_to_the_post_and_changes_nothing() {
    let pool = memory_pool();
    let (public, _) = seed(&pool);
    let app = blog_app!(pool);
    let (csrf_cookie, session_cookie) = log_in!(app, "boris", "battery staple");

    let boundary = "blogicum-boundary";
    let body = multipart_body(
        boundary,
        &[
            ("csrf_token", csrf_cookie.value()),
            ("title", "Boris was here"),
            ("text", "Overwritten"),
            ("pub_date", "2024-01-01T10:00"),
            ("is_published", "on"),
        ],
    );
    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/edit/", public))
        .cookie(csrf_cookie.clone())
        .cookie(session_cookie)
        .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", public));

    let conn = pool.get().unwrap();
    let post = posts_db_operations::read_post(&conn, public).unwrap().unwrap();
    assert_eq!(post.title, "Alps");
    assert_eq!(post.text, "Text of Alps");
}

#[actix_web::test]
async fn form_post_without_token_is_rejected() {
    let pool = memory_pool();
    seed(&pool);
    let app = blog_app!(pool);

    let req = test::TestRequest::post()
        .uri("/auth/login/")
        .set_form([("username", "anna"), ("password", "correct horse")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
    assert_ne!(resp.status(), StatusCode::FOUND);
}
