use crate::config::Config;
use crate::error::{BlogError, BlogResult};
use crate::helper::blog_helpers::{self, get_conn};
use crate::helper::form_helpers::{
    self, add_error, CommentForm, CommentSubmission, ConfirmSubmission, FormErrors, PostForm, Submission, UserForm,
    UserSubmission,
};
use crate::helper::{authorization, media_helpers};
use crate::middleware::{self, AuthenticatedUser};
use crate::models::{Comment, Notification, Post, PostAction};
use crate::routes::{base_context, error_page, redirect, render, respond};
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;
use tera::{Context, Tera};

#[derive(Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

#[derive(Deserialize)]
struct PostPath {
    post_id: i64,
}

#[derive(Deserialize)]
struct CommentPath {
    post_id: i64,
    comment_id: i64,
}

pub fn config_blog(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        // Registered before `/posts/{post_id}/` so "create" is not read as an id.
        .route("/posts/create/", web::get().to(show_create_post))
        .route("/posts/create/", web::post().to(handle_create_post))
        .route("/posts/{post_id}/", web::get().to(post_detail))
        .route("/posts/{post_id}/edit/", web::get().to(show_edit_post))
        .route("/posts/{post_id}/edit/", web::post().to(handle_edit_post))
        .route("/posts/{post_id}/delete/", web::get().to(show_delete_post))
        .route("/posts/{post_id}/delete/", web::post().to(handle_delete_post))
        .route("/posts/{post_id}/comment/", web::get().to(show_add_comment))
        .route("/posts/{post_id}/comment/", web::post().to(handle_add_comment))
        .route("/posts/{post_id}/edit_comment/{comment_id}/", web::get().to(show_edit_comment))
        .route("/posts/{post_id}/edit_comment/{comment_id}/", web::post().to(handle_edit_comment))
        .route("/posts/{post_id}/delete_comment/{comment_id}/", web::get().to(show_delete_comment))
        .route("/posts/{post_id}/delete_comment/{comment_id}/", web::post().to(handle_delete_comment))
        .route("/category/{category_slug}/", web::get().to(category_posts))
        .route("/profile/{username}/", web::get().to(profile))
        .route("/edit_profile/", web::get().to(show_edit_profile))
        .route("/edit_profile/", web::post().to(handle_edit_profile));
}

// --- Listings ---

async fn index(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: Option<AuthenticatedUser>,
    session: Session,
    query: web::Query<PageQuery>,
) -> HttpResponse {
    let result = (|| -> BlogResult<HttpResponse> {
        let conn = get_conn(&pool)?;
        let page = blog_helpers::list_public_posts(&conn, Utc::now(), query.page.as_deref())?;
        let mut ctx = base_context(viewer.as_ref(), middleware::take_notification(&session));
        ctx.insert("page_obj", &page);
        render(&tera, "blog/index.html", &ctx)
    })();
    respond(&tera, result)
}

async fn category_posts(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: Option<AuthenticatedUser>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> HttpResponse {
    let result = (|| -> BlogResult<HttpResponse> {
        let conn = get_conn(&pool)?;
        let (category, page) = blog_helpers::list_category_posts(&conn, &slug, Utc::now(), query.page.as_deref())?;
        let mut ctx = base_context(viewer.as_ref(), None);
        ctx.insert("category", &category);
        ctx.insert("page_obj", &page);
        render(&tera, "blog/category.html", &ctx)
    })();
    respond(&tera, result)
}

async fn profile(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: Option<AuthenticatedUser>,
    session: Session,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> HttpResponse {
    let result = (|| -> BlogResult<HttpResponse> {
        let conn = get_conn(&pool)?;
        let (profile, page) =
            blog_helpers::list_profile_posts(&conn, &username, viewer.as_ref(), Utc::now(), query.page.as_deref())?;
        let mut ctx = base_context(viewer.as_ref(), middleware::take_notification(&session));
        ctx.insert("profile", &profile);
        ctx.insert("full_name", &profile.full_name());
        ctx.insert("page_obj", &page);
        render(&tera, "blog/profile.html", &ctx)
    })();
    respond(&tera, result)
}

// --- Post detail ---

fn render_detail(
    tera: &Tera,
    conn: &Connection,
    viewer: Option<&AuthenticatedUser>,
    post_id: i64,
    csrf_token: &str,
) -> BlogResult<HttpResponse> {
    let (post, comments) = blog_helpers::get_post_detail(conn, post_id, viewer)?;
    let mut ctx = base_context(viewer, None);
    ctx.insert("post", &post);
    ctx.insert("comments", &comments);
    ctx.insert("form", &CommentForm::default());
    ctx.insert("errors", &FormErrors::new());
    ctx.insert("csrf_token", csrf_token);
    render(tera, "blog/detail.html", &ctx)
}

async fn post_detail(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: Option<AuthenticatedUser>,
    path: web::Path<PostPath>,
    token: CsrfToken,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| render_detail(&tera, &conn, viewer.as_ref(), path.post_id, token.get()));
    respond(&tera, result)
}

// --- Create, edit and delete posts ---

enum PostPage<'a> {
    Create,
    Edit(&'a Post),
    Delete(&'a Post),
}

fn render_post_form(
    tera: &Tera,
    conn: &Connection,
    viewer: &AuthenticatedUser,
    page: PostPage<'_>,
    form: &PostForm,
    errors: &FormErrors,
    csrf_token: &str,
) -> BlogResult<HttpResponse> {
    let (categories, locations) = blog_helpers::post_form_choices(conn)?;
    let mut ctx = base_context(Some(viewer), None);
    match page {
        PostPage::Create => ctx.insert("mode", "create"),
        PostPage::Edit(post) => {
            ctx.insert("mode", "edit");
            ctx.insert("post", post);
        }
        PostPage::Delete(post) => {
            ctx.insert("mode", "delete");
            ctx.insert("post", post);
        }
    }
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("categories", &categories);
    ctx.insert("locations", &locations);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "blog/create.html", &ctx)
}

async fn show_create_post(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    token: CsrfToken,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| {
        let form = PostForm::new_post(Utc::now());
        render_post_form(&tera, &conn, &viewer, PostPage::Create, &form, &FormErrors::new(), token.get())
    });
    respond(&tera, result)
}

fn csrf_rejected(tera: &Tera, req: &HttpRequest) -> HttpResponse {
    log::warn!("CSRF verification failed for {}", req.path());
    error_page(tera, "pages/403csrf.html", StatusCode::FORBIDDEN)
}

async fn handle_create_post(
    req: HttpRequest,
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    viewer: AuthenticatedUser,
    payload: Multipart,
) -> HttpResponse {
    let result = create_post(&req, &tera, &pool, &config, &viewer, payload).await;
    respond(&tera, result)
}

async fn create_post(
    req: &HttpRequest,
    tera: &Tera,
    pool: &DbPool,
    config: &Config,
    viewer: &AuthenticatedUser,
    payload: Multipart,
) -> BlogResult<HttpResponse> {
    let submission = form_helpers::read_post_submission(payload, config.max_image_bytes()).await?;
    if !middleware::csrf_token_matches(req, &submission.csrf_token) {
        return Ok(csrf_rejected(tera, req));
    }
    let mut form = submission.form;

    let conn = get_conn(pool)?;
    let errors = blog_helpers::validate_post_form(&conn, &form, submission.errors)?;
    if !errors.is_empty() {
        return render_post_form(tera, &conn, viewer, PostPage::Create, &form, &errors, &submission.csrf_token);
    }

    let media_root = Path::new(&config.media_path);
    let image = match form.upload.take() {
        Some(upload) => Some(media_helpers::save_post_image(media_root, upload).await?),
        None => None,
    };
    let stored = form
        .to_draft(image.clone())
        .ok_or_else(|| BlogError::BadRequest("Invalid publication date.".to_string()))
        .and_then(|draft| blog_helpers::create_post(&conn, viewer, &draft));
    media_helpers::discard_image_on_error(media_root, image.as_deref(), stored).await?;
    Ok(redirect(format!("/profile/{}/", viewer.username)))
}

async fn show_edit_post(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<PostPath>,
    token: CsrfToken,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| {
        let post = blog_helpers::load_post_for(&conn, &viewer, path.post_id, PostAction::Edit)?;
        let form = PostForm::from(&post);
        render_post_form(&tera, &conn, &viewer, PostPage::Edit(&post), &form, &FormErrors::new(), token.get())
    });
    respond(&tera, result)
}

async fn handle_edit_post(
    req: HttpRequest,
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    viewer: AuthenticatedUser,
    path: web::Path<PostPath>,
    payload: Multipart,
) -> HttpResponse {
    let result = edit_post(&req, &tera, &pool, &config, &viewer, path.post_id, payload).await;
    respond(&tera, result)
}

async fn edit_post(
    req: &HttpRequest,
    tera: &Tera,
    pool: &DbPool,
    config: &Config,
    viewer: &AuthenticatedUser,
    post_id: i64,
    payload: Multipart,
) -> BlogResult<HttpResponse> {
    // Ownership is settled before the body is read.
    let post = {
        let conn = get_conn(pool)?;
        blog_helpers::load_post_for(&conn, viewer, post_id, PostAction::Edit)?
    };

    let submission = form_helpers::read_post_submission(payload, config.max_image_bytes()).await?;
    if !middleware::csrf_token_matches(req, &submission.csrf_token) {
        return Ok(csrf_rejected(tera, req));
    }
    let mut form = submission.form;
    form.image = post.image.clone();

    let conn = get_conn(pool)?;
    let mut errors = blog_helpers::validate_post_form(&conn, &form, submission.errors)?;
    if form.upload.is_some() && form.clear_image {
        add_error(&mut errors, "image", "Please either submit a file or check the clear checkbox, not both.");
    }
    if !errors.is_empty() {
        return render_post_form(tera, &conn, viewer, PostPage::Edit(&post), &form, &errors, &submission.csrf_token);
    }

    let media_root = Path::new(&config.media_path);
    let uploaded = match form.upload.take() {
        Some(upload) => Some(media_helpers::save_post_image(media_root, upload).await?),
        None => None,
    };
    let image = match &uploaded {
        Some(_) => uploaded.clone(),
        None if form.clear_image => None,
        None => post.image.clone(),
    };
    let stored = form
        .to_draft(image.clone())
        .ok_or_else(|| BlogError::BadRequest("Invalid publication date.".to_string()))
        .and_then(|draft| blog_helpers::update_post(&conn, viewer, post.id, &draft));
    media_helpers::discard_image_on_error(media_root, uploaded.as_deref(), stored).await?;

    if let Some(old_image) = post.image.as_deref() {
        if image.as_deref() != Some(old_image) {
            media_helpers::remove_post_image(media_root, old_image).await;
        }
    }
    Ok(redirect(format!("/posts/{}/", post.id)))
}

async fn show_delete_post(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<PostPath>,
    token: CsrfToken,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| {
        let post = blog_helpers::load_post_for(&conn, &viewer, path.post_id, PostAction::Delete)?;
        let form = PostForm::from(&post);
        render_post_form(&tera, &conn, &viewer, PostPage::Delete(&post), &form, &FormErrors::new(), token.get())
    });
    respond(&tera, result)
}

async fn handle_delete_post(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    viewer: AuthenticatedUser,
    path: web::Path<PostPath>,
    _form: Csrf<web::Form<ConfirmSubmission>>,
) -> HttpResponse {
    let result = delete_post(&pool, &config, &viewer, path.post_id).await;
    respond(&tera, result)
}

async fn delete_post(pool: &DbPool, config: &Config, viewer: &AuthenticatedUser, post_id: i64) -> BlogResult<HttpResponse> {
    let deleted = {
        let conn = get_conn(pool)?;
        blog_helpers::delete_post(&conn, viewer, post_id)?
    };
    if let Some(image) = deleted.image.as_deref() {
        media_helpers::remove_post_image(Path::new(&config.media_path), image).await;
    }
    Ok(redirect("/"))
}

// --- Comments ---

enum CommentPage<'a> {
    Add,
    Edit(&'a Comment),
    Delete(&'a Comment),
}

fn render_comment_form(
    tera: &Tera,
    viewer: &AuthenticatedUser,
    post_id: i64,
    page: CommentPage<'_>,
    form: &CommentForm,
    errors: &FormErrors,
    csrf_token: &str,
) -> BlogResult<HttpResponse> {
    let mut ctx: Context = base_context(Some(viewer), None);
    ctx.insert("post_id", &post_id);
    match page {
        CommentPage::Add => ctx.insert("mode", "add"),
        CommentPage::Edit(comment) => {
            ctx.insert("mode", "edit");
            ctx.insert("comment", comment);
        }
        CommentPage::Delete(comment) => {
            ctx.insert("mode", "delete");
            ctx.insert("comment", comment);
        }
    }
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "blog/comment.html", &ctx)
}

async fn show_add_comment(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<PostPath>,
    token: CsrfToken,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| {
        let post = blog_helpers::require_post(&conn, path.post_id)?;
        render_comment_form(
            &tera,
            &viewer,
            post.id,
            CommentPage::Add,
            &CommentForm::default(),
            &FormErrors::new(),
            token.get(),
        )
    });
    respond(&tera, result)
}

async fn handle_add_comment(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<PostPath>,
    form: Csrf<web::Form<CommentSubmission>>,
) -> HttpResponse {
    let (csrf_token, form) = form.into_inner().into_inner().into_form();
    let result = get_conn(&pool).and_then(|conn| {
        match blog_helpers::add_comment(&conn, &viewer, path.post_id, &form)? {
            Submission::Saved(_) => Ok(redirect(format!("/posts/{}/", path.post_id))),
            Submission::Rejected(errors) => {
                render_comment_form(&tera, &viewer, path.post_id, CommentPage::Add, &form, &errors, &csrf_token)
            }
        }
    });
    respond(&tera, result)
}

async fn show_edit_comment(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<CommentPath>,
    token: CsrfToken,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| {
        let comment = blog_helpers::load_own_comment(
            &conn,
            &viewer,
            path.post_id,
            path.comment_id,
            authorization::can_edit_comment,
        )?;
        let form = CommentForm { text: comment.text.clone() };
        render_comment_form(
            &tera,
            &viewer,
            path.post_id,
            CommentPage::Edit(&comment),
            &form,
            &FormErrors::new(),
            token.get(),
        )
    });
    respond(&tera, result)
}

async fn handle_edit_comment(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<CommentPath>,
    form: Csrf<web::Form<CommentSubmission>>,
) -> HttpResponse {
    let (csrf_token, form) = form.into_inner().into_inner().into_form();
    let result = get_conn(&pool).and_then(|conn| {
        match blog_helpers::edit_comment(&conn, &viewer, path.post_id, path.comment_id, &form)? {
            Submission::Saved(()) => Ok(redirect(format!("/posts/{}/", path.post_id))),
            Submission::Rejected(errors) => {
                let comment = blog_helpers::load_own_comment(
                    &conn,
                    &viewer,
                    path.post_id,
                    path.comment_id,
                    authorization::can_edit_comment,
                )?;
                render_comment_form(
                    &tera,
                    &viewer,
                    path.post_id,
                    CommentPage::Edit(&comment),
                    &form,
                    &errors,
                    &csrf_token,
                )
            }
        }
    });
    respond(&tera, result)
}

async fn show_delete_comment(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<CommentPath>,
    token: CsrfToken,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| {
        let comment = blog_helpers::load_own_comment(
            &conn,
            &viewer,
            path.post_id,
            path.comment_id,
            authorization::can_delete_comment,
        )?;
        let form = CommentForm { text: comment.text.clone() };
        render_comment_form(
            &tera,
            &viewer,
            path.post_id,
            CommentPage::Delete(&comment),
            &form,
            &FormErrors::new(),
            token.get(),
        )
    });
    respond(&tera, result)
}

async fn handle_delete_comment(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    path: web::Path<CommentPath>,
    _form: Csrf<web::Form<ConfirmSubmission>>,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| {
        blog_helpers::delete_comment(&conn, &viewer, path.post_id, path.comment_id)?;
        Ok(redirect(format!("/posts/{}/", path.post_id)))
    });
    respond(&tera, result)
}

// --- Profile editing ---

fn render_profile_form(
    tera: &Tera,
    viewer: &AuthenticatedUser,
    form: &UserForm,
    errors: &FormErrors,
    csrf_token: &str,
) -> BlogResult<HttpResponse> {
    let mut ctx = base_context(Some(viewer), None);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "blog/user.html", &ctx)
}

async fn show_edit_profile(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    token: CsrfToken,
) -> HttpResponse {
    let result = get_conn(&pool).and_then(|conn| {
        let user = blog_helpers::require_user(&conn, viewer.id)?;
        render_profile_form(&tera, &viewer, &UserForm::from(&user), &FormErrors::new(), token.get())
    });
    respond(&tera, result)
}

async fn handle_edit_profile(
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    viewer: AuthenticatedUser,
    session: Session,
    form: Csrf<web::Form<UserSubmission>>,
) -> HttpResponse {
    let (csrf_token, form) = form.into_inner().into_inner().into_form();
    let result = get_conn(&pool).and_then(|conn| match blog_helpers::update_profile(&conn, &viewer, &form)? {
        Submission::Saved(username) => {
            middleware::refresh_session_username(&session, &username)?;
            middleware::set_notification(
                &session,
                &Notification {
                    message: "Your profile has been updated.".to_string(),
                    r#type: "success".to_string(),
                },
            )?;
            log::info!("User {} updated their profile", viewer.id);
            Ok(redirect(format!("/profile/{}/", username)))
        }
        Submission::Rejected(errors) => render_profile_form(&tera, &viewer, &form, &errors, &csrf_token),
    });
    respond(&tera, result)
}
