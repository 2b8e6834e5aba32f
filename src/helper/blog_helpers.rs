//! Page-level operations: each function resolves the entities a page needs,
//! applies the visibility and ownership rules, and performs the mutation.
//! Routes call these with a pooled connection and turn the outcome into a
//! response.

use crate::error::{BlogError, BlogResult};
use crate::helper::authorization;
use crate::helper::form_helpers::{
    add_error, collect_errors, CommentForm, FormErrors, PostForm, RegistrationForm, Submission, UserForm,
};
use crate::helper::pagination::{Page, Paginator};
use crate::helper::visibility::{self, PostFilter};
use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::{
    comments_db_operations, posts_db_operations, reference_db_operations, users_db_operations,
};
use crate::models::{Category, Comment, Location, Post, PostAction, PostDraft, ProfileChanges, User};
use crate::{DbPool, POSTS_PER_PAGE};
use chrono::{DateTime, Utc};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use validator::Validate;

pub type DbConn = PooledConnection<SqliteConnectionManager>;

pub fn get_conn(pool: &DbPool) -> BlogResult<DbConn> {
    pool.get().map_err(BlogError::Pool)
}

fn paginate(conn: &Connection, filter: &PostFilter, raw_page: Option<&str>) -> BlogResult<Page<Post>> {
    let paginator = Paginator::new(posts_db_operations::count_posts(conn, filter)?, POSTS_PER_PAGE);
    let number = paginator.resolve(raw_page);
    let posts = posts_db_operations::read_posts(conn, filter, paginator.per_page(), paginator.offset(number))?;
    Ok(paginator.page(number, posts))
}

// --- Listings ---

pub fn list_public_posts(conn: &Connection, now: DateTime<Utc>, raw_page: Option<&str>) -> BlogResult<Page<Post>> {
    paginate(conn, &PostFilter::public(now), raw_page)
}

/// Fails with `NotFound` when the category is unknown or hidden.
pub fn list_category_posts(
    conn: &Connection,
    slug: &str,
    now: DateTime<Utc>,
    raw_page: Option<&str>,
) -> BlogResult<(Category, Page<Post>)> {
    let category = reference_db_operations::read_published_category_by_slug(conn, slug)?
        .ok_or(BlogError::NotFound)?;
    let page = paginate(conn, &PostFilter::category(category.id, now), raw_page)?;
    Ok((category, page))
}

/// The owner sees every post they wrote; other viewers get the public subset.
pub fn list_profile_posts(
    conn: &Connection,
    username: &str,
    viewer: Option<&AuthenticatedUser>,
    now: DateTime<Utc>,
    raw_page: Option<&str>,
) -> BlogResult<(User, Page<Post>)> {
    let profile = users_db_operations::read_user_by_username(conn, username)?.ok_or(BlogError::NotFound)?;
    let page = paginate(conn, &PostFilter::profile(&profile, viewer, now), raw_page)?;
    Ok((profile, page))
}

// --- Post detail and ownership ---

pub fn require_post(conn: &Connection, post_id: i64) -> BlogResult<Post> {
    posts_db_operations::read_post(conn, post_id)?.ok_or(BlogError::NotFound)
}

/// A post with its comments in writing order, if the viewer may open it.
pub fn get_post_detail(
    conn: &Connection,
    post_id: i64,
    viewer: Option<&AuthenticatedUser>,
) -> BlogResult<(Post, Vec<Comment>)> {
    let post = require_post(conn, post_id)?;
    if !visibility::can_view_detail(&post, viewer) {
        return Err(BlogError::NotFound);
    }
    let comments = comments_db_operations::read_comments_for_post(conn, post.id)?;
    Ok((post, comments))
}

/// Loads a post the viewer intends to edit or delete, or the matching denial.
pub fn load_post_for(
    conn: &Connection,
    viewer: &AuthenticatedUser,
    post_id: i64,
    action: PostAction,
) -> BlogResult<Post> {
    let post = require_post(conn, post_id)?;
    if !authorization::can_perform_post_action(viewer, &post, action) {
        log::warn!("User {} was refused {:?} on post {}", viewer.id, action, post.id);
        return Err(authorization::post_denial(&post, action));
    }
    Ok(post)
}

/// Categories and locations offered on the post form.
pub fn post_form_choices(conn: &Connection) -> BlogResult<(Vec<Category>, Vec<Location>)> {
    Ok((
        reference_db_operations::read_all_categories(conn)?,
        reference_db_operations::read_all_locations(conn)?,
    ))
}

/// Runs field validation plus the checks that need the store. `errors`
/// holds problems already found while reading the request body.
pub fn validate_post_form(conn: &Connection, form: &PostForm, mut errors: FormErrors) -> BlogResult<FormErrors> {
    if let Err(e) = form.validate() {
        for (field, messages) in collect_errors(&e) {
            errors.entry(field).or_default().extend(messages);
        }
    }
    let invalid_choice = "Select a valid choice. That choice is not one of the available choices.";
    if let Some(category_id) = form.category {
        if !reference_db_operations::category_exists(conn, category_id)? {
            add_error(&mut errors, "category", invalid_choice);
        }
    }
    if let Some(location_id) = form.location {
        if !reference_db_operations::location_exists(conn, location_id)? {
            add_error(&mut errors, "location", invalid_choice);
        }
    }
    Ok(errors)
}

pub fn create_post(conn: &Connection, viewer: &AuthenticatedUser, draft: &PostDraft) -> BlogResult<i64> {
    let post_id = posts_db_operations::create_post(conn, viewer.id, draft)?;
    log::info!("User {} created post {}", viewer.username, post_id);
    Ok(post_id)
}

/// Ownership is checked again so the update cannot outlive a stale check.
pub fn update_post(conn: &Connection, viewer: &AuthenticatedUser, post_id: i64, draft: &PostDraft) -> BlogResult<()> {
    let post = load_post_for(conn, viewer, post_id, PostAction::Edit)?;
    posts_db_operations::update_post(conn, post.id, draft)?;
    log::info!("User {} edited post {}", viewer.username, post.id);
    Ok(())
}

/// Deletes the post and returns what was removed, so its image can be
/// cleaned up.
pub fn delete_post(conn: &Connection, viewer: &AuthenticatedUser, post_id: i64) -> BlogResult<Post> {
    let post = load_post_for(conn, viewer, post_id, PostAction::Delete)?;
    posts_db_operations::delete_post(conn, post.id)?;
    log::info!("User {} deleted post {}", viewer.username, post.id);
    Ok(post)
}

// --- Comments ---

pub fn add_comment(
    conn: &Connection,
    viewer: &AuthenticatedUser,
    post_id: i64,
    form: &CommentForm,
) -> BlogResult<Submission<i64>> {
    let post = require_post(conn, post_id)?;
    if let Err(e) = form.validate() {
        return Ok(Submission::Rejected(collect_errors(&e)));
    }
    let comment_id = comments_db_operations::create_comment(conn, post.id, viewer.id, &form.text)?;
    Ok(Submission::Saved(comment_id))
}

/// The viewer's own comment under `post_id`. Someone else's comment, or a
/// comment filed under another post, is reported as missing.
pub fn load_own_comment(
    conn: &Connection,
    viewer: &AuthenticatedUser,
    post_id: i64,
    comment_id: i64,
    allowed: fn(&AuthenticatedUser, &Comment) -> bool,
) -> BlogResult<Comment> {
    let comment = comments_db_operations::read_comment(conn, comment_id)?
        .filter(|comment| comment.post_id == post_id)
        .ok_or(BlogError::NotFound)?;
    if !allowed(viewer, &comment) {
        log::warn!("User {} was refused access to comment {}", viewer.id, comment.id);
        return Err(BlogError::NotFound);
    }
    Ok(comment)
}

pub fn edit_comment(
    conn: &Connection,
    viewer: &AuthenticatedUser,
    post_id: i64,
    comment_id: i64,
    form: &CommentForm,
) -> BlogResult<Submission<()>> {
    let comment = load_own_comment(conn, viewer, post_id, comment_id, authorization::can_edit_comment)?;
    if let Err(e) = form.validate() {
        return Ok(Submission::Rejected(collect_errors(&e)));
    }
    comments_db_operations::update_comment_text(conn, comment.id, &form.text)?;
    Ok(Submission::Saved(()))
}

pub fn delete_comment(conn: &Connection, viewer: &AuthenticatedUser, post_id: i64, comment_id: i64) -> BlogResult<()> {
    let comment = load_own_comment(conn, viewer, post_id, comment_id, authorization::can_delete_comment)?;
    comments_db_operations::delete_comment(conn, comment.id)?;
    log::info!("User {} deleted comment {}", viewer.username, comment.id);
    Ok(())
}

// --- Users ---

pub fn require_user(conn: &Connection, user_id: i64) -> BlogResult<User> {
    users_db_operations::read_user_by_id(conn, user_id)?.ok_or(BlogError::NotFound)
}

/// Saves the viewer's profile and returns the (possibly new) username.
pub fn update_profile(conn: &Connection, viewer: &AuthenticatedUser, form: &UserForm) -> BlogResult<Submission<String>> {
    let user = require_user(conn, viewer.id)?;
    let mut errors = match form.validate() {
        Ok(()) => FormErrors::new(),
        Err(e) => collect_errors(&e),
    };
    if !errors.contains_key("username") && users_db_operations::is_username_taken(conn, &form.username, Some(user.id))? {
        add_error(&mut errors, "username", "A user with that username already exists.");
    }
    if !errors.is_empty() {
        return Ok(Submission::Rejected(errors));
    }

    let changes = ProfileChanges {
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        username: form.username.clone(),
        email: form.email.clone(),
    };
    users_db_operations::update_profile(conn, user.id, &changes)?;
    Ok(Submission::Saved(changes.username))
}

pub fn register_user(conn: &Connection, form: &RegistrationForm) -> BlogResult<Submission<i64>> {
    let mut errors = match form.validate() {
        Ok(()) => FormErrors::new(),
        Err(e) => collect_errors(&e),
    };
    if !errors.contains_key("username") && users_db_operations::is_username_taken(conn, &form.username, None)? {
        add_error(&mut errors, "username", "A user with that username already exists.");
    }
    if !errors.is_empty() {
        return Ok(Submission::Rejected(errors));
    }
    let user_id = users_db_operations::create_user(conn, &form.username, &form.password1, &form.email)?;
    log::info!("Registered user '{}' with id {}", form.username, user_id);
    Ok(Submission::Saved(user_id))
}
