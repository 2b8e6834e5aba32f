#![allow(dead_code)]

use blogicum::middleware::AuthenticatedUser;
use blogicum::models::db_operations::{comments_db_operations, posts_db_operations, reference_db_operations};
use blogicum::models::PostDraft;
use blogicum::setup::db_setup;
use blogicum::DbPool;
use chrono::{DateTime, Duration, TimeZone, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};

/// Single-connection pool over a fresh in-memory database. One connection
/// keeps every checkout looking at the same data.
pub fn memory_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory().with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    let mut conn = pool.get().unwrap();
    db_setup::setup_blog_db(&mut conn).unwrap();
    drop(conn);
    pool
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

/// Inserts a user with a cheap bcrypt hash of `password`.
pub fn add_user_with_password(conn: &Connection, username: &str, password: &str) -> AuthenticatedUser {
    let hash = bcrypt::hash(password, 4).unwrap();
    conn.execute(
        "INSERT INTO users (username, password_hash, date_joined) VALUES (?1, ?2, ?3)",
        params![username, hash, days_ago(100)],
    )
    .unwrap();
    AuthenticatedUser { id: conn.last_insert_rowid(), username: username.to_string() }
}

pub fn add_user(conn: &Connection, username: &str) -> AuthenticatedUser {
    conn.execute(
        "INSERT INTO users (username, password_hash, date_joined) VALUES (?1, '!', ?2)",
        params![username, days_ago(100)],
    )
    .unwrap();
    AuthenticatedUser { id: conn.last_insert_rowid(), username: username.to_string() }
}

pub fn add_category(conn: &Connection, slug: &str, is_published: bool) -> i64 {
    reference_db_operations::create_category(conn, slug, &slug.to_uppercase(), "Posts about it", is_published).unwrap()
}

pub fn add_location(conn: &Connection, name: &str) -> i64 {
    reference_db_operations::create_location(conn, name, true).unwrap()
}

pub struct NewPost<'a> {
    pub title: &'a str,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub category_id: Option<i64>,
}

impl<'a> NewPost<'a> {
    pub fn published(title: &'a str, pub_date: DateTime<Utc>) -> Self {
        NewPost { title, pub_date, is_published: true, category_id: None }
    }

    pub fn hidden(mut self) -> Self {
        self.is_published = false;
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

pub fn draft(post: &NewPost) -> PostDraft {
    PostDraft {
        title: post.title.to_string(),
        text: format!("Text of {}", post.title),
        image: None,
        pub_date: post.pub_date,
        is_published: post.is_published,
        category_id: post.category_id,
        location_id: None,
    }
}

pub fn add_post(conn: &Connection, author: &AuthenticatedUser, post: NewPost) -> i64 {
    posts_db_operations::create_post(conn, author.id, &draft(&post)).unwrap()
}

pub fn add_comment(conn: &Connection, author: &AuthenticatedUser, post_id: i64, text: &str) -> i64 {
    comments_db_operations::create_comment(conn, post_id, author.id, text).unwrap()
}

pub fn titles(posts: &[blogicum::models::Post]) -> Vec<&str> {
    posts.iter().map(|p| p.title.as_str()).collect()
}
