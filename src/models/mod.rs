use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
    pub last_login_time: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// A post joined with its author, category and location.
/// `comment_count` is computed by the query that loaded it.
#[derive(Debug, Serialize, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub comment_count: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub post_id: i64,
}

/// Field values of a post as they are written to the store.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub text: String,
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
}

/// Profile fields editable by the owner.
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}

/// Mutations guarded by post ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Edit,
    Delete,
}

pub mod db_operations;
