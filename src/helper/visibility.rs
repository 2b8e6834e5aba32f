//! Which posts a viewer gets to see.
//!
//! List pages run one of the [`PostFilter`] variants as a SQL condition; the
//! detail page and the profile page use the in-memory predicates below.

use crate::middleware::AuthenticatedUser;
use crate::models::{Post, User};
use chrono::{DateTime, Utc};
use rusqlite::ToSql;

/// SQL form of the public visibility rule. Expects `posts p` and a
/// `LEFT JOIN categories c` in the surrounding query. A post without a
/// category never matches.
pub const PUBLIC_POST_CONDITION: &str = "p.is_published = 1 AND p.pub_date <= :now AND c.is_published = 1";

/// Post listings exposed by the site.
#[derive(Debug, Clone)]
pub enum PostFilter {
    /// The front page: every publicly visible post.
    Public { now: DateTime<Utc> },
    /// Publicly visible posts of one category.
    Category { category_id: i64, now: DateTime<Utc> },
    /// Posts of one author. `include_hidden` is set when the author is the viewer.
    Author { author_id: i64, include_hidden: bool, now: DateTime<Utc> },
}

impl PostFilter {
    pub fn public(now: DateTime<Utc>) -> Self {
        PostFilter::Public { now }
    }

    pub fn category(category_id: i64, now: DateTime<Utc>) -> Self {
        PostFilter::Category { category_id, now }
    }

    /// Profile listing for `profile`, as seen by `viewer`.
    pub fn profile(profile: &User, viewer: Option<&AuthenticatedUser>, now: DateTime<Utc>) -> Self {
        PostFilter::Author {
            author_id: profile.id,
            include_hidden: is_profile_owner(profile, viewer),
            now,
        }
    }

    pub fn sql_condition(&self) -> String {
        match self {
            PostFilter::Public { .. } => PUBLIC_POST_CONDITION.to_string(),
            PostFilter::Category { .. } => format!("p.category_id = :category_id AND {PUBLIC_POST_CONDITION}"),
            PostFilter::Author { include_hidden: true, .. } => "p.author_id = :author_id".to_string(),
            PostFilter::Author { include_hidden: false, .. } => {
                format!("p.author_id = :author_id AND {PUBLIC_POST_CONDITION}")
            }
        }
    }

    /// Named parameters referenced by [`PostFilter::sql_condition`], and no others.
    pub fn bindings(&self) -> Vec<(&'static str, &dyn ToSql)> {
        match self {
            PostFilter::Public { now } => vec![(":now", now as &dyn ToSql)],
            PostFilter::Category { category_id, now } => {
                vec![(":category_id", category_id as &dyn ToSql), (":now", now as &dyn ToSql)]
            }
            PostFilter::Author { author_id, include_hidden: true, .. } => {
                vec![(":author_id", author_id as &dyn ToSql)]
            }
            PostFilter::Author { author_id, include_hidden: false, now } => {
                vec![(":author_id", author_id as &dyn ToSql), (":now", now as &dyn ToSql)]
            }
        }
    }
}

/// In-memory twin of [`PUBLIC_POST_CONDITION`].
pub fn is_publicly_visible(post: &Post, now: DateTime<Utc>) -> bool {
    post.is_published
        && post.pub_date <= now
        && post.category.as_ref().map_or(false, |category| category.is_published)
}

pub fn is_author(post: &Post, viewer: Option<&AuthenticatedUser>) -> bool {
    viewer.map_or(false, |viewer| viewer.id == post.author_id)
}

/// Detail page rule: the author always sees the post, everyone else only
/// while it is published. Publication date and category state are not
/// consulted here, so a direct link can reach a post that the list pages
/// leave out.
pub fn can_view_detail(post: &Post, viewer: Option<&AuthenticatedUser>) -> bool {
    is_author(post, viewer) || post.is_published
}

pub fn is_profile_owner(profile: &User, viewer: Option<&AuthenticatedUser>) -> bool {
    viewer.map_or(false, |viewer| viewer.id == profile.id)
}
