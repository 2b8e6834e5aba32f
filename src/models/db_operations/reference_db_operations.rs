//! Categories and locations: reference data administered from the setup CLI
//! and offered as choices on the post form.

use crate::models::{Category, Location};
use chrono::{SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, Row};

fn category_from_row(row: &Row) -> RusqliteResult<Category> {
    Ok(Category {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        is_published: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn location_from_row(row: &Row) -> RusqliteResult<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        is_published: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn create_category(
    conn: &Connection,
    slug: &str,
    title: &str,
    description: &str,
    is_published: bool,
) -> RusqliteResult<i64> {
    conn.execute(
        "INSERT INTO categories (slug, title, description, is_published, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![slug, title, description, is_published, Utc::now().trunc_subsecs(0)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_categories(conn: &Connection) -> RusqliteResult<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, slug, title, description, is_published, created_at FROM categories ORDER BY title",
    )?;
    let categories = stmt.query_map([], category_from_row)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(categories)
}

/// Looks a category up by slug, but only if it is published.
pub fn read_published_category_by_slug(conn: &Connection, slug: &str) -> RusqliteResult<Option<Category>> {
    conn.query_row(
        "SELECT id, slug, title, description, is_published, created_at FROM categories WHERE slug = ?1 AND is_published = 1",
        [slug],
        category_from_row,
    )
    .optional()
}

pub fn category_exists(conn: &Connection, category_id: i64) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
        [category_id],
        |row| row.get(0),
    )
}

pub fn set_category_published(conn: &Connection, slug: &str, is_published: bool) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE categories SET is_published = ?1 WHERE slug = ?2",
        params![is_published, slug],
    )
}

pub fn create_location(conn: &Connection, name: &str, is_published: bool) -> RusqliteResult<i64> {
    conn.execute(
        "INSERT INTO locations (name, is_published, created_at) VALUES (?1, ?2, ?3)",
        params![name, is_published, Utc::now().trunc_subsecs(0)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_locations(conn: &Connection) -> RusqliteResult<Vec<Location>> {
    let mut stmt = conn.prepare("SELECT id, name, is_published, created_at FROM locations ORDER BY name")?;
    let locations = stmt.query_map([], location_from_row)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(locations)
}

pub fn location_exists(conn: &Connection, location_id: i64) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM locations WHERE id = ?1)",
        [location_id],
        |row| row.get(0),
    )
}
