use crate::helper::visibility::PostFilter;
use crate::models::{Category, Location, Post, PostDraft};
use chrono::{SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, Row, ToSql};

const POST_SELECT: &str = "SELECT p.id, p.title, p.text, p.image, p.pub_date, p.is_published, p.created_at,
        p.author_id, u.username,
        c.id, c.slug, c.title, c.description, c.is_published, c.created_at,
        l.id, l.name, l.is_published, l.created_at,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id";

fn post_from_row(row: &Row) -> RusqliteResult<Post> {
    let category = match row.get::<_, Option<i64>>(9)? {
        Some(id) => Some(Category {
            id,
            slug: row.get(10)?,
            title: row.get(11)?,
            description: row.get(12)?,
            is_published: row.get(13)?,
            created_at: row.get(14)?,
        }),
        None => None,
    };
    let location = match row.get::<_, Option<i64>>(15)? {
        Some(id) => Some(Location {
            id,
            name: row.get(16)?,
            is_published: row.get(17)?,
            created_at: row.get(18)?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        image: row.get(3)?,
        pub_date: row.get(4)?,
        is_published: row.get(5)?,
        created_at: row.get(6)?,
        author_id: row.get(7)?,
        author_username: row.get(8)?,
        category,
        location,
        comment_count: row.get(19)?,
    })
}

/// Posts matching `filter`, newest publication date first.
pub fn read_posts(
    conn: &Connection,
    filter: &PostFilter,
    limit: usize,
    offset: usize,
) -> RusqliteResult<Vec<Post>> {
    let sql = format!(
        "{POST_SELECT} WHERE {} ORDER BY p.pub_date DESC, p.id DESC LIMIT :limit OFFSET :offset",
        filter.sql_condition()
    );
    let limit = limit as i64;
    let offset = offset as i64;
    let mut bindings = filter.bindings();
    bindings.push((":limit", &limit as &dyn ToSql));
    bindings.push((":offset", &offset as &dyn ToSql));

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(bindings.as_slice(), post_from_row)?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(posts)
}

pub fn count_posts(conn: &Connection, filter: &PostFilter) -> RusqliteResult<usize> {
    let sql = format!(
        "SELECT COUNT(*) FROM posts p LEFT JOIN categories c ON c.id = p.category_id WHERE {}",
        filter.sql_condition()
    );
    let count: i64 = conn.query_row(&sql, filter.bindings().as_slice(), |row| row.get(0))?;
    Ok(count as usize)
}

/// Loads a post without applying any visibility rule.
pub fn read_post(conn: &Connection, post_id: i64) -> RusqliteResult<Option<Post>> {
    conn.query_row(&format!("{POST_SELECT} WHERE p.id = ?1"), [post_id], post_from_row)
        .optional()
}

pub fn create_post(conn: &Connection, author_id: i64, draft: &PostDraft) -> RusqliteResult<i64> {
    conn.execute(
        "INSERT INTO posts (title, text, image, pub_date, is_published, created_at, author_id, category_id, location_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            draft.title,
            draft.text,
            draft.image,
            draft.pub_date.trunc_subsecs(0),
            draft.is_published,
            Utc::now().trunc_subsecs(0),
            author_id,
            draft.category_id,
            draft.location_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites the editable fields. Author and creation time never change.
pub fn update_post(conn: &Connection, post_id: i64, draft: &PostDraft) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE posts SET title = ?1, text = ?2, image = ?3, pub_date = ?4, is_published = ?5,
             category_id = ?6, location_id = ?7
         WHERE id = ?8",
        params![
            draft.title,
            draft.text,
            draft.image,
            draft.pub_date.trunc_subsecs(0),
            draft.is_published,
            draft.category_id,
            draft.location_id,
            post_id,
        ],
    )
}

/// Removes the post; its comments go with it through the foreign key cascade.
pub fn delete_post(conn: &Connection, post_id: i64) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])
}
