use crate::models::Comment;
use chrono::{SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, Row};

const COMMENT_SELECT: &str = "SELECT cm.id, cm.text, cm.created_at, cm.author_id, u.username, cm.post_id
    FROM comments cm
    JOIN users u ON u.id = cm.author_id";

fn comment_from_row(row: &Row) -> RusqliteResult<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        post_id: row.get(5)?,
    })
}

pub fn create_comment(conn: &Connection, post_id: i64, author_id: i64, text: &str) -> RusqliteResult<i64> {
    conn.execute(
        "INSERT INTO comments (text, created_at, author_id, post_id) VALUES (?1, ?2, ?3, ?4)",
        params![text, Utc::now().trunc_subsecs(0), author_id, post_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_comment(conn: &Connection, comment_id: i64) -> RusqliteResult<Option<Comment>> {
    conn.query_row(&format!("{COMMENT_SELECT} WHERE cm.id = ?1"), [comment_id], comment_from_row)
        .optional()
}

/// Comments of a post in the order they were written.
pub fn read_comments_for_post(conn: &Connection, post_id: i64) -> RusqliteResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} WHERE cm.post_id = ?1 ORDER BY cm.created_at ASC, cm.id ASC"
    ))?;
    let comments = stmt
        .query_map([post_id], comment_from_row)?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(comments)
}

pub fn update_comment_text(conn: &Connection, comment_id: i64, text: &str) -> RusqliteResult<usize> {
    conn.execute("UPDATE comments SET text = ?1 WHERE id = ?2", params![text, comment_id])
}

pub fn delete_comment(conn: &Connection, comment_id: i64) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])
}
