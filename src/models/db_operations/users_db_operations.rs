use crate::models::{ProfileChanges, User};
use bcrypt::{hash, verify, BcryptError};
use chrono::{SubsecRound, Utc};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Result as RusqliteResult, Row};

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, date_joined, last_login_time";

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

fn user_from_row(row: &Row) -> RusqliteResult<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        date_joined: row.get(5)?,
        last_login_time: row.get(6)?,
    })
}

/// Inserts a user with a bcrypt hash of `password` and returns the new id.
pub fn create_user(
    conn: &Connection,
    username: &str,
    password: &str,
    email: &str,
) -> RusqliteResult<i64> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (username, password_hash, email, date_joined) VALUES (?1, ?2, ?3, ?4)",
        params![username, hashed_password, email, Utc::now().trunc_subsecs(0)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection) -> RusqliteResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
    let users = stmt.query_map([], user_from_row)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(users)
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> RusqliteResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        [username],
        user_from_row,
    )
    .optional()
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> RusqliteResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [user_id],
        user_from_row,
    )
    .optional()
}

/// True when another account (anything but `except_user_id`) already uses `username`.
pub fn is_username_taken(
    conn: &Connection,
    username: &str,
    except_user_id: Option<i64>,
) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id IS NOT ?2)",
        params![username, except_user_id],
        |row| row.get(0),
    )
}

pub fn update_profile(conn: &Connection, user_id: i64, changes: &ProfileChanges) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, username = ?3, email = ?4 WHERE id = ?5",
        params![changes.first_name, changes.last_name, changes.username, changes.email, user_id],
    )
}

pub fn update_password(conn: &Connection, username: &str, new_password: &str) -> RusqliteResult<usize> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE username = ?2",
        params![hashed_password, username],
    )
}

/// Returns the id and canonical username when the password matches.
/// An unknown user and a wrong password both give `Ok(None)`.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> RusqliteResult<Option<(i64, String)>> {
    let row: Option<(i64, String, String)> = conn
        .query_row(
            "SELECT id, username, password_hash FROM users WHERE username = ?1",
            [username],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    Ok(row.and_then(|(id, username, hash)| verify(password, &hash).unwrap_or(false).then_some((id, username))))
}

pub fn update_last_login_time(conn: &Connection, user_id: i64) -> RusqliteResult<()> {
    conn.execute(
        "UPDATE users SET last_login_time = ?1 WHERE id = ?2",
        params![Utc::now().trunc_subsecs(0), user_id],
    )?;
    Ok(())
}
