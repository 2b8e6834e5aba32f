use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Number of posts shown on every paginated listing.
pub const POSTS_PER_PAGE: usize = 10;

/// Builds a connection pool over the blog database file. Every connection
/// handed out by the pool has foreign key enforcement switched on.
pub fn create_pool(db_path: &Path) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    Pool::builder().build(manager)
}

pub mod config;
pub mod error;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
