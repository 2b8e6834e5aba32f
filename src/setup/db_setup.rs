use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
}

/// Creates every table of the blog database. Safe to run against an
/// existing database: tables that already exist are left alone.
pub fn setup_blog_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    println!("- Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            date_joined TEXT NOT NULL,
            last_login_time TEXT
        )",
        [],
    )?;

    println!("- Creating 'categories' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL CHECK(length(title) <= 256),
            description TEXT NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'locations' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK(length(name) <= 256),
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'posts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL CHECK(length(title) <= 256),
            text TEXT NOT NULL,
            image TEXT,
            pub_date TEXT NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            author_id INTEGER NOT NULL,
            category_id INTEGER,
            location_id INTEGER,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
            FOREIGN KEY (location_id) REFERENCES locations(id) ON DELETE SET NULL
        )",
        [],
    )?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts (pub_date)", [])?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_posts_author ON posts (author_id)", [])?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_posts_category ON posts (category_id)", [])?;

    println!("- Creating 'comments' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            author_id INTEGER NOT NULL,
            post_id INTEGER NOT NULL,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
        )",
        [],
    )?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_comments_post ON comments (post_id, created_at)", [])?;

    tx.commit()?;
    Ok(())
}
