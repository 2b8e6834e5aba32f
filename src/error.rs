use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlogError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("Password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session error: {0}")]
    Session(#[from] actix_session::SessionInsertError),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Missing entity, or a mutation the viewer is not allowed to perform.
    /// Both surface as the same 404 page.
    #[error("Not found")]
    NotFound,
    /// The viewer may not perform the action and is sent elsewhere instead.
    #[error("Permission denied, redirecting to {redirect_to}")]
    PermissionDenied { redirect_to: String },
}

pub type BlogResult<T> = Result<T, BlogError>;
