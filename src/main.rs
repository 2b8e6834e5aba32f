use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpServer,
};
use blogicum::{config::Config, create_pool, middleware::csrf_middleware, routes};
use clap::Parser;
use std::convert::TryFrom;
use std::fs;
use std::path::PathBuf;
use tera::Tera;

#[derive(Parser, Debug)]
#[command(name = "blogicum_server", author, version, about = "Starts the Blogicum web server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let tera = Tera::new("templates/**/*.html").expect("Tera initialization failed");

    fs::create_dir_all(&config.media_path).expect("Failed to create media directory");

    let db_path = config.blog_db_path();
    if !db_path.exists() {
        panic!(
            "FATAL: {} not found. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
            db_path.display()
        );
    }
    let pool = create_pool(&db_path).expect("FATAL: Failed to create Rusqlite connection pool.");

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .expect("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        App::new()
            .wrap(routes::error_handlers())
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("Referrer-Policy", "same-origin")),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(tera.clone()))
            .app_data(web::Data::new(pool.clone()))
            .service(actix_files::Files::new("/media", &config.media_path))
            .service(actix_files::Files::new("/static", "./static"))
            // Pages share the session and CSRF layers.
            .service(
                web::scope("")
                    .wrap(csrf_middleware())
                    .wrap(session_mw)
                    .configure(routes::config_site)
                    .default_service(web::to(routes::pages::page_not_found)),
            )
    })
    .bind(server_address)?
    .run()
    .await
}
