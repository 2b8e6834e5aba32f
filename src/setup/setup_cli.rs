use blogicum::config::Config;
use blogicum::models::db_operations::{reference_db_operations, users_db_operations};
use blogicum::setup::db_setup;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial blog setup and reference data.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        new_password: String,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    Create {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Create the category unpublished.
        #[arg(long)]
        hidden: bool,
    },
    Publish {
        #[arg(long)]
        slug: String,
    },
    Hide {
        #[arg(long)]
        slug: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum LocationAction {
    Create {
        #[arg(long)]
        name: String,
        /// Create the location unpublished.
        #[arg(long)]
        hidden: bool,
    },
    List,
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_blog_database(&config),
        },
        Commands::User { action } => {
            let Some(conn) = open_blog_db(&config) else { return };
            match action {
                UserAction::Create { username, password, email } => create_user(&conn, username, password, email),
                UserAction::List => list_users(&conn),
                UserAction::ChangePassword { username, new_password } => change_password(&conn, username, new_password),
            }
        }
        Commands::Category { action } => {
            let Some(conn) = open_blog_db(&config) else { return };
            match action {
                CategoryAction::Create { slug, title, description, hidden } => {
                    create_category(&conn, slug, title, description, !hidden)
                }
                CategoryAction::Publish { slug } => set_category_published(&conn, slug, true),
                CategoryAction::Hide { slug } => set_category_published(&conn, slug, false),
                CategoryAction::List => list_categories(&conn),
            }
        }
        Commands::Location { action } => {
            let Some(conn) = open_blog_db(&config) else { return };
            match action {
                LocationAction::Create { name, hidden } => create_location(&conn, name, !hidden),
                LocationAction::List => list_locations(&conn),
            }
        }
    }
}

fn setup_blog_database(config: &Config) {
    let db_path = config.blog_db_path();
    println!("\nSetting up blog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create blog database file.");
    match db_setup::setup_blog_db(&mut conn) {
        Ok(_) => println!("✅ Blog database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up blog database: {}", e),
    }
}

fn open_blog_db(config: &Config) -> Option<Connection> {
    let db_path = config.blog_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Blog database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    let conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Error opening blog database: {}", e);
            return None;
        }
    };
    if let Err(e) = conn.execute_batch("PRAGMA foreign_keys = ON;") {
        eprintln!("❌ Error enabling foreign keys: {}", e);
        return None;
    }
    Some(conn)
}

fn create_user(conn: &Connection, username: &str, password: &str, email: &str) {
    match users_db_operations::create_user(conn, username, password, email) {
        Ok(id) => println!("✅ User '{}' created with id {}.", username, id),
        Err(e) => eprintln!("❌ Error creating user: {}. It might be because the username already exists.", e),
    }
}

fn list_users(conn: &Connection) {
    match users_db_operations::read_all_users(conn) {
        Ok(users) => {
            println!("Listing Users:");
            for user in users {
                let last_login = user
                    .last_login_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("- [{}] {} (joined {}, last login {})", user.id, user.username, user.date_joined, last_login);
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}

fn change_password(conn: &Connection, username: &str, new_password: &str) {
    match users_db_operations::update_password(conn, username, new_password) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", username),
        Ok(_) => println!("✅ Password for user '{}' changed successfully.", username),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}

fn create_category(conn: &Connection, slug: &str, title: &str, description: &str, is_published: bool) {
    match reference_db_operations::create_category(conn, slug, title, description, is_published) {
        Ok(id) => println!("✅ Category '{}' created with id {}.", slug, id),
        Err(e) => eprintln!("❌ Error creating category: {}. The slug might already be taken.", e),
    }
}

fn set_category_published(conn: &Connection, slug: &str, is_published: bool) {
    let state = if is_published { "published" } else { "hidden" };
    match reference_db_operations::set_category_published(conn, slug, is_published) {
        Ok(0) => eprintln!("❌ Error: No category with slug '{}' found.", slug),
        Ok(_) => println!("✅ Category '{}' is now {}.", slug, state),
        Err(e) => eprintln!("❌ Error updating category: {}", e),
    }
}

fn list_categories(conn: &Connection) {
    match reference_db_operations::read_all_categories(conn) {
        Ok(categories) => {
            println!("Listing Categories:");
            for category in categories {
                let state = if category.is_published { "published" } else { "hidden" };
                println!("- [{}] {} ({}, {})", category.id, category.title, category.slug, state);
            }
        }
        Err(e) => eprintln!("❌ Error fetching categories: {}", e),
    }
}

fn create_location(conn: &Connection, name: &str, is_published: bool) {
    match reference_db_operations::create_location(conn, name, is_published) {
        Ok(id) => println!("✅ Location '{}' created with id {}.", name, id),
        Err(e) => eprintln!("❌ Error creating location: {}", e),
    }
}

fn list_locations(conn: &Connection) {
    match reference_db_operations::read_all_locations(conn) {
        Ok(locations) => {
            println!("Listing Locations:");
            for location in locations {
                let state = if location.is_published { "published" } else { "hidden" };
                println!("- [{}] {} ({})", location.id, location.name, state);
            }
        }
        Err(e) => eprintln!("❌ Error fetching locations: {}", e),
    }
}
