//! Easel CLI entry point

mod cli;

use crate::cli::{Cli, Commands, ConsoleCommands};
use anyhow::{Context, Result};
use clap::Parser;
use easel::actions::UploadRequest;
use easel::feed::filter_feed;
use easel::storage::{PostgresConfig, PostgresStore};
use easel::ui::{Navigator, Notification, NotificationLevel, Notifier, Route};
use easel::{Easel, EaselConfig, EaselError, Identity, Role};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Prints navigations and notifications to the terminal
struct Terminal;

impl Navigator for Terminal {
    fn navigate(&self, route: Route) {
        let hint = match route {
            Route::SignIn => " (set EASEL_SESSION_TOKEN or --session)",
            _ => "",
        };
        eprintln!("-> {}{}", route, hint);
    }
}

impl Notifier for Terminal {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => println!("{}", notification),
            NotificationLevel::Error => eprintln!("error: {}", notification),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.command {
        Commands::Init => init(config).await,
        Commands::Whoami => whoami(config).await,
        Commands::Feed { search, limit } => feed(config, search, limit).await,
        Commands::Show { artwork } => show(config, &artwork).await,
        Commands::Favorite { artwork } => favorite(config, &artwork).await,
        Commands::Follow { user } => follow(config, &user).await,
        Commands::Comment { artwork, text } => comment(config, &artwork, &text).await,
        Commands::Upload {
            title,
            file,
            description,
            tags,
        } => upload(config, title, file, description, tags).await,
        Commands::Console { command } => console(config, command).await,
    }
}

fn build_config(cli: &Cli) -> Result<EaselConfig> {
    let database = match &cli.database_url {
        Some(url) => PostgresConfig::from_url(url).context("Invalid DATABASE_URL")?,
        None => PostgresConfig::from_env().context("No database configured")?,
    };

    let mut config = EaselConfig::new(database);
    if let Some(token) = &cli.session {
        config = config.session_token(token.clone());
    }
    if let Some(url) = &cli.public_url {
        config = config.public_url(url.clone());
    }
    Ok(config)
}

async fn open_store(config: &EaselConfig) -> Result<Arc<PostgresStore>> {
    let database = config.database.clone().context("DATABASE_URL not set")?;
    let store = PostgresStore::new(database, config.session_token.clone(), &config.public_url)
        .await
        .context("Failed to connect to database")?;
    Ok(Arc::new(store))
}

/// Connect and resolve the session
async fn connect(config: EaselConfig) -> Result<Easel> {
    let store = open_store(&config).await?;
    let terminal = Arc::new(Terminal);
    let easel = Easel::new(store, config, terminal.clone(), terminal);
    easel.start().await;
    Ok(easel)
}

async fn signed_in(config: EaselConfig) -> Result<(Easel, Identity)> {
    let easel = connect(config).await?;
    let user = easel.require_identity().context("This command needs a session")?;
    Ok((easel, user))
}

fn parse_artwork(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("Invalid artwork id: {}", id))
}

fn parse_user(id: &str) -> Result<Identity> {
    Identity::parse(id).with_context(|| format!("Invalid user id: {}", id))
}

fn parse_role(name: &str) -> Result<Role> {
    let role = Role::parse(name).ok_or_else(|| EaselError::InvalidRole(name.to_string()))?;
    Ok(role)
}

async fn init(config: EaselConfig) -> Result<()> {
    let store = open_store(&config).await?;
    store.ensure_schema().await?;
    println!("Database schema initialized successfully");
    Ok(())
}

async fn whoami(config: EaselConfig) -> Result<()> {
    let easel = connect(config).await?;

    match easel.session().identity() {
        Some(user) => {
            let roles = easel.roles().settled_for(user).await;
            println!("User:  {}", user);
            println!("Roles: {}", roles.roles);
            if easel.roles().can_access_console() {
                println!("Console: available (Ctrl/Cmd+D)");
            }
        }
        None => println!("Not signed in"),
    }

    easel.shutdown();
    Ok(())
}

async fn feed(config: EaselConfig, search: Option<String>, limit: usize) -> Result<()> {
    let easel = connect(config).await?;
    let items = easel.views().feed(limit).await;
    let shown = filter_feed(&items, search.as_deref().unwrap_or(""));

    if shown.is_empty() {
        println!("No artworks");
    }
    for item in shown {
        println!(
            "{}  {:<32} by {:<20} {} views",
            item.artwork.id,
            item.artwork.title,
            item.author_name(),
            item.artwork.view_count
        );
    }

    easel.shutdown();
    Ok(())
}

async fn show(config: EaselConfig, artwork: &str) -> Result<()> {
    let id = parse_artwork(artwork)?;
    let easel = connect(config).await?;

    let detail = easel
        .open_artwork(id)
        .await
        .with_context(|| format!("Artwork not found: {}", id))?;

    let author = detail
        .author
        .as_ref()
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("{} by {}", detail.artwork.title, author);
    if let Some(description) = &detail.artwork.description {
        println!("{}", description);
    }
    println!("Image:     {}", detail.artwork.image_url);
    println!("Views:     {}", detail.artwork.view_count);
    println!(
        "Favorites: {}{}",
        detail.favorite.count,
        if detail.favorite.favorited { " (yours)" } else { "" }
    );
    if !detail.tags.is_empty() {
        let tags: Vec<&str> = detail.tags.iter().map(|t| t.name.as_str()).collect();
        println!("Tags:      {}", tags.join(", "));
    }

    println!();
    println!("Comments ({}):", detail.comments.len());
    for (comment, commenter) in detail.comments.comments.iter().zip(&detail.commenters) {
        let name = commenter.as_ref().map(|p| p.name()).unwrap_or("unknown");
        let at = comment.created_at.format("%Y-%m-%d %H:%M");
        println!("  [{}] {}: {}", at, name, comment.content);
    }

    easel.shutdown();
    Ok(())
}

async fn favorite(config: EaselConfig, artwork: &str) -> Result<()> {
    let id = parse_artwork(artwork)?;
    let (easel, user) = signed_in(config).await?;

    let mut state = easel.views().favorite_state(id, Some(user)).await;
    easel.actions().toggle_favorite(user, &mut state).await?;

    if state.favorited {
        println!("Favorited ({} total)", state.count);
    } else {
        println!("Unfavorited ({} total)", state.count);
    }

    easel.shutdown();
    Ok(())
}

async fn follow(config: EaselConfig, target: &str) -> Result<()> {
    let target = parse_user(target)?;
    let (easel, user) = signed_in(config).await?;

    let mut state = easel.views().follow_state(target, Some(user)).await;
    easel.actions().toggle_follow(user, &mut state).await?;

    if state.following {
        println!("Following {} ({} followers)", target, state.followers);
    } else {
        println!("Unfollowed {} ({} followers)", target, state.followers);
    }

    easel.shutdown();
    Ok(())
}

async fn comment(config: EaselConfig, artwork: &str, text: &str) -> Result<()> {
    let id = parse_artwork(artwork)?;
    let (easel, user) = signed_in(config).await?;

    let detail = easel
        .views()
        .artwork(id, Some(user))
        .await
        .with_context(|| format!("Artwork not found: {}", id))?;
    let mut thread = detail.comments;

    let posted = easel.actions().post_comment(user, &mut thread, text).await?;
    println!("Comment posted ({} in thread): {}", thread.len(), posted.id);

    easel.shutdown();
    Ok(())
}

async fn upload(
    config: EaselConfig,
    title: String,
    file: PathBuf,
    description: Option<String>,
    tags: String,
) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read image: {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (easel, user) = signed_in(config).await?;

    let mut request = UploadRequest::new(title, file_name, bytes).tags(tags);
    if let Some(description) = description {
        request = request.description(description);
    }
    let artwork = easel.actions().upload_artwork(user, request).await?;

    info!(artwork_id = %artwork.id, "Upload complete");
    println!("{}", artwork.id);
    println!("Image: {}", artwork.image_url);

    easel.shutdown();
    Ok(())
}

async fn console(config: EaselConfig, command: ConsoleCommands) -> Result<()> {
    let easel = connect(config).await?;
    let console = easel.open_console().await?;

    match command {
        ConsoleCommands::Stats => {
            let stats = console.stats().await?;
            println!("Easel Statistics");
            println!("================");
            println!("{}", stats);
        }
        ConsoleCommands::Roles { user } => {
            let user = parse_user(&user)?;
            let roles = console.roles_of(user).await?;
            println!("User:  {}", user);
            println!("Roles: {}", roles);
        }
        ConsoleCommands::Grant { user, role } => {
            let user = parse_user(&user)?;
            let role = parse_role(&role)?;
            console.grant(user, role).await?;
            println!("Granted {} to {}", role, user);
        }
        ConsoleCommands::Revoke { user, role } => {
            let user = parse_user(&user)?;
            let role = parse_role(&role)?;
            console.revoke(user, role).await?;
            println!("Revoked {} from {}", role, user);
        }
    }

    easel.shutdown();
    Ok(())
}
