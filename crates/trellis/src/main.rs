//! # trellis
//!
//! Trellis binary: loads settings, opens the database and serves the HTTP
//! API, plus small maintenance commands for the schema and users.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use trellis_server::{JwtAuth, ServerConfig, TrellisServer};
use trellis_settings::TrellisSettings;
use trellis_tasks::connection::{self, ConnectionPool};
use trellis_tasks::migrations;
use trellis_tasks::{
    ConnectionConfig, PageLimits, Role, RolePolicy, TaskService, UserCreateParams, UserRepository,
};

/// Upper bound for `user token --ttl-hours`.
const MAX_TTL_HOURS: i64 = 24 * 366 * 10;

/// Trellis task service.
#[derive(Parser, Debug)]
#[command(name = "trellis", about = "Task service with dependency-gated completion")]
struct Cli {
    /// Settings file (defaults to `~/.trellis/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API until Ctrl-C or SIGTERM.
    Serve {
        /// Host to bind.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Bring the schema up to date and exit.
    Migrate,
    /// Manage users.
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Register a user.
    Create {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Unique email address.
        #[arg(long)]
        email: String,
        /// `manager` or `member`.
        #[arg(long, default_value = "member")]
        role: Role,
    },
    /// List users.
    List,
    /// Print a bearer token for a user.
    Token {
        /// User id.
        id: String,
        /// Token lifetime in hours (at most ten years).
        #[arg(
            long,
            default_value_t = 24,
            value_parser = clap::value_parser!(i64).range(1..=MAX_TTL_HOURS)
        )]
        ttl_hours: i64,
    },
}

impl Cli {
    /// Fold command-line overrides into loaded settings.
    fn apply_overrides(&self, settings: &mut TrellisSettings) {
        if let Some(ref path) = self.db_path {
            settings.database.path.clone_from(path);
        }
        if let Command::Serve { host, port } = &self.command {
            if let Some(host) = host {
                settings.server.host.clone_from(host);
            }
            if let Some(port) = port {
                settings.server.port = *port;
            }
        }
    }
}

fn load_settings(cli: &Cli) -> Result<TrellisSettings> {
    let mut settings = match cli.settings {
        Some(ref path) => trellis_settings::load_settings_from_path(path),
        None => trellis_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    cli.apply_overrides(&mut settings);
    Ok(settings)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn connection_config(settings: &TrellisSettings) -> ConnectionConfig {
    ConnectionConfig {
        pool_size: settings.database.pool_size,
        busy_timeout_ms: settings.database.busy_timeout_ms,
    }
}

fn page_limits(settings: &TrellisSettings) -> PageLimits {
    PageLimits {
        default_per_page: settings.tasks.default_page_size,
        max_per_page: settings.tasks.max_page_size,
    }
}

fn open_pool(settings: &TrellisSettings) -> Result<ConnectionPool> {
    let db_path = trellis_settings::resolve_db_path(settings);
    if settings.database.path != ":memory:" {
        ensure_parent_dir(&db_path)?;
    }
    let db_path = db_path.to_string_lossy();
    let pool = connection::open(&db_path, &connection_config(settings))
        .with_context(|| format!("Failed to open database: {db_path}"))?;
    tracing::debug!(path = %db_path, "database ready");
    Ok(pool)
}

fn jwt_auth(settings: &TrellisSettings) -> Result<JwtAuth> {
    let secret = settings.auth.require_secret()?;
    Ok(JwtAuth::new(secret, settings.auth.leeway_secs))
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}

async fn serve(settings: &TrellisSettings) -> Result<()> {
    // Fail before binding if tokens could never verify.
    let _ = jwt_auth(settings)?;
    let pool = open_pool(settings)?;
    let service =
        TaskService::new(pool, Arc::new(RolePolicy)).with_page_limits(page_limits(settings));
    let server = TrellisServer::new(ServerConfig::from_settings(settings), service);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Trellis listening on http://{addr}");

    shutdown_signal().await?;

    tracing::info!("Shutting down...");
    server.stop(handle).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn migrate(settings: &TrellisSettings) -> Result<()> {
    let pool = open_pool(settings)?;
    let conn = pool.get().context("Failed to get connection")?;
    let version = migrations::current_version(&conn)?;
    tracing::info!(version, latest = migrations::latest_version(), "schema up to date");
    println!("schema version {version}");
    Ok(())
}

fn user_command(settings: &TrellisSettings, command: UserCommand) -> Result<()> {
    let pool = open_pool(settings)?;
    let conn = pool.get().context("Failed to get connection")?;
    match command {
        UserCommand::Create { name, email, role } => {
            let user =
                UserRepository::create_user(&conn, &UserCreateParams { name, email, role })?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        UserCommand::List => {
            for user in UserRepository::list_users(&conn)? {
                println!("{}\t{}\t{}\t{}", user.id, user.role, user.email, user.name);
            }
        }
        UserCommand::Token { id, ttl_hours } => {
            let auth = jwt_auth(settings)?;
            let user = UserRepository::get_user(&conn, &id)?;
            let ttl = chrono::Duration::try_hours(ttl_hours)
                .with_context(|| format!("Token lifetime out of range: {ttl_hours}h"))?;
            let token = auth.issue(&user.id, ttl).context("Failed to sign token")?;
            println!("{token}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    trellis_logging::init_subscriber(settings.logging.level, settings.logging.format);

    match cli.command {
        Command::Serve { .. } => serve(&settings).await,
        Command::Migrate => migrate(&settings),
        Command::User(command) => user_command(&settings, command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_overrides_host_and_port() {
        let cli = Cli::parse_from(["trellis", "serve", "--host", "0.0.0.0", "--port", "8080"]);
        let mut settings = TrellisSettings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn serve_without_flags_keeps_settings() {
        let cli = Cli::parse_from(["trellis", "serve"]);
        let mut settings = TrellisSettings::default();
        let before = settings.server.clone();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.server.host, before.host);
        assert_eq!(settings.server.port, before.port);
    }

    #[test]
    fn db_path_is_global() {
        let cli = Cli::parse_from(["trellis", "migrate", "--db-path", "/tmp/t.db"]);
        let mut settings = TrellisSettings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.database.path, "/tmp/t.db");
    }

    #[test]
    fn user_create_parses_role() {
        let cli = Cli::parse_from([
            "trellis", "user", "create", "--name", "Ann", "--email", "ann@example.com", "--role",
            "manager",
        ]);
        match cli.command {
            Command::User(UserCommand::Create { role, .. }) => assert_eq!(role, Role::Manager),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn user_create_rejects_unknown_role() {
        let result = Cli::try_parse_from([
            "trellis", "user", "create", "--name", "Ann", "--email", "a@b.c", "--role", "admin",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn token_ttl_defaults_to_a_day() {
        let cli = Cli::parse_from(["trellis", "user", "token", "user-1"]);
        match cli.command {
            Command::User(UserCommand::Token { id, ttl_hours }) => {
                assert_eq!(id, "user-1");
                assert_eq!(ttl_hours, 24);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn token_ttl_is_bounded() {
        for ttl in ["0", "-5", "3000000000000000"] {
            let result = Cli::try_parse_from(["trellis", "user", "token", "user-1", "--ttl-hours", ttl]);
            assert!(result.is_err(), "ttl {ttl} accepted");
        }
        let max = MAX_TTL_HOURS.to_string();
        let cli = Cli::parse_from(["trellis", "user", "token", "user-1", "--ttl-hours", max.as_str()]);
        assert!(matches!(
            cli.command,
            Command::User(UserCommand::Token { ttl_hours: MAX_TTL_HOURS, .. })
        ));
    }

    #[test]
    fn empty_secret_refused() {
        let settings = TrellisSettings::default();
        let err = jwt_auth(&settings).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<trellis_settings::SettingsError>(),
            Some(trellis_settings::SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn limits_and_pool_follow_settings() {
        let mut settings = TrellisSettings::default();
        settings.tasks.default_page_size = 25;
        settings.tasks.max_page_size = 50;
        settings.database.pool_size = 3;
        assert_eq!(page_limits(&settings).default_per_page, 25);
        assert_eq!(page_limits(&settings).max_per_page, 50);
        assert_eq!(connection_config(&settings).pool_size, 3);
    }

    #[test]
    fn open_pool_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = TrellisSettings::default();
        settings.database.path = dir
            .path()
            .join("nested/trellis.db")
            .to_string_lossy()
            .into_owned();
        let pool = open_pool(&settings).unwrap();
        let conn = pool.get().unwrap();
        assert_eq!(
            migrations::current_version(&conn).unwrap(),
            migrations::latest_version()
        );
    }
}
