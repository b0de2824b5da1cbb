use std::sync::Arc;

use clap::Parser;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use taskwarden_core::identity::Role;
use taskwarden_core::model::NewUser;
use taskwarden_server::api_key_repository::ApiKeyRepository;
use taskwarden_server::auth;
use taskwarden_server::cli::{Cli, Command};
use taskwarden_server::config::{AppConfig, AuthMode, LogFormat, StorageBackend};
use taskwarden_server::metrics::Metrics;
use taskwarden_server::middleware::AuthState;
use taskwarden_server::rest;
use taskwarden_server::service::WorkspaceService;
use taskwarden_storage::{InMemoryStore, PostgresStore, Store, UserStore};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Some(Command::Migrate) => run_migrate(&config).await,
        Some(Command::CreateUser {
            email,
            first_name,
            last_name,
            admin,
        }) => {
            let role = if admin { Role::Admin } else { Role::Member };
            let user = NewUser {
                email,
                first_name,
                last_name,
                role,
            };
            run_create_user(&config, user).await
        }
        Some(Command::CreateApiKey { email }) => run_create_api_key(&config, &email).await,
        Some(Command::RevokeApiKey { key_id }) => run_revoke_api_key(&config, &key_id).await,
        Some(Command::Serve) | None => run_serve(config).await,
    }
}

async fn connect(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
}

async fn run_migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("running database migrations");
    let pool = connect(config).await?;
    taskwarden_storage::postgres::migrations::run_migrations(&pool).await?;
    tracing::info!("migrations completed successfully");
    Ok(())
}

async fn run_create_user(
    config: &AppConfig,
    user: NewUser,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = PostgresStore::new(connect(config).await?);
    store.run_migrations().await?;

    let user = store.create_user(&user).await?;

    println!("User created successfully");
    println!("  Email:   {}", user.email);
    println!("  Role:    {}", user.role);
    println!("  User ID: {}", user.id);
    Ok(())
}

async fn run_create_api_key(
    config: &AppConfig,
    email: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect(config).await?;
    let store = PostgresStore::new(pool.clone());
    store.run_migrations().await?;

    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| format!("no user with email '{email}'"))?;

    let (full_key, key_id, secret) = auth::generate_api_key();
    let key_hash = auth::hash_secret(&secret)?;

    let repo = ApiKeyRepository::new(pool);
    repo.insert(&user.id, &key_id, &key_hash).await?;

    println!("API key created successfully");
    println!("  User:    {email}");
    println!("  API Key: {full_key}");
    println!();
    println!("Store this key securely. It will not be shown again.");
    Ok(())
}

async fn run_revoke_api_key(
    config: &AppConfig,
    key_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = ApiKeyRepository::new(connect(config).await?);
    if !repo.revoke(key_id).await? {
        return Err(format!("no active api key with id '{key_id}'").into());
    }

    println!("API key {key_id} revoked");
    Ok(())
}

async fn run_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, data will not survive a restart");
            serve(&config, Arc::new(InMemoryStore::new()), None).await
        }
        StorageBackend::Postgres => {
            let pool = connect(&config).await?;
            let store = PostgresStore::new(pool.clone());
            store.run_migrations().await?;

            let repository = match config.auth.mode {
                AuthMode::ApiKey => Some(Arc::new(ApiKeyRepository::new(pool))),
                AuthMode::Dev => None,
            };
            serve(&config, Arc::new(store), repository).await
        }
    }
}

async fn serve<S: Store + 'static>(
    config: &AppConfig,
    store: Arc<S>,
    repository: Option<Arc<ApiKeyRepository>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(Metrics::new());
    let service = Arc::new(WorkspaceService::with_metrics(
        Arc::clone(&store),
        Arc::clone(&metrics),
    ));

    if let Some(ref email) = config.auth.bootstrap_admin_email {
        let admin = service.bootstrap_admin(email).await?;
        tracing::info!(user_id = %admin.id, email = %admin.email, "bootstrap admin available");
    }

    let auth_state = match repository {
        Some(repository) => AuthState::with_repository(store, repository),
        None => {
            tracing::warn!("dev auth mode: identities are taken from the x-user-id header");
            AuthState::dev_mode(store)
        }
    };

    let router = rest::create_router(rest::AppState { service, metrics }, auth_state);

    let addr: std::net::SocketAddr = config.http_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, backend = ?config.storage.backend, "starting taskwarden server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => { tracing::info!("received SIGINT"); }
                _ = sigterm.recv() => { tracing::info!("received SIGTERM"); }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler, using SIGINT only");
            let _ = ctrl_c.await;
            tracing::info!("received SIGINT");
        }
    }
}
