//! Blogroll - A blog platform backend

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogroll::{
    api::{self, AppState},
    config::Config,
    db,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogroll=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Blogroll...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Demo mode: create a superadmin if not exists
    #[cfg(feature = "demo")]
    seed_superadmin(&pool).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Build router
    let state = AppState::new(pool.clone(), config)?;
    let app = api::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(feature = "demo")]
async fn seed_superadmin(pool: &db::DynDatabasePool) -> Result<()> {
    use blogroll::db::repositories::{SqlxUserRepository, UserRepository};
    use blogroll::db::UnitOfWork;
    use blogroll::models::{NewUser, Role, Roles};
    use blogroll::services::hash_password;

    let mut uow = UnitOfWork::begin(pool).await?;
    if SqlxUserRepository
        .find_by_username(&mut uow, "superadmin")
        .await?
        .is_some()
    {
        uow.rollback().await?;
        return Ok(());
    }

    tracing::info!("Demo mode: Creating superadmin (superadmin/Secret123)");
    let user = NewUser {
        username: "superadmin".to_string(),
        name: "Super Admin".to_string(),
        email: "superadmin@blogroll.local".to_string(),
        password_hash: hash_password("Secret123")?,
        roles: Roles::new([Role::SuperAdmin]),
        enabled: true,
        confirmation_token: None,
    };
    SqlxUserRepository.create(&mut uow, &user).await?;
    uow.commit().await?;

    Ok(())
}
