use std::net::SocketAddr;
use std::sync::Arc;

use account_service::config::Config;
use account_service::domain::session::service::SessionService;
use account_service::domain::user::ports::UserServicePort;
use account_service::domain::user::service::UserService;
use account_service::inbound::http::create_router;
use account_service::inbound::http::AppState;
use account_service::outbound::repositories::InMemoryUserRepository;
use account_service::outbound::repositories::PostgresUserRepository;
use account_service::outbound::sessions::InMemorySessionStore;
use auth::Authenticator;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "account_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "account-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Arc::new(Config::load()?);

    tracing::info!(
        environment = %config.environment,
        host = %config.server.host,
        port = config.server.port,
        secure_cookies = config.security.secure_cookies,
        force_https = config.security.force_https,
        login_limit = %config.rate_limit.login,
        "Configuration loaded"
    );

    let authenticator = Arc::new(
        Authenticator::new(config.security.secret_key.as_bytes())
            .with_password_hasher(config.password.hasher()?)
            .with_password_policy(config.password.policy()),
    );

    let user_service: Arc<dyn UserServicePort> = if config.database.is_in_memory() {
        tracing::warn!("Using in-memory user storage; accounts are lost on restart");
        Arc::new(UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::clone(&authenticator),
        ))
    } else {
        let pg_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;
        tracing::info!(
            max_connections = config.database.max_connections,
            database = "postgresql",
            "Database connection pool created"
        );

        sqlx::migrate!("./migrations").run(&pg_pool).await?;
        tracing::info!(database = "postgresql", "Database migrations completed");

        Arc::new(UserService::new(
            Arc::new(PostgresUserRepository::new(pg_pool)),
            Arc::clone(&authenticator),
        ))
    };

    let sessions = Arc::new(SessionService::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::clone(&authenticator),
        config.security.session_lifetime(),
        config.security.remember_duration(),
    ));

    let state = AppState::new(Arc::clone(&config), user_service, Arc::clone(&sessions));
    let rate_limiters = state.rate_limiters.clone();

    let purge_interval = config.security.session_purge_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_interval);
        loop {
            interval.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Expired sessions purged"),
                Err(e) => tracing::error!(error = %e, "Session purge failed"),
            }
            rate_limiters.prune();
        }
    });

    let http_application = create_router(state)?;

    let http_address = format!("{}:{}", config.server.host, config.server.port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.port,
        protocol = "http",
        "Http server listening"
    );

    axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    tracing::info!("Server exited");

    Ok(())
}
