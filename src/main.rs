use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yamdb_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    mailer::{ConsoleMailer, HttpMailer, MailerState},
    models::{NewUser, Role},
    repository::{PostgresRepository, RepositoryState},
};

/// main
///
/// Loads configuration, sets up logging, connects and migrates the database,
/// picks the mail transport, ensures the bootstrap admin and serves the API.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty locally, JSON in production
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "yamdb_api=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Mail transport
    let mailer: MailerState = match (&config.mail_api_url, &config.mail_api_key) {
        (Some(url), Some(key)) => {
            tracing::info!(endpoint = %url, "Confirmation mail goes through the HTTP relay");
            Arc::new(HttpMailer::new(url, key, &config.mail_sender))
        }
        _ => {
            tracing::warn!("No mail relay configured, confirmation codes are logged only");
            Arc::new(ConsoleMailer::new(&config.mail_sender))
        }
    };

    // 5. Bootstrap admin
    if let (Some(username), Some(email)) = (&config.admin_username, &config.admin_email) {
        ensure_superuser(&repo, username, email).await;
    }

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        mailer,
        config,
    };

    // 6. Server
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Could not bind {bind_addr}: {e}"));

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}

/// Creates the configured superuser unless the username is already taken.
/// The account signs in through the regular signup/token flow.
async fn ensure_superuser(repo: &RepositoryState, username: &str, email: &str) {
    if repo.get_user_by_username(username).await.is_some() {
        tracing::debug!(%username, "Bootstrap admin already present");
        return;
    }

    let admin = NewUser {
        username: username.to_string(),
        email: email.to_string(),
        role: Role::Admin,
        is_superuser: true,
        ..NewUser::default()
    };
    match repo.create_user(admin).await {
        Ok(user) => tracing::info!(username = %user.username, "Bootstrap admin created"),
        Err(e) => tracing::error!(%username, error = %e, "Could not create bootstrap admin"),
    }
}
