use anyhow::Context;
use member_search::{
    app,
    config::{Config, Profile},
    database,
    seed::seed_sample_data,
    store::{MemberStore, MemoryMemberStore, PgMemberStore},
    AppState,
};
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with reduced SQL verbosity
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("member_search=info,sqlx=warn,info")),
        )
        .init();

    let config = Config::from_env()?;

    match config.database_url.clone() {
        Some(database_url) => {
            let pool = database::create_pool(&database_url, config.max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;

            if config.skip_migrations {
                warn!("⚠️ Skipping migrations due to SKIP_MIGRATIONS=true");
            } else {
                database::run_migrations(&pool)
                    .await
                    .context("Failed to run migrations")?;
            }

            serve(PgMemberStore::new(pool), &config).await
        }
        None => {
            warn!("⚠️ DATABASE_URL not set: using the in-memory store");
            serve(MemoryMemberStore::new(), &config).await
        }
    }
}

async fn serve<S: MemberStore>(store: S, config: &Config) -> anyhow::Result<()> {
    let state = AppState::new(store);

    if config.profile == Profile::Local {
        seed_sample_data(&state.members)
            .await
            .context("Failed to seed sample data")?;
    }

    let router = app(state, &config.allowed_origins);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("HOST/PORT do not form a valid socket address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 Server starting on http://{}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
