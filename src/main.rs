use axum::extract::FromRef;
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;
mod error;
mod extract;
mod films;
mod relations;
mod routes;
mod store;
mod users;

use config::settings::Settings;
use relations::RelationshipService;
use store::{postgres::PgStore, Store};

#[derive(Clone)]
pub struct AppState<S> {
    store: S,
    relations: RelationshipService<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            relations: RelationshipService::new(store.clone()),
            store,
        }
    }
}

impl<S: Store> FromRef<AppState<S>> for RelationshipService<S> {
    fn from_ref(app_state: &AppState<S>) -> RelationshipService<S> {
        app_state.relations.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new()?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    info!("database connected");

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("migrations applied");

    let app = routes::router(AppState::new(PgStore::new(pool)));

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
