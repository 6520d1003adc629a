use anyhow::Result;
use rental_billing::{
    axum_http,
    config::config_loader,
    domain::repositories::record_store::RecordStore,
    infra::{
        db::{postgres::postgres_connection, repositories::documents::DocumentPostgres},
        memory::record_store::InMemoryRecordStore,
    },
    observability::init_observability,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Billing service exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_observability("rental-billing")?;

    let dotenvy_env = Arc::new(config_loader::load()?);
    info!(stage = %config_loader::get_stage(), "ENV has been loaded");

    let store: Arc<dyn RecordStore> = match &dotenvy_env.database {
        Some(database) => {
            let postgres_pool = postgres_connection::establish_connection(&database.url)?;
            info!("Postgres connection has been established");
            Arc::new(DocumentPostgres::new(Arc::new(postgres_pool)))
        }
        None => {
            warn!("DATABASE_URL is not set; records are kept in memory and lost on restart");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    axum_http::http_serve::start(dotenvy_env, store).await
}
