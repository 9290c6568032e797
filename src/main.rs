mod config;
mod db;
mod errors;
mod fields;
mod handlers;
mod models;
mod repositories;
mod routes;
mod serializers;
mod storage;
mod utils;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::{AppConfig, StorageBackend},
    repositories::{CatRepository, InMemoryRepository, PgRepository, UserRepository},
    routes::AppState,
    storage::MediaStorage,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().expect("Configuración inválida");

    let (cats, users): (Arc<dyn CatRepository>, Arc<dyn UserRepository>) = match config.storage {
        StorageBackend::Postgres => {
            let database_url = config.database_url.as_deref().expect("DATABASE_URL debe estar en el .env");
            let pool = db::init_db(database_url, config.db_max_connections)
                .await
                .expect("Fallo al conectar a la base de datos");
            tracing::info!("✅ Conexión a Postgres exitosa");

            let repo = Arc::new(PgRepository::new(pool));
            let cats: Arc<dyn CatRepository> = repo.clone();
            let users: Arc<dyn UserRepository> = repo;
            (cats, users)
        }
        StorageBackend::Memory => {
            tracing::warn!("⚠️ Usando almacenamiento en memoria: los datos se pierden al reiniciar");

            let repo = Arc::new(InMemoryRepository::new());
            let cats: Arc<dyn CatRepository> = repo.clone();
            let users: Arc<dyn UserRepository> = repo;
            (cats, users)
        }
    };

    let media = MediaStorage::new(&config.upload_dir, &config.media_url);
    let state = AppState::new(cats, users, media, &config.jwt_secret);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::create_routes(state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("🚀 Servidor de gatos corriendo en http://{}", addr);

    let listener = TcpListener::bind(addr).await.expect("Fallo al enlazar el puerto");
    axum::serve(listener, app).await.unwrap();
}
