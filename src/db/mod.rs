use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

// Definimos un alias para "Pool<Postgres>"
pub type DbPool = Pool<Postgres>;

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    // Aplicamos las migraciones de ./migrations al arrancar
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
