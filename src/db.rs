use sea_orm::{
    ConnectionTrait, ConnectOptions, Database, DatabaseConnection, DbBackend, DbErr, Schema,
    Statement,
};
use sea_orm::sea_query::TableCreateStatement;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{attachment, comment, event, op_log, organization, post, profile};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);

    let mut opt = ConnectOptions::new(&database_url);
    opt.max_connections(50)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(60))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .set_schema_search_path("public");

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Test database connection
pub async fn test_connection(config: &DatabaseConfig) -> Result<(), DbErr> {
    let database_url = config.connection_url();

    let mut opt = ConnectOptions::new(&database_url);
    opt.connect_timeout(Duration::from_secs(5));

    let db = Database::connect(opt).await?;
    db.ping().await?;

    Ok(())
}

/// Create all tables that do not exist yet
async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // Referenced tables first
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(profile::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(op_log::Entity)).await?;

    create_table_if_not_exists(db, backend, schema.create_table_from_entity(post::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(comment::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(attachment::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(event::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(organization::Entity)).await?;

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}
