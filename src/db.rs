use log::{info, LevelFilter};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::fs;
use std::path::Path;

use crate::config::AppConfig;

pub async fn connect_db(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    if !config.is_in_memory() {
        ensure_sqlite_dir(config);
    }
    connect_url(&config.database_url()).await
}

/// Opens a pool on `url` and creates the schema if the tables are missing.
pub async fn connect_url(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url.to_string());
    opt.sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);
    if url.contains(":memory:") {
        // every pooled connection would otherwise see its own empty database
        opt.max_connections(1).min_connections(1);
    }
    let db = Database::connect(opt).await?;
    init_sqlite_schema(&db).await?;
    Ok(db)
}

fn ensure_sqlite_dir(config: &AppConfig) {
    let raw = config.database_url();
    let path = raw
        .strip_prefix("sqlite://")
        .or_else(|| raw.strip_prefix("sqlite:"))
        .unwrap_or(raw.as_str());
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        let _ = fs::create_dir_all(parent);
    }
}

async fn init_sqlite_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, "PRAGMA foreign_keys = ON".to_string()))
        .await?;

    let exists_stmt = Statement::from_string(
        backend,
        "SELECT name FROM sqlite_master WHERE type='table' AND name='users' LIMIT 1".to_string(),
    );
    if db.query_one(exists_stmt).await?.is_some() {
        return Ok(());
    }

    let sql = include_str!("../schema-sqlite.sql");
    for stmt in split_sql(sql) {
        db.execute(Statement::from_string(backend, stmt)).await?;
    }
    info!("sqlite schema created");
    Ok(())
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
pub(crate) async fn memory_db() -> DatabaseConnection {
    connect_url("sqlite::memory:")
        .await
        .expect("in-memory sqlite")
}
