use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub server_host: String,
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub log_level: String,
    pub seed_demo_data: bool,
}

/// Loads `.env.prod` when `ENVIRONMENT=production`, `.env` otherwise.
/// A missing file is not an error.
pub fn load_env_file() {
    let file = match env::var("ENVIRONMENT").as_deref() {
        Ok("production") => ".env.prod",
        _ => ".env",
    };
    dotenvy::from_filename(file).ok();
}

impl AppConfig {
    pub fn from_env() -> Self {
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "N+1 Query Lab".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8000);

        let sqlite_path = env::var("SQLITE_PATH").unwrap_or_else(|_| "./data/db.sqlite3".to_string());
        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let seed_demo_data = env::var("SEED_DEMO_DATA")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Self {
            app_name,
            environment,
            server_host,
            server_port,
            sqlite_path,
            database_url,
            log_level: log_level.to_lowercase(),
            seed_demo_data,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}?mode=rwc", path)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url().contains(":memory:")
    }
}
