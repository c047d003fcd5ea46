mod config;
mod db;
mod entity;
mod error;
mod fetch;
mod response;
mod routes;
mod seed;
mod store;

use std::io;

use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use db::connect_db;
use env_logger::Env;
use log::{error, info};
use response::{json_error_handler, path_error_handler, query_error_handler};
use seed::{seed_if_empty, SeedPlan};
use store::Store;

#[actix_web::main]
async fn main() -> io::Result<()> {
    config::load_env_file();
    let config = AppConfig::from_env();
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_str())).init();

    let db = connect_db(&config).await.map_err(|e| {
        error!("db connect failed: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;
    if config.seed_demo_data {
        if let Err(e) = seed_if_empty(&Store::new(db.clone()), SeedPlan::default()).await {
            error!("demo data seeding failed: {}", e);
        }
    }

    let bind = (config.server_host.clone(), config.server_port);
    info!("{} starting in {} mode", config.app_name, config.environment);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .wrap(middleware::Logger::default())
            .wrap(middleware::from_fn(routes::query_monitor::query_monitor))
            .configure(routes::config)
    })
    .bind(bind.clone())?;
    info!("server started at http://{}:{}", bind.0, bind.1);
    server.run().await
}
