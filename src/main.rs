#![allow(proc_macro_derive_resolution_fallback)] // See: https://github.com/diesel-rs/diesel/issues/1785

extern crate actix_rt;
extern crate actix_web;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate diesel;
extern crate chrono;
extern crate dotenv;
extern crate env_logger;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod api;
mod auth;
mod config;
mod db;
mod error;
mod models;
mod schema;
mod store;

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};

use self::config::{Config, Storage};
use self::db::AppState;
use self::store::{DocumentStore, MemoryStore, PgStore};

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let store: Arc<dyn DocumentStore> = match &config.storage {
        Storage::Postgres { database_url } => {
            let store = PgStore::connect(database_url, config.pool_size, config.query_timeout)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            Arc::new(store)
        }
        Storage::Memory => {
            warn!("Using the in-memory store; nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState {
        store,
        query_timeout: config.query_timeout,
        session_ttl: config.session_ttl,
    };

    let server = HttpServer::new(move || {
        App::new()
            .data(state.clone())
            .wrap(Logger::default())
            .wrap(Cors::new().finish())
            .configure(api::configure)
    })
    .bind(config.listen_addr)?;

    info!("Listening on {}", config.listen_addr);

    server.run().await
}
