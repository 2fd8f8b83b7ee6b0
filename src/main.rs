// src/main.rs
mod config;
mod handlers;
mod models;
mod proxies;
mod query;
mod ratelimit;
mod service;
mod storage;
mod utils;

use std::sync::Arc;
use actix_web::{ web, App, HttpServer };
use env_logger::Env;
use log::{ info, warn };
use crate::config::Config;
use crate::proxies::TrustedProxies;
use crate::query::protocol::UnconfiguredProtocol;
use crate::ratelimit::RequestQuota;
use crate::service::QueryService;
use crate::storage::memory::MemoryStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let bind = config.bind();

    let proxies = TrustedProxies::from_cidrs(&config.trusted_proxies);
    if config.fetch_cloudflare_ranges {
        if let Err(e) = proxies.load_cloudflare_ranges().await {
            log::error!("Failed to initialize Cloudflare IP ranges: {}", e);
            return Err(
                std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to initialize Cloudflare ranges: {}", e)
                )
            );
        }
    }
    if proxies.is_empty() {
        warn!("No trusted proxies configured, trusting {} from every peer", config.client_ip_header);
    } else {
        info!("Trusting {} from {} proxy ranges", config.client_ip_header, proxies.len());
    }

    warn!("No query protocol adapter linked, every server will report offline");
    let store = Arc::new(MemoryStore::new());
    let service = web::Data::new(QueryService::new(store, Arc::new(UnconfiguredProtocol), &config));
    let quota = web::Data::new(RequestQuota::new(config.query_quota()));
    let proxies = web::Data::new(proxies);

    spawn_sweeper(service.clone(), quota.clone(), config.sweep_interval());

    let config = web::Data::new(config);

    info!("Starting server on {}", bind);
    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(quota.clone())
            .app_data(proxies.clone())
            .app_data(config.clone())
            .route("/", web::get().to(handlers::index::index))
            .route("/query", web::get().to(handlers::query::query_get))
            .route("/query", web::post().to(handlers::query::query_post))
            .route("/tracked", web::get().to(handlers::query::tracked))
    })
        .bind(&bind)?
        .run().await
}

fn spawn_sweeper(service: web::Data<QueryService>, quota: web::Data<RequestQuota>, every: std::time::Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let (snapshots, counters) = service.sweep();
            quota.retain_recent();
            if snapshots > 0 || counters > 0 {
                info!("Swept {} expired snapshots and {} throttle counters", snapshots, counters);
            }
        }
    });
}
