mod api;
mod auth;
mod cache;
mod config;
mod datastore;
mod forms;
mod metrics;
mod pages;
mod paginator;
mod twoface;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate guard;
#[macro_use]
extern crate diesel;

use crate::api::admin::{validate_admin, AdminToken};
use crate::auth::AuthSettings;
use crate::cache::PageCache;
use crate::config::Config;
use crate::datastore::postgres::PostgresStore;
use actix_service::Service;
use actix_web::{dev::ServiceResponse, middleware, web, App, HttpServer};
use actix_web_httpauth::middleware::HttpAuthentication;
use datastore::postgres;
use futures::future::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

#[allow(clippy::cognitive_complexity)]
fn main() {
    let args: Vec<_> = std::env::args().collect();
    guard!(let [_, config_file_path, ..] = &args[..] else {
        eprintln!("First argument should be path to config file");
        return
    });

    let config = match Config::from_file(config_file_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return;
        }
    };

    // Set up logger output
    let subscriber_builder = tracing_subscriber::fmt().with_max_level(Level::DEBUG);
    if config.human_logs {
        subscriber_builder.init();
    } else {
        subscriber_builder.json().init();
    }

    info!("starting yatube");

    let sys = actix_rt::System::new("yatube");

    // Build the postgres client
    let db = PostgresStore::new(
        postgres::Dsn::new(&config),
        config.db_pool_size,
        Duration::from_secs(config.db_connection_timeout),
    )
    .expect("couldn't connect to Postgres");
    prometheus::register(Box::new(db.clone())).expect("couldn't register DB metrics");

    let state = api::State {
        ds: Arc::new(db),
        index_cache: PageCache::new(
            Duration::from_secs(config.index_cache_secs),
            config.index_cache_max_entries,
        ),
    };
    let auth_settings = AuthSettings {
        jwt_secret: config.jwt_secret.clone(),
        login_url: config.login_url.clone(),
    };

    // Start the userfacing site
    info!(
        addr = &config.userfacing_listen_address[..],
        "starting userfacing server"
    );
    let max_body_size = config.max_body_size;
    let userfacing_state = state.clone();
    HttpServer::new(move || {
        App::new()
            // Middleware for Prometheus
            .wrap_fn(|request, srv| srv.call(request).map(increment_response_metrics))
            .wrap(middleware::Logger::default())
            .data(userfacing_state.clone())
            .data(auth_settings.clone())
            .app_data(api::form_config(max_body_size))
            .configure(api::userfacing::configure::<PostgresStore>)
            .configure(api::follows::configure::<PostgresStore>)
            .default_service(web::route().to(api::userfacing::not_found))
    })
    .bind(config.userfacing_listen_address.clone())
    .expect("couldn't start userfacing HTTP server")
    .run();

    // Start the admin API, on its own address so it can stay off the public network
    info!(
        addr = &config.admin_listen_address[..],
        "starting admin API server"
    );
    let admin_token = AdminToken::new(&config.admin_token);
    HttpServer::new(move || {
        App::new()
            .wrap_fn(|request, srv| srv.call(request).map(increment_response_metrics))
            .wrap(middleware::Logger::default())
            .data(state.clone())
            .data(admin_token.clone())
            .data(web::JsonConfig::default().limit(max_body_size))
            .service(
                web::scope("/admin")
                    .wrap(HttpAuthentication::bearer(validate_admin))
                    .configure(api::admin::configure::<PostgresStore>),
            )
    })
    .bind(config.admin_listen_address.clone())
    .expect("couldn't start admin HTTP server")
    .run();

    // Start the metrics server
    info!(
        addr = &config.metrics_address[..],
        "starting metrics server"
    );
    HttpServer::new(|| {
        App::new().service(
            web::scope("/metrics")
                .service(web::resource("/").route(web::get().to(metrics::endpoint::gather)))
                .service(web::resource("").route(web::get().to(metrics::endpoint::gather))),
        )
    })
    .bind(config.metrics_address)
    .expect("couldn't start metrics server")
    .run();

    sys.run().expect("actix runtime terminated");
}

/// If response is OK, increment the metrics for HTTP statuses.
fn increment_response_metrics<E, B>(
    response: Result<ServiceResponse<B>, E>,
) -> Result<ServiceResponse<B>, E> {
    if let Ok(response) = &response {
        metrics::HTTP_RESPONSES
            .with_label_values(&[response.status().as_str()])
            .inc();
    }
    response
}
