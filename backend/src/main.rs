use actix_web::{web, App, HttpServer};
use backend::config::AppConfig;
use backend::enrich::{self, Enricher};
use backend::job_controller::state::{start_run_updater, RunsState};
use backend::services::products::{self, ProductsConfig};
use env_logger::Env;
use log::info;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(io::Error::other)?;
    let enricher = enrich::from_config(&config.enrichment).map_err(io::Error::other)?;
    info!(
        "enrichment provider: {:?}, model {}",
        config.enrichment.provider, config.enrichment.model
    );

    // Initialize run registry
    let (runs_state, rx) = RunsState::new(100, config.run_retention);

    // Start run updater task
    let updater_state = runs_state.clone();
    tokio::spawn(async move {
        start_run_updater(updater_state, rx).await;
    });

    let enricher: web::Data<dyn Enricher> = web::Data::from(enricher);
    let products_config = ProductsConfig {
        upload_limit: config.upload_limit,
    };
    let json_limit = config.json_limit;

    info!("Server running at {}", config.url());

    HttpServer::new(move || {
        App::new()
            .app_data(products::json_config(json_limit))
            .app_data(web::Data::new(runs_state.clone()))
            .app_data(enricher.clone())
            .app_data(web::Data::new(products_config))
            .service(products::configure_routes())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
