mod classifier;
mod cli;
mod config;
mod error;
mod handlers;
mod labels;
mod models;
mod predictor;
mod preprocess;
mod store;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use config::{Cli, Command, ServeArgs};
use labels::LabelMap;
use log::{info, warn};
use predictor::Predictor;
use std::sync::Arc;
use store::ModelStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Cli::parse();
    let labels = LabelMap::load(&opts.model.labels_path)?;
    let predictor = Predictor::new(ModelStore::onnx(&opts.model.model_path), labels);

    match opts.command {
        Some(Command::Predict(args)) => cli::run_predict(&predictor, &args),
        Some(Command::Info) => cli::run_info(&predictor),
        Some(Command::Serve(args)) => serve(predictor, args).await,
        None => serve(predictor, opts.serve).await,
    }
}

async fn serve(predictor: Predictor, args: ServeArgs) -> anyhow::Result<()> {
    if args.lazy {
        info!("model will load on first request");
    } else if predictor.store.get().is_err() {
        // already logged by the store; requests will retry and report it
        warn!("starting without a model: {}", predictor.store.path().display());
    }

    let state = web::Data::new(handlers::AppState {
        predictor: Arc::new(predictor),
        max_upload_bytes: args.max_upload_bytes,
    });
    let addr = (args.host, args.port);
    info!("Server running at http://{}:{}", addr.0, addr.1);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .configure(handlers::routes)
    })
    .bind(&addr)
    .with_context(|| format!("binding {}:{}", addr.0, addr.1))?
    .run()
    .await
    .context("server error")
}
