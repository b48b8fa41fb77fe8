use amber_relay_api::EventApiService;
use amber_relay_config::Config;
use amber_relay_core::service;
use amber_relay_data::MemoryExecutionLoader;
use amber_relay_executor::ExecutorService;
use amber_relay_runner::RunnerService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env().expect("failed to load configuration"));
    tracing::info!("loaded configuration");

    // Load function definitions from disk into the shared loader.
    let loader = Arc::new(MemoryExecutionLoader::new());
    match amber_relay_data::load_functions(&config.data.dir) {
        Ok(functions) => {
            tracing::info!(
                functions = functions.len(),
                dir = %config.data.dir,
                "loaded function definitions"
            );
            loader
                .set_functions(functions)
                .expect("invalid function definition");
        }
        Err(err) => {
            tracing::warn!(error = %err, "no function definitions loaded");
        }
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                cancel.cancel();
            }
        });
    }

    // The three services share backends through the config factories.
    let runner = RunnerService::new(Arc::clone(&config), loader);
    let executor = ExecutorService::new(Arc::clone(&config));
    let api = EventApiService::new(Arc::clone(&config));

    let mut services = tokio::task::JoinSet::new();
    services.spawn(service::start(runner, cancel.clone()));
    services.spawn(service::start(executor, cancel.clone()));
    services.spawn(service::start(api, cancel.clone()));

    while let Some(result) = services.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(error = %err, "service failed");
                cancel.cancel();
            }
            Err(err) => {
                tracing::error!(error = %err, "service task panicked");
                cancel.cancel();
            }
        }
    }
}
