use lambda_runtime::{service_fn, Error, LambdaEvent};
use rgenai_poster::{logger, AppConfig, GenerateHandler};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    logger::init()?;
    if dotenv_loaded {
        log::debug!(".env file loaded");
    }

    let config = AppConfig::from_env()?;
    config.require_output_bucket()?;
    logger::log_config_info(&config);

    let handler = GenerateHandler::from_config(&config, false).await?;
    log::info!("🚀 Handler ready, waiting for invocations");

    let handler = &handler;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        let (payload, context) = event.into_parts();
        Ok::<Value, Error>(handler.handle_event(payload, &context.request_id).await)
    }))
    .await
}
