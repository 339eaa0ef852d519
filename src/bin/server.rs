use rgenai_poster::{logger, server, AppConfig, GenerateHandler};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    logger::init_with_config(logger::LoggerConfig::development())?;
    match dotenv_loaded {
        true => log::info!("✅ .env file loaded"),
        false => log::warn!("⚠️  No .env file found, using system environment variables"),
    }

    let config = AppConfig::from_env()?;
    logger::log_config_info(&config);

    let handler = GenerateHandler::from_config(&config, true).await?;
    server::run(handler, config.port).await?;
    Ok(())
}
