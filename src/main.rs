use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use service_bookings::config::AppConfig;
use service_bookings::db;
use service_bookings::handlers;
use service_bookings::services::notifications::emailjs::EmailJsNotifier;
use service_bookings::services::notifications::log::LogNotifier;
use service_bookings::services::notifications::Notifier;
use service_bookings::services::rate_limit::FixedWindowRateLimiter;
use service_bookings::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn Notifier> = if config.emailjs_configured() {
        tracing::info!("using EmailJS notifier (service: {})", config.emailjs_service_id);
        Box::new(EmailJsNotifier::new(
            config.emailjs_service_id.clone(),
            config.emailjs_template_id.clone(),
            config.emailjs_public_key.clone(),
            config.emailjs_private_key.clone(),
        )?)
    } else {
        tracing::warn!("EmailJS not configured, notifications will only be logged");
        Box::new(LogNotifier)
    };

    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is the default value, set it before exposing the service");
    }

    let rate_limiter = FixedWindowRateLimiter::new(
        config.rate_limit_max,
        Duration::from_secs(config.rate_limit_window_secs),
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier,
        rate_limiter: Box::new(rate_limiter),
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
