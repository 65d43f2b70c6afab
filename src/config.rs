use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub operator_email: String,
    pub emailjs_service_id: String,
    pub emailjs_template_id: String,
    pub emailjs_public_key: String,
    pub emailjs_private_key: String,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "bookings.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            operator_email: env::var("OPERATOR_EMAIL").unwrap_or_default(),
            emailjs_service_id: env::var("EMAILJS_SERVICE_ID").unwrap_or_default(),
            emailjs_template_id: env::var("EMAILJS_TEMPLATE_ID").unwrap_or_default(),
            emailjs_public_key: env::var("EMAILJS_PUBLIC_KEY").unwrap_or_default(),
            emailjs_private_key: env::var("EMAILJS_PRIVATE_KEY").unwrap_or_default(),
            rate_limit_max: env::var("BOOKING_RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            rate_limit_window_secs: env::var("BOOKING_RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }

    /// Email delivery needs a service, a template and a public key; the
    /// private key is optional.
    pub fn emailjs_configured(&self) -> bool {
        !self.emailjs_service_id.is_empty()
            && !self.emailjs_template_id.is_empty()
            && !self.emailjs_public_key.is_empty()
    }
}
