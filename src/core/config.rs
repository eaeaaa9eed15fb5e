use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub payments: PaymentsConfig,
    pub mail: MailConfig,
    pub pharmacist: PharmacistConfig,
    /// Public origin used to build checkout return URLs, e.g. "https://example.com".
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub api_url: String,
    pub secret_key: String,
    pub currency: String,
    /// Consultation fee in minor units, keyed by leave type.
    pub personal_fee_cents: i64,
    pub carer_fee_cents: i64,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
    /// Inbox notified of every newly authorized booking.
    pub admin_address: String,
}

#[derive(Debug, Clone)]
pub struct PharmacistConfig {
    pub name: String,
    pub registration: String,
    pub contact_line: String,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn load() -> Result<Config> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let port = var_or("PORT", "3000")
        .parse::<u16>()
        .context("PORT must be a valid port number")?;

    let personal_fee_cents = var_or("PERSONAL_FEE_CENTS", "1990")
        .parse::<i64>()
        .context("PERSONAL_FEE_CENTS must be an integer amount in cents")?;
    let carer_fee_cents = var_or("CARER_FEE_CENTS", "1990")
        .parse::<i64>()
        .context("CARER_FEE_CENTS must be an integer amount in cents")?;

    Ok(Config {
        database: DatabaseConfig { url: database_url },
        server: ServerConfig { port },
        payments: PaymentsConfig {
            api_url: var_or("PAYMENTS_API_URL", "https://api.payments.local/v1"),
            secret_key: var_or("PAYMENTS_SECRET_KEY", ""),
            currency: var_or("PAYMENTS_CURRENCY", "aud"),
            personal_fee_cents,
            carer_fee_cents,
        },
        mail: MailConfig {
            api_url: var_or("MAIL_API_URL", "https://api.mail.local/v1"),
            api_key: var_or("MAIL_API_KEY", ""),
            from_address: var_or("MAIL_FROM_ADDRESS", "certificates@example.com"),
            admin_address: var_or("MAIL_ADMIN_ADDRESS", "pharmacist@example.com"),
        },
        pharmacist: PharmacistConfig {
            name: var_or("PHARMACIST_NAME", "Sarah Chen"),
            registration: var_or("PHARMACIST_REGISTRATION", "PHA0000000000"),
            contact_line: var_or(
                "PHARMACIST_CONTACT_LINE",
                "Enquiries: certificates@example.com",
            ),
        },
        public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:3000"),
    })
}
