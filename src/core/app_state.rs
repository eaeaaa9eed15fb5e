use std::sync::Arc;

use anyhow::Result;

use crate::{
    api::{email::MailerClient, payments::PaymentsClient},
    core::{
        config::Config,
        db::{self, DbPool},
    },
};

/// Shared per-process service handles, constructed once at startup and
/// injected into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub payments: PaymentsClient,
    pub mailer: MailerClient,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn init(config: Config) -> Result<Self> {
        let db_pool = db::create_pool(&config.database.url).await?;
        let http_client = reqwest::Client::new();
        let payments = PaymentsClient::new(http_client.clone(), &config.payments);
        let mailer = MailerClient::new(http_client, &config.mail);

        Ok(Self {
            db_pool,
            payments,
            mailer,
            config: Arc::new(config),
        })
    }
}
