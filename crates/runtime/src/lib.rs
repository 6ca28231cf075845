use std::sync::Arc;

use anyhow::{Context, Result};
use parley_collaboration::CollaborationScheduler;
use parley_config::AppConfig;
use parley_conversation::{Collaborators, ConversationService, Message, SendResult};
use parley_database::{initialize_database, BroadcastTransport, MessageRepository};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global fmt subscriber. Logs go to stderr so stdout stays
    /// free for conversation output.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct ParleyServices {
    pub db_pool: SqlitePool,
    pub messages: Arc<MessageRepository>,
    pub transport: Arc<BroadcastTransport>,
    pub conversation: Arc<ConversationService>,
    pub collaboration: CollaborationScheduler,
}

impl ParleyServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let db_pool = initialize_database(&config.database).await?;

        let transport = Arc::new(BroadcastTransport::new());
        let messages = Arc::new(MessageRepository::new(
            db_pool.clone(),
            transport.as_ref().clone(),
        ));
        let conversation = Arc::new(ConversationService::new(
            &config.conversation,
            Collaborators::new(messages.clone(), transport.clone(), messages.clone()),
        ));
        let collaboration = CollaborationScheduler::from_config(&config.collaboration);

        info!(scope = %conversation.scope(), "conversation services ready");

        Ok(Self {
            db_pool,
            messages,
            transport,
            conversation,
            collaboration,
        })
    }

    /// Send a viewer message and, once it is accepted and stored, start a
    /// collaboration run for it.
    pub async fn submit(&self, content: &str) -> SendResult<Message> {
        let message = self.conversation.send(content).await?;

        if let Err(error) = self.collaboration.start_processing() {
            warn!(%error, "could not start collaboration run");
        }
        Ok(message)
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
