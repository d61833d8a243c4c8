use std::sync::Arc;

use huntbot_core::backend::{ChannelKind, ChannelService, DocumentService, TabularStore};
use huntbot_core::config::{AppConfig, ConfigError};
use huntbot_core::directory::PuzzleDirectory;
use huntbot_core::errors::{BackendError, DirectoryError};
use huntbot_discord::events::directory_dispatcher;
use huntbot_discord::gateway::{
    GatewayRunner, GatewayTransport, NoopGatewayTransport, ReconnectPolicy,
};
use huntbot_discord::{DiscordRest, RestReplyTransport};
use huntbot_google::{GoogleDriveDocuments, GoogleSheetsStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub directory: Arc<PuzzleDirectory>,
    pub gateway: GatewayRunner,
}

/// Backends the directory is assembled from.
pub struct Backends {
    pub store: Arc<dyn TabularStore>,
    pub documents: Arc<dyn DocumentService>,
    pub channels: Arc<dyn ChannelService>,
    pub transport: Arc<dyn GatewayTransport>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not construct backend adapter: {0}")]
    Adapter(#[source] BackendError),
    #[error("could not verify category `{setting}` ({channel_id}): {source}")]
    CategoryLookup {
        setting: &'static str,
        channel_id: String,
        #[source]
        source: BackendError,
    },
    #[error("`{setting}` ({channel_id}) is not a category channel")]
    NotACategory { setting: &'static str, channel_id: String },
    #[error("initial cache rebuild failed: {0}")]
    CacheRebuild(#[source] DirectoryError),
}

/// Builds the Google and Discord adapters from `config` and assembles the
/// application over them.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let store = GoogleSheetsStore::new(
        &config.google.sheets_base_url,
        config.google.access_token.clone(),
        config.google.puzzle_sheet_id.clone(),
        config.directory_layout()?.record_range,
    )
    .map_err(BootstrapError::Adapter)?;
    let documents =
        GoogleDriveDocuments::new(&config.google.drive_base_url, config.google.access_token.clone())
            .map_err(BootstrapError::Adapter)?;
    let channels = DiscordRest::new(
        &config.discord.api_base_url,
        config.discord.bot_token.clone(),
        &config.discord.guild_id,
    )
    .map_err(BootstrapError::Adapter)?;

    let transport = RestReplyTransport::new(NoopGatewayTransport, channels.clone());
    let backends = Backends {
        store: Arc::new(store),
        documents: Arc::new(documents),
        channels: Arc::new(channels),
        transport: Arc::new(transport),
    };
    bootstrap_with_backends(config, backends).await
}

/// Verifies the configured categories, primes the name caches and wires the
/// gateway dispatcher.
pub async fn bootstrap_with_backends(
    config: AppConfig,
    backends: Backends,
) -> Result<Application, BootstrapError> {
    let layout = config.directory_layout()?;

    verify_category(
        backends.channels.as_ref(),
        "discord.puzzle_category_id",
        &layout.puzzle_category_id,
    )
    .await?;
    verify_category(
        backends.channels.as_ref(),
        "discord.solved_category_id",
        &layout.solved_category_id,
    )
    .await?;
    if let Some(voice_category_id) = &config.discord.voice_category_id {
        verify_category(
            backends.channels.as_ref(),
            "discord.voice_category_id",
            voice_category_id,
        )
        .await?;
    }
    info!(
        event_name = "system.bootstrap.categories_verified",
        correlation_id = "bootstrap",
        "channel categories verified"
    );

    let directory = Arc::new(PuzzleDirectory::new(
        backends.store,
        backends.documents,
        backends.channels,
        layout,
    ));
    directory.rebuild_caches().await.map_err(BootstrapError::CacheRebuild)?;
    let (rounds, names) = directory.cache_counts().await;
    info!(
        event_name = "system.bootstrap.caches_primed",
        correlation_id = "bootstrap",
        rounds,
        names,
        "name caches primed"
    );

    let dispatcher = directory_dispatcher(
        directory.clone(),
        &config.discord.command_prefix,
        config.discord.voice_category_id.clone(),
    );
    let gateway = GatewayRunner::new(backends.transport, dispatcher, ReconnectPolicy::default());

    Ok(Application { config, directory, gateway })
}

async fn verify_category(
    channels: &dyn ChannelService,
    setting: &'static str,
    channel_id: &str,
) -> Result<(), BootstrapError> {
    let channel = channels.get_channel(channel_id).await.map_err(|source| {
        BootstrapError::CategoryLookup { setting, channel_id: channel_id.to_owned(), source }
    })?;
    if channel.kind != ChannelKind::Category {
        return Err(BootstrapError::NotACategory { setting, channel_id: channel_id.to_owned() });
    }
    Ok(())
}
