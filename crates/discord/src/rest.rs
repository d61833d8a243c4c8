use std::time::Duration;

use async_trait::async_trait;
use huntbot_core::backend::{Channel, ChannelKind, ChannelService};
use huntbot_core::errors::BackendError;
use reqwest::{Client, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::events::ChatEnvelope;
use crate::gateway::{GatewayTransport, TransportError};
use crate::messages::MessageTemplate;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_VOICE: u8 = 2;
const CHANNEL_TYPE_CATEGORY: u8 = 4;

/// Guild channel management and message posting over the Discord REST API.
#[derive(Clone)]
pub struct DiscordRest {
    http: Client,
    base_url: Url,
    bot_token: SecretString,
    guild_id: String,
}

#[derive(Debug, Serialize)]
struct NewChannel<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    channel_type: u8,
    parent_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ChannelPatch<'a> {
    parent_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    channel_type: u8,
    #[serde(default)]
    parent_id: Option<String>,
}

impl From<ApiChannel> for Channel {
    fn from(channel: ApiChannel) -> Self {
        Self {
            id: channel.id,
            name: channel.name.unwrap_or_default(),
            kind: channel_kind(channel.channel_type),
            parent_id: channel.parent_id,
        }
    }
}

fn channel_kind(channel_type: u8) -> ChannelKind {
    match channel_type {
        CHANNEL_TYPE_TEXT => ChannelKind::Text,
        CHANNEL_TYPE_VOICE => ChannelKind::Voice,
        CHANNEL_TYPE_CATEGORY => ChannelKind::Category,
        _ => ChannelKind::Other,
    }
}

impl DiscordRest {
    pub fn new(
        base_url: &str,
        bot_token: SecretString,
        guild_id: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|error| {
            BackendError::Channels(format!("invalid discord api url `{base_url}`: {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Channels(format!(
                "discord api url `{base_url}` cannot carry a path"
            )));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(|error| {
            BackendError::Channels(format!("could not build http client: {error}"))
        })?;
        Ok(Self { http, base_url, bot_token, guild_id: guild_id.into() })
    }

    /// Posts `message` to `channel_id`.
    pub async fn create_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), BackendError> {
        let request = self.create_message_request(channel_id, message);
        send(request, "create message").await?;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        self.http
            .request(method, url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bot {}", self.bot_token.expose_secret()),
            )
    }

    fn create_channel_request(&self, name: &str, parent_category_id: &str) -> RequestBuilder {
        let body =
            NewChannel { name, channel_type: CHANNEL_TYPE_TEXT, parent_id: parent_category_id };
        self.request(reqwest::Method::POST, &["guilds", &self.guild_id, "channels"]).json(&body)
    }

    fn move_channel_request(&self, channel_id: &str, parent_category_id: &str) -> RequestBuilder {
        self.request(reqwest::Method::PATCH, &["channels", channel_id])
            .json(&ChannelPatch { parent_id: parent_category_id })
    }

    fn create_message_request(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> RequestBuilder {
        self.request(reqwest::Method::POST, &["channels", channel_id, "messages"]).json(message)
    }
}

async fn send(request: RequestBuilder, operation: &str) -> Result<Response, BackendError> {
    let response = request.send().await.map_err(|error| {
        BackendError::Channels(format!("discord {operation} request failed: {error}"))
    })?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Channels(format!(
        "discord {operation} returned {status}: {}",
        error_message(&body)
    )))
}

/// Discord error payloads carry a top-level `message`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned())
}

async fn decode<T: for<'de> Deserialize<'de>>(
    response: Response,
    operation: &str,
) -> Result<T, BackendError> {
    response.json::<T>().await.map_err(|error| {
        BackendError::Channels(format!("unreadable discord {operation} response: {error}"))
    })
}

#[async_trait]
impl ChannelService for DiscordRest {
    async fn create_text_channel(
        &self,
        name: &str,
        parent_category_id: &str,
    ) -> Result<String, BackendError> {
        let response =
            send(self.create_channel_request(name, parent_category_id), "create channel").await?;
        let channel: ApiChannel = decode(response, "create channel").await?;
        info!(
            event_name = "discord.channel.created",
            channel_id = %channel.id,
            parent_category_id,
            name,
            "text channel created"
        );
        Ok(channel.id)
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, BackendError> {
        let request = self.request(reqwest::Method::GET, &["channels", channel_id]);
        let response = send(request, "get channel").await?;
        let channel: ApiChannel = decode(response, "get channel").await?;
        Ok(channel.into())
    }

    async fn move_channel(
        &self,
        channel_id: &str,
        parent_category_id: &str,
    ) -> Result<(), BackendError> {
        send(self.move_channel_request(channel_id, parent_category_id), "move channel").await?;
        Ok(())
    }

    async fn find_channel_by_name(&self, name: &str) -> Result<Option<Channel>, BackendError> {
        let request = self.request(reqwest::Method::GET, &["guilds", &self.guild_id, "channels"]);
        let response = send(request, "list channels").await?;
        let channels: Vec<ApiChannel> = decode(response, "list channels").await?;
        Ok(channels
            .into_iter()
            .find(|channel| channel.name.as_deref() == Some(name))
            .map(Channel::from))
    }
}

/// Takes inbound events from `inbound` and posts channel replies through the
/// REST API instead of the gateway connection.
pub struct RestReplyTransport<T> {
    inbound: T,
    rest: DiscordRest,
}

impl<T: GatewayTransport> RestReplyTransport<T> {
    pub fn new(inbound: T, rest: DiscordRest) -> Self {
        Self { inbound, rest }
    }
}

#[async_trait]
impl<T: GatewayTransport> GatewayTransport for RestReplyTransport<T> {
    async fn connect(&self) -> Result<(), TransportError> {
        self.inbound.connect().await
    }

    async fn next_event(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        self.inbound.next_event().await
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        self.rest
            .create_message(channel_id, message)
            .await
            .map_err(|error| TransportError::Send(error.to_string()))
    }

    async fn respond_autocomplete(
        &self,
        interaction_id: &str,
        choices: &[String],
    ) -> Result<(), TransportError> {
        self.inbound.respond_autocomplete(interaction_id, choices).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.inbound.disconnect().await
    }
}
