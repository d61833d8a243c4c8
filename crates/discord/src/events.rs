use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use huntbot_core::directory::{PuzzleDirectory, MAX_SUGGESTIONS};
use thiserror::Error;
use uuid::Uuid;

use crate::commands::{parse_command, CommandRouter};
use crate::messages::MessageTemplate;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub event_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    MessageCreated(MessageCreatedEvent),
    Autocomplete(AutocompleteEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::MessageCreated(_) => ChatEventType::MessageCreated,
            Self::Autocomplete(_) => ChatEventType::Autocomplete,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    /// Channel replies are posted to.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Self::MessageCreated(event) => Some(&event.channel_id),
            Self::Autocomplete(event) => Some(&event.channel_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    MessageCreated,
    Autocomplete,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageCreatedEvent {
    pub channel_id: String,
    pub author_id: String,
    pub author_is_bot: bool,
    pub content: String,
}

/// A partially typed option value the user wants completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutocompleteEvent {
    pub interaction_id: String,
    pub channel_id: String,
    pub field: String,
    pub partial: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    /// Correlates by gateway event id, or a fresh id when the gateway gave
    /// none.
    pub fn for_envelope(envelope: &ChatEnvelope) -> Self {
        let correlation_id = if envelope.event_id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            envelope.event_id.clone()
        };
        Self { correlation_id }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<MessageTemplate>),
    Suggested(Vec<String>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("autocomplete requested for unsupported field `{0}`")]
    UnsupportedField(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wired to `directory`: prefixed chat commands and autocomplete.
pub fn directory_dispatcher(
    directory: Arc<PuzzleDirectory>,
    prefix: &str,
    voice_category_id: Option<String>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageCommandHandler::new(CommandRouter::new(
        directory.clone(),
        prefix,
        voice_category_id,
    )));
    dispatcher.register(AutocompleteHandler::new(directory));
    dispatcher
}

pub struct MessageCommandHandler {
    router: CommandRouter,
}

impl MessageCommandHandler {
    pub fn new(router: CommandRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for MessageCommandHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::MessageCreated
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::MessageCreated(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.author_is_bot {
            return Ok(HandlerResult::Ignored);
        }

        let Some(command) = parse_command(
            self.router.prefix(),
            &event.content,
            &event.channel_id,
            &event.author_id,
            &ctx.correlation_id,
        ) else {
            return Ok(HandlerResult::Processed);
        };

        Ok(HandlerResult::Responded(self.router.route(&command).await))
    }
}

/// Completes the `name` and `round` options from the directory caches.
pub struct AutocompleteHandler {
    directory: Arc<PuzzleDirectory>,
}

impl AutocompleteHandler {
    pub fn new(directory: Arc<PuzzleDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl EventHandler for AutocompleteHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Autocomplete
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Autocomplete(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let choices = match event.field.as_str() {
            "name" => self.directory.suggest_puzzle_names(&event.partial, MAX_SUGGESTIONS).await,
            "round" => self.directory.suggest_rounds(&event.partial, MAX_SUGGESTIONS).await,
            other => return Err(EventHandlerError::UnsupportedField(other.to_owned())),
        };
        Ok(HandlerResult::Suggested(choices))
    }
}
