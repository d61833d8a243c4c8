use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{ChatEnvelope, ChatEvent, EventContext, EventDispatcher, HandlerResult};
use crate::messages::MessageTemplate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway send failed: {0}")]
    Send(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// The chat connection: inbound events and the two outbound reply kinds.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_event(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn send_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), TransportError>;
    async fn respond_autocomplete(
        &self,
        interaction_id: &str,
        choices: &[String],
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// A transport with no events; the runner connects and returns immediately.
#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn send_message(
        &self,
        _channel_id: &str,
        _message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn respond_autocomplete(
        &self,
        _interaction_id: &str,
        _choices: &[String],
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "gateway retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening gateway connection");
        self.transport.connect().await?;
        info!(attempt, "gateway connected");

        loop {
            let Some(envelope) = self.transport.next_event().await? else {
                info!(attempt, "gateway stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let context = EventContext::for_envelope(&envelope);

            debug!(
                event_name = "ingress.gateway.event_received",
                event_type = ?envelope.event.event_type(),
                correlation_id = %context.correlation_id,
                "received gateway event"
            );

            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(replies)) => {
                    self.deliver_replies(&envelope, &context, &replies).await;
                }
                Ok(HandlerResult::Suggested(choices)) => {
                    self.deliver_choices(&envelope, &context, &choices).await;
                }
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
                Err(error) => {
                    warn!(
                        correlation_id = %context.correlation_id,
                        error = %error,
                        "event dispatch failed; continuing gateway loop"
                    );
                }
            }
        }
    }

    async fn deliver_replies(
        &self,
        envelope: &ChatEnvelope,
        context: &EventContext,
        replies: &[MessageTemplate],
    ) {
        let Some(channel_id) = envelope.event.channel_id() else {
            return;
        };

        for reply in replies {
            if let Err(error) = self.transport.send_message(channel_id, reply).await {
                warn!(
                    event_name = "egress.gateway.reply_failed",
                    correlation_id = %context.correlation_id,
                    channel_id,
                    error = %error,
                    "failed to post reply"
                );
            }
        }
    }

    async fn deliver_choices(
        &self,
        envelope: &ChatEnvelope,
        context: &EventContext,
        choices: &[String],
    ) {
        let ChatEvent::Autocomplete(event) = &envelope.event else {
            return;
        };

        if let Err(error) =
            self.transport.respond_autocomplete(&event.interaction_id, choices).await
        {
            warn!(
                event_name = "egress.gateway.autocomplete_failed",
                correlation_id = %context.correlation_id,
                interaction_id = %event.interaction_id,
                error = %error,
                "failed to answer autocomplete"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use huntbot_core::backend::memory::{
        InMemoryChannelService, InMemoryDocumentService, InMemoryTabularStore,
    };
    use huntbot_core::directory::{DirectoryLayout, PuzzleDirectory};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::{GatewayRunner, GatewayTransport, ReconnectPolicy, TransportError};
    use crate::events::{
        directory_dispatcher, AutocompleteEvent, ChatEnvelope, ChatEvent, EventDispatcher,
        MessageCreatedEvent,
    };
    use crate::messages::MessageTemplate;

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        events: VecDeque<Result<Option<ChatEnvelope>, TransportError>>,
        send_results: VecDeque<Result<(), TransportError>>,
        connect_attempts: usize,
        sent: Vec<(String, String)>,
        choices: Vec<(String, Vec<String>)>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            events: Vec<Result<Option<ChatEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    events: events.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn fail_next_send(&self, message: &str) {
            self.state.lock().await.send_results.push_back(Err(TransportError::Send(
                message.to_owned(),
            )));
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn sent(&self) -> Vec<(String, String)> {
            self.state.lock().await.sent.clone()
        }

        async fn choices(&self) -> Vec<(String, Vec<String>)> {
            self.state.lock().await.choices.clone()
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_event(&self) -> Result<Option<ChatEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.events.pop_front().unwrap_or(Ok(None))
        }

        async fn send_message(
            &self,
            channel_id: &str,
            message: &MessageTemplate,
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            let result = state.send_results.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                state.sent.push((channel_id.to_owned(), message.content.clone()));
            }
            result
        }

        async fn respond_autocomplete(
            &self,
            interaction_id: &str,
            choices: &[String],
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.choices.push((interaction_id.to_owned(), choices.to_vec()));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.state.lock().await.disconnect_calls += 1;
            Ok(())
        }
    }

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn message(event_id: &str, content: &str) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(Some(ChatEnvelope {
            event_id: event_id.to_owned(),
            event: ChatEvent::MessageCreated(MessageCreatedEvent {
                channel_id: "C1".to_owned(),
                author_id: "U1".to_owned(),
                author_is_bot: false,
                content: content.to_owned(),
            }),
        }))
    }

    async fn dispatcher() -> EventDispatcher {
        let store = InMemoryTabularStore::with_rows(vec![
            vec![json!("Round"), json!("Name")],
            vec![json!("Act I"), json!("Alpha")],
        ]);
        let directory = Arc::new(PuzzleDirectory::new(
            Arc::new(store),
            Arc::new(InMemoryDocumentService::default()),
            Arc::new(InMemoryChannelService::default()),
            DirectoryLayout::new("A:G".parse().expect("range"), "10", "20", "folder"),
        ));
        directory.rebuild_caches().await.expect("rebuild");
        directory_dispatcher(directory, "!", None)
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![
                Ok(Some(ChatEnvelope {
                    event_id: "evt-1".to_owned(),
                    event: ChatEvent::Unsupported { event_type: "TYPING_START".to_owned() },
                })),
                Ok(None),
            ],
        ));

        let runner =
            GatewayRunner::new(transport.clone(), EventDispatcher::default(), fast_policy());

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.disconnect_calls().await, 1);
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner =
            GatewayRunner::new(transport.clone(), EventDispatcher::default(), fast_policy());

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn posts_command_replies_to_the_source_channel() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![message("evt-1", "hello team"), message("evt-2", "!names"), Ok(None)],
        ));

        let runner = GatewayRunner::new(transport.clone(), dispatcher().await, fast_policy());
        runner.start().await.expect("runner");

        assert_eq!(
            transport.sent().await,
            vec![("C1".to_owned(), "**Puzzles**\n- Alpha".to_owned())]
        );
    }

    #[tokio::test]
    async fn failed_reply_does_not_stop_the_loop() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![message("evt-1", "!names"), message("evt-2", "!rounds"), Ok(None)],
        ));
        transport.fail_next_send("rate limited").await;

        let runner = GatewayRunner::new(transport.clone(), dispatcher().await, fast_policy());
        runner.start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 1);
        assert_eq!(
            transport.sent().await,
            vec![("C1".to_owned(), "**Rounds**\n- Act I".to_owned())]
        );
    }

    #[tokio::test]
    async fn answers_autocomplete_interactions() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(ChatEnvelope {
                    event_id: "evt-1".to_owned(),
                    event: ChatEvent::Autocomplete(AutocompleteEvent {
                        interaction_id: "int-1".to_owned(),
                        channel_id: "C1".to_owned(),
                        field: "name".to_owned(),
                        partial: "al".to_owned(),
                    }),
                })),
                Ok(None),
            ],
        ));

        let runner = GatewayRunner::new(transport.clone(), dispatcher().await, fast_policy());
        runner.start().await.expect("runner");

        assert_eq!(transport.choices().await, vec![("int-1".to_owned(), vec!["Alpha".to_owned()])]);
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.backoff(0), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(10), Duration::from_millis(5_000));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_millis(5_000));
    }
}
