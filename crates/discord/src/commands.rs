use std::sync::Arc;

use huntbot_core::backend::ChannelKind;
use huntbot_core::directory::{PuzzleDirectory, MAX_SUGGESTIONS};
use huntbot_core::domain::answer::CanonicalAnswer;
use huntbot_core::domain::puzzle::{DocumentKind, PuzzleRecord};
use huntbot_core::errors::{BackendError, DirectoryError, InterfaceError};
use tracing::{info, warn};

use crate::messages::{self, MessageTemplate};

/// Voice channels are pre-provisioned as `puzzchat1`, `puzzchat2`, ...
pub const VOICE_CHANNEL_PREFIX: &str = "puzzchat";

/// Separates a new puzzle's name from its round: `new Crossing Guard | Act I`.
pub const ROUND_SEPARATOR: char = '|';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub verb: String,
    pub args: String,
    pub channel_id: String,
    pub author_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PuzzleCommand {
    Puzzle { name: Option<String> },
    Find { query: String },
    New { name: String, round: Option<String> },
    Attach { kind: DocumentKind },
    Voice { number: Option<u32> },
    Solve { raw_answer: String },
    BulkImport,
    Rounds { query: String },
    Names { query: String },
    Help,
    Unknown { verb: String },
}

/// Splits `content` into a command envelope when it starts with `prefix`.
/// Returns `None` for ordinary chat.
pub fn parse_command(
    prefix: &str,
    content: &str,
    channel_id: &str,
    author_id: &str,
    request_id: &str,
) -> Option<CommandEnvelope> {
    let body = content.trim().strip_prefix(prefix)?;
    let body = body.trim_start();
    let (verb, args) = match body.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (body, ""),
    };
    if verb.is_empty() {
        return None;
    }

    Some(CommandEnvelope {
        verb: verb.to_ascii_lowercase(),
        args: args.to_owned(),
        channel_id: channel_id.to_owned(),
        author_id: author_id.to_owned(),
        request_id: request_id.to_owned(),
    })
}

pub fn classify_command(verb: &str, args: &str) -> PuzzleCommand {
    let args = args.trim();
    match verb {
        "puzzle" => PuzzleCommand::Puzzle {
            name: if args.is_empty() { None } else { Some(args.to_owned()) },
        },
        "find" => PuzzleCommand::Find { query: args.to_owned() },
        "new" => {
            let (name, round) = match args.split_once(ROUND_SEPARATOR) {
                Some((name, round)) => (name.trim(), Some(round.trim())),
                None => (args, None),
            };
            PuzzleCommand::New {
                name: name.to_owned(),
                round: round.filter(|round| !round.is_empty()).map(str::to_owned),
            }
        }
        "sheet" => PuzzleCommand::Attach { kind: DocumentKind::Sheet },
        "doc" => PuzzleCommand::Attach { kind: DocumentKind::Doc },
        "voice" => PuzzleCommand::Voice { number: args.parse().ok() },
        "solve" => PuzzleCommand::Solve { raw_answer: args.to_owned() },
        "bulkimport" => PuzzleCommand::BulkImport,
        "rounds" => PuzzleCommand::Rounds { query: args.to_owned() },
        "names" => PuzzleCommand::Names { query: args.to_owned() },
        "help" => PuzzleCommand::Help,
        _ => PuzzleCommand::Unknown { verb: verb.to_owned() },
    }
}

/// Maps each command onto one directory call and renders the outcome as
/// replies. Directory failures become error replies; nothing is propagated.
pub struct CommandRouter {
    directory: Arc<PuzzleDirectory>,
    prefix: String,
    voice_category_id: Option<String>,
}

impl CommandRouter {
    pub fn new(
        directory: Arc<PuzzleDirectory>,
        prefix: impl Into<String>,
        voice_category_id: Option<String>,
    ) -> Self {
        Self { directory, prefix: prefix.into(), voice_category_id }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub async fn route(&self, envelope: &CommandEnvelope) -> Vec<MessageTemplate> {
        let command = classify_command(&envelope.verb, &envelope.args);
        info!(
            event_name = "command.received",
            verb = %envelope.verb,
            channel_id = %envelope.channel_id,
            correlation_id = %envelope.request_id,
            "puzzle command received"
        );

        match self.execute(command, envelope).await {
            Ok(replies) => replies,
            Err(error) => self.failure_reply(error, envelope),
        }
    }

    async fn execute(
        &self,
        command: PuzzleCommand,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<MessageTemplate>, DirectoryError> {
        let channel_id = envelope.channel_id.as_str();
        let replies = match command {
            PuzzleCommand::Puzzle { name: None } => {
                bound_record(self.directory.get_by_channel_id(channel_id).await?)
            }
            PuzzleCommand::Puzzle { name: Some(name) } => {
                match self.directory.get_by_name(&name).await? {
                    Some(record) => cards(&[record]),
                    None => vec![messages::error_message(&format!("no puzzle named '{name}'"))],
                }
            }
            PuzzleCommand::Find { query } => {
                let records = self.directory.find_by_name(&query).await?;
                if records.is_empty() {
                    vec![messages::error_message(&format!("no puzzles match query '{query}'"))]
                } else {
                    cards(&records)
                }
            }
            PuzzleCommand::New { name, round } => {
                let record = self.directory.create(&name, round.as_deref()).await?;
                cards(&[record])
            }
            PuzzleCommand::Attach { kind } => {
                bound_record(self.directory.attach_document(kind, channel_id).await?)
            }
            PuzzleCommand::Voice { number } => self.attach_voice(number, channel_id).await?,
            PuzzleCommand::Solve { raw_answer } => {
                let answer = CanonicalAnswer::parse(&raw_answer)?;
                bound_record(self.directory.solve(channel_id, &answer).await?)
            }
            PuzzleCommand::BulkImport => {
                let imported = self.directory.bulk_import().await?;
                if imported.is_empty() {
                    vec![messages::warning_message("found no new puzzles to import")]
                } else {
                    cards(&imported)
                }
            }
            PuzzleCommand::Rounds { query } => {
                let rounds = self.directory.suggest_rounds(&query, MAX_SUGGESTIONS).await;
                listing("Rounds", "rounds", &query, &rounds)
            }
            PuzzleCommand::Names { query } => {
                let names = self.directory.suggest_puzzle_names(&query, MAX_SUGGESTIONS).await;
                listing("Puzzles", "puzzles", &query, &names)
            }
            PuzzleCommand::Help => vec![messages::help_message(&self.prefix)],
            PuzzleCommand::Unknown { verb } => vec![messages::error_message(&format!(
                "unsupported command `{prefix}{verb}`. Try `{prefix}help`.",
                prefix = self.prefix
            ))],
        };
        Ok(replies)
    }

    async fn attach_voice(
        &self,
        number: Option<u32>,
        channel_id: &str,
    ) -> Result<Vec<MessageTemplate>, DirectoryError> {
        let Some(number) = number else {
            return Ok(vec![messages::error_message("no voice channel specified")]);
        };

        let name = format!("{VOICE_CHANNEL_PREFIX}{number}");
        let Some(voice) = self.directory.channels().find_channel_by_name(&name).await? else {
            return Ok(vec![messages::error_message("no voice channel specified")]);
        };
        if voice.kind != ChannelKind::Voice {
            return Ok(vec![messages::error_message("channel specified is not a voice channel")]);
        }
        if let Some(category_id) = self.voice_category_id.as_deref() {
            if voice.parent_id.as_deref() != Some(category_id) {
                return Ok(vec![messages::error_message(
                    "channel specified is not in the voice category",
                )]);
            }
        }

        Ok(bound_record(self.directory.attach_voice_channel(channel_id, &voice.id).await?))
    }

    fn failure_reply(
        &self,
        error: DirectoryError,
        envelope: &CommandEnvelope,
    ) -> Vec<MessageTemplate> {
        let summary = failure_summary(&error);
        let interface = error.into_interface(envelope.request_id.clone());
        warn!(
            event_name = "command.failed",
            verb = %envelope.verb,
            channel_id = %envelope.channel_id,
            correlation_id = %interface.correlation_id(),
            error = %interface,
            "puzzle command failed"
        );

        if matches!(interface, InterfaceError::BadRequest { .. }) {
            vec![messages::error_message(&summary)]
        } else {
            vec![messages::service_error_message(&summary, interface.correlation_id())]
        }
    }
}

fn cards(records: &[PuzzleRecord]) -> Vec<MessageTemplate> {
    records.iter().map(messages::puzzle_message).collect()
}

fn bound_record(record: Option<PuzzleRecord>) -> Vec<MessageTemplate> {
    match record {
        Some(record) => cards(&[record]),
        None => vec![messages::error_message("could not find puzzle record for this channel")],
    }
}

fn listing(title: &str, noun: &str, query: &str, values: &[String]) -> Vec<MessageTemplate> {
    if values.is_empty() {
        let summary = if query.is_empty() {
            format!("no {noun} are known yet")
        } else {
            format!("no {noun} match '{query}'")
        };
        return vec![messages::warning_message(&summary)];
    }
    vec![messages::listing_message(title, values)]
}

fn failure_summary(error: &DirectoryError) -> String {
    match error {
        DirectoryError::BackendUnavailable(BackendError::Store(_)) => {
            "unable to load the puzzle list sheet".to_owned()
        }
        DirectoryError::BackendUnavailable(BackendError::Documents(_)) => {
            "google drive service is unavailable".to_owned()
        }
        DirectoryError::BackendUnavailable(BackendError::Channels(_)) => {
            "discord channel service is unavailable".to_owned()
        }
        DirectoryError::PartialImportFailure { puzzle, .. } => {
            format!("bulk import stopped: could not create a channel for '{puzzle}'")
        }
        DirectoryError::ValidationFailed { .. } | DirectoryError::EmptyName => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use huntbot_core::backend::memory::{
        InMemoryChannelService, InMemoryDocumentService, InMemoryTabularStore,
    };
    use huntbot_core::backend::{Channel, ChannelKind};
    use huntbot_core::directory::{DirectoryLayout, PuzzleDirectory};
    use huntbot_core::domain::puzzle::{encode, DocumentKind, PuzzleRecord, Row};
    use serde_json::json;

    use super::{classify_command, parse_command, CommandEnvelope, CommandRouter, PuzzleCommand};

    struct Harness {
        store: Arc<InMemoryTabularStore>,
        channels: Arc<InMemoryChannelService>,
        router: CommandRouter,
    }

    fn harness(data: Vec<Row>, voice_category_id: Option<&str>) -> Harness {
        let mut rows = vec![vec![json!("Round"), json!("Name")]];
        rows.extend(data);
        let store = Arc::new(InMemoryTabularStore::with_rows(rows));
        let channels = Arc::new(InMemoryChannelService::default());
        let layout =
            DirectoryLayout::new("A:G".parse().expect("range"), "10", "20", "folder-hunt");
        let directory = Arc::new(PuzzleDirectory::new(
            store.clone(),
            Arc::new(InMemoryDocumentService::default()),
            channels.clone(),
            layout,
        ));
        let router = CommandRouter::new(directory, "!", voice_category_id.map(str::to_owned));
        Harness { store, channels, router }
    }

    fn bound(name: &str, channel_id: &str) -> Row {
        let channel_id = Some(channel_id.to_owned());
        encode(&PuzzleRecord { channel_id, ..PuzzleRecord::new(name) })
    }

    fn envelope(text: &str, channel_id: &str) -> CommandEnvelope {
        parse_command("!", text, channel_id, "U1", "req-1").expect("command")
    }

    async fn reply(harness: &Harness, text: &str, channel_id: &str) -> Vec<String> {
        harness
            .router
            .route(&envelope(text, channel_id))
            .await
            .into_iter()
            .map(|message| message.content)
            .collect()
    }

    async fn voice_channel(harness: &Harness, id: &str, name: &str, kind: ChannelKind) {
        harness
            .channels
            .insert(Channel {
                id: id.to_owned(),
                name: name.to_owned(),
                kind,
                parent_id: Some("30".to_owned()),
            })
            .await;
    }

    #[test]
    fn parse_requires_prefix_and_lowercases_verb() {
        assert!(parse_command("!", "just chatting", "C1", "U1", "r").is_none());
        assert!(parse_command("!", "!", "C1", "U1", "r").is_none());

        let parsed =
            parse_command("!", "  !Solve  the answer ", "C1", "U1", "r").expect("command");
        assert_eq!(parsed.verb, "solve");
        assert_eq!(parsed.args, "the answer");
    }

    #[test]
    fn classify_splits_name_and_round() {
        assert_eq!(
            classify_command("new", "Crossing Guard | Act I"),
            PuzzleCommand::New {
                name: "Crossing Guard".to_owned(),
                round: Some("Act I".to_owned())
            }
        );
        assert_eq!(
            classify_command("new", "Crossing Guard |"),
            PuzzleCommand::New { name: "Crossing Guard".to_owned(), round: None }
        );
        assert_eq!(classify_command("voice", "3"), PuzzleCommand::Voice { number: Some(3) });
        assert_eq!(classify_command("voice", "three"), PuzzleCommand::Voice { number: None });
        assert_eq!(classify_command("doc", ""), PuzzleCommand::Attach { kind: DocumentKind::Doc });
        assert_eq!(classify_command("puzzle", ""), PuzzleCommand::Puzzle { name: None });
        assert!(matches!(classify_command("dance", ""), PuzzleCommand::Unknown { .. }));
    }

    #[tokio::test]
    async fn puzzle_without_args_reports_missing_binding() {
        let harness = harness(vec![bound("Alpha", "101")], None);

        assert_eq!(
            reply(&harness, "!puzzle", "999").await,
            vec!["error: could not find puzzle record for this channel"]
        );
        assert_eq!(
            reply(&harness, "!puzzle", "101").await,
            vec![":grey_question:Alpha\n> :hash: <#101>"]
        );
    }

    #[tokio::test]
    async fn lookups_report_misses_with_the_query() {
        let harness = harness(vec![bound("Alpha", "101")], None);

        assert_eq!(
            reply(&harness, "!puzzle Omega", "1").await,
            vec!["error: no puzzle named 'Omega'"]
        );
        assert_eq!(
            reply(&harness, "!find zzz", "1").await,
            vec!["error: no puzzles match query 'zzz'"]
        );
    }

    #[tokio::test]
    async fn find_replies_once_per_match() {
        let harness = harness(vec![bound("Alpha", "101"), bound("Alphabet", "102")], None);

        assert_eq!(reply(&harness, "!find alpha", "1").await.len(), 2);
    }

    #[tokio::test]
    async fn new_creates_puzzle_with_round() {
        let harness = harness(Vec::new(), None);

        let replies = reply(&harness, "!new Crossing Guard | Act I", "1").await;

        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with(":grey_question:Crossing Guard"));
        assert_eq!(harness.channels.created().await, vec!["Crossing Guard"]);
        assert_eq!(harness.router.directory.list_rounds().await, vec!["Act I"]);
    }

    #[tokio::test]
    async fn solve_rejects_empty_canonical_answer_before_touching_the_sheet() {
        let harness = harness(vec![bound("Alpha", "101")], None);

        let replies = reply(&harness, "!solve ?!?", "101").await;

        assert_eq!(replies, vec!["error: canonicalized answer from `?!?` is empty"]);
        assert!(harness.store.calls().await.reads.is_empty());
    }

    #[tokio::test]
    async fn solve_records_canonical_answer() {
        let harness = harness(vec![bound("Alpha", "101")], None);

        let replies = reply(&harness, "!solve the end", "101").await;

        assert_eq!(replies, vec![":white_check_mark:Alpha **[THEEND]**\n> :hash: <#101>"]);
    }

    #[tokio::test]
    async fn voice_requires_an_existing_voice_channel() {
        let harness = harness(vec![bound("Alpha", "101")], Some("30"));
        voice_channel(&harness, "801", "puzzchat1", ChannelKind::Voice).await;
        voice_channel(&harness, "802", "puzzchat2", ChannelKind::Text).await;

        assert_eq!(
            reply(&harness, "!voice", "101").await,
            vec!["error: no voice channel specified"]
        );
        assert_eq!(
            reply(&harness, "!voice 9", "101").await,
            vec!["error: no voice channel specified"]
        );
        assert_eq!(
            reply(&harness, "!voice 2", "101").await,
            vec!["error: channel specified is not a voice channel"]
        );

        let replies = reply(&harness, "!voice 1", "101").await;
        assert_eq!(replies, vec![":grey_question:Alpha\n> :hash: <#101>\n> :sound: <#801>"]);
    }

    #[tokio::test]
    async fn voice_outside_the_voice_category_is_rejected() {
        let harness = harness(vec![bound("Alpha", "101")], Some("31"));
        voice_channel(&harness, "801", "puzzchat1", ChannelKind::Voice).await;

        assert_eq!(
            reply(&harness, "!voice 1", "101").await,
            vec!["error: channel specified is not in the voice category"]
        );
        assert!(harness.store.calls().await.row_updates.is_empty());
    }

    #[tokio::test]
    async fn bulk_import_warns_when_nothing_is_new() {
        let harness = harness(vec![bound("Alpha", "101")], None);

        assert_eq!(
            reply(&harness, "!bulkimport", "1").await,
            vec!["warning: found no new puzzles to import"]
        );
    }

    #[tokio::test]
    async fn backend_failures_reply_with_correlation_id() {
        let harness = harness(vec![bound("Alpha", "101")], None);
        harness.store.fail_with("quota exceeded").await;

        let replies = reply(&harness, "!puzzle", "101").await;

        assert_eq!(
            replies,
            vec!["error: unable to load the puzzle list sheet\n-# correlation id: req-1"]
        );
    }

    #[tokio::test]
    async fn listings_and_unknown_commands() {
        let harness = harness(vec![bound("Alpha", "101")], None);
        harness.router.directory.rebuild_caches().await.expect("rebuild");

        assert_eq!(reply(&harness, "!names al", "1").await, vec!["**Puzzles**\n- Alpha"]);
        assert_eq!(
            reply(&harness, "!rounds", "1").await,
            vec!["warning: no rounds are known yet"]
        );
        assert_eq!(
            reply(&harness, "!dance", "1").await,
            vec!["error: unsupported command `!dance`. Try `!help`."]
        );
        assert!(reply(&harness, "!help", "1").await[0].contains("`!bulkimport`"));
    }
}
