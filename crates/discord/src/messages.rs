use huntbot_core::domain::puzzle::PuzzleRecord;
use serde::Serialize;

const COMPONENT_ACTION_ROW: u8 = 1;
const COMPONENT_BUTTON: u8 = 2;
const BUTTON_STYLE_LINK: u8 = 5;

/// Discord caps a single action row at five buttons.
const MAX_ROW_BUTTONS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentEmoji {
    pub name: String,
}

/// A link button; Discord opens `url` directly, no interaction is raised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    #[serde(rename = "type")]
    component_type: u8,
    style: u8,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<ComponentEmoji>,
}

impl LinkButton {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            component_type: COMPONENT_BUTTON,
            style: BUTTON_STYLE_LINK,
            url: url.into(),
            label: None,
            emoji: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(ComponentEmoji { name: emoji.into() });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    component_type: u8,
    pub components: Vec<LinkButton>,
}

/// A message ready to post; serializes as a Discord create-message body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
}

impl MessageTemplate {
    pub fn buttons(&self) -> impl Iterator<Item = &LinkButton> {
        self.components.iter().flat_map(|row| row.components.iter())
    }
}

#[derive(Default)]
pub struct MessageBuilder {
    lines: Vec<String>,
    buttons: Vec<LinkButton>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    /// A block-quoted line (`> text`).
    pub fn quote(self, text: impl AsRef<str>) -> Self {
        let line = format!("> {}", text.as_ref());
        self.line(line)
    }

    pub fn button(mut self, button: LinkButton) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn build(self) -> MessageTemplate {
        let components = self
            .buttons
            .chunks(MAX_ROW_BUTTONS)
            .map(|chunk| ActionRow {
                component_type: COMPONENT_ACTION_ROW,
                components: chunk.to_vec(),
            })
            .collect();
        MessageTemplate { content: self.lines.join("\n"), components }
    }
}

/// The puzzle card: status marker and name, the answer once solved, channel
/// mentions, and link buttons for the sheet and doc.
pub fn puzzle_message(record: &PuzzleRecord) -> MessageTemplate {
    let marker = if record.is_solved() { ":white_check_mark:" } else { ":grey_question:" };
    let mut title = format!("{marker}{}", record.name);
    if let Some(answer) = record.answer.as_deref().filter(|answer| !answer.is_empty()) {
        title.push_str(&format!(" **[{answer}]**"));
    }

    let mut builder = MessageBuilder::new().line(title);
    if let Some(channel_id) = record.channel_id.as_deref() {
        builder = builder.quote(format!(":hash: <#{channel_id}>"));
    }
    if let Some(voice_channel_id) = record.voice_channel_id.as_deref() {
        builder = builder.quote(format!(":sound: <#{voice_channel_id}>"));
    }
    if let Some(link) = record.sheet_link.as_deref() {
        builder = builder.button(LinkButton::new(link).emoji("\u{1F4CA}"));
    }
    if let Some(link) = record.doc_link.as_deref() {
        builder = builder.button(LinkButton::new(link).emoji("\u{1F4C4}"));
    }
    builder.build()
}

pub fn error_message(summary: &str) -> MessageTemplate {
    MessageBuilder::new().line(format!("error: {summary}")).build()
}

/// An error reply carrying the correlation id operators grep the logs for.
pub fn service_error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new()
        .line(format!("error: {summary}"))
        .line(format!("-# correlation id: {correlation_id}"))
        .build()
}

pub fn warning_message(summary: &str) -> MessageTemplate {
    MessageBuilder::new().line(format!("warning: {summary}")).build()
}

pub fn listing_message(title: &str, values: &[String]) -> MessageTemplate {
    values
        .iter()
        .fold(MessageBuilder::new().line(format!("**{title}**")), |builder, value| {
            builder.line(format!("- {value}"))
        })
        .build()
}

pub fn help_message(prefix: &str) -> MessageTemplate {
    let commands = [
        ("puzzle [name]", "show this channel's puzzle, or look one up by name"),
        ("find <query>", "list every puzzle matching the query"),
        ("new <name> [| <round>]", "register a puzzle and open its channel"),
        ("sheet", "attach a spreadsheet to this channel's puzzle"),
        ("doc", "attach a document to this channel's puzzle"),
        ("voice <n>", "link voice channel puzzchat<n> to this channel's puzzle"),
        ("solve <answer>", "record the answer and move the channel to solved"),
        ("bulkimport", "open channels for puzzles added directly to the sheet"),
        ("rounds [query]", "list known rounds"),
        ("names [query]", "list known puzzle names"),
        ("help", "show this message"),
    ];

    commands
        .iter()
        .fold(MessageBuilder::new().line("**Available commands**"), |builder, (usage, about)| {
            builder.line(format!("- `{prefix}{usage}`: {about}"))
        })
        .build()
}
