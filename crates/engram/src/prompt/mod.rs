//! Prompt assembly
//!
//! Builds the final `{role, content}` message list from context, negative
//! examples, tool specs, and the user query. With no template, context items
//! map straight to messages. With a template, every untrusted field is
//! rendered through a fenced data section (see [`format`]), the rendered
//! text is classified line-by-line into roles, and a token budget trims
//! material in a fixed priority order: oldest context first, then trailing
//! tool specs, then trailing negative examples. The user query is never
//! trimmed.

mod format;
mod template;

pub use format::{
    CONTEXT_LABEL, NEGATIVES_LABEL, TOOLS_LABEL, format_context_items, format_data_section,
    format_negative_examples, format_tool_specs, sanitize_text, sanitize_tool_name,
};
pub use template::{PromptTemplate, TemplateRegistry, render_template};

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngramError, Result};
use crate::memory::MemoryItem;
use crate::text::count_tokens;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction or scaffold text
    System,
    /// End-user message
    User,
    /// Model output
    Assistant,
}

impl Role {
    /// String form used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Case-insensitive parse of the wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One rendered chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Construct a message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Specification of a tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name (sanitized before rendering)
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// JSON schema of the tool's arguments
    pub parameters: Option<Value>,
}

impl ToolSpec {
    /// Tool with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: None,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach an argument schema.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Inputs to one build call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptRequest<'a> {
    /// Registered template to render; `None` selects the fallback path
    pub template_id: Option<&'a str>,
    /// Conversation context items
    pub context: &'a [MemoryItem],
    /// The user's query; never trimmed
    pub user_query: &'a str,
    /// Negative examples to render as data
    pub negative_examples: &'a [String],
    /// Tool specs to render as data
    pub tools: &'a [ToolSpec],
    /// Heuristic token budget for the rendered messages
    pub token_budget: Option<usize>,
}

impl<'a> PromptRequest<'a> {
    /// Request with only a user query.
    pub fn new(user_query: &'a str) -> Self {
        Self {
            user_query,
            ..Default::default()
        }
    }
}

/// How many entries each trim pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimCounts {
    /// Context items dropped (oldest first)
    pub context: usize,
    /// Tool specs dropped (trailing first)
    pub tools: usize,
    /// Negative examples dropped (trailing first)
    pub negative_examples: usize,
}

impl TrimCounts {
    /// Whether anything was trimmed.
    pub fn any(&self) -> bool {
        self.context > 0 || self.tools > 0 || self.negative_examples > 0
    }
}

/// A build result: the message list plus trim metadata so callers can
/// detect truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    /// Ordered messages for the provider
    pub messages: Vec<ChatMessage>,
    /// Trim counts per input kind
    pub trimmed: TrimCounts,
}

fn role_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(user|assistant|system):\s*(.*)$").expect("role pattern is valid")
    })
}

/// Assembles bounded, injection-fenced prompts.
#[derive(Debug, Default)]
pub struct PromptBuilder {
    /// Template registry consulted by id
    pub registry: TemplateRegistry,
}

impl PromptBuilder {
    /// Builder with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the message list for a request.
    pub fn build(&self, request: &PromptRequest) -> Result<Vec<ChatMessage>> {
        Ok(self.build_payload(request)?.messages)
    }

    /// Build the message list plus trim metadata.
    ///
    /// # Errors
    /// [`EngramError::TemplateNotFound`] for an unregistered template id;
    /// [`EngramError::MissingSlot`] when the template references a slot
    /// without a fill value. An absent template id is not an error.
    pub fn build_payload(&self, request: &PromptRequest) -> Result<PromptPayload> {
        let template = match request.template_id {
            Some(id) => Some(
                self.registry
                    .get_template(id)
                    .ok_or_else(|| EngramError::TemplateNotFound(id.to_string()))?,
            ),
            None => None,
        };

        let mut context = request.context.to_vec();
        let mut tools = request.tools.to_vec();
        let mut negatives = request.negative_examples.to_vec();
        let mut trimmed = TrimCounts::default();

        loop {
            let messages = match template {
                Some(template) => {
                    self.render(template, &context, &negatives, &tools, request.user_query)?
                }
                None => fallback_messages(&context, request.user_query),
            };

            let total: usize = messages.iter().map(|m| count_tokens(&m.content)).sum();
            let over_budget = request.token_budget.is_some_and(|budget| total > budget);
            if !over_budget {
                if trimmed.any() {
                    tracing::debug!(
                        context = trimmed.context,
                        tools = trimmed.tools,
                        negatives = trimmed.negative_examples,
                        total,
                        "prompt trimmed to token budget"
                    );
                }
                return Ok(PromptPayload { messages, trimmed });
            }

            // Strict trim priority: history goes before instructions, and
            // the user query is untouchable.
            if !context.is_empty() {
                context.remove(0);
                trimmed.context += 1;
            } else if !tools.is_empty() {
                tools.pop();
                trimmed.tools += 1;
            } else if !negatives.is_empty() {
                negatives.pop();
                trimmed.negative_examples += 1;
            } else {
                tracing::warn!(
                    total,
                    budget = ?request.token_budget,
                    "token budget unreachable; trimmable material exhausted"
                );
                return Ok(PromptPayload { messages, trimmed });
            }
        }
    }

    fn render(
        &self,
        template: &PromptTemplate,
        context: &[MemoryItem],
        negatives: &[String],
        tools: &[ToolSpec],
        user_query: &str,
    ) -> Result<Vec<ChatMessage>> {
        let mut fills: HashMap<&str, String> = HashMap::new();
        fills.insert("context", format_context_items(context));
        fills.insert("negative_examples", format_negative_examples(negatives));
        fills.insert("tools", format_tool_specs(tools));
        // The query is flattened to a single line so it stays inside the
        // template line that carries its role label.
        fills.insert("user_query", sanitize_text(user_query));

        let rendered = render_template(template, &fills)?;
        Ok(classify_lines(&rendered))
    }
}

/// Fallback path: context items become messages with their stored roles,
/// followed by the user query.
fn fallback_messages(context: &[MemoryItem], user_query: &str) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = context
        .iter()
        .map(|item| {
            let role = item.role().and_then(Role::parse).unwrap_or(Role::Assistant);
            ChatMessage::new(role, item.content.clone())
        })
        .collect();
    messages.push(ChatMessage::new(Role::User, user_query));
    messages
}

/// Split rendered template text into role-classified messages.
///
/// Only the template's own literal structure can open a role: a line
/// matching `^(user|assistant|system):` becomes a message of that role, and
/// every run of other non-blank lines becomes one system message. The data
/// sections guarantee untrusted content never produces a matching line.
fn classify_lines(rendered: &str) -> Vec<ChatMessage> {
    let pattern = role_line_pattern();
    let mut messages = Vec::new();
    let mut system_run: Vec<&str> = Vec::new();

    let flush = |run: &mut Vec<&str>, messages: &mut Vec<ChatMessage>| {
        let content = run.join("\n");
        let content = content.trim();
        if !content.is_empty() {
            messages.push(ChatMessage::new(Role::System, content));
        }
        run.clear();
    };

    for line in rendered.lines() {
        match pattern.captures(line) {
            Some(capture) => {
                flush(&mut system_run, &mut messages);
                // The pattern only matches allow-listed roles.
                let role = Role::parse(&capture[1]).unwrap_or(Role::System);
                messages.push(ChatMessage::new(role, capture[2].to_string()));
            }
            None => system_run.push(line),
        }
    }
    flush(&mut system_run, &mut messages);
    messages
}
