//! Prompt template registry
//!
//! In-memory registration and lookup of `{slot}`-style templates. Loading
//! templates from YAML files is an external collaborator concern; the
//! registry only manages already-materialized template strings.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{EngramError, Result};

fn slot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("slot pattern is valid"))
}

/// A named prompt template with `{slot}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    /// Registry name
    pub name: String,
    /// Template text
    pub content: String,
    /// Optional human description
    pub description: Option<String>,
}

/// Manages prompt templates and their slot lists.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, PromptTemplate>,
    slots: HashMap<String, Vec<String>>,
}

impl TemplateRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template or replace an existing one with the same name.
    pub fn register_template(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.register_with_description(name, content, None);
    }

    /// Register a template with a description.
    pub fn register_with_description(
        &mut self,
        name: impl Into<String>,
        content: impl Into<String>,
        description: Option<String>,
    ) {
        let name = name.into();
        let content = content.into();
        self.slots
            .insert(name.clone(), extract_slots(&content));
        self.templates.insert(
            name.clone(),
            PromptTemplate {
                name,
                content,
                description,
            },
        );
    }

    /// Look up a template by name.
    pub fn get_template(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.get(name)
    }

    /// Slot names a template references, in first-appearance order.
    pub fn template_slots(&self, name: &str) -> &[String] {
        self.slots.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All registered template names.
    pub fn list_templates(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}

/// Extract unique slot names in first-appearance order.
fn extract_slots(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut slots = Vec::new();
    for capture in slot_pattern().captures_iter(content) {
        let name = capture[1].to_string();
        if seen.insert(name.clone()) {
            slots.push(name);
        }
    }
    slots
}

/// Fill every `{slot}` in a template from the given values.
///
/// # Errors
/// [`EngramError::MissingSlot`] when the template references a slot the
/// fill map does not provide.
pub fn render_template(
    template: &PromptTemplate,
    fills: &HashMap<&str, String>,
) -> Result<String> {
    let mut out = String::with_capacity(template.content.len());
    let mut last_end = 0;
    for capture in slot_pattern().captures_iter(&template.content) {
        let whole = capture.get(0).expect("capture 0 always present");
        let slot = &capture[1];
        let value = fills.get(slot).ok_or_else(|| EngramError::MissingSlot {
            template: template.name.clone(),
            slot: slot.to_string(),
        })?;
        out.push_str(&template.content[last_end..whole.start()]);
        out.push_str(value);
        last_end = whole.end();
    }
    out.push_str(&template.content[last_end..]);
    Ok(out)
}
