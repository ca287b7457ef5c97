//! Diagnostic prompt template
//!
//! The instruction text prepended to every outgoing message is built from a
//! structured table (categories mapped to OBD2 command codes) that is loaded at
//! startup, either from a JSON file or from the table compiled into the binary.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_TABLE: &str = include_str!("../assets/obd2-diagnostics.json");

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse template table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid template table: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticCommand {
    pub code: String,
    pub description: String,
}

/// One query category and the commands the model should answer with.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub title: String,
    /// Sentence describing which user queries fall into this category.
    pub trigger: String,
    pub commands: Vec<DiagnosticCommand>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedRule {
    pub title: String,
    pub trigger: String,
    pub reply: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResponseFormat {
    pub title: String,
    pub rules: Vec<String>,
}

/// A worked example. Without a category the expected answer is the
/// unsupported reply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticTable {
    pub preamble: String,
    pub rules_intro: String,
    pub categories: Vec<Category>,
    pub unsupported: UnsupportedRule,
    pub response_format: ResponseFormat,
    #[serde(default)]
    pub examples: Vec<Example>,
    pub closing: String,
}

impl DiagnosticTable {
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let table: DiagnosticTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.categories.is_empty() {
            return Err(TemplateError::Invalid("no categories defined".to_string()));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.id.as_str()) {
                return Err(TemplateError::Invalid(format!(
                    "duplicate category id '{}'",
                    category.id
                )));
            }
            if category.commands.is_empty() {
                return Err(TemplateError::Invalid(format!(
                    "category '{}' has no commands",
                    category.id
                )));
            }
        }

        if self.unsupported.reply.trim().is_empty() {
            return Err(TemplateError::Invalid("unsupported reply is empty".to_string()));
        }

        for example in &self.examples {
            if let Some(id) = &example.category {
                if !seen.contains(id.as_str()) {
                    return Err(TemplateError::Invalid(format!(
                        "example '{}' references unknown category '{}'",
                        example.query, id
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// The answer the model is expected to give for an example, as it appears
    /// in the rendered text.
    fn example_response(&self, example: &Example) -> String {
        match example.category.as_deref().and_then(|id| self.category(id)) {
            Some(category) => {
                let codes: Vec<&str> = category.commands.iter().map(|c| c.code.as_str()).collect();
                format!("`{}`", codes.join(", "))
            }
            None => format!("\"{}\"", self.unsupported.reply),
        }
    }

    /// Render the numbered instruction text.
    pub fn render(&self) -> String {
        let mut text = String::new();

        text.push_str(&self.preamble);
        text.push_str(" \n\n");
        text.push_str(&self.rules_intro);
        text.push_str("\n\n");

        let mut number = 1;
        for category in &self.categories {
            text.push_str(&format!("{}. **{}**\n", number, category.title));
            text.push_str(&format!("   - {}, respond with:\n", category.trigger));
            for command in &category.commands {
                text.push_str(&format!("     - `{}`: {}\n", command.code, command.description));
            }
            text.push('\n');
            number += 1;
        }

        text.push_str(&format!("{}. **{}**\n", number, self.unsupported.title));
        text.push_str(&format!("   - {}, respond with:\n", self.unsupported.trigger));
        text.push_str(&format!("     - \"{}.\"\n", self.unsupported.reply));
        text.push('\n');
        number += 1;

        text.push_str(&format!("{}. **{}**\n", number, self.response_format.title));
        for rule in &self.response_format.rules {
            text.push_str(&format!("   - {}\n", rule));
        }
        text.push('\n');

        if !self.examples.is_empty() {
            text.push_str("### Examples:\n");
            for example in &self.examples {
                text.push_str(&format!("- Query: \"{}\"\n", example.query));
                text.push_str(&format!("  Response: {}\n", self.example_response(example)));
            }
            text.push('\n');
        }

        text.push_str(&self.closing);
        text
    }
}

/// The rendered template together with the table it came from.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    table: DiagnosticTable,
    text: String,
}

impl PromptTemplate {
    pub fn from_table(table: DiagnosticTable) -> Self {
        let text = table.render();
        Self { table, text }
    }

    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self, TemplateError> {
        Ok(Self::from_table(DiagnosticTable::from_json(BUILTIN_TABLE)?))
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_table(DiagnosticTable::from_json(&content)?))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn table(&self) -> &DiagnosticTable {
        &self.table
    }

    /// Template, a single space, then the user's text.
    pub fn build_prompt(&self, user_message: &str) -> String {
        format!("{} {}", self.text, user_message)
    }

    pub fn commands_for(&self, category_id: &str) -> Option<&[DiagnosticCommand]> {
        self.table.category(category_id).map(|c| c.commands.as_slice())
    }

    /// Recover what the user typed from a prompt produced by `build_prompt`.
    /// Anything else is returned unchanged.
    pub fn user_query<'a>(&self, prompt: &'a str) -> &'a str {
        prompt
            .strip_prefix(self.text.as_str())
            .and_then(|rest| rest.strip_prefix(' '))
            .unwrap_or(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn codes(template: &PromptTemplate, id: &str) -> Vec<String> {
        template
            .commands_for(id)
            .unwrap()
            .iter()
            .map(|c| c.code.clone())
            .collect()
    }

    #[test]
    fn test_builtin_table_parses() {
        let template = PromptTemplate::builtin().unwrap();
        assert_eq!(template.table().categories.len(), 6);
        assert_eq!(template.table().unsupported.reply, "unsupported query");
    }

    #[test]
    fn test_builtin_command_mapping() {
        let template = PromptTemplate::builtin().unwrap();
        assert_eq!(codes(&template, "general_health"), ["03", "02", "01 01"]);
        assert_eq!(codes(&template, "engine"), ["010C", "0105", "010B", "010F"]);
        assert_eq!(codes(&template, "transmission"), ["012E", "0111"]);
        assert_eq!(codes(&template, "fuel"), ["012F", "015E", "0144"]);
        assert_eq!(codes(&template, "emissions"), ["01 01", "0103", "0106", "0107"]);
        assert_eq!(codes(&template, "battery"), ["0142", "015C"]);
        assert!(template.commands_for("tires").is_none());
    }

    #[test]
    fn test_render_layout() {
        let template = PromptTemplate::builtin().unwrap();
        let text = template.text();

        assert!(text.starts_with(
            "You are a vehicle diagnostic assistant with expertise in OBD2 systems. "
        ));
        assert!(text.contains("OBD2 commands. \n\nFollow these rules to determine the best match:\n\n1. **General Car Health**\n"));
        assert!(text.contains("     - `010C`: Engine RPM.\n"));
        assert!(text.contains(
            "7. **Unsupported or Unclear Queries**\n   - If the user query is unrelated to diagnostics or cannot be mapped to an OBD2 command, respond with:\n     - \"unsupported query.\"\n\n"
        ));
        assert!(text.contains("8. **Response Format**\n   - Always respond with a comma-separated list"));
        assert!(text.ends_with("Now, process the following query:\n\"{user_query}\"\n"));
    }

    #[test]
    fn test_examples_derive_from_mapping() {
        let template = PromptTemplate::builtin().unwrap();
        let text = template.text();

        assert!(text.contains("### Examples:\n- Query: \"How’s the health of my car?\"\n  Response: `03, 02, 01 01`\n"));
        assert!(text.contains("  Response: `010C, 0105, 010B, 010F`\n"));
        assert!(text.contains("  Response: `012F, 015E, 0144`\n"));
        assert!(text.contains("  Response: `0142, 015C`\n"));
        assert!(text.contains("- Query: \"What’s my tire pressure?\"\n  Response: \"unsupported query\"\n"));
    }

    #[test]
    fn test_build_prompt_and_user_query() {
        let template = PromptTemplate::builtin().unwrap();
        let prompt = template.build_prompt("How's my battery?");

        assert_eq!(prompt, format!("{} How's my battery?", template.text()));
        assert_eq!(template.user_query(&prompt), "How's my battery?");
        assert_eq!(template.user_query("plain text"), "plain text");
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let mut table = PromptTemplate::builtin().unwrap().table().clone();
        table.categories[1].id = table.categories[0].id.clone();
        assert!(matches!(table.validate(), Err(TemplateError::Invalid(_))));

        let mut table = PromptTemplate::builtin().unwrap().table().clone();
        table.categories[0].commands.clear();
        assert!(matches!(table.validate(), Err(TemplateError::Invalid(_))));

        let mut table = PromptTemplate::builtin().unwrap().table().clone();
        table.examples[0].category = Some("tires".to_string());
        assert!(matches!(table.validate(), Err(TemplateError::Invalid(_))));

        let mut table = PromptTemplate::builtin().unwrap().table().clone();
        table.categories.clear();
        assert!(matches!(table.validate(), Err(TemplateError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut table = PromptTemplate::builtin().unwrap().table().clone();
        table.categories.truncate(1);
        table.examples.retain(|e| {
            e.category.is_none() || e.category.as_deref() == Some("general_health")
        });

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&table).unwrap().as_bytes()).unwrap();

        let template = PromptTemplate::load(file.path()).unwrap();
        assert!(template.text().contains("2. **Unsupported or Unclear Queries**"));
        assert!(template.commands_for("engine").is_none());
    }

    #[test]
    fn test_load_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(
            PromptTemplate::load(file.path()),
            Err(TemplateError::Parse(_))
        ));
    }
}
