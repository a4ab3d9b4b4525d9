//! Subtask generation and description enhancement
//!
//! A [`TaskGenerator`] does the actual work; [`Assistant`] wraps one and
//! never fails: anything that goes wrong falls back to [`MockGenerator`].

use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;

/// Error type for generator calls
#[derive(Debug)]
pub enum AiError {
    CommandFailed { command: String, stderr: String },
    NotConfigured,
    Parse { message: String },
    Io(std::io::Error),
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiError::CommandFailed { command, stderr } => {
                write!(f, "Command '{}' failed: {}", command, stderr)
            }
            AiError::NotConfigured => write!(f, "No generator command configured"),
            AiError::Parse { message } => write!(f, "Failed to parse generator output: {}", message),
            AiError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for AiError {}

impl From<std::io::Error> for AiError {
    fn from(e: std::io::Error) -> Self {
        AiError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

pub trait TaskGenerator: Send + Sync {
    fn generate_subtasks(&self, description: &str, count: usize) -> Result<Vec<GeneratedTask>>;
    fn enhance_description(&self, description: &str) -> Result<String>;
}

impl TaskGenerator for Box<dyn TaskGenerator> {
    fn generate_subtasks(&self, description: &str, count: usize) -> Result<Vec<GeneratedTask>> {
        (**self).generate_subtasks(description, count)
    }

    fn enhance_description(&self, description: &str) -> Result<String> {
        (**self).enhance_description(description)
    }
}

// =============================================================================
// External command
// =============================================================================

/// Runs a shell command with the prompt on stdin and reads the reply from stdout
pub struct CommandGenerator {
    command: String,
}

impl CommandGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn run(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new("sh")
            .args(["-c", &self.command])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(AiError::CommandFailed {
                command: self.command.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn subtask_prompt(description: &str, count: usize) -> String {
    format!(
        "Break the following goal into exactly {count} concrete subtasks.\n\
         Reply with only a JSON array of objects with \"title\" and \"description\" fields.\n\n\
         Goal:\n{description}\n"
    )
}

fn enhance_prompt(description: &str) -> String {
    format!(
        "Rewrite the following task description in two sections.\n\
         Start with a line \"Summary:\" followed by one or two sentences, then a blank line,\n\
         then a line \"Topics:\" followed by a bulleted list of key topics.\n\n\
         Description:\n{description}\n"
    )
}

/// Parse a JSON array of tasks, tolerating prose around it
pub fn parse_tasks(output: &str) -> Result<Vec<GeneratedTask>> {
    let start = output.find('[');
    let end = output.rfind(']');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &output[s..=e],
        _ => {
            return Err(AiError::Parse {
                message: "no JSON array in output".to_string(),
            })
        }
    };
    serde_json::from_str(json).map_err(|e| AiError::Parse {
        message: e.to_string(),
    })
}

impl TaskGenerator for CommandGenerator {
    fn generate_subtasks(&self, description: &str, count: usize) -> Result<Vec<GeneratedTask>> {
        let output = self.run(&subtask_prompt(description, count))?;
        parse_tasks(&output)
    }

    fn enhance_description(&self, description: &str) -> Result<String> {
        let output = self.run(&enhance_prompt(description))?;
        let text = output.trim();
        if text.is_empty() {
            return Err(AiError::Parse {
                message: "empty reply".to_string(),
            });
        }
        Ok(text.to_string())
    }
}

/// Stands in when no command is configured
pub struct Unconfigured;

impl TaskGenerator for Unconfigured {
    fn generate_subtasks(&self, _description: &str, _count: usize) -> Result<Vec<GeneratedTask>> {
        Err(AiError::NotConfigured)
    }

    fn enhance_description(&self, _description: &str) -> Result<String> {
        Err(AiError::NotConfigured)
    }
}

// =============================================================================
// Deterministic fallback
// =============================================================================

pub struct MockGenerator;

const STEP_WORDS: usize = 5;
const TOPIC_COUNT: usize = 3;

impl MockGenerator {
    fn step(description: &str, n: usize) -> GeneratedTask {
        let words: Vec<&str> = description.split_whitespace().take(STEP_WORDS).collect();
        let title = if words.is_empty() {
            format!("Step {}", n)
        } else {
            format!("Step {}: {}", n, words.join(" "))
        };
        GeneratedTask {
            title,
            description: String::new(),
        }
    }

    /// Longest distinct words, used as topic bullets
    fn topics(description: &str) -> Vec<String> {
        let mut words: Vec<String> = description
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 3)
            .map(|w| w.to_lowercase())
            .collect();
        // stable order for equal lengths
        words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
        words.dedup();
        words.truncate(TOPIC_COUNT);
        words
    }

    fn summary(description: &str) -> String {
        let trimmed = description.trim();
        let first = trimmed
            .find(['.', '!', '?', '\n'])
            .map_or(trimmed, |i| &trimmed[..=i]);
        first.trim().to_string()
    }
}

impl TaskGenerator for MockGenerator {
    fn generate_subtasks(&self, description: &str, count: usize) -> Result<Vec<GeneratedTask>> {
        Ok((1..=count).map(|n| Self::step(description, n)).collect())
    }

    fn enhance_description(&self, description: &str) -> Result<String> {
        let topics = Self::topics(description);
        let mut out = format!("Summary:\n{}\n\nTopics:", Self::summary(description));
        if topics.is_empty() {
            out.push_str("\n- general");
        }
        for topic in topics {
            out.push_str("\n- ");
            out.push_str(&topic);
        }
        Ok(out)
    }
}

// =============================================================================
// Assistant
// =============================================================================

/// Infallible front end over a generator
pub struct Assistant<G> {
    generator: G,
}

impl<G: TaskGenerator> Assistant<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Exactly `count` subtasks, whatever the generator does
    pub fn generate_subtasks(&self, description: &str, count: usize) -> Vec<GeneratedTask> {
        let mut tasks = match self.generator.generate_subtasks(description, count) {
            Ok(tasks) => tasks
                .into_iter()
                .filter(|t| !t.title.trim().is_empty())
                .collect(),
            Err(e) => {
                tracing::warn!("subtask generation failed, using fallback: {}", e);
                Vec::new()
            }
        };
        tasks.truncate(count);
        while tasks.len() < count {
            let n = tasks.len() + 1;
            tasks.push(MockGenerator::step(description, n));
        }
        tasks
    }

    /// A "Summary"/"Topics" block, whatever the generator does
    pub fn enhance_description(&self, description: &str) -> String {
        match self.generator.enhance_description(description) {
            Ok(text) if has_sections(&text) => text,
            Ok(text) => {
                tracing::debug!("enhancement lacked sections, wrapping it");
                let topics = MockGenerator::topics(&text);
                let mut out = format!("Summary:\n{}\n\nTopics:", text.trim());
                for topic in topics {
                    out.push_str("\n- ");
                    out.push_str(&topic);
                }
                out
            }
            Err(e) => {
                tracing::warn!("description enhancement failed, using fallback: {}", e);
                MockGenerator
                    .enhance_description(description)
                    .unwrap_or_default()
            }
        }
    }
}

impl Assistant<Box<dyn TaskGenerator>> {
    /// The configured command, or the deterministic generator when none is set
    pub fn from_config(config: &AiConfig) -> Self {
        let generator: Box<dyn TaskGenerator> = match &config.command {
            Some(command) if !command.trim().is_empty() => Box::new(CommandGenerator::new(command.clone())),
            _ => Box::new(MockGenerator),
        };
        Self::new(generator)
    }
}

fn has_sections(text: &str) -> bool {
    text.contains("Summary:") && text.contains("Topics:")
}
