//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to browse the installation walkthrough, edit the site
//! configuration form, and control the session without sending messages to
//! the assistant.

/// A parsed chat command.
///
/// These commands drive the application and are not sent to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchitectCommand {
    /// Display help information.
    Help,

    /// Exit the application.
    Quit,

    /// Re-render the whole conversation.
    History,

    /// Display session statistics.
    Stats,

    /// Show the current installation step.
    Wizard,

    /// Advance to the next installation step.
    Next,

    /// Go back to the previous installation step.
    Prev,

    /// Jump to an installation step by zero-based index.
    Step(usize),

    /// Show the configuration form and the generated config.
    Config,

    /// Set one field of the configuration form.
    Set { field: String, value: String },

    /// Reset the configuration form to its defaults.
    Reset,

    /// Ask the assistant to explain the current configuration.
    Explain,

    /// Write the generated config to a file.
    Write(String),

    /// Change the model.
    Model(String),

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ArchitectCommand)` if the input is a command, or `None` if it
/// should be sent to the assistant.
///
/// # Examples
///
/// ```
/// # use docusaurus_architect::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/set title My Docs").is_some());
/// assert!(parse_command("How do I deploy?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ArchitectCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => ArchitectCommand::Help,
        "quit" | "exit" | "q" => ArchitectCommand::Quit,
        "history" => ArchitectCommand::History,
        "stats" | "status" => ArchitectCommand::Stats,
        "wizard" | "install" => ArchitectCommand::Wizard,
        "next" => ArchitectCommand::Next,
        "prev" | "back" => ArchitectCommand::Prev,
        "step" => match argument.map(str::parse::<usize>) {
            Some(Ok(n)) if n >= 1 => ArchitectCommand::Step(n - 1),
            Some(_) => ArchitectCommand::Invalid("/step expects a step number from 1".to_string()),
            None => ArchitectCommand::Invalid("/step requires a step number".to_string()),
        },
        "config" => ArchitectCommand::Config,
        "set" => parse_set_command(argument),
        "reset" => ArchitectCommand::Reset,
        "explain" => ArchitectCommand::Explain,
        "write" => match argument {
            Some(path) => ArchitectCommand::Write(path.to_string()),
            None => ArchitectCommand::Invalid("/write requires a file path".to_string()),
        },
        "model" => match argument {
            Some(model) => ArchitectCommand::Model(model.to_string()),
            None => ArchitectCommand::Invalid("/model requires a model name".to_string()),
        },
        _ => ArchitectCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_set_command(argument: Option<&str>) -> ArchitectCommand {
    let Some(arg) = argument else {
        return ArchitectCommand::Invalid("/set requires a field and a value".to_string());
    };
    let mut parts = arg.splitn(2, ' ');
    let field = parts.next().unwrap_or_default();
    let Some(value) = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty()) else {
        return ArchitectCommand::Invalid(format!("/set {field} requires a value"));
    };
    ArchitectCommand::Set {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /wizard                Show the current installation step
  /next, /prev           Move through the installation steps
  /step <n>              Jump to installation step n
  /config                Show the configuration form and generated config
  /set <field> <value>   Set a form field (title, tagline, url, baseUrl,
                         organizationName, projectName, preset, theme)
  /reset                 Reset the form to its defaults
  /explain               Ask the assistant to review the configuration
  /write <file>          Write the generated docusaurus.config.js
  /model <name>          Change the model (e.g., /model claude-sonnet-4-0)
  /history               Show the whole conversation
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit

Anything else is sent to the assistant."#
}
