//! Interactive Docusaurus assistant.
//!
//! A streaming REPL that answers Docusaurus questions, walks through the
//! installation steps, and builds a `docusaurus.config.js` from a small form.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! architect
//!
//! # Specify a model and disable colors
//! architect --model claude-sonnet-4-0 --no-color
//!
//! # Use a custom installation walkthrough
//! architect --steps steps.yaml
//! ```
//!
//! The API key is read from `ARCHITECT_API_KEY`, falling back to
//! `ANTHROPIC_API_KEY`.  Set `RUST_LOG` to see diagnostics on stderr.

use std::future::Future;
use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use docusaurus_architect::chat::{ArchitectCommand, ChatArgs, ChatConfig, help_text, parse_command};
use docusaurus_architect::{
    Anthropic, AssistantSession, Controller, SiteConfigForm, SubmitOutcome, TerminalRenderer,
    TracingClientLogger, Wizard, explain, render_config, render_step, render_transcript, style_markdown,
};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_RESET: &str = "\x1b[0m";

type ChatController = Controller<AssistantSession>;

struct App {
    controller: Arc<ChatController>,
    wizard: Wizard,
    form: SiteConfigForm,
    use_color: bool,
    interrupted: Arc<Notify>,
}

impl App {
    fn print_info(&self, info: &str) {
        if self.use_color {
            println!("{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
    }

    fn print_error(&self, error: &str) {
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    /// Await `work` unless Ctrl+C arrives first.
    async fn interruptible<T>(&self, work: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            result = work => Some(result),
            _ = self.interrupted.notified() => None,
        }
    }

    /// Handle one command.  Returns false when the program should exit.
    async fn run_command(&mut self, command: ArchitectCommand) -> bool {
        match command {
            ArchitectCommand::Quit => {
                println!("Goodbye!");
                return false;
            }
            ArchitectCommand::Help => {
                for line in help_text().lines() {
                    println!("    {}", line);
                }
            }
            ArchitectCommand::History => {
                print!("{}", render_transcript(&self.controller.snapshot(), self.use_color));
            }
            ArchitectCommand::Stats => self.print_stats(),
            ArchitectCommand::Wizard => print!("{}", render_step(&self.wizard, self.use_color)),
            ArchitectCommand::Next => {
                if self.wizard.next() {
                    print!("{}", render_step(&self.wizard, self.use_color));
                } else {
                    self.print_info("Already at the last step.");
                }
            }
            ArchitectCommand::Prev => {
                if self.wizard.prev() {
                    print!("{}", render_step(&self.wizard, self.use_color));
                } else {
                    self.print_info("Already at the first step.");
                }
            }
            ArchitectCommand::Step(index) => match self.wizard.jump(index) {
                Ok(()) => print!("{}", render_step(&self.wizard, self.use_color)),
                Err(err) => self.print_error(&err.to_string()),
            },
            ArchitectCommand::Config => self.print_config(),
            ArchitectCommand::Set { field, value } => match self.form.set_field(&field, &value) {
                Ok(()) => self.print_info(&format!("{field} set to {value:?}")),
                Err(err) => self.print_error(&err.to_string()),
            },
            ArchitectCommand::Reset => {
                self.form = SiteConfigForm::default();
                self.print_info("Configuration form reset to defaults.");
            }
            ArchitectCommand::Explain => {
                if let Err(err) = self.form.validate() {
                    self.print_error(&err.to_string());
                    return true;
                }
                self.print_info("Analyzing configuration...");
                let analysis = explain(&self.form, self.controller.session());
                let Some(text) = self.interruptible(analysis).await else {
                    return false;
                };
                println!("{}", style_markdown(&text, self.use_color));
            }
            ArchitectCommand::Write(path) => {
                if let Err(err) = self.form.validate() {
                    self.print_error(&err.to_string());
                    return true;
                }
                match std::fs::write(&path, render_config(&self.form)) {
                    Ok(()) => self.print_info(&format!("Wrote {path}")),
                    Err(err) => self.print_error(&format!("Failed to write {path}: {err}")),
                }
            }
            ArchitectCommand::Model(model) => {
                self.controller.session().set_model(model.clone());
                self.print_info(&format!("Model changed to: {model}"));
            }
            ArchitectCommand::Invalid(message) => self.print_error(&message),
        }
        true
    }

    fn print_stats(&self) {
        let config = self.controller.session().config();
        let messages = self.controller.with_transcript(|t| t.len());
        let turns = self.controller.session().history().len() / 2;
        println!("    Session Statistics:");
        println!("      Model: {}", config.model);
        println!("      Max tokens: {}", config.max_tokens);
        match config.temperature {
            Some(t) => println!("      Temperature: {t:.2}"),
            None => println!("      Temperature: default"),
        }
        println!("      Messages shown: {messages}");
        println!("      Completed turns: {turns}");
        match self.controller.turn_timeout() {
            Some(limit) => println!("      Turn timeout: {}s", limit.as_secs()),
            None => println!("      Turn timeout: (none)"),
        }
        println!(
            "      Installation step: {} of {}",
            self.wizard.position() + 1,
            self.wizard.len()
        );
    }

    fn print_config(&self) {
        println!("    Configuration Form:");
        println!("      title: {}", self.form.title);
        println!("      tagline: {}", self.form.tagline);
        println!("      url: {}", self.form.url);
        println!("      baseUrl: {}", self.form.base_url);
        println!("      organizationName: {}", self.form.organization_name);
        println!("      projectName: {}", self.form.project_name);
        println!("      preset: {}", self.form.preset);
        println!("      theme: {}", self.form.theme);
        if let Err(err) = self.form.validate() {
            self.print_error(&err.to_string());
        }
        println!();
        println!("{}", render_config(&self.form));
    }
}

/// Main entry point for the architect application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("architect [OPTIONS]");
    let config = ChatConfig::try_from(args)?;
    let use_color = config.use_color;

    let client = Anthropic::with_options(None, config.base_url.clone(), None)?
        .with_logger(Arc::new(TracingClientLogger));
    let session = AssistantSession::new(client, config.session_config());
    let controller = Arc::new(
        Controller::new(session, TerminalRenderer::new(use_color))
            .with_turn_timeout(config.turn_timeout),
    );
    let interrupted = Arc::new(Notify::new());

    // At the prompt the line editor owns Ctrl+C; this only fires while a
    // request is running.
    {
        let controller = Arc::clone(&controller);
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            controller.dispose();
            interrupted.notify_one();
        })?;
    }

    let mut app = App {
        controller,
        wizard: config.load_wizard()?,
        form: SiteConfigForm::default(),
        use_color,
        interrupted,
    };
    let mut rl = DefaultEditor::new()?;

    println!("Docusaurus Architect (model: {})", config.model);
    println!("Type /help for commands, /quit to exit\n");
    print!("{}", render_transcript(&app.controller.snapshot(), use_color));

    loop {
        if app.controller.is_disposed() {
            break;
        }
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(command) = parse_command(line) {
                    if !app.run_command(command).await {
                        break;
                    }
                    continue;
                }

                let controller = Arc::clone(&app.controller);
                match app.interruptible(controller.submit(line)).await {
                    Some(SubmitOutcome::Ignored(reason)) => {
                        tracing::debug!(?reason, "submission ignored");
                    }
                    Some(_) => println!(),
                    None => {
                        println!("\nInterrupted.");
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                app.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}
