//! Non-interactive `docusaurus.config.js` generator.
//!
//! # Usage
//!
//! ```bash
//! # Print the default configuration
//! architect-config
//!
//! # Customize and write to a file
//! architect-config --title "Widget Docs" --organization-name acme \
//!     --project-name widgets --theme dark --output docusaurus.config.js
//!
//! # Ask the assistant to review the result
//! architect-config --title "Widget Docs" --explain
//! ```

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tracing_subscriber::EnvFilter;

use docusaurus_architect::{
    Anthropic, AssistantSession, SessionConfig, SiteConfigForm, explain, render_config,
};

/// Command-line arguments for the architect-config tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
struct Args {
    #[arrrg(optional, "Site title (default: My Site)", "TITLE")]
    title: Option<String>,

    #[arrrg(optional, "Site tagline", "TAGLINE")]
    tagline: Option<String>,

    #[arrrg(optional, "Production URL of the site", "URL")]
    url: Option<String>,

    #[arrrg(optional, "Path the site is served under (default: /)", "PATH")]
    base_url: Option<String>,

    #[arrrg(optional, "GitHub organization or user name", "ORG")]
    organization_name: Option<String>,

    #[arrrg(optional, "GitHub repository name", "PROJECT")]
    project_name: Option<String>,

    #[arrrg(optional, "Preset: classic or facebook", "PRESET")]
    preset: Option<String>,

    #[arrrg(optional, "Theme: light, dark, or custom", "THEME")]
    theme: Option<String>,

    #[arrrg(optional, "Write the config to this file instead of stdout", "FILE")]
    output: Option<String>,

    #[arrrg(optional, "Model used with --explain (default: claude-haiku-4-5)", "MODEL")]
    model: Option<String>,

    #[arrrg(flag, "Ask the assistant to explain the configuration")]
    explain: bool,
}

impl Args {
    fn form(&self) -> docusaurus_architect::Result<SiteConfigForm> {
        let mut form = SiteConfigForm::default();
        let fields = [
            ("title", &self.title),
            ("tagline", &self.tagline),
            ("url", &self.url),
            ("baseUrl", &self.base_url),
            ("organizationName", &self.organization_name),
            ("projectName", &self.project_name),
            ("preset", &self.preset),
            ("theme", &self.theme),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                form.set_field(name, value)?;
            }
        }
        form.validate()?;
        Ok(form)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = Args::from_command_line_relaxed("architect-config [OPTIONS]");
    let form = match args.form() {
        Ok(form) => form,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(2);
        }
    };

    let config = render_config(&form);
    match &args.output {
        Some(path) => {
            if let Err(err) = std::fs::write(path, &config) {
                eprintln!("Error: failed to write {path}: {err}");
                std::process::exit(1);
            }
            eprintln!("Wrote {path}");
        }
        None => print!("{config}"),
    }

    if args.explain {
        let client = match Anthropic::new(None) {
            Ok(client) => client,
            Err(err) => {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
        };
        let mut session_config = SessionConfig::new();
        if let Some(model) = &args.model {
            session_config = session_config.with_model(model.clone());
        }
        let session = AssistantSession::new(client, session_config);
        println!("\n{}", explain(&form, &session).await);
    }
}
