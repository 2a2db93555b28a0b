// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod controller;
pub mod error;
pub mod render;
pub mod session;
pub mod site_config;
pub mod sse;
pub mod transcript;
pub mod types;
pub mod wizard;

mod observability;

// Re-exports
pub use client::{Anthropic, EventStream};
pub use client_logger::{ClientLogger, TracingClientLogger};
pub use controller::{
    Controller, IgnoreReason, STREAM_ERROR_NOTICE, SubmitOutcome, WELCOME_MESSAGE,
};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{Change, NullSink, TerminalRenderer, TranscriptSink, render_transcript, style_markdown};
pub use session::{
    AssistantSession, ChatSession, FragmentStream, Scripted, ScriptedSession, SessionConfig,
    TextFragment,
};
pub use site_config::{Preset, SiteConfigForm, Theme, analysis_prompt, explain, render_config};
pub use transcript::{Message, MessageId, MessageState, Role, Transcript};
pub use types::*;
pub use wizard::{Step, StepMark, Wizard, render_step};
