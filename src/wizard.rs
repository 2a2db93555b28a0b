//! The installation walkthrough.
//!
//! Steps are plain data loaded from YAML; the built-in set is compiled into
//! the binary.  A [`Wizard`] holds the steps and a cursor that never leaves
//! the valid range.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use utf8path::Path;

use crate::error::{Error, Result};

const BUILTIN_STEPS: &str = include_str!("wizard_steps.yaml");

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// One installation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Where a step sits relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMark {
    Done,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wizard {
    steps: Vec<Step>,
    position: usize,
}

impl Wizard {
    /// Build a wizard positioned on the first step.
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::validation("a wizard needs at least one step", None));
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                return Err(Error::validation(
                    format!("duplicate step id {:?}", step.id),
                    Some("id".to_string()),
                ));
            }
        }
        Ok(Self { steps, position: 0 })
    }

    /// The four-step Docusaurus installation walkthrough.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_STEPS)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::new(serde_yaml::from_str(yaml)?)
    }

    /// Load steps from a YAML file holding a list of steps.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_str())
            .map_err(|e| Error::io(format!("failed to read steps from {}", path.as_str()), e))?;
        Self::from_yaml(&yaml)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn current(&self) -> &Step {
        &self.steps[self.position]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_first(&self) -> bool {
        self.position == 0
    }

    pub fn is_last(&self) -> bool {
        self.position + 1 == self.steps.len()
    }

    /// Advance one step.  Returns false, and stays put, on the last step.
    pub fn next(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.position += 1;
        true
    }

    /// Go back one step.  Returns false, and stays put, on the first step.
    pub fn prev(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.position -= 1;
        true
    }

    /// Move to any step by zero-based index.
    pub fn jump(&mut self, index: usize) -> Result<()> {
        if index >= self.steps.len() {
            return Err(Error::validation(
                format!("step {} does not exist; there are {} steps", index + 1, self.steps.len()),
                Some("step".to_string()),
            ));
        }
        self.position = index;
        Ok(())
    }

    pub fn progress(&self) -> Vec<StepMark> {
        (0..self.steps.len())
            .map(|index| match index.cmp(&self.position) {
                std::cmp::Ordering::Less => StepMark::Done,
                std::cmp::Ordering::Equal => StepMark::Current,
                std::cmp::Ordering::Greater => StepMark::Upcoming,
            })
            .collect()
    }
}

/// Render the current step with a progress bar.
pub fn render_step(wizard: &Wizard, use_color: bool) -> String {
    let paint = |text: &str, color: &str| {
        if use_color {
            format!("{color}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    };

    let mut out = String::new();
    let marks: Vec<String> = wizard
        .progress()
        .into_iter()
        .enumerate()
        .map(|(index, mark)| {
            let n = index + 1;
            match mark {
                StepMark::Done => paint(&format!("[✓{n}]"), ANSI_GREEN),
                StepMark::Current => paint(&format!("[>{n}]"), ANSI_BOLD),
                StepMark::Upcoming => paint(&format!("[ {n}]"), ANSI_DIM),
            }
        })
        .collect();
    let _ = writeln!(out, "{}", marks.join("──"));

    let step = wizard.current();
    let _ = writeln!(
        out,
        "\nStep {} of {}: {}",
        wizard.position() + 1,
        wizard.len(),
        paint(&step.title, ANSI_BOLD)
    );
    let _ = writeln!(out, "{}", step.description);
    if let Some(command) = &step.command {
        out.push('\n');
        for line in command.lines() {
            let _ = writeln!(out, "  {}", paint(&format!("$ {line}"), ANSI_YELLOW));
        }
    }
    if !step.details.is_empty() {
        out.push('\n');
        for detail in &step.details {
            let _ = writeln!(out, "  • {detail}");
        }
    }
    if wizard.is_last() {
        let _ = writeln!(out, "\n{}", paint("You're all set. Your site is ready to deploy.", ANSI_GREEN));
    }
    out
}
