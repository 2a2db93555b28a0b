//! The site configuration form.
//!
//! [`SiteConfigForm`] holds what a user types into the generator; it turns
//! into `docusaurus.config.js` text through [`render_config`] and into a
//! one-shot analysis request through [`analysis_prompt`] and [`explain`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::session::{ChatSession, ONE_SHOT_FAILURE_TEXT};

const CONFIG_TEMPLATE: &str = include_str!("docusaurus.config.js.tmpl");

/// The preset package the site builds on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Classic,
    Facebook,
}

impl Preset {
    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Classic => "classic",
            Preset::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Preset::Classic),
            "facebook" => Ok(Preset::Facebook),
            _ => Err(Error::validation(
                format!("unknown preset {s:?}; expected classic or facebook"),
                Some("preset".to_string()),
            )),
        }
    }
}

/// The color theme of the site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Custom,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Custom => "custom",
        }
    }

    /// The footer style the theme maps to.  Custom themes get a dark footer.
    pub fn footer_style(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark | Theme::Custom => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "custom" => Ok(Theme::Custom),
            _ => Err(Error::validation(
                format!("unknown theme {s:?}; expected light, dark, or custom"),
                Some("theme".to_string()),
            )),
        }
    }
}

/// Form state of the configuration generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfigForm {
    pub title: String,
    pub tagline: String,
    pub url: String,
    pub base_url: String,
    pub organization_name: String,
    pub project_name: String,
    pub preset: Preset,
    pub theme: Theme,
}

impl Default for SiteConfigForm {
    fn default() -> Self {
        Self {
            title: "My Site".to_string(),
            tagline: "Dinosaurs are cool".to_string(),
            url: "https://your-docusaurus-site.example.com".to_string(),
            base_url: "/".to_string(),
            organization_name: "facebook".to_string(),
            project_name: "docusaurus".to_string(),
            preset: Preset::Classic,
            theme: Theme::Custom,
        }
    }
}

impl SiteConfigForm {
    /// Field names accepted by [`SiteConfigForm::set_field`].
    pub const FIELDS: [&'static str; 8] = [
        "title",
        "tagline",
        "url",
        "baseUrl",
        "organizationName",
        "projectName",
        "preset",
        "theme",
    ];

    /// Set one field by name.  Both `baseUrl` and `base_url` spellings work.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        let key: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "title" => self.title = value.to_string(),
            "tagline" => self.tagline = value.to_string(),
            "url" => self.url = value.to_string(),
            "baseurl" => self.base_url = value.to_string(),
            "organizationname" => self.organization_name = value.to_string(),
            "projectname" => self.project_name = value.to_string(),
            "preset" => self.preset = value.parse()?,
            "theme" => self.theme = value.parse()?,
            _ => {
                return Err(Error::validation(
                    format!(
                        "unknown field {name:?}; expected one of {}",
                        Self::FIELDS.join(", ")
                    ),
                    Some(name.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Check that the form would produce a usable configuration.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("title", &self.title),
            ("organizationName", &self.organization_name),
            ("projectName", &self.project_name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation(
                    format!("{field} must not be empty"),
                    Some(field.to_string()),
                ));
            }
        }

        let url = Url::parse(&self.url).map_err(|e| {
            Error::validation(
                format!("url {:?} is not an absolute URL: {e}", self.url),
                Some("url".to_string()),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(
                format!("url must use http or https, not {}", url.scheme()),
                Some("url".to_string()),
            ));
        }

        if !self.base_url.starts_with('/') || !self.base_url.ends_with('/') {
            return Err(Error::validation(
                format!("baseUrl {:?} must start and end with '/'", self.base_url),
                Some("baseUrl".to_string()),
            ));
        }
        Ok(())
    }

    /// The form as pretty-printed JSON with camelCase keys.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Render the `docusaurus.config.js` text for a form.
pub fn render_config(form: &SiteConfigForm) -> String {
    let values = [
        ("title", js_string(&form.title)),
        ("tagline", js_string(&form.tagline)),
        ("url", js_string(&form.url)),
        ("baseUrl", js_string(&form.base_url)),
        ("organizationName", js_string(&form.organization_name)),
        ("projectName", js_string(&form.project_name)),
        ("preset", js_string(form.preset.as_str())),
        ("footerStyle", js_string(form.theme.footer_style())),
        ("titleTemplate", js_template(&form.title)),
    ];
    fill(CONFIG_TEMPLATE, &values)
}

/// Replace `{name}` placeholders in a single pass.  Braces that do not name a
/// value are copied through.
fn fill(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = values.iter().find(|(name, _)| {
            after.starts_with(name) && after[name.len()..].starts_with('}')
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape text for a single-quoted JavaScript string.
fn js_string(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
}

/// Escape text for a JavaScript template literal.
fn js_template(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

/// The one-shot prompt asking for an explanation of the form.
pub fn analysis_prompt(form: &SiteConfigForm) -> Result<String> {
    Ok(format!(
        "Explain what this Docusaurus configuration does briefly and highlight any potential missing best practices: \n\n```json\n{}\n```",
        form.to_json()?
    ))
}

/// Ask the session to explain the form.  Never fails.
pub async fn explain(form: &SiteConfigForm, session: &dyn ChatSession) -> String {
    match analysis_prompt(form) {
        Ok(prompt) => session.one_shot(&prompt).await,
        Err(err) => {
            tracing::warn!(error = %err, "could not serialize configuration form");
            ONE_SHOT_FAILURE_TEXT.to_string()
        }
    }
}
