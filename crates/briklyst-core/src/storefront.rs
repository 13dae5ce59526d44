//! Storefront appearance types and the validation rules shared by the
//! dashboard and public endpoints.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    #[default]
    Rounded,
    Square,
    Pill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub primary_color: String,
    pub background_color: String,
    pub text_color: String,
    pub font: String,
    #[serde(default)]
    pub button_style: ButtonStyle,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_color: "#111827".to_string(),
            background_color: "#FFFFFF".to_string(),
            text_color: "#111827".to_string(),
            font: "Inter".to_string(),
            button_style: ButtonStyle::Rounded,
        }
    }
}

impl Theme {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_hex_color("theme.primary_color", &self.primary_color)?;
        validate_hex_color("theme.background_color", &self.background_color)?;
        validate_hex_color("theme.text_color", &self.text_color)?;
        if self.font.trim().is_empty() || self.font.chars().count() > 64 {
            return Err(CoreError::validation(
                "theme.font",
                "font must be 1-64 characters",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Hero,
    Products,
    Collections,
    Newsletter,
    Links,
}

/// One block of the public page, rendered in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Section {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            title: None,
            visible: true,
        }
    }
}

pub fn default_sections() -> Vec<Section> {
    vec![
        Section::new(SectionKind::Hero),
        Section::new(SectionKind::Products),
        Section::new(SectionKind::Collections),
    ]
}

pub fn validate_sections(sections: &[Section]) -> Result<(), CoreError> {
    if sections.len() > 20 {
        return Err(CoreError::validation(
            "sections",
            "a storefront can have at most 20 sections",
        ));
    }
    for section in sections {
        if section.title.as_deref().is_some_and(|t| t.chars().count() > 100) {
            return Err(CoreError::validation(
                "sections",
                "section titles must be 100 characters or fewer",
            ));
        }
    }
    Ok(())
}

fn validate_hex_color(field: &'static str, value: &str) -> Result<(), CoreError> {
    let ok = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        Ok(())
    } else {
        Err(CoreError::validation(field, "colors must look like #RRGGBB"))
    }
}

/// Slugs are 3-40 chars of `[a-z0-9-]` and cannot start or end with `-`.
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    if !(3..=40).contains(&slug.len()) {
        return Err(CoreError::validation("slug", "slug must be 3-40 characters"));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::validation(
            "slug",
            "slug may only contain lowercase letters, digits and '-'",
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(CoreError::validation(
            "slug",
            "slug cannot start or end with '-'",
        ));
    }
    Ok(())
}

/// Normalise and sanity-check an email address. Returns the lowercased form.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.chars().any(char::is_whitespace);
    if valid {
        Ok(email)
    } else {
        Err(CoreError::validation("email", "email address is invalid"))
    }
}
