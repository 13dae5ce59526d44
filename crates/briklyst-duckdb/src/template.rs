use anyhow::Result;
use duckdb::Connection;
use serde::Serialize;

use briklyst_core::storefront::{ButtonStyle, Section, SectionKind, Theme};

use crate::DuckDbBackend;

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: String,
    pub theme: Theme,
    pub sections: Vec<Section>,
}

fn builtin_templates() -> Vec<Template> {
    vec![
        Template {
            id: "tpl_minimal".to_string(),
            name: "Minimal".to_string(),
            description: "White background, dark text, products first.".to_string(),
            theme: Theme::default(),
            sections: vec![
                Section::new(SectionKind::Hero),
                Section::new(SectionKind::Products),
            ],
        },
        Template {
            id: "tpl_bold".to_string(),
            name: "Bold".to_string(),
            description: "Dark canvas with bright accent buttons.".to_string(),
            theme: Theme {
                primary_color: "#F97316".to_string(),
                background_color: "#0F172A".to_string(),
                text_color: "#F8FAFC".to_string(),
                font: "Space Grotesk".to_string(),
                button_style: ButtonStyle::Square,
            },
            sections: vec![
                Section::new(SectionKind::Hero),
                Section::new(SectionKind::Collections),
                Section::new(SectionKind::Products),
            ],
        },
        Template {
            id: "tpl_creator".to_string(),
            name: "Creator".to_string(),
            description: "Soft palette with a newsletter signup block.".to_string(),
            theme: Theme {
                primary_color: "#7C3AED".to_string(),
                background_color: "#FAF5FF".to_string(),
                text_color: "#1F2937".to_string(),
                font: "Poppins".to_string(),
                button_style: ButtonStyle::Pill,
            },
            sections: vec![
                Section::new(SectionKind::Hero),
                Section::new(SectionKind::Products),
                Section::new(SectionKind::Collections),
                Section::new(SectionKind::Newsletter),
            ],
        },
    ]
}

/// Insert the built-in templates if they are missing. Safe to run on every open.
pub(crate) fn seed_templates_sync(conn: &Connection) -> Result<()> {
    for (position, template) in builtin_templates().into_iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO templates (id, name, description, theme, sections, position) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            duckdb::params![
                template.id,
                template.name,
                template.description,
                serde_json::to_string(&template.theme)?,
                serde_json::to_string(&template.sections)?,
                position as i64,
            ],
        )?;
    }
    Ok(())
}

type TemplateRow = (String, String, String, String, String);

fn into_template(row: TemplateRow) -> Result<Template> {
    let (id, name, description, theme, sections) = row;
    Ok(Template {
        id,
        name,
        description,
        theme: serde_json::from_str(&theme)?,
        sections: serde_json::from_str(&sections)?,
    })
}

impl DuckDbBackend {
    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, theme, sections FROM templates ORDER BY position, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?;

        let mut templates = Vec::new();
        for row in rows {
            templates.push(into_template(row?)?);
        }
        Ok(templates)
    }

    pub async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        let conn = self.conn.lock().await;
        let row: Option<TemplateRow> = conn
            .prepare("SELECT id, name, description, theme, sections FROM templates WHERE id = ?1")?
            .query_row(duckdb::params![id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .ok();
        row.map(into_template).transpose()
    }
}
