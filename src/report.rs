use crate::upload::ModelOutcome;
use serde::Serialize;
use std::path::Path;

pub const MISSING: &str = "—";
pub const ERROR_STATUS: &str = "ERROR";
const MAX_ERROR_WIDTH: usize = 80;

const HEADERS: [&str; 7] = [
    "Model",
    "Product ID",
    "Title",
    "Handle",
    "Status",
    "Collections",
    "Error",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub model: String,
    pub product_id: String,
    pub title: String,
    pub handle: String,
    pub status: String,
    pub collections: String,
    #[serde(serialize_with = "compact_json")]
    pub error: Option<serde_json::Value>,
}

fn compact_json<S: serde::Serializer>(
    value: &Option<serde_json::Value>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.serialize_str(&value.to_string()),
        None => serializer.serialize_str(""),
    }
}

impl From<&ModelOutcome> for ResultRecord {
    fn from(outcome: &ModelOutcome) -> Self {
        match outcome {
            Ok(created) => Self {
                model: created.model.clone(),
                product_id: created.product_id.to_string(),
                title: created.title.clone(),
                handle: created.handle.clone().unwrap_or_else(|| MISSING.to_string()),
                status: created.status.clone().unwrap_or_else(|| MISSING.to_string()),
                collections: created.collections.clone(),
                error: None,
            },
            Err(failed) => Self {
                model: failed.model.clone(),
                product_id: failed
                    .product_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| MISSING.to_string()),
                title: failed.title.clone(),
                handle: MISSING.to_string(),
                status: ERROR_STATUS.to_string(),
                collections: failed.collections.clone(),
                error: Some(failed.error.detail()),
            },
        }
    }
}

impl ResultRecord {
    fn cells(&self) -> [String; 7] {
        [
            self.model.clone(),
            self.product_id.clone(),
            self.title.clone(),
            self.handle.clone(),
            self.status.clone(),
            self.collections.clone(),
            self.error
                .as_ref()
                .map(|e| shorten(&e.to_string(), MAX_ERROR_WIDTH))
                .unwrap_or_default(),
        ]
    }
}

pub fn records(outcomes: &[ModelOutcome]) -> Vec<ResultRecord> {
    outcomes.iter().map(ResultRecord::from).collect()
}

fn shorten(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let cut: String = value.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

/// Renders records as a plain text table, one line per record.
pub fn render_table(records: &[ResultRecord]) -> String {
    let rows: Vec<[String; 7]> = records.iter().map(ResultRecord::cells).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell}{}", " ".repeat(width - cell.chars().count())))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = line(&HEADERS.map(String::from));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &rows {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

pub fn write_csv(path: &Path, records: &[ResultRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
