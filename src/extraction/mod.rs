// src/extraction/mod.rs

pub mod llm;
pub mod pdf_text;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{PipelineError, require_file};
use crate::layout;
use crate::workbook::CellValue;

const DEFAULT_JSON_NAME: &str = "extracted_data.json";

/// Turns the two trade documents into an [`ExtractionDocument`].
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(
        &self,
        invoice_pdf: &Path,
        packing_pdf: &Path,
    ) -> Result<ExtractionDocument, PipelineError>;
}

/// Sheet name → rows; row 0 of each sheet holds the column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionDocument {
    sheets: BTreeMap<String, Vec<Vec<Value>>>,
}

/// One sheet of extracted data with typed cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ExtractionDocument {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, sheet: impl Into<String>, rows: Vec<Vec<Value>>) {
        self.sheets.insert(sheet.into(), rows);
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn sheet(&self, name: &str) -> Option<ExtractedSheet> {
        let rows = self.sheets.get(name)?;
        let Some((header, data)) = rows.split_first() else {
            return Some(ExtractedSheet::default());
        };
        Some(ExtractedSheet {
            headers: header
                .iter()
                .map(|v| cell_from_json(v).to_text().trim().to_string())
                .collect(),
            rows: data
                .iter()
                .map(|row| row.iter().map(cell_from_json).collect())
                .collect(),
        })
    }

    /// File name for the saved JSON: the first DOKUMEN row's NOMOR DOKUMEN
    /// with path-hostile characters replaced.
    pub fn file_name(&self) -> String {
        let Some(dokumen) = self.sheet(layout::DOKUMEN) else {
            return DEFAULT_JSON_NAME.to_string();
        };
        let Some(col) = dokumen
            .headers
            .iter()
            .position(|h| h == layout::NOMOR_DOKUMEN)
        else {
            return DEFAULT_JSON_NAME.to_string();
        };
        let number = dokumen
            .rows
            .first()
            .and_then(|row| row.get(col))
            .map(|v| v.to_text().trim().to_string())
            .unwrap_or_default();
        if number.is_empty() {
            return DEFAULT_JSON_NAME.to_string();
        }
        format!("{}.json", sanitize_file_stem(&number))
    }
}

/// Map one JSON scalar onto a cell. Empty strings and null become empty cells.
pub fn cell_from_json(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Empty),
        },
        Value::String(s) => CellValue::text(s.as_str()),
        other => CellValue::text(other.to_string()),
    }
}

fn sanitize_file_stem(raw: &str) -> String {
    match Regex::new(r#"[\\/*?:"<>|]"#) {
        Ok(re) => re.replace_all(raw, "_").into_owned(),
        Err(_) => raw.to_string(),
    }
}

pub fn load_extraction(path: &Path) -> Result<ExtractionDocument, PipelineError> {
    require_file("Extraction JSON", path)?;
    let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let doc = ExtractionDocument::from_json_str(&content).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), sheets = doc.sheets.len(), "Extraction document loaded");
    Ok(doc)
}

/// Write the document as pretty JSON into `dir`, named by [`ExtractionDocument::file_name`].
pub fn save_extraction(doc: &ExtractionDocument, dir: &Path) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    let path = dir.join(doc.file_name());
    let json = serde_json::to_string_pretty(doc).map_err(|source| PipelineError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|e| PipelineError::io(&path, e))?;
    if path.file_name().is_some_and(|n| n == DEFAULT_JSON_NAME) {
        warn!("No NOMOR DOKUMEN in extraction, saved under default name");
    }
    info!(path = %path.display(), "Extraction JSON saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ExtractionDocument {
        ExtractionDocument::from_json_str(
            r#"{
                "DOKUMEN": [
                    ["SERI", "NOMOR DOKUMEN", "TANGGAL"],
                    ["1", "INV/2024:001", "2024-05-01"]
                ],
                "BARANG": [
                    [" HS ", "URAIAN", "JUMLAH SATUAN", "NETTO"],
                    ["", "Widget A", 12, 3.5],
                    [null, "Widget B", "4", true]
                ],
                "PENGANGKUT": [["NAMA PENGANGKUT"]]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_typed_cells_from_json() {
        let barang = sample().sheet("BARANG").unwrap();
        assert_eq!(barang.headers, vec!["HS", "URAIAN", "JUMLAH SATUAN", "NETTO"]);
        assert_eq!(
            barang.rows[0],
            vec![
                CellValue::Empty,
                CellValue::text("Widget A"),
                CellValue::Int(12),
                CellValue::Float(3.5)
            ]
        );
        assert_eq!(barang.rows[1][0], CellValue::Empty);
        assert_eq!(barang.rows[1][3], CellValue::Bool(true));
    }

    #[test]
    fn test_header_only_sheet_has_no_rows() {
        let sheet = sample().sheet("PENGANGKUT").unwrap();
        assert_eq!(sheet.headers, vec!["NAMA PENGANGKUT"]);
        assert!(sheet.rows.is_empty());
        assert!(sample().sheet("HEADER").is_none());
    }

    #[test]
    fn test_file_name_is_sanitized_document_number() {
        assert_eq!(sample().file_name(), "INV_2024_001.json");

        let mut doc = ExtractionDocument::default();
        doc.insert("DOKUMEN", vec![vec![json!("SERI")], vec![json!("1")]]);
        assert_eq!(doc.file_name(), DEFAULT_JSON_NAME);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_extraction(&sample(), dir.path()).unwrap();
        assert!(path.ends_with("INV_2024_001.json"));
        assert_eq!(load_extraction(&path).unwrap(), sample());
    }

    #[test]
    fn test_missing_json_is_not_found() {
        let err = load_extraction(Path::new("/nonexistent/x.json")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }
}
