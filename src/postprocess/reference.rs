// src/postprocess/reference.rs

//! Customer and HS-code reference tables.
//!
//! Both are read from the first sheet of their workbook with row 1 as the
//! header row. Loading failures are reported to the caller, which decides
//! whether to degrade.

use std::collections::HashMap;
use std::path::Path;

use strsim::normalized_levenshtein;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::layout;
use crate::workbook::{CellValue, Sheet, Workbook};

fn first_sheet(path: &Path) -> Result<Sheet, PipelineError> {
    let workbook = Workbook::load(path)?;
    workbook
        .sheets()
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::Spreadsheet {
            path: path.to_path_buf(),
            message: "workbook has no sheets".to_string(),
        })
}

fn missing_column(path: &Path, column: &str) -> PipelineError {
    PipelineError::Spreadsheet {
        path: path.to_path_buf(),
        message: format!("missing column {column}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub name: String,
    /// Every column of the reference row, keyed by trimmed header.
    pub fields: Vec<(String, CellValue)>,
}

impl CustomerRecord {
    pub fn field(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// Known consignees, matched by approximate party name.
#[derive(Debug, Clone, Default)]
pub struct CustomerTable {
    records: Vec<CustomerRecord>,
}

impl CustomerTable {
    pub fn new(records: Vec<CustomerRecord>) -> Self {
        Self { records }
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let sheet = first_sheet(path)?;
        let header = sheet.header_index();
        let name_col = header
            .get(layout::NAMA_ENTITAS)
            .ok_or_else(|| missing_column(path, layout::NAMA_ENTITAS))?;

        let records: Vec<CustomerRecord> = sheet
            .data_rows()
            .filter_map(|row| {
                let name = sheet.get(row, name_col).to_text().trim().to_string();
                if name.is_empty() {
                    return None;
                }
                let fields = header
                    .iter()
                    .map(|(column, col)| (column.to_string(), sheet.get(row, col).clone()))
                    .collect();
                Some(CustomerRecord { name, fields })
            })
            .collect();

        let table = Self::new(records);
        info!(path = %path.display(), customers = table.len(), "Customer reference loaded");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most similar record at or above `cutoff` (0.0..=1.0). Comparison
    /// ignores case and surrounding whitespace; on ties the earlier record wins.
    pub fn best_match(&self, name: &str, cutoff: f64) -> Option<&CustomerRecord> {
        let query = name.trim().to_uppercase();
        if query.is_empty() {
            return None;
        }

        let mut best: Option<(f64, &CustomerRecord)> = None;
        for record in &self.records {
            let score = normalized_levenshtein(&query, &record.name.to_uppercase());
            if score >= cutoff && best.is_none_or(|(top, _)| score > top) {
                best = Some((score, record));
            }
        }

        match best {
            Some((score, record)) => {
                debug!(query = %name, matched = %record.name, score = format!("{score:.2}"), "Customer matched");
                Some(record)
            }
            None => {
                debug!(query = %name, cutoff, "No customer above cutoff");
                None
            }
        }
    }
}

/// Item description → HS code.
#[derive(Debug, Clone, Default)]
pub struct HsTable {
    codes: HashMap<String, CellValue>,
}

impl HsTable {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let sheet = first_sheet(path)?;
        let header = sheet.header_index();
        let uraian_col = header
            .get(layout::URAIAN)
            .ok_or_else(|| missing_column(path, layout::URAIAN))?;
        let hs_col = header
            .get(layout::HS)
            .ok_or_else(|| missing_column(path, layout::HS))?;

        let mut table = Self::default();
        for row in sheet.data_rows() {
            let description = sheet.get(row, uraian_col).to_text();
            table.insert(&description, sheet.get(row, hs_col).clone());
        }

        info!(path = %path.display(), codes = table.len(), "HS reference loaded");
        Ok(table)
    }

    /// Later entries for the same description replace earlier ones.
    pub fn insert(&mut self, description: &str, code: CellValue) {
        let key = description.trim();
        if key.is_empty() || code.is_blank() {
            return;
        }
        self.codes.insert(key.to_string(), code);
    }

    /// Exact lookup on the trimmed description.
    pub fn lookup(&self, description: &str) -> Option<&CellValue> {
        self.codes.get(description.trim())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Both reference tables for one post-processing run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// `None` when the customer table could not be loaded.
    pub customers: Option<CustomerTable>,
    pub hs_codes: HsTable,
}

impl ReferenceData {
    /// Load both tables; a table that fails to load is logged and left empty.
    pub fn load(customer_path: &Path, hs_path: &Path) -> Self {
        let customers = match CustomerTable::load(customer_path) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!(error = %e, "Could not read customer reference, ENTITAS enrichment disabled");
                None
            }
        };
        let hs_codes = HsTable::load(hs_path).unwrap_or_else(|e| {
            warn!(error = %e, "Could not read HS code reference, HS lookup disabled");
            HsTable::default()
        });
        Self { customers, hs_codes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer_reference, hs_reference, save_reference, text_row};

    fn record(name: &str) -> CustomerRecord {
        CustomerRecord {
            name: name.to_string(),
            fields: vec![("NAMA ENTITAS".to_string(), CellValue::text(name))],
        }
    }

    #[test]
    fn test_best_match_above_cutoff() {
        let table = CustomerTable::new(vec![
            record("CV. SINAR TERANG"),
            record("PT. MAJU BERSAMA TBK"),
        ]);
        let hit = table.best_match("PT MAJU BERSAMA", 0.6).unwrap();
        assert_eq!(hit.name, "PT. MAJU BERSAMA TBK");
        assert_eq!(
            table.best_match("pt maju bersama", 0.6).unwrap().name,
            "PT. MAJU BERSAMA TBK"
        );
    }

    #[test]
    fn test_no_match_below_cutoff() {
        let table = CustomerTable::new(vec![record("PT. MAJU BERSAMA TBK")]);
        assert!(table.best_match("GLOBAL LOGISTICS LTD", 0.6).is_none());
        assert!(table.best_match("   ", 0.0).is_none());
    }

    #[test]
    fn test_tie_keeps_first_record() {
        let table = CustomerTable::new(vec![record("PT ABCD"), record("PT ABCE")]);
        assert_eq!(table.best_match("PT ABCX", 0.6).unwrap().name, "PT ABCD");
    }

    #[test]
    fn test_customer_table_trims_headers_and_skips_nameless_rows() {
        let dir = tempfile::tempdir().unwrap();
        let table = CustomerTable::load(&customer_reference(dir.path())).unwrap();
        assert_eq!(table.len(), 2);
        let hit = table.best_match("PT MAJU BERSAMA", 0.6).unwrap();
        assert_eq!(
            hit.field("ALAMAT ENTITAS").unwrap().to_text(),
            "JL. GATOT SUBROTO 12, JAKARTA"
        );
    }

    #[test]
    fn test_customer_table_without_name_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_reference(
            dir.path(),
            "customers.xlsx",
            vec![text_row(&["NAMA"]), text_row(&["PT X"])],
        );
        assert!(matches!(
            CustomerTable::load(&path),
            Err(PipelineError::Spreadsheet { .. })
        ));
    }

    #[test]
    fn test_hs_lookup_trims_and_last_entry_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = hs_reference(
            dir.path(),
            &[("Widget A ", "11111111"), ("Widget A", "84798999"), ("", "99")],
        );
        let table = HsTable::load(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("  Widget A").unwrap().to_text(), "84798999");
        assert!(table.lookup("Widget B").is_none());
    }

    #[test]
    fn test_missing_reference_files_degrade_to_empty() {
        let refs = ReferenceData::load(
            Path::new("/nonexistent/customers.xlsx"),
            Path::new("/nonexistent/hs.xlsx"),
        );
        assert!(refs.customers.is_none());
        assert!(refs.hs_codes.is_empty());
    }
}
