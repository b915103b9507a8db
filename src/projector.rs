// src/projector.rs

//! Stage 2: copy extracted rows into the declaration template.

use std::fs;
use std::path::{Path, PathBuf};

use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, require_file};
use crate::extraction::{ExtractedSheet, ExtractionDocument, load_extraction};
use crate::layout;
use crate::nomor_aju::{NomorAju, Placeholder};
use crate::serial_store::SerialStore;
use crate::workbook::{CellValue, Sheet, TextColumnSchema, Workbook};

/// Where the NOMOR AJU placeholder lives in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderCell {
    pub sheet: String,
    pub column: usize,
}

/// Populate `template_path` from the extraction JSON at `extraction_path` and
/// write the result into `output_dir`, named by the new NOMOR AJU.
///
/// The serial store is advanced once when the template has a NOMOR AJU column.
pub fn project(
    extraction_path: &Path,
    template_path: &Path,
    output_dir: &Path,
    serials: &mut SerialStore,
    requested_serial: Option<u64>,
) -> Result<PathBuf, PipelineError> {
    require_file("Extraction JSON", extraction_path)?;
    require_file("Template", template_path)?;

    let span = tracing::info_span!("project", template = %template_path.display());
    let _guard = span.enter();

    let doc = load_extraction(extraction_path)?;
    let mut workbook = Workbook::load(template_path)?;

    let nomor_aju = assign_nomor_aju(&mut workbook, serials, requested_serial, crate::nomor_aju::today())?;
    project_document(&doc, &mut workbook);

    fs::create_dir_all(output_dir).map_err(|e| PipelineError::io(output_dir, e))?;
    let file_name = match &nomor_aju {
        Some(id) => format!("{id}.xlsx"),
        None => format!("{}.xlsx", timestamp_stem(OffsetDateTime::now_utc())),
    };
    let output_path = output_dir.join(file_name);
    if same_file(&output_path, template_path) {
        return Err(PipelineError::Template(format!(
            "refusing to overwrite template {}",
            template_path.display()
        )));
    }

    workbook.save(&output_path, &TextColumnSchema::customs())?;
    info!(output = %output_path.display(), nomor_aju = ?nomor_aju.as_ref().map(NomorAju::as_str), "Template populated");
    Ok(output_path)
}

/// First sheet (template order) whose header row has a NOMOR AJU column.
pub fn locate_placeholder(workbook: &Workbook) -> Option<PlaceholderCell> {
    workbook.sheets().iter().find_map(|sheet| {
        sheet
            .header_index()
            .get(layout::NOMOR_AJU)
            .map(|column| PlaceholderCell {
                sheet: sheet.name().to_string(),
                column,
            })
    })
}

/// Compute the run's NOMOR AJU from the template placeholder and write it back
/// into the placeholder cell. Returns `None` when the template has no column
/// for it; the serial store is untouched in that case.
pub fn assign_nomor_aju(
    workbook: &mut Workbook,
    serials: &mut SerialStore,
    requested_serial: Option<u64>,
    date: Date,
) -> Result<Option<NomorAju>, PipelineError> {
    let Some(cell) = locate_placeholder(workbook) else {
        warn!("Template has no NOMOR AJU column; identifier left unset");
        return Ok(None);
    };
    let Some(sheet) = workbook.sheet_mut(&cell.sheet) else {
        return Ok(None);
    };

    let existing = sheet.get(2, cell.column).to_text();
    let placeholder = Placeholder::parse(&existing);
    let serial = serials.claim(requested_serial, placeholder.serial)?;
    let id = NomorAju::compose(&placeholder.prefix, date, serial);

    sheet.set(2, cell.column, CellValue::text(id.as_str()));
    info!(sheet = %cell.sheet, nomor_aju = %id, "NOMOR AJU assigned");
    Ok(Some(id))
}

/// Copy every extracted sheet with data rows into the matching template sheet.
pub fn project_document(doc: &ExtractionDocument, workbook: &mut Workbook) {
    for name in doc.sheet_names() {
        let Some(extracted) = doc.sheet(name) else {
            continue;
        };
        if extracted.rows.is_empty() {
            debug!(sheet = %name, "No data rows, skipped");
            continue;
        }
        let Some(sheet) = workbook.sheet_mut(name) else {
            debug!(sheet = %name, "Not in template, skipped");
            continue;
        };
        if sheet.header_index().is_empty() {
            warn!(sheet = %name, "Template sheet has no header row, skipped");
            continue;
        }

        if name == layout::ENTITAS {
            project_customer_row(&extracted, sheet);
        } else {
            project_rows(&extracted, sheet);
        }
    }
}

/// Template column for each extracted column, by header name.
fn column_targets(extracted: &ExtractedSheet, sheet: &Sheet) -> Vec<Option<usize>> {
    let index = sheet.header_index();
    let targets: Vec<Option<usize>> = extracted.headers.iter().map(|h| index.get(h)).collect();

    let dropped: Vec<&str> = extracted
        .headers
        .iter()
        .zip(&targets)
        .filter(|(_, t)| t.is_none())
        .map(|(h, _)| h.as_str())
        .collect();
    if !dropped.is_empty() {
        debug!(sheet = %sheet.name(), ?dropped, "Extracted columns without template counterpart");
    }
    targets
}

fn write_row(sheet: &mut Sheet, row: usize, values: &[CellValue], targets: &[Option<usize>]) {
    for (value, target) in values.iter().zip(targets) {
        if let Some(col) = target {
            sheet.set(row, *col, value.clone());
        }
    }
}

/// Overwrite template rows from row 2 down, one extracted row each.
fn project_rows(extracted: &ExtractedSheet, sheet: &mut Sheet) {
    let targets = column_targets(extracted, sheet);
    for (i, values) in extracted.rows.iter().enumerate() {
        write_row(sheet, i + 2, values, &targets);
    }
    info!(sheet = %sheet.name(), rows = extracted.rows.len(), "Rows projected");
}

/// ENTITAS keeps its pre-authored party rows: only the customer row (code 8)
/// receives the first extracted row.
fn project_customer_row(extracted: &ExtractedSheet, sheet: &mut Sheet) {
    let Some(kode_col) = sheet.header_index().get(layout::KODE_ENTITAS) else {
        warn!(sheet = %sheet.name(), "No KODE ENTITAS column, customer row not projected");
        return;
    };
    let Some(target_row) = sheet
        .data_rows()
        .find(|&r| sheet.get(r, kode_col).to_text().trim() == layout::KODE_CUSTOMER)
    else {
        warn!(sheet = %sheet.name(), "No customer row (KODE ENTITAS 8) in template");
        return;
    };

    let targets = column_targets(extracted, sheet);
    if let Some(values) = extracted.rows.first() {
        write_row(sheet, target_row, values, &targets);
    }
    info!(sheet = %sheet.name(), row = target_row, "Customer row projected");
}

fn timestamp_stem(now: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
