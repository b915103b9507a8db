// src/postprocess/mod.rs

//! Stage 3: apply the customs business rules to a populated workbook.
//!
//! Each sheet with rules has one handler in [`SHEET_RULES`]. Handlers run in
//! table order; HEADER comes first because it captures the NOMOR AJU and
//! declaration date that the later sheets copy.

pub mod dates;
pub mod reference;
pub mod rules;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::PostprocessConfig;
use crate::error::{PipelineError, require_file};
use crate::layout;
use crate::workbook::{CellValue, HeaderIndex, Sheet, TextColumnSchema, Workbook};

use reference::ReferenceData;

/// State shared between sheet handlers during one run.
pub struct RuleContext<'a> {
    pub references: &'a ReferenceData,
    pub fuzzy_cutoff: f64,
    /// NOMOR AJU read from HEADER row 2.
    pub nomor_aju: Option<CellValue>,
    /// Normalized TANGGAL PERNYATAAN from HEADER row 2.
    pub declaration_date: Option<CellValue>,
}

impl<'a> RuleContext<'a> {
    pub fn new(references: &'a ReferenceData, fuzzy_cutoff: f64) -> Self {
        Self {
            references,
            fuzzy_cutoff,
            nomor_aju: None,
            declaration_date: None,
        }
    }
}

type SheetRule = fn(&mut Sheet, &mut RuleContext<'_>);

pub const SHEET_RULES: &[(&str, SheetRule)] = &[
    (layout::HEADER, header_rules),
    (layout::ENTITAS, entitas_rules),
    (layout::DOKUMEN, dokumen_rules),
    (layout::PENGANGKUT, pengangkut_rules),
    (layout::BARANG, barang_rules),
];

/// Post-process the workbook at `document` in place and return its path.
pub fn postprocess(
    document: &Path,
    customer_reference: &Path,
    hs_reference: &Path,
    config: &PostprocessConfig,
) -> Result<PathBuf, PipelineError> {
    require_file("Generated Excel", document)?;
    if config.require_references {
        require_file("Customer Reference", customer_reference)?;
        require_file("HS Code Reference", hs_reference)?;
    }

    let span = tracing::info_span!("postprocess", file = %document.display());
    let _guard = span.enter();

    let references = ReferenceData::load(customer_reference, hs_reference);
    let mut workbook = Workbook::load(document)?;
    apply_rules(&mut workbook, &references, config.fuzzy_cutoff);
    workbook.save(document, &TextColumnSchema::customs())?;

    info!("Business rules applied");
    Ok(document.to_path_buf())
}

/// Run every sheet handler against the sheets present in `workbook`.
pub fn apply_rules(workbook: &mut Workbook, references: &ReferenceData, fuzzy_cutoff: f64) {
    let mut ctx = RuleContext::new(references, fuzzy_cutoff);
    for (name, rule) in SHEET_RULES {
        match workbook.sheet_mut(name) {
            Some(sheet) => {
                let span = tracing::debug_span!("sheet", sheet = %name);
                let _guard = span.enter();
                rule(sheet, &mut ctx);
            }
            None => debug!(sheet = %name, "Sheet not in workbook"),
        }
    }
}

fn apply_fields(sheet: &mut Sheet, row: usize, header: &HeaderIndex, fields: &[(&str, &str)]) {
    for (column, value) in fields {
        if let Some(col) = header.get(column) {
            sheet.set(row, col, CellValue::text(*value));
        }
    }
}

/// Copy a captured HEADER value into `row` when both the value and column exist.
fn propagate(sheet: &mut Sheet, row: usize, col: Option<usize>, value: Option<&CellValue>) {
    if let (Some(col), Some(value)) = (col, value) {
        sheet.set(row, col, value.clone());
    }
}

fn header_rules(sheet: &mut Sheet, ctx: &mut RuleContext<'_>) {
    let header = sheet.header_index();
    let row = 2;

    if let Some(col) = header.get(layout::NOMOR_AJU) {
        let value = sheet.get(row, col);
        if !value.is_blank() {
            ctx.nomor_aju = Some(value.clone());
        }
    }

    if let Some(col) = header.get(layout::TANGGAL_PERNYATAAN) {
        let normalized = dates::normalize_date(sheet.get(row, col));
        sheet.set(row, col, normalized.clone());
        if !normalized.is_blank() {
            ctx.declaration_date = Some(normalized);
        }
    }

    apply_fields(sheet, row, &header, rules::HEADER_OVERRIDES);
    debug!(nomor_aju = ?ctx.nomor_aju, date = ?ctx.declaration_date, "HEADER captured");
}

fn entitas_rules(sheet: &mut Sheet, ctx: &mut RuleContext<'_>) {
    let Some(customers) = ctx.references.customers.as_ref().filter(|c| !c.is_empty()) else {
        debug!("No customer reference, ENTITAS left as is");
        return;
    };
    let header = sheet.header_index();
    let Some(kode_col) = header.get(layout::KODE_ENTITAS) else {
        warn!("ENTITAS has no KODE ENTITAS column");
        return;
    };

    for row in sheet.data_rows() {
        let kode = sheet.get(row, kode_col).to_text();
        match kode.trim() {
            layout::KODE_CUSTOMER => {
                let Some(name_col) = header.get(layout::NAMA_ENTITAS) else {
                    continue;
                };
                let name = sheet.get(row, name_col).to_text();
                if name.trim().is_empty() {
                    continue;
                }
                let Some(record) = customers.best_match(&name, ctx.fuzzy_cutoff) else {
                    info!(customer = %name, "Customer not in reference, row kept");
                    continue;
                };
                for (column, col) in header.iter() {
                    if let Some(value) = record.field(column) {
                        sheet.set(row, col, value.clone());
                    }
                }
                info!(customer = %name, matched = %record.name, "Customer enriched");
            }
            layout::KODE_SENDER => apply_fields(sheet, row, &header, rules::SENDER_FIELDS),
            layout::KODE_OWNER => apply_fields(sheet, row, &header, rules::OWNER_FIELDS),
            _ => {}
        }
    }
}

fn dokumen_rules(sheet: &mut Sheet, ctx: &mut RuleContext<'_>) {
    let header = sheet.header_index();
    let Some(seri_col) = header.get(layout::SERI) else {
        debug!("DOKUMEN has no SERI column");
        return;
    };
    let aju_col = header.get(layout::NOMOR_AJU);
    let date_col = header.get(layout::TANGGAL_DOKUMEN);
    let kode_col = header.get(layout::KODE_DOKUMEN);

    let mut documents = 0;
    for row in sheet.data_rows() {
        if sheet.get(row, seri_col).is_blank() {
            continue;
        }
        propagate(sheet, row, aju_col, ctx.nomor_aju.as_ref());
        propagate(sheet, row, date_col, ctx.declaration_date.as_ref());
        let code = rules::cycle_value(documents, &rules::DOC_TYPE_CYCLE);
        if let (Some(col), Some(code)) = (kode_col, code) {
            sheet.set(row, col, CellValue::Int(code));
        }
        documents += 1;
    }
    info!(documents, "DOKUMEN rows updated");
}

/// Dense 1-based numbering of rows whose `key` cell is filled, plus NOMOR AJU.
/// Returns the filled row numbers.
fn renumber(sheet: &mut Sheet, ctx: &RuleContext<'_>, key: &str, seri: &str) -> Vec<usize> {
    let header = sheet.header_index();
    let Some(key_col) = header.get(key) else {
        warn!(column = %key, "Key column missing, sheet skipped");
        return Vec::new();
    };
    let seri_col = header.get(seri);
    let aju_col = header.get(layout::NOMOR_AJU);

    let filled: Vec<usize> = sheet
        .data_rows()
        .filter(|&row| !sheet.get(row, key_col).is_blank())
        .collect();
    for (i, &row) in filled.iter().enumerate() {
        if let Some(col) = seri_col {
            sheet.set(row, col, CellValue::Int(i as i64 + 1));
        }
        propagate(sheet, row, aju_col, ctx.nomor_aju.as_ref());
    }
    filled
}

fn pengangkut_rules(sheet: &mut Sheet, ctx: &mut RuleContext<'_>) {
    let rows = renumber(sheet, ctx, layout::NAMA_PENGANGKUT, layout::SERI);
    if let Some(col) = sheet.header_index().get(layout::NOMOR_PENGANGKUT) {
        for &row in &rows {
            sheet.set(row, col, CellValue::text(rules::NOMOR_PENGANGKUT_PLACEHOLDER));
        }
    }
    info!(carriers = rows.len(), "PENGANGKUT rows updated");
}

fn barang_rules(sheet: &mut Sheet, ctx: &mut RuleContext<'_>) {
    let rows = renumber(sheet, ctx, layout::URAIAN, layout::SERI_BARANG);
    let header = sheet.header_index();
    let (Some(hs_col), Some(uraian_col)) = (header.get(layout::HS), header.get(layout::URAIAN))
    else {
        info!(items = rows.len(), "BARANG rows updated");
        return;
    };

    let mut filled = 0;
    let mut missed = Vec::new();
    for &row in &rows {
        if !sheet.get(row, hs_col).is_blank() {
            continue;
        }
        let description = sheet.get(row, uraian_col).to_text();
        match ctx.references.hs_codes.lookup(&description) {
            Some(code) => {
                sheet.set(row, hs_col, code.clone());
                filled += 1;
            }
            None => missed.push(description.trim().to_string()),
        }
    }
    if !missed.is_empty() {
        debug!(?missed, "No HS code for item descriptions");
    }
    info!(items = rows.len(), hs_filled = filled, "BARANG rows updated");
}
