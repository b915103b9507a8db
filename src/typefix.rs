// src/typefix.rs

//! Stage 4: make code columns real text so spreadsheet applications keep
//! their leading zeros.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{PipelineError, require_file};
use crate::workbook::{TextColumnSchema, Workbook};

/// Rewrite `path` with the customs forced-text columns.
pub fn fix_text_columns(path: &Path) -> Result<PathBuf, PipelineError> {
    fix_text_columns_with(path, &TextColumnSchema::customs())
}

pub fn fix_text_columns_with(
    path: &Path,
    schema: &TextColumnSchema,
) -> Result<PathBuf, PipelineError> {
    require_file("Final Excel", path)?;

    let span = tracing::info_span!("typefix", file = %path.display());
    let _guard = span.enter();

    let mut workbook = Workbook::load(path)?;
    let mut converted = 0;
    for sheet in workbook.sheets_mut() {
        for col in schema.columns_for(sheet) {
            let n = sheet.force_text(col);
            if n > 0 {
                debug!(sheet = %sheet.name(), column = col, cells = n, "Converted to text");
            }
            converted += n;
        }
    }

    workbook.save(path, schema)?;
    info!(converted, "Text columns fixed");
    Ok(path.to_path_buf())
}
