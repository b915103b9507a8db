// src/workbook/schema.rs

use super::Sheet;
use crate::layout;

/// A column that must be stored and formatted as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColumn {
    /// Resolved through the sheet's header row.
    Named(&'static str),
    /// Fixed 1-based position, independent of the header text.
    Position(usize),
}

/// Per-sheet declaration of forced-text columns.
///
/// Both the read path (type-fix conversion) and the write path (column number
/// format) consult the same declaration.
#[derive(Debug, Clone, Default)]
pub struct TextColumnSchema {
    sheets: Vec<(&'static str, Vec<TextColumn>)>,
}

impl TextColumnSchema {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Columns whose codes carry significant leading zeros in the PIB layout.
    pub fn customs() -> Self {
        Self::empty()
            .with(
                layout::ENTITAS,
                vec![
                    TextColumn::Named(layout::NOMOR_AJU),
                    TextColumn::Named(layout::NOMOR_IDENTITAS),
                ],
            )
            .with(
                layout::HEADER,
                vec![
                    // office codes such as "050900" sit in C and F
                    TextColumn::Position(3),
                    TextColumn::Position(6),
                    TextColumn::Named(layout::NOMOR_AJU),
                ],
            )
    }

    pub fn with(mut self, sheet: &'static str, columns: Vec<TextColumn>) -> Self {
        match self.sheets.iter_mut().find(|(name, _)| *name == sheet) {
            Some((_, existing)) => existing.extend(columns),
            None => self.sheets.push((sheet, columns)),
        }
        self
    }

    /// Resolve the declaration for `sheet` into sorted, distinct 1-based columns.
    ///
    /// Named columns missing from the header row and positions beyond the
    /// sheet's width are ignored.
    pub fn columns_for(&self, sheet: &Sheet) -> Vec<usize> {
        let Some((_, declared)) = self.sheets.iter().find(|(name, _)| *name == sheet.name())
        else {
            return Vec::new();
        };

        let header = sheet.header_index();
        let width = sheet.max_column();
        let mut columns: Vec<usize> = declared
            .iter()
            .filter_map(|column| match column {
                TextColumn::Named(name) => header.get(name),
                TextColumn::Position(pos) if *pos >= 1 && *pos <= width => Some(*pos),
                TextColumn::Position(_) => None,
            })
            .collect();
        columns.sort_unstable();
        columns.dedup();
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellValue;

    #[test]
    fn test_entitas_named_columns_resolve() {
        let sheet = Sheet::from_rows(
            layout::ENTITAS,
            vec![vec![
                CellValue::text("KODE ENTITAS"),
                CellValue::text("NOMOR IDENTITAS"),
                CellValue::text("NOMOR AJU"),
            ]],
        );
        assert_eq!(TextColumnSchema::customs().columns_for(&sheet), vec![2, 3]);
    }

    #[test]
    fn test_positions_respect_sheet_width() {
        let sheet = Sheet::from_rows(
            layout::HEADER,
            vec![vec![
                CellValue::text("NOMOR AJU"),
                CellValue::text("CIF"),
                CellValue::text("KODE KANTOR"),
                CellValue::text("BRUTO"),
            ]],
        );
        // F is beyond the sheet; NOMOR AJU resolves to A.
        assert_eq!(TextColumnSchema::customs().columns_for(&sheet), vec![1, 3]);
    }

    #[test]
    fn test_undeclared_sheet_has_no_text_columns() {
        let sheet = Sheet::from_rows("BARANG", vec![vec![CellValue::text("HS")]]);
        assert!(TextColumnSchema::customs().columns_for(&sheet).is_empty());
    }
}
