// src/workbook/header.rs

use std::collections::HashMap;

use super::CellValue;

/// Name → column lookup derived from a sheet's first row.
///
/// Header text is trimmed; blank header cells are skipped. When the same name
/// appears more than once the leftmost column wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderIndex {
    by_name: HashMap<String, usize>,
    ordered: Vec<(String, usize)>,
}

impl HeaderIndex {
    /// Build from the cells of a header row. Columns are 1-based.
    pub fn from_row(cells: &[CellValue]) -> Self {
        let mut index = Self::default();
        for (i, cell) in cells.iter().enumerate() {
            let name = cell.to_text();
            let name = name.trim();
            if name.is_empty() || index.by_name.contains_key(name) {
                continue;
            }
            index.by_name.insert(name.to_string(), i + 1);
            index.ordered.push((name.to_string(), i + 1));
        }
        index
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.by_name.get(name.trim()).copied()
    }

    /// Header names with their columns, left to right.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.ordered.iter().map(|(name, col)| (name.as_str(), *col))
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::text(*c)).collect()
    }

    #[test]
    fn test_trims_and_skips_blank_headers() {
        let index = HeaderIndex::from_row(&row(&["  SERI ", "", "URAIAN", "   "]));
        assert_eq!(index.get("SERI"), Some(1));
        assert_eq!(index.get("URAIAN"), Some(3));
        assert_eq!(index.iter().count(), 2);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let index = HeaderIndex::from_row(&row(&["HS", "URAIAN", "HS"]));
        assert_eq!(index.get("HS"), Some(1));
        let names: Vec<_> = index.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["HS", "URAIAN"]);
    }

    #[test]
    fn test_lookup_trims_query() {
        let index = HeaderIndex::from_row(&row(&["NOMOR AJU"]));
        assert_eq!(index.get(" NOMOR AJU "), Some(1));
        assert_eq!(index.get("NOMOR"), None);
    }

    #[test]
    fn test_numeric_header_is_text() {
        let index = HeaderIndex::from_row(&[CellValue::Int(2024), CellValue::Float(7.0)]);
        assert_eq!(index.get("2024"), Some(1));
        assert_eq!(index.get("7"), Some(2));
    }
}
