// src/test_support.rs

//! Fixture workbooks shared by the stage tests.

use std::path::{Path, PathBuf};

use crate::workbook::{CellValue, Sheet, TextColumnSchema, Workbook};

pub const TEMPLATE_PLACEHOLDER: &str = "00002701069420250101000123";

fn headers(names: &[&str]) -> Vec<CellValue> {
    names.iter().map(|n| CellValue::text(*n)).collect()
}

pub fn text_row(values: &[&str]) -> Vec<CellValue> {
    values.iter().map(|v| CellValue::text(*v)).collect()
}

/// A five-sheet PIB template shaped like the one customs staff maintain.
pub fn pib_template() -> Workbook {
    let header = Sheet::from_rows(
        "HEADER",
        vec![
            headers(&[
                "NOMOR AJU",
                "KODE DOKUMEN",
                "KODE KANTOR",
                "KODE JENIS TPB",
                "KODE TUJUAN PENGIRIMAN",
                "KODE KANTOR TUJUAN",
                "KODE TUJUAN TPB",
                "CIF",
                "BRUTO",
                "NETTO",
                "TANGGAL PERNYATAAN",
                "KODE VALUTA",
                "KOTA PERNYATAAN",
                "NAMA PERNYATAAN",
                "JABATAN PERNYATAAN",
            ]),
            text_row(&[
                TEMPLATE_PLACEHOLDER,
                "40",
                "050900",
                "1",
                "",
                "050900",
                "",
                "",
                "",
                "",
                "",
                "USD",
            ]),
        ],
    );

    let mut entitas_rows = vec![headers(&[
        "NOMOR AJU",
        "SERI",
        "KODE ENTITAS",
        "KODE JENIS IDENTITAS",
        "NOMOR IDENTITAS",
        "NAMA ENTITAS",
        "ALAMAT ENTITAS",
        "NIB ENTITAS",
        "NOMOR IJIN ENTITAS",
    ])];
    for (seri, kode, name) in [
        (1, 3, "OWNER PLACEHOLDER"),
        (2, 7, "SENDER PLACEHOLDER"),
        (3, 8, "CUSTOMER PLACEHOLDER"),
    ] {
        entitas_rows.push(vec![
            CellValue::Empty,
            CellValue::Int(seri),
            CellValue::Int(kode),
            CellValue::Int(5),
            CellValue::Empty,
            CellValue::text(name),
        ]);
    }
    let entitas = Sheet::from_rows("ENTITAS", entitas_rows);

    let dokumen = Sheet::from_rows(
        "DOKUMEN",
        vec![headers(&[
            "NOMOR AJU",
            "SERI",
            "KODE DOKUMEN",
            "NOMOR DOKUMEN",
            "TANGGAL DOKUMEN",
        ])],
    );

    let pengangkut = Sheet::from_rows(
        "PENGANGKUT",
        vec![headers(&["NOMOR AJU", "SERI", "NAMA PENGANGKUT", "NOMOR PENGANGKUT"])],
    );

    let barang = Sheet::from_rows(
        "BARANG",
        vec![
            headers(&[
                "NOMOR AJU",
                "SERI BARANG",
                "HS",
                "KODE BARANG",
                "URAIAN",
                "KODE SATUAN",
                "JUMLAH SATUAN",
                "NETTO",
                "CIF",
            ]),
            text_row(&["", "", "", "", "", "PCE"]),
        ],
    );

    Workbook::new(vec![header, entitas, dokumen, pengangkut, barang])
}

pub fn save_template(dir: &Path) -> PathBuf {
    let path = dir.join("pib_template.xlsx");
    pib_template()
        .save(&path, &TextColumnSchema::customs())
        .expect("save template fixture");
    path
}

/// Save a single-sheet reference table.
pub fn save_reference(dir: &Path, file: &str, rows: Vec<Vec<CellValue>>) -> PathBuf {
    let path = dir.join(file);
    Workbook::new(vec![Sheet::from_rows("Sheet1", rows)])
        .save(&path, &TextColumnSchema::empty())
        .expect("save reference fixture");
    path
}

pub fn customer_reference(dir: &Path) -> PathBuf {
    save_reference(
        dir,
        "customer_list.xlsx",
        vec![
            headers(&["NAMA ENTITAS ", "ALAMAT ENTITAS", "NOMOR IDENTITAS", "KODE NEGARA"]),
            text_row(&["CV. SINAR TERANG", "SURABAYA", "0123456789012345000000", "ID"]),
            text_row(&[
                "PT. MAJU BERSAMA TBK",
                "JL. GATOT SUBROTO 12, JAKARTA",
                "0021234567890000000000",
                "ID",
            ]),
        ],
    )
}

pub fn hs_reference(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let mut rows = vec![headers(&["URAIAN", "HS"])];
    rows.extend(entries.iter().map(|(uraian, hs)| text_row(&[*uraian, *hs])));
    save_reference(dir, "hs_code.xlsx", rows)
}

/// Text of the cell under `header` in `row` of `sheet`.
pub fn cell(book: &Workbook, sheet: &str, row: usize, header: &str) -> String {
    let sheet = book.sheet(sheet).expect("sheet present");
    let col = sheet.header_index().get(header).expect("column present");
    sheet.get(row, col).to_text()
}
