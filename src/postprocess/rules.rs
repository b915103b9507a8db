// src/postprocess/rules.rs

//! Fixed customs values written by the post-processor.

/// HEADER row 2: office, bonded-zone, destination and declarant fields.
pub const HEADER_OVERRIDES: &[(&str, &str)] = &[
    ("KODE KANTOR", "050900"),
    ("KODE KANTOR TUJUAN", "050900"),
    ("KODE JENIS TPB", "2"),
    ("KODE TUJUAN PENGIRIMAN", "1"),
    ("KODE TUJUAN TPB", "1"),
    ("KOTA PERNYATAAN", "BEKASI"),
    ("NAMA PERNYATAAN", "NATAMIA"),
    ("JABATAN PERNYATAAN", "MANAGER"),
];

/// ENTITAS row with KODE ENTITAS 7.
pub const SENDER_FIELDS: &[(&str, &str)] = &[
    ("NOMOR IDENTITAS", "0010694040059000000000"),
    ("NAMA ENTITAS", "INABATA INDONESIA"),
    (
        "ALAMAT ENTITAS",
        "KAWASAN INDUSTRI MM2100 JALAN BALI BLOK J-10, BEKASI",
    ),
];

/// ENTITAS row with KODE ENTITAS 3.
pub const OWNER_FIELDS: &[(&str, &str)] = &[
    ("NOMOR IDENTITAS", "0010694040059000000000"),
    ("NAMA ENTITAS", "INABATA INDONESIA"),
    ("NIB ENTITAS", "9120101260717"),
    ("NOMOR IJIN ENTITAS", "3/KM.4/WBC.08/2025"),
];

/// DOKUMEN type codes: invoice, packing list, goods receipt.
pub const DOC_TYPE_CYCLE: [i64; 3] = [380, 217, 630];

pub const NOMOR_PENGANGKUT_PLACEHOLDER: &str = "-";

/// `values[index mod len]`; `None` only for an empty slice.
pub fn cycle_value<T: Copy>(index: usize, values: &[T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    values.get(index % values.len()).copied()
}
