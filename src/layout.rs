// src/layout.rs

//! Sheet and column names of the PIB declaration template.

pub const HEADER: &str = "HEADER";
pub const ENTITAS: &str = "ENTITAS";
pub const DOKUMEN: &str = "DOKUMEN";
pub const PENGANGKUT: &str = "PENGANGKUT";
pub const BARANG: &str = "BARANG";

pub const NOMOR_AJU: &str = "NOMOR AJU";
pub const SERI: &str = "SERI";

// HEADER
pub const TANGGAL_PERNYATAAN: &str = "TANGGAL PERNYATAAN";

// ENTITAS
pub const KODE_ENTITAS: &str = "KODE ENTITAS";
pub const NAMA_ENTITAS: &str = "NAMA ENTITAS";
pub const NOMOR_IDENTITAS: &str = "NOMOR IDENTITAS";

// DOKUMEN
pub const KODE_DOKUMEN: &str = "KODE DOKUMEN";
pub const NOMOR_DOKUMEN: &str = "NOMOR DOKUMEN";
pub const TANGGAL_DOKUMEN: &str = "TANGGAL DOKUMEN";

// PENGANGKUT
pub const NAMA_PENGANGKUT: &str = "NAMA PENGANGKUT";
pub const NOMOR_PENGANGKUT: &str = "NOMOR PENGANGKUT";

// BARANG
pub const SERI_BARANG: &str = "SERI BARANG";
pub const URAIAN: &str = "URAIAN";
pub const HS: &str = "HS";

/// Classification codes found in the ENTITAS sheet.
pub const KODE_CUSTOMER: &str = "8";
pub const KODE_SENDER: &str = "7";
pub const KODE_OWNER: &str = "3";
