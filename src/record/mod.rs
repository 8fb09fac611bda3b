//! Record types for the product registry
//!
//! A [`RawRow`] is the text scraped from one rendered table row. The
//! normalizer turns it into a [`Record`], which is what the store persists and
//! the read API serves.
//!
//! Field names on disk are camelCase. Store files written by the earlier
//! Indonesian-language tool are still accepted through serde aliases.

mod normalize;

pub use normalize::{candidate_id, normalize_row};

use serde::{Deserialize, Serialize};

/// One registered product entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Registration category tag as shown in the first column
    #[serde(alias = "tipe", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Globally unique registration number (primary key)
    #[serde(alias = "nomorRegistrasi")]
    pub registration_number: String,

    /// Issue date exactly as the source prints it; `null` when not shown
    #[serde(alias = "tanggalTerbit", default)]
    pub issue_date: Option<String>,

    #[serde(alias = "namaProduk", default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(alias = "merk", default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(alias = "kemasan", default, skip_serializing_if = "Option::is_none")]
    pub packaging: Option<String>,

    #[serde(alias = "namaPendaftar", default, skip_serializing_if = "Option::is_none")]
    pub registrant_name: Option<String>,

    #[serde(alias = "lokasiPendaftar", default, skip_serializing_if = "Option::is_none")]
    pub registrant_location: Option<String>,
}

/// Unnormalized cell text of one table row
///
/// Cells are `None` when the rendered row had fewer than four `<td>` elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub kind: Option<String>,
    pub registration: Option<String>,
    pub product: Option<String>,
    pub registrant: Option<String>,
}

impl RawRow {
    /// Builds a row from cell texts in column order
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cells = cells.into_iter().map(Into::into);
        Self {
            kind: cells.next(),
            registration: cells.next(),
            product: cells.next(),
            registrant: cells.next(),
        }
    }
}
