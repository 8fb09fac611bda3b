use crate::record::{RawRow, Record};
use crate::RowError;

/// Label printed before the issue date in the registration cell
const ISSUE_DATE_PREFIX: &str = "Terbit:";

/// Label printed before the brand in the product cell
const BRAND_PREFIX: &str = "Merk:";

/// Label printed before the packaging in the product cell
const PACKAGING_PREFIX: &str = "Kemasan:";

/// Derives the registration number of a raw row without normalizing the rest
///
/// This is the first line of the registration cell, trimmed. The traversal
/// uses it to check the seen index before paying for a full normalization.
pub fn candidate_id(row: &RawRow) -> Result<String, RowError> {
    let registration = row
        .registration
        .as_deref()
        .ok_or(RowError::MissingRegistration)?;

    let id = registration.lines().next().unwrap_or_default().trim();
    if id.is_empty() {
        return Err(RowError::BlankRegistration);
    }

    Ok(id.to_string())
}

/// Normalizes a raw table row into a [`Record`]
///
/// # Cell Layout
///
/// | Cell | Lines |
/// |------|-------|
/// | registration | `REG123` / `Terbit: 2020-01-01` |
/// | product | name / `Merk: ...` / `Kemasan: ...` |
/// | registrant | name / location |
///
/// Missing lines become `None`. Only a row with no derivable registration
/// number is rejected.
///
/// # Examples
///
/// ```
/// use bpom_harvester::record::{normalize_row, RawRow};
///
/// let row = RawRow::from_cells([
///     "Obat",
///     "REG123\nTerbit: 2020-01-01",
///     "Paracetamol",
///     "PT Farma\nJakarta",
/// ]);
/// let record = normalize_row(&row).unwrap();
/// assert_eq!(record.registration_number, "REG123");
/// assert_eq!(record.issue_date.as_deref(), Some("2020-01-01"));
/// ```
pub fn normalize_row(row: &RawRow) -> Result<Record, RowError> {
    let registration_number = candidate_id(row)?;

    let issue_date = row
        .registration
        .as_deref()
        .and_then(|text| line(text, 1))
        .and_then(|issue| field(strip_label(issue, ISSUE_DATE_PREFIX)));

    let product = row.product.as_deref().unwrap_or_default();
    let registrant = row.registrant.as_deref().unwrap_or_default();

    Ok(Record {
        kind: row.kind.as_deref().and_then(field),
        registration_number,
        issue_date,
        product_name: line(product, 0).and_then(field),
        brand: line(product, 1).and_then(|l| field(strip_label(l, BRAND_PREFIX))),
        packaging: line(product, 2).and_then(|l| field(strip_label(l, PACKAGING_PREFIX))),
        registrant_name: line(registrant, 0).and_then(field),
        registrant_location: line(registrant, 1).and_then(field),
    })
}

/// Returns the `index`-th line of a cell, tolerating CRLF line endings
fn line(text: &str, index: usize) -> Option<&str> {
    text.lines().nth(index)
}

/// Strips a leading label such as `Merk:` if present
fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    let text = text.trim_start();
    text.strip_prefix(label).unwrap_or(text)
}

/// Trims a value and maps blank text to `None`
fn field(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
