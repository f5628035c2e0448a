//! Contact records and the sources that supply them
//!
//! Sources only convert rows into [`Contact`]s; deciding whether a contact can
//! be attempted is left to the orchestration loop.

use crate::errors::SourceError;
use calamine::{open_workbook_auto, Data, Reader};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One row of the contact sheet. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub given_name: String,
    pub family_name: String,
    /// The phone cell as read, before normalization. `None` when the cell was empty.
    pub raw_phone: Option<String>,
    pub message_template: String,
}

impl Contact {
    pub fn new(
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        raw_phone: Option<&str>,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            given_name: given_name.into(),
            family_name: family_name.into(),
            raw_phone: raw_phone.map(str::to_string),
            message_template: message_template.into(),
        }
    }

    /// The phone field, if it holds anything besides whitespace.
    pub fn phone(&self) -> Option<&str> {
        self.raw_phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Contacts without a phone or a message are never attempted.
    pub fn is_missing_data(&self) -> bool {
        self.phone().is_none() || self.message_template.trim().is_empty()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }
}

/// Supplies contacts in sheet order.
pub trait ContactSource {
    fn read_contacts(&self) -> Result<Vec<Contact>, SourceError>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

/// Pick a source implementation from the file extension.
pub fn open_contact_source(path: &Path) -> Result<Box<dyn ContactSource>, SourceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xls" => Ok(Box::new(XlsxContactSource::new(path))),
        "csv" => Ok(Box::new(CsvContactSource::new(path))),
        "json" => Ok(Box::new(JsonContactSource::new(path))),
        _ => Err(SourceError::UnsupportedFormat(path.display().to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "First name", alias = "given_name", default)]
    given_name: Option<String>,
    #[serde(rename = "Last name", alias = "family_name", default)]
    family_name: Option<String>,
    // required columns: a sheet without them is malformed, not a batch of skips
    #[serde(rename = "Telephone number", alias = "raw_phone")]
    raw_phone: String,
    #[serde(rename = "Message", alias = "message_template")]
    message_template: String,
}

/// Reads a CSV export of the contact sheet.
///
/// Expected headers are `First name`, `Last name`, `Telephone number` and
/// `Message`; the snake_case field names are accepted as well. The phone
/// column is read as text so a leading `+` survives.
#[derive(Debug, Clone)]
pub struct CsvContactSource {
    path: PathBuf,
}

impl CsvContactSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_error(&self, reason: impl std::fmt::Display) -> SourceError {
        SourceError::Read {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ContactSource for CsvContactSource {
    fn read_contacts(&self) -> Result<Vec<Contact>, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(&self.path)
            .map_err(|e| self.read_error(e))?;

        let mut contacts = Vec::new();
        for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
            // +2: one for the header, one for 1-based numbering
            let row = row.map_err(|e| self.read_error(format!("row {}: {e}", index + 2)))?;
            contacts.push(Contact {
                given_name: row.given_name.unwrap_or_default(),
                family_name: row.family_name.unwrap_or_default(),
                raw_phone: Some(row.raw_phone).filter(|p| !p.trim().is_empty()),
                message_template: row.message_template,
            });
        }

        info!(count = contacts.len(), source = %self.describe(), "Loaded contacts");
        Ok(contacts)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Reads the first worksheet of an Excel workbook.
///
/// The first row holds the headers, matched like the CSV columns. Numeric
/// phone cells come through as spreadsheet floats (`9876543210.0`) and are
/// left for the normalizer to clean up.
#[derive(Debug, Clone)]
pub struct XlsxContactSource {
    path: PathBuf,
}

impl XlsxContactSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_error(&self, reason: impl std::fmt::Display) -> SourceError {
        SourceError::Read {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Column positions resolved from a header row.
struct SheetColumns {
    given_name: Option<usize>,
    family_name: Option<usize>,
    raw_phone: usize,
    message_template: usize,
}

impl SheetColumns {
    fn resolve(header: &[Data]) -> Result<Self, String> {
        let find = |names: &[&str]| {
            header.iter().position(|cell| {
                let title = cell.to_string();
                names.iter().any(|name| title.trim() == *name)
            })
        };
        Ok(Self {
            given_name: find(&["First name", "given_name"]),
            family_name: find(&["Last name", "family_name"]),
            raw_phone: find(&["Telephone number", "raw_phone"])
                .ok_or("missing column 'Telephone number'")?,
            message_template: find(&["Message", "message_template"])
                .ok_or("missing column 'Message'")?,
        })
    }
}

fn cell_text(row: &[Data], column: Option<usize>) -> Option<String> {
    match column.and_then(|c| row.get(c))? {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        // Debug keeps the trailing `.0` a spreadsheet export would show
        Data::Float(f) => Some(format!("{f:?}")),
        Data::Int(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

impl ContactSource for XlsxContactSource {
    fn read_contacts(&self) -> Result<Vec<Contact>, SourceError> {
        let mut workbook = open_workbook_auto(&self.path).map_err(|e| self.read_error(e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| self.read_error("workbook has no worksheets"))?
            .map_err(|e| self.read_error(e))?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| self.read_error("worksheet is empty"))?;
        let columns = SheetColumns::resolve(header).map_err(|e| self.read_error(e))?;

        let contacts: Vec<Contact> = rows
            .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
            .map(|row| Contact {
                given_name: cell_text(row, columns.given_name).unwrap_or_default(),
                family_name: cell_text(row, columns.family_name).unwrap_or_default(),
                raw_phone: cell_text(row, Some(columns.raw_phone))
                    .filter(|p| !p.trim().is_empty()),
                message_template: cell_text(row, Some(columns.message_template))
                    .unwrap_or_default(),
            })
            .collect();

        info!(count = contacts.len(), source = %self.describe(), "Loaded contacts");
        Ok(contacts)
    }

    fn describe(&self) -> String {
        format!("xlsx:{}", self.path.display())
    }
}

/// A phone cell that may have been exported as a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPhone {
    Text(String),
    Integer(i64),
    Float(f64),
    Null(()),
}

impl RawPhone {
    fn into_text(self) -> Option<String> {
        match self {
            RawPhone::Text(s) => Some(s),
            RawPhone::Integer(n) => Some(n.to_string()),
            RawPhone::Float(f) => Some(f.to_string()),
            RawPhone::Null(()) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonContact {
    #[serde(alias = "First name", default)]
    given_name: Option<String>,
    #[serde(alias = "Last name", default)]
    family_name: Option<String>,
    #[serde(alias = "Telephone number")]
    raw_phone: RawPhone,
    #[serde(alias = "Message", default)]
    message_template: Option<String>,
}

/// Reads a JSON array of contact objects.
#[derive(Debug, Clone)]
pub struct JsonContactSource {
    path: PathBuf,
}

impl JsonContactSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_error(&self, reason: impl std::fmt::Display) -> SourceError {
        SourceError::Read {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ContactSource for JsonContactSource {
    fn read_contacts(&self) -> Result<Vec<Contact>, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        let rows: Vec<JsonContact> =
            serde_json::from_str(&text).map_err(|e| self.read_error(e))?;
        debug!(rows = rows.len(), "Parsed JSON contact rows");

        let contacts: Vec<Contact> = rows
            .into_iter()
            .map(|row| Contact {
                given_name: row.given_name.unwrap_or_default(),
                family_name: row.family_name.unwrap_or_default(),
                raw_phone: row.raw_phone.into_text(),
                message_template: row.message_template.unwrap_or_default(),
            })
            .collect();

        info!(count = contacts.len(), source = %self.describe(), "Loaded contacts");
        Ok(contacts)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}
