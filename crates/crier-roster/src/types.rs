//! Wire types for the sheet API and the row shape handed to callers.

use serde::{Deserialize, Serialize};

/// A range of cell values, as sent to and returned by the sheet API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueRange {
    /// A1 range the values cover. Absent on writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Row-major cell values. Trailing empty cells may be omitted per row.
    #[serde(default)]
    pub values: Vec<Vec<String>>,
}

/// Workbook metadata: the list of sheets it contains.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WorkbookMeta {
    #[serde(default)]
    pub sheets: Vec<SheetEntry>,
}

/// One sheet in the workbook metadata.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SheetEntry {
    pub properties: SheetProperties,
}

/// Properties of a sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetProperties {
    pub title: String,
}

/// Error payload returned by the sheet API.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}

/// One roster row as read from a daily sheet.
///
/// Carries the 1-based sheet row index so mutations can be written back to
/// the exact cells the row came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based sheet row index (the header is row 1, data starts at row 2).
    pub index: u32,
    /// Raw cell strings in column order. Short rows are valid: the API omits
    /// trailing empty cells.
    pub cells: Vec<String>,
}

impl Row {
    /// The cell at a 1-based column index, with empty-and-missing collapsed
    /// to `None` so callers never compare against empty-string sentinels.
    pub fn cell(&self, column: u32) -> Option<&str> {
        self.cells
            .get((column - 1) as usize)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{COL_CALL_STATUS, COL_NAME, COL_PHONE_NUMBER};

    #[test]
    fn cell_returns_none_for_missing_and_empty() {
        let row = Row {
            index: 2,
            cells: vec!["Asha".into(), "".into()],
        };

        assert_eq!(row.cell(COL_NAME), Some("Asha"));
        // Present but empty
        assert_eq!(row.cell(COL_PHONE_NUMBER), None);
        // Beyond the trailing cells the API omitted
        assert_eq!(row.cell(COL_CALL_STATUS), None);
    }

    #[test]
    fn cell_trims_whitespace() {
        let row = Row {
            index: 3,
            cells: vec![" Asha ".into(), "   ".into()],
        };

        assert_eq!(row.cell(COL_NAME), Some("Asha"));
        assert_eq!(row.cell(COL_PHONE_NUMBER), None);
    }

    #[test]
    fn value_range_deserializes_without_values() {
        let range: ValueRange = serde_json::from_str(r#"{"range": "'x'!A2:I"}"#).unwrap();
        assert!(range.values.is_empty());
    }
}
