use crate::error::Result;
use async_trait::async_trait;

pub mod google;

pub use google::{SheetsClient, SheetsSettings};

pub const DEFAULT_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// First and last column of a result row.
pub const FIRST_RESULT_COLUMN: char = 'B';
pub const LAST_RESULT_COLUMN: char = 'N';

/// Writes one result row. A failed write is abandoned, never queued.
#[async_trait]
pub trait RowWriter: Send + Sync {
    async fn write_row(&self, row: usize, values: &[String]) -> Result<()>;
}

#[async_trait]
pub trait RowReader: Send + Sync {
    /// Column A from row 2 down. Blank cells stay in place as empty strings so
    /// that position `i` is always row `i + 2`.
    async fn read_urls(&self) -> Result<Vec<String>>;

    /// Columns A..N from row 2 down, one `Vec` per row.
    async fn read_rows(&self) -> Result<Vec<Vec<String>>>;
}

/// Qualifies a range with the sheet title when one is known.
pub fn qualify(sheet: Option<&str>, range: &str) -> String {
    match sheet {
        Some(name) => format!("'{}'!{}", name, range),
        None => range.to_string(),
    }
}

/// `B{row}:N{row}`, qualified with the sheet name when present.
pub fn row_range(sheet: Option<&str>, row: usize) -> String {
    qualify(
        sheet,
        &format!("{FIRST_RESULT_COLUMN}{row}:{LAST_RESULT_COLUMN}{row}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_range_with_and_without_sheet() {
        assert_eq!(row_range(None, 2), "B2:N2");
        assert_eq!(row_range(Some("URLs 2024"), 17), "'URLs 2024'!B17:N17");
    }
}
