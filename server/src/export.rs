use std::fmt;

use branchmap_shared::view::tagged_rows;
use branchmap_shared::{CellValue, ColorTags, SiteRecord, SiteTable, StageSelection};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::config::{TAGGED_EXPORT_FALLBACK_STEM, TAGGED_EXPORT_SUFFIX};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const COLOR_COLUMN: &str = "color";

#[derive(Debug)]
pub struct ExportError(XlsxError);

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to build spreadsheet: {}", self.0)
    }
}

impl std::error::Error for ExportError {}

impl From<XlsxError> for ExportError {
    fn from(value: XlsxError) -> Self {
        Self(value)
    }
}

/// The filtered subset, with the sheet's own header.
pub fn filtered_workbook<'a, I>(table: &SiteTable, records: I) -> Result<Vec<u8>, ExportError>
where
    I: IntoIterator<Item = &'a SiteRecord>,
{
    write_workbook(table, records, None)
}

/// Every row of the table whose branch has an explicit color, plus a `color` column.
pub fn tagged_workbook(table: &SiteTable, tags: &ColorTags) -> Result<Vec<u8>, ExportError> {
    write_workbook(table, tagged_rows(table, tags), Some(tags))
}

fn write_workbook<'a, I>(
    table: &SiteTable,
    records: I,
    tags: Option<&ColorTags>,
) -> Result<Vec<u8>, ExportError>
where
    I: IntoIterator<Item = &'a SiteRecord>,
{
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sites")?;

    let mut columns = table.columns();
    if tags.is_some() {
        columns.push(COLOR_COLUMN.to_owned());
    }
    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col_index(col), name, &header_format)?;
    }

    let mut row = 1_u32;
    for record in records {
        let mut values = table.row_values(record);
        if let Some(tags) = tags {
            values.push(CellValue::Text(tags.lookup(&record.branch).name().to_owned()));
        }
        write_row(sheet, row, &values)?;
        row += 1;
    }
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

fn write_row(sheet: &mut Worksheet, row: u32, values: &[CellValue]) -> Result<(), XlsxError> {
    for (col, value) in values.iter().enumerate() {
        match value {
            CellValue::Number(number) => {
                sheet.write_number(row, col_index(col), *number)?;
            }
            CellValue::Text(text) if text.is_empty() => {}
            CellValue::Text(text) => {
                sheet.write_string(row, col_index(col), text)?;
            }
        }
    }
    Ok(())
}

fn col_index(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

/// `kota_pontianak_kab._kubu_raya_color_tags.xlsx`, or the fallback stem when
/// no regency is explicitly picked.
pub fn tagged_filename(regencies: &StageSelection) -> String {
    let stem = match regencies.explicit() {
        Some(names) if !names.is_empty() => names
            .iter()
            .map(|name| name.trim().to_lowercase().replace(' ', "_"))
            .collect::<Vec<_>>()
            .join("_"),
        _ => TAGGED_EXPORT_FALLBACK_STEM.to_owned(),
    };
    format!("{stem}{TAGGED_EXPORT_SUFFIX}")
}
