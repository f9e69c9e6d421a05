use std::fmt;
use std::io::Cursor;
use std::path::Path;

use branchmap_shared::site::{
    BRANCH_COLUMN, LATITUDE_COLUMN, LONGITUDE_COLUMN, PROVINCE_COLUMN, REGENCY_COLUMN,
};
use branchmap_shared::{SheetLayout, SiteRecord, SiteTable};
use calamine::{Data, Range, Reader, Xlsx, open_workbook_auto, open_workbook_from_rs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Open { path: String, reason: String },
    EmptyWorkbook,
    MissingColumns(Vec<String>),
    Interrupted(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, reason } => write!(f, "could not read {path}: {reason}"),
            Self::EmptyWorkbook => f.write_str("the workbook has no sheet with a header row"),
            Self::MissingColumns(columns) => write!(
                f,
                "the following columns are required in the file: {}",
                columns.join(", ")
            ),
            Self::Interrupted(reason) => write!(f, "loading the sheet was interrupted: {reason}"),
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub table: SiteTable,
    /// Non-blank rows dropped for lacking usable coordinates.
    pub skipped_rows: usize,
}

pub fn load_from_path(path: &Path, layout: SheetLayout) -> Result<LoadReport, LoadError> {
    let open_error = |reason: String| LoadError::Open {
        path: path.display().to_string(),
        reason,
    };
    let mut workbook = open_workbook_auto(path).map_err(|e| open_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::EmptyWorkbook)?
        .map_err(|e| open_error(e.to_string()))?;
    parse_range(&range, layout)
}

pub fn load_from_bytes(bytes: &[u8], layout: SheetLayout) -> Result<LoadReport, LoadError> {
    let open_error = |reason: String| LoadError::Open {
        path: "<memory>".to_owned(),
        reason,
    };
    let mut workbook = open_workbook_from_rs::<Xlsx<_>, _>(Cursor::new(bytes))
        .map_err(|e| open_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::EmptyWorkbook)?
        .map_err(|e| open_error(e.to_string()))?;
    parse_range(&range, layout)
}

struct ColumnIndex {
    province: Option<usize>,
    regency: usize,
    branch: usize,
    latitude: usize,
    longitude: usize,
    extras: Vec<(usize, String)>,
}

fn parse_range(range: &Range<Data>, layout: SheetLayout) -> Result<LoadReport, LoadError> {
    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or(LoadError::EmptyWorkbook)?
        .iter()
        .map(cell_text)
        .collect();
    if header.iter().all(String::is_empty) {
        return Err(LoadError::EmptyWorkbook);
    }
    let index = index_columns(&header, layout)?;

    let mut records = Vec::new();
    let mut skipped_rows = 0;
    for row in rows {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let coords = (
            row.get(index.latitude).and_then(cell_number),
            row.get(index.longitude).and_then(cell_number),
        );
        let (Some(latitude), Some(longitude)) = coords else {
            skipped_rows += 1;
            continue;
        };
        let text_at = |idx: usize| row.get(idx).map(cell_text).unwrap_or_default();
        records.push(SiteRecord {
            province: index.province.map(text_at),
            regency: text_at(index.regency),
            branch: text_at(index.branch),
            latitude,
            longitude,
            extras: index.extras.iter().map(|(idx, _)| text_at(*idx)).collect(),
        });
    }

    Ok(LoadReport {
        table: SiteTable {
            layout,
            extra_columns: index.extras.into_iter().map(|(_, name)| name).collect(),
            records,
        },
        skipped_rows,
    })
}

fn index_columns(header: &[String], layout: SheetLayout) -> Result<ColumnIndex, LoadError> {
    let position = |name: &str| header.iter().position(|column| column == name);

    let missing: Vec<String> = layout
        .required_columns()
        .iter()
        .filter(|name| position(**name).is_none())
        .map(|name| (*name).to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns(missing));
    }

    let required = layout.required_columns();
    let extras = header
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty() && !required.contains(&name.as_str()))
        .map(|(idx, name)| (idx, name.clone()))
        .collect();

    // Presence was checked above.
    let find = |name: &str| position(name).unwrap_or_default();
    Ok(ColumnIndex {
        province: layout.has_province().then(|| find(PROVINCE_COLUMN)),
        regency: find(REGENCY_COLUMN),
        branch: find(BRANCH_COLUMN),
        latitude: find(LATITUDE_COLUMN),
        longitude: find(LONGITUDE_COLUMN),
        extras,
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_owned(),
        other => other.to_string().trim().to_owned(),
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    let value = match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    /// Builds an in-memory workbook: first row is the header, `None` cells stay blank.
    pub(crate) fn workbook_bytes(header: &[&str], rows: &[Vec<Option<&str>>]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in header.iter().enumerate() {
            sheet
                .write_string(0, col as u16, *name)
                .expect("write header");
        }
        for (row_idx, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                let Some(cell) = cell else { continue };
                let (row, col) = (row_idx as u32 + 1, col as u16);
                match cell.parse::<f64>() {
                    Ok(number) => sheet.write_number(row, col, number),
                    Err(_) => sheet.write_string(row, col, *cell),
                }
                .expect("write cell");
            }
        }
        workbook.save_to_buffer().expect("save workbook")
    }

    pub(crate) fn provincial_fixture() -> Vec<u8> {
        workbook_bytes(
            &[" PROVINSI", "KABUPATEN/KOTA ", "KCP", "Latitude", "Longitude", "ALAMAT"],
            &[
                vec![
                    Some("KALIMANTAN BARAT"),
                    Some("KOTA PONTIANAK"),
                    Some("KCP Pontianak"),
                    Some("-0.0263"),
                    Some("109.3425"),
                    Some("Jl. Gajah Mada 1"),
                ],
                vec![
                    Some("KALIMANTAN BARAT"),
                    Some("KOTA SINGKAWANG"),
                    Some("KCP Singkawang"),
                    Some("0.9060"),
                    Some("108.9846"),
                    None,
                ],
                vec![
                    Some("KALIMANTAN TIMUR"),
                    Some("KOTA SAMARINDA"),
                    Some("KCP Samarinda"),
                    Some("-0.5022"),
                    Some("117.1536"),
                    Some("Jl. Pahlawan"),
                ],
            ],
        )
    }

    #[test]
    fn loads_records_with_trimmed_headers_and_extras() {
        let report = load_from_bytes(&provincial_fixture(), SheetLayout::Provincial)
            .expect("fixture should load");
        let table = report.table;

        assert_eq!(report.skipped_rows, 0);
        assert_eq!(table.len(), 3);
        assert_eq!(table.extra_columns, vec!["ALAMAT".to_string()]);
        let first = &table.records[0];
        assert_eq!(first.province.as_deref(), Some("KALIMANTAN BARAT"));
        assert_eq!(first.regency, "KOTA PONTIANAK");
        assert_eq!(first.branch, "KCP Pontianak");
        assert!((first.latitude + 0.0263).abs() < 1e-9);
        assert_eq!(first.extras, vec!["Jl. Gajah Mada 1".to_string()]);
        assert_eq!(table.records[1].extras, vec![String::new()]);
    }

    #[test]
    fn missing_columns_are_all_named() {
        let bytes = workbook_bytes(
            &["KABUPATEN/KOTA", "Latitude"],
            &[vec![Some("KOTA PONTIANAK"), Some("-0.02")]],
        );
        let err = load_from_bytes(&bytes, SheetLayout::Provincial).expect_err("must fail");
        assert_eq!(
            err,
            LoadError::MissingColumns(vec![
                PROVINCE_COLUMN.to_string(),
                LONGITUDE_COLUMN.to_string(),
                BRANCH_COLUMN.to_string(),
            ])
        );
        assert!(err.to_string().contains("PROVINSI, Longitude, KCP"));
    }

    #[test]
    fn regional_layout_needs_no_province() {
        let bytes = workbook_bytes(
            &["KABUPATEN/KOTA", "Latitude", "Longitude", "KCP"],
            &[vec![
                Some("KOTA PONTIANAK"),
                Some("-0.02"),
                Some("109.34"),
                Some("KCP Pontianak"),
            ]],
        );
        let table = load_from_bytes(&bytes, SheetLayout::Regional)
            .expect("regional sheet should load")
            .table;
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].province, None);
        assert!(table.extra_columns.is_empty());
    }

    #[test]
    fn rows_without_coordinates_are_skipped_and_counted() {
        let bytes = workbook_bytes(
            &["KABUPATEN/KOTA", "Latitude", "Longitude", "KCP"],
            &[
                vec![Some("KOTA A"), Some("n/a"), Some("109.1"), Some("KCP A")],
                vec![None, None, None, None],
                vec![Some("KOTA B"), Some("-0,5"), Some("109,2"), Some("KCP B")],
                vec![Some("KOTA C"), None, Some("109.3"), Some("KCP C")],
            ],
        );
        let report = load_from_bytes(&bytes, SheetLayout::Regional).expect("sheet should load");
        assert_eq!(report.skipped_rows, 2);
        assert_eq!(report.table.len(), 1);
        assert!((report.table.records[0].latitude + 0.5).abs() < 1e-9);
    }

    #[test]
    fn header_only_sheet_is_an_empty_table() {
        let bytes = workbook_bytes(&["KABUPATEN/KOTA", "Latitude", "Longitude", "KCP"], &[]);
        let report = load_from_bytes(&bytes, SheetLayout::Regional).expect("sheet should load");
        assert!(report.table.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_from_path(Path::new("/nonexistent/sites.xlsx"), SheetLayout::Provincial)
            .expect_err("missing file must fail");
        assert!(matches!(err, LoadError::Open { ref path, .. } if path.contains("sites.xlsx")));
    }
}
