use serde::{Deserialize, Serialize};

pub const PROVINCE_COLUMN: &str = "PROVINSI";
pub const REGENCY_COLUMN: &str = "KABUPATEN/KOTA";
pub const BRANCH_COLUMN: &str = "KCP";
pub const LATITUDE_COLUMN: &str = "Latitude";
pub const LONGITUDE_COLUMN: &str = "Longitude";

/// Which header set the sheet is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetLayout {
    /// Regency, branch and coordinates only.
    Regional,
    /// Adds a province column in front of the regional set.
    #[default]
    Provincial,
}

impl SheetLayout {
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Regional => &[REGENCY_COLUMN, LATITUDE_COLUMN, LONGITUDE_COLUMN, BRANCH_COLUMN],
            Self::Provincial => &[
                PROVINCE_COLUMN,
                REGENCY_COLUMN,
                LATITUDE_COLUMN,
                LONGITUDE_COLUMN,
                BRANCH_COLUMN,
            ],
        }
    }

    pub fn has_province(self) -> bool {
        matches!(self, Self::Provincial)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "regional" | "v1" => Some(Self::Regional),
            "provincial" | "v2" | "v3" => Some(Self::Provincial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub province: Option<String>,
    pub regency: String,
    pub branch: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Values of the non-required columns, aligned with `SiteTable::extra_columns`.
    #[serde(default)]
    pub extras: Vec<String>,
}

impl SiteRecord {
    pub fn province_name(&self) -> &str {
        self.province.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SiteTable {
    pub layout: SheetLayout,
    #[serde(default)]
    pub extra_columns: Vec<String>,
    pub records: Vec<SiteRecord>,
}

impl SiteTable {
    pub fn new(layout: SheetLayout, records: Vec<SiteRecord>) -> Self {
        Self {
            layout,
            extra_columns: Vec::new(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Header row as written on export: required columns in layout order, then extras.
    pub fn columns(&self) -> Vec<String> {
        self.layout
            .required_columns()
            .iter()
            .map(|name| (*name).to_owned())
            .chain(self.extra_columns.iter().cloned())
            .collect()
    }

    /// Cell text of `record` for every entry of [`Self::columns`].
    pub fn row_values(&self, record: &SiteRecord) -> Vec<CellValue> {
        let mut values = Vec::with_capacity(self.layout.required_columns().len() + record.extras.len());
        for column in self.layout.required_columns() {
            let value = match *column {
                PROVINCE_COLUMN => CellValue::Text(record.province_name().to_owned()),
                REGENCY_COLUMN => CellValue::Text(record.regency.clone()),
                BRANCH_COLUMN => CellValue::Text(record.branch.clone()),
                LATITUDE_COLUMN => CellValue::Number(record.latitude),
                LONGITUDE_COLUMN => CellValue::Number(record.longitude),
                _ => CellValue::Text(String::new()),
            };
            values.push(value);
        }
        for idx in 0..self.extra_columns.len() {
            let text = record.extras.get(idx).cloned().unwrap_or_default();
            values.push(CellValue::Text(text));
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(province: Option<&str>, branch: &str) -> SiteRecord {
        SiteRecord {
            province: province.map(str::to_owned),
            regency: "KOTA PONTIANAK".into(),
            branch: branch.into(),
            latitude: -0.03,
            longitude: 109.33,
            extras: vec!["Jl. Gajah Mada".into()],
        }
    }

    #[test]
    fn provincial_layout_requires_province_first() {
        let cols = SheetLayout::Provincial.required_columns();
        assert_eq!(cols[0], PROVINCE_COLUMN);
        assert_eq!(cols.len(), 5);
        assert!(!SheetLayout::Regional.required_columns().contains(&PROVINCE_COLUMN));
    }

    #[test]
    fn layout_parse_accepts_names_and_iterations() {
        assert_eq!(SheetLayout::parse(" Regional "), Some(SheetLayout::Regional));
        assert_eq!(SheetLayout::parse("v1"), Some(SheetLayout::Regional));
        assert_eq!(SheetLayout::parse("v3"), Some(SheetLayout::Provincial));
        assert_eq!(SheetLayout::parse("nope"), None);
    }

    #[test]
    fn row_values_follow_column_order() {
        let mut table = SiteTable::new(SheetLayout::Provincial, vec![record(Some("KALBAR"), "KCP A")]);
        table.extra_columns = vec!["ALAMAT".into()];

        let columns = table.columns();
        let values = table.row_values(&table.records[0]);
        assert_eq!(columns.len(), values.len());
        assert_eq!(columns.last().map(String::as_str), Some("ALAMAT"));
        assert_eq!(values[0], CellValue::Text("KALBAR".into()));
        assert_eq!(values[2], CellValue::Number(-0.03));
        assert_eq!(values[5], CellValue::Text("Jl. Gajah Mada".into()));
    }
}
