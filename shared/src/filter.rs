use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::site::{SiteRecord, SiteTable};

/// One sidebar control: either the "select all" box or an explicit pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "values", rename_all = "snake_case")]
pub enum StageSelection {
    All,
    Only(BTreeSet<String>),
}

impl Default for StageSelection {
    fn default() -> Self {
        Self::Only(BTreeSet::new())
    }
}

impl StageSelection {
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(values.into_iter().map(Into::into).collect())
    }

    /// Explicitly picked values, `None` for `All`.
    pub fn explicit(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::All => None,
            Self::Only(values) => Some(values),
        }
    }

    /// True when nothing was explicitly picked (`All` counts as a pick).
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Only(values) if values.is_empty())
    }

    /// Resolve against the stage's options into the set of accepted values.
    fn active<'a>(&'a self, options: &'a [String]) -> BTreeSet<&'a str> {
        match self {
            Self::All => options.iter().map(String::as_str).collect(),
            Self::Only(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Province, then regency, then branch; each stage's options come from the
    /// stage before it.
    #[default]
    Cascading,
    /// No province stage, and the map stays empty until a regency or branch is picked.
    BlankUntilChosen,
}

impl FilterPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cascading" | "cascade" => Some(Self::Cascading),
            "blank_until_chosen" | "blank-until-chosen" | "blank" => Some(Self::BlankUntilChosen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default)]
    pub provinces: StageSelection,
    #[serde(default)]
    pub regencies: StageSelection,
    #[serde(default)]
    pub branches: StageSelection,
}

impl FilterSelection {
    /// Selection a fresh session starts with, also what the reset button restores.
    pub fn defaults(policy: FilterPolicy) -> Self {
        match policy {
            FilterPolicy::Cascading => Self {
                provinces: StageSelection::All,
                regencies: StageSelection::All,
                branches: StageSelection::default(),
            },
            FilterPolicy::BlankUntilChosen => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub province_options: Vec<String>,
    pub regency_options: Vec<String>,
    pub branch_options: Vec<String>,
    /// Indices into `SiteTable::records`, in table order.
    pub rows: Vec<usize>,
}

impl FilterOutcome {
    pub fn records<'a>(&'a self, table: &'a SiteTable) -> impl Iterator<Item = &'a SiteRecord> + 'a {
        self.rows.iter().filter_map(|&idx| table.records.get(idx))
    }
}

pub fn apply_filters(
    table: &SiteTable,
    selection: &FilterSelection,
    policy: FilterPolicy,
) -> FilterOutcome {
    match policy {
        FilterPolicy::Cascading => cascade(table, selection),
        FilterPolicy::BlankUntilChosen => blank_until_chosen(table, selection),
    }
}

fn cascade(table: &SiteTable, selection: &FilterSelection) -> FilterOutcome {
    let all_rows: Vec<usize> = (0..table.records.len()).collect();

    let province_options = if table.layout.has_province() {
        distinct(table, &all_rows, |r| r.province_name())
    } else {
        Vec::new()
    };
    let by_province = if table.layout.has_province() {
        let active = selection.provinces.active(&province_options);
        keep(table, &all_rows, |r| active.contains(r.province_name()))
    } else {
        all_rows
    };

    let regency_options = distinct(table, &by_province, |r| r.regency.as_str());
    let active_regencies = selection.regencies.active(&regency_options);
    let by_regency = keep(table, &by_province, |r| {
        active_regencies.contains(r.regency.as_str())
    });

    let branch_options = distinct(table, &by_regency, |r| r.branch.as_str());
    // Branches are only ever picked by name; `All` narrows nothing.
    let rows = match selection.branches.explicit() {
        Some(branches) if !branches.is_empty() => {
            keep(table, &by_regency, |r| branches.contains(&r.branch))
        }
        _ => by_regency,
    };

    FilterOutcome {
        province_options,
        regency_options,
        branch_options,
        rows,
    }
}

fn blank_until_chosen(table: &SiteTable, selection: &FilterSelection) -> FilterOutcome {
    let all_rows: Vec<usize> = (0..table.records.len()).collect();
    let regency_options = distinct(table, &all_rows, |r| r.regency.as_str());

    let chosen_regencies: BTreeSet<&str> = match &selection.regencies {
        StageSelection::All => regency_options.iter().map(String::as_str).collect(),
        StageSelection::Only(values) => values.iter().map(String::as_str).collect(),
    };
    let in_regencies = keep(table, &all_rows, |r| {
        chosen_regencies.contains(r.regency.as_str())
    });
    let branch_options = distinct(table, &in_regencies, |r| r.branch.as_str());

    // Branches are only ever picked by name; `All` counts as no pick.
    let chosen_branches: BTreeSet<&str> = selection
        .branches
        .explicit()
        .map(|values| values.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let rows = if chosen_regencies.is_empty() && chosen_branches.is_empty() {
        Vec::new()
    } else {
        let mut rows = all_rows;
        if !chosen_regencies.is_empty() {
            rows = in_regencies;
        }
        if !chosen_branches.is_empty() {
            rows = keep(table, &rows, |r| chosen_branches.contains(r.branch.as_str()));
        }
        rows
    };

    FilterOutcome {
        province_options: Vec::new(),
        regency_options,
        branch_options,
        rows,
    }
}

fn keep<F>(table: &SiteTable, rows: &[usize], mut predicate: F) -> Vec<usize>
where
    F: FnMut(&SiteRecord) -> bool,
{
    rows.iter()
        .copied()
        .filter(|&idx| table.records.get(idx).is_some_and(&mut predicate))
        .collect()
}

fn distinct<F>(table: &SiteTable, rows: &[usize], key: F) -> Vec<String>
where
    F: Fn(&SiteRecord) -> &str,
{
    rows.iter()
        .filter_map(|&idx| table.records.get(idx))
        .map(|record| key(record).trim())
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect()
}
