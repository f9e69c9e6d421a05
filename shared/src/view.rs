use serde::{Deserialize, Serialize};

use crate::colors::ColorTags;
use crate::filter::{FilterOutcome, FilterPolicy, FilterSelection, apply_filters};
use crate::map::{MapView, map_view};
use crate::site::{SiteRecord, SiteTable};

/// Everything the page needs after one interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub province_options: Vec<String>,
    pub regency_options: Vec<String>,
    pub branch_options: Vec<String>,
    pub map: MapView,
    pub filtered_count: usize,
    /// Rows of the whole table whose branch carries an explicit color.
    pub tagged_count: usize,
}

pub fn render(
    table: &SiteTable,
    selection: &FilterSelection,
    tags: &ColorTags,
    policy: FilterPolicy,
) -> DashboardView {
    let outcome = apply_filters(table, selection, policy);
    render_outcome(table, &outcome, tags)
}

pub fn render_outcome(table: &SiteTable, outcome: &FilterOutcome, tags: &ColorTags) -> DashboardView {
    let records: Vec<&SiteRecord> = outcome.records(table).collect();
    DashboardView {
        province_options: outcome.province_options.clone(),
        regency_options: outcome.regency_options.clone(),
        branch_options: outcome.branch_options.clone(),
        map: map_view(&records, tags),
        filtered_count: records.len(),
        tagged_count: tagged_rows(table, tags).count(),
    }
}

pub fn tagged_rows<'a>(
    table: &'a SiteTable,
    tags: &'a ColorTags,
) -> impl Iterator<Item = &'a SiteRecord> + 'a {
    table
        .records
        .iter()
        .filter(|record| tags.get(&record.branch).is_some())
}
