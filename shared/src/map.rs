use serde::{Deserialize, Serialize};

use crate::colors::{ColorTags, MarkerColor};
use crate::site::SiteRecord;

/// Where the map opens when there is nothing to show (central Kalimantan).
pub const FALLBACK_CENTER: LatLng = LatLng {
    lat: 0.85,
    lng: 114.15,
};
pub const DEFAULT_ZOOM: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub position: LatLng,
    pub branch: String,
    /// Popup body, already HTML-escaped.
    pub label: String,
    pub color: MarkerColor,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: LatLng,
    pub zoom: u8,
    pub markers: Vec<Marker>,
}

/// Mean latitude and longitude of the records, or [`FALLBACK_CENTER`] when empty.
pub fn map_center<'a, I>(records: I) -> LatLng
where
    I: IntoIterator<Item = &'a SiteRecord>,
{
    let (mut lat_sum, mut lng_sum, mut count) = (0.0_f64, 0.0_f64, 0_usize);
    for record in records {
        lat_sum += record.latitude;
        lng_sum += record.longitude;
        count += 1;
    }
    if count == 0 {
        return FALLBACK_CENTER;
    }
    LatLng::new(lat_sum / count as f64, lng_sum / count as f64)
}

pub fn marker_label(record: &SiteRecord) -> String {
    let mut label = html_escape::encode_text(&record.branch).into_owned();
    label.push_str("<br>");
    label.push_str(&html_escape::encode_text(&record.regency));
    if let Some(province) = record.province.as_deref().filter(|p| !p.trim().is_empty()) {
        label.push_str("<br>");
        label.push_str(&html_escape::encode_text(province));
    }
    label
}

pub fn build_markers<'a, I>(records: I, tags: &ColorTags) -> Vec<Marker>
where
    I: IntoIterator<Item = &'a SiteRecord>,
{
    records
        .into_iter()
        .map(|record| {
            let color = tags.lookup(&record.branch);
            Marker {
                position: LatLng::new(record.latitude, record.longitude),
                branch: record.branch.clone(),
                label: marker_label(record),
                color,
                fill: color.hex().to_owned(),
            }
        })
        .collect()
}

pub fn map_view(records: &[&SiteRecord], tags: &ColorTags) -> MapView {
    MapView {
        center: map_center(records.iter().copied()),
        zoom: DEFAULT_ZOOM,
        markers: build_markers(records.iter().copied(), tags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(branch: &str, lat: f64, lng: f64) -> SiteRecord {
        SiteRecord {
            province: Some("KALIMANTAN BARAT".into()),
            regency: "KOTA PONTIANAK".into(),
            branch: branch.into(),
            latitude: lat,
            longitude: lng,
            extras: Vec::new(),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(diff < 1e-9, "expected {expected}, got {actual} (diff: {diff})");
    }

    #[test]
    fn empty_subset_centers_on_fallback() {
        let center = map_center(std::iter::empty());
        assert_eq!(center, FALLBACK_CENTER);
        assert_eq!(center, LatLng::new(0.85, 114.15));
    }

    #[test]
    fn center_is_mean_of_coordinates() {
        let records = [at("A", -1.0, 110.0), at("B", 1.0, 112.0), at("C", 3.0, 117.0)];
        let center = map_center(&records);
        assert_close(center.lat, 1.0);
        assert_close(center.lng, 113.0);
    }

    #[test]
    fn markers_use_tag_color_or_blue() {
        let records = [at("A", 0.0, 110.0), at("B", 0.5, 111.0)];
        let mut tags = ColorTags::new();
        tags.assign(["A"], MarkerColor::Red);

        let markers = build_markers(&records, &tags);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].color, MarkerColor::Red);
        assert_eq!(markers[0].fill, MarkerColor::Red.hex());
        assert_eq!(markers[1].color, MarkerColor::Blue);
        assert_eq!(markers[1].position, LatLng::new(0.5, 111.0));
    }

    #[test]
    fn label_lists_branch_regency_province_escaped() {
        let mut record = at("KCP <Ahmad Yani>", 0.0, 0.0);
        assert_eq!(
            marker_label(&record),
            "KCP &lt;Ahmad Yani&gt;<br>KOTA PONTIANAK<br>KALIMANTAN BARAT"
        );
        record.province = None;
        assert_eq!(marker_label(&record), "KCP &lt;Ahmad Yani&gt;<br>KOTA PONTIANAK");
    }

    #[test]
    fn map_view_uses_default_zoom() {
        let records = [at("A", 2.0, 100.0)];
        let refs: Vec<&SiteRecord> = records.iter().collect();
        let view = map_view(&refs, &ColorTags::new());
        assert_eq!(view.zoom, DEFAULT_ZOOM);
        assert_eq!(view.center, LatLng::new(2.0, 100.0));
        assert_eq!(view.markers.len(), 1);
    }
}
