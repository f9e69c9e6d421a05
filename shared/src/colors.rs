use std::collections::{BTreeMap, btree_map};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker colors offered by the color picker; the names match the Leaflet
/// awesome-markers icon palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Red,
    #[default]
    Blue,
    Green,
    Purple,
    Orange,
    DarkRed,
    LightRed,
    Beige,
    DarkBlue,
    DarkGreen,
    CadetBlue,
    DarkPurple,
    White,
    Pink,
    LightBlue,
    LightGreen,
    Gray,
    Black,
    LightGray,
}

impl MarkerColor {
    pub const ALL: [MarkerColor; 19] = [
        Self::Red,
        Self::Blue,
        Self::Green,
        Self::Purple,
        Self::Orange,
        Self::DarkRed,
        Self::LightRed,
        Self::Beige,
        Self::DarkBlue,
        Self::DarkGreen,
        Self::CadetBlue,
        Self::DarkPurple,
        Self::White,
        Self::Pink,
        Self::LightBlue,
        Self::LightGreen,
        Self::Gray,
        Self::Black,
        Self::LightGray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Purple => "purple",
            Self::Orange => "orange",
            Self::DarkRed => "darkred",
            Self::LightRed => "lightred",
            Self::Beige => "beige",
            Self::DarkBlue => "darkblue",
            Self::DarkGreen => "darkgreen",
            Self::CadetBlue => "cadetblue",
            Self::DarkPurple => "darkpurple",
            Self::White => "white",
            Self::Pink => "pink",
            Self::LightBlue => "lightblue",
            Self::LightGreen => "lightgreen",
            Self::Gray => "gray",
            Self::Black => "black",
            Self::LightGray => "lightgray",
        }
    }

    /// Fill used for the circle markers drawn in the browser.
    pub fn hex(self) -> &'static str {
        match self {
            Self::Red => "#d63e2a",
            Self::Blue => "#38aadd",
            Self::Green => "#72b026",
            Self::Purple => "#d252b9",
            Self::Orange => "#f69730",
            Self::DarkRed => "#a23336",
            Self::LightRed => "#ff8e7f",
            Self::Beige => "#ffcb92",
            Self::DarkBlue => "#0067a3",
            Self::DarkGreen => "#728224",
            Self::CadetBlue => "#436978",
            Self::DarkPurple => "#5b396b",
            Self::White => "#fbfbfb",
            Self::Pink => "#ff91ea",
            Self::LightBlue => "#8adaff",
            Self::LightGreen => "#bbf970",
            Self::Gray => "#575757",
            Self::Black => "#303030",
            Self::LightGray => "#a3a3a3",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|color| color.name().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Branch name -> explicitly chosen marker color.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorTags(BTreeMap<String, MarkerColor>);

impl ColorTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many branches were written.
    pub fn assign<I, S>(&mut self, branches: I, color: MarkerColor) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut count = 0;
        for branch in branches {
            self.0.insert(branch.into(), color);
            count += 1;
        }
        count
    }

    pub fn reset(&mut self) {
        self.0.clear();
    }

    pub fn get(&self, branch: &str) -> Option<MarkerColor> {
        self.0.get(branch).copied()
    }

    /// Explicit color of `branch`, or the default blue.
    pub fn lookup(&self, branch: &str) -> MarkerColor {
        self.get(branch).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MarkerColor> {
        self.0.iter()
    }
}

impl FromIterator<(String, MarkerColor)> for ColorTags {
    fn from_iter<T: IntoIterator<Item = (String, MarkerColor)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
