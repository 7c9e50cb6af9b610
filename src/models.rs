//! Data models for upstream COVID-19 records and dashboard selections.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::DashError;

/// Map center shown when "worldwide" is selected.
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 1.2921,
    lng: 36.8219,
};
pub const DEFAULT_ZOOM: u8 = 3;
/// Zoom applied when a single country is selected.
pub const ZOOMED_IN_ZOOM: u8 = 4;

/// Geographic details attached to a country record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CountryInfo {
    #[serde(default)]
    pub iso2: Option<String>,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub long: f64,
    #[serde(default)]
    pub flag: Option<String>,
}

/// Latest counts for one country, or the worldwide aggregate.
///
/// The aggregate from `/v3/covid-19/all` has no `country` or `countryInfo`,
/// so both default to empty.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CountrySnapshot {
    #[serde(rename = "country", default)]
    pub name: String,
    #[serde(default)]
    pub country_info: Option<CountryInfo>,
    #[serde(default)]
    pub today_cases: i64,
    #[serde(default)]
    pub cases: i64,
    #[serde(default)]
    pub today_recovered: i64,
    #[serde(default)]
    pub recovered: i64,
    #[serde(default)]
    pub today_deaths: i64,
    #[serde(default)]
    pub deaths: i64,
}

impl CountrySnapshot {
    pub fn iso_code(&self) -> Option<&str> {
        self.country_info.as_ref()?.iso2.as_deref()
    }

    /// Country centroid, if upstream sent one.
    pub fn position(&self) -> Option<LatLng> {
        self.country_info.as_ref().map(|info| LatLng {
            lat: info.lat,
            lng: info.long,
        })
    }

    pub fn count(&self, field: CountField) -> i64 {
        match field {
            CountField::Cases => self.cases,
            CountField::TodayCases => self.today_cases,
            CountField::Recovered => self.recovered,
            CountField::TodayRecovered => self.today_recovered,
            CountField::Deaths => self.deaths,
            CountField::TodayDeaths => self.today_deaths,
        }
    }
}

/// Numeric fields of a [`CountrySnapshot`] that can be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountField {
    #[default]
    Cases,
    TodayCases,
    Recovered,
    TodayRecovered,
    Deaths,
    TodayDeaths,
}

/// One `date -> cumulative` entry of a historical series.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DailyCount {
    pub date: String,
    pub cumulative: i64,
}

/// Response of `/v3/covid-19/historical/all`.
///
/// Each series keeps the key order of the upstream JSON object, which is
/// chronological. Sorting the keys would misplace "10/1/20" before "9/30/20".
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct HistoricalAll {
    #[serde(default, deserialize_with = "ordered_counts")]
    pub cases: Vec<DailyCount>,
    #[serde(default, deserialize_with = "ordered_counts")]
    pub deaths: Vec<DailyCount>,
    #[serde(default, deserialize_with = "ordered_counts")]
    pub recovered: Vec<DailyCount>,
}

fn ordered_counts<'de, D>(deserializer: D) -> Result<Vec<DailyCount>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedCounts;

    impl<'de> Visitor<'de> for OrderedCounts {
        type Value = Vec<DailyCount>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of date to cumulative count")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut counts = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((date, cumulative)) = map.next_entry::<String, i64>()? {
                counts.push(DailyCount { date, cumulative });
            }
            Ok(counts)
        }
    }

    deserializer.deserialize_any(OrderedCounts)
}

/// The statistic family currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[default]
    Cases,
    Recovered,
    Deaths,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Cases, MetricKind::Recovered, MetricKind::Deaths];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Cases => "cases",
            MetricKind::Recovered => "recovered",
            MetricKind::Deaths => "deaths",
        }
    }

    /// Card heading.
    pub fn title(self) -> &'static str {
        match self {
            MetricKind::Cases => "Coronavirus Cases",
            MetricKind::Recovered => "Recovered",
            MetricKind::Deaths => "Deaths",
        }
    }

    pub fn total_field(self) -> CountField {
        match self {
            MetricKind::Cases => CountField::Cases,
            MetricKind::Recovered => CountField::Recovered,
            MetricKind::Deaths => CountField::Deaths,
        }
    }

    pub fn today_field(self) -> CountField {
        match self {
            MetricKind::Cases => CountField::TodayCases,
            MetricKind::Recovered => CountField::TodayRecovered,
            MetricKind::Deaths => CountField::TodayDeaths,
        }
    }

    /// The cumulative series of `history` for this metric.
    pub fn history(self, history: &HistoricalAll) -> &[DailyCount] {
        match self {
            MetricKind::Cases => &history.cases,
            MetricKind::Recovered => &history.recovered,
            MetricKind::Deaths => &history.deaths,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = DashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cases" => Ok(MetricKind::Cases),
            "recovered" => Ok(MetricKind::Recovered),
            "deaths" => Ok(MetricKind::Deaths),
            _ => Err(DashError::UnknownMetric(s.to_string())),
        }
    }
}

/// Which scope the snapshot cards describe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CountrySelection {
    #[default]
    Worldwide,
    Country(String),
}

impl CountrySelection {
    pub const WORLDWIDE: &'static str = "worldwide";

    pub fn as_param(&self) -> &str {
        match self {
            CountrySelection::Worldwide => Self::WORLDWIDE,
            CountrySelection::Country(code) => code,
        }
    }

    pub fn is_worldwide(&self) -> bool {
        matches!(self, CountrySelection::Worldwide)
    }
}

impl FromStr for CountrySelection {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(Self::WORLDWIDE) {
            Ok(CountrySelection::Worldwide)
        } else {
            Ok(CountrySelection::Country(s.to_string()))
        }
    }
}

impl fmt::Display for CountrySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl Serialize for CountrySelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_param())
    }
}

/// Selector entry: display name plus the code sent back on selection.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CountryOption {
    pub name: String,
    pub code: String,
}

/// One chart point: day-over-day change of the active metric.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: String,
    pub delta: i64,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Map center and zoom level.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}
