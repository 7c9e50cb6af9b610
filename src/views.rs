//! Presentational view models.
//!
//! Each builder is a pure function of a [`DashboardView`]; the templates only
//! lay them out. User actions are plain links/forms pointing back at the
//! selection routes.

use serde::Serialize;

use crate::controller::{DashboardView, PhaseKind};
use crate::format::{format_compact, format_delta, group_thousands};
use crate::models::{CountryOption, CountrySelection, LatLng, MetricKind, TimeSeriesPoint, Viewport};

/// Marker colour and radius scale per metric.
fn metric_style(metric: MetricKind) -> (&'static str, f64) {
    match metric {
        MetricKind::Cases => ("#CC1034", 800.0),
        MetricKind::Recovered => ("#7DD71D", 1200.0),
        MetricKind::Deaths => ("#FB4443", 2000.0),
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StatCard {
    pub metric: MetricKind,
    pub title: &'static str,
    pub today: String,
    pub total: String,
    pub active: bool,
    pub green: bool,
    pub href: String,
}

pub fn stat_cards(view: &DashboardView) -> Vec<StatCard> {
    let snapshot = view.snapshot.ready().map(|s| &s.data);
    MetricKind::ALL
        .iter()
        .map(|&metric| StatCard {
            metric,
            title: metric.title(),
            today: format_delta(snapshot.map(|s| s.count(metric.today_field()) as f64)),
            total: format_compact(snapshot.map(|s| s.count(metric.total_field()) as f64)),
            active: metric == view.metric,
            green: metric == MetricKind::Recovered,
            href: format!("/metric/{}", metric),
        })
        .collect()
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TableRow {
    pub name: String,
    pub flag: Option<String>,
    pub cases: String,
    /// Raw count; the template formats it with the `delta` filter.
    pub today_cases: i64,
}

/// Rows of the "live cases by country" table; empty unless the list loaded.
pub fn table_rows(view: &DashboardView) -> Vec<TableRow> {
    view.countries
        .ready()
        .map(|table| {
            table
                .countries
                .iter()
                .map(|c| TableRow {
                    name: c.name.clone(),
                    flag: c.country_info.as_ref().and_then(|i| i.flag.clone()),
                    cases: group_thousands(c.cases.max(0) as u64),
                    today_cases: c.today_cases,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MapMarker {
    pub name: String,
    pub position: LatLng,
    pub value: i64,
    /// Circle radius in metres.
    pub radius: f64,
    pub color: &'static str,
    pub cases: String,
    pub recovered: String,
    pub deaths: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MapView {
    pub viewport: Viewport,
    pub markers: Vec<MapMarker>,
}

/// One circle per country, sized by the active metric.
pub fn map_view(view: &DashboardView) -> MapView {
    let (color, multiplier) = metric_style(view.metric);
    let field = view.metric.total_field();
    let markers = view
        .countries
        .ready()
        .map(|table| {
            table
                .countries
                .iter()
                .filter_map(|c| {
                    let position = c.position()?;
                    let value = c.count(field);
                    Some(MapMarker {
                        name: c.name.clone(),
                        position,
                        value,
                        radius: (value.max(0) as f64).sqrt() * multiplier,
                        color,
                        cases: group_thousands(c.cases.max(0) as u64),
                        recovered: group_thousands(c.recovered.max(0) as u64),
                        deaths: group_thousands(c.deaths.max(0) as u64),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    MapView {
        viewport: view.viewport,
        markers,
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ChartView {
    pub title: String,
    pub color: &'static str,
    pub points: Vec<TimeSeriesPoint>,
}

/// Worldwide daily change chart for the active metric.
pub fn chart_view(view: &DashboardView) -> ChartView {
    let points = view
        .series
        .ready()
        .filter(|series| series.metric == view.metric)
        .map(|series| series.points.clone())
        .unwrap_or_default();
    ChartView {
        title: format!("Worldwide new {}", view.metric),
        color: metric_style(view.metric).0,
        points,
    }
}

/// Error notice with the route that retries the failed phase.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Banner {
    pub phase: PhaseKind,
    pub message: String,
    pub retry_action: String,
}

pub fn banners(view: &DashboardView) -> Vec<Banner> {
    [
        (PhaseKind::Countries, view.countries.error()),
        (PhaseKind::Snapshot, view.snapshot.error()),
        (PhaseKind::Series, view.series.error()),
    ]
    .into_iter()
    .filter_map(|(phase, error)| {
        error.map(|message| Banner {
            phase,
            message: message.to_string(),
            retry_action: format!("/retry/{}", phase),
        })
    })
    .collect()
}

pub fn loading(view: &DashboardView) -> Vec<PhaseKind> {
    let mut phases = Vec::new();
    if view.countries.is_loading() {
        phases.push(PhaseKind::Countries);
    }
    if view.snapshot.is_loading() {
        phases.push(PhaseKind::Snapshot);
    }
    if view.series.is_loading() {
        phases.push(PhaseKind::Series);
    }
    phases
}

/// Everything `dashboard.html` renders.
#[derive(Debug, Serialize)]
pub struct PageContext {
    pub selection: CountrySelection,
    pub metric: MetricKind,
    pub options: Vec<CountryOption>,
    pub cards: Vec<StatCard>,
    pub rows: Vec<TableRow>,
    pub map: MapView,
    pub chart: ChartView,
    pub banners: Vec<Banner>,
    pub loading: Vec<PhaseKind>,
}

pub fn page(view: &DashboardView) -> PageContext {
    PageContext {
        selection: view.selection.clone(),
        metric: view.metric,
        options: view
            .countries
            .ready()
            .map(|t| t.options.clone())
            .unwrap_or_default(),
        cards: stat_cards(view),
        rows: table_rows(view),
        map: map_view(view),
        chart: chart_view(view),
        banners: banners(view),
        loading: loading(view),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::{started, StubSource};
    use crate::controller::{Phase, ViewController};
    use crate::models::CountrySnapshot;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_cards_reflect_worldwide_snapshot() {
        let view = started().await.view().await;
        let cards = stat_cards(&view);
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].title, "Coronavirus Cases");
        assert_eq!(cards[0].today, "+1,234");
        assert_eq!(cards[0].total, "704.8m");
        assert!(cards[0].active);
        assert!(!cards[1].active);
        assert!(cards[1].green);
        // worldwide stub has no deaths today
        assert_eq!(cards[2].today, "0");
        assert_eq!(cards[2].href, "/metric/deaths");
    }

    #[tokio::test]
    async fn test_cards_without_snapshot_show_zero() {
        let controller = ViewController::new(StubSource::default());
        let cards = stat_cards(&controller.view().await);
        assert!(cards.iter().all(|c| c.today == "0" && c.total == "0"));
    }

    #[tokio::test]
    async fn test_table_rows_sorted_and_grouped() {
        let view = started().await.view().await;
        let rows = table_rows(&view);
        assert_eq!(rows[0].name, "USA");
        assert_eq!(rows[0].cases, "111,820,082");
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_markers_follow_metric() {
        let controller = started().await;
        let map = map_view(&controller.view().await);
        // Diamond Princess has no coordinates
        assert_eq!(map.markers.len(), 2);
        let kenya = map.markers.iter().find(|m| m.name == "Kenya").unwrap();
        assert_eq!(kenya.value, 343_955);
        assert_eq!(kenya.color, "#CC1034");

        controller.select_metric(MetricKind::Deaths).await;
        let map = map_view(&controller.view().await);
        let kenya = map.markers.iter().find(|m| m.name == "Kenya").unwrap();
        assert_eq!(kenya.value, 343_955 / 50);
        assert_eq!(kenya.radius, ((343_955 / 50) as f64).sqrt() * 2000.0);
    }

    #[tokio::test]
    async fn test_chart_title_and_points() {
        let view = started().await.view().await;
        let chart = chart_view(&view);
        assert_eq!(chart.title, "Worldwide new cases");
        assert_eq!(chart.points.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_list_gives_empty_table_and_banner() {
        let controller = ViewController::new(StubSource::default());
        controller.source_for_tests().fail_countries.store(true, Ordering::SeqCst);
        controller.start().await;
        let view = controller.view().await;

        assert!(table_rows(&view).is_empty());
        assert!(map_view(&view).markers.is_empty());
        let banners = banners(&view);
        assert_eq!(banners.len(), 1);
        assert_eq!(banners[0].phase, PhaseKind::Countries);
        assert_eq!(banners[0].retry_action, "/retry/countries");
    }

    #[test]
    fn test_loading_phases_listed() {
        let view = DashboardView {
            selection: CountrySelection::Worldwide,
            metric: MetricKind::Cases,
            viewport: Viewport::default(),
            countries: Phase::Loading,
            snapshot: Phase::Ready(crate::controller::SelectedSnapshot {
                selection: CountrySelection::Worldwide,
                data: CountrySnapshot::default(),
            }),
            series: Phase::Loading,
        };
        assert_eq!(loading(&view), [PhaseKind::Countries, PhaseKind::Series]);
        assert!(page(&view).options.is_empty());
    }
}
