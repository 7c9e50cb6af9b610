//! View state controller.
//!
//! Owns everything the dashboard shows and the three independent fetch
//! phases that fill it:
//!
//! - **countries**: the full country list, fetched on start (and on retry or
//!   scheduled refresh);
//! - **snapshot**: the cards' counts for the selected country or the world,
//!   fetched on start and on every country change;
//! - **series**: the global 120-day chart, fetched on start and on every
//!   metric change.
//!
//! Each phase carries a generation counter. Starting a fetch bumps it and
//! hands out a [`Ticket`]; a result is only applied if its ticket is still
//! the newest one for that phase, so a slow response can never overwrite a
//! newer selection. The lock is never held while waiting on upstream.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{DashError, Result};
use crate::fetcher::{fetch_snapshot, StatsSource, HISTORY_WINDOW_DAYS};
use crate::format::sort_by_metric;
use crate::models::{
    CountField, CountryOption, CountrySelection, CountrySnapshot, LatLng, MetricKind,
    TimeSeriesPoint, Viewport, DEFAULT_CENTER, ZOOMED_IN_ZOOM,
};
use crate::series::build_delta_series;

/// Progress of one fetch phase.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Phase<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Phase<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Phase::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Phase::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Countries,
    Snapshot,
    Series,
}

impl PhaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Countries => "countries",
            PhaseKind::Snapshot => "snapshot",
            PhaseKind::Series => "series",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseKind {
    type Err = DashError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "countries" => Ok(PhaseKind::Countries),
            "snapshot" => Ok(PhaseKind::Snapshot),
            "series" => Ok(PhaseKind::Series),
            _ => Err(DashError::UnknownPhase(s.to_string())),
        }
    }
}

/// Identifies one issued request of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    phase: PhaseKind,
    generation: u64,
}

/// Country list sorted for the table, plus the selector entries.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountryTable {
    pub countries: Vec<CountrySnapshot>,
    pub options: Vec<CountryOption>,
}

impl CountryTable {
    /// Sorts by cases for the table; selector keeps upstream order and skips
    /// records without an ISO code.
    pub fn from_upstream(list: Vec<CountrySnapshot>) -> Self {
        let options = list
            .iter()
            .filter_map(|c| {
                c.iso_code().map(|code| CountryOption {
                    name: c.name.clone(),
                    code: code.to_string(),
                })
            })
            .collect();
        Self {
            countries: sort_by_metric(&list, CountField::Cases),
            options,
        }
    }
}

/// Snapshot together with the selection it was fetched for.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SelectedSnapshot {
    pub selection: CountrySelection,
    pub data: CountrySnapshot,
}

/// Chart points and the metric they were built for.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartSeries {
    pub metric: MetricKind,
    pub points: Vec<TimeSeriesPoint>,
}

/// Read-only copy of the controller state handed to views.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub selection: CountrySelection,
    pub metric: MetricKind,
    pub viewport: Viewport,
    pub countries: Phase<CountryTable>,
    pub snapshot: Phase<SelectedSnapshot>,
    pub series: Phase<ChartSeries>,
}

struct Slot<T> {
    kind: PhaseKind,
    generation: u64,
    phase: Phase<T>,
}

impl<T> Slot<T> {
    fn new(kind: PhaseKind) -> Self {
        Self {
            kind,
            generation: 0,
            phase: Phase::Idle,
        }
    }

    fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.phase = Phase::Loading;
        Ticket {
            phase: self.kind,
            generation: self.generation,
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.phase == self.kind && ticket.generation == self.generation
    }

    /// Applies `result` if `ticket` is still current. Returns whether it was.
    fn settle(&mut self, ticket: Ticket, result: Result<T>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                "Discarding stale {} result (generation {}, current {})",
                self.kind, ticket.generation, self.generation
            );
            return false;
        }
        self.phase = match result {
            Ok(data) => {
                info!("{} ready", self.kind);
                Phase::Ready(data)
            }
            Err(e) => {
                warn!("{} failed: {}", self.kind, e);
                Phase::Failed(e.to_string())
            }
        };
        true
    }
}

struct ViewState {
    selection: CountrySelection,
    metric: MetricKind,
    viewport: Viewport,
    countries: Slot<CountryTable>,
    snapshot: Slot<SelectedSnapshot>,
    series: Slot<ChartSeries>,
}

/// Where the map should look after a snapshot for `selection` arrives.
///
/// Worldwide recenters on the default and keeps the zoom; a country centers
/// on its coordinates and zooms in.
pub fn next_viewport(
    current: Viewport,
    selection: &CountrySelection,
    position: Option<LatLng>,
) -> Viewport {
    if selection.is_worldwide() {
        Viewport {
            center: DEFAULT_CENTER,
            zoom: current.zoom,
        }
    } else {
        Viewport {
            center: position.unwrap_or(current.center),
            zoom: ZOOMED_IN_ZOOM,
        }
    }
}

/// Shared handle to the dashboard state.
///
/// Every transition runs on its own tokio task and the caller only awaits
/// its completion, so a dropped caller never leaves a phase in `Loading`.
pub struct ViewController<S> {
    core: Arc<Core<S>>,
}

impl<S: StatsSource> ViewController<S> {
    pub fn new(source: S) -> Self {
        Self {
            core: Arc::new(Core {
                source,
                state: RwLock::new(ViewState {
                    selection: CountrySelection::Worldwide,
                    metric: MetricKind::default(),
                    viewport: Viewport::default(),
                    countries: Slot::new(PhaseKind::Countries),
                    snapshot: Slot::new(PhaseKind::Snapshot),
                    series: Slot::new(PhaseKind::Series),
                }),
            }),
        }
    }

    pub async fn view(&self) -> DashboardView {
        self.core.view().await
    }

    /// Runs all three phases concurrently for the initial page.
    pub async fn start(&self) {
        self.detached(|core| async move { core.start().await }).await
    }

    /// Periodic refresh of the list and the current snapshot.
    pub async fn refresh_scheduled(&self) {
        self.detached(|core| async move { core.refresh_scheduled().await })
            .await
    }

    pub async fn select_country(&self, selection: CountrySelection) {
        self.detached(|core| async move { core.select_country(selection).await })
            .await
    }

    pub async fn select_metric(&self, metric: MetricKind) {
        self.detached(|core| async move { core.select_metric(metric).await })
            .await
    }

    /// Re-issues one phase's fetch with the current selection.
    pub async fn retry(&self, phase: PhaseKind) {
        self.detached(|core| async move { core.retry(phase).await })
            .await
    }

    async fn detached<F, Fut>(&self, work: F)
    where
        F: FnOnce(Arc<Core<S>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(work(Arc::clone(&self.core)));
        if let Err(e) = task.await {
            error!("Controller task failed: {}", e);
        }
    }
}

struct Core<S> {
    source: S,
    state: RwLock<ViewState>,
}

impl<S: StatsSource> Core<S> {
    async fn view(&self) -> DashboardView {
        let state = self.state.read().await;
        DashboardView {
            selection: state.selection.clone(),
            metric: state.metric,
            viewport: state.viewport,
            countries: state.countries.phase.clone(),
            snapshot: state.snapshot.phase.clone(),
            series: state.series.phase.clone(),
        }
    }

    async fn start(&self) {
        info!("Loading initial dashboard data");
        tokio::join!(
            self.refresh_countries(),
            self.refresh_snapshot(),
            self.refresh_series()
        );
    }

    async fn refresh_scheduled(&self) {
        tokio::join!(self.refresh_countries(), self.refresh_snapshot());
    }

    async fn select_country(&self, selection: CountrySelection) {
        info!("Country selected: {}", selection);
        self.state.write().await.selection = selection;
        self.refresh_snapshot().await;
    }

    async fn select_metric(&self, metric: MetricKind) {
        info!("Metric selected: {}", metric);
        self.state.write().await.metric = metric;
        self.refresh_series().await;
    }

    async fn retry(&self, phase: PhaseKind) {
        info!("Retrying {}", phase);
        match phase {
            PhaseKind::Countries => self.refresh_countries().await,
            PhaseKind::Snapshot => self.refresh_snapshot().await,
            PhaseKind::Series => self.refresh_series().await,
        }
    }

    async fn refresh_countries(&self) {
        let ticket = self.state.write().await.countries.begin();
        let result = self
            .source
            .countries()
            .await
            .map(CountryTable::from_upstream);
        self.finish_countries(ticket, result).await;
    }

    async fn refresh_snapshot(&self) {
        let (ticket, selection) = self.begin_snapshot().await;
        let result = fetch_snapshot(&self.source, &selection)
            .await
            .map(|data| SelectedSnapshot { selection, data });
        self.finish_snapshot(ticket, result).await;
    }

    async fn refresh_series(&self) {
        let (ticket, metric) = self.begin_series().await;
        let result = self
            .source
            .historical_all(HISTORY_WINDOW_DAYS)
            .await
            .map(|history| ChartSeries {
                metric,
                points: build_delta_series(&history, metric),
            });
        self.finish_series(ticket, result).await;
    }

    async fn finish_countries(&self, ticket: Ticket, result: Result<CountryTable>) -> bool {
        self.state.write().await.countries.settle(ticket, result)
    }

    async fn begin_snapshot(&self) -> (Ticket, CountrySelection) {
        let mut state = self.state.write().await;
        (state.snapshot.begin(), state.selection.clone())
    }

    async fn finish_snapshot(&self, ticket: Ticket, result: Result<SelectedSnapshot>) -> bool {
        let mut state = self.state.write().await;
        if let (true, Ok(snapshot)) = (state.snapshot.is_current(ticket), &result) {
            state.viewport = next_viewport(
                state.viewport,
                &snapshot.selection,
                snapshot.data.position(),
            );
        }
        state.snapshot.settle(ticket, result)
    }

    async fn begin_series(&self) -> (Ticket, MetricKind) {
        let mut state = self.state.write().await;
        (state.series.begin(), state.metric)
    }

    async fn finish_series(&self, ticket: Ticket, result: Result<ChartSeries>) -> bool {
        self.state.write().await.series.settle(ticket, result)
    }
}

#[cfg(test)]
impl<S> ViewController<S> {
    pub(crate) fn source_for_tests(&self) -> &S {
        &self.core.source
    }
}
