//! Keeps the widget in sync with the host page.
//!
//! The coordinator runs the extract → compute → render pipeline once after
//! the page settles, then keeps it current through three watchers:
//! the playing item, the page theme, and in-page navigation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use crate::config::Settings;
use crate::dom::{DomError, MutationRecord, NodeId, SelectorError, SharedDocument};
use crate::extract::{self, ExtractError, PlaylistSelectors};
use crate::progress::{self, ProgressMetrics};
use crate::render::{Renderer, WidgetView};
use crate::theme::ThemeResolver;
use crate::watch::{self, Subscription};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("failed to place progress widget: {0}")]
    Render(#[from] DomError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No pass has located the playlist yet.
    Uninitialized,
    /// The widget exists and the watchers are running.
    Observing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Pipeline passes attempted, successful or not.
    pub pipeline_runs: u64,
    /// Passes that reached the renderer.
    pub renders: u64,
    /// Theme-only repaints triggered by the theme watcher.
    pub theme_applications: u64,
    /// Widget resets caused by navigation.
    pub navigations: u64,
}

/// Which watchers are currently installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStatus {
    pub active_item: bool,
    pub theme: bool,
    pub navigation: bool,
}

#[derive(Debug, Default)]
struct Watchers {
    /// Watching the container recorded alongside.
    active_item: Option<(NodeId, Subscription)>,
    theme: Option<Subscription>,
    theme_probe: Option<Subscription>,
    navigation: Option<Subscription>,
}

#[derive(Debug)]
struct Engine {
    renderer: Renderer,
    phase: Phase,
    stats: RefreshStats,
    watchers: Watchers,
}

#[derive(Debug)]
struct Inner {
    doc: SharedDocument,
    settings: Settings,
    selectors: PlaylistSelectors,
    theme: ThemeResolver,
    engine: Mutex<Engine>,
}

/// Cheap to clone; all clones drive the same widget.
///
/// Watcher tasks hold only weak references, so dropping the last
/// `Coordinator` stops every watcher.
#[derive(Debug, Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(doc: SharedDocument, settings: Settings) -> Result<Self, SelectorError> {
        let selectors = PlaylistSelectors::from_settings(&settings.selectors)?;
        let theme = ThemeResolver::new(
            settings.selectors.theme_source.parse()?,
            &settings.selectors.dark_marker,
        );
        let engine = Engine {
            renderer: Renderer::new(settings.widget.clone()),
            phase: Phase::Uninitialized,
            stats: RefreshStats::default(),
            watchers: Watchers::default(),
        };
        Ok(Self {
            inner: Arc::new(Inner {
                doc,
                settings,
                selectors,
                theme,
                engine: Mutex::new(engine),
            }),
        })
    }

    fn engine(&self) -> MutexGuard<'_, Engine> {
        self.inner
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn weak(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn phase(&self) -> Phase {
        self.engine().phase
    }

    pub fn stats(&self) -> RefreshStats {
        self.engine().stats
    }

    pub fn watchers(&self) -> WatcherStatus {
        let engine = self.engine();
        WatcherStatus {
            active_item: engine.watchers.active_item.is_some(),
            theme: engine.watchers.theme.is_some(),
            navigation: engine.watchers.navigation.is_some(),
        }
    }

    pub fn view(&self) -> Option<WidgetView> {
        let engine = self.engine();
        let doc = self.inner.doc.lock();
        engine.renderer.view(&doc)
    }

    /// Waits for the page to settle, then runs the first pass.
    pub fn start(&self) -> JoinHandle<()> {
        let this = self.clone();
        let settle = self.inner.settings.timing.settle();
        tokio::spawn(async move {
            time::sleep(settle).await;
            if let Err(err) = this.initialize() {
                debug!(error = %err, "initial pass found no playlist");
            }
        })
    }

    /// Runs one pass and, on success, moves to [`Phase::Observing`].
    ///
    /// A failed pass still arms the navigation watcher so that the next
    /// in-page navigation gets another try.
    pub fn initialize(&self) -> Result<ProgressMetrics, RefreshError> {
        let mut engine = self.engine();
        let result = self.run_pipeline(&mut engine);
        self.ensure_navigation_watcher(&mut engine);
        if let Ok((_, container)) = &result {
            self.ensure_observing(&mut engine, *container);
        }
        result.map(|(metrics, _)| metrics)
    }

    /// Re-runs the pipeline, updating the widget in place.
    pub fn refresh(&self) -> Result<ProgressMetrics, RefreshError> {
        let mut engine = self.engine();
        let (metrics, container) = self.run_pipeline(&mut engine)?;
        self.ensure_observing(&mut engine, container);
        Ok(metrics)
    }

    /// Discards the widget and rebuilds it for the page now showing.
    pub fn navigate(&self) -> Result<ProgressMetrics, RefreshError> {
        let mut engine = self.engine();
        {
            let mut doc = self.inner.doc.lock();
            info!(location = %doc.location(), "page navigated, resetting progress widget");
            engine.renderer.reset(&mut doc);
        }
        engine.watchers.theme_probe = None;
        engine.stats.navigations += 1;
        let (metrics, container) = self.run_pipeline(&mut engine)?;
        self.ensure_observing(&mut engine, container);
        Ok(metrics)
    }

    /// Repaints the widget for the current theme without recomputing progress.
    pub fn apply_theme(&self) {
        let mut engine = self.engine();
        let mut doc = self.inner.doc.lock();
        let theme = self.inner.theme.resolve(&doc);
        if engine.renderer.apply_theme(&mut doc, theme) {
            engine.stats.theme_applications += 1;
        }
    }

    /// Extract, compute and render against one locked view of the document.
    fn run_pipeline(&self, engine: &mut Engine) -> Result<(ProgressMetrics, NodeId), RefreshError> {
        engine.stats.pipeline_runs += 1;
        let mut doc = self.inner.doc.lock();
        let snapshot = extract::extract(&doc, &self.inner.selectors)?;
        let metrics = progress::compute(&snapshot);
        let theme = self.inner.theme.resolve(&doc);
        engine
            .renderer
            .ensure_widget(&mut doc, snapshot.container, &metrics, theme)?;
        engine.stats.renders += 1;
        debug!(
            index = %metrics.display_index(),
            watched = metrics.watched_seconds,
            total = metrics.total_seconds,
            "playlist progress rendered"
        );
        Ok((metrics, snapshot.container))
    }

    fn ensure_observing(&self, engine: &mut Engine, container: NodeId) {
        self.ensure_active_item_watcher(engine, container);
        self.ensure_theme_watcher(engine);
        self.ensure_navigation_watcher(engine);
        if engine.phase == Phase::Uninitialized {
            info!("playlist found, observing page changes");
            engine.phase = Phase::Observing;
        }
    }

    /// One watcher on the current playlist container; replaced only when the
    /// host swapped the container element out.
    fn ensure_active_item_watcher(&self, engine: &mut Engine, container: NodeId) {
        if matches!(&engine.watchers.active_item, Some((watched, _)) if *watched == container) {
            return;
        }
        if engine.watchers.active_item.take().is_some() {
            debug!("playlist container replaced, re-arming active item watcher");
        }
        let active_class = self.inner.settings.selectors.active_class.clone();
        let weak = self.weak();
        let subscription = watch::watch(
            &self.inner.doc,
            "active-item",
            self.inner.settings.timing.active_debounce(),
            move |doc, record| {
                let Some(record) = record else {
                    return true;
                };
                let target = record.target();
                record.attribute_name() == Some("class")
                    && doc.contains(container, target)
                    && doc.has_class(target, &active_class)
            },
            move || {
                if let Some(this) = Self::upgrade(&weak) {
                    if let Err(err) = this.refresh() {
                        debug!(error = %err, "skipping progress refresh");
                    }
                }
            },
        );
        engine.watchers.active_item = Some((container, subscription));
    }

    fn ensure_theme_watcher(&self, engine: &mut Engine) {
        if engine.watchers.theme.is_some() {
            return;
        }
        let source = {
            let doc = self.inner.doc.lock();
            doc.query_selector(doc.root(), self.inner.theme.source())
        };
        match source {
            Some(link) => {
                let weak = self.weak();
                engine.watchers.theme = Some(watch::watch(
                    &self.inner.doc,
                    "theme",
                    self.inner.settings.timing.theme_debounce(),
                    move |_, record| {
                        record.is_none_or(|r| r.target() == link && r.attribute_name() == Some("href"))
                    },
                    move || {
                        if let Some(this) = Self::upgrade(&weak) {
                            this.apply_theme();
                        }
                    },
                ));
            }
            None => self.ensure_theme_probe(engine),
        }
    }

    /// Polls for a theme source that has not been rendered yet.
    ///
    /// Runs at most once per page: a probe that gave up stays in place until
    /// the next navigation clears it.
    fn ensure_theme_probe(&self, engine: &mut Engine) {
        if engine.watchers.theme_probe.is_some() {
            return;
        }
        debug!("theme source not found yet, retrying");
        let weak = self.weak();
        let policy = self.inner.settings.timing.theme_retry();
        let task = tokio::spawn(async move {
            let found = policy
                .retry("theme source", || {
                    let this = Self::upgrade(&weak)?;
                    let doc = this.inner.doc.lock();
                    doc.query_selector(doc.root(), this.inner.theme.source())
                })
                .await;
            if found.is_some() {
                if let Some(this) = Self::upgrade(&weak) {
                    {
                        let mut engine = this.engine();
                        this.ensure_theme_watcher(&mut engine);
                    }
                    this.apply_theme();
                }
            }
        });
        engine.watchers.theme_probe = Some(Subscription::from_task("theme-probe", task));
    }

    fn ensure_navigation_watcher(&self, engine: &mut Engine) {
        if engine.watchers.navigation.is_some() {
            return;
        }
        let mut last_location = self.inner.doc.lock().location().to_string();
        let weak = self.weak();
        engine.watchers.navigation = Some(watch::watch(
            &self.inner.doc,
            "navigation",
            self.inner.settings.timing.navigation_delay(),
            move |doc, record| {
                // Dropped records may have hidden an address change.
                let relevant = record.is_none_or(|r| matches!(r, MutationRecord::ChildList { .. }));
                if !relevant || doc.location() == last_location {
                    return false;
                }
                last_location = doc.location().to_string();
                true
            },
            move || {
                if let Some(this) = Self::upgrade(&weak) {
                    if let Err(err) = this.navigate() {
                        debug!(error = %err, "no playlist after navigation");
                    }
                }
            },
        ));
    }
}
