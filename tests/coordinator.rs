mod support;

use std::time::Duration;

use assert_matches::assert_matches;
use tokio::time::sleep;

use playlist_progress::config::Settings;
use playlist_progress::coordinator::{Coordinator, Phase, RefreshError, WatcherStatus};
use playlist_progress::dom::{Selector, SharedDocument};
use playlist_progress::extract::ExtractError;
use playlist_progress::replay::HostPage;
use playlist_progress::ThemeMode;

use crate::support::{page, playlist, tracing_init, widget_count};

const LIGHT: &str = "//s1.hdslb.com/bfs/seed/jinkela/long/laputa-css/light.css";
const DARK: &str = "//s1.hdslb.com/bfs/seed/jinkela/long/laputa-css/dark.css";

fn setup(doc: &SharedDocument) -> (Coordinator, HostPage) {
    tracing_init();
    let settings = Settings::default();
    let host = HostPage::new(doc.clone(), &settings.selectors).unwrap();
    let coordinator = Coordinator::new(doc.clone(), settings).unwrap();
    (coordinator, host)
}

async fn started(doc: &SharedDocument) -> (Coordinator, HostPage) {
    let (coordinator, host) = setup(doc);
    coordinator.start().await.unwrap();
    (coordinator, host)
}

#[tokio::test(start_paused = true)]
async fn three_item_playlist_shows_half_watched() {
    let doc = page(Some(LIGHT), Some(playlist(&["5:00", "3:00", "2:00"], 1)));
    let (coordinator, _) = setup(&doc);
    let _ = coordinator.start();

    sleep(Duration::from_millis(1900)).await;
    assert_eq!(coordinator.phase(), Phase::Uninitialized);
    assert_eq!(widget_count(&doc), 0);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(coordinator.phase(), Phase::Observing);
    let view = coordinator.view().unwrap();
    assert_eq!(view.index, "Current video: 2/3");
    assert_eq!(view.time, "Watched: 5:00/10:00");
    assert_eq!(view.fill_width, "50%");
    assert_eq!(view.percent, "50.0%");
    assert_eq!(view.theme, Some(ThemeMode::Light));
    assert_eq!(
        coordinator.watchers(),
        WatcherStatus {
            active_item: true,
            theme: true,
            navigation: true
        }
    );
    assert_eq!(widget_count(&doc), 1);
}

#[tokio::test(start_paused = true)]
async fn metrics_come_straight_from_the_pipeline() {
    let doc = page(None, Some(playlist(&["5:00", "3:00", "2:00"], 1)));
    let (coordinator, _) = setup(&doc);
    let metrics = coordinator.initialize().unwrap();
    assert_eq!(metrics.watched_seconds, 300);
    assert_eq!(metrics.total_seconds, 600);
    assert_eq!(metrics.percent, Some(50.0));
    assert_eq!(metrics.display_index(), "2/3");
}

#[tokio::test(start_paused = true)]
async fn widget_sits_directly_above_the_playlist() {
    let doc = page(Some(LIGHT), Some(playlist(&["1:00", "1:00"], 0)));
    let _ = started(&doc).await;
    let d = doc.lock();
    let list: Selector = ".video-pod__list".parse().unwrap();
    let widget: Selector = "#playlist-progress-display".parse().unwrap();
    let list = d.query_selector(d.root(), &list).unwrap();
    let widget = d.query_selector(d.root(), &widget).unwrap();
    let siblings = d.children(d.parent(list).unwrap());
    assert_eq!(siblings, &[widget, list]);
}

#[tokio::test(start_paused = true)]
async fn burst_of_item_changes_runs_pipeline_once() {
    let doc = page(Some(LIGHT), Some(playlist(&["5:00", "3:00", "2:00"], 1)));
    let (coordinator, host) = started(&doc).await;
    assert_eq!(coordinator.stats().pipeline_runs, 1);

    host.activate(2).unwrap();
    sleep(Duration::from_millis(100)).await;
    host.activate(0).unwrap();
    sleep(Duration::from_millis(100)).await;
    host.activate(1).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.stats().pipeline_runs, 1);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(coordinator.stats().pipeline_runs, 2);
    let view = coordinator.view().unwrap();
    assert_eq!(view.index, "Current video: 2/3");
    assert_eq!(view.time, "Watched: 5:00/10:00");
    assert_eq!(view.percent, "50.0%");

    host.activate(2).unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(coordinator.stats().pipeline_runs, 3);
    assert_eq!(coordinator.view().unwrap().index, "Current video: 3/3");
    assert_eq!(coordinator.view().unwrap().percent, "80.0%");
}

#[tokio::test(start_paused = true)]
async fn repeated_initialization_installs_no_extra_watchers() {
    let doc = page(Some(LIGHT), Some(playlist(&["1:00", "1:00", "1:00"], 0)));
    let (coordinator, host) = started(&doc).await;
    coordinator.initialize().unwrap();
    coordinator.initialize().unwrap();
    assert_eq!(coordinator.stats().pipeline_runs, 3);
    assert_eq!(widget_count(&doc), 1);

    host.activate(1).unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(coordinator.stats().pipeline_runs, 4);
}

#[tokio::test(start_paused = true)]
async fn theme_change_repaints_without_recomputing() {
    let doc = page(Some(LIGHT), Some(playlist(&["1:00", "2:00"], 1)));
    let (coordinator, host) = started(&doc).await;

    host.set_theme(DARK).unwrap();
    sleep(Duration::from_millis(100)).await;

    let stats = coordinator.stats();
    assert_eq!(stats.pipeline_runs, 1);
    assert_eq!(stats.theme_applications, 1);
    assert_eq!(coordinator.view().unwrap().theme, Some(ThemeMode::Dark));

    host.set_theme(LIGHT).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.view().unwrap().theme, Some(ThemeMode::Light));
}

#[tokio::test(start_paused = true)]
async fn late_theme_source_is_picked_up_by_retry() {
    let doc = page(None, Some(playlist(&["1:00", "2:00"], 1)));
    let (coordinator, _) = started(&doc).await;
    assert!(!coordinator.watchers().theme);
    assert_eq!(coordinator.view().unwrap().theme, Some(ThemeMode::Light));

    {
        let mut d = doc.lock();
        let link = d.create_element("link");
        d.set_attribute(link, "id", "__css-map__");
        d.set_attribute(link, "href", DARK);
        let root = d.root();
        d.append_child(root, link).unwrap();
    }
    sleep(Duration::from_millis(600)).await;
    assert!(coordinator.watchers().theme);
    assert_eq!(coordinator.view().unwrap().theme, Some(ThemeMode::Dark));
}

#[tokio::test(start_paused = true)]
async fn theme_retry_gives_up_until_next_navigation() {
    let doc = page(None, Some(playlist(&["1:00", "2:00"], 1)));
    let (coordinator, host) = started(&doc).await;

    // 500 + 1000 + 2000 + 4000 + 8000 ms of backoff.
    sleep(Duration::from_millis(16_000)).await;
    host.activate(0).unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(coordinator.stats().pipeline_runs, 2);

    {
        let mut d = doc.lock();
        let link = d.create_element("link");
        d.set_attribute(link, "id", "__css-map__");
        d.set_attribute(link, "href", DARK);
        let root = d.root();
        d.append_child(root, link).unwrap();
    }
    sleep(Duration::from_millis(2000)).await;
    assert!(!coordinator.watchers().theme);
    assert_eq!(coordinator.view().unwrap().theme, Some(ThemeMode::Light));

    host.navigate("https://www.bilibili.com/video/BV1xx411c7mD?p=2", None).unwrap();
    sleep(Duration::from_millis(1600)).await;
    assert_eq!(coordinator.stats().navigations, 1);
    assert!(coordinator.watchers().theme);
    assert_eq!(coordinator.view().unwrap().theme, Some(ThemeMode::Dark));
}

#[tokio::test(start_paused = true)]
async fn navigation_recreates_widget_for_new_playlist() {
    let doc = page(Some(LIGHT), Some(playlist(&["5:00", "3:00", "2:00"], 1)));
    let (coordinator, host) = started(&doc).await;
    let before = coordinator.view().unwrap();

    let next = playlist(&["10:00", "1:00:00"], 1);
    host.navigate("https://www.bilibili.com/video/BV1yy411c7mE", Some(&next))
        .unwrap();

    sleep(Duration::from_millis(500)).await;
    assert_eq!(coordinator.view().unwrap(), before);

    sleep(Duration::from_millis(600)).await;
    let view = coordinator.view().unwrap();
    assert_eq!(view.index, "Current video: 2/2");
    assert_eq!(view.time, "Watched: 10:00/1:10:00");
    assert_eq!(coordinator.stats().navigations, 1);
    assert_eq!(widget_count(&doc), 1);

    // The item watcher follows the replacement container.
    host.activate(0).unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(coordinator.view().unwrap().index, "Current video: 1/2");
}

#[tokio::test(start_paused = true)]
async fn address_change_alone_refreshes_once() {
    let doc = page(Some(LIGHT), Some(playlist(&["1:00", "1:00"], 0)));
    let (coordinator, host) = started(&doc).await;

    host.navigate("https://www.bilibili.com/video/BV1xx411c7mD?p=2", None).unwrap();
    host.navigate("https://www.bilibili.com/video/BV1xx411c7mD?p=2", None).unwrap();
    sleep(Duration::from_millis(1100)).await;

    let stats = coordinator.stats();
    assert_eq!(stats.navigations, 1);
    assert_eq!(stats.pipeline_runs, 2);
    assert_eq!(widget_count(&doc), 1);
}

#[tokio::test(start_paused = true)]
async fn mutation_flood_without_address_change_keeps_widget() {
    let doc = page(Some(LIGHT), Some(playlist(&["1:00", "1:00"], 0)));
    let (coordinator, _) = started(&doc).await;
    let widget: Selector = "#playlist-progress-display".parse().unwrap();
    let before = {
        let d = doc.lock();
        d.query_selector(d.root(), &widget).unwrap()
    };

    {
        let mut d = doc.lock();
        let root = d.root();
        for _ in 0..300 {
            let comment = d.create_element("div");
            d.append_child(root, comment).unwrap();
        }
    }
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(coordinator.stats().navigations, 0);
    let after = {
        let d = doc.lock();
        d.query_selector(d.root(), &widget).unwrap()
    };
    assert_eq!(before, after);
    assert_eq!(widget_count(&doc), 1);

    // A missed record can still be a real navigation.
    {
        let mut d = doc.lock();
        d.set_location("https://www.bilibili.com/video/BV1yy411c7mE");
        let root = d.root();
        for _ in 0..300 {
            let comment = d.create_element("div");
            d.append_child(root, comment).unwrap();
        }
    }
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(coordinator.stats().navigations, 1);
    assert_eq!(widget_count(&doc), 1);
}

#[tokio::test(start_paused = true)]
async fn theme_change_without_widget_is_not_counted() {
    let doc = page(Some(LIGHT), Some(playlist(&["1:00", "1:00"], 0)));
    let (coordinator, host) = started(&doc).await;
    {
        let mut d = doc.lock();
        let list: Selector = ".video-pod__list".parse().unwrap();
        let list = d.query_selector(d.root(), &list).unwrap();
        d.remove(list);
        d.set_location("https://www.bilibili.com/bangumi/play/ep1");
        let root = d.root();
        let marker = d.create_element("div");
        d.append_child(root, marker).unwrap();
    }
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(coordinator.stats().navigations, 1);
    assert!(coordinator.view().is_none());

    host.set_theme(DARK).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.stats().theme_applications, 0);
}

#[tokio::test(start_paused = true)]
async fn unparsable_durations_render_zero_percent() {
    let doc = page(Some(LIGHT), Some(playlist(&["abc", "", "--:--"], 1)));
    let (coordinator, _) = started(&doc).await;
    let view = coordinator.view().unwrap();
    assert_eq!(view.percent, "0.0%");
    assert_eq!(view.fill_width, "0%");
    assert_eq!(view.time, "Watched: 0:00/0:00");
    assert_eq!(widget_count(&doc), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_playlist_waits_for_navigation() {
    let doc = page(Some(LIGHT), None);
    let (coordinator, host) = started(&doc).await;
    assert_eq!(coordinator.phase(), Phase::Uninitialized);
    assert!(coordinator.view().is_none());
    assert_eq!(
        coordinator.watchers(),
        WatcherStatus {
            active_item: false,
            theme: false,
            navigation: true
        }
    );
    assert_matches!(
        coordinator.refresh(),
        Err(RefreshError::Extract(ExtractError::MissingContainer))
    );

    host.navigate(
        "https://www.bilibili.com/video/BV1zz411c7mF",
        Some(&playlist(&["2:00", "2:00"], 1)),
    )
    .unwrap();
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(coordinator.phase(), Phase::Observing);
    assert_eq!(coordinator.view().unwrap().index, "Current video: 2/2");
}

#[tokio::test(start_paused = true)]
async fn playlist_without_active_item_is_skipped() {
    let doc = page(Some(LIGHT), Some(playlist(&["1:00", "1:00"], 5)));
    let (coordinator, _) = setup(&doc);
    assert_matches!(
        coordinator.initialize(),
        Err(RefreshError::Extract(ExtractError::MissingActiveMarker))
    );
    assert_eq!(widget_count(&doc), 0);
}
