use crate::extract::PlaylistSnapshot;

/// Cumulative progress through the playlist, by item duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressMetrics {
    pub active_index: usize,
    pub item_count: usize,
    /// Sum of durations of all items before the active one.
    pub watched_seconds: u64,
    pub total_seconds: u64,
    /// `None` when the playlist has no measurable duration.
    pub percent: Option<f64>,
}

impl ProgressMetrics {
    /// Percentage to display; an indeterminate percentage shows as 0.
    pub fn display_percent(&self) -> f64 {
        self.percent.unwrap_or(0.0)
    }

    /// 1-based position of the active item, e.g. `2/3`.
    pub fn display_index(&self) -> String {
        format!("{}/{}", self.active_index + 1, self.item_count)
    }
}

pub fn compute(snapshot: &PlaylistSnapshot) -> ProgressMetrics {
    let (watched_seconds, total_seconds) = snapshot.items.iter().enumerate().fold(
        (0u64, 0u64),
        |(watched, total), (index, item)| {
            let total = total.saturating_add(item.duration_seconds);
            if index < snapshot.active_index {
                (watched.saturating_add(item.duration_seconds), total)
            } else {
                (watched, total)
            }
        },
    );

    let percent = if total_seconds == 0 {
        None
    } else {
        Some(watched_seconds as f64 / total_seconds as f64 * 100.0)
    };

    ProgressMetrics {
        active_index: snapshot.active_index,
        item_count: snapshot.items.len(),
        watched_seconds,
        total_seconds,
        percent,
    }
}
