/// Parses a duration token of the form `ss`, `mm:ss` or `hh:mm:ss` into seconds.
///
/// A bare `ss` token counts as seconds, so `"45"` is 45.
/// Fields are unsigned decimal integers and are not range-checked, so `"90:00"`
/// is 5400 seconds. Anything else (empty, non-numeric, too many fields,
/// overflow) yields `0`.
pub fn parse(token: &str) -> u64 {
    let fields: Vec<&str> = token.trim().split(':').map(str::trim).collect();
    if fields.len() > 3 {
        return 0;
    }

    let mut total: u64 = 0;
    for field in fields {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return 0;
        }
        let value = match field.parse::<u64>() {
            Ok(v) => v,
            Err(_) => return 0,
        };
        total = match total.checked_mul(60).and_then(|t| t.checked_add(value)) {
            Some(t) => t,
            None => return 0,
        };
    }
    total
}

/// Formats seconds as `h:mm:ss` when there is at least one hour, otherwise `m:ss`.
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
