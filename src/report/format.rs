//! Display formatting shared by the HTML pages and CSV exports.

use crate::analytics::fetcher::{
    AVERAGE_TIME_ON_SITE, BOUNCE_RATE, NEW_VISITS, PAGES_PER_VISIT, TOTAL_PAGE_VIEWS,
    TOTAL_VISITS, UNIQUE_VISITORS,
};

const SHORT_NAME_LENGTH: usize = 60;

/// Totals that are averaged, not summed, across months.
const AVERAGED_KEYS: [&str; 5] = [
    AVERAGE_TIME_ON_SITE,
    PAGES_PER_VISIT,
    NEW_VISITS,
    BOUNCE_RATE,
    UNIQUE_VISITORS,
];

/// `num` as a share of `total`, e.g. `12.50%`.
pub fn percent(num: f64, total: f64) -> String {
    if total == 0.0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", 100.0 * num / total)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn is_summed_total(key: &str) -> bool {
    key == TOTAL_PAGE_VIEWS || key == TOTAL_VISITS
}

/// Render a `Totals` value for display.
pub fn clean_key(key: &str, value: f64) -> String {
    if AVERAGED_KEYS.contains(&key) {
        let value = round2(value);
        if key == AVERAGE_TIME_ON_SITE {
            let total = value.trunc() as i64;
            let (hours, rest) = (total / 3600, total % 3600);
            let (mins, secs) = (rest / 60, rest % 60);
            return format!("{hours:02}:{mins:02}:{secs:02} ({value:.2} seconds)");
        }
        if key == NEW_VISITS || key == BOUNCE_RATE {
            return format!("{value:.2}%");
        }
        return format!("{value:.2}");
    }

    if is_summed_total(key) {
        return format!("{}", value.trunc() as i64);
    }

    format_number(value)
}

/// Integers without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Sort position of a `Totals` key on the site usage page.
pub fn totals_order(key: &str) -> usize {
    [TOTAL_PAGE_VIEWS, TOTAL_VISITS, PAGES_PER_VISIT]
        .iter()
        .position(|k| *k == key)
        .unwrap_or(999)
}

pub fn shorten_name(name: &str) -> String {
    if name.chars().count() > SHORT_NAME_LENGTH {
        let short: String = name.chars().take(SHORT_NAME_LENGTH).collect();
        format!("{short}..")
    } else {
        name.to_string()
    }
}

/// Resolve a site-relative path against the public site url.
pub fn absolutise(site_url: &str, path: &str) -> String {
    match reqwest::Url::parse(site_url).and_then(|base| base.join(path)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", site_url.trim_end_matches('/'), path),
    }
}

/// Minimal escaping for text placed in HTML.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
