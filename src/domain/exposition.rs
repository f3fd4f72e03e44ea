//! Prometheus-compatible text rendering of metric samples.
//!
//! Every sample is exposed as a gauge. Samples are sorted by base name
//! first, then by full name, so that a base name's labelled variants are
//! contiguous and its `# TYPE` line is written exactly once.

use std::fmt::Write as _;

use super::metric::MetricSample;

/// Content type of [`format`] output.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render samples as `# TYPE <base> gauge` groups of `<name> <value>` lines.
///
/// Output depends only on the multiset of samples, not on their order.
pub fn format(samples: &[MetricSample]) -> String {
    let mut sorted: Vec<&MetricSample> = samples.iter().collect();
    // `{` sorts after letters, so a plain name sort would split `b` and
    // `b{..}` around `ba`.
    sorted.sort_by(|a, b| {
        a.base_name()
            .cmp(b.base_name())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.value.total_cmp(&b.value))
    });

    let mut text = String::new();
    let mut previous_base: Option<&str> = None;

    for sample in sorted {
        let base = sample.base_name();
        if previous_base != Some(base) {
            let _ = writeln!(text, "# TYPE {base} gauge");
            previous_base = Some(base);
        }
        let _ = writeln!(text, "{} {}", sample.name, render_value(sample.value));
    }

    text
}

/// Plain number rendering; integral values carry no fractional part.
pub fn render_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() { "+Inf" } else { "-Inf" }.to_string()
    } else {
        // f64's Display never uses exponent notation and drops ".0".
        format!("{value}")
    }
}

/// Minimal HTML document around the exposition text, for browsers.
pub fn wrap_html(text: &str) -> String {
    format!("<html><body><pre>{}</pre></body></html>", escape_html(text))
}

/// Escape `&`, `<`, `>` and `"` for HTML text and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
