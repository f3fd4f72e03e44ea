//! Named numeric samples exchanged between collectors and the exposition.

use serde::{Deserialize, Serialize};

/// A single gauge observation.
///
/// `name` may end in a `{...}` label set; everything before the first
/// `{` is the base name used to group samples under one `# TYPE` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Build `base{k1="v1",k2="v2"}` with label values escaped.
    ///
    /// Labels are rendered in the order given; an empty slice yields
    /// the bare base name.
    pub fn labeled(base: &str, labels: &[(&str, &str)], value: f64) -> Self {
        if labels.is_empty() {
            return Self::new(base, value);
        }

        let rendered: Vec<String> = labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{}\"", escape_label_value(v)))
            .collect();

        Self::new(format!("{base}{{{}}}", rendered.join(",")), value)
    }

    /// The name without its label suffix.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }
}

/// Truncate at the first `{`; a name without labels is its own base.
///
/// A name with nothing before its `{` is also its own base.
pub fn base_name(name: &str) -> &str {
    match name.split_once('{') {
        Some((base, _)) if !base.is_empty() => base,
        _ => name,
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}
