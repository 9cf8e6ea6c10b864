// SPDX-License-Identifier: MIT

//! Parsing of one collector output line:
//! `<metric> <value> <timestamp-seconds> [<tag>=<value> ...]`

/// Sanity upper bound on a sample timestamp (~year 2040), per the child
/// process contract. Lines carrying a later timestamp are invalid.
pub const MAX_REASONABLE_TIMESTAMP: i64 = 2_209_212_000;

/// A line, split into its whitespace-separated fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    pub metric: &'a str,
    pub value: &'a str,
    pub value_f64: Option<f64>,
    pub timestamp: i64,
    pub tags: Vec<(&'a str, &'a str)>,
}

/// Parse a trimmed, non-empty line into its fields.
///
/// Returns `None` if the line does not have at least `metric value
/// timestamp`, or if the timestamp is not a plausible UNIX-seconds value.
/// The metric/value/tag fields themselves are not otherwise validated —
/// a non-numeric value is kept as-is for forwarding, just excluded from the
/// `deduponlyzero` zero-check.
pub fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let mut fields = line.split_whitespace();
    let metric = fields.next()?;
    let value = fields.next()?;
    let timestamp: i64 = fields.next()?.parse().ok()?;
    if timestamp < 0 || timestamp > MAX_REASONABLE_TIMESTAMP {
        return None;
    }

    let mut tags = Vec::new();
    for field in fields {
        let (k, v) = field.split_once('=')?;
        tags.push((k, v));
    }

    Some(ParsedLine {
        metric,
        value,
        value_f64: value.parse().ok(),
        timestamp,
        tags,
    })
}

/// Build the dedup fingerprint for `(metric, tag-set)`: the tag set is
/// order-independent, so tags are sorted before joining.
pub fn fingerprint(metric: &str, tags: &[(&str, &str)]) -> String {
    let mut sorted = tags.to_vec();
    sorted.sort_unstable();
    let mut out = String::with_capacity(metric.len() + sorted.len() * 8);
    out.push_str(metric);
    for (k, v) in sorted {
        out.push('\0');
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metric_value_timestamp_and_tags() {
        let parsed = parse_line("net.ping 1 1700000000 host=a iface=eth0").unwrap();
        assert_eq!(parsed.metric, "net.ping");
        assert_eq!(parsed.value, "1");
        assert_eq!(parsed.value_f64, Some(1.0));
        assert_eq!(parsed.timestamp, 1_700_000_000);
        assert_eq!(parsed.tags, vec![("host", "a"), ("iface", "eth0")]);
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(parse_line("net.ping").is_none());
        assert!(parse_line("net.ping 1").is_none());
    }

    #[test]
    fn rejects_timestamp_past_sanity_bound() {
        assert!(parse_line("net.ping 1 9999999999").is_none());
    }

    #[test]
    fn rejects_malformed_tag() {
        assert!(parse_line("net.ping 1 1700000000 not-a-tag").is_none());
    }

    #[test]
    fn non_numeric_value_still_parses_without_value_f64() {
        let parsed = parse_line("app.status ok 1700000000").unwrap();
        assert_eq!(parsed.value, "ok");
        assert_eq!(parsed.value_f64, None);
    }

    #[test]
    fn fingerprint_is_order_independent_over_tags() {
        let a = fingerprint("m", &[("b", "2"), ("a", "1")]);
        let b = fingerprint("m", &[("a", "1"), ("b", "2")]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_metrics_and_tag_values() {
        let a = fingerprint("m", &[("a", "1")]);
        let b = fingerprint("m", &[("a", "2")]);
        assert_ne!(a, b);
    }
}
