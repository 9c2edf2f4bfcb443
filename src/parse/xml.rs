//! Just-enough XML scraping for NX-OS `| xml` output. NX-OS wraps each record in a `<ROW_x>`
//! element whose children are flat `<tag>value</tag>` pairs -- no attributes, no nesting worth
//! speaking of -- so a pair of regexes beats dragging in a full parser for output that is not
//! even guaranteed to be well-formed when the device truncates it.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;

#[allow(clippy::expect_used)]
fn tag_pair_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?s)<([A-Za-z_][\w.\-]*)>(.*?)</([A-Za-z_][\w.\-]*)>")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Split `text` into the bodies of every `<row_tag>...</row_tag>` element.
#[must_use]
pub fn row_bodies<'a>(
    text: &'a str,
    row_tag: &str,
) -> Vec<&'a str> {
    let open = format!("<{row_tag}>");
    let close = format!("</{row_tag}>");

    let mut bodies = vec![];
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];

        let Some(end) = after_open.find(&close) else {
            // truncated final row -- keep what we have
            break;
        };

        bodies.push(&after_open[..end]);
        rest = &after_open[end + close.len()..];
    }

    bodies
}

/// Extract every flat `<tag>value</tag>` pair from one row body. Later duplicates of a tag win,
/// which matches how NX-OS emits corrected fields.
#[must_use]
pub fn tag_pairs(body: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();

    for captures in tag_pair_pattern().captures_iter(body) {
        let (Some(open), Some(value), Some(close)) =
            (captures.get(1), captures.get(2), captures.get(3))
        else {
            continue;
        };

        if open.as_str() != close.as_str() {
            continue;
        }

        pairs.insert(
            open.as_str().to_owned(),
            value.as_str().trim().to_owned(),
        );
    }

    pairs
}

/// Convenience: all rows of `row_tag` in `text`, each as a tag→value map.
#[must_use]
pub fn rows(
    text: &str,
    row_tag: &str,
) -> Vec<HashMap<String, String>> {
    row_bodies(text, row_tag).into_iter().map(tag_pairs).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = "\
<TABLE_inv>
 <ROW_inv>
  <name>Chassis</name>
  <desc>Nexus9000 C9396PX Chassis</desc>
  <serialnum>SAL1234ABCD</serialnum>
 </ROW_inv>
 <ROW_inv>
  <name>Slot 1</name>
  <desc>1/10G SFP+ Ethernet Module</desc>
  <serialnum>SAL5678EFGH</serialnum>
 </ROW_inv>
</TABLE_inv>";

    #[test]
    fn splits_rows_and_extracts_pairs() {
        let rows = rows(XML, "ROW_inv");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name").map(String::as_str), Some("Chassis"));
        assert_eq!(
            rows[1].get("serialnum").map(String::as_str),
            Some("SAL5678EFGH")
        );
    }

    #[test]
    fn truncated_final_row_is_dropped() {
        let truncated = "<ROW_inv><name>a</name></ROW_inv><ROW_inv><name>b</name>";

        assert_eq!(row_bodies(truncated, "ROW_inv").len(), 1);
    }

    #[test]
    fn mismatched_tags_skipped() {
        let pairs = tag_pairs("<a>1</b><c>2</c>");

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.get("c").map(String::as_str), Some("2"));
    }
}
