//! Search/pagination filter state and its canonical query-string codec.
//!
//! The codec's input is untrusted (a browser address bar), so decoding is
//! total: unknown keys are ignored and malformed numeric fields fall back to
//! their defaults instead of erroring. Encoding omits fields at their
//! default value to keep URLs minimal.
//!
//! Multi-valued fields use a comma-joined convention: the field is omitted
//! for an empty list, and each element is percent-encoded before joining so
//! the separator stays unambiguous.

use serde::{Deserialize, Serialize};

use crate::item::ItemStatus;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// ─── FilterState ─────────────────────────────────────────────────────────────

/// Structured search and pagination parameters. Owned by the caller; the
/// codec only translates it to and from the canonical string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
  /// Free-text query over names and addresses.
  pub query:        Option<String>,
  /// Contributor IDs, opaque to the engine.
  pub contributors: Vec<String>,
  /// ISO country codes.
  pub countries:    Vec<String>,
  pub statuses:     Vec<ItemStatus>,
  /// 1-based.
  pub page:         u32,
  pub page_size:    u32,
}

impl Default for FilterState {
  fn default() -> Self {
    Self {
      query:        None,
      contributors: Vec::new(),
      countries:    Vec::new(),
      statuses:     Vec::new(),
      page:         DEFAULT_PAGE,
      page_size:    DEFAULT_PAGE_SIZE,
    }
  }
}

impl FilterState {
  /// SQL OFFSET for the current page.
  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
  }
}

// ─── Encode ──────────────────────────────────────────────────────────────────

fn push_list(out: &mut Vec<String>, key: &str, values: &[String]) {
  if values.is_empty() {
    return;
  }
  let joined = values
    .iter()
    .map(|v| urlencoding::encode(v).into_owned())
    .collect::<Vec<_>>()
    .join(",");
  out.push(format!("{key}={joined}"));
}

/// Encode `filter` to its canonical query-string form (no leading `?`).
/// Fields at their default value are omitted; the empty filter encodes to
/// the empty string.
pub fn encode(filter: &FilterState) -> String {
  let mut parts: Vec<String> = Vec::new();

  if let Some(q) = &filter.query
    && !q.is_empty()
  {
    parts.push(format!("q={}", urlencoding::encode(q)));
  }
  push_list(&mut parts, "contributors", &filter.contributors);
  push_list(&mut parts, "countries", &filter.countries);
  if !filter.statuses.is_empty() {
    let joined = filter
      .statuses
      .iter()
      .map(|s| s.as_str())
      .collect::<Vec<_>>()
      .join(",");
    parts.push(format!("statuses={joined}"));
  }
  if filter.page != DEFAULT_PAGE {
    parts.push(format!("page={}", filter.page));
  }
  if filter.page_size != DEFAULT_PAGE_SIZE {
    parts.push(format!("page_size={}", filter.page_size));
  }

  parts.join("&")
}

// ─── Decode ──────────────────────────────────────────────────────────────────

fn decode_list(value: &str) -> Vec<String> {
  value
    .split(',')
    .filter(|v| !v.is_empty())
    .map(|v| urlencoding::decode(v).unwrap_or_default().into_owned())
    .collect()
}

/// Decode a query string (with or without a leading `?`) into a
/// [`FilterState`], using `page_size` as the default page size.
///
/// Never fails: unknown keys are ignored, malformed `page`/`page_size`
/// values and zeroes fall back to the defaults, and unknown status tokens
/// are skipped.
pub fn decode_with_page_size(input: &str, page_size: u32) -> FilterState {
  let mut filter = FilterState { page_size, ..FilterState::default() };

  let input = input.strip_prefix('?').unwrap_or(input);
  for pair in input.split('&') {
    let Some((key, value)) = pair.split_once('=') else { continue };
    match key {
      "q" => {
        let q = urlencoding::decode(value).unwrap_or_default().into_owned();
        if !q.is_empty() {
          filter.query = Some(q);
        }
      }
      "contributors" => filter.contributors = decode_list(value),
      "countries" => filter.countries = decode_list(value),
      "statuses" => {
        filter.statuses = value
          .split(',')
          .filter_map(ItemStatus::parse)
          .collect();
      }
      "page" => {
        filter.page = match value.parse() {
          Ok(p) if p >= 1 => p,
          _ => DEFAULT_PAGE,
        };
      }
      "page_size" => {
        filter.page_size = match value.parse() {
          Ok(s) if s >= 1 => s,
          _ => page_size,
        };
      }
      _ => {}
    }
  }

  filter
}

/// [`decode_with_page_size`] with the built-in [`DEFAULT_PAGE_SIZE`].
pub fn decode(input: &str) -> FilterState {
  decode_with_page_size(input, DEFAULT_PAGE_SIZE)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_filter_encodes_to_empty_string() {
    assert_eq!(encode(&FilterState::default()), "");
    assert_eq!(decode(""), FilterState::default());
  }

  #[test]
  fn round_trip_preserves_all_fields() {
    let filter = FilterState {
      query:        Some("steel plant".into()),
      contributors: vec!["c-17".into(), "c-204".into()],
      countries:    vec!["DE".into(), "VN".into()],
      statuses:     vec![ItemStatus::PotentialMatch, ItemStatus::NewFacility],
      page:         3,
      page_size:    50,
    };
    assert_eq!(decode(&encode(&filter)), filter);
  }

  #[test]
  fn round_trip_with_reserved_characters_in_query() {
    let filter = FilterState {
      query: Some("a&b=c, gmbh & co?".into()),
      ..FilterState::default()
    };
    assert_eq!(decode(&encode(&filter)), filter);
  }

  #[test]
  fn round_trip_with_commas_in_list_values() {
    let filter = FilterState {
      contributors: vec!["alpha,beta".into(), "gamma".into()],
      ..FilterState::default()
    };
    assert_eq!(decode(&encode(&filter)), filter);
  }

  #[test]
  fn defaults_are_omitted_from_encoding() {
    let filter = FilterState {
      countries: vec!["BD".into()],
      ..FilterState::default()
    };
    let encoded = encode(&filter);
    assert_eq!(encoded, "countries=BD");
    assert!(!encoded.contains("page"));
  }

  #[test]
  fn single_value_list_decodes_to_one_element() {
    let filter = decode("countries=BD");
    assert_eq!(filter.countries, vec!["BD".to_string()]);
  }

  #[test]
  fn malformed_numbers_fail_soft_to_defaults() {
    let filter = decode("page=banana&page_size=-3");
    assert_eq!(filter.page, DEFAULT_PAGE);
    assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);

    let filter = decode("page=0&page_size=0");
    assert_eq!(filter.page, DEFAULT_PAGE);
    assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
  }

  #[test]
  fn unknown_keys_and_status_tokens_are_ignored()  {
    let filter = decode("utm_source=mail&statuses=potential_match,bogus");
    assert_eq!(filter.statuses, vec![ItemStatus::PotentialMatch]);
    assert_eq!(filter.query, None);
  }

  #[test]
  fn leading_question_mark_is_tolerated() {
    let filter = decode("?page=2");
    assert_eq!(filter.page, 2);
  }

  #[test]
  fn configured_page_size_is_the_decode_default() {
    let filter = decode_with_page_size("countries=DE", 100);
    assert_eq!(filter.page_size, 100);
    // An explicit value still wins.
    let filter = decode_with_page_size("page_size=25", 100);
    assert_eq!(filter.page_size, 25);
  }

  #[test]
  fn offset_is_zero_based_from_one_based_page() {
    let filter = FilterState { page: 3, page_size: 20, ..Default::default() };
    assert_eq!(filter.offset(), 40);
    assert_eq!(FilterState::default().offset(), 0);
  }
}
