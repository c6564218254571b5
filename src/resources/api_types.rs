//! Response envelopes of the API and their projections into domain types.
//!
//! Lists arrive as `{<plural>: [...], pagination: {...}, filter_meta: {...}}`
//! and details as `{<singular>: {...}}`; the field names come from the
//! [`Resource`] being read.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{Collection, FilterMeta, Pagination};
use super::Resource;

/// Pagination as the server sends it. Numbers sometimes arrive as strings.
#[derive(Debug, Deserialize)]
struct ApiPagination {
  #[serde(default = "first_page", deserialize_with = "lenient_number")]
  page: u64,
  #[serde(default, deserialize_with = "lenient_number")]
  page_size: u64,
  #[serde(default, deserialize_with = "lenient_number")]
  total: u64,
}

fn first_page() -> u64 {
  1
}

fn lenient_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
  D: Deserializer<'de>,
{
  match Value::deserialize(deserializer)? {
    Value::Number(n) => n
      .as_u64()
      .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
      .ok_or_else(|| D::Error::custom(format!("expected a non-negative number, got {}", n))),
    Value::String(s) => s
      .trim()
      .parse()
      .map_err(|_| D::Error::custom(format!("expected a number, got {:?}", s))),
    Value::Null => Ok(0),
    other => Err(D::Error::custom(format!("expected a number, got {}", other))),
  }
}

fn field<'a>(body: &'a Value, name: &'static str) -> Option<&'a Value> {
  body.get(name).filter(|v| !v.is_null())
}

/// Project a list response into a collection.
///
/// Pagination is normalised so that `page >= 1` and `total >= items.len()`;
/// a missing `page_size` falls back to the resource's empty-list page size.
pub fn select_collection<R: Resource>(body: &Value) -> serde_json::Result<Collection<R::Record>> {
  let items: Vec<R::Record> = match field(body, R::LIST_FIELD) {
    Some(items) => Vec::deserialize(items)?,
    None => return Err(serde_json::Error::missing_field(R::LIST_FIELD)),
  };

  let empty = R::empty_list();
  let pagination = match field(body, "pagination") {
    Some(raw) => {
      let raw = ApiPagination::deserialize(raw)?;
      Pagination {
        page: u32::try_from(raw.page.max(1)).unwrap_or(u32::MAX),
        page_size: match raw.page_size {
          0 => empty.pagination.page_size,
          n => u32::try_from(n).unwrap_or(u32::MAX),
        },
        total: raw.total.max(items.len() as u64),
      }
    }
    None => Pagination {
      total: items.len() as u64,
      ..empty.pagination
    },
  };

  // Some endpoints send `[]` when no filter applies.
  let filter_meta = match field(body, "filter_meta") {
    Some(meta @ Value::Object(_)) => FilterMeta::deserialize(meta)?,
    _ => FilterMeta::new(),
  };

  Ok(Collection {
    items,
    pagination,
    filter_meta,
  })
}

/// Project a detail response into its record. Fields the server leaves out
/// take their zero value.
pub fn select_record<R: Resource>(body: &Value) -> serde_json::Result<R::Record> {
  match field(body, R::DETAIL_FIELD) {
    Some(record) => R::Record::deserialize(record),
    None => Err(serde_json::Error::missing_field(R::DETAIL_FIELD)),
  }
}
