//! Domain types shared by every resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::cache::QueryParams;

/// Filters the server reports as applied to a list.
pub type FilterMeta = BTreeMap<String, Value>;

/// Pagination of a list response.
///
/// `page` is 1-based and `total >= items.len()` of the collection it
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
  pub page: u32,
  pub page_size: u32,
  pub total: u64,
}

impl Pagination {
  pub fn page_count(&self) -> u64 {
    if self.page_size == 0 {
      return 0;
    }
    self.total.div_ceil(u64::from(self.page_size))
  }
}

/// One page of records plus its pagination and filter metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection<T> {
  pub items: Vec<T>,
  pub pagination: Pagination,
  pub filter_meta: FilterMeta,
}

/// Customer or vendor attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
  pub id: u64,
  pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  Asc,
  Desc,
}

impl SortOrder {
  fn as_str(self) -> &'static str {
    match self {
      Self::Asc => "asc",
      Self::Desc => "desc",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
  pub column: String,
  pub order: SortOrder,
}

/// Parameters of a list request. Equal queries address the same cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
  pub page: u32,
  pub page_size: u32,
  pub sort: Option<Sort>,
  /// Custom view to list through
  pub view_slug: Option<String>,
  pub search: Option<String>,
}

impl Default for ListQuery {
  fn default() -> Self {
    Self {
      page: 1,
      page_size: 12,
      sort: None,
      view_slug: None,
      search: None,
    }
  }
}

impl ListQuery {
  pub fn to_params(&self) -> QueryParams {
    let mut params = QueryParams::new()
      .with("page", self.page.max(1))
      .with("page_size", self.page_size);
    if let Some(sort) = &self.sort {
      params.insert("column_sort_by", &sort.column);
      params.insert("sort_order", sort.order.as_str());
    }
    if let Some(view) = &self.view_slug {
      params.insert("view_slug", view);
    }
    if let Some(search) = &self.search {
      params.insert("search_keyword", search);
    }
    params
  }
}

/// What the API answered to a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
  /// Id of the affected record, when the server echoes it
  pub id: Option<u64>,
  pub message: Option<String>,
  pub body: Value,
}

impl MutationOutcome {
  pub(crate) fn from_body(body: Value) -> Self {
    Self {
      id: body.get("id").and_then(Value::as_u64),
      message: body
        .get("message")
        .and_then(Value::as_str)
        .map(String::from),
      body,
    }
  }
}
