//! Query keys: the addressing scheme of the cache.

use std::collections::BTreeMap;
use std::fmt;

/// Filter/sort parameters of a query, kept sorted so equal parameter sets
/// produce equal keys regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a parameter, replacing any previous value for the same name.
  pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
    self.insert(name, value);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
    self.0.insert(name.into(), value.to_string());
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut params = Self::new();
    for (name, value) in iter {
      params.insert(name, value);
    }
    params
  }
}

/// Identifies one cache entry: `(tag, id?, params?)`.
///
/// A key with absent components doubles as a prefix. `QueryKey::new("SALE_ESTIMATES")`
/// matches every estimate list key whatever its parameters, which is what
/// invalidation after a mutation wants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
  tag: String,
  id: Option<String>,
  params: Option<QueryParams>,
}

impl QueryKey {
  pub fn new(tag: impl Into<String>) -> Self {
    Self {
      tag: tag.into(),
      id: None,
      params: None,
    }
  }

  pub fn with_id(mut self, id: impl ToString) -> Self {
    self.id = Some(id.to_string());
    self
  }

  pub fn with_params(mut self, params: QueryParams) -> Self {
    self.params = Some(params);
    self
  }

  pub fn tag(&self) -> &str {
    &self.tag
  }

  pub fn id(&self) -> Option<&str> {
    self.id.as_deref()
  }

  pub fn params(&self) -> Option<&QueryParams> {
    self.params.as_ref()
  }

  /// True when `self`, read as a prefix, covers `other`.
  ///
  /// Present components must be equal; absent ones match anything.
  pub fn matches(&self, other: &QueryKey) -> bool {
    if self.tag != other.tag {
      return false;
    }
    if self.id.is_some() && self.id != other.id {
      return false;
    }
    if self.params.is_some() && self.params != other.params {
      return false;
    }
    true
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.tag)?;
    if let Some(id) = &self.id {
      write!(f, ":{}", id)?;
    }
    if let Some(params) = &self.params {
      let rendered: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
      write!(f, "?{}", rendered.join("&"))?;
    }
    Ok(())
  }
}
