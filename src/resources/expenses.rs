//! Expenses: money paid out of an account, drafted and then published.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{Collection, MutationOutcome, Pagination};
use super::{Action, Mutation, Resource, ResourceClient};
use crate::cache::QueryKey;
use crate::transport::TransportError;

pub struct Expenses;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expense {
  pub id: u64,
  pub payment_date: String,
  pub payment_account_id: u64,
  pub reference_no: String,
  pub description: String,
  pub total_amount: f64,
  pub currency_code: String,
  pub published_at: Option<String>,
  pub is_published: bool,
}

impl Expense {
  pub fn status(&self) -> &'static str {
    if self.is_published {
      "published"
    } else {
      "draft"
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseAction {
  Publish,
}

impl Action for ExpenseAction {
  fn segment(&self) -> &'static str {
    match self {
      Self::Publish => "publish",
    }
  }

  fn success_message(&self) -> &'static str {
    match self {
      Self::Publish => "The expense has been published successfully.",
    }
  }
}

impl Resource for Expenses {
  type Record = Expense;
  type Action = ExpenseAction;

  const LABEL: &'static str = "expense";
  const PATH: &'static str = "expenses";
  const LIST_TAG: &'static str = "EXPENSES";
  const DETAIL_TAG: &'static str = "EXPENSE";
  const LIST_FIELD: &'static str = "expenses";
  const DETAIL_FIELD: &'static str = "expense";

  fn empty_list() -> Collection<Expense> {
    Collection {
      items: vec![],
      pagination: Pagination {
        page: 1,
        page_size: 12,
        total: 0,
      },
      filter_meta: BTreeMap::new(),
    }
  }

  fn invalidates(mutation: &Mutation<ExpenseAction>) -> Vec<QueryKey> {
    match mutation {
      Mutation::Create => vec![Self::lists()],
      Mutation::Update { id }
      | Mutation::Delete { id }
      | Mutation::Transition {
        id,
        action: ExpenseAction::Publish,
      } => vec![Self::lists(), Self::detail_key(*id)],
      Mutation::BulkDelete { ids } => std::iter::once(Self::lists())
        .chain(ids.iter().map(|id| Self::detail_key(*id)))
        .collect(),
    }
  }
}

impl ResourceClient<Expenses> {
  pub async fn publish(&self, id: u64) -> Result<MutationOutcome, TransportError> {
    self.transition(id, ExpenseAction::Publish).await
  }
}
