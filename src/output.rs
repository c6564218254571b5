//! Plain-text rendering of records and collections.

use tally::resources::{Collection, Estimate, Expense, Invoice, Receipt};

/// A record that can be shown as a table row.
pub trait Row {
  const HEADERS: &'static [&'static str];

  fn cells(&self) -> Vec<String>;
}

fn amount(value: f64, currency: &str) -> String {
  if currency.is_empty() {
    format!("{:.2}", value)
  } else {
    format!("{:.2} {}", value, currency)
  }
}

fn or_dash(value: &str) -> String {
  if value.is_empty() {
    "-".to_string()
  } else {
    value.to_string()
  }
}

impl Row for Estimate {
  const HEADERS: &'static [&'static str] = &["ID", "NUMBER", "CUSTOMER", "DATE", "EXPIRES", "AMOUNT", "STATUS"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      or_dash(&self.estimate_number),
      self
        .customer
        .as_ref()
        .map(|c| c.display_name.clone())
        .unwrap_or_else(|| "-".to_string()),
      or_dash(&self.estimate_date),
      or_dash(&self.expiration_date),
      amount(self.amount, &self.currency_code),
      self.status().to_string(),
    ]
  }
}

impl Row for Invoice {
  const HEADERS: &'static [&'static str] = &["ID", "NUMBER", "CUSTOMER", "DATE", "DUE", "BALANCE", "DUE AMOUNT", "STATUS"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      or_dash(&self.invoice_no),
      self
        .customer
        .as_ref()
        .map(|c| c.display_name.clone())
        .unwrap_or_else(|| "-".to_string()),
      or_dash(&self.invoice_date),
      or_dash(&self.due_date),
      amount(self.balance, &self.currency_code),
      amount(self.due_amount, &self.currency_code),
      self.status().to_string(),
    ]
  }
}

impl Row for Receipt {
  const HEADERS: &'static [&'static str] = &["ID", "NUMBER", "CUSTOMER", "DATE", "DEPOSIT TO", "AMOUNT", "STATUS"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      or_dash(&self.receipt_number),
      self
        .customer
        .as_ref()
        .map(|c| c.display_name.clone())
        .unwrap_or_else(|| "-".to_string()),
      or_dash(&self.receipt_date),
      self
        .deposit_account
        .as_ref()
        .map(|a| a.name.clone())
        .unwrap_or_else(|| "-".to_string()),
      amount(self.amount, &self.currency_code),
      self.status().to_string(),
    ]
  }
}

impl Row for Expense {
  const HEADERS: &'static [&'static str] = &["ID", "DATE", "REFERENCE", "DESCRIPTION", "AMOUNT", "STATUS"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      or_dash(&self.payment_date),
      or_dash(&self.reference_no),
      or_dash(&self.description),
      amount(self.total_amount, &self.currency_code),
      self.status().to_string(),
    ]
  }
}

/// Render rows as a left-aligned table padded to the widest cell.
pub fn table<T: Row>(rows: &[T]) -> String {
  let cells: Vec<Vec<String>> = rows.iter().map(Row::cells).collect();
  let mut widths: Vec<usize> = T::HEADERS.iter().map(|h| h.chars().count()).collect();
  for row in &cells {
    for (width, cell) in widths.iter_mut().zip(row) {
      *width = (*width).max(cell.chars().count());
    }
  }

  let mut out = vec![line(T::HEADERS, &widths)];
  out.extend(cells.iter().map(|row| {
    let row: Vec<&str> = row.iter().map(String::as_str).collect();
    line(&row, &widths)
  }));
  out.join("\n")
}

fn line(row: &[&str], widths: &[usize]) -> String {
  let padded: Vec<String> = row
    .iter()
    .zip(widths)
    .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
    .collect();
  padded.join("  ").trim_end().to_string()
}

/// Render a collection with a pagination footer.
pub fn collection<T: Row>(collection: &Collection<T>) -> String {
  let pagination = &collection.pagination;
  let footer = format!(
    "page {} of {} ({} total)",
    pagination.page,
    pagination.page_count().max(1),
    pagination.total
  );
  if collection.items.is_empty() {
    return format!("No records.\n{}", footer);
  }
  format!("{}\n\n{}", table(&collection.items), footer)
}

/// Render one record as `HEADER: value` lines.
pub fn record<T: Row>(record: &T) -> String {
  let width = T::HEADERS.iter().map(|h| h.len()).max().unwrap_or(0);
  T::HEADERS
    .iter()
    .zip(record.cells())
    .map(|(header, cell)| format!("{:>width$}: {}", header, cell, width = width))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use tally::resources::{Contact, Pagination};

  fn estimate(id: u64, number: &str) -> Estimate {
    Estimate {
      id,
      estimate_number: number.to_string(),
      customer: Some(Contact {
        id: 1,
        display_name: "Acme".to_string(),
      }),
      amount: 120.5,
      currency_code: "USD".to_string(),
      ..Estimate::default()
    }
  }

  #[test]
  fn test_table_pads_columns() {
    let rendered = table(&[estimate(1, "EST-1"), estimate(22, "EST-22")]);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("ID  NUMBER  CUSTOMER"));
    assert!(lines[2].starts_with("22  EST-22  Acme"));
    assert!(lines[1].contains("120.50 USD"));
    assert!(lines[1].ends_with("draft"));
  }

  #[test]
  fn test_empty_collection() {
    let empty = Collection::<Estimate> {
      items: vec![],
      pagination: Pagination {
        page: 1,
        page_size: 12,
        total: 0,
      },
      filter_meta: Default::default(),
    };
    assert_eq!(collection(&empty), "No records.\npage 1 of 1 (0 total)");
  }

  #[test]
  fn test_record_lines() {
    let rendered = record(&Expense {
      id: 3,
      description: "Rent".to_string(),
      is_published: true,
      ..Expense::default()
    });
    assert!(rendered.contains("DESCRIPTION: Rent"));
    assert!(rendered.contains("     STATUS: published"));
    assert!(rendered.contains("  REFERENCE: -"));
  }
}
