//! Command-line grammar

use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::PathBuf;

use tally::resources::{ListQuery, Sort, SortOrder};

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Command-line client for estimates, invoices, receipts and expenses")]
#[command(version)]
pub struct Cli {
  /// Path to config file (default: $XDG_CONFIG_HOME/tally/config.yaml)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// Organization to act on, overriding the config file
  #[arg(short, long)]
  pub organization: Option<String>,

  /// Print raw JSON instead of tables
  #[arg(long, global = true)]
  pub json: bool,

  #[command(subcommand)]
  pub resource: ResourceCommand,
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommand {
  /// Sale estimates
  #[command(visible_alias = "est")]
  Estimates {
    #[command(subcommand)]
    command: EstimateCommand,
  },
  /// Sale invoices
  #[command(visible_alias = "inv")]
  Invoices {
    #[command(subcommand)]
    command: InvoiceCommand,
  },
  /// Sale receipts
  Receipts {
    #[command(subcommand)]
    command: ReceiptCommand,
  },
  /// Expenses
  #[command(visible_alias = "exp")]
  Expenses {
    #[command(subcommand)]
    command: ExpenseCommand,
  },
}

/// Operations every resource supports.
#[derive(Subcommand, Debug, PartialEq)]
pub enum CommonCommand {
  /// List records, optionally keeping the list on screen
  #[command(visible_alias = "ls")]
  List(ListArgs),
  /// Show one record
  Show { id: u64 },
  /// Create a record from a JSON payload
  Create(PayloadArgs),
  /// Edit a record with a JSON payload
  Update {
    id: u64,
    #[command(flatten)]
    payload: PayloadArgs,
  },
  /// Delete a record
  #[command(visible_alias = "rm")]
  Delete { id: u64 },
  /// Delete several records at once
  BulkDelete {
    #[arg(required = true, num_args = 1..)]
    ids: Vec<u64>,
  },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum EstimateCommand {
  #[command(flatten)]
  Common(CommonCommand),
  /// Mark an estimate as delivered
  Deliver { id: u64 },
  /// Mark an estimate as approved
  Approve { id: u64 },
  /// Mark an estimate as rejected
  Reject { id: u64 },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum InvoiceCommand {
  #[command(flatten)]
  Common(CommonCommand),
  /// Mark an invoice as delivered
  Deliver { id: u64 },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ReceiptCommand {
  #[command(flatten)]
  Common(CommonCommand),
  /// Close a draft receipt
  Close { id: u64 },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ExpenseCommand {
  #[command(flatten)]
  Common(CommonCommand),
  /// Publish a draft expense
  Publish { id: u64 },
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct ListArgs {
  /// Page number, starting at 1
  #[arg(short, long, default_value_t = 1)]
  pub page: u32,

  /// Records per page (default: cache.page_size from config)
  #[arg(long)]
  pub page_size: Option<u32>,

  /// Column to sort by
  #[arg(short, long)]
  pub sort: Option<String>,

  /// Sort descending
  #[arg(long, requires = "sort")]
  pub desc: bool,

  /// Custom view slug
  #[arg(long)]
  pub view: Option<String>,

  /// Search keyword
  #[arg(long)]
  pub search: Option<String>,

  /// Keep watching, refreshing every SECS seconds
  #[arg(short, long, value_name = "SECS")]
  pub watch: Option<u64>,
}

impl ListArgs {
  pub fn to_query(&self, default_page_size: u32) -> ListQuery {
    ListQuery {
      page: self.page.max(1),
      page_size: self.page_size.unwrap_or(default_page_size),
      sort: self.sort.as_ref().map(|column| Sort {
        column: column.clone(),
        order: if self.desc {
          SortOrder::Desc
        } else {
          SortOrder::Asc
        },
      }),
      view_slug: self.view.clone(),
      search: self.search.clone(),
    }
  }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct PayloadArgs {
  /// JSON file holding the request body ("-" for stdin)
  #[arg(short, long)]
  pub file: PathBuf,
}

impl PayloadArgs {
  pub fn read(&self) -> Result<Value> {
    let contents = if self.file.as_os_str() == "-" {
      std::io::read_to_string(std::io::stdin())?
    } else {
      std::fs::read_to_string(&self.file)
        .map_err(|e| eyre!("Failed to read payload {}: {}", self.file.display(), e))?
    };
    let value: Value = serde_json::from_str(&contents)
      .map_err(|e| eyre!("Payload {} is not valid JSON: {}", self.file.display(), e))?;
    if !value.is_object() {
      return Err(eyre!("Payload {} must be a JSON object", self.file.display()));
    }
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("tally").chain(args.iter().copied())).unwrap()
  }

  #[test]
  fn test_transition_subcommand() {
    let cli = parse(&["estimates", "approve", "7"]);
    match cli.resource {
      ResourceCommand::Estimates { command } => {
        assert_eq!(command, EstimateCommand::Approve { id: 7 })
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_list_args_build_query() {
    let cli = parse(&["--json", "inv", "list", "--sort", "invoice_date", "--desc", "-p", "2"]);
    assert!(cli.json);
    let ResourceCommand::Invoices {
      command: InvoiceCommand::Common(CommonCommand::List(args)),
    } = cli.resource
    else {
      panic!("expected invoices list");
    };
    let query = args.to_query(25);
    assert_eq!(query.page, 2);
    assert_eq!(query.page_size, 25);
    assert_eq!(
      query.sort,
      Some(Sort {
        column: "invoice_date".to_string(),
        order: SortOrder::Desc
      })
    );
  }

  #[test]
  fn test_bulk_delete_needs_ids() {
    assert!(Cli::try_parse_from(["tally", "expenses", "bulk-delete"]).is_err());
    let cli = parse(&["expenses", "bulk-delete", "1", "2"]);
    let ResourceCommand::Expenses { command } = cli.resource else {
      panic!("expected expenses");
    };
    assert_eq!(
      command,
      ExpenseCommand::Common(CommonCommand::BulkDelete { ids: vec![1, 2] })
    );
  }

  #[test]
  fn test_transition_not_offered_on_other_resources() {
    assert!(Cli::try_parse_from(["tally", "receipts", "approve", "1"]).is_err());
  }

  #[test]
  fn test_payload_must_be_an_object() {
    let path = std::env::temp_dir().join(format!("tally-payload-{}.json", std::process::id()));
    std::fs::write(&path, "[1, 2]").unwrap();
    let payload = PayloadArgs { file: path.clone() };
    assert!(payload.read().is_err());

    std::fs::write(&path, r#"{ "customer_id": 1 }"#).unwrap();
    assert_eq!(payload.read().unwrap()["customer_id"], 1);
    std::fs::remove_file(path).unwrap();
  }
}
