use color_eyre::{eyre::eyre, Report, Result};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use tally::config::Config;
use tally::resources::{Collection, ListQuery, MutationOutcome, Resource, ResourceClient};
use tally::transport::TransportError;
use tally::{Client, Query};

use crate::commands::{
  CommonCommand, EstimateCommand, ExpenseCommand, InvoiceCommand, ReceiptCommand, ResourceCommand,
};
use crate::output::{self, Row};

/// Runs one command against the API and writes its result to `out`.
pub struct App<W> {
  client: Client,
  /// Page size used when `--page-size` is not given
  page_size: u32,
  json: bool,
  out: W,
}

impl<W: Write> App<W> {
  pub fn new(client: Client, config: &Config, json: bool, out: W) -> Self {
    Self {
      client,
      page_size: config.cache.page_size,
      json,
      out,
    }
  }

  pub async fn run(&mut self, command: ResourceCommand) -> Result<()> {
    match command {
      ResourceCommand::Estimates { command } => {
        let estimates = self.client.estimates();
        match command {
          EstimateCommand::Common(command) => self.run_common(&estimates, command).await,
          EstimateCommand::Deliver { id } => {
            let result = estimates.deliver(id).await;
            self.report(result)
          }
          EstimateCommand::Approve { id } => {
            let result = estimates.approve(id).await;
            self.report(result)
          }
          EstimateCommand::Reject { id } => {
            let result = estimates.reject(id).await;
            self.report(result)
          }
        }
      }
      ResourceCommand::Invoices { command } => {
        let invoices = self.client.invoices();
        match command {
          InvoiceCommand::Common(command) => self.run_common(&invoices, command).await,
          InvoiceCommand::Deliver { id } => {
            let result = invoices.deliver(id).await;
            self.report(result)
          }
        }
      }
      ResourceCommand::Receipts { command } => {
        let receipts = self.client.receipts();
        match command {
          ReceiptCommand::Common(command) => self.run_common(&receipts, command).await,
          ReceiptCommand::Close { id } => {
            let result = receipts.close(id).await;
            self.report(result)
          }
        }
      }
      ResourceCommand::Expenses { command } => {
        let expenses = self.client.expenses();
        match command {
          ExpenseCommand::Common(command) => self.run_common(&expenses, command).await,
          ExpenseCommand::Publish { id } => {
            let result = expenses.publish(id).await;
            self.report(result)
          }
        }
      }
    }
  }

  async fn run_common<R>(&mut self, resource: &ResourceClient<R>, command: CommonCommand) -> Result<()>
  where
    R: Resource,
    R::Record: Row,
  {
    match command {
      CommonCommand::List(args) => {
        let query = args.to_query(self.page_size);
        match args.watch {
          Some(secs) => self.watch(resource, &query, Duration::from_secs(secs.max(1))).await,
          None => self.list(resource, &query).await,
        }
      }
      CommonCommand::Show { id } => {
        let mut detail = resource.detail(id);
        detail.settled().await;
        if let Some(error) = detail.error() {
          return Err(eyre!("Failed to load {} #{}: {}", R::LABEL, id, error));
        }
        if self.json {
          self.print_json(detail.data())
        } else {
          let text = output::record(detail.data());
          self.print(&text)
        }
      }
      CommonCommand::Create(payload) => {
        let body = payload.read()?;
        let result = resource.create(&body).await;
        self.report(result)
      }
      CommonCommand::Update { id, payload } => {
        let body = payload.read()?;
        let result = resource.update(id, &body).await;
        self.report(result)
      }
      CommonCommand::Delete { id } => {
        let result = resource.delete(id).await;
        self.report(result)
      }
      CommonCommand::BulkDelete { ids } => {
        let result = resource.delete_bulk(&ids).await;
        self.report(result)
      }
    }
  }

  async fn list<R>(&mut self, resource: &ResourceClient<R>, query: &ListQuery) -> Result<()>
  where
    R: Resource,
    R::Record: Row,
  {
    let mut list = resource.list(query);
    list.settled().await;
    if let Some(error) = list.error() {
      return Err(eyre!("Failed to load {}s: {}", R::LABEL, error));
    }
    self.render(list.data())
  }

  /// Keep a list on screen, invalidating it every `every` and re-rendering
  /// whenever a refresh lands. Returns on Ctrl-C or once the cache drops the
  /// list.
  async fn watch<R>(&mut self, resource: &ResourceClient<R>, query: &ListQuery, every: Duration) -> Result<()>
  where
    R: Resource,
    R::Record: Row,
  {
    let mut list = resource.list(query);
    let key = list.key().clone();

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut shown = None;
    loop {
      let state = (list.updated_at(), list.is_error());
      if !list.is_loading() && !list.is_stale() && shown != Some(state) {
        shown = Some(state);
        self.render_watched(&list)?;
      }

      tokio::select! {
        _ = &mut ctrl_c => break,
        _ = ticker.tick() => {
          debug!(key = %key, "refreshing watched list");
          self.client.cache().invalidate(&key);
        }
        changed = list.changed() => {
          if !changed {
            break;
          }
        }
      }
    }
    Ok(())
  }

  fn render_watched<T: Row + Serialize>(&mut self, list: &Query<Collection<T>>) -> Result<()> {
    if !self.json {
      let stamp = chrono::Local::now().format("%H:%M:%S");
      writeln!(self.out, "\n--- {} ---", stamp)?;
    }
    if let Some(error) = list.error() {
      writeln!(self.out, "Refresh failed: {}", error)?;
      if !list.has_data() {
        return Ok(());
      }
    }
    self.render(list.data())
  }

  fn render<T: Row + Serialize>(&mut self, collection: &Collection<T>) -> Result<()> {
    if self.json {
      self.print_json(collection)
    } else {
      let text = output::collection(collection);
      self.print(&text)
    }
  }

  /// Success toasts come from the notifier; only `--json` echoes the body.
  fn report(&mut self, result: std::result::Result<MutationOutcome, TransportError>) -> Result<()> {
    let outcome = result.map_err(describe)?;
    if self.json {
      self.print_json(&outcome.body)?;
    }
    Ok(())
  }

  fn print(&mut self, text: &str) -> Result<()> {
    writeln!(self.out, "{}", text)?;
    Ok(())
  }

  fn print_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    self.print(&text)
  }
}

/// Turn a transport error into a report listing any field-level errors.
fn describe(error: TransportError) -> Report {
  let fields = error.field_errors();
  if fields.is_empty() {
    return Report::new(error);
  }
  let details: Vec<String> = fields
    .iter()
    .map(|field| match &field.message {
      Some(message) => format!("  - {}: {}", field.kind, message),
      None => format!("  - {}", field.kind),
    })
    .collect();
  eyre!("{}\n{}", error, details.join("\n"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::commands::ListArgs;
  use serde_json::json;
  use std::sync::Arc;
  use tally::notify::LogNotifier;
  use tally::transport::HttpTransport;
  use tally::QueryCache;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn app(server: &MockServer, json: bool) -> App<Vec<u8>> {
    let config = Config::from_yaml(&format!("api:\n  url: {}\ncache:\n  page_size: 5\n", server.uri())).unwrap();
    let transport = HttpTransport::new(&config.api, Some("token")).unwrap();
    let client = Client::new(QueryCache::new(), Arc::new(transport), Arc::new(LogNotifier));
    App::new(client, &config, json, Vec::new())
  }

  fn printed(app: &App<Vec<u8>>) -> String {
    String::from_utf8(app.out.clone()).unwrap()
  }

  #[tokio::test]
  async fn test_list_uses_configured_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sales/estimates"))
      .and(query_param("page_size", "5"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "sales_estimates": [{ "id": 1, "estimate_number": "EST-1" }],
        "pagination": { "page": 1, "page_size": 5, "total": 1 }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut app = app(&server, false);
    app
      .run(ResourceCommand::Estimates {
        command: EstimateCommand::Common(CommonCommand::List(ListArgs {
          page: 1,
          ..ListArgs::default()
        })),
      })
      .await
      .unwrap();

    let out = printed(&app);
    assert!(out.contains("EST-1"));
    assert!(out.contains("page 1 of 1 (1 total)"));
  }

  #[tokio::test]
  async fn test_show_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/expenses/3"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({ "expense": { "id": 3, "description": "Rent" } })),
      )
      .mount(&server)
      .await;

    let mut app = app(&server, true);
    app
      .run(ResourceCommand::Expenses {
        command: ExpenseCommand::Common(CommonCommand::Show { id: 3 }),
      })
      .await
      .unwrap();

    let shown: serde_json::Value = serde_json::from_str(&printed(&app)).unwrap();
    assert_eq!(shown["description"], "Rent");
    assert_eq!(shown["is_published"], false);
  }

  #[tokio::test]
  async fn test_validation_errors_are_listed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/sales/receipts/4/close"))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({
        "errors": [{ "type": "SALE.RECEIPT.IS.ALREADY.CLOSED", "code": 200 }]
      })))
      .mount(&server)
      .await;

    let mut app = app(&server, false);
    let err = app
      .run(ResourceCommand::Receipts {
        command: ReceiptCommand::Close { id: 4 },
      })
      .await
      .unwrap_err();
    assert!(err.to_string().contains("  - SALE.RECEIPT.IS.ALREADY.CLOSED"));
    assert!(printed(&app).is_empty());
  }

  #[tokio::test]
  async fn test_watch_rerenders_after_each_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sales/estimates"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "sales_estimates": [{ "id": 1, "estimate_number": "EST-1" }],
        "pagination": { "page": 1, "page_size": 5, "total": 1 }
      })))
      .mount(&server)
      .await;

    let mut app = app(&server, false);
    // Clearing the cache closes the watched list and ends the loop.
    let cache = app.client.cache().clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(300)).await;
      cache.clear();
    });

    let estimates = app.client.estimates();
    tokio::time::timeout(
      Duration::from_secs(5),
      app.watch(&estimates, &ListQuery::default(), Duration::from_millis(50)),
    )
    .await
    .expect("watch did not stop")
    .unwrap();

    let out = printed(&app);
    assert!(out.matches("\n--- ").count() >= 2);
    assert!(out.contains("EST-1"));
    assert!(server.received_requests().await.unwrap().len() >= 2);
  }
}
