//! Notification sink for mutation outcomes.

use std::sync::Mutex;
use tracing::info;

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
  Success,
}

/// A transient message shown after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub message: String,
  pub intent: Intent,
}

impl Notification {
  pub fn success(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      intent: Intent::Success,
    }
  }
}

/// Something that displays notifications (a toast area, a status line, stdout).
pub trait Notifier: Send + Sync {
  fn notify(&self, notification: Notification);
}

/// Prints notifications to stdout.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
  fn notify(&self, notification: Notification) {
    let marker = match notification.intent {
      Intent::Success => "✓",
    };
    println!("{} {}", marker, notification.message);
  }
}

/// Only logs notifications; for embedders without a display.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn notify(&self, notification: Notification) {
    info!(intent = ?notification.intent, "{}", notification.message);
  }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
  seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn notifications(&self) -> Vec<Notification> {
    self
      .seen
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .clone()
  }
}

impl Notifier for RecordingNotifier {
  fn notify(&self, notification: Notification) {
    self
      .seen
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .push(notification);
  }
}
