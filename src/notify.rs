// src/notify.rs

use std::fmt::Display;
use tracing::error;

/// Hook for telling someone a run failed (mail, chat, pager...).
pub trait Notifier: Send + Sync {
    fn notify(&self, stage: &str, err: &dyn Display);
}

/// Reports failures through the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, stage: &str, err: &dyn Display) {
        error!(stage, "job failed: {}", err);
    }
}
