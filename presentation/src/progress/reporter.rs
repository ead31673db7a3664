//! Spinner shown while the agent is working and nothing is streaming

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// A single reusable spinner on stderr.
pub struct ActivitySpinner {
    enabled: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ActivitySpinner {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            bar: Mutex::new(None),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    /// Show the spinner with `message`, replacing any current one.
    pub fn start(&self, message: impl Into<String>) {
        if !self.enabled {
            return;
        }
        let mut bar = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        match bar.as_ref() {
            Some(pb) => pb.set_message(message.into()),
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(Self::style());
                pb.set_message(message.into());
                pb.enable_steady_tick(Duration::from_millis(100));
                *bar = Some(pb);
            }
        }
    }

    pub fn stop(&self) {
        if let Some(pb) = self.bar.lock().unwrap_or_else(|e| e.into_inner()).take() {
            pb.finish_and_clear();
        }
    }

    pub fn is_active(&self) -> bool {
        self.bar.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Run `f` with the spinner hidden so output does not interleave.
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        let bar = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        match bar.as_ref() {
            Some(pb) => pb.suspend(f),
            None => f(),
        }
    }
}

impl Drop for ActivitySpinner {
    fn drop(&mut self) {
        self.stop();
    }
}
