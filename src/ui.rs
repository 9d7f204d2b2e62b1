//! Terminal status output: colored category lines and a long-stage spinner.

use std::sync::Mutex;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

const CATEGORY_WIDTH: usize = 12;

/// Print a right-aligned colored category followed by a message, in the
/// style of `info  Exported intro in 2.01s`.
pub fn status(category: &str, message: impl AsRef<str>) {
    let label = format!("{:>width$}", category, width = CATEGORY_WIDTH);
    println!("{}  {}", label.magenta().bold(), message.as_ref());
}

pub fn warn(category: &str, message: impl AsRef<str>) {
    let label = format!("{:>width$}", category, width = CATEGORY_WIDTH);
    eprintln!("{}  {}", label.yellow().bold(), message.as_ref());
}

pub fn error(category: &str, message: impl AsRef<str>) {
    let label = format!("{:>width$}", category, width = CATEGORY_WIDTH);
    eprintln!("{}  {}", label.red().bold(), message.as_ref());
}

/// Format elapsed seconds the way status lines expect it.
pub fn format_elapsed(seconds: f64) -> String {
    format!("{seconds:.2}s").blue().to_string()
}

/// Spinner shown while a pipeline stage is running. `stop` clears the line
/// so a status summary can take its place; the next `update` spins it back
/// up for the following stage.
pub struct Spinner {
    bar: Mutex<Option<ProgressBar>>,
}

impl Spinner {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    pub fn update(&self, message: impl Into<String>) {
        let mut bar = self.bar.lock().expect("spinner mutex");
        bar.get_or_insert_with(create_bar).set_message(message.into());
    }

    pub fn stop(&self) {
        if let Some(bar) = self.bar.lock().expect("spinner mutex").take() {
            bar.finish_and_clear();
        }
    }
}

fn create_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("           {spinner} {msg}")
            .expect("static spinner template"),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}
