//! Terminal output of `jobtrack`: a spinner that follows an instance and
//! coloured summaries.
//!
//! [`InstanceProgress`] watches the snapshot channel of a running instance
//! and reprints whenever its phase or status moves.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::watch;

use jobtrack::ApplicationStatus;
use jobtrack::host::InstanceListing;
use jobtrack::workflow::{InstanceSnapshot, RunSummary};

pub struct InstanceProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl InstanceProgress {
    /// Starts the spinner with a short description of the application.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("GENERATING: {description}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Mirrors snapshot changes until the instance reaches a terminal phase
    /// or the channel closes.
    pub async fn follow(&self, mut snapshots: watch::Receiver<InstanceSnapshot>) {
        let mut last = snapshots.borrow_and_update().clone();
        self.show(&last);
        loop {
            if last.phase.is_terminal() || snapshots.changed().await.is_err() {
                break;
            }
            let next = snapshots.borrow_and_update().clone();
            if next.state.status != last.state.status {
                self.pb.println(format!(
                    "  {} {} -> {}",
                    self.yellow.apply_to("↻"),
                    last.state.status,
                    next.state.status
                ));
            }
            if next.state.content_ready() && !last.state.content_ready() {
                self.pb
                    .println(format!("  {} cover letter ready", self.green.apply_to("✓")));
            }
            self.show(&next);
            last = next;
        }
    }

    fn show(&self, snapshot: &InstanceSnapshot) {
        self.pb.set_message(format!(
            "{} {}",
            snapshot.phase,
            self.dim.apply_to(format!(
                "(status {}, updates {})",
                snapshot.state.status, snapshot.state.update_count
            ))
        ));
    }

    /// Stops the spinner and prints the final outcome.
    pub fn complete(&self, outcome: &Result<RunSummary, String>) {
        self.pb.finish_and_clear();
        match outcome {
            Ok(summary) => {
                let style = status_style(summary.final_status, &self.green, &self.yellow);
                println!(
                    "  {} Finished as {}",
                    self.green.apply_to("✓"),
                    style.apply_to(summary.final_status)
                );
            }
            Err(reason) => {
                println!("  {} Instance failed: {reason}", self.red.apply_to("✗"));
            }
        }
    }
}

fn status_style<'a>(status: ApplicationStatus, decided: &'a Style, open: &'a Style) -> &'a Style {
    if status.is_decision() { decided } else { open }
}

/// Prints any serializable value as a titled block of pretty JSON.
pub fn print_json<T: Serialize>(title: &str, value: &T) {
    println!();
    println!("{}", Style::new().cyan().bold().apply_to(format!("─── {title} ───")));
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// One line per tracked application.
pub fn print_listing(rows: &[InstanceListing]) {
    if rows.is_empty() {
        println!("No applications tracked yet. Run `jobtrack run --file <submission>` first.");
        return;
    }
    let bold = Style::new().bold();
    for row in rows {
        println!(
            "{}  {:<18} {:<14} updates={} reminder={}",
            bold.apply_to(&row.application_id),
            row.phase.to_string(),
            row.view.status.to_string(),
            row.view.update_count,
            row.view.reminder_sent
        );
    }
}
