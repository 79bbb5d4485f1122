//! Workflow run progress UI.
//!
//! This module renders workflow events in the terminal while a run is live.
//! It supports multiple output modes:
//! - `full`: Rich terminal UI with per-agent progress bars and transcript
//! - `minimal`: Single-line status updates
//! - `json`: JSON-formatted events for machine consumption

use crate::stage::StageSpec;
use crate::transcript::Sender;
use crate::ui::icons::{BLOCKER, CHECK, CROSS, PERSON, ROBOT, SPARKLE};
use crate::workflow::WorkflowEvent;
use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Output mode for the workflow UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    /// Rich terminal UI with progress bars
    #[default]
    Full,
    /// Single-line status updates
    Minimal,
    /// JSON-formatted events
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "minimal" => Self::Minimal,
            _ => Self::Full,
        })
    }
}

impl UiMode {
    /// Parse UI mode from string (convenience method).
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Terminal UI for a workflow run, one progress bar per agent.
///
/// The header bar counts finished stages; each agent bar tracks that stage's
/// progress percentage. Chat messages and generation results are printed
/// through the `MultiProgress` so they interleave cleanly with the bars.
pub struct WorkflowUI {
    mode: UiMode,
    multi: MultiProgress,
    header_bar: ProgressBar,
    stage_bars: Mutex<HashMap<u32, ProgressBar>>,
    verbose: bool,
    term: Term,
    wrap_width: usize,
}

impl WorkflowUI {
    /// Create the UI with one bar per stage in the template.
    pub fn new(stages: &[StageSpec], mode: UiMode, verbose: bool) -> Self {
        let multi = MultiProgress::new();
        let term = Term::stdout();

        let header_style = ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let header_bar = multi.add(ProgressBar::new(stages.len() as u64));
        header_bar.set_style(header_style);
        header_bar.set_prefix("Agents");
        header_bar.set_message("Waiting...");

        let stage_style = ProgressStyle::default_bar()
            .template("  {prefix:.bold} [{bar:30.green/white}] {pos:>3}/100 {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓░");

        let mut bars = HashMap::new();
        for stage in stages {
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(stage_style.clone());
            bar.set_prefix(format!("[{}]", stage.name));
            bar.set_message("Idle");
            bars.insert(stage.id, bar);
        }

        let wrap_width = match terminal_size::terminal_size() {
            Some((terminal_size::Width(w), _)) => (w as usize).saturating_sub(4).clamp(40, 100),
            None => 80,
        };

        Self {
            mode,
            multi,
            header_bar,
            stage_bars: Mutex::new(bars),
            verbose,
            term,
            wrap_width,
        }
    }

    /// Handle a workflow event and update the UI accordingly.
    pub fn handle_event(&self, event: &WorkflowEvent) {
        match self.mode {
            UiMode::Json => self.handle_json(event),
            UiMode::Minimal => self.handle_minimal(event),
            UiMode::Full => self.handle_full(event),
        }
    }

    /// Handle event in JSON mode - just serialize and print.
    fn handle_json(&self, event: &WorkflowEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(&self.term, "{}", json);
        }
    }

    /// Handle event in minimal mode - single line updates.
    fn handle_minimal(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::StageCompleted { name, .. } => {
                let _ = writeln!(&self.term, "✓ {}", name);
            }
            WorkflowEvent::StageFailed { name, error, .. } => {
                let _ = writeln!(&self.term, "✗ {} ({})", name, error);
            }
            WorkflowEvent::FilesGenerated { count, .. } => {
                let _ = writeln!(&self.term, "{} files generated", count);
            }
            WorkflowEvent::RunFinished { success, .. } => {
                let _ = writeln!(&self.term, "Done: {}", if *success { "✓" } else { "✗" });
            }
            _ => {}
        }
    }

    /// Handle event in full mode - rich terminal UI.
    fn handle_full(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::RunStarted { .. } => {
                self.header_bar.set_message("Run in progress");
            }
            WorkflowEvent::Chat { message } => {
                let wrapped = textwrap::fill(
                    &plain_text(&message.text),
                    textwrap::Options::new(self.wrap_width).subsequent_indent("   "),
                );
                let line = match message.sender {
                    Sender::User => format!("{}{}", PERSON, style(wrapped).dim()),
                    Sender::Ai => format!("{}{}", ROBOT, wrapped),
                };
                self.print_line(line);
            }
            WorkflowEvent::Log { entry } => {
                if self.verbose {
                    self.print_line(format!(
                        "  {}",
                        style(format!("[{}] {}", entry.stage_name, entry.message)).dim()
                    ));
                }
            }
            WorkflowEvent::StageStarted { id, .. } => {
                if let Some(bar) = self.bars().get(id) {
                    bar.set_message("Working...");
                    bar.enable_steady_tick(Duration::from_millis(100));
                }
            }
            WorkflowEvent::StageProgress { id, progress } => {
                if let Some(bar) = self.bars().get(id) {
                    bar.set_position(*progress as u64);
                }
            }
            WorkflowEvent::StageCompleted { id, .. } => {
                if let Some(bar) = self.bars().get(id) {
                    bar.disable_steady_tick();
                    bar.set_position(100);
                    bar.finish_with_message(format!("{}Done", CHECK));
                }
                self.header_bar.inc(1);
            }
            WorkflowEvent::StageFailed { id, error, .. } => {
                if let Some(bar) = self.bars().get(id) {
                    bar.disable_steady_tick();
                    bar.abandon_with_message(format!("{}{}", CROSS, error));
                }
            }
            WorkflowEvent::StageBlocked { id, waiting_on } => {
                if let Some(bar) = self.bars().get(id) {
                    let waiting = waiting_on
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    bar.set_message(format!("{}Blocked (waiting on {})", BLOCKER, waiting));
                }
            }
            WorkflowEvent::StageUnblocked { id } => {
                if let Some(bar) = self.bars().get(id) {
                    bar.set_message("Idle");
                }
            }
            WorkflowEvent::FilesGenerated { count, entry_point } => {
                let entry = entry_point
                    .as_deref()
                    .map(|path| format!(" (entry point {})", path))
                    .unwrap_or_default();
                self.print_line(format!(
                    "{}Generated {} files{}",
                    SPARKLE,
                    style(count).green().bold(),
                    entry
                ));
            }
            WorkflowEvent::RunFinished { success, .. } => {
                if *success {
                    self.header_bar
                        .finish_with_message(format!("{}Workflow complete", CHECK));
                } else {
                    self.header_bar
                        .abandon_with_message(format!("{}Workflow failed", CROSS));
                }
            }
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the
    /// rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn bars(&self) -> std::sync::MutexGuard<'_, HashMap<u32, ProgressBar>> {
        self.stage_bars
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Strip the markdown emphasis the handoff texts carry.
fn plain_text(text: &str) -> String {
    text.replace("**", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::default_stages;
    use crate::transcript::ChatMessage;

    #[test]
    fn test_ui_mode_parse() {
        assert_eq!(UiMode::parse("json"), UiMode::Json);
        assert_eq!(UiMode::parse("MINIMAL"), UiMode::Minimal);
        assert_eq!(UiMode::parse("full"), UiMode::Full);
        assert_eq!(UiMode::parse("anything-else"), UiMode::Full);
    }

    #[test]
    fn test_plain_text_strips_emphasis() {
        assert_eq!(
            plain_text("The **Planner Agent** is done."),
            "The Planner Agent is done."
        );
    }

    #[test]
    fn test_handle_event_smoke() {
        let stages = default_stages();
        for mode in [UiMode::Full, UiMode::Minimal, UiMode::Json] {
            let ui = WorkflowUI::new(&stages, mode, true);
            ui.handle_event(&WorkflowEvent::StageStarted {
                id: 1,
                name: "Planner Agent".to_string(),
            });
            ui.handle_event(&WorkflowEvent::StageProgress {
                id: 1,
                progress: 50,
            });
            ui.handle_event(&WorkflowEvent::Chat {
                message: ChatMessage::ai("The **Planner Agent** has finished."),
            });
            ui.handle_event(&WorkflowEvent::StageCompleted {
                id: 1,
                name: "Planner Agent".to_string(),
            });
            ui.handle_event(&WorkflowEvent::RunFinished {
                run_id: uuid::Uuid::new_v4(),
                success: true,
            });
        }
    }
}
