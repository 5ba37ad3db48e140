use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use console::style;
use crate::pipeline::ProcessEvent;

/// One spinner per stylesheet plus a status line, driven by `ProcessEvent`s.
pub struct ScanProgress {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    status_bar: ProgressBar,
    total: usize,
    completed: usize,
    failed_tasks: usize,
    start_time: std::time::Instant,
}

impl ScanProgress {
    pub fn new(total: usize, quiet: bool) -> Self {
        let multi = if quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };

        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(spinner_style("  {spinner:.cyan} {msg}"));
        status_bar.enable_steady_tick(Duration::from_millis(120));

        let progress = Self {
            multi,
            bars: HashMap::new(),
            status_bar,
            total,
            completed: 0,
            failed_tasks: 0,
            start_time: std::time::Instant::now(),
        };
        progress.update_status();
        progress
    }

    pub fn handle_event(&mut self, event: &ProcessEvent) {
        match event {
            ProcessEvent::ProcessStarted { stylesheet, mode } => {
                let bar = self.multi.insert_before(&self.status_bar, ProgressBar::new_spinner());
                bar.set_style(spinner_style("    {spinner:.yellow} {msg}"));
                bar.set_message(format!("{} ({})", short_name(stylesheet), mode));
                bar.enable_steady_tick(Duration::from_millis(100));
                self.bars.insert(stylesheet.clone(), bar);
            }
            ProcessEvent::StateChanged { stylesheet, display_name, .. } => {
                if let Some(bar) = self.bars.get(stylesheet) {
                    bar.set_message(format!("{}: {}", short_name(stylesheet), display_name));
                }
            }
            ProcessEvent::TaskFailed { .. } => {
                self.failed_tasks += 1;
                self.update_status();
            }
            ProcessEvent::FollowUpScheduled { stylesheet, open_tasks } => {
                if let Some(bar) = self.bars.get(stylesheet) {
                    bar.set_message(format!(
                        "{}: Checking for XSS ({} open)",
                        short_name(stylesheet),
                        open_tasks
                    ));
                }
            }
            ProcessEvent::ProcessCompleted { stylesheet, aborted, stats } => {
                self.completed += 1;
                if let Some(bar) = self.bars.remove(stylesheet) {
                    if *aborted {
                        bar.abandon_with_message(format!(
                            "{} {} aborted",
                            style("✗").red(),
                            short_name(stylesheet)
                        ));
                    } else {
                        bar.finish_with_message(format!(
                            "{} {} ({} tasks)",
                            style("✓").green(),
                            short_name(stylesheet),
                            stats.tasks_submitted
                        ));
                    }
                }
                self.update_status();
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    pub fn finish(&self) {
        for bar in self.bars.values() {
            bar.finish_and_clear();
        }
        self.status_bar.finish_with_message(format!(
            "Done: {}/{} stylesheets | {} failed tasks | {}",
            self.completed,
            self.total,
            self.failed_tasks,
            format_elapsed(self.start_time.elapsed().as_millis() as u64),
        ));
    }

    fn update_status(&self) {
        self.status_bar.set_message(format!(
            "{}/{} stylesheets | {} failed tasks | {}",
            self.completed,
            self.total,
            self.failed_tasks,
            format_elapsed(self.start_time.elapsed().as_millis() as u64),
        ));
    }

    /// Print a line through the multi-progress (won't interfere with bars).
    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }
}

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn short_name(stylesheet: &str) -> String {
    Path::new(stylesheet)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| stylesheet.to_string())
}

pub fn format_elapsed(ms: u64) -> String {
    let secs = ms / 1000;
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    if mins > 0 {
        format!("{}m{}s", mins, remaining_secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{DirectorStats, ProcessingMode};

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(4_500), "4s");
        assert_eq!(format_elapsed(125_000), "2m5s");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("/work/styles/page.xsl"), "page.xsl");
    }

    #[test]
    fn test_completion_counting() {
        let mut progress = ScanProgress::new(1, true);
        progress.handle_event(&ProcessEvent::ProcessStarted {
            stylesheet: "/a.xsl".into(),
            mode: ProcessingMode::Full,
        });
        assert!(!progress.is_complete());
        progress.handle_event(&ProcessEvent::ProcessCompleted {
            stylesheet: "/a.xsl".into(),
            aborted: false,
            stats: DirectorStats::default(),
        });
        assert!(progress.is_complete());
        progress.finish();
    }
}
