//! Progress bars for pipeline phases

use indicatif::{ProgressBar, ProgressStyle};

use crate::metric::Phase;

const PHASE_TEMPLATE: &str = "{msg:>14} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} units";

/// Bar counting finished units of one phase; hidden when disabled or empty
pub fn phase_bar(phase: Phase, units: usize, enabled: bool) -> ProgressBar {
    if !enabled || units == 0 {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(units as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(PHASE_TEMPLATE) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message(phase.to_string());
    bar
}
