//! Terminal progress bar for tile fetching.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use bingtiles::mosaic::FetchProgress;

const TEMPLATE: &str =
    "fetching tiles: {wide_bar:0.white/dim.white} {pos:>7}/{len:7} {per_sec:>12} {elapsed_precise}";

/// Draws tile progress on stderr.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("██▁");
        bar.set_style(style);
        Self { bar }
    }
}

impl FetchProgress for BarProgress {
    fn on_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn on_tile(&self, done: usize, _total: usize) {
        self.bar.set_position(done as u64);
    }

    fn on_finish(&self) {
        self.bar.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_tracks_tiles() {
        let progress = BarProgress::with_target(ProgressDrawTarget::hidden());
        progress.on_start(6);
        assert_eq!(progress.bar.length(), Some(6));
        progress.on_tile(4, 6);
        assert_eq!(progress.bar.position(), 4);
        progress.on_finish();
        assert!(progress.bar.is_finished());
    }

    #[test]
    fn test_template_is_valid() {
        assert!(ProgressStyle::with_template(TEMPLATE).is_ok());
    }
}
