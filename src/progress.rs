use std::sync::{Arc, Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressStyle};

use crate::downloader::ProgressFn;

const TEMPLATE: &str = "{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})";

/// Returns the default progress function, which draws an `indicatif` bar on
/// stderr and clears it once the download completes.
pub fn default_progress_fn() -> ProgressFn {
    let bar: Mutex<Option<ProgressBar>> = Mutex::new(None);
    Arc::new(move |src: &str, current: u64, total: u64, _mib_per_sec: f64, complete: bool| {
        let mut slot = bar.lock().unwrap_or_else(PoisonError::into_inner);
        let pb = slot.get_or_insert_with(|| new_bar(src, total));
        pb.set_position(current);
        if complete {
            pb.finish_and_clear();
            *slot = None;
        }
    })
}

fn new_bar(src: &str, total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    let name = src.rsplit('/').next().unwrap_or(src).to_owned();
    pb.set_message(format!("downloading {name}"));
    pb
}
