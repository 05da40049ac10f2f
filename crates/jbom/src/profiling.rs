//! Chrome trace output for `--profile <path>`.
//!
//! The trace opens in `chrome://tracing` or https://ui.perfetto.dev/ and shows
//! the `resolve_project`, `load_project`, `load_inventories` and
//! `match_components` spans.

use std::path::PathBuf;
use tracing_subscriber::prelude::*;

/// Flushes the trace file when dropped.
pub struct ProfileGuard {
    _guard: tracing_chrome::FlushGuard,
}

/// Start recording spans to `output_path`; `None` disables profiling.
pub fn init(output_path: Option<PathBuf>) -> Option<ProfileGuard> {
    let output_path = output_path?;

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file(output_path)
        .include_args(true)
        .build();

    // try_init: a subscriber may already be installed
    let _ = tracing_subscriber::registry().with(chrome_layer).try_init();

    Some(ProfileGuard { _guard: guard })
}
