//! `--print` mode: load without a window and write the rows to stdout

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use gv_core::{AppCommand, AppState, Effect, LoadPhase, LoadSettings};
use gv_data::Loader;
use tracing::{debug, info};

/// Load `url` page by page until the file is complete or `max_pages` pages
/// were read, then print a summary and the rows.
pub async fn run<W: Write>(
    loader: &Arc<Loader>,
    settings: LoadSettings,
    url: String,
    max_pages: Option<usize>,
    out: &mut W,
) -> Result<()> {
    let mut state = AppState::new(settings);
    let mut queue: VecDeque<Effect> = state.dispatch(AppCommand::Open(url)).into();
    let mut pages = 0;

    loop {
        while let Some(effect) = queue.pop_front() {
            if matches!(effect, Effect::FetchPage { .. }) {
                pages += 1;
            }
            if let Some(event) = Arc::clone(loader).run_isolated(effect).await {
                queue.extend(state.apply(event));
            }
        }

        if state.phase() == LoadPhase::Failed {
            let message = state
                .status()
                .map(|s| s.text.clone())
                .unwrap_or_else(|| "load failed".to_owned());
            return Err(anyhow::anyhow!(message));
        }
        if state.is_complete() || max_pages.is_some_and(|max| pages >= max) {
            break;
        }
        queue.extend(state.dispatch(AppCommand::LoadMore));
        if queue.is_empty() {
            debug!("nothing left to request");
            break;
        }
    }

    info!(pages, rows = state.dataset().row_count(), "headless load finished");
    write_summary(&state, out)?;
    if !state.dataset().is_empty() {
        let table = pretty_format_batches(state.dataset().batches()).context("format rows")?;
        writeln!(out, "{table}")?;
    }
    Ok(())
}

fn write_summary<W: Write>(state: &AppState, out: &mut W) -> Result<()> {
    if let Some(file) = state.file() {
        writeln!(out, "url:        {}", file.url)?;
        writeln!(out, "size:       {} bytes", file.byte_length)?;
        writeln!(out, "row groups: {}", file.row_groups)?;
        match &file.geo {
            Some(geo) => writeln!(out, "geometry:   {}", geo.ordered_columns().join(", "))?,
            None => writeln!(out, "geometry:   none")?,
        }
    }
    let total = state
        .pagination()
        .total_rows()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_owned());
    writeln!(out, "rows:       {} of {}", state.dataset().row_count(), total)?;
    writeln!(out, "features:   {}", state.features().len())?;
    if let Some(status) = state.status() {
        writeln!(out, "status:     {}", status.text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_an_empty_state() {
        let state = AppState::default();
        let mut out = Vec::new();
        write_summary(&state, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("rows:       0 of ?"));
        assert!(text.contains("features:   0"));
        assert!(!text.contains("url:"));
    }
}
