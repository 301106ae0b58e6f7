//! GeoParquet viewer entry point

mod app;
mod headless;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use eframe::egui;
use gv_data::{Loader, ViewerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::ViewerApp;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1))?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&options)?;
    let url = options
        .url
        .clone()
        .unwrap_or_else(|| config.default_url.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("gv-loader")
        .build()
        .context("start async runtime")?;
    let loader = Arc::new(Loader::new(&config).context("build HTTP client")?);

    if options.print {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        return runtime.block_on(headless::run(
            &loader,
            config.load_settings(),
            url,
            options.max_pages,
            &mut out,
        ));
    }

    info!(%url, "starting GeoParquet viewer");
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        default_theme: eframe::Theme::Dark,
        persist_window: false,
        ..Default::default()
    };

    eframe::run_native(
        "GeoParquet Viewer",
        native_options,
        Box::new(move |cc| Box::new(ViewerApp::new(cc, &config, runtime, loader, url))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run viewer: {e}"))
}

/// Read the config file, if any, and apply the command-line overrides
fn load_config(options: &CliOptions) -> Result<ViewerConfig> {
    let mut config = match &options.config_path {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if let Some(page_size) = options.page_size {
        config.page_size = page_size;
    }
    Ok(config)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliOptions {
    url: Option<String>,
    config_path: Option<PathBuf>,
    page_size: Option<usize>,
    print: bool,
    max_pages: Option<usize>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions::default();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--url" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--url requires a value"))?;
                set_url(&mut options, value.as_ref())?;
            }
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = Some(PathBuf::from(value.as_ref()));
            }
            "--page-size" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--page-size requires a number"))?;
                options.page_size = Some(parse_count("--page-size", value.as_ref())?);
            }
            "--max-pages" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--max-pages requires a number"))?;
                let pages = parse_count("--max-pages", value.as_ref())?;
                if pages == 0 {
                    return Err(anyhow::anyhow!("--max-pages must be at least 1"));
                }
                options.max_pages = Some(pages);
            }
            "--print" => {
                options.print = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown if unknown.starts_with('-') => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
            url => set_url(&mut options, url)?,
        }
    }

    Ok(options)
}

fn set_url(options: &mut CliOptions, url: &str) -> Result<()> {
    if options.url.is_some() {
        return Err(anyhow::anyhow!("only one URL may be given"));
    }
    options.url = Some(url.to_owned());
    Ok(())
}

fn parse_count(flag: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("{flag} expects a non-negative integer, got {value:?}"))
}

fn print_help() {
    println!("geoparquet-viewer [URL]");
    println!("  --url <url>          GeoParquet file to open (default: bundled sample)");
    println!("  --config <path>      Read settings from a JSON file");
    println!("  --page-size <n>      Rows per page; 0 loads everything at once");
    println!("  --print              Load without a window and print the rows");
    println!("  --max-pages <n>      Stop --print after n pages");
    println!("  --help               Show this help");
}

#[cfg(test)]
mod tests {
    use super::{load_config, parse_cli_args, CliOptions};
    use anyhow::Result;
    use std::path::PathBuf;

    #[test]
    fn parse_cli_args_defaults_to_nothing() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new())?;
        assert_eq!(options, CliOptions::default());
        Ok(())
    }

    #[test]
    fn parse_cli_args_accepts_positional_and_flag_url() -> Result<()> {
        let positional = parse_cli_args(["https://host/a.parquet"])?;
        assert_eq!(positional.url.as_deref(), Some("https://host/a.parquet"));

        let flag = parse_cli_args(["--url", "https://host/b.parquet"])?;
        assert_eq!(flag.url.as_deref(), Some("https://host/b.parquet"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_rejects_two_urls() {
        let error = parse_cli_args(["https://host/a.parquet", "--url", "https://host/b.parquet"])
            .expect_err("second URL should fail");
        assert!(error.to_string().contains("only one URL"));
    }

    #[test]
    fn parse_cli_args_sets_print_mode() -> Result<()> {
        let options = parse_cli_args([
            "--print",
            "--max-pages",
            "3",
            "--page-size",
            "50",
            "--config",
            "/tmp/viewer.json",
        ])?;
        assert!(options.print);
        assert_eq!(options.max_pages, Some(3));
        assert_eq!(options.page_size, Some(50));
        assert_eq!(options.config_path, Some(PathBuf::from("/tmp/viewer.json")));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_bad_values() {
        assert!(parse_cli_args(["--page-size"]).is_err());
        assert!(parse_cli_args(["--page-size", "many"]).is_err());
        assert!(parse_cli_args(["--max-pages", "0"]).is_err());
        let error = parse_cli_args(["--bogus"]).expect_err("unknown flag should fail");
        assert!(error.to_string().contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        assert!(parse_cli_args(["--help"])?.show_help);
        assert!(parse_cli_args(["-h"])?.show_help);
        Ok(())
    }

    #[test]
    fn page_size_flag_overrides_config() -> Result<()> {
        let options = parse_cli_args(["--page-size", "0"])?;
        let config = load_config(&options)?;
        assert_eq!(config.page_size, 0);
        Ok(())
    }
}
