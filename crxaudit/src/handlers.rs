use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use crxaudit_client::{
    ApiKey, CancellationToken, FileFailureLog, ReportClient, RetryPolicy, SharedFailureLog,
};
use crxaudit_core::catalog::load_catalog;
use crxaudit_core::export::{plan_batches, write_csv};
use crxaudit_core::{BatchCoordinator, NormalizedRecord, ProgressCallback, ScanSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Expand `~` and environment variables in a path argument.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

/// `--max-attempts 0` means keep retrying until the service answers.
pub fn retry_policy_from_args(args: &ArgMatches) -> RetryPolicy {
    let max_attempts = args.get_one::<u32>("max-attempts").copied();
    RetryPolicy::default().with_max_attempts(max_attempts)
}

pub fn open_failure_log(args: &ArgMatches) -> Result<SharedFailureLog> {
    let path = expand_path(string_arg(args, "log-file")?);
    let log = FileFailureLog::open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(Arc::new(log))
}

/// Build the service client from the shared connection flags.
pub fn build_client(args: &ArgMatches, failures: SharedFailureLog) -> Result<ReportClient> {
    let key_path = expand_path(string_arg(args, "api-key-file")?);
    let api_key = ApiKey::from_file(&key_path)?;
    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(30);
    let base_url = args
        .get_one::<Url>("base-url")
        .context("Missing --base-url")?;

    let client = ReportClient::with_timeout(api_key, timeout)?
        .with_base_url(base_url.as_str())?
        .with_retry_policy(retry_policy_from_args(args))
        .with_failure_log(failures);
    Ok(client)
}

fn string_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing --{}", name))
}

fn show_progress(args: &ArgMatches) -> bool {
    !args.get_flag("quiet") && !args.get_flag("no-progress")
}

fn progress_bar(total: usize, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {msg} {pos}/{len} ({eta})")
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message(label.to_string());
    bar
}

fn progress_callback(bar: &ProgressBar) -> ProgressCallback {
    let bar = bar.clone();
    Arc::new(move |completed: usize, _total: usize| bar.set_position(completed as u64))
}

fn print_header(args: &ArgMatches, title: &str, catalog: Option<(&Path, usize)>) {
    if args.get_flag("quiet") {
        return;
    }
    println!("{}", "═".repeat(60).bright_blue().bold());
    println!("{}", format!("  {}", title).bright_white().bold());
    println!("{}", "═".repeat(60).bright_blue().bold());
    if let Some((path, count)) = catalog {
        println!(
            "{} Catalog: {} ({} extensions)",
            "→".blue(),
            path.display().to_string().bright_white(),
            count
        );
    }
    if let Some(workers) = args.try_get_one::<usize>("workers").ok().flatten() {
        println!("{} Workers: {}", "→".blue(), workers);
    }
    println!();
}

pub async fn handle_submit(args: &ArgMatches, cancel: CancellationToken) -> Result<ScanSummary> {
    let catalog_path = args
        .get_one::<PathBuf>("catalog")
        .context("Missing --catalog")?;
    let catalog_path = expand_path(&catalog_path.to_string_lossy());
    let ids = load_catalog(&catalog_path)?;
    let workers = args.get_one::<usize>("workers").copied().unwrap_or(25);
    print_header(args, "SCAN SUBMISSION", Some((catalog_path.as_path(), ids.len())));

    let failures = open_failure_log(args)?;
    let client = build_client(args, failures.clone())?;
    let bar = progress_bar(ids.len(), "submitted", show_progress(args));
    let coordinator = BatchCoordinator::new(Arc::new(client), workers)
        .with_failure_log(failures)
        .with_cancellation(cancel)
        .with_progress_callback(progress_callback(&bar));

    let summary = coordinator.scan_all(ids).await?;
    bar.finish_and_clear();

    println!(
        "{} Submission Successes: {}",
        "✓".green().bold(),
        summary.accepted
    );
    println!(
        "{} Submission Failures: {}",
        "✗".red().bold(),
        summary.failures()
    );
    if summary.unreachable > 0 {
        println!(
            "  {} {} could not reach the service",
            "•".yellow(),
            summary.unreachable
        );
    }
    Ok(summary)
}

/// What a `fetch` run did with each batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

pub async fn handle_fetch(args: &ArgMatches, cancel: CancellationToken) -> Result<ExportSummary> {
    let catalog_path = args
        .get_one::<PathBuf>("catalog")
        .context("Missing --catalog")?;
    let catalog_path = expand_path(&catalog_path.to_string_lossy());
    let ids = load_catalog(&catalog_path)?;
    let workers = args.get_one::<usize>("workers").copied().unwrap_or(25);
    let batch_size = args.get_one::<usize>("batch-size").copied().unwrap_or(10_000);
    let output_dir = expand_path(string_arg(args, "output-dir")?);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    print_header(args, "REPORT EXPORT", Some((catalog_path.as_path(), ids.len())));

    let failures = open_failure_log(args)?;
    let service = Arc::new(build_client(args, failures.clone())?);
    let visible = show_progress(args);
    let mut summary = ExportSummary::default();

    for plan in plan_batches(ids.len(), batch_size, &output_dir) {
        let (start, end) = (plan.range.start, plan.range.end);
        if plan.is_done() {
            println!(
                "{} Skipping {}-{} because {} already exists...",
                "→".yellow(),
                start,
                end,
                plan.file_name()
            );
            summary.skipped.push(plan.output);
            continue;
        }

        let bar = progress_bar(end - start, &format!("{}-{}", start, end), visible);
        let coordinator = BatchCoordinator::new(service.clone(), workers)
            .with_failure_log(failures.clone())
            .with_cancellation(cancel.clone())
            .with_progress_callback(progress_callback(&bar))
            .with_submit_missing(args.get_flag("submit-missing"));
        let records = coordinator.fetch_all(ids[plan.range.clone()].to_vec()).await?;
        bar.finish_and_clear();

        // a cancelled batch is full of placeholders; leave it for the next run
        if cancel.is_cancelled() {
            bail!("Interrupted before {} was saved", plan.file_name());
        }

        write_csv(&plan.output, &records)?;
        info!("Wrote {} records to {}", records.len(), plan.output.display());
        println!(
            "{} {}-{}: Saved to {}",
            "✓".green().bold(),
            start,
            end,
            plan.output.display()
        );
        summary.written.push(plan.output);
    }

    println!(
        "\n{} Export complete: {} written, {} skipped",
        "✓".green().bold(),
        summary.written.len(),
        summary.skipped.len()
    );
    Ok(summary)
}

pub async fn handle_lookup(
    args: &ArgMatches,
    cancel: CancellationToken,
) -> Result<Vec<NormalizedRecord>> {
    let ids: Vec<String> = args
        .get_many::<String>("ID")
        .context("No extension ids given")?
        .cloned()
        .collect();

    let failures = open_failure_log(args)?;
    let client = build_client(args, failures.clone())?;
    let coordinator = BatchCoordinator::new(Arc::new(client), ids.len())
        .with_failure_log(failures)
        .with_cancellation(cancel)
        .with_submit_missing(args.get_flag("submit-missing"));

    let records = coordinator.fetch_all(ids).await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(records)
}
