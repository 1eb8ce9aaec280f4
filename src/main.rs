//! Droidloc - Batch translation of Android string resources
//!
//! Command-line front-end: loads a `strings.xml`, translates it into the
//! requested languages and merges the results into `values-<lang>/`.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use droidloc::cli::{Args, Commands};
use droidloc::config::Config;
use droidloc::error::DroidlocError;
use droidloc::job::{JobOutcome, TranslationResult};
use droidloc::language::LanguageTag;
use droidloc::orchestrator::{BatchTranslationOrchestrator, CancellationToken};
use droidloc::resource::{
    find_strings_files, is_strings_file, AndroidResLayout, AndroidXmlStore, ResourceStore,
};
use droidloc::session::{Session, TranslationListener};
use droidloc::translate::ProviderFactory;

const DEFAULT_CONFIG_FILE: &str = "droidloc.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    let _log_guard = setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Languages => {
            println!("{:<8} {:<10} {:<24}", "Code", "Android", "Language");
            println!("{}", "-".repeat(44));
            for tag in LanguageTag::ALL {
                println!("{:<8} {:<10} {:<24}", tag.code(), tag.android_qualifier(), tag.english_name());
            }
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(DroidlocError::Config(format!(
                    "{} already exists, pass --force to overwrite", output.display()
                )).into());
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Scan { dir } => {
            let files = find_strings_files(&dir);
            if files.is_empty() {
                println!("No source strings.xml found under {}", dir.display());
            }
            for file in files {
                println!("{}", display_path(&file).display());
            }
        }
        Commands::Inspect { input } => {
            let entries = AndroidXmlStore::new().load(&input).await?;
            let translatable = entries.iter().filter(|e| e.translatable).count();

            println!("{:<32} {:<13} {}", "Key", "Translatable", "Text");
            println!("{}", "-".repeat(80));
            for entry in &entries {
                println!(
                    "{:<32} {:<13} {}",
                    entry.key,
                    if entry.translatable { "yes" } else { "no" },
                    preview(&entry.text, 60)
                );
            }
            println!("\n{} entries, {} translatable", entries.len(), translatable);
        }
        Commands::Translate { input, target_langs, res_dir, source_lang, skip_check } => {
            if !is_strings_file(&input) {
                warn!("{} is not a values/strings.xml file; translating anyway", input.display());
            }
            if let Some(code) = source_lang {
                config.translate.source_language = code.parse()?;
            }

            let target_languages = LanguageTag::parse_list(&target_langs)?;
            let layout = match res_dir {
                Some(dir) => AndroidResLayout::new(dir),
                None => AndroidResLayout::from_source(&input)?,
            };

            let provider = ProviderFactory::create(config.translate.clone())?;
            let store: Arc<dyn ResourceStore> = Arc::new(AndroidXmlStore::new());
            let orchestrator = BatchTranslationOrchestrator::from_config(
                &config,
                provider,
                store.clone(),
                Arc::new(layout),
            );
            let session = Session::new(Arc::new(orchestrator), store)
                .with_availability_check(!skip_check);

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted; finishing languages already in progress");
                    interrupt.cancel();
                }
            });

            let listener = Arc::new(CliListener::new(target_languages.len()));
            session
                .translate_file(&input, target_languages, &cancel, listener.clone())
                .await;

            if listener.failed() {
                anyhow::bail!("translation of {} failed", input.display());
            }
        }
    }

    info!("Droidloc completed successfully");
    Ok(())
}

/// Progress bar and summary for a translate run
struct CliListener {
    progress: ProgressBar,
    failed: AtomicBool,
}

impl CliListener {
    fn new(languages: usize) -> Self {
        let progress = ProgressBar::new(languages as u64);
        progress.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self {
            progress,
            failed: AtomicBool::new(false),
        }
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

impl TranslationListener for CliListener {
    fn on_language_done(&self, result: &TranslationResult) {
        self.progress.set_message(result.language.to_string());
        self.progress.inc(1);
    }

    fn on_result(&self, outcome: &JobOutcome) {
        self.progress.finish_and_clear();

        println!("\nTranslation results:");
        for result in &outcome.results {
            match &result.error {
                None => println!(
                    "  ok     {:<6} {} ({} entries)",
                    result.language,
                    display_path(&result.destination).display(),
                    result.entries.len()
                ),
                Some(e) => println!(
                    "  failed {:<6} {} (after {} attempt(s))",
                    result.language, e, result.attempts
                ),
            }
        }

        let succeeded = outcome.succeeded().count();
        println!("\n{}/{} languages translated", succeeded, outcome.results.len());

        if outcome.is_total_failure() {
            self.failed.store(true, Ordering::SeqCst);
        } else if !outcome.is_complete_success() {
            warn!("{} languages failed", outcome.results.len() - succeeded);
        }
    }

    fn on_fatal_error(&self, error: &DroidlocError) {
        self.progress.abandon();
        match error {
            DroidlocError::NothingToTranslate => println!("strings.xml has no text to translate!"),
            other => eprintln!("Translate error: {}", other),
        }
        self.failed.store(true, Ordering::SeqCst);
    }
}

/// Path relative to the working directory when possible
fn display_path(path: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| pathdiff::diff_paths(path, cwd))
        .unwrap_or_else(|| path.to_path_buf())
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".droidloc").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "droidloc.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output stays on stderr so command output can be piped
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("droidloc.log").display());

    Ok(guard)
}
