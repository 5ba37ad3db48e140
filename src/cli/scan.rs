use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use console::style;
use tokio::sync::mpsc;
use crate::analysis::{DocumentAnalyzer, RuleRegistry};
use crate::cli::commands::ScanArgs;
use crate::cli::progress::ScanProgress;
use crate::config::{self, ProbeConfig, RunSettings};
use crate::errors::XsltProbeError;
use crate::generator::{DocumentGenerator, SequentialPrefixSelector, ValueGeneratorFactory};
use crate::models::StylesheetRef;
use crate::pipeline::{ProcessDirectorManager, ProcessEvent, ProcessingMode};
use crate::pool::{TokioWorkerPool, WorkerPool};
use crate::reporting::ReportWriter;
use crate::schema::SchemaRepository;
use crate::tasks::PipelineTaskFactory;
use crate::xslt::ProcessXsltExecutor;
use tracing::{info, warn};

pub async fn handle_scan(args: ScanArgs, quiet: bool) -> Result<(), XsltProbeError> {
    let mode: ProcessingMode = args.mode.parse().map_err(XsltProbeError::Config)?;

    let file_config = match &args.config {
        Some(path) => config::parse_config(&PathBuf::from(path)).await?,
        None => ProbeConfig::default(),
    };
    let settings = build_run_settings(&args, &file_config);

    let files = expand_patterns(&args.files)?;
    info!(files = files.len(), mode = %mode, "Starting scan");

    let rules = if settings.rules.is_empty() {
        RuleRegistry::all()
    } else {
        RuleRegistry::from_ids(&settings.rules)?
    };
    let analyzer = Arc::new(DocumentAnalyzer::new(rules)?);

    let executor = ProcessXsltExecutor::new(settings.processor.clone())?
        .with_timeout(settings.transform_timeout);
    let prefixes = Arc::new(SequentialPrefixSelector::new("xp", settings.value_length));
    let mut values = ValueGeneratorFactory::new(prefixes, settings.generator.clone());
    if let Some(seed) = settings.seed {
        values = values.with_seed(seed);
    }
    let writer = ReportWriter::new(&settings.output_dir);

    let factory = Arc::new(
        PipelineTaskFactory::new(
            Arc::new(SchemaRepository::new(settings.schema_dir.clone())),
            Arc::new(executor),
            analyzer,
            DocumentGenerator::new(values),
        )
        .with_max_depth(settings.max_depth)
        .with_report_writer(writer.clone()),
    );
    let pool = Arc::new(TokioWorkerPool::new(settings.worker_threads)?);

    let (tx, rx) = mpsc::unbounded_channel();
    let manager = ProcessDirectorManager::new(
        Arc::clone(&pool) as Arc<dyn WorkerPool>,
        Arc::clone(&factory) as Arc<dyn crate::tasks::TaskFactory>,
        settings.director.clone(),
    )
    .with_event_channel(tx);

    let progress = tokio::spawn(run_progress(rx, files.len(), quiet));

    let mut directors = Vec::new();
    for file in &files {
        directors.push(manager.start_process(file.clone(), mode)?);
    }
    manager.await_completion().await;
    pool.shutdown();
    drop(manager);

    if tokio::time::timeout(Duration::from_secs(2), progress).await.is_err() {
        warn!("Progress display did not finish");
    }

    let mut aborted = Vec::new();
    let mut total_findings = 0;
    println!();
    for director in &directors {
        let stylesheet = director.stylesheet();
        let stats = director.stats();
        if stats.aborted {
            aborted.push(stylesheet.uri());
            println!("  {} {}  aborted", style("✗").red(), stylesheet);
            continue;
        }
        match factory.session(stylesheet).and_then(|s| s.report()) {
            Some(report) => {
                let findings = report.finding_count();
                total_findings += findings;
                let marker = if findings > 0 { style("!").red().bold() } else { style("✓").green() };
                println!(
                    "  {} {}  {} findings  {}",
                    marker,
                    stylesheet,
                    findings,
                    style(writer.report_dir(stylesheet).display()).dim()
                );
            }
            None => println!("  {} {}  {}", style("•").cyan(), stylesheet, mode),
        }
    }
    println!(
        "\n  {} stylesheets, {} findings",
        style(directors.len()).bold(),
        style(total_findings).bold()
    );

    if !aborted.is_empty() {
        return Err(XsltProbeError::Aborted(aborted.join(", ")));
    }
    Ok(())
}

async fn run_progress(mut rx: mpsc::UnboundedReceiver<ProcessEvent>, total: usize, quiet: bool) {
    let mut progress = ScanProgress::new(total, quiet);
    while !progress.is_complete() {
        match rx.recv().await {
            Some(event) => progress.handle_event(&event),
            None => break,
        }
    }
    progress.finish();
}

/// Config file values overridden by command-line flags.
pub fn build_run_settings(args: &ScanArgs, file_config: &ProbeConfig) -> RunSettings {
    let mut settings = RunSettings::from_config(file_config);
    if let Some(output) = &args.output {
        settings.output_dir = PathBuf::from(output);
    }
    if let Some(rules) = &args.rules {
        settings.rules = rules
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
    }
    if let Some(dir) = &args.schema_dir {
        settings.schema_dir = Some(PathBuf::from(dir));
    }
    if let Some(workers) = args.workers {
        settings.worker_threads = workers.max(1);
    }
    if args.seed.is_some() {
        settings.seed = args.seed;
    }
    settings
}

/// Expand glob patterns into distinct stylesheet paths, in argument order.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<StylesheetRef>, XsltProbeError> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for pattern in patterns {
        let matches: Vec<PathBuf> = if pattern.contains(['*', '?', '[']) {
            let paths = glob::glob(pattern)
                .map_err(|e| XsltProbeError::Config(format!("Invalid pattern '{}': {}", pattern, e)))?;
            let mut found: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_file()).collect();
            found.sort();
            found
        } else {
            vec![PathBuf::from(pattern)]
        };
        if matches.is_empty() {
            warn!(pattern = %pattern, "Pattern matched no files");
        }
        for path in matches {
            if seen.insert(path.clone()) {
                files.push(StylesheetRef::new(path));
            }
        }
    }
    if files.is_empty() {
        return Err(XsltProbeError::Config("No stylesheets to scan".into()));
    }
    Ok(files)
}
