use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Parser};
use peeper_board::{
    BoardConfig, BoardError, DailyReport, PeeperBoardBuilder, ReportMode, ReportRequest,
    calculate_ranking, report_fingerprint_sha256,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "peeper_board", about = "Render a daily judge leaderboard report", version)]
#[command(group(ArgGroup::new("mode").required(true).args(["full", "now"])))]
struct Cli {
    /// Report on yesterday from its frozen snapshot.
    #[arg(long)]
    full: bool,
    /// Report on today so far.
    #[arg(long)]
    now: bool,
    /// Verdict alias for `--now` reports (AC, WA, TLE, MLE, OLE, RE, CE, SE).
    #[arg(long = "verdict", default_value = "AC", value_parser = ReportMode::now_for_alias)]
    now_mode: ReportMode,
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    #[arg(long)]
    output: PathBuf,
    /// Defaults to today in local time.
    #[arg(long)]
    date: Option<NaiveDate>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<(), BoardError> {
    let config = BoardConfig::load(&cli.config)?;
    let store = config.snapshot_store();
    let today = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let yesterday = today.pred_opt().ok_or_else(|| {
        BoardError::InvalidConfiguration(format!("no day before {today}"))
    })?;

    let frozen = store.load(yesterday)?;
    match &frozen {
        Some(snapshot) => info!(
            date = %yesterday,
            persisted_at = snapshot.persisted_at,
            submissions = snapshot.report.submissions.len(),
            "loaded frozen snapshot"
        ),
        None => warn!(date = %yesterday, path = %store.path_for(yesterday).display(), "no frozen snapshot"),
    }

    let request = if cli.full {
        ReportRequest::full(today, frozen)
    } else {
        let live = store.load(today)?.map(|s| s.report).unwrap_or_else(|| {
            warn!(date = %today, "no submissions captured today");
            DailyReport::default()
        });
        if let Some(base) = &frozen {
            let rankings = calculate_ranking(base, &live.submissions);
            let recomputed = DailyReport::new(live.submissions.clone(), rankings);
            let path = store.save(today, &recomputed)?;
            info!(
                path = %path.display(),
                fingerprint = %report_fingerprint_sha256(&recomputed)?,
                "saved live snapshot"
            );
        }
        ReportRequest::now(cli.now_mode.verdict(), today, frozen, live.submissions)
    };

    let board = PeeperBoardBuilder::from_config(&config).build()?;
    let rendered = board.render(&request)?;
    std::fs::write(&cli.output, &rendered.png)?;
    info!(
        output = %cli.output.display(),
        width = rendered.width,
        height = rendered.height,
        "wrote report"
    );
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
