mod app;
mod audio;
mod cli;
mod logging;

use anyhow::{Context, Result};
use app::{App, RunOutcome};
use clap::Parser;
use cli::Cli;
use numag_core::{DotCounts, Rgb};
use numag_experiment::participant::session_date;
use numag_experiment::{
    generate_dots, prompt_participant, CsvResultSink, ExperimentConfig, PromptOutcome,
    TrialList, TrialSequencer,
};
use numag_render::load_font;
use numag_timing::HighPrecisionTimer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::process::ExitCode;
use tracing::{error, info, Level};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            if tracing::dispatcher::has_been_set() {
                error!("{err:#}");
            } else {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(1)
        }
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn run(cli: &Cli) -> Result<RunOutcome> {
    let config = tracing::subscriber::with_default(logging::console(Level::WARN), || {
        ExperimentConfig::load_or_default(cli.config.as_deref())
    })
    .context("loading configuration")?;

    if cli.check {
        return check(cli, &config);
    }

    let date = session_date();
    let outcome = prompt_participant(
        &mut io::stdin().lock(),
        &mut io::stdout(),
        cli.participant_form(),
        &config.exp_name,
        &date,
    )
    .context("reading participant information")?;
    let participant = match outcome {
        PromptOutcome::Accepted(info) => info,
        PromptOutcome::Cancelled => {
            eprintln!("Participant entry cancelled");
            return Ok(RunOutcome::Aborted);
        }
    };

    let stem = participant.file_stem();
    logging::init(&cli.data_dir.join(format!("{stem}.log")), cli.log_level)?;
    info!(
        "Session {stem}: {} {} years, {}",
        participant.name, participant.age, participant.gender
    );
    if let Some(seed) = cli.seed {
        info!("Seeded run: {seed}");
    }

    let mut rng = seeded_rng(cli.seed);
    let trials = TrialList::build(&config, &cli.conditions, &mut rng);
    info!("{} trials from {} conditions", trials.len(), trials.templates().len());

    let font = cli.font.as_deref().map(load_font).transpose()?;
    let sink = CsvResultSink::create(&cli.data_dir, &participant)?;
    let session = TrialSequencer::new(
        config,
        participant,
        trials,
        HighPrecisionTimer::new(),
        rng,
        sink,
    );

    let outcome = App::new(session, font).run()?;
    info!("Session ended: {:?}", outcome);
    Ok(outcome)
}

/// Lays out `max_dots` on both sides, the densest trial the configuration
/// can produce, without opening a window.
fn check(cli: &Cli, config: &ExperimentConfig) -> Result<RunOutcome> {
    let counts = DotCounts {
        left: config.max_dots,
        right: config.max_dots,
    };
    let mut rng = seeded_rng(cli.seed);
    let dots = generate_dots(counts, (Rgb::WHITE, Rgb::WHITE), &config.geometry, &mut rng)
        .context("worst-case dot layout")?;
    println!(
        "{}: configuration ok, placed {} dots",
        config.exp_name,
        dots.len()
    );
    Ok(RunOutcome::Completed)
}
