//! Nightcore CLI - create slowed and nightcore versions of a track and
//! upload them to YouTube.
//!
//! Exit codes: 0 on success, 2 for invalid input detected before any stage
//! starts, 1 when a stage fails.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use directories::ProjectDirs;

use nightcore_core::browser::WebDriverLauncher;
use nightcore_core::config::ConfigManager;
use nightcore_core::encode::FfmpegEncoder;
use nightcore_core::generator::{GeneratorConfig, VariantGenerator};
use nightcore_core::logging::{init_tracing, RunLogger};
use nightcore_core::models::{
    parse_param_list, AspectRatio, Preset, PublishLimit, Stage, StageSelection, MAX_RAW_VALUE,
};
use nightcore_core::muxer::VideoMuxer;
use nightcore_core::orchestrator::{create_standard_pipeline, Context, RunState};
use nightcore_core::publisher::{PublishConfig, Publisher};
use nightcore_core::upload::YouTubeConnector;
use nightcore_core::workdir::WorkingDirectory;

const USAGE_ERROR: u8 = 2;

/// Create slowed and nightcore versions of a track and upload them to YouTube.
#[derive(Parser, Debug)]
#[command(name = "nightcore", version, about, long_about = None)]
struct Cli {
    /// Directory where the track and its cover art are located
    #[arg(value_name = "WORKING_DIRECTORY")]
    working_directory: PathBuf,

    /// Speed and reverb parameters of the final tracks: `<speed> [reverb]`...
    #[arg(
        value_name = "SPEED [REVERB]",
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_RAW_VALUE))
    )]
    values: Vec<u32>,

    /// Select pipeline steps using an inclusive range
    #[arg(long, default_value = "1:3", value_name = "START:END")]
    steps: StageSelection,

    /// Select a specific pipeline step (overrides --steps)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=3))]
    step: Option<u8>,

    /// Run the generate step with a visible browser window
    #[arg(short = 'g', long, alias = "gui")]
    interactive: bool,

    /// ffmpeg preset for the render step [default: from settings]
    #[arg(short, long)]
    preset: Option<Preset>,

    /// Video ratio as `width:height`, between 16:9 and 32:9 [default: from settings]
    #[arg(short, long, value_name = "W:H")]
    ratio: Option<AspectRatio>,

    /// Upload a subset of videos: N > 0 the first N, N < 0 the last |N|
    #[arg(short = 'u', long, allow_negative_numbers = true, value_name = "N")]
    uploaded_video_count: Option<i64>,

    /// Directory holding settings.toml and credentials
    #[arg(long, env = "NIGHTCORE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn config_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &cli.config_dir {
        return Ok(dir.clone());
    }
    ProjectDirs::from("", "", "nightcore")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("could not determine a configuration directory; pass --config-dir")
}

fn usage_error(message: impl std::fmt::Display) -> ExitCode {
    tracing::error!("{}", message);
    ExitCode::from(USAGE_ERROR)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = ConfigManager::in_dir(config_dir(&cli)?);
    config
        .load_or_create()
        .with_context(|| format!("loading {}", config.path().display()))?;
    let settings = config.settings().clone();

    init_tracing(settings.logging.level);
    tracing::debug!(
        "nightcore {} with settings from {}",
        nightcore_core::version(),
        config.path().display()
    );

    let selection = match cli.step {
        Some(number) => match StageSelection::single(number) {
            Ok(selection) => selection,
            Err(e) => return Ok(usage_error(e)),
        },
        None => cli.steps,
    };

    // Values only matter to the generate step
    let params = if selection.contains(Stage::Generate) {
        match parse_param_list(&cli.values) {
            Ok(params) => params,
            Err(e) => {
                return Ok(usage_error(format!(
                    "Invalid value for `speeds-and-reverbs`: {}",
                    e
                )))
            }
        }
    } else {
        Vec::new()
    };

    let ratio = match cli.ratio {
        Some(ratio) => ratio,
        None => match settings.render.default_ratio.parse::<AspectRatio>() {
            Ok(ratio) => ratio,
            Err(e) => return Ok(usage_error(e)),
        },
    };
    let preset = cli.preset.unwrap_or(settings.render.default_preset);

    let workdir = match WorkingDirectory::open(&cli.working_directory) {
        Ok(workdir) => workdir,
        Err(e) => return Ok(usage_error(e)),
    };
    let track_stem = match workdir.track_stem() {
        Ok(stem) => stem,
        Err(e) => return Ok(usage_error(e)),
    };

    let logger = RunLogger::new(
        &track_stem,
        config.logs_folder(),
        settings.logging.to_log_config(),
    )
    .context("creating run log")?
    .shared();

    let ctx = match Context::new(workdir, settings.clone(), Arc::clone(&logger)) {
        Ok(ctx) => ctx
            .with_params(params)
            .with_preset(preset)
            .with_ratio(ratio)
            .with_limit(cli.uploaded_video_count.map(PublishLimit::new)),
        Err(e) => {
            logger.error(&e.to_string());
            return Ok(ExitCode::from(USAGE_ERROR));
        }
    };

    logger.info(&format!("Detected track: '{}'", ctx.track_stem));
    logger.info(&format!("Detected metadata: {}", ctx.metadata.describe()));

    let launcher = WebDriverLauncher::new(
        settings.generator.webdriver_url.clone(),
        settings.generator.browser.clone(),
    )
    .context("creating WebDriver client")?;
    let generator = VariantGenerator::new(
        Arc::new(launcher),
        GeneratorConfig::from_settings(&settings.generator, cli.interactive),
    );
    let muxer = VideoMuxer::new(Arc::new(FfmpegEncoder::from_settings(&settings.render)));
    let connector = YouTubeConnector::from_config(&config).context("creating YouTube client")?;
    let publisher = Publisher::new(
        Arc::new(connector),
        PublishConfig::from_settings(&settings.publish),
    );

    let pipeline = create_standard_pipeline(generator, muxer, publisher);
    let mut state = RunState::new(&ctx.track_stem);

    let code = match pipeline.run(&ctx, &mut state, selection).await {
        Ok(result) => {
            if !result.all_completed() {
                logger.warn(&format!("Skipped steps: {}", result.steps_skipped.join(", ")));
            }
            tracing::debug!(completed = ?result.steps_completed, "Run finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            logger.error(&e.to_string());
            if let Some(path) = logger.log_path() {
                logger.info(&format!("Log written to {}", path.display()));
            }
            ExitCode::from(e.exit_code())
        }
    };
    tracing::debug!(state = ?state, "Run state");
    logger.close();

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_values_and_options() {
        let cli = Cli::try_parse_from([
            "nightcore", "/work", "120", "5", "80", "--steps", "1:2", "-p", "slow", "-r", "21:9",
            "-u", "-2",
        ])
        .unwrap();

        assert_eq!(cli.values, vec![120, 5, 80]);
        assert_eq!(cli.steps, "1:2".parse::<StageSelection>().unwrap());
        assert_eq!(cli.preset, Some(Preset::Slow));
        assert_eq!(cli.ratio, Some(AspectRatio { width: 21, height: 9 }));
        assert_eq!(cli.uploaded_video_count, Some(-2));
    }

    #[test]
    fn rejects_values_above_range() {
        assert!(Cli::try_parse_from(["nightcore", "/work", "201"]).is_err());
        assert!(Cli::try_parse_from(["nightcore", "/work", "--step", "4"]).is_err());
        assert!(Cli::try_parse_from(["nightcore", "/work", "--steps", "3:1"]).is_err());
        assert!(Cli::try_parse_from(["nightcore", "/work", "-r", "4:3"]).is_err());
    }
}
