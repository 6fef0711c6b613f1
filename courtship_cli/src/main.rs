use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;

use libcourtship::config::Config;
use libcourtship::plot::show;
use libcourtship::process::{process, Pipeline};
use libcourtship::worker_status::WorkerStatus;

const LOG_FILE_NAME: &str = "courtship_analysis.log";

fn make_template_config(path: &Path) {
    match Config::default().write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not write template config: {e}"),
    }
}

fn pipeline_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("path")
                .required(true)
                .help("Path to the data directory (or manifest, for arena)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to a configuration yaml file"),
        )
        .arg(
            Arg::new("only-plot")
                .long("only-plot")
                .action(ArgAction::SetTrue)
                .help("Redraw the plots from the saved snapshot"),
        )
        .arg(
            Arg::new("show")
                .long("show")
                .action(ArgAction::SetTrue)
                .help("Open the plots once they are written"),
        )
}

fn load_config(matches: &ArgMatches) -> Option<Config> {
    match matches.get_one::<String>("config") {
        Some(path) => {
            log::info!("Loading config from {path}...");
            match Config::read_config_file(Path::new(path)) {
                Ok(c) => {
                    log::info!("Config successfully loaded.");
                    Some(c)
                }
                Err(e) => {
                    log::error!("{e}");
                    None
                }
            }
        }
        None => {
            log::info!("No config given, using the defaults.");
            Some(Config::default())
        }
    }
}

fn main() -> ExitCode {
    // Create a cli
    let matches = Command::new("courtship_cli")
        .about("Analysis of fly courtship and optogenetic activation assays")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("new")
                .about("Make a template configuration yaml file")
                .arg(Arg::new("path").required(true).help("Path to the new file")),
        )
        .subcommand(pipeline_command(
            "courtship",
            "Wing extension and distance to target of a 10 minute courtship experiment",
        ))
        .subcommand(pipeline_command(
            "scored",
            "Proboscis, wing and jump scores joined onto recorded logs",
        ))
        .subcommand(pipeline_command(
            "arena",
            "Trajectories, time in area and latency of recorded logs",
        ))
        .get_matches();

    // Initialize feedback
    let logger = simplelog::CombinedLogger::new(vec![
        simplelog::TermLogger::new(
            simplelog::LevelFilter::Info,
            simplelog::Config::default(),
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        ),
        simplelog::WriteLogger::new(
            simplelog::LevelFilter::Info,
            simplelog::Config::default(),
            File::create(LOG_FILE_NAME).expect("Could not create the log file!"),
        ),
    ]);

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");
    log::set_max_level(log::LevelFilter::Info);

    let (pipeline, sub_matches) = match matches.subcommand() {
        Some(("new", sub)) => {
            let path = PathBuf::from(sub.get_one::<String>("path").expect("We require args"));
            log::info!("Making a template config at {}...", path.to_string_lossy());
            make_template_config(&path);
            return ExitCode::SUCCESS;
        }
        Some(("courtship", sub)) => (Pipeline::Courtship, sub),
        Some(("scored", sub)) => (Pipeline::Scored, sub),
        Some(("arena", sub)) => (Pipeline::Arena, sub),
        _ => return ExitCode::FAILURE,
    };

    let data_path = PathBuf::from(
        sub_matches
            .get_one::<String>("path")
            .expect("We require args"),
    );
    let only_plot = sub_matches.get_flag("only-plot");
    let show_plots = sub_matches.get_flag("show");

    // Load our config
    let config = match load_config(sub_matches) {
        Some(c) => c,
        None => return ExitCode::FAILURE,
    };
    log::info!("Data Path: {}", data_path.to_string_lossy());
    log::info!(
        "Conditions: {} / {} / {}",
        config.exp_genotype,
        config.exp2_genotype,
        config.ctrl_genotype
    );
    log::info!("Bin Width: {} s", config.bin_width);
    log::info!("Number of Workers: {}", config.n_threads);
    log::info!("Only Plot: {only_plot}");

    // Setup one progress bar per worker
    let style = ProgressStyle::with_template("Worker {prefix} [{bar:40.cyan/blue}] {pos}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let bars: Vec<ProgressBar> = (0..config.n_threads.max(1))
        .map(|id| {
            let pb = pb_manager.add(ProgressBar::new(100));
            pb.set_style(style.clone());
            pb.set_prefix(id.to_string());
            pb
        })
        .collect();

    // Spawn the task!
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let handle = std::thread::spawn(move || process(config, pipeline, data_path, only_plot, tx));

    // The channel closes once the task is done with it
    for status in rx.iter() {
        if let Some(pb) = bars.get(status.worker_id) {
            pb.set_position((status.progress * 100.0) as u64);
            pb.set_message(status.last_file);
        }
    }
    for pb in bars.iter() {
        pb.finish();
    }

    let written = match handle.join() {
        Ok(Ok(written)) => written,
        Ok(Err(e)) => {
            log::error!("Analysis failed with error: {e}");
            log::error!("See {LOG_FILE_NAME} for details.");
            return ExitCode::FAILURE;
        }
        Err(_) => {
            log::error!("Failed to join the analysis task!");
            return ExitCode::FAILURE;
        }
    };
    for path in written.iter() {
        log::info!("Plot: {}", path.to_string_lossy());
    }

    if show_plots {
        if let Err(e) = show(&written) {
            log::error!("Could not open the plots: {e}");
        }
    }

    log::info!("Done.");
    ExitCode::SUCCESS
}
