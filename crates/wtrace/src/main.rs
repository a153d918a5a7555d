use std::{fs::File, process::ExitCode};

use clap::Parser;
use tracing::{error, info, Level};
use wiretrace::{
    analyzer::Analyzer, config::Config, error::Error, store::DescriptorStore,
};

mod args;

use args::{Args, Input};

fn main() -> ExitCode {
    let args = Args::parse();

    let input = match args.input() {
        Ok(input) => input,
        Err(msg) => {
            println!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let level = config.level().unwrap_or(Level::INFO);
    let log_file = args.log_file.clone().or_else(|| config.log_file.clone());

    let (writer, _guard) = match &log_file {
        Some(path) => match File::create(path) {
            Ok(file) => tracing_appender::non_blocking(file),
            Err(e) => {
                eprintln!("Could not open {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .compact()
        .with_ansi(log_file.is_none())
        .with_writer(writer)
        .init();

    let mut torrents = config.torrents;
    torrents.extend(args.torrents);

    // the guard must outlive every log line, so no early process exit here
    match run(&torrents, input) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(torrents: &[std::path::PathBuf], input: Input) -> Result<(), Error> {
    let mut store = DescriptorStore::new();
    for path in torrents {
        if let Err(e) = store.load_file(path) {
            error!("Could not load {}", path.display());
            return Err(e);
        }
    }

    let mut analyzer = Analyzer::new(store);

    let reports = match input {
        Input::File(path) => vec![analyzer.parse_file(&path)?],
        Input::Directory(dir) => analyzer.parse_dir(&dir)?,
    };

    let failed = reports.iter().filter(|r| !r.is_complete()).count();
    let stats = analyzer.reassembler().stats();
    info!(
        "{} stream(s), {failed} ended early. {} piece(s) complete: {} \
         matched, {} did not match, {} incomplete.",
        reports.len(),
        stats.completed,
        stats.matched,
        stats.mismatched,
        analyzer.reassembler().pending()
    );

    Ok(())
}
