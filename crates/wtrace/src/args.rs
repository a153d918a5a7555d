use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[clap(name = "wtrace")]
#[command(
    version,
    about = "A program for parsing and analyzing BitTorrent streams.",
    long_about = None,
    after_help = "Either -d or -f (but not both) must be used."
)]
pub struct Args {
    /// A torrent file to read and use in processing. The pieces with an
    /// infohash matching this file are checked against the hashes in this
    /// file. Can be specified multiple times.
    #[clap(short, long = "torrent")]
    pub torrents: Vec<PathBuf>,

    /// A directory to read the streams from.
    #[clap(short, long)]
    pub directory: Option<PathBuf>,

    /// A file containing a BitTorrent stream.
    #[clap(short, long)]
    pub filename: Option<PathBuf>,

    /// The file to log to. Defaults to stdout.
    #[clap(short, long)]
    pub log_file: Option<PathBuf>,

    /// Configuration file, defaults to config.toml in the user's
    /// configuration folder.
    #[clap(short, long)]
    pub config: Option<PathBuf>,
}

/// What to parse, once the arguments were validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    File(PathBuf),
    Directory(PathBuf),
}

impl Args {
    /// Exactly one of `-f` and `-d`.
    pub fn input(&self) -> Result<Input, &'static str> {
        match (&self.filename, &self.directory) {
            (Some(_), Some(_)) => Err("Only one of -f and -d can be used."),
            (None, None) => Err("Either -d or -f must be specified."),
            (Some(f), None) => Ok(Input::File(f.clone())),
            (None, Some(d)) => Ok(Input::Directory(d.clone())),
        }
    }
}
