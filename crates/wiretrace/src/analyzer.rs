//! Runs captured streams through a [`Session`] one at a time.
//!
//! A fatal error ends the stream it happened in and nothing else: it is
//! logged, kept in the [`StreamReport`], and the next stream starts with a
//! fresh session. Pieces are reassembled across all streams of a run.
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::{
    error::Error,
    observer::{Fanout, LogObserver},
    reassembler::PieceReassembler,
    session::Session,
    store::DescriptorStore,
};

#[derive(Debug)]
pub struct StreamReport {
    pub path: PathBuf,
    pub stream_len: usize,
    pub piece_bytes: u64,
    pub messages: usize,
    /// The error that ended the stream early, if any.
    pub error: Option<Error>,
}

impl StreamReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct Analyzer {
    reassembler: PieceReassembler,
    log: LogObserver,
}

impl Analyzer {
    pub fn new(store: DescriptorStore) -> Self {
        if store.is_empty() {
            warn!("No torrent files specified.");
        }
        Self { reassembler: PieceReassembler::new(store), log: LogObserver }
    }

    pub fn reassembler(&self) -> &PieceReassembler {
        &self.reassembler
    }

    pub fn reassembler_mut(&mut self) -> &mut PieceReassembler {
        &mut self.reassembler
    }

    /// Parse one stream held in memory.
    pub fn parse_stream(
        &mut self,
        path: impl Into<PathBuf>,
        stream: &[u8],
    ) -> StreamReport {
        let mut session = Session::new();
        let mut observer = Fanout::new()
            .with(&mut self.log)
            .with(&mut self.reassembler);

        let result = session.parse(stream, &mut observer);
        if let Err(e) = &result {
            error!("{e}");
        }

        info!(
            "{} bytes of piece data in a stream of {} bytes.",
            session.piece_bytes,
            stream.len()
        );

        StreamReport {
            path: path.into(),
            stream_len: stream.len(),
            piece_bytes: session.piece_bytes,
            messages: session.messages,
            error: result.err(),
        }
    }

    /// Read and parse a captured stream.
    ///
    /// # Errors
    ///
    /// Only if the file cannot be read. Errors inside the stream are in the
    /// returned report.
    pub fn parse_file(&mut self, path: &Path) -> Result<StreamReport, Error> {
        info!("[NEW FILE] {}", path.display());
        let stream = std::fs::read(path)?;
        Ok(self.parse_stream(path, &stream))
    }

    /// Parse every regular file of `dir`, by file name order.
    ///
    /// A file that cannot be read is logged and skipped.
    pub fn parse_dir(
        &mut self,
        dir: &Path,
    ) -> Result<Vec<StreamReport>, Error> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            match self.parse_file(&path) {
                Ok(report) => reports.push(report),
                Err(e) => error!("{}: {e}", path.display()),
            }
        }

        Ok(reports)
    }
}
