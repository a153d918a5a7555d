use std::path::Path;

use hashbrown::HashMap;
use tracing::info;

use crate::{
    error::Error,
    metainfo::{Info, MetaInfo},
    types::InfoHash,
};

/// Torrent descriptors by info hash. Filled once before any stream is
/// parsed, read only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DescriptorStore {
    infos: HashMap<InfoHash, Info>,
}

impl DescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, meta: MetaInfo) -> InfoHash {
        let info_hash = meta.info_hash;
        self.infos.insert(info_hash, meta.info);
        info_hash
    }

    /// Parse the bytes of a .torrent file and add its descriptor.
    pub fn insert_torrent(&mut self, buf: &[u8]) -> Result<InfoHash, Error> {
        let meta = MetaInfo::from_bytes(buf)?;
        Ok(self.insert(meta))
    }

    pub fn load_file(&mut self, path: &Path) -> Result<InfoHash, Error> {
        let buf = std::fs::read(path)?;
        let meta = MetaInfo::from_bytes(&buf)?;

        info!(
            "Loaded torrent {:?} ({} pieces): {}",
            meta.info.name.as_deref().unwrap_or_default(),
            meta.info.piece_count(),
            meta.info_hash
        );

        Ok(self.insert(meta))
    }

    pub fn get(&self, info_hash: &InfoHash) -> Option<&Info> {
        self.infos.get(info_hash)
    }

    pub fn contains(&self, info_hash: &InfoHash) -> bool {
        self.infos.contains_key(info_hash)
    }

    /// The 20 bytes at `index * 20` of the descriptor's `pieces`.
    pub fn expected_hash(
        &self,
        info_hash: &InfoHash,
        index: u32,
    ) -> Option<&[u8]> {
        self.get(info_hash)?.piece_hash(index)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
