//! Rebuilds pieces from the blocks of `piece` messages and checks them
//! against the descriptor hashes.
//!
//! Blocks are kept per (info hash, piece index) in arrival order. A piece is
//! complete once the blocks, read by ascending offset from 0, form an
//! unbroken range of exactly the piece size. An entry with a permanent gap
//! is never completed and stays in memory until the reassembler is dropped.
//!
//! Pieces completed through [`SessionObserver::on_message`] are only
//! verified and counted, their bytes are dropped unless
//! [`PieceReassembler::set_keep_completed`] was turned on.
use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::{
    codec,
    observer::SessionObserver,
    session::PeerCtx,
    store::DescriptorStore,
    types::InfoHash,
    wire::{Block, Core},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedPiece {
    pub info_hash: InfoHash,
    pub index: u32,
    /// The piece bytes in offset order.
    pub data: Vec<u8>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyStats {
    pub completed: usize,
    pub matched: usize,
    pub mismatched: usize,
}

#[derive(Debug, Clone)]
struct Fragment {
    begin: u32,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct PieceReassembler {
    store: DescriptorStore,
    pending: HashMap<(InfoHash, u32), Vec<Fragment>>,
    completed: Vec<CompletedPiece>,
    keep_completed: bool,
    stats: VerifyStats,
}

impl PieceReassembler {
    pub fn new(store: DescriptorStore) -> Self {
        Self { store, ..Default::default() }
    }

    pub fn store(&self) -> &DescriptorStore {
        &self.store
    }

    pub fn stats(&self) -> VerifyStats {
        self.stats
    }

    /// Pieces with at least one block and not yet complete.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Keep the pieces completed by observed `piece` messages, for
    /// [`PieceReassembler::take_completed`]. Off by default.
    pub fn set_keep_completed(&mut self, keep: bool) {
        self.keep_completed = keep;
        if !keep {
            self.completed.clear();
        }
    }

    /// Completed pieces since the last call, oldest first.
    ///
    /// Always empty unless retention was turned on with
    /// [`PieceReassembler::set_keep_completed`].
    pub fn take_completed(&mut self) -> Vec<CompletedPiece> {
        std::mem::take(&mut self.completed)
    }

    /// Record a block and return the piece if this block completed it.
    ///
    /// Blocks of torrents without a descriptor are kept, but their pieces
    /// are never checked.
    pub fn add_block(
        &mut self,
        info_hash: InfoHash,
        block: Block,
    ) -> Option<CompletedPiece> {
        let key = (info_hash, block.index);
        self.pending
            .entry(key)
            .or_default()
            .push(Fragment { begin: block.begin, data: block.block });

        self.check_piece(key)
    }

    fn check_piece(&mut self, key: (InfoHash, u32)) -> Option<CompletedPiece> {
        let (info_hash, index) = key;
        let info = self.store.get(&info_hash)?;
        let piece_size = info.piece_size(index);

        let fragments = self.pending.get_mut(&key)?;
        // stable, duplicates keep their arrival order
        fragments.sort_by_key(|f| f.begin);

        let mut candidates: Vec<&Fragment> = fragments.iter().collect();
        let mut piece = Vec::new();
        let mut cursor = 0u64;

        while cursor < piece_size {
            let Some(fragment) =
                candidates.iter().find(|f| u64::from(f.begin) == cursor)
            else {
                break;
            };
            let len = fragment.data.len() as u64;
            piece.extend_from_slice(&fragment.data);

            // an offset is consumed once, later duplicates are never picked
            candidates.retain(|f| u64::from(f.begin) != cursor);
            cursor += len;
        }

        if piece.len() as u64 != piece_size {
            debug!(
                "Piece {index} has {} of {piece_size} contiguous bytes",
                piece.len()
            );
            return None;
        }

        info!("Piece complete: {index}");

        let got = codec::sha1(&piece);
        let verdict = match info.piece_hash(index) {
            Some(expected) if expected == got.as_slice() => {
                info!("Hash match for piece: {index}");
                Verdict::Match
            }
            _ => {
                warn!("Hash did not match for piece: {index}");
                Verdict::Mismatch
            }
        };

        self.pending.remove(&key);

        self.stats.completed += 1;
        match verdict {
            Verdict::Match => self.stats.matched += 1,
            Verdict::Mismatch => self.stats.mismatched += 1,
        }

        Some(CompletedPiece { info_hash, index, data: piece, verdict })
    }
}

impl SessionObserver for PieceReassembler {
    fn on_message(&mut self, ctx: &PeerCtx, msg: &Core) {
        if let Core::Piece(block) = msg {
            let piece = self.add_block(ctx.info_hash, block.clone());
            if let Some(piece) = piece.filter(|_| self.keep_completed) {
                self.completed.push(piece);
            }
        }
    }
}
