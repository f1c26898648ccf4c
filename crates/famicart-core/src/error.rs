use thiserror::Error;

use crate::board::descriptor::BoardType;

/// Errors surfaced while binding a ROM to a board or while restoring state.
///
/// The CPU/PPU access paths never report errors: out-of-range banks wrap by
/// modulo arithmetic and writes to unmapped addresses are dropped, matching
/// what the 6502 can actually observe.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested board tag has no registered descriptor.
    #[error("unsupported board type {0:?}")]
    UnsupportedBoard(BoardType),
    /// No registered board matches the given name string.
    #[error("unknown board name {0:?}")]
    UnknownBoardName(String),
    /// A savestate chunk is missing, truncated, or has an impossible size.
    #[error("bad savestate chunk {id:?}: {reason}")]
    BadSaveState { id: &'static str, reason: String },
    /// The savestate container itself is malformed.
    #[error("malformed savestate container: {0}")]
    BadContainer(String),
    /// An IPS patch blob failed structural validation.
    #[error("invalid IPS patch: {0}")]
    BadPatch(&'static str),
    /// Wrapper for I/O errors raised by NVRAM and patch-file helpers.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
