//! famicart-core: the cartridge board subsystem of a cycle-accurate
//! NES/Famicom emulator.
//!
//! The crate models the polymorphic set of memory-mapper circuits that sit
//! between the CPU and PPU: chip inventories, bank windows and the O(1)
//! page tables they resolve into, per-variant register dispatch, the M2
//! and A12 IRQ timers, chunked savestates, NVRAM files, and the IPS
//! journal for flash boards. ROM parsing, the CPU and PPU cores, and
//! audio live in their own crates; [`board::Cartridge`] is the seam they
//! talk through.

pub mod bank;
pub mod board;
pub mod boards;
pub mod chip;
pub mod error;
pub mod irq;
pub mod mirroring;
pub mod pagetable;
pub mod patch;
pub mod savestate;
pub mod timer;
pub mod timing;

pub use board::{Cartridge, RomConfig};
pub use board::descriptor::BoardType;
pub use error::Error;

#[cfg(test)]
mod tests {
    use ctor::ctor;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    #[ctor]
    fn init_tracing() {
        let subscriber = FmtSubscriber::builder()
            .with_file(true)
            .with_line_number(true)
            .with_max_level(Level::WARN)
            .pretty()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
