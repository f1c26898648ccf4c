//! Static per-variant board descriptors.
//!
//! A descriptor is everything the core needs to know about a board variant
//! before any ROM is bound to it: its register map (as handler records),
//! initial bank layout, chip size limits, mirroring policy, and the small
//! capability set of variant functions. Descriptors are plain statics;
//! derivative boards reuse a family's handlers by listing them in their own
//! record tables.

use bitflags::bitflags;

use crate::bank::BankWindow;
use crate::board::Cartridge;
use crate::mirroring::{Mirroring, STD_MIRRORING_VH};
use crate::timer::a12::A12Variant;

/// Identifies one board variant. ROM loaders map header/database
/// information onto one of these tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardType {
    // MMC3 family.
    TxRom,
    TxRomMmc3A,
    TxSRom,
    TqRom,
    HkRom,
    AcclaimMcAcc,
    // Tengen RAMBO-1.
    Tengen800032,
    Tengen800037,
    // Taito.
    TaitoTc0190Fmc,
    TaitoTc0190FmcPal16R4,
    // Konami.
    Vrc2a,
    Vrc2b,
    Vrc2c,
    Vrc4a,
    Vrc4b,
    Vrc4c,
    Vrc4d,
    Vrc4e,
    Vrc4f,
    Vrc4AcCompat,
    Vrc4BdCompat,
    Vrc2bVrc4eCompat,
    Vrc3,
    Vrc6a,
    Vrc6b,
    // Bandai.
    BandaiFcg,
    BandaiLz93d50,
    BandaiJump2,
    // Jaleco.
    JalecoSs88006,
    // Sunsoft.
    Sunsoft3,
    // Irem.
    IremH3001,
    // J.Y. Company.
    JyCompanyA,
    JyCompanyB,
    JyCompanyC,
    // UNROM-512.
    Unrom512,
    Unrom512Flash,
    // Bootleg one-shot timer board.
    BtlSmb2a,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u32 {
        /// Mirroring is driven by mapper registers.
        const MIRROR_MAPPER = 0x01;
        /// Board carries an M2 cycle counter.
        const M2_TIMER = 0x02;
        /// Writes into PRG flash are journaled and saved as an IPS overlay.
        const PRG_IPS = 0x04;
        /// Mapper-internal RAM is battery backed.
        const MAPPER_NV = 0x08;
    }
}

/// CPU write handler: decoded address, written byte, master cycle.
pub type WriteHandler = fn(&mut Cartridge, u16, u8, u32);
/// CPU read handler: decoded address, open-bus byte, master cycle.
pub type ReadHandler = fn(&mut Cartridge, u16, u8, u32) -> u8;

/// One register-map record. The handler is installed for every address `a`
/// in `[addr, addr + size)` with `a & mask == addr & mask` (a zero mask
/// matches the whole span).
#[derive(Clone, Copy)]
pub struct WriteHandlerEntry {
    pub handler: WriteHandler,
    pub addr: u16,
    pub size: usize,
    pub mask: u16,
}

#[derive(Clone, Copy)]
pub struct ReadHandlerEntry {
    pub handler: ReadHandler,
    pub addr: u16,
    pub size: usize,
    pub mask: u16,
}

/// Variant capability set. All optional; dispatch is via these static
/// function pointers, never per-instance closures.
#[derive(Clone, Copy, Default)]
pub struct BoardOps {
    /// Called once when a ROM binds to the board.
    pub init: Option<fn(&mut Cartridge)>,
    /// Hard/soft reset notification, after the core has reinitialized bank
    /// tables and masks.
    pub reset: Option<fn(&mut Cartridge, bool)>,
    /// Frame-boundary notification (master cycles in the ended frame).
    pub end_frame: Option<fn(&mut Cartridge, u32)>,
    /// Reconstruct derived runtime state (e.g. dynamically installed read
    /// handlers) after a savestate load.
    pub post_load: Option<fn(&mut Cartridge)>,
}

pub struct BoardDescriptor {
    pub board_type: BoardType,
    pub name: &'static str,
    pub mapper_name: Option<&'static str>,
    pub ops: BoardOps,
    pub init_prg: &'static [BankWindow],
    pub init_chr0: &'static [BankWindow],
    pub init_chr1: &'static [BankWindow],
    pub read_handlers: &'static [ReadHandlerEntry],
    pub write_handlers: &'static [WriteHandlerEntry],
    pub max_prg_rom_size: usize,
    pub max_chr_rom_size: usize,
    pub min_wram_size: [usize; 2],
    pub max_wram_size: [usize; 2],
    pub min_vram_size: [usize; 2],
    pub max_vram_size: [usize; 2],
    pub mapper_ram_size: usize,
    pub flags: DescriptorFlags,
    /// Which A12 timer revision to install, if any.
    pub a12_variant: Option<A12Variant>,
    /// Table indexed by the mirroring register value (after `mirroring_shift`).
    pub mirroring_values: &'static [Mirroring],
    pub mirroring_shift: u8,
    pub num_dip_switches: u8,
}

impl BoardDescriptor {
    /// Baseline every descriptor starts from; statics override the fields
    /// they care about via struct update syntax.
    pub const DEFAULT: BoardDescriptor = BoardDescriptor {
        board_type: BoardType::TxRom,
        name: "",
        mapper_name: None,
        ops: BoardOps {
            init: None,
            reset: None,
            end_frame: None,
            post_load: None,
        },
        init_prg: &[],
        init_chr0: &[],
        init_chr1: &[],
        read_handlers: &[],
        write_handlers: &[],
        max_prg_rom_size: 0,
        max_chr_rom_size: 0,
        min_wram_size: [0, 0],
        max_wram_size: [0, 0],
        min_vram_size: [0, 0],
        max_vram_size: [0, 0],
        mapper_ram_size: 0,
        flags: DescriptorFlags::empty(),
        a12_variant: None,
        mirroring_values: STD_MIRRORING_VH,
        mirroring_shift: 0,
        num_dip_switches: 0,
    };
}

/// Find the descriptor registered for `board_type`.
pub fn lookup(board_type: BoardType) -> Option<&'static BoardDescriptor> {
    crate::boards::REGISTRY
        .iter()
        .copied()
        .find(|d| d.board_type == board_type)
}

/// Find a descriptor by its canonical name (case-insensitive), the form
/// ROM databases carry.
pub fn lookup_by_name(name: &str) -> Option<&'static BoardDescriptor> {
    crate::boards::REGISTRY
        .iter()
        .copied()
        .find(|d| d.name.eq_ignore_ascii_case(name))
}
