//! Bank windows: the slot descriptors the page-table resolver consumes.
//!
//! Each window maps a `size`-byte span of CPU or PPU address space onto one
//! bank of a backing chip. The variant handlers mutate windows (bank number,
//! address, size, shift, permissions) and then ask the board to resync,
//! which rewrites the affected page table.

use bitflags::bitflags;

bitflags! {
    /// Access permissions carried into the page tables.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Perms: u8 {
        const READ = 0x01;
        const WRITE = 0x02;
    }
}

impl Perms {
    pub const NONE: Perms = Perms::empty();
    pub const READWRITE: Perms = Perms::READ.union(Perms::WRITE);
}

/// Which chip a window resolves against.
///
/// `Auto` picks a concrete chip at sync time: CHR-ROM if present, else
/// VRAM 0 for PPU windows; WRAM 0 or nothing for CPU windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankTarget {
    Rom,
    Ram0,
    Ram1,
    Ciram,
    MapperRam,
    Auto,
    Fill,
    Zero,
    None,
}

/// One PRG or CHR slot. `bank` may be negative, meaning "counted from the
/// end of the backing chip"; `shift` is applied after the global mask/OR
/// pair so a single register can select a multi-slot window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankWindow {
    pub bank: i32,
    pub shift: u8,
    /// Span in bytes; 0 disables the slot.
    pub size: u16,
    /// CPU- or PPU-space base address.
    pub address: u16,
    pub perms: Perms,
    pub target: BankTarget,
}

impl BankWindow {
    pub const fn new(
        bank: i32,
        shift: u8,
        size: usize,
        address: u16,
        perms: Perms,
        target: BankTarget,
    ) -> Self {
        Self {
            bank,
            shift,
            size: size as u16,
            address,
            perms,
            target,
        }
    }

    pub const DISABLED: BankWindow = BankWindow::new(0, 0, 0, 0, Perms::NONE, BankTarget::None);
}

/// One of the four nametable slots; fixed 1 KiB granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NametableSlot {
    pub bank: i32,
    pub perms: Perms,
    pub target: BankTarget,
}

impl NametableSlot {
    pub const CIRAM0: NametableSlot = NametableSlot {
        bank: 0,
        perms: Perms::READWRITE,
        target: BankTarget::Ciram,
    };
}

use crate::chip::{SIZE_1K, SIZE_2K, SIZE_4K, SIZE_8K, SIZE_16K, SIZE_32K};

// Standard initial layouts shared by many descriptors. Slot 0 of the PRG
// lists is always the $6000 work-RAM window.

pub const STD_PRG_8K: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_8K, 0x6000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_8K, 0x8000, Perms::READ, BankTarget::Rom),
    BankWindow::new(1, 0, SIZE_8K, 0xa000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-2, 0, SIZE_8K, 0xc000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, SIZE_8K, 0xe000, Perms::READ, BankTarget::Rom),
];

pub const STD_PRG_16K: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_8K, 0x6000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_16K, 0x8000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, SIZE_16K, 0xc000, Perms::READ, BankTarget::Rom),
];

pub const STD_PRG_32K: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_8K, 0x6000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_32K, 0x8000, Perms::READ, BankTarget::Rom),
];

pub const STD_CHR_1K: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_1K, 0x0000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(1, 0, SIZE_1K, 0x0400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(2, 0, SIZE_1K, 0x0800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(3, 0, SIZE_1K, 0x0c00, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(4, 0, SIZE_1K, 0x1000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(5, 0, SIZE_1K, 0x1400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(6, 0, SIZE_1K, 0x1800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(7, 0, SIZE_1K, 0x1c00, Perms::READWRITE, BankTarget::Auto),
];

pub const STD_CHR_2K: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_2K, 0x0000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(1, 0, SIZE_2K, 0x0800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(2, 0, SIZE_2K, 0x1000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(3, 0, SIZE_2K, 0x1800, Perms::READWRITE, BankTarget::Auto),
];

pub const STD_CHR_4K: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_4K, 0x0000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(1, 0, SIZE_4K, 0x1000, Perms::READWRITE, BankTarget::Auto),
];

pub const STD_CHR_8K: &[BankWindow] = &[BankWindow::new(
    0,
    0,
    SIZE_8K,
    0x0000,
    Perms::READWRITE,
    BankTarget::Auto,
)];
