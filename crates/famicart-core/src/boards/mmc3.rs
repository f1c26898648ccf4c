//! MMC3 family: TxROM and its close derivatives.
//!
//! The MMC3 drives everything through two registers: `$8000` latches which
//! pseudo-register the next `$8001` write lands in, plus two layout bits
//! that flip the switchable PRG pair between `$8000`/`$C000` and swap the
//! CHR halves. The flips are expressed by toggling the bank windows'
//! `address` fields and resyncing, so the resolver stays oblivious.
//!
//! Derivatives covered here:
//! - **TxROM-MMC3A**: alternate IRQ semantics (no retrigger on a zero
//!   latch), same register map.
//! - **TxSROM**: nametable selection comes from bit 7 of the CHR bank
//!   registers instead of `$A000`.
//! - **TQROM**: CHR bank bit 6 steers the window between CHR-ROM and
//!   CHR-RAM.
//! - **HKROM (MMC6)**: 1 KiB of battery-backed RAM inside the mapper with
//!   per-half read/write protection, gated by `$8000` bit 5.
//! - **ACCLAIM-MC-ACC**: longer A12 low-time requirement before a rise
//!   counts.

use crate::bank::{BankTarget, BankWindow, Perms};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, ReadHandlerEntry, WriteHandlerEntry,
};
use crate::board::variant::{Mmc3State, VariantState};
use crate::board::{Cartridge, PageMapSet};
use crate::boards::{
    a12_irq_disable, a12_irq_enable, a12_irq_latch, a12_irq_reload, standard_mirroring_handler,
};
use crate::chip::{SIZE_1K, SIZE_8K, SIZE_64K, SIZE_256K, SIZE_512K, SIZE_2048K};
use crate::mirroring::STD_MIRRORING_VH;
use crate::timer::a12::A12Variant;

pub const MMC3_INIT_PRG: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_8K, 0x6000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_8K, 0x8000, Perms::READ, BankTarget::Rom),
    BankWindow::new(1, 0, SIZE_8K, 0xa000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-2, 0, SIZE_8K, 0xc000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, SIZE_8K, 0xe000, Perms::READ, BankTarget::Rom),
];

pub const MMC3_INIT_CHR0: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_1K, 0x0000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(1, 0, SIZE_1K, 0x0400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(2, 0, SIZE_1K, 0x0800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(3, 0, SIZE_1K, 0x0c00, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(4, 0, SIZE_1K, 0x1000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(5, 0, SIZE_1K, 0x1400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(6, 0, SIZE_1K, 0x1800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(7, 0, SIZE_1K, 0x1c00, Perms::READWRITE, BankTarget::Auto),
];

pub const MMC3_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: mmc3_bank_select, addr: 0x8000, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: mmc3_bank_data, addr: 0x8001, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: standard_mirroring_handler, addr: 0xa000, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: mmc3_wram_protect, addr: 0xa001, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: a12_irq_latch, addr: 0xc000, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: a12_irq_reload, addr: 0xc001, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: a12_irq_disable, addr: 0xe000, size: SIZE_8K, mask: 0xe001 },
    WriteHandlerEntry { handler: a12_irq_enable, addr: 0xe001, size: SIZE_8K, mask: 0xe001 },
];

const TXSROM_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: txsrom_bank_select, addr: 0x8000, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: txsrom_bank_data, addr: 0x8001, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: mmc3_wram_protect, addr: 0xa001, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: a12_irq_latch, addr: 0xc000, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: a12_irq_reload, addr: 0xc001, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: a12_irq_disable, addr: 0xe000, size: SIZE_8K, mask: 0xe001 },
    WriteHandlerEntry { handler: a12_irq_enable, addr: 0xe001, size: SIZE_8K, mask: 0xe001 },
];

const TQROM_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: mmc3_bank_select, addr: 0x8000, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: tqrom_bank_data, addr: 0x8001, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: standard_mirroring_handler, addr: 0xa000, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: mmc3_wram_protect, addr: 0xa001, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: a12_irq_latch, addr: 0xc000, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: a12_irq_reload, addr: 0xc001, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: a12_irq_disable, addr: 0xe000, size: SIZE_8K, mask: 0xe001 },
    WriteHandlerEntry { handler: a12_irq_enable, addr: 0xe001, size: SIZE_8K, mask: 0xe001 },
];

const HKROM_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: hkrom_bank_select, addr: 0x8000, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: mmc3_bank_data, addr: 0x8001, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: mmc6_wram_write, addr: 0x7000, size: 0x1000, mask: 0 },
    WriteHandlerEntry { handler: standard_mirroring_handler, addr: 0xa000, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: hkrom_wram_protect, addr: 0xa001, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: a12_irq_latch, addr: 0xc000, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: a12_irq_reload, addr: 0xc001, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: a12_irq_disable, addr: 0xe000, size: SIZE_8K, mask: 0xe001 },
    WriteHandlerEntry { handler: a12_irq_enable, addr: 0xe001, size: SIZE_8K, mask: 0xe001 },
];

const HKROM_READ_HANDLERS: &[ReadHandlerEntry] = &[ReadHandlerEntry {
    handler: mmc6_wram_read,
    addr: 0x7000,
    size: 0x1000,
    mask: 0,
}];

pub(crate) const MMC3_OPS: BoardOps = BoardOps {
    init: Some(mmc3_init),
    reset: Some(mmc3_reset),
    end_frame: None,
    post_load: None,
};

/// Shared base every MMC3-family descriptor derives from.
pub(crate) const TXROM_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::TxRom,
    name: "TxROM",
    mapper_name: Some("MMC3"),
    ops: MMC3_OPS,
    init_prg: MMC3_INIT_PRG,
    init_chr0: MMC3_INIT_CHR0,
    write_handlers: MMC3_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_2048K,
    max_chr_rom_size: SIZE_256K,
    max_wram_size: [SIZE_8K, 0],
    flags: DescriptorFlags::MIRROR_MAPPER,
    a12_variant: Some(A12Variant::Mmc3Std),
    mirroring_values: STD_MIRRORING_VH,
    ..BoardDescriptor::DEFAULT
};

pub static TXROM: BoardDescriptor = TXROM_BASE;

pub static TXROM_MMC3A: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::TxRomMmc3A,
    name: "TxROM-MMC3A",
    mapper_name: Some("MMC3A"),
    a12_variant: Some(A12Variant::Mmc3Alt),
    ..TXROM_BASE
};

pub static TXSROM: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::TxSRom,
    name: "TxSROM",
    write_handlers: TXSROM_WRITE_HANDLERS,
    ..TXROM_BASE
};

pub static TQROM: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::TqRom,
    name: "NES-TQROM",
    write_handlers: TQROM_WRITE_HANDLERS,
    max_chr_rom_size: SIZE_64K,
    min_vram_size: [SIZE_8K, 0],
    max_vram_size: [SIZE_64K, 0],
    ..TXROM_BASE
};

pub static HKROM: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::HkRom,
    name: "NES-HKROM",
    mapper_name: Some("MMC6"),
    read_handlers: HKROM_READ_HANDLERS,
    write_handlers: HKROM_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_512K,
    max_wram_size: [0, 0],
    mapper_ram_size: SIZE_1K,
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::MAPPER_NV),
    ..TXROM_BASE
};

pub static ACCLAIM_MC_ACC: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::AcclaimMcAcc,
    name: "ACCLAIM-MC-ACC",
    mapper_name: Some("MC-ACC"),
    max_prg_rom_size: SIZE_512K,
    a12_variant: Some(A12Variant::AcclaimMcAcc),
    ..TXROM_BASE
};

fn mmc3_init(cart: &mut Cartridge) {
    cart.board.variant_state = VariantState::Mmc3(Mmc3State {
        bank_select_mask: 0x07,
        chr_mode_mask: 0x80,
        ..Mmc3State::default()
    });
}

pub(crate) fn mmc3_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    let keep = (cart.board.mmc3().bank_select_mask, cart.board.mmc3().chr_mode_mask);
    cart.board.variant_state = VariantState::Mmc3(Mmc3State {
        bank_select_mask: keep.0,
        chr_mode_mask: keep.1,
        ..Mmc3State::default()
    });
    cart.board.prg_mode = 0;
    cart.board.chr_mode = 0;
    if let Some(a12) = cart.a12.as_mut() {
        a12.set_counter_enabled(&mut cart.irq, true, 0);
    }
}

/// `$8000`: bank-select latch plus the PRG/CHR layout toggles.
pub(crate) fn mmc3_bank_select(cart: &mut Cartridge, _addr: u16, value: u8, _cycles: u32) {
    let old = cart.board.mmc3().bank_select;
    cart.board.mmc3().bank_select = value;
    cart.board.prg_mode = value & 0x40;
    cart.board.chr_mode = value & 0x80;

    if (value ^ old) & 0x80 != 0 {
        // CHR A12 inversion: move the 2 KiB pair and the 1 KiB quartet
        // between the two pattern-table halves.
        let invert = value & 0x80 != 0;
        for i in 0..4 {
            if invert {
                cart.board.chr_banks0[i].address |= 0x1000;
                cart.board.chr_banks0[i + 4].address &= 0x0fff;
            } else {
                cart.board.chr_banks0[i].address &= 0x0fff;
                cart.board.chr_banks0[i + 4].address |= 0x1000;
            }
        }
        cart.chr_sync(PageMapSet::Primary);
    }

    if (value ^ old) & 0x40 != 0 {
        if value & 0x40 == 0 {
            cart.board.prg_banks[1].address = 0x8000;
            cart.board.prg_banks[2].address = 0xa000;
            cart.board.prg_banks[3].address = 0xc000;
        } else {
            cart.board.prg_banks[1].address = 0xc000;
            cart.board.prg_banks[2].address = 0xa000;
            cart.board.prg_banks[3].address = 0x8000;
        }
        cart.prg_sync();
    }
}

/// `$8001`: write the latched pseudo-register.
pub(crate) fn mmc3_bank_data(cart: &mut Cartridge, _addr: u16, value: u8, _cycles: u32) {
    let reg = (cart.board.mmc3().bank_select & 0x07) as usize;
    match reg {
        0 | 1 => {
            // 2 KiB windows: A10 is forced low, the pair maps value&~1 and
            // value|1.
            cart.board.chr_banks0[reg * 2].bank = (value & 0xfe) as i32;
            cart.board.chr_banks0[reg * 2 + 1].bank = (value | 0x01) as i32;
            cart.chr_sync(PageMapSet::Primary);
        }
        2..=5 => {
            cart.board.chr_banks0[reg + 2].bank = value as i32;
            cart.chr_sync(PageMapSet::Primary);
        }
        _ => {
            cart.board.prg_banks[reg - 5].bank = value as i32;
            cart.prg_sync();
        }
    }
}

/// `$A001`: PRG-RAM enable (bit 7) and write protection (bit 6).
pub(crate) fn mmc3_wram_protect(cart: &mut Cartridge, _addr: u16, value: u8, _cycles: u32) {
    cart.board.mmc3().wram_protect = value;
    let perms = if value & 0x80 == 0 {
        Perms::NONE
    } else if value & 0x40 != 0 {
        Perms::READ
    } else {
        Perms::READWRITE
    };
    cart.board.prg_banks[0].perms = perms;
    cart.prg_sync();
}

/// TxSROM: each nametable slot follows bit 7 of the CHR register serving
/// its quadrant (even registers in normal layout, the 1 KiB quartet when
/// the CHR halves are swapped).
pub(crate) fn txsrom_mirroring(cart: &mut Cartridge) {
    for i in 0..4 {
        let reg = if cart.board.chr_mode != 0 { i + 4 } else { i & !1 };
        let bank = cart.board.chr_banks0[reg].bank;
        let slot = &mut cart.board.nmt_banks[i];
        slot.target = BankTarget::Ciram;
        slot.perms = Perms::READWRITE;
        slot.bank = if bank & 0x80 != 0 { 1 } else { 0 };
    }
    cart.nmt_sync();
}

fn txsrom_bank_select(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    let old = cart.board.mmc3().bank_select;
    mmc3_bank_select(cart, addr, value, cycles);
    if (value ^ old) & 0x80 != 0 {
        txsrom_mirroring(cart);
    }
}

fn txsrom_bank_data(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    let reg = cart.board.mmc3().bank_select & 0x07;
    mmc3_bank_data(cart, addr, value, cycles);
    if reg < 6 {
        txsrom_mirroring(cart);
    }
}

/// TQROM: CHR register bit 6 selects CHR-RAM for the window.
fn tqrom_bank_data(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    let reg = (cart.board.mmc3().bank_select & 0x07) as usize;
    let mut value = value;
    if reg < 6 {
        let target = if value & 0x40 != 0 {
            value &= 0x3f;
            BankTarget::Ram0
        } else {
            BankTarget::Auto
        };
        if reg < 2 {
            cart.board.chr_banks0[reg * 2].target = target;
            cart.board.chr_banks0[reg * 2 + 1].target = target;
        } else {
            cart.board.chr_banks0[reg + 2].target = target;
        }
    }
    mmc3_bank_data(cart, addr, value, cycles);
}

/// MMC6 keeps RAM enable inside the bank-select register: clearing bit 5
/// drops the protection latch entirely.
fn hkrom_bank_select(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    mmc3_bank_select(cart, addr, value, cycles);
    if cart.board.mmc3().bank_select & 0x20 == 0 {
        cart.board.mmc3().wram_protect = 0;
    }
}

fn hkrom_wram_protect(cart: &mut Cartridge, _addr: u16, value: u8, _cycles: u32) {
    if cart.board.mmc3().bank_select & 0x20 != 0 {
        cart.board.mmc3().wram_protect = value;
    }
}

/// MMC6 internal RAM read: two 512-byte halves with independent read
/// enables; reads with both halves disabled float, a readable half mirrors
/// zero over the other.
fn mmc6_wram_read(cart: &mut Cartridge, addr: u16, open_bus: u8, _cycles: u32) -> u8 {
    let protect = cart.board.mmc3().wram_protect;
    let addr = (addr & 0x3ff) as usize;

    if protect & 0xa0 == 0 {
        return open_bus;
    }
    let readable = if addr < 0x200 {
        protect & 0x20 != 0
    } else {
        protect & 0x80 != 0
    };
    if !readable {
        return 0;
    }
    cart.board
        .mapper_ram
        .as_ref()
        .and_then(|ram| ram.data.get(addr).copied())
        .unwrap_or(open_bus)
}

fn mmc6_wram_write(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    let protect = cart.board.mmc3().wram_protect;
    let addr = (addr & 0x3ff) as usize;
    let writable = if addr < 0x200 {
        protect & 0x30 == 0x30
    } else {
        protect & 0xc0 == 0xc0
    };
    if !writable {
        return;
    }
    if let Some(ram) = cart.board.mapper_ram.as_mut() {
        if let Some(byte) = ram.data.get_mut(addr) {
            *byte = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::RomConfig;
    use crate::chip::SIZE_8K;

    fn prg_rom(banks_8k: usize) -> Vec<u8> {
        let mut data = vec![0u8; banks_8k * SIZE_8K];
        for (i, chunk) in data.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        data
    }

    fn chr_rom(banks_1k: usize) -> Vec<u8> {
        let mut data = vec![0u8; banks_1k * SIZE_1K];
        for (i, chunk) in data.chunks_mut(SIZE_1K).enumerate() {
            chunk.fill(i as u8);
        }
        data
    }

    fn cart(board: BoardType) -> Cartridge {
        Cartridge::new(RomConfig::new(board, prg_rom(64), chr_rom(256))).unwrap()
    }

    #[test]
    fn bank_select_and_data() {
        let mut c = cart(BoardType::TxRom);
        c.cpu_write(0x8000, 0x06, 0);
        c.cpu_write(0x8001, 0x1f, 0);
        assert_eq!(c.cpu_peek(0x8000), Some(0x1f));

        c.cpu_write(0x8000, 0x07, 0);
        c.cpu_write(0x8001, 0x1e, 0);
        assert_eq!(c.cpu_peek(0xa000), Some(0x1e));
        assert_eq!(c.cpu_peek(0x8000), Some(0x1f), "slot 1 keeps its bank");
    }

    #[test]
    fn prg_mode_swaps_slot_addresses() {
        let mut c = cart(BoardType::TxRom);
        c.cpu_write(0x8000, 0x06, 0);
        c.cpu_write(0x8001, 0x1f, 0);
        c.cpu_write(0x8000, 0x07, 0);
        c.cpu_write(0x8001, 0x1e, 0);

        c.cpu_write(0x8000, 0x46, 0);
        // Mode 1: the register-6 bank appears at $C000, the second-to-last
        // bank at $8000; bank values are preserved.
        assert_eq!(c.cpu_peek(0xc000), Some(0x1f));
        assert_eq!(c.cpu_peek(0x8000), Some(62));
        assert_eq!(c.cpu_peek(0xa000), Some(0x1e));
        assert_eq!(c.cpu_peek(0xe000), Some(63));
    }

    #[test]
    fn chr_mode_swaps_pattern_halves() {
        let mut c = cart(BoardType::TxRom);
        c.cpu_write(0x8000, 0x00, 0);
        c.cpu_write(0x8001, 0x10, 0); // 2 KiB pair at $0000 -> banks 16/17
        assert_eq!(c.ppu_read(0x0000, 0), 16);
        assert_eq!(c.ppu_read(0x0400, 0), 17);

        c.cpu_write(0x8000, 0x80, 0);
        // Inverted: the pair moves to $1000.
        assert_eq!(c.ppu_read(0x1000, 0), 16);
        assert_eq!(c.ppu_read(0x1400, 0), 17);
    }

    #[test]
    fn wram_protect_controls_page_perms() {
        let mut c = cart(BoardType::TxRom);
        c.cpu_write(0xa001, 0x80, 0);
        c.cpu_write(0x6000, 0x12, 0);
        assert_eq!(c.cpu_peek(0x6000), Some(0x12));

        // Write protect: reads stay, writes are dropped.
        c.cpu_write(0xa001, 0xc0, 0);
        c.cpu_write(0x6000, 0x34, 0);
        assert_eq!(c.cpu_peek(0x6000), Some(0x12));

        // Disabled entirely: open bus.
        c.cpu_write(0xa001, 0x00, 0);
        assert_eq!(c.cpu_peek(0x6000), None);
    }

    #[test]
    fn txsrom_nametables_follow_chr_bit7() {
        let mut c = cart(BoardType::TxSRom);
        // In normal CHR layout, register 0 drives slots 0/1 and register 1
        // drives slots 2/3.
        c.cpu_write(0x8000, 0x00, 0);
        c.cpu_write(0x8001, 0x80, 0);
        c.cpu_write(0x8000, 0x01, 0);
        c.cpu_write(0x8001, 0x00, 0);
        let banks: Vec<i32> = c.board.nmt_banks.iter().map(|s| s.bank).collect();
        assert_eq!(banks, vec![1, 1, 0, 0]);
    }

    #[test]
    fn tqrom_bit6_selects_chr_ram() {
        let mut c = Cartridge::new(RomConfig::new(
            BoardType::TqRom,
            prg_rom(16),
            chr_rom(64),
        ))
        .unwrap();
        // Point register 2 (window at $1000) into CHR-RAM and write
        // through the PPU bus.
        c.cpu_write(0x8000, 0x02, 0);
        c.cpu_write(0x8001, 0x40, 0);
        c.ppu_write(0x1000, 0x99, 0);
        assert_eq!(c.ppu_read(0x1000, 0), 0x99);

        // Back to CHR-ROM: the ROM byte shows again and writes bounce.
        c.cpu_write(0x8001, 0x05, 0);
        assert_eq!(c.ppu_read(0x1000, 0), 5);
        c.ppu_write(0x1000, 0x77, 0);
        assert_eq!(c.ppu_read(0x1000, 0), 5);
    }

    #[test]
    fn mmc6_ram_protection() {
        let mut c = cart(BoardType::HkRom);
        // RAM disabled until $8000 bit 5 is set.
        c.cpu_write(0x8000, 0x20, 0);
        // Enable both halves for read+write.
        c.cpu_write(0xa001, 0xf0, 0);
        c.cpu_write(0x7000, 0x42, 0);
        c.cpu_write(0x7200, 0x43, 0);
        assert_eq!(c.cpu_read(0x7000, 0xee, 0), Some(0x42));
        assert_eq!(c.cpu_read(0x7200, 0xee, 0), Some(0x43));

        // First half readable only: the other half reads zero.
        c.cpu_write(0xa001, 0x20, 0);
        assert_eq!(c.cpu_read(0x7000, 0xee, 0), Some(0x42));
        assert_eq!(c.cpu_read(0x7200, 0xee, 0), Some(0x00));

        // Both disabled: open bus shows through.
        c.cpu_write(0xa001, 0x00, 0);
        assert_eq!(c.cpu_read(0x7000, 0xee, 0), Some(0xee));
    }

    #[test]
    fn irq_registers_reach_the_a12_timer() {
        let mut c = cart(BoardType::TxRom);
        let start = 0;
        // Rendering with sprite table high so predictions are possible.
        c.cpu_write(0x2000, 0x08, start);
        c.cpu_write(0x2001, 0x18, start);
        c.cpu_write(0xc000, 3, start);
        c.cpu_write(0xc001, 0, start);
        c.cpu_write(0xe001, 0, start);
        assert!(
            c.irq_scheduler()
                .scheduled_cycle(crate::irq::IrqLine::A12Timer)
                .is_some()
        );

        c.cpu_write(0xe000, 0, start);
        assert!(
            c.irq_scheduler()
                .scheduled_cycle(crate::irq::IrqLine::A12Timer)
                .is_none()
        );
    }
}
