//! J.Y. Company boards (Mortal Kombat 2, Aladdin, and friends).
//!
//! The most register-dense board in the registry:
//! - PRG modes select 32 KiB, 16+16 KiB, or 8 KiB x4 layouts, with an
//!   option to feed the bank number through a bit-reversal table and to
//!   expose the last switchable bank at `$6000`.
//! - CHR modes select 8/4/2/1 KiB granularity with an outer 256 KiB block
//!   register, a "mirror" bit that re-points `$0800-$0FFF` at the first
//!   register pair, and an MMC2-style latch mode for 4 KiB banking.
//! - Nametables can come from CHR-ROM, with a comparator deciding per
//!   slot whether CIRAM substitutes.
//! - Four IRQ sources are selectable; the PPU-A12 source is implemented
//!   (CPU-cycle/read/write sources are accepted and ignored, as in the
//!   reference behaviour this was modelled on). The counter wraps over
//!   the full 8-bit range and fires on wrap, optionally prescaled by 8.
//!
//! The 4 KiB "mirror mode" latch behaviour is unverified on hardware; it
//! mimics MMC2 switching because the one known ROM that sets the bit
//! expects exactly that.

use crate::bank::{BankTarget, BankWindow, Perms};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, ReadHandlerEntry, WriteHandlerEntry,
};
use crate::board::variant::{JyState, VariantState};
use crate::board::{Cartridge, PageMapSet};
use crate::chip::{SIZE_1K, SIZE_2K, SIZE_4K, SIZE_8K, SIZE_16K, SIZE_32K, SIZE_1024K};
use crate::mirroring::Mirroring;
use crate::timer::a12::{A12Flags, A12Variant};

const IRQ_SOURCE_MASK: u8 = 0x03;
const IRQ_SOURCE_PPU_A12: u8 = 0x01;
const IRQ_DIRECTION_MASK: u8 = 0xc0;
const IRQ_DIRECTION_DOWN: u8 = 0x80;
const IRQ_DIRECTION_UP: u8 = 0x40;
const IRQ_PRESCALER_SIZE: u8 = 0x04;

const CHR_MODE_BLOCK: u8 = 0x04;
const CHR_MODE_MIRROR: u8 = 0x10;
const PRG_MODE_S: u8 = 0x80;
const NMT_MODE_R: u8 = 0x40;
const NMT_MODE_N: u8 = 0x20;

/// Bit-reversal table for the "reversed bank order" PRG mode.
const REVERSE_LOOKUP: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).reverse_bits();
        i += 1;
    }
    table
};

const JY_INIT_PRG: &[BankWindow] = &[
    BankWindow::new(0, 0, 0, 0x6000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, 0, 0x8000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, 0, 0xa000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, 0, 0xc000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, 0, 0xe000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, SIZE_32K, 0x8000, Perms::READ, BankTarget::Rom),
];

const JY_INIT_CHR: &[BankWindow] = &[
    BankWindow::new(-1, 0, SIZE_8K, 0x0000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, 0, 0x0400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, 0, 0x0800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, 0, 0x0c00, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, 0, 0x1000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, 0, 0x1400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, 0, 0x1800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, 0, 0x1c00, Perms::READWRITE, BankTarget::Auto),
    // "Mirror" CHR mode shows the first register pair here as well.
    BankWindow::new(0, 0, 0, 0x0800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, 0, 0x0c00, Perms::READWRITE, BankTarget::Auto),
];

const JY_WRITE_HANDLERS: &[WriteHandlerEntry] = &[WriteHandlerEntry {
    handler: jy_write,
    addr: 0x5000,
    size: SIZE_32K + 12 * 1024,
    mask: 0,
}];

const JY_READ_HANDLERS: &[ReadHandlerEntry] = &[
    ReadHandlerEntry { handler: jy_read, addr: 0x5000, size: 1, mask: 0 },
    ReadHandlerEntry { handler: jy_read, addr: 0x5800, size: 8, mask: 0 },
];

const JY_OPS: BoardOps = BoardOps {
    init: Some(jy_init),
    reset: Some(jy_reset),
    end_frame: None,
    post_load: Some(jy_post_load),
};

const JY_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::JyCompanyA,
    name: "JYCOMPANY-A",
    ops: JY_OPS,
    init_prg: JY_INIT_PRG,
    init_chr0: JY_INIT_CHR,
    write_handlers: JY_WRITE_HANDLERS,
    read_handlers: JY_READ_HANDLERS,
    max_prg_rom_size: SIZE_1024K,
    max_chr_rom_size: SIZE_1024K,
    max_wram_size: [SIZE_8K, 0],
    flags: DescriptorFlags::MIRROR_MAPPER,
    a12_variant: Some(A12Variant::Mmc3Std),
    ..BoardDescriptor::DEFAULT
};

pub static JYCOMPANY_A: BoardDescriptor = JY_BASE;

pub static JYCOMPANY_B: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::JyCompanyB,
    name: "JYCOMPANY-B",
    ..JY_BASE
};

pub static JYCOMPANY_C: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::JyCompanyC,
    name: "JYCOMPANY-C",
    ..JY_BASE
};

fn jy_init(cart: &mut Cartridge) {
    cart.board.variant_state = VariantState::Jy(JyState {
        chr_latch: [0, 4],
        ..JyState::default()
    });
}

fn jy_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    cart.board.variant_state = VariantState::Jy(JyState {
        chr_latch: [0, 4],
        ..JyState::default()
    });
    cart.ppu_read_hook = None;

    if cart.board_type() == BoardType::JyCompanyC {
        cart.set_ppu_mirroring(Mirroring::SingleScreenA);
    } else {
        cart.set_ppu_mirroring(Mirroring::Vertical);
    }

    if let Some(a12) = cart.a12.as_mut() {
        a12.set_flags(&mut cart.irq, A12Flags::WRAP | A12Flags::IRQ_ON_WRAP, 0);
        a12.set_delta(&mut cart.irq, 1, 0);
        a12.set_counter_enabled(&mut cart.irq, false, 0);
    }
}

/// The MMC2-style latch hook is a derived runtime registration; reinstate
/// it after a savestate load when the live CHR mode wants it.
fn jy_post_load(cart: &mut Cartridge) {
    let wants_hook =
        cart.board.chr_mode & 0x03 == 0x01 && cart.board.chr_mode & CHR_MODE_MIRROR != 0;
    cart.ppu_read_hook = if wants_hook {
        Some(jy_ppu_read_hook)
    } else {
        None
    };
}

/// MMC2-style CHR latch: fetching tiles $FD/$FE re-points the affected
/// 4 KiB half on the fly.
fn jy_ppu_read_hook(cart: &mut Cartridge, addr: u16, _cycles: u32) {
    if addr >= 0x2000 {
        return;
    }
    let half = (addr >> 12) as usize;
    match addr & 0x0ff8 {
        0x0fd8 | 0x0fe8 => {
            let latch = ((addr >> 4) & ((addr >> 10 & 0x04) | 0x02)) as u8;
            cart.board.jy().chr_latch[half] = latch;
        }
        _ => return,
    }

    let window = cart.board.jy().chr_latch[half] as usize;
    cart.board.chr_banks0[window].size = SIZE_4K as u16;
    cart.board.chr_banks0[window ^ 2].size = 0;
    cart.chr_sync(PageMapSet::Primary);
}

fn jy_set_prg_mode(cart: &mut Cartridge, mode: u8) {
    let last = if mode & 0x04 != 0 { 4 } else { 5 };

    cart.board.prg_banks[0].size = if mode & PRG_MODE_S != 0 {
        SIZE_8K as u16
    } else {
        0
    };

    match mode & 0x03 {
        0x00 => {
            cart.board.prg_banks[0].bank = cart.board.prg_banks[4].bank * 4 + 3;
            for i in 1..4 {
                cart.board.prg_banks[i].size = 0;
            }
            cart.board.prg_banks[last ^ 1].size = 0;
            cart.board.prg_banks[last].size = SIZE_32K as u16;
            cart.board.prg_banks[last].address = 0x8000;
            cart.board.prg_banks[last].shift = 2;
        }
        0x01 => {
            cart.board.prg_banks[0].bank = cart.board.prg_banks[4].bank * 2 + 3;
            cart.board.prg_banks[1].size = 0;
            cart.board.prg_banks[2].size = SIZE_16K as u16;
            cart.board.prg_banks[3].size = 0;
            cart.board.prg_banks[last ^ 1].size = 0;
            cart.board.prg_banks[last].size = SIZE_16K as u16;
            cart.board.prg_banks[2].address = 0x8000;
            cart.board.prg_banks[last].address = 0xc000;
            cart.board.prg_banks[2].shift = 1;
            cart.board.prg_banks[last].shift = 1;
        }
        _ => {
            cart.board.prg_banks[0].bank = cart.board.prg_banks[4].bank;
            for (i, addr) in [(1usize, 0x8000u16), (2, 0xa000), (3, 0xc000)] {
                cart.board.prg_banks[i].size = SIZE_8K as u16;
                cart.board.prg_banks[i].shift = 0;
                cart.board.prg_banks[i].address = addr;
            }
            cart.board.prg_banks[last ^ 1].size = 0;
            cart.board.prg_banks[last].size = SIZE_8K as u16;
            cart.board.prg_banks[last].address = 0xe000;
            cart.board.prg_banks[last].shift = 0;
        }
    }

    if (cart.board.prg_mode ^ mode) & 0x01 != 0 {
        for i in 0..5 {
            let bank = cart.board.prg_banks[i].bank as u8;
            cart.board.prg_banks[i].bank = (REVERSE_LOOKUP[bank as usize] >> 1) as i32;
        }
    }

    cart.board.prg_mode = mode;
    cart.prg_sync();
}

fn jy_set_chr_mode(cart: &mut Cartridge, mode: u8) {
    for i in 0..8 {
        cart.board.chr_banks0[i].size = 0;
        cart.board.chr_banks0[i].address = (i as u16) * 0x400;
    }
    cart.board.chr_banks0[8].size = 0;
    cart.board.chr_banks0[8].address = 0x0800;
    cart.board.chr_banks0[9].size = 0;
    cart.board.chr_banks0[9].address = 0x0c00;

    let mirror = mode & CHR_MODE_MIRROR != 0;
    cart.ppu_read_hook = None;

    match mode & 0x03 {
        0x00 => {
            cart.board.chr_banks0[0].size = SIZE_8K as u16;
        }
        0x01 => {
            // 4 KiB halves. With the mirror bit set, arm MMC2-like latch
            // switching between the two register pairs per half.
            cart.board.chr_banks0[0].size = SIZE_4K as u16;
            cart.board.chr_banks0[4].size = SIZE_4K as u16;
            cart.board.chr_banks0[0].address = 0x0000;
            cart.board.chr_banks0[2].address = 0x0000;
            cart.board.chr_banks0[4].address = 0x1000;
            cart.board.chr_banks0[6].address = 0x1000;
            if mirror {
                cart.ppu_read_hook = Some(jy_ppu_read_hook);
            }
        }
        0x02 => {
            cart.board.chr_banks0[0].size = SIZE_2K as u16;
            cart.board.chr_banks0[2].size = if mirror { 0 } else { SIZE_2K as u16 };
            cart.board.chr_banks0[4].size = SIZE_2K as u16;
            cart.board.chr_banks0[6].size = SIZE_2K as u16;
            cart.board.chr_banks0[8].size = if mirror { SIZE_2K as u16 } else { 0 };
        }
        _ => {
            for i in [0usize, 1, 4, 5, 6, 7] {
                cart.board.chr_banks0[i].size = SIZE_1K as u16;
            }
            let inner = if mirror { 0 } else { SIZE_1K as u16 };
            cart.board.chr_banks0[2].size = inner;
            cart.board.chr_banks0[3].size = inner;
            let mirrored = if mirror { SIZE_1K as u16 } else { 0 };
            cart.board.chr_banks0[8].size = mirrored;
            cart.board.chr_banks0[9].size = mirrored;
        }
    }

    if mode & CHR_MODE_BLOCK == 0 {
        cart.board.chr_and = 0xff;
        cart.board.chr_or = (cart.board.jy().chr_block as u32) << 8;
    } else {
        cart.board.chr_and = !0;
        cart.board.chr_or = 0;
    }

    cart.board.chr_mode = mode;
    cart.chr_sync(PageMapSet::Primary);
}

fn jy_set_mirroring(cart: &mut Cartridge) {
    let state = *cart.board.jy();

    if state.nmt_mode & NMT_MODE_N != 0 {
        for i in 0..4 {
            let mut bank = state.nmt_banks[i] as i32;
            let mut target = BankTarget::Rom;
            if state.nmt_mode & NMT_MODE_R == 0
                && (state.nmt_banks[i] ^ state.nmt_select as u16) & 0x80 == 0
            {
                bank &= 1;
                target = BankTarget::Ciram;
            }
            cart.board.nmt_banks[i].bank = bank;
            cart.board.nmt_banks[i].target = target;
            cart.board.nmt_banks[i].perms = Perms::READWRITE;
        }
        cart.nmt_sync();
        return;
    }

    let mirroring = match state.mirroring {
        0 => Mirroring::Vertical,
        1 => Mirroring::Horizontal,
        2 => Mirroring::SingleScreenA,
        _ => Mirroring::SingleScreenB,
    };
    cart.set_ppu_mirroring(mirroring);
}

fn jy_read(cart: &mut Cartridge, addr: u16, open_bus: u8, _cycles: u32) -> u8 {
    let state = *cart.board.jy();
    match addr {
        // Unmapped multicart DIP region: always claims "first game".
        0x5000 => 0x00,
        0x5800 => (state.product() & 0xff) as u8,
        0x5801 => (state.product() >> 8) as u8,
        0x5803..=0x5807 => state.ram[(addr - 0x5803) as usize],
        _ => open_bus,
    }
}

fn jy_irq_control(cart: &mut Cartridge, value: u8, cycles: u32) {
    let old = cart.board.irq_control;
    let old_source = old & IRQ_SOURCE_MASK;
    let new_source = value & IRQ_SOURCE_MASK;
    let normalize = |direction: u8| {
        if direction == IRQ_DIRECTION_MASK {
            0
        } else {
            direction
        }
    };
    let old_direction = normalize(old & IRQ_DIRECTION_MASK);
    let new_direction = normalize(value & IRQ_DIRECTION_MASK);

    if new_source != old_source && old_source == IRQ_SOURCE_PPU_A12 {
        if let Some(a12) = cart.a12.as_mut() {
            a12.set_counter_enabled(&mut cart.irq, false, cycles);
        }
    }

    if new_direction != old_direction && new_source == IRQ_SOURCE_PPU_A12 {
        if let Some(a12) = cart.a12.as_mut() {
            match new_direction {
                IRQ_DIRECTION_UP => {
                    let flags = a12.flags() | A12Flags::COUNT_UP;
                    a12.set_flags(&mut cart.irq, flags, cycles);
                    a12.set_counter_enabled(&mut cart.irq, true, cycles);
                }
                IRQ_DIRECTION_DOWN => {
                    let flags = a12.flags() - A12Flags::COUNT_UP;
                    a12.set_flags(&mut cart.irq, flags, cycles);
                    a12.set_counter_enabled(&mut cart.irq, true, cycles);
                }
                _ => {
                    a12.set_counter_enabled(&mut cart.irq, false, cycles);
                }
            }
        }
    }

    let prescaler_size = if value & IRQ_PRESCALER_SIZE != 0 { 3 } else { 8 };
    if new_source == IRQ_SOURCE_PPU_A12 {
        if let Some(a12) = cart.a12.as_mut() {
            a12.set_prescaler_size(&mut cart.irq, prescaler_size, cycles);
        }
    }

    cart.board.irq_control = value;
}

fn jy_irq_enable(cart: &mut Cartridge, enabled: bool, cycles: u32) {
    if cart.board.irq_control & IRQ_SOURCE_MASK == IRQ_SOURCE_PPU_A12 {
        if let Some(a12) = cart.a12.as_mut() {
            a12.set_irq_enabled(&mut cart.irq, enabled, cycles);
        }
    }
}

fn jy_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    match addr {
        0x5800 => {
            cart.board.jy().mult[0] = value;
            return;
        }
        0x5801 => {
            cart.board.jy().mult[1] = value;
            return;
        }
        0x5803..=0x5807 => {
            cart.board.jy().ram[(addr - 0x5803) as usize] = value;
            return;
        }
        _ => {}
    }

    match addr & 0xf007 {
        0x8000..=0x8007 => {
            let window = (addr & 0x03) as usize + 1;
            let mut value = value;
            if cart.board.prg_mode & 0x03 == 0x03 {
                value = REVERSE_LOOKUP[value as usize];
            }
            cart.update_prg_bank(window, value as i32);
        }
        0x9000..=0x9007 => {
            let window = (addr & 0x07) as usize;
            let bank = (cart.board.chr_banks0[window].bank & !0xff) | value as i32;
            cart.board.chr_banks0[window].bank = bank;
            if window < 2 {
                let bank = (cart.board.chr_banks0[window + 8].bank & !0xff) | value as i32;
                cart.board.chr_banks0[window + 8].bank = bank;
            }
            cart.chr_sync(PageMapSet::Primary);
        }
        0xa000..=0xa007 => {
            let window = (addr & 0x07) as usize;
            let bank =
                (cart.board.chr_banks0[window].bank & 0xff) | ((value as i32) << 8);
            cart.board.chr_banks0[window].bank = bank;
            if window < 2 {
                let bank =
                    (cart.board.chr_banks0[window + 8].bank & 0xff) | ((value as i32) << 8);
                cart.board.chr_banks0[window + 8].bank = bank;
            }
            cart.chr_sync(PageMapSet::Primary);
        }
        0xb000..=0xb003 => {
            let slot = (addr & 0x03) as usize;
            let bank = (cart.board.jy().nmt_banks[slot] & 0xff00) | value as u16;
            cart.board.jy().nmt_banks[slot] = bank;
            jy_set_mirroring(cart);
        }
        0xb004..=0xb007 => {
            let slot = (addr & 0x03) as usize;
            let bank = (cart.board.jy().nmt_banks[slot] & 0x00ff) | ((value as u16) << 8);
            cart.board.jy().nmt_banks[slot] = bank;
            jy_set_mirroring(cart);
        }
        0xc000 => jy_irq_enable(cart, value & 0x01 != 0, cycles),
        0xc001 => jy_irq_control(cart, value, cycles),
        0xc002 => jy_irq_enable(cart, false, cycles),
        0xc003 => jy_irq_enable(cart, true, cycles),
        0xc004 => {
            let value = value ^ cart.board.jy().irq_xor;
            if cart.board.irq_control & IRQ_SOURCE_MASK == IRQ_SOURCE_PPU_A12 {
                if let Some(a12) = cart.a12.as_mut() {
                    a12.set_prescaler(&mut cart.irq, value as u32, cycles);
                }
            }
        }
        0xc005 => {
            let value = value ^ cart.board.jy().irq_xor;
            if cart.board.irq_control & IRQ_SOURCE_MASK == IRQ_SOURCE_PPU_A12 {
                if let Some(a12) = cart.a12.as_mut() {
                    a12.set_counter(&mut cart.irq, value as u32, cycles);
                }
            }
        }
        0xc006 => {
            cart.board.jy().irq_xor = value;
        }
        0xd000 | 0xd004 => {
            let chr_bits = ((value & 0x18) >> 3)
                | (cart.board.chr_mode & (CHR_MODE_BLOCK | CHR_MODE_MIRROR));

            let mut nmt_mode = value & (NMT_MODE_R | NMT_MODE_N);
            match cart.board_type() {
                BoardType::JyCompanyA => nmt_mode &= !NMT_MODE_N,
                BoardType::JyCompanyC => nmt_mode |= NMT_MODE_N,
                _ => {}
            }
            cart.board.jy().nmt_mode = nmt_mode;

            jy_set_prg_mode(cart, value & 0x87);
            jy_set_chr_mode(cart, chr_bits);
            jy_set_mirroring(cart);
        }
        0xd001 | 0xd005 => {
            cart.board.jy().mirroring = value & 0x03;
            jy_set_mirroring(cart);
        }
        0xd002 | 0xd006 => {
            cart.board.jy().nmt_select = value & 0x80;
            jy_set_mirroring(cart);
        }
        0xd003 | 0xd007 => {
            cart.board.jy().chr_block = value & 0x1f;
            let chr_bits = ((value >> 3) & (CHR_MODE_BLOCK | CHR_MODE_MIRROR))
                | (cart.board.chr_mode & 0x03);
            jy_set_chr_mode(cart, chr_bits);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::RomConfig;
    use crate::irq::IrqLine;

    fn cart(board: BoardType) -> Cartridge {
        let mut prg = vec![0u8; 64 * SIZE_8K];
        for (i, chunk) in prg.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        let mut chr = vec![0u8; 512 * SIZE_1K];
        for (i, chunk) in chr.chunks_mut(SIZE_1K).enumerate() {
            // Modulo a prime so outer-block changes stay distinguishable.
            chunk.fill((i % 251) as u8);
        }
        Cartridge::new(RomConfig::new(board, prg, chr)).unwrap()
    }

    #[test]
    fn prg_modes() {
        let mut c = cart(BoardType::JyCompanyB);
        // 8 KiB x4 mode with a switchable last bank (bit 2).
        c.cpu_write(0xd000, 0x06, 0);
        c.cpu_write(0x8000, 0x05, 0);
        c.cpu_write(0x8001, 0x06, 0);
        c.cpu_write(0x8002, 0x07, 0);
        c.cpu_write(0x8003, 0x08, 0);
        assert_eq!(c.cpu_peek(0x8000), Some(5));
        assert_eq!(c.cpu_peek(0xa000), Some(6));
        assert_eq!(c.cpu_peek(0xc000), Some(7));
        assert_eq!(c.cpu_peek(0xe000), Some(8));

        // 32 KiB mode: the last-bank register selects in 8 KiB units, the
        // window shift divides it down.
        c.cpu_write(0xd000, 0x04, 0);
        c.cpu_write(0x8003, 0x04, 0);
        assert_eq!(c.cpu_peek(0x8000), Some(4));
        assert_eq!(c.cpu_peek(0xe000), Some(7));
    }

    #[test]
    fn reversed_prg_mode() {
        let mut c = cart(BoardType::JyCompanyB);
        c.cpu_write(0xd000, 0x03, 0);
        // In reversed mode the written bank number is bit-flipped.
        c.cpu_write(0x8000, 0x80, 0); // reverses to 0x01
        assert_eq!(c.cpu_peek(0x8000), Some(1));
    }

    #[test]
    fn prg_6000_window() {
        let mut c = cart(BoardType::JyCompanyB);
        // The $6000 window latches the last-bank register when the mode
        // register is written.
        c.cpu_write(0x8003, 0x09, 0);
        c.cpu_write(0xd000, 0x82, 0); // 8 KiB mode + $6000 window
        assert_eq!(c.cpu_peek(0x6000), Some(9));
    }

    #[test]
    fn multiplier() {
        let mut c = cart(BoardType::JyCompanyB);
        c.cpu_write(0x5800, 7, 0);
        c.cpu_write(0x5801, 9, 0);
        assert_eq!(c.cpu_read(0x5800, 0, 0), Some(63));
        assert_eq!(c.cpu_read(0x5801, 0, 0), Some(0));
        c.cpu_write(0x5803, 0x5a, 0);
        assert_eq!(c.cpu_read(0x5803, 0, 0), Some(0x5a));
    }

    #[test]
    fn chr_block_register() {
        let mut c = cart(BoardType::JyCompanyB);
        c.cpu_write(0xd000, 0x18, 0); // 1 KiB CHR mode (bits 3-4)
        c.cpu_write(0x9000, 0x01, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 1);

        // Outer block OR moves the whole window by 256 KiB.
        c.cpu_write(0xd003, 0x01, 0);
        assert_eq!(c.ppu_read(0x0000, 0), (0x101 % 251) as u8);
    }

    #[test]
    fn rom_nametables_with_ciram_comparator() {
        let mut c = cart(BoardType::JyCompanyC);
        // ROM nametables enabled on type C; select CHR page 0x85 for slot
        // 0 (bit 7 set -> stays ROM with default comparator 0) and 0x01
        // for slot 1 (bit 7 clear -> CIRAM bank 1).
        c.cpu_write(0xb000, 0x85, 0);
        c.cpu_write(0xb001, 0x01, 0);
        c.cpu_write(0xd000, 0x20, 0);
        assert_eq!(c.board.nmt_banks[0].target, BankTarget::Rom);
        assert_eq!(c.board.nmt_banks[0].bank, 0x85);
        assert_eq!(c.board.nmt_banks[1].target, BankTarget::Ciram);
        assert_eq!(c.board.nmt_banks[1].bank, 1);
    }

    #[test]
    fn a12_irq_source() {
        let mut c = cart(BoardType::JyCompanyB);
        c.cpu_write(0x2000, 0x08, 0);
        c.cpu_write(0x2001, 0x18, 0);
        // Source = PPU A12, count down, 8-bit prescaler off (3-bit size).
        c.cpu_write(0xc001, IRQ_SOURCE_PPU_A12 | IRQ_DIRECTION_DOWN | IRQ_PRESCALER_SIZE, 0);
        c.cpu_write(0xc005, 4, 0);
        c.cpu_write(0xc003, 0, 0);
        assert!(c.irq_scheduler().scheduled_cycle(IrqLine::A12Timer).is_some());

        c.cpu_write(0xc002, 0, 0);
        assert!(c.irq_scheduler().scheduled_cycle(IrqLine::A12Timer).is_none());
    }

    #[test]
    fn mmc2_style_latch_in_mirror_mode() {
        let mut c = cart(BoardType::JyCompanyB);
        c.cpu_write(0xd000, 0x08, 0); // 4 KiB CHR mode
        c.cpu_write(0xd003, 0x80, 0); // mirror bit
        assert!(c.ppu_read_hook.is_some());

        c.cpu_write(0x9000, 0x04, 0); // window 0 -> 4 KiB bank 4
        c.cpu_write(0x9002, 0x08, 0); // window 2 -> 4 KiB bank 8
        assert_eq!(c.ppu_read(0x0000, 0), 16); // bank 4 * 4 KiB

        // Fetch the $FE tile pattern: the latch flips to window 2.
        c.ppu_read(0x0fe8, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 32);
        // And $FD flips back.
        c.ppu_read(0x0fd8, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 16);
    }
}
