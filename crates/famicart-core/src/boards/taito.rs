//! Taito TC0190FMC / TC0350FMR.
//!
//! MMC3-like banking with a flat register file: two 8 KiB PRG banks and a
//! 2x2 KiB + 4x1 KiB CHR layout at `$8000-$A003`. The plain board wires
//! mirroring to `$8000` bit 6; the PAL16R4 revision moves mirroring to
//! `$E000` and adds an MMC3-style A12 IRQ counter whose latch is written
//! inverted.

use crate::bank::{BankTarget, BankWindow, Perms};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, WriteHandlerEntry,
};
use crate::board::Cartridge;
use crate::boards::{
    a12_irq_disable, a12_irq_enable, a12_irq_latch, a12_irq_reload, standard_mirroring_handler,
};
use crate::chip::{SIZE_1K, SIZE_2K, SIZE_8K, SIZE_16K, SIZE_256K};
use crate::mirroring::STD_MIRRORING_VH;
use crate::timer::a12::A12Variant;

const TAITO_INIT_CHR: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_2K, 0x0000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_2K, 0x0800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_1K, 0x1000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_1K, 0x1400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_1K, 0x1800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 0, SIZE_1K, 0x1c00, Perms::READWRITE, BankTarget::Auto),
];

const TAITO_WRITE_HANDLERS: &[WriteHandlerEntry] = &[WriteHandlerEntry {
    handler: taito_write,
    addr: 0x8000,
    size: SIZE_16K,
    mask: 0,
}];

const TAITO_PAL16R4_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: taito_write, addr: 0x8000, size: SIZE_16K, mask: 0 },
    WriteHandlerEntry { handler: standard_mirroring_handler, addr: 0xe000, size: SIZE_8K, mask: 0xe003 },
    WriteHandlerEntry { handler: taito_timer_latch, addr: 0xc000, size: SIZE_8K, mask: 0xe003 },
    WriteHandlerEntry { handler: a12_irq_reload, addr: 0xc001, size: SIZE_8K, mask: 0xe003 },
    WriteHandlerEntry { handler: a12_irq_enable, addr: 0xc002, size: SIZE_8K, mask: 0xe003 },
    WriteHandlerEntry { handler: a12_irq_disable, addr: 0xc003, size: SIZE_8K, mask: 0xe003 },
];

const TAITO_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::TaitoTc0190Fmc,
    name: "TAITO-TC0190FMC/TC0350FMR",
    init_prg: crate::bank::STD_PRG_8K,
    init_chr0: TAITO_INIT_CHR,
    write_handlers: TAITO_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_256K,
    max_chr_rom_size: SIZE_256K,
    flags: DescriptorFlags::MIRROR_MAPPER,
    mirroring_values: STD_MIRRORING_VH,
    mirroring_shift: 6,
    ..BoardDescriptor::DEFAULT
};

pub static TAITO_TC0190FMC: BoardDescriptor = TAITO_BASE;

pub static TAITO_TC0190FMC_PAL16R4: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::TaitoTc0190FmcPal16R4,
    name: "TAITO-TC0190FMC+PAL16R4",
    write_handlers: TAITO_PAL16R4_WRITE_HANDLERS,
    ops: BoardOps {
        init: None,
        reset: Some(taito_reset),
        end_frame: None,
        post_load: None,
    },
    a12_variant: Some(A12Variant::TaitoTc0190Fmc),
    ..TAITO_BASE
};

fn taito_reset(cart: &mut Cartridge, hard: bool) {
    if hard {
        if let Some(a12) = cart.a12.as_mut() {
            a12.set_counter_enabled(&mut cart.irq, true, 0);
        }
    }
}

/// The IRQ latch is written inverted on this board.
fn taito_timer_latch(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    a12_irq_latch(cart, addr, value ^ 0xff, cycles);
}

fn taito_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    match addr & 0xe003 {
        0x8000 | 0x8001 => {
            if addr & 0xe003 == 0x8000
                && cart.board_type() == BoardType::TaitoTc0190Fmc
            {
                standard_mirroring_handler(cart, addr, value, cycles);
            }
            cart.update_prg_bank((addr & 0x01) as usize + 1, value as i32);
        }
        0x8002 | 0x8003 => {
            cart.update_chr0_bank((addr & 0x01) as usize, value as i32);
        }
        0xa000..=0xa003 => {
            cart.update_chr0_bank((addr & 0x03) as usize + 2, value as i32);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::RomConfig;
    use crate::irq::IrqLine;
    use crate::mirroring::Mirroring;

    fn cart(board: BoardType) -> Cartridge {
        let mut prg = vec![0u8; 16 * SIZE_8K];
        for (i, chunk) in prg.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        let mut chr = vec![0u8; 64 * SIZE_1K];
        for (i, chunk) in chr.chunks_mut(SIZE_1K).enumerate() {
            chunk.fill(i as u8);
        }
        Cartridge::new(RomConfig::new(board, prg, chr)).unwrap()
    }

    #[test]
    fn banking_layout() {
        let mut c = cart(BoardType::TaitoTc0190Fmc);
        c.cpu_write(0x8001, 0x05, 0);
        assert_eq!(c.cpu_peek(0xa000), Some(5));

        // 2 KiB CHR banks count in 2 KiB units.
        c.cpu_write(0x8002, 0x03, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 6);
        c.cpu_write(0xa001, 0x21, 0);
        assert_eq!(c.ppu_read(0x1400, 0), 0x21);
    }

    #[test]
    fn plain_board_mirrors_from_bit6() {
        let mut c = cart(BoardType::TaitoTc0190Fmc);
        c.cpu_write(0x8000, 0x40, 0);
        assert_eq!(c.board.nmt_banks[1].bank, 0); // horizontal {0,0,1,1}
        assert_eq!(c.board.nmt_banks[2].bank, 1);
        c.cpu_write(0x8000, 0x00, 0);
        assert_eq!(c.board.nmt_banks[1].bank, 1); // vertical {0,1,0,1}
    }

    #[test]
    fn pal16r4_irq_latch_is_inverted() {
        let mut c = cart(BoardType::TaitoTc0190FmcPal16R4);
        c.cpu_write(0x2000, 0x08, 0);
        c.cpu_write(0x2001, 0x18, 0);
        c.cpu_write(0xc000, 0xff, 0); // latch 0x00 after inversion
        c.cpu_write(0xc001, 0, 0);
        c.cpu_write(0xc002, 0, 0);
        assert!(c.irq_scheduler().scheduled_cycle(IrqLine::A12Timer).is_some());

        // Plain board ignores $E000 mirroring; PAL16R4 honours it.
        c.cpu_write(0xe000, 0x40, 0);
        assert_eq!(c.board.mirroring, Mirroring::MapperControlled);
        assert_eq!(c.board.nmt_banks[2].bank, 1);
    }
}
