//! Tengen RAMBO-1 (800032/800037).
//!
//! A MMC3 superset: the bank-select register grows to four index bits and
//! two CHR layout bits, the third PRG slot becomes switchable (register
//! 15), the low pattern half can split into four independent 1 KiB banks
//! (registers 0/1/8/9), and the IRQ counter can clock from either A12
//! rises or CPU cycles: `$C001` bit 0 picks the source, routing the
//! shared latch into the A12 timer or the M2 timer (prescaled by 4).
//! 800037 adds TxSROM-style nametable control on top.

use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, WriteHandlerEntry,
};
use crate::board::variant::{Mmc3State, VariantState};
use crate::board::{Cartridge, PageMapSet};
use crate::boards::mmc3::{
    MMC3_INIT_CHR0, MMC3_INIT_PRG, TXROM_BASE, mmc3_bank_data, mmc3_reset, mmc3_wram_protect,
    txsrom_mirroring,
};
use crate::boards::standard_mirroring_handler;
use crate::chip::{SIZE_8K, SIZE_256K, SIZE_512K};
use crate::timer::a12::A12Variant;
use crate::timer::m2::M2Flags;

const RAMBO1_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: rambo1_bank_select, addr: 0x8000, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: rambo1_bank_data, addr: 0x8001, size: SIZE_8K, mask: 0x8001 },
    WriteHandlerEntry { handler: standard_mirroring_handler, addr: 0xa000, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: mmc3_wram_protect, addr: 0xa001, size: SIZE_8K, mask: 0xa001 },
    WriteHandlerEntry { handler: rambo1_irq_latch, addr: 0xc000, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: rambo1_irq_reload, addr: 0xc001, size: SIZE_8K, mask: 0xc001 },
    WriteHandlerEntry { handler: rambo1_irq_disable, addr: 0xe000, size: SIZE_8K, mask: 0xe001 },
    WriteHandlerEntry { handler: rambo1_irq_enable, addr: 0xe001, size: SIZE_8K, mask: 0xe001 },
];

const RAMBO1_OPS: BoardOps = BoardOps {
    init: Some(rambo1_init),
    reset: Some(rambo1_reset),
    end_frame: None,
    post_load: None,
};

const TENGEN_800032_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Tengen800032,
    name: "TENGEN-800032",
    mapper_name: Some("RAMBO-1"),
    ops: RAMBO1_OPS,
    init_prg: MMC3_INIT_PRG,
    init_chr0: MMC3_INIT_CHR0,
    write_handlers: RAMBO1_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_512K,
    max_chr_rom_size: SIZE_256K,
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::M2_TIMER),
    a12_variant: Some(A12Variant::Rambo1),
    ..TXROM_BASE
};

pub static TENGEN_800032: BoardDescriptor = TENGEN_800032_BASE;

pub static TENGEN_800037: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Tengen800037,
    name: "TENGEN-800037",
    ..TENGEN_800032_BASE
};

fn rambo1_init(cart: &mut Cartridge) {
    cart.board.variant_state = VariantState::Mmc3(Mmc3State {
        bank_select_mask: 0x0f,
        chr_mode_mask: 0xa0,
        ..Mmc3State::default()
    });
}

fn rambo1_reset(cart: &mut Cartridge, hard: bool) {
    mmc3_reset(cart, hard);
    if !hard {
        return;
    }
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_enabled(&mut cart.irq, false, 0);
        m2.set_prescaler(&mut cart.irq, 3, 0);
        m2.set_prescaler_reload(&mut cart.irq, 3, 0);
        m2.set_irq_delay(&mut cart.irq, 2, 0);
        m2.set_size(&mut cart.irq, 8, 0);
        m2.set_flags(
            &mut cart.irq,
            M2Flags::RELOAD
                | M2Flags::DELAYED_RELOAD
                | M2Flags::PRESCALER
                | M2Flags::PRESCALER_RELOAD,
            0,
        );
    }
}

/// Recompute the low pattern-table windows from the extended registers,
/// honouring the 1 KiB split bit.
fn update_low_chr(cart: &mut Cartridge) {
    let split_1k = cart.board.chr_mode & 0x20 != 0;
    let ext = cart.board.mmc3().ext_regs;
    if split_1k {
        for i in 0..4 {
            cart.board.chr_banks0[i].bank = ext[i] as i32;
        }
    } else {
        cart.board.chr_banks0[0].bank = (ext[0] & 0xfe) as i32;
        cart.board.chr_banks0[1].bank = (ext[0] | 0x01) as i32;
        cart.board.chr_banks0[2].bank = (ext[2] & 0xfe) as i32;
        cart.board.chr_banks0[3].bank = (ext[2] | 0x01) as i32;
    }
}

fn rambo1_bank_select(cart: &mut Cartridge, _addr: u16, value: u8, _cycles: u32) {
    let old = cart.board.mmc3().bank_select;
    cart.board.mmc3().bank_select = value;
    cart.board.prg_mode = value & 0x40;
    cart.board.chr_mode = value & 0xa0;

    if (value ^ old) & 0xa0 != 0 {
        update_low_chr(cart);

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

        if cart.board_type() == BoardType::Tengen800037 {
            txsrom_mirroring(cart);
        }
        cart.chr_sync(PageMapSet::Primary);
    }

    if (value ^ old) & 0x40 != 0 {
        if value & 0x40 == 0 {
            cart.board.prg_banks[1].address = 0x8000;
            cart.board.prg_banks[2].address = 0xa000;
            cart.board.prg_banks[3].address = 0xc000;
        } else {
            cart.board.prg_banks[1].address = 0xa000;
            cart.board.prg_banks[2].address = 0xc000;
            cart.board.prg_banks[3].address = 0x8000;
        }
        cart.prg_sync();
    }
}

fn rambo1_bank_data(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    let reg = cart.board.mmc3().bank_select & 0x0f;
    match reg {
        2..=7 => mmc3_bank_data(cart, addr, value, cycles),
        0 | 1 | 8 | 9 => {
            // K0/K1 pair and their 1 KiB companions.
            let index = (((reg & 1) << 1) | ((reg & 0x08) >> 3)) as usize;
            cart.board.mmc3().ext_regs[index] = value;
            update_low_chr(cart);
            cart.chr_sync(PageMapSet::Primary);
        }
        15 => cart.update_prg_bank(3, value as i32),
        _ => {}
    }

    if reg < 6 && cart.board_type() == BoardType::Tengen800037 {
        txsrom_mirroring(cart);
    }
}

/// `$C000`: the latch feeds whichever counter is selected.
fn rambo1_irq_latch(cart: &mut Cartridge, _addr: u16, value: u8, cycles: u32) {
    cart.board.irq_counter_reload = value as u32;
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_reload(&mut cart.irq, value as u32, cycles);
    }
    if let Some(a12) = cart.a12.as_mut() {
        a12.set_reload(&mut cart.irq, value as u32, cycles);
    }
}

/// `$C001`: reload strobe; bit 0 selects CPU-cycle counting.
fn rambo1_irq_reload(cart: &mut Cartridge, _addr: u16, value: u8, cycles: u32) {
    let cpu_mode = value & 0x01;
    if cart.board.irq_control != cpu_mode {
        cart.board.irq_control = cpu_mode;
        if let Some(m2) = cart.m2.as_mut() {
            m2.set_counter_enabled(&mut cart.irq, cpu_mode != 0, cycles);
        }
        if let Some(a12) = cart.a12.as_mut() {
            a12.set_counter_enabled(&mut cart.irq, cpu_mode == 0, cycles);
        }
    }

    let delayed = cart.board.irq_counter_reload != 0;
    if cart.board.irq_control != 0 {
        if let Some(m2) = cart.m2.as_mut() {
            m2.force_reload(&mut cart.irq, cycles);
            m2.set_prescaler(&mut cart.irq, 3, cycles);
            m2.set_force_reload_delay(if delayed { 2 } else { 0 }, cycles);
        }
    } else if let Some(a12) = cart.a12.as_mut() {
        a12.force_reload(&mut cart.irq, cycles);
    }
}

fn rambo1_irq_disable(cart: &mut Cartridge, _addr: u16, _value: u8, cycles: u32) {
    if cart.board.irq_control != 0 {
        if let Some(m2) = cart.m2.as_mut() {
            m2.set_irq_enabled(&mut cart.irq, false, cycles);
        }
    } else if let Some(a12) = cart.a12.as_mut() {
        a12.set_irq_enabled(&mut cart.irq, false, cycles);
    }
}

fn rambo1_irq_enable(cart: &mut Cartridge, _addr: u16, _value: u8, cycles: u32) {
    if cart.board.irq_control != 0 {
        if let Some(m2) = cart.m2.as_mut() {
            m2.set_irq_enabled(&mut cart.irq, true, cycles);
        }
    } else if let Some(a12) = cart.a12.as_mut() {
        a12.set_irq_enabled(&mut cart.irq, true, cycles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::RomConfig;
    use crate::chip::SIZE_1K;
    use crate::irq::IrqLine;

    fn cart() -> Cartridge {
        let mut prg = vec![0u8; 16 * SIZE_8K];
        for (i, chunk) in prg.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        let mut chr = vec![0u8; 128 * SIZE_1K];
        for (i, chunk) in chr.chunks_mut(SIZE_1K).enumerate() {
            chunk.fill(i as u8);
        }
        Cartridge::new(RomConfig::new(BoardType::Tengen800032, prg, chr)).unwrap()
    }

    #[test]
    fn one_kib_chr_split() {
        let mut c = cart();
        // Write K0/K1 as a 2 KiB pair first.
        c.cpu_write(0x8000, 0x00, 0);
        c.cpu_write(0x8001, 0x10, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 0x10);
        assert_eq!(c.ppu_read(0x0400, 0), 0x11);

        // Enable the 1 KiB split and give the companions their own banks.
        c.cpu_write(0x8000, 0x28, 0);
        c.cpu_write(0x8001, 0x21, 0); // register 8 -> $0400 window
        c.cpu_write(0x8000, 0x20, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 0x10);
        assert_eq!(c.ppu_read(0x0400, 0), 0x21);
    }

    #[test]
    fn switchable_third_prg_slot() {
        let mut c = cart();
        c.cpu_write(0x8000, 0x0f, 0);
        c.cpu_write(0x8001, 0x05, 0);
        assert_eq!(c.cpu_peek(0xc000), Some(5));
    }

    #[test]
    fn cpu_cycle_mode_arms_the_m2_timer() {
        let mut c = cart();
        c.cpu_write(0xc000, 0x40, 0); // latch
        c.cpu_write(0xc001, 0x01, 0); // reload strobe, CPU-cycle source
        c.cpu_write(0xe001, 0, 0); // enable
        assert!(c.irq_scheduler().scheduled_cycle(IrqLine::M2Timer).is_some());
        assert!(c.irq_scheduler().scheduled_cycle(IrqLine::A12Timer).is_none());

        c.cpu_write(0xe000, 0, 0);
        assert!(c.irq_scheduler().scheduled_cycle(IrqLine::M2Timer).is_none());
    }
}
