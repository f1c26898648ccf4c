//! Sunsoft-3.
//!
//! Four 2 KiB CHR banks and one switchable 16 KiB PRG bank, plus a 16-bit
//! M2 counter loaded high-byte-first through a toggling register. The
//! counter asserts on wrap, so the shared timer runs with only the
//! IRQ-on-wrap flag set.

use crate::bank::{STD_CHR_2K, STD_PRG_16K};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, WriteHandlerEntry,
};
use crate::board::variant::{Sunsoft3State, VariantState};
use crate::board::Cartridge;
use crate::chip::{SIZE_4K, SIZE_8K, SIZE_32K, SIZE_256K};
use crate::mirroring::STD_MIRRORING_VH01;
use crate::boards::standard_mirroring_handler;
use crate::timer::m2::M2Flags;

const SUNSOFT3_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: sunsoft3_write, addr: 0x8000, size: SIZE_32K, mask: 0 },
    WriteHandlerEntry { handler: standard_mirroring_handler, addr: 0xe800, size: SIZE_4K, mask: 0 },
];

pub static SUNSOFT3: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Sunsoft3,
    name: "SUNSOFT-3",
    mapper_name: Some("SUNSOFT-3"),
    ops: BoardOps {
        init: Some(sunsoft3_init),
        reset: Some(sunsoft3_reset),
        end_frame: None,
        post_load: None,
    },
    init_prg: STD_PRG_16K,
    init_chr0: STD_CHR_2K,
    write_handlers: SUNSOFT3_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_256K,
    max_chr_rom_size: SIZE_256K,
    max_wram_size: [SIZE_8K, 0],
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::M2_TIMER),
    mirroring_values: STD_MIRRORING_VH01,
    ..BoardDescriptor::DEFAULT
};

fn sunsoft3_init(cart: &mut Cartridge) {
    cart.board.variant_state = VariantState::Sunsoft3(Sunsoft3State::default());
}

fn sunsoft3_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    cart.board.variant_state = VariantState::Sunsoft3(Sunsoft3State::default());
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_flags(&mut cart.irq, M2Flags::IRQ_ON_RELOAD, 0);
        m2.set_counter_enabled(&mut cart.irq, false, 0);
        m2.set_irq_enabled(&mut cart.irq, false, 0);
    }
}

fn sunsoft3_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    match addr & 0xf800 {
        0x8800 | 0x9800 | 0xa800 | 0xb800 => {
            cart.update_chr0_bank(((addr >> 12) & 0x03) as usize, value as i32);
        }
        0xc800 => {
            let load_low = cart.board.sunsoft3().load_toggle;
            cart.board.sunsoft3().load_toggle = !load_low;
            if let Some(m2) = cart.m2.as_mut() {
                if load_low {
                    m2.set_counter_lo(&mut cart.irq, value, cycles);
                } else {
                    m2.set_counter_hi(&mut cart.irq, value, cycles);
                }
            }
        }
        0xd800 => {
            let enabled = value & 0x10 != 0;
            cart.board.sunsoft3().load_toggle = false;
            if let Some(m2) = cart.m2.as_mut() {
                m2.ack(&mut cart.irq, cycles);
                m2.set_counter_enabled(&mut cart.irq, enabled, cycles);
                m2.set_irq_enabled(&mut cart.irq, enabled, cycles);
            }
        }
        0xf800 => {
            cart.update_prg_bank(1, value as i32);
        }
        _ => {}
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
        Cartridge::new(RomConfig::new(BoardType::Sunsoft3, prg, chr)).unwrap()
    }

    #[test]
    fn chr_and_prg_banking() {
        let mut c = cart();
        c.cpu_write(0x9800, 0x05, 0); // 2 KiB window 1
        assert_eq!(c.ppu_read(0x0800, 0), 10);
        c.cpu_write(0xf800, 0x03, 0);
        assert_eq!(c.cpu_peek(0x8000), Some(6));
    }

    #[test]
    fn counter_loads_high_byte_first() {
        let mut c = cart();
        c.cpu_write(0xd800, 0x10, 0); // enable resets the toggle
        c.cpu_write(0xc800, 0x02, 0); // high byte
        c.cpu_write(0xc800, 0x01, 0); // low byte
        let scheduled = c
            .irq_scheduler()
            .scheduled_cycle(IrqLine::M2Timer)
            .expect("armed");
        // 0x0201 clocks to reach zero, the crossing clock, and the
        // wrap-IRQ extra cycle.
        assert_eq!(scheduled, (0x0201 + 2) * 12);
    }
}
