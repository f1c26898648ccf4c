//! Jaleco SS88006 (JF-23/24/25/27/29/37/40).
//!
//! Every bank register is written as two four-bit halves at consecutive
//! addresses. The IRQ counter is the shared M2 timer with a selectable
//! width (16/12/8/4 bits) and a nibble-addressed 16-bit reload.

use crate::bank::{STD_CHR_1K, STD_PRG_8K};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, WriteHandlerEntry,
};
use crate::board::Cartridge;
use crate::chip::{SIZE_8K, SIZE_32K, SIZE_256K};
use crate::mirroring::Mirroring;
use crate::timer::m2::M2Flags;

const JALECO_WRITE_HANDLERS: &[WriteHandlerEntry] = &[WriteHandlerEntry {
    handler: jaleco_write,
    addr: 0x8000,
    size: SIZE_32K,
    mask: 0,
}];

pub static JALECO_SS88006: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::JalecoSs88006,
    name: "JALECO-JF-23/24/25/27/29/37/40",
    mapper_name: Some("Jaleco SS88006"),
    ops: BoardOps {
        init: None,
        reset: Some(jaleco_reset),
        end_frame: None,
        post_load: None,
    },
    init_prg: STD_PRG_8K,
    init_chr0: STD_CHR_1K,
    write_handlers: JALECO_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_256K,
    max_chr_rom_size: SIZE_256K,
    max_wram_size: [SIZE_8K, 0],
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::M2_TIMER),
    ..BoardDescriptor::DEFAULT
};

fn jaleco_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_flags(&mut cart.irq, M2Flags::IRQ_ON_RELOAD, 0);
        m2.set_enabled(&mut cart.irq, false, 0);
    }
}

#[inline]
fn merge_nibble(current: i32, value: u8, low: bool) -> i32 {
    if low {
        (current & 0xf0) | (value & 0x0f) as i32
    } else {
        (current & 0x0f) | (((value & 0x0f) as i32) << 4)
    }
}

fn jaleco_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    let low = addr & 1 == 0;
    match addr {
        // PRG banks: two nibbles each at $8000/$8002, $9000 (and the
        // high slot pair).
        0x8000..=0x8003 | 0x9000..=0x9001 => {
            let window = ((((addr & 2) >> 1) | ((addr & 0x1000) >> 11)) + 1) as usize;
            let bank = merge_nibble(cart.board.prg_banks[window].bank, value, low);
            cart.update_prg_bank(window, bank);
        }
        // CHR banks 0..3.
        0xa000..=0xa003 | 0xb000..=0xb003 => {
            let window = (((addr & 2) >> 1) | ((addr & 0x1000) >> 11)) as usize;
            let bank = merge_nibble(cart.board.chr_banks0[window].bank, value, low);
            cart.update_chr0_bank(window, bank);
        }
        // CHR banks 4..5.
        0xc000..=0xc003 => {
            let window = ((((addr & 2) >> 1) | ((addr & 0x4000) >> 12)) & 0x07) as usize;
            let bank = merge_nibble(cart.board.chr_banks0[window].bank, value, low);
            cart.update_chr0_bank(window, bank);
        }
        // CHR banks 6..7.
        0xd000..=0xd003 => {
            let window = ((((addr & 2) >> 1) | ((addr & 0xc000) >> 13)) & 0x07) as usize;
            let bank = merge_nibble(cart.board.chr_banks0[window].bank, value, low);
            cart.update_chr0_bank(window, bank);
        }
        // IRQ reload, one nibble per address.
        0xe000..=0xe003 => {
            if let Some(m2) = cart.m2.as_mut() {
                let shift = 4 * (addr & 3) as u32;
                let mut reload = m2.reload();
                reload &= !(0x0f << shift);
                reload |= ((value & 0x0f) as u32) << shift;
                m2.set_reload(&mut cart.irq, reload, cycles);
            }
        }
        0xf000 => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.force_reload(&mut cart.irq, cycles);
            }
        }
        0xf001 => {
            if let Some(m2) = cart.m2.as_mut() {
                let size = if value & 0x02 != 0 {
                    12
                } else if value & 0x04 != 0 {
                    8
                } else if value & 0x08 != 0 {
                    4
                } else {
                    16
                };
                m2.ack(&mut cart.irq, cycles);
                m2.set_size(&mut cart.irq, size, cycles);
                m2.set_enabled(&mut cart.irq, value & 0x01 != 0, cycles);
            }
        }
        0xf002 => {
            let mirroring = match value & 0x03 {
                0x00 => Mirroring::Horizontal,
                0x01 => Mirroring::Vertical,
                0x02 => Mirroring::SingleScreenA,
                _ => Mirroring::SingleScreenB,
            };
            cart.set_ppu_mirroring(mirroring);
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
        let mut prg = vec![0u8; 32 * SIZE_8K];
        for (i, chunk) in prg.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        let mut chr = vec![0u8; 256 * SIZE_1K];
        for (i, chunk) in chr.chunks_mut(SIZE_1K).enumerate() {
            chunk.fill(i as u8);
        }
        Cartridge::new(RomConfig::new(BoardType::JalecoSs88006, prg, chr)).unwrap()
    }

    #[test]
    fn nibble_bank_writes() {
        let mut c = cart();
        c.cpu_write(0x8000, 0x05, 0);
        c.cpu_write(0x8001, 0x01, 0);
        assert_eq!(c.cpu_peek(0x8000), Some(0x15));

        c.cpu_write(0x9000, 0x02, 0);
        assert_eq!(c.cpu_peek(0xc000), Some(0x02));

        c.cpu_write(0xa002, 0x07, 0);
        c.cpu_write(0xa003, 0x02, 0);
        assert_eq!(c.ppu_read(0x0400, 0), 0x27);

        c.cpu_write(0xd002, 0x09, 0);
        assert_eq!(c.board.chr_banks0[7].bank, 0x09);
    }

    #[test]
    fn irq_width_selection() {
        let mut c = cart();
        // Reload 0x0fff via nibbles, then run in 12-bit mode.
        c.cpu_write(0xe000, 0x0f, 0);
        c.cpu_write(0xe001, 0x0f, 0);
        c.cpu_write(0xe002, 0x0f, 0);
        c.cpu_write(0xe003, 0x00, 0);
        c.cpu_write(0xf000, 0, 0);
        c.cpu_write(0xf001, 0x03, 0);
        let scheduled = c
            .irq_scheduler()
            .scheduled_cycle(IrqLine::M2Timer)
            .expect("armed");
        // Down-counter from 0xfff, crossing clock, then the IRQ_ON_RELOAD
        // extra cycle.
        assert_eq!(scheduled, (0xfff + 2) * 12);
    }

    #[test]
    fn mirroring_register() {
        let mut c = cart();
        c.cpu_write(0xf002, 0x00, 0);
        assert_eq!(c.board.nmt_banks[2].bank, 1); // horizontal
        c.cpu_write(0xf002, 0x03, 0);
        assert_eq!(c.board.nmt_banks[0].bank, 1); // single-screen B
    }
}
