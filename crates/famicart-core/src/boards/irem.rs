//! Irem H3001 (IF-IRQ).
//!
//! Three switchable 8 KiB PRG banks, eight 1 KiB CHR banks, and a one-shot
//! 16-bit M2 down-counter with a big-endian reload pair at `$9005`/`$9006`.

use crate::bank::{STD_CHR_1K, STD_PRG_8K};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, WriteHandlerEntry,
};
use crate::board::Cartridge;
use crate::boards::standard_mirroring_handler;
use crate::chip::{SIZE_4K, SIZE_8K, SIZE_32K, SIZE_256K};
use crate::mirroring::STD_MIRRORING_VH;
use crate::timer::m2::M2Flags;

const IREM_H3001_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: irem_h3001_write, addr: 0x8000, size: SIZE_32K, mask: 0 },
    WriteHandlerEntry { handler: standard_mirroring_handler, addr: 0x9001, size: SIZE_4K, mask: 0xf007 },
];

pub static IREM_H3001: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::IremH3001,
    name: "IREM-H3001",
    ops: BoardOps {
        init: None,
        reset: Some(irem_h3001_reset),
        end_frame: None,
        post_load: None,
    },
    init_prg: STD_PRG_8K,
    init_chr0: STD_CHR_1K,
    write_handlers: IREM_H3001_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_256K,
    max_chr_rom_size: SIZE_256K,
    max_wram_size: [SIZE_8K, 0],
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::M2_TIMER),
    mirroring_values: STD_MIRRORING_VH,
    mirroring_shift: 7,
    ..BoardDescriptor::DEFAULT
};

fn irem_h3001_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_flags(&mut cart.irq, M2Flags::ONE_SHOT, 0);
        m2.set_irq_enabled(&mut cart.irq, false, 0);
    }
    cart.board.prg_banks[1].bank = 0x00;
    cart.board.prg_banks[2].bank = 0x01;
    cart.board.prg_banks[3].bank = 0xfe;
}

fn irem_h3001_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    match addr & 0xf007 {
        0x8000..=0x8007 | 0xa000..=0xa007 | 0xc000..=0xc007 => {
            let window = (((addr >> 13) & 0x03) + 1) as usize;
            cart.update_prg_bank(window, value as i32);
        }
        0xb000..=0xb007 => {
            cart.update_chr0_bank((addr & 0x07) as usize, value as i32);
        }
        0x9003 => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.ack(&mut cart.irq, cycles);
                m2.set_irq_enabled(&mut cart.irq, value & 0x80 != 0, cycles);
            }
        }
        0x9004 => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.force_reload(&mut cart.irq, cycles);
            }
        }
        0x9005 => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.set_reload_hi(&mut cart.irq, value, cycles);
            }
        }
        0x9006 => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.set_reload_lo(&mut cart.irq, value, cycles);
            }
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
        let mut chr = vec![0u8; 128 * SIZE_1K];
        for (i, chunk) in chr.chunks_mut(SIZE_1K).enumerate() {
            chunk.fill(i as u8);
        }
        Cartridge::new(RomConfig::new(BoardType::IremH3001, prg, chr)).unwrap()
    }

    #[test]
    fn reset_layout_and_banking() {
        let mut c = cart();
        assert_eq!(c.cpu_peek(0x8000), Some(0));
        assert_eq!(c.cpu_peek(0xa000), Some(1));
        assert_eq!(c.cpu_peek(0xc000), Some(30)); // 0xfe wraps on 32 banks
        assert_eq!(c.cpu_peek(0xe000), Some(31));

        c.cpu_write(0xa001, 0x07, 0);
        assert_eq!(c.cpu_peek(0xa000), Some(7));
        c.cpu_write(0xb003, 0x11, 0);
        assert_eq!(c.ppu_read(0x0c00, 0), 0x11);
    }

    #[test]
    fn one_shot_timer() {
        let mut c = cart();
        c.cpu_write(0x9005, 0x01, 0); // reload hi
        c.cpu_write(0x9006, 0x00, 0); // reload lo
        c.cpu_write(0x9004, 0, 0); // load counter
        c.cpu_write(0x9003, 0x80, 0); // enable
        let scheduled = c
            .irq_scheduler()
            .scheduled_cycle(IrqLine::M2Timer)
            .expect("armed");
        assert_eq!(scheduled, (0x100 + 1) * 12);

        // Mirroring register sits at bit 7 on this board.
        c.cpu_write(0x9001, 0x80, 0);
        assert_eq!(c.board.nmt_banks[2].bank, 1);
    }
}
