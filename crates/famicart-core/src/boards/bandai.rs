//! Bandai FCG / LZ93D50 family.
//!
//! One register file mirrored every 16 bytes: eight 1 KiB CHR banks, one
//! 16 KiB PRG bank, mirroring, and a 16-bit down-counting M2 IRQ timer
//! (`$0A` enable + reload strobe, `$0B`/`$0C` reload bytes). The FCG-1/2
//! decode it at `$6000`, the LZ93D50 at `$8000`. JUMP2 (Famicom Jump II)
//! repurposes the CHR registers as a PRG outer-bank OR.

use crate::bank::{STD_CHR_1K, STD_PRG_16K};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, WriteHandlerEntry,
};
use crate::board::Cartridge;
use crate::chip::{SIZE_8K, SIZE_32K, SIZE_256K, SIZE_512K};
use crate::mirroring::STD_MIRRORING_VH01;

const BANDAI_FCG_WRITE_HANDLERS: &[WriteHandlerEntry] = &[WriteHandlerEntry {
    handler: bandai_write,
    addr: 0x6000,
    size: SIZE_8K,
    mask: 0,
}];

const BANDAI_LZ93D50_WRITE_HANDLERS: &[WriteHandlerEntry] = &[WriteHandlerEntry {
    handler: bandai_write,
    addr: 0x8000,
    size: SIZE_32K,
    mask: 0,
}];

const BANDAI_OPS: BoardOps = BoardOps {
    init: None,
    reset: Some(bandai_reset),
    end_frame: None,
    post_load: None,
};

const BANDAI_FCG_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::BandaiFcg,
    name: "BANDAI-FCG",
    ops: BANDAI_OPS,
    init_prg: STD_PRG_16K,
    init_chr0: STD_CHR_1K,
    write_handlers: BANDAI_FCG_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_256K,
    max_chr_rom_size: SIZE_256K,
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::M2_TIMER),
    mirroring_values: STD_MIRRORING_VH01,
    ..BoardDescriptor::DEFAULT
};

pub static BANDAI_FCG: BoardDescriptor = BANDAI_FCG_BASE;

pub static BANDAI_LZ93D50: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::BandaiLz93d50,
    name: "BANDAI-LZ93D50",
    write_handlers: BANDAI_LZ93D50_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_512K,
    // The serial EEPROM hangs off this window on real boards; the 256
    // bytes keep its footprint without modelling the protocol.
    max_wram_size: [256, 0],
    ..BANDAI_FCG_BASE
};

pub static BANDAI_JUMP2: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::BandaiJump2,
    name: "BANDAI-JUMP2",
    write_handlers: BANDAI_LZ93D50_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_512K,
    max_wram_size: [SIZE_8K, 0],
    ..BANDAI_FCG_BASE
};

fn bandai_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_irq_enabled(&mut cart.irq, false, 0);
    }
    if cart.board_type() == BoardType::BandaiJump2 {
        cart.board.prg_and = 0x0f;
        cart.board.prg_or = 0x00;
        for i in 0..8 {
            cart.board.chr_banks0[i].bank = i as i32;
        }
    }
}

fn bandai_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    let jump2 = cart.board_type() == BoardType::BandaiJump2;
    match addr & 0x0f {
        0x00..=0x03 if jump2 => {
            // Outer PRG bank bit (A18) assembled from any of the four low
            // registers.
            let or = if value != 0 { 0x10 } else { 0x00 };
            if or != cart.board.prg_or {
                cart.board.prg_or = or;
                cart.prg_sync();
            }
        }
        0x00..=0x07 => {
            if !jump2 {
                cart.update_chr0_bank((addr & 0x07) as usize, value as i32);
            }
        }
        0x08 => {
            cart.update_prg_bank(1, value as i32);
        }
        0x09 => {
            cart.standard_mirroring_write(value);
        }
        0x0a => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.force_reload(&mut cart.irq, cycles);
                m2.set_irq_enabled(&mut cart.irq, value & 0x01 != 0, cycles);
            }
        }
        0x0b => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.set_reload_lo(&mut cart.irq, value, cycles);
            }
        }
        0x0c => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.set_reload_hi(&mut cart.irq, value, cycles);
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

    fn cart(board: BoardType) -> Cartridge {
        let mut prg = vec![0u8; 16 * SIZE_8K];
        for (i, chunk) in prg.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        let mut chr = vec![0u8; 128 * SIZE_1K];
        for (i, chunk) in chr.chunks_mut(SIZE_1K).enumerate() {
            chunk.fill(i as u8);
        }
        Cartridge::new(RomConfig::new(board, prg, chr)).unwrap()
    }

    #[test]
    fn fcg_registers_decode_at_6000() {
        let mut c = cart(BoardType::BandaiFcg);
        c.cpu_write(0x6003, 0x2a, 0);
        assert_eq!(c.ppu_read(0x0c00, 0), 0x2a);
        c.cpu_write(0x6008, 0x03, 0);
        assert_eq!(c.cpu_peek(0x8000), Some(6));
    }

    #[test]
    fn timer_reload_and_enable() {
        let mut c = cart(BoardType::BandaiLz93d50);
        c.cpu_write(0x800b, 0x10, 0);
        c.cpu_write(0x800c, 0x00, 0);
        c.cpu_write(0x800a, 0x01, 0);
        let scheduled = c
            .irq_scheduler()
            .scheduled_cycle(IrqLine::M2Timer)
            .expect("timer armed");
        // Counter 0x10, crossing on the following clock.
        assert_eq!(scheduled, (0x10 + 1) * 12);
    }

    #[test]
    fn jump2_outer_bank() {
        let mut c = cart(BoardType::BandaiJump2);
        c.cpu_write(0x8000, 0x01, 0);
        assert_eq!(c.board.prg_or, 0x10);
        c.cpu_write(0x8000, 0x00, 0);
        assert_eq!(c.board.prg_or, 0x00);
    }
}
