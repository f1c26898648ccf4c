//! UNROM-512 (Sealie/RetroUSB) and its self-flashable variant, plus the
//! BTL-SMB2A bootleg that shares nothing with it except a taste for
//! fixed-function timers.
//!
//! The flash variant emulates the SST39SF040's JEDEC command set over the
//! `$8000-$BFFF` window: `$5555 <- $AA`, `$2AAA <- $55`, then byte program
//! (`$A0`), sector erase (`$80` + `$30`-less 4 KiB erase), or software ID
//! (`$90`/`$F0`). Every programmed or erased page is journaled into the
//! board's modified-range list; the embedder turns that into an IPS
//! overlay at save time.

use crate::bank::{BankTarget, BankWindow, Perms, STD_CHR_8K};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, WriteHandlerEntry,
};
use crate::board::variant::{Unrom512State, VariantState};
use crate::board::Cartridge;
use crate::chip::{SIZE_4K, SIZE_8K, SIZE_16K, SIZE_32K, SIZE_64K, SIZE_128K, SIZE_256K, SIZE_512K};
use crate::mirroring::STD_MIRRORING_01;
use crate::timer::m2::M2Flags;

const UNROM512_INIT_PRG: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_16K, 0x8000, Perms::READ, BankTarget::Rom),
    BankWindow::new(-1, 0, SIZE_16K, 0xc000, Perms::READ, BankTarget::Rom),
];

const UNROM512_WRITE_HANDLERS: &[WriteHandlerEntry] = &[WriteHandlerEntry {
    handler: unrom512_write,
    addr: 0x8000,
    size: SIZE_32K,
    mask: 0,
}];

const UNROM512_FLASH_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: unrom512_flash_write, addr: 0x8000, size: SIZE_16K, mask: 0 },
    WriteHandlerEntry { handler: unrom512_write, addr: 0xc000, size: SIZE_16K, mask: 0 },
];

const UNROM512_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Unrom512,
    name: "UNROM-512",
    ops: BoardOps {
        init: Some(unrom512_init),
        reset: None,
        end_frame: None,
        post_load: None,
    },
    init_prg: UNROM512_INIT_PRG,
    init_chr0: STD_CHR_8K,
    write_handlers: UNROM512_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_512K,
    max_chr_rom_size: SIZE_32K,
    min_vram_size: [SIZE_32K, 0],
    max_vram_size: [SIZE_32K, 0],
    flags: DescriptorFlags::MIRROR_MAPPER,
    mirroring_values: STD_MIRRORING_01,
    mirroring_shift: 7,
    ..BoardDescriptor::DEFAULT
};

pub static UNROM512: BoardDescriptor = UNROM512_BASE;

pub static UNROM512_FLASH: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Unrom512Flash,
    name: "UNROM-512-FLASH",
    ops: BoardOps {
        init: Some(unrom512_init),
        reset: None,
        end_frame: None,
        post_load: Some(unrom512_flash_post_load),
    },
    write_handlers: UNROM512_FLASH_WRITE_HANDLERS,
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::PRG_IPS),
    ..UNROM512_BASE
};

fn unrom512_init(cart: &mut Cartridge) {
    cart.board.variant_state = VariantState::Unrom512(Unrom512State::default());
}

fn unrom512_flash_post_load(cart: &mut Cartridge) {
    let id_mode = cart.board.unrom512().software_id_mode;
    set_software_id_mode(cart, id_mode);
}

/// `$C000-$FFFF` (and the whole window on the non-flash board): PRG bank,
/// CHR-RAM bank, one-screen select, and the flash high address lines.
fn unrom512_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    cart.update_prg_bank(0, (value & 0x1f) as i32);
    cart.update_chr0_bank(0, ((value & 0x60) >> 5) as i32);
    crate::boards::standard_mirroring_handler(cart, addr, value, cycles);
    cart.board.unrom512().latch = value;
}

fn set_software_id_mode(cart: &mut Cartridge, enabled: bool) {
    cart.board.unrom512().software_id_mode = enabled;
    let handler = enabled.then_some(
        unrom512_flash_read as crate::board::descriptor::ReadHandler,
    );
    cart.set_cpu_read_handler(0x8000, SIZE_32K, 0, handler);
}

/// Software-ID mode: even addresses return the SST manufacturer byte, odd
/// addresses the device byte matching the emulated chip size.
fn unrom512_flash_read(cart: &mut Cartridge, addr: u16, _open_bus: u8, _cycles: u32) -> u8 {
    if addr & 1 == 0 {
        0xbf
    } else {
        match cart.board.prg_rom.len() {
            SIZE_512K => 0xb7,
            SIZE_256K => 0xb6,
            SIZE_128K => 0xb5,
            _ => 0xff,
        }
    }
}

fn unrom512_flash_write(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    let latch = cart.board.unrom512().latch;
    let flash_address = ((addr & 0x7fff) as usize) | (((latch & 0x1f) as usize) << 14);
    let rom_len = cart.board.prg_rom.len().max(1);
    let rom_address = flash_address % rom_len;

    let state = *cart.board.unrom512();
    match state.command_index {
        0 => {
            if flash_address == 0x5555 && value == 0xaa {
                cart.board.unrom512().command_index = 1;
            } else if value == 0xf0 && state.software_id_mode {
                set_software_id_mode(cart, false);
            }
        }
        1 | 4 => {
            if flash_address == 0x2aaa && value == 0x55 {
                cart.board.unrom512().command_index += 1;
            } else {
                cart.board.unrom512().command_index = 0;
            }
        }
        2 => {
            if matches!(value, 0x80 | 0xa0 | 0x90 | 0xf0) {
                cart.board.unrom512().command_id = value;
                cart.board.unrom512().command_index = 3;
                if value == 0x90 {
                    set_software_id_mode(cart, true);
                } else if value == 0xf0 {
                    set_software_id_mode(cart, false);
                }
            } else {
                cart.board.unrom512().command_index = 0;
            }
        }
        3 => {
            if state.command_id == 0xa0 {
                cart.board.unrom512().dirty = true;
                cart.board.prg_rom.data[rom_address] = value;
                // The whole 4 KiB page goes into the journal.
                cart.board
                    .modified_ranges
                    .add((rom_address & 0x7f000) as u32, SIZE_4K as u32);
                cart.board.unrom512().command_index = 0;
            } else if state.command_id == 0x80 && value == 0xaa {
                cart.board.unrom512().command_index = 4;
            } else {
                cart.board.unrom512().command_index = 0;
            }
        }
        5 => {
            // Sector erase.
            cart.board.unrom512().dirty = true;
            let base = rom_address & 0x7f000;
            let end = (base + SIZE_4K).min(cart.board.prg_rom.len());
            cart.board.prg_rom.data[base..end].fill(0xff);
            cart.board.modified_ranges.add(base as u32, SIZE_4K as u32);
            cart.board.unrom512().command_index = 0;
        }
        _ => {
            cart.board.unrom512().command_index = 0;
        }
    }
}

// --- BTL-SMB2A ----------------------------------------------------------

const BTL_SMB2A_INIT_PRG: &[BankWindow] = &[
    BankWindow::new(6, 0, SIZE_8K, 0x6000, Perms::READ, BankTarget::Rom),
    BankWindow::new(4, 0, SIZE_8K, 0x8000, Perms::READ, BankTarget::Rom),
    BankWindow::new(5, 0, SIZE_8K, 0xa000, Perms::READ, BankTarget::Rom),
    BankWindow::new(0, 0, SIZE_8K, 0xc000, Perms::READ, BankTarget::Rom),
    BankWindow::new(7, 0, SIZE_8K, 0xe000, Perms::READ, BankTarget::Rom),
];

const BTL_SMB2A_WRITE_HANDLERS: &[WriteHandlerEntry] = &[WriteHandlerEntry {
    handler: btl_smb2a_write,
    addr: 0x8000,
    size: SIZE_32K,
    mask: 0,
}];

pub static BTL_SMB2A: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::BtlSmb2a,
    name: "BTL-SMB2A",
    ops: BoardOps {
        init: None,
        reset: Some(btl_smb2a_reset),
        end_frame: None,
        post_load: None,
    },
    init_prg: BTL_SMB2A_INIT_PRG,
    init_chr0: STD_CHR_8K,
    write_handlers: BTL_SMB2A_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_64K,
    max_chr_rom_size: SIZE_8K,
    flags: DescriptorFlags::M2_TIMER,
    ..BoardDescriptor::DEFAULT
};

fn btl_smb2a_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_flags(
            &mut cart.irq,
            M2Flags::ONE_SHOT | M2Flags::AUTO_IRQ_DISABLE,
            0,
        );
        m2.set_enabled(&mut cart.irq, false, 0);
    }
}

/// The timer fires a fixed 4096 cycles after being armed at `$A000`.
fn btl_smb2a_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    match addr & 0xe000 {
        0x8000 => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.ack(&mut cart.irq, cycles);
                m2.set_counter_enabled(&mut cart.irq, false, cycles);
                m2.set_irq_enabled(&mut cart.irq, false, cycles);
            }
        }
        0xa000 => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.set_counter_enabled(&mut cart.irq, true, cycles);
                m2.set_irq_enabled(&mut cart.irq, true, cycles);
                m2.set_counter(&mut cart.irq, 4096, cycles);
            }
        }
        0xe000 => {
            cart.update_prg_bank(3, value as i32);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::RomConfig;
    use crate::irq::IrqLine;
    use crate::patch::apply_ips;

    fn flash_cart() -> Cartridge {
        let mut prg = vec![0u8; SIZE_128K];
        for (i, chunk) in prg.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        Cartridge::new(RomConfig::new(BoardType::Unrom512Flash, prg, Vec::new())).unwrap()
    }

    /// Drive the JEDEC unlock prefix, switching the flash high address
    /// lines through the banking latch as needed.
    fn jedec_prefix(c: &mut Cartridge) {
        c.cpu_write(0xc000, 0x01, 0); // latch: A14 set -> $5555 reachable
        c.cpu_write(0x9555, 0xaa, 0);
        c.cpu_write(0xc000, 0x00, 0);
        c.cpu_write(0xaaaa, 0x55, 0);
        c.cpu_write(0xc000, 0x01, 0);
    }

    #[test]
    fn banking_and_one_screen_select() {
        let mut prg = vec![0u8; SIZE_128K];
        for (i, chunk) in prg.chunks_mut(SIZE_16K).enumerate() {
            chunk.fill(i as u8);
        }
        let mut c =
            Cartridge::new(RomConfig::new(BoardType::Unrom512, prg, Vec::new())).unwrap();
        c.cpu_write(0x8000, 0x03, 0);
        assert_eq!(c.cpu_peek(0x8000), Some(3));
        assert_eq!(c.cpu_peek(0xc000), Some(7), "last bank fixed");

        // CHR-RAM banking: four 8 KiB pages.
        c.ppu_write(0x0000, 0x11, 0);
        c.cpu_write(0x8000, 0x23, 0);
        c.ppu_write(0x0000, 0x22, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 0x22);
        c.cpu_write(0x8000, 0x03, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 0x11);

        // Bit 7 flips the single-screen nametable.
        c.cpu_write(0x8000, 0x80, 0);
        assert_eq!(c.board.nmt_banks[0].bank, 1);
    }

    #[test]
    fn flash_byte_program_journals_page() {
        let mut c = flash_cart();
        jedec_prefix(&mut c);
        c.cpu_write(0x9555, 0xa0, 0);
        c.cpu_write(0x9000, 0x42, 0);

        // Latch is 1, so $9000 programs flash address $5000.
        assert_eq!(c.board.prg_rom.data[0x5000], 0x42);
        let ranges: Vec<_> = c.board.modified_ranges.iter().collect();
        assert_eq!(ranges, vec![(0x5000, SIZE_4K as u32)]);

        // The overlay restores the write on top of a pristine image.
        let overlay = c.ips_overlay().expect("journal produced a patch");
        let mut pristine: Vec<u8> = {
            let mut prg = vec![0u8; SIZE_128K];
            for (i, chunk) in prg.chunks_mut(SIZE_8K).enumerate() {
                chunk.fill(i as u8);
            }
            prg
        };
        apply_ips(&mut pristine, &overlay, None).unwrap();
        assert_eq!(pristine[0x5000], 0x42);
    }

    #[test]
    fn flash_sector_erase() {
        let mut c = flash_cart();
        jedec_prefix(&mut c);
        c.cpu_write(0x9555, 0x80, 0);
        jedec_prefix(&mut c);
        c.cpu_write(0x9000, 0x30, 0);

        assert!(c.board.prg_rom.data[0x5000..0x6000].iter().all(|&b| b == 0xff));
        assert_eq!(c.board.modified_ranges.len(), 1);
    }

    #[test]
    fn software_id_mode() {
        let mut c = flash_cart();
        jedec_prefix(&mut c);
        c.cpu_write(0x9555, 0x90, 0);
        assert_eq!(c.cpu_read(0x8000, 0, 0), Some(0xbf));
        assert_eq!(c.cpu_read(0x8001, 0, 0), Some(0xb5)); // 128 KiB device

        // $F0 exits (the first write just unwinds the command sequence);
        // normal ROM reads come back.
        c.cpu_write(0x8000, 0xf0, 0);
        c.cpu_write(0x8000, 0xf0, 0);
        assert_eq!(c.cpu_peek(0x8000), c.cpu_read(0x8000, 0, 0));
    }

    #[test]
    fn smb2a_fixed_timer() {
        let mut prg = vec![0u8; SIZE_64K];
        for (i, chunk) in prg.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        let mut c =
            Cartridge::new(RomConfig::new(BoardType::BtlSmb2a, prg, vec![0; SIZE_8K])).unwrap();
        assert_eq!(c.cpu_peek(0x6000), Some(6));

        c.cpu_write(0xa000, 0, 1000 * 12);
        let scheduled = c
            .irq_scheduler()
            .scheduled_cycle(IrqLine::M2Timer)
            .expect("armed");
        assert_eq!(scheduled, (1000 + 4096 + 1) * 12);
    }
}
