//! Konami VRC boards: VRC2, VRC4 (all lettered revisions), VRC3, VRC6.
//!
//! The VRC2/4 line shares one register file; revisions differ only in
//! which two CPU address bits select the register column ("even/odd" and
//! "low/high half" of each CHR bank) and whether the IRQ block exists.
//! Instead of one handler per revision, `vrc24_init` installs the shared
//! handlers at the addresses the revision's bit pair produces; the compat
//! descriptors install them twice, once per accepted layout.
//!
//! The VRC4/VRC6 IRQ is a CPU-cycle up-counter with an optional 341/3
//! prescaler that approximates scanlines; both feed the shared M2 timer.
//! VRC3 is the same idea with a 16-bit counter loaded a nibble at a time.
//! VRC6's expansion audio is out of scope; writes to its audio registers
//! fall on the floor.

use crate::bank::{BankTarget, BankWindow, Perms, STD_CHR_1K, STD_CHR_8K, STD_PRG_8K, STD_PRG_16K};
use crate::board::descriptor::{
    BoardDescriptor, BoardOps, BoardType, DescriptorFlags, WriteHandlerEntry,
};
use crate::board::variant::{VariantState, Vrc2State};
use crate::board::Cartridge;
use crate::boards::standard_mirroring_handler;
use crate::chip::{SIZE_4K, SIZE_8K, SIZE_32K, SIZE_128K, SIZE_256K, SIZE_512K};
use crate::mirroring::{STD_MIRRORING_VH, STD_MIRRORING_VH01};
use crate::timer::m2::M2Flags;

/// VRC2a sees CHR banks in 2x units: the register value is shifted right
/// once before hitting the bus.
const VRC2A_INIT_CHR: &[BankWindow] = &[
    BankWindow::new(0, 1, crate::chip::SIZE_1K, 0x0000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 1, crate::chip::SIZE_1K, 0x0400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 1, crate::chip::SIZE_1K, 0x0800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 1, crate::chip::SIZE_1K, 0x0c00, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 1, crate::chip::SIZE_1K, 0x1000, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 1, crate::chip::SIZE_1K, 0x1400, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 1, crate::chip::SIZE_1K, 0x1800, Perms::READWRITE, BankTarget::Auto),
    BankWindow::new(0, 1, crate::chip::SIZE_1K, 0x1c00, Perms::READWRITE, BankTarget::Auto),
];

const VRC6_INIT_PRG: &[BankWindow] = &[
    BankWindow::new(0, 0, SIZE_8K, 0x6000, Perms::READWRITE, BankTarget::Ram0),
    BankWindow::new(0, 0, crate::chip::SIZE_16K, 0x8000, Perms::READ, BankTarget::Rom),
    BankWindow::new(0xfe, 0, SIZE_8K, 0xc000, Perms::READ, BankTarget::Rom),
    BankWindow::new(0xff, 0, SIZE_8K, 0xe000, Perms::READ, BankTarget::Rom),
];

const VRC24_OPS: BoardOps = BoardOps {
    init: Some(vrc24_init),
    reset: Some(vrc4_reset),
    end_frame: None,
    post_load: None,
};

const VRC2_OPS: BoardOps = BoardOps {
    init: Some(vrc24_init),
    reset: None,
    end_frame: None,
    post_load: None,
};

const VRC2_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc2b,
    name: "KONAMI-VRC-2B",
    ops: VRC2_OPS,
    init_prg: STD_PRG_8K,
    init_chr0: STD_CHR_1K,
    max_prg_rom_size: SIZE_256K,
    max_chr_rom_size: SIZE_256K,
    flags: DescriptorFlags::MIRROR_MAPPER,
    mirroring_values: STD_MIRRORING_VH,
    ..BoardDescriptor::DEFAULT
};

pub static VRC2A: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc2a,
    name: "KONAMI-VRC-2A",
    init_chr0: VRC2A_INIT_CHR,
    max_chr_rom_size: SIZE_128K,
    max_wram_size: [SIZE_8K, 0],
    ..VRC2_BASE
};

pub static VRC2B: BoardDescriptor = VRC2_BASE;

pub static VRC2C: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc2c,
    name: "KONAMI-VRC-2C",
    max_wram_size: [SIZE_8K, 0],
    ..VRC2_BASE
};

const VRC4_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc4a,
    name: "KONAMI-VRC-4A",
    ops: VRC24_OPS,
    init_prg: STD_PRG_8K,
    init_chr0: STD_CHR_1K,
    max_prg_rom_size: SIZE_256K,
    max_chr_rom_size: SIZE_512K,
    max_wram_size: [SIZE_8K, 0],
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::M2_TIMER),
    mirroring_values: STD_MIRRORING_VH01,
    ..BoardDescriptor::DEFAULT
};

pub static VRC4A: BoardDescriptor = VRC4_BASE;

pub static VRC4B: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc4b,
    name: "KONAMI-VRC-4B",
    max_wram_size: [SIZE_4K, 0],
    ..VRC4_BASE
};

pub static VRC4C: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc4c,
    name: "KONAMI-VRC-4C",
    ..VRC4_BASE
};

pub static VRC4D: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc4d,
    name: "KONAMI-VRC-4D",
    max_wram_size: [SIZE_4K, 0],
    ..VRC4_BASE
};

pub static VRC4E: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc4e,
    name: "KONAMI-VRC-4E",
    max_wram_size: [SIZE_4K, 0],
    ..VRC4_BASE
};

pub static VRC4F: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc4f,
    name: "KONAMI-VRC-4F",
    max_wram_size: [SIZE_4K, 0],
    ..VRC4_BASE
};

pub static VRC4AC_COMPAT: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc4AcCompat,
    name: "KONAMI-VRC-4A/4C-COMPAT",
    ..VRC4_BASE
};

pub static VRC4BD_COMPAT: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc4BdCompat,
    name: "KONAMI-VRC-4B/4D-COMPAT",
    ..VRC4_BASE
};

pub static VRC2B_VRC4E_COMPAT: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc2bVrc4eCompat,
    name: "KONAMI-VRC-4E/2B-COMPAT",
    ..VRC4_BASE
};

const VRC3_WRITE_HANDLERS: &[WriteHandlerEntry] = &[WriteHandlerEntry {
    handler: vrc3_write,
    addr: 0x8000,
    size: SIZE_32K,
    mask: 0,
}];

pub static VRC3: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc3,
    name: "KONAMI-VRC-3",
    ops: BoardOps {
        init: None,
        reset: Some(vrc3_reset),
        end_frame: None,
        post_load: None,
    },
    init_prg: STD_PRG_16K,
    init_chr0: STD_CHR_8K,
    write_handlers: VRC3_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_128K,
    max_chr_rom_size: SIZE_8K,
    max_wram_size: [SIZE_8K, 0],
    flags: DescriptorFlags::M2_TIMER,
    ..BoardDescriptor::DEFAULT
};

const VRC6A_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: vrc6_write, addr: 0x8000, size: SIZE_4K, mask: 0 },
    WriteHandlerEntry { handler: vrc6_write, addr: 0xb000, size: SIZE_4K, mask: 0 },
    WriteHandlerEntry { handler: vrc6_write, addr: 0xc000, size: SIZE_4K, mask: 0 },
    WriteHandlerEntry { handler: vrc6_even_chr, addr: 0xd000, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_even_chr, addr: 0xd002, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_even_chr, addr: 0xe000, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_even_chr, addr: 0xe002, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_odd_chr, addr: 0xd001, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_odd_chr, addr: 0xd003, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_odd_chr, addr: 0xe001, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_odd_chr, addr: 0xe003, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_write, addr: 0xf000, size: SIZE_4K, mask: 0 },
];

/// VRC6b swaps A0/A1, exchanging the even/odd register columns.
const VRC6B_WRITE_HANDLERS: &[WriteHandlerEntry] = &[
    WriteHandlerEntry { handler: vrc6_write, addr: 0x8000, size: SIZE_4K, mask: 0 },
    WriteHandlerEntry { handler: vrc6_write, addr: 0xb003, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_write, addr: 0xc000, size: SIZE_4K, mask: 0 },
    WriteHandlerEntry { handler: vrc6_even_chr, addr: 0xd000, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_even_chr, addr: 0xd001, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_even_chr, addr: 0xe000, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_even_chr, addr: 0xe001, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_odd_chr, addr: 0xd002, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_odd_chr, addr: 0xd003, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_odd_chr, addr: 0xe002, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_odd_chr, addr: 0xe003, size: SIZE_4K, mask: 0xf003 },
    WriteHandlerEntry { handler: vrc6_write, addr: 0xf000, size: SIZE_4K, mask: 0 },
];

const VRC6_BASE: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc6a,
    name: "KONAMI-VRC-6A",
    ops: BoardOps {
        init: None,
        reset: Some(vrc6_reset),
        end_frame: None,
        post_load: None,
    },
    init_prg: VRC6_INIT_PRG,
    init_chr0: STD_CHR_1K,
    write_handlers: VRC6A_WRITE_HANDLERS,
    max_prg_rom_size: SIZE_256K,
    max_chr_rom_size: SIZE_256K,
    max_wram_size: [SIZE_8K, 0],
    flags: DescriptorFlags::MIRROR_MAPPER.union(DescriptorFlags::M2_TIMER),
    mirroring_values: STD_MIRRORING_VH01,
    mirroring_shift: 2,
    ..BoardDescriptor::DEFAULT
};

pub static VRC6A: BoardDescriptor = VRC6_BASE;

pub static VRC6B: BoardDescriptor = BoardDescriptor {
    board_type: BoardType::Vrc6b,
    name: "KONAMI-VRC-6B",
    write_handlers: VRC6B_WRITE_HANDLERS,
    ..VRC6_BASE
};

/// Per-revision register address bits: (even/odd bit, low/high bit,
/// compat pair, VRC2 copy-protection latch present, IRQ block present).
fn vrc24_layout(board_type: BoardType) -> (u16, u16, Option<(u16, u16)>, bool, bool) {
    match board_type {
        BoardType::Vrc2a => (0x02, 0x01, None, true, false),
        BoardType::Vrc2b => (0x01, 0x02, None, true, false),
        BoardType::Vrc2c => (0x02, 0x01, None, false, false),
        BoardType::Vrc4a => (0x02, 0x04, None, false, true),
        BoardType::Vrc4b => (0x02, 0x01, None, false, true),
        BoardType::Vrc4c => (0x40, 0x80, None, false, true),
        BoardType::Vrc4d => (0x08, 0x04, None, false, true),
        BoardType::Vrc4e => (0x04, 0x08, None, false, true),
        BoardType::Vrc4f => (0x01, 0x02, None, false, true),
        BoardType::Vrc4AcCompat => (0x02, 0x04, Some((0x40, 0x80)), false, true),
        BoardType::Vrc4BdCompat => (0x02, 0x01, Some((0x08, 0x04)), false, true),
        BoardType::Vrc2bVrc4eCompat => (0x04, 0x08, Some((0x01, 0x02)), true, true),
        _ => (0x01, 0x02, None, false, false),
    }
}

/// Install the shared VRC2/4 handlers at the revision's register
/// addresses.
fn vrc24_init(cart: &mut Cartridge) {
    cart.board.variant_state = VariantState::Vrc2(Vrc2State::default());

    let (m1, m2, compat, protection, has_irq) = vrc24_layout(cart.board_type());
    let mask = 0xf000 | m1 | m2;

    cart.set_cpu_write_handler(0x8000, SIZE_4K, 0, Some(vrc4_prg));
    cart.set_cpu_write_handler(0xa000, SIZE_4K, 0, Some(vrc4_prg));

    cart.set_cpu_write_handler(0x9000, SIZE_4K, mask, Some(standard_mirroring_handler));
    cart.set_cpu_write_handler(0x9000 | m1, SIZE_4K, mask, Some(standard_mirroring_handler));

    fn install_chr(cart: &mut Cartridge, lo: u16, hi: u16, mask: u16) {
        for base in [0xb000u16, 0xc000, 0xd000, 0xe000] {
            cart.set_cpu_write_handler(base, SIZE_4K, mask, Some(vrc4_chr_even_lo));
            cart.set_cpu_write_handler(base | lo, SIZE_4K, mask, Some(vrc4_chr_odd_lo));
            cart.set_cpu_write_handler(base | hi, SIZE_4K, mask, Some(vrc4_chr_even_hi));
            cart.set_cpu_write_handler(base | hi | lo, SIZE_4K, mask, Some(vrc4_chr_odd_hi));
        }
    }
    install_chr(cart, m2, m1, mask);
    if let Some((c1, c2)) = compat {
        let compat_mask = 0xf000 | c1 | c2;
        install_chr(cart, c2, c1, compat_mask);
    }

    if protection && cart.board.wram[0].is_none() {
        cart.set_cpu_write_handler(0x6000, SIZE_4K, 0, Some(vrc2_security_write));
        cart.set_cpu_read_handler(0x6000, SIZE_4K, 0, Some(vrc2_security_read));
    }

    if has_irq {
        cart.set_cpu_write_handler(0xf000, SIZE_4K, mask, Some(vrc4_irq_latch_lo));
        cart.set_cpu_write_handler(0xf000 | m1, SIZE_4K, mask, Some(vrc4_irq_latch_hi));
        cart.set_cpu_write_handler(0xf000 | m2, SIZE_4K, mask, Some(vrc4_irq_control));
        cart.set_cpu_write_handler(0xf000 | m1 | m2, SIZE_4K, mask, Some(vrc4_irq_ack));

        cart.set_cpu_write_handler(0x9000 | m2, SIZE_4K, mask, Some(vrc4_prg_mode));
        cart.set_cpu_write_handler(0x9000 | m1 | m2, SIZE_4K, mask, Some(vrc4_prg_mode));

        if let Some((c1, c2)) = compat {
            let compat_mask = 0xf000 | c1 | c2;
            cart.set_cpu_write_handler(0xf000 | c1, SIZE_4K, compat_mask, Some(vrc4_irq_latch_hi));
            cart.set_cpu_write_handler(0xf000 | c2, SIZE_4K, compat_mask, Some(vrc4_irq_control));
            cart.set_cpu_write_handler(
                0xf000 | c1 | c2,
                SIZE_4K,
                compat_mask,
                Some(vrc4_irq_ack),
            );
            cart.set_cpu_write_handler(0x9000 | c2, SIZE_4K, compat_mask, Some(vrc4_prg_mode));
            cart.set_cpu_write_handler(
                0x9000 | c1 | c2,
                SIZE_4K,
                compat_mask,
                Some(vrc4_prg_mode),
            );
        }
    } else {
        cart.set_cpu_write_handler(0x9000 | m2, SIZE_4K, mask, Some(standard_mirroring_handler));
        cart.set_cpu_write_handler(
            0x9000 | m1 | m2,
            SIZE_4K,
            mask,
            Some(standard_mirroring_handler),
        );
    }
}

fn vrc4_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_flags(
            &mut cart.irq,
            M2Flags::COUNT_UP
                | M2Flags::RELOAD
                | M2Flags::PRESCALER
                | M2Flags::PRESCALER_RELOAD
                | M2Flags::IRQ_ON_RELOAD,
            0,
        );
        m2.set_prescaler_reload(&mut cart.irq, 340, 0);
        m2.set_prescaler(&mut cart.irq, 340, 0);
        m2.set_prescaler_decrement(&mut cart.irq, 3, 0);
        m2.set_enabled(&mut cart.irq, false, 0);
        m2.set_size(&mut cart.irq, 8, 0);
    }
    cart.board.prg_and = 0xff;
    cart.board.chr_and = 0x1ff;
    cart.board.prg_mode = 0;
}

fn vrc2_security_read(cart: &mut Cartridge, _addr: u16, open_bus: u8, _cycles: u32) -> u8 {
    (open_bus & 0xfe) | cart.board.vrc2().security
}

fn vrc2_security_write(cart: &mut Cartridge, _addr: u16, value: u8, _cycles: u32) {
    cart.board.vrc2().security = value & 0x01;
}

fn vrc4_prg(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    match addr & 0xf000 {
        0x8000 => cart.update_prg_bank(1, (value & 0x1f) as i32),
        0xa000 => cart.update_prg_bank(2, (value & 0x1f) as i32),
        _ => {}
    }
}

fn vrc4_prg_mode(cart: &mut Cartridge, _addr: u16, value: u8, _cycles: u32) {
    let mode = value & 0x02;
    if mode == cart.board.prg_mode {
        return;
    }
    cart.board.prg_mode = mode;
    if mode != 0 {
        cart.board.prg_banks[1].address = 0xc000;
        cart.board.prg_banks[3].address = 0x8000;
    } else {
        cart.board.prg_banks[1].address = 0x8000;
        cart.board.prg_banks[3].address = 0xc000;
    }
    cart.prg_sync();
}

#[inline]
fn vrc4_chr_slot(addr: u16) -> usize {
    ((((addr & 0xf000) >> 12) - 0x0b) * 2) as usize
}

fn vrc4_chr_even_lo(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    let slot = vrc4_chr_slot(addr);
    let bank = (cart.board.chr_banks0[slot].bank & 0x1f0) | (value & 0x0f) as i32;
    cart.update_chr0_bank(slot, bank);
}

fn vrc4_chr_even_hi(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    let slot = vrc4_chr_slot(addr);
    let bank = (cart.board.chr_banks0[slot].bank & 0x0f) | (((value & 0x1f) as i32) << 4);
    cart.update_chr0_bank(slot, bank);
}

fn vrc4_chr_odd_lo(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    let slot = vrc4_chr_slot(addr) + 1;
    let bank = (cart.board.chr_banks0[slot].bank & 0x1f0) | (value & 0x0f) as i32;
    cart.update_chr0_bank(slot, bank);
}

fn vrc4_chr_odd_hi(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    let slot = vrc4_chr_slot(addr) + 1;
    let bank = (cart.board.chr_banks0[slot].bank & 0x0f) | (((value & 0x1f) as i32) << 4);
    cart.update_chr0_bank(slot, bank);
}

fn vrc4_irq_latch_lo(cart: &mut Cartridge, _addr: u16, value: u8, cycles: u32) {
    let latch = (cart.board.vrc2().irq_latch & 0xf0) | (value & 0x0f);
    cart.board.vrc2().irq_latch = latch;
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_reload(&mut cart.irq, latch as u32, cycles);
    }
}

fn vrc4_irq_latch_hi(cart: &mut Cartridge, _addr: u16, value: u8, cycles: u32) {
    let latch = (cart.board.vrc2().irq_latch & 0x0f) | ((value & 0x0f) << 4);
    cart.board.vrc2().irq_latch = latch;
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_reload(&mut cart.irq, latch as u32, cycles);
    }
}

/// `$F001`-style control: bit 1 enables, bit 2 selects raw CPU-cycle mode
/// (no prescaler), bit 0 is the post-acknowledge enable.
pub(crate) fn vrc_irq_control(cart: &mut Cartridge, value: u8, cycles: u32) {
    cart.board.irq_control = value;
    let Some(m2) = cart.m2.as_mut() else {
        return;
    };
    m2.ack(&mut cart.irq, cycles);

    let mut flags = M2Flags::COUNT_UP | M2Flags::RELOAD | M2Flags::IRQ_ON_RELOAD;
    if value & 0x02 == 0 {
        m2.set_enabled(&mut cart.irq, false, cycles);
        m2.set_flags(&mut cart.irq, flags, cycles);
        return;
    }

    if value & 0x04 == 0 {
        m2.set_prescaler_reload(&mut cart.irq, 340, cycles);
        m2.set_prescaler(&mut cart.irq, 340, cycles);
        m2.set_prescaler_decrement(&mut cart.irq, 3, cycles);
        flags |= M2Flags::PRESCALER | M2Flags::PRESCALER_RELOAD;
    }

    m2.set_flags(&mut cart.irq, flags, cycles);
    m2.force_reload(&mut cart.irq, cycles);
    m2.set_enabled(&mut cart.irq, true, cycles);
}

pub(crate) fn vrc_irq_ack(cart: &mut Cartridge, cycles: u32) {
    let enable = cart.board.irq_control & 0x01 != 0;
    let Some(m2) = cart.m2.as_mut() else {
        return;
    };
    m2.ack(&mut cart.irq, cycles);
    if enable {
        m2.set_enabled(&mut cart.irq, true, cycles);
        m2.schedule_irq(&mut cart.irq, cycles);
    } else {
        m2.set_enabled(&mut cart.irq, false, cycles);
    }
}

fn vrc4_irq_control(cart: &mut Cartridge, _addr: u16, value: u8, cycles: u32) {
    vrc_irq_control(cart, value, cycles);
}

fn vrc4_irq_ack(cart: &mut Cartridge, _addr: u16, _value: u8, cycles: u32) {
    vrc_irq_ack(cart, cycles);
}

// --- VRC3 ---------------------------------------------------------------

fn vrc3_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    cart.board.prg_and = 0xff;
    cart.board.chr_and = 0xff;
    cart.board.irq_counter_reload = 0;
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_flags(
            &mut cart.irq,
            M2Flags::COUNT_UP | M2Flags::RELOAD | M2Flags::IRQ_ON_RELOAD,
            0,
        );
        m2.set_size(&mut cart.irq, 16, 0);
        m2.set_enabled(&mut cart.irq, false, 0);
    }
}

/// VRC3: 16-bit IRQ latch loaded one nibble per register.
fn vrc3_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    match addr & 0xf000 {
        0x8000..=0xb000 => {
            let nibble = ((addr >> 12) - 8) * 4;
            let mut latch = cart.board.irq_counter_reload;
            latch &= !(0x000f << nibble);
            latch |= ((value & 0x0f) as u32) << nibble;
            cart.board.irq_counter_reload = latch;
            if let Some(m2) = cart.m2.as_mut() {
                m2.set_reload(&mut cart.irq, latch, cycles);
            }
        }
        0xc000 => {
            cart.board.irq_control = value;
            if let Some(m2) = cart.m2.as_mut() {
                m2.set_enabled(&mut cart.irq, value & 0x02 != 0, cycles);
                m2.set_size(&mut cart.irq, if value & 0x04 != 0 { 8 } else { 16 }, cycles);
                m2.force_reload(&mut cart.irq, cycles);
            }
        }
        0xd000 => {
            vrc_irq_ack(cart, cycles);
        }
        0xf000 => {
            cart.update_prg_bank(1, value as i32);
        }
        _ => {}
    }
}

// --- VRC6 ---------------------------------------------------------------

fn vrc6_reset(cart: &mut Cartridge, hard: bool) {
    if !hard {
        return;
    }
    if let Some(m2) = cart.m2.as_mut() {
        m2.set_flags(
            &mut cart.irq,
            M2Flags::COUNT_UP
                | M2Flags::RELOAD
                | M2Flags::PRESCALER
                | M2Flags::PRESCALER_RELOAD
                | M2Flags::IRQ_ON_RELOAD,
            0,
        );
        m2.set_prescaler_reload(&mut cart.irq, 340, 0);
        m2.set_prescaler(&mut cart.irq, 340, 0);
        m2.set_prescaler_decrement(&mut cart.irq, 3, 0);
        m2.set_enabled(&mut cart.irq, false, 0);
        m2.set_size(&mut cart.irq, 8, 0);
    }
}

fn vrc6_write(cart: &mut Cartridge, addr: u16, value: u8, cycles: u32) {
    match addr & 0xf003 {
        0x8000..=0x8003 => {
            cart.update_prg_bank(1, value as i32);
        }
        0xc000..=0xc003 => {
            cart.update_prg_bank(2, value as i32);
        }
        0xb000..=0xb003 => {
            cart.standard_mirroring_write(value);
        }
        0xf000 => {
            if let Some(m2) = cart.m2.as_mut() {
                m2.set_reload(&mut cart.irq, value as u32, cycles);
            }
        }
        0xf001 => vrc_irq_control(cart, value, cycles),
        0xf002 => vrc_irq_ack(cart, cycles),
        _ => {}
    }
}

fn vrc6_even_chr(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    let mut slot = if addr & 0x03 != 0 { 2 } else { 0 };
    if addr & 0xf000 == 0xe000 {
        slot += 4;
    }
    cart.update_chr0_bank(slot, value as i32);
}

fn vrc6_odd_chr(cart: &mut Cartridge, addr: u16, value: u8, _cycles: u32) {
    let mut slot = if addr & 0x03 == 3 { 3 } else { 1 };
    if addr & 0xf000 == 0xe000 {
        slot += 4;
    }
    cart.update_chr0_bank(slot, value as i32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::RomConfig;
    use crate::chip::SIZE_1K;
    use crate::irq::IrqLine;

    fn rom(banks_8k: usize) -> Vec<u8> {
        let mut data = vec![0u8; banks_8k * SIZE_8K];
        for (i, chunk) in data.chunks_mut(SIZE_8K).enumerate() {
            chunk.fill(i as u8);
        }
        data
    }

    fn chr(banks_1k: usize) -> Vec<u8> {
        let mut data = vec![0u8; banks_1k * SIZE_1K];
        for (i, chunk) in data.chunks_mut(SIZE_1K).enumerate() {
            chunk.fill((i & 0xff) as u8);
        }
        data
    }

    fn cart(board: BoardType) -> Cartridge {
        Cartridge::new(RomConfig::new(board, rom(16), chr(256))).unwrap()
    }

    /// The same logical operation through each revision's address bits
    /// lands in the same register.
    #[test]
    fn register_layouts_normalize() {
        // CHR slot 0 high nibble write: VRC4A uses A1 for the "high" bit,
        // VRC4F uses A0.
        let mut a = cart(BoardType::Vrc4a);
        a.cpu_write(0xb000, 0x06, 0);
        a.cpu_write(0xb002, 0x01, 0);
        assert_eq!(a.board.chr_banks0[0].bank, 0x16);

        let mut f = cart(BoardType::Vrc4f);
        f.cpu_write(0xb000, 0x06, 0);
        f.cpu_write(0xb001, 0x01, 0);
        assert_eq!(f.board.chr_banks0[0].bank, 0x16);

        // And through the compat descriptor, both layouts work.
        let mut ac = cart(BoardType::Vrc4AcCompat);
        ac.cpu_write(0xb002, 0x03, 0); // VRC4A high bit (A1)
        assert_eq!(ac.board.chr_banks0[0].bank, 0x30);
        ac.cpu_write(0xb040, 0x04, 0); // VRC4C high bit (A6)
        assert_eq!(ac.board.chr_banks0[0].bank, 0x40);
    }

    #[test]
    fn prg_mode_swap() {
        let mut c = cart(BoardType::Vrc4b);
        c.cpu_write(0x8000, 0x04, 0);
        assert_eq!(c.cpu_peek(0x8000), Some(4));
        assert_eq!(c.cpu_peek(0xc000), Some(14));

        // Mode 1 swaps the switchable bank to $C000 and fixes $8000 to the
        // second-to-last bank.
        c.cpu_write(0x9002, 0x02, 0);
        assert_eq!(c.cpu_peek(0xc000), Some(4));
        assert_eq!(c.cpu_peek(0x8000), Some(14));
    }

    #[test]
    fn vrc2a_shifts_chr_banks() {
        let mut c = Cartridge::new(RomConfig::new(BoardType::Vrc2a, rom(16), chr(128))).unwrap();
        // Bank value 6 with shift 1 selects physical 1 KiB bank 3.
        c.cpu_write(0xb000, 0x06, 0);
        assert_eq!(c.ppu_read(0x0000, 0), 3);
    }

    #[test]
    fn vrc2_security_latch() {
        let mut config = RomConfig::new(BoardType::Vrc2b, rom(16), chr(128));
        config.wram_size = [Some(0), None];
        let mut c = Cartridge::new(config).unwrap();
        c.cpu_write(0x6000, 0x01, 0);
        assert_eq!(c.cpu_read(0x6000, 0xaa, 0), Some(0xab));
        c.cpu_write(0x6000, 0x00, 0);
        assert_eq!(c.cpu_read(0x6000, 0xaa, 0), Some(0xaa));
    }

    #[test]
    fn vrc4_scanline_irq_schedules() {
        let mut c = cart(BoardType::Vrc4b);
        c.cpu_write(0xf000, 0x0e, 0); // latch low nibble
        c.cpu_write(0xf002, 0x0f, 0); // latch high nibble (A0 low bit rev b)
        c.cpu_write(0xf001, 0x02, 0); // control: enable, scanline mode
        let scheduled = c.irq_scheduler().scheduled_cycle(IrqLine::M2Timer);
        assert!(scheduled.is_some());
        // 0xfe latch: two counter increments to wrap, one more clock for
        // the on-reload assert; prescaled by ~113.67 CPU cycles each.
        let cpu_cycles = scheduled.unwrap() / 12;
        assert!((200..=500).contains(&cpu_cycles), "got {cpu_cycles}");
    }

    #[test]
    fn vrc3_nibble_latch() {
        let mut c = Cartridge::new(RomConfig::new(BoardType::Vrc3, rom(16), chr(8))).unwrap();
        c.cpu_write(0x8000, 0x04, 0);
        c.cpu_write(0x9000, 0x03, 0);
        c.cpu_write(0xa000, 0x02, 0);
        c.cpu_write(0xb000, 0x01, 0);
        assert_eq!(c.board.irq_counter_reload, 0x1234);

        c.cpu_write(0xc000, 0x02, 0);
        assert!(c.irq_scheduler().scheduled_cycle(IrqLine::M2Timer).is_some());
    }

    #[test]
    fn vrc6_banking() {
        let mut c = cart(BoardType::Vrc6a);
        c.cpu_write(0x8000, 0x02, 0); // 16 KiB window -> banks 4/5
        assert_eq!(c.cpu_peek(0x8000), Some(4));
        assert_eq!(c.cpu_peek(0xa000), Some(5));
        c.cpu_write(0xc000, 0x07, 0);
        assert_eq!(c.cpu_peek(0xc000), Some(7));

        c.cpu_write(0xd002, 0x21, 0); // even column, slot 2
        assert_eq!(c.board.chr_banks0[2].bank, 0x21);
        c.cpu_write(0xe003, 0x33, 0); // odd column, slot 7
        assert_eq!(c.board.chr_banks0[7].bank, 0x33);
    }
}
