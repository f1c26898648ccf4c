//! The cartridge board: chips, bank windows, dispatch, and the resolver
//! that turns them into CPU/PPU page tables.
//!
//! [`Cartridge`] is the owning aggregate: one [`Board`] (mutable mapper
//! state and chip storage), the CPU page table and per-address handler
//! tables, two PPU pagemaps, the interrupt scheduler, and the optional M2
//! and A12 timers. Variant handlers receive `&mut Cartridge` for the span
//! of one register write; nothing holds long-lived references across
//! components.

pub mod descriptor;
pub mod variant;

use std::path::Path;

use tracing::{error, warn};

use crate::bank::{BankTarget, BankWindow, NametableSlot, Perms};
use crate::chip::{Chip, ChipKind, ChipSelect, SIZE_1K, SIZE_2K, SIZE_4K, SIZE_8K};
use crate::error::Error;
use crate::irq::IrqScheduler;
use crate::mirroring::Mirroring;
use crate::pagetable::{CpuPageTable, PpuPageMap};
use crate::patch::{RangeList, apply_ips, create_ips};
use crate::savestate::{Packer, SaveState, ShortChunk, Unpacker, chunk_err};
use crate::timer::a12::A12Timer;
use crate::timer::m2::M2Timer;
use crate::timing::{Region, SystemTiming};

use descriptor::{
    BoardDescriptor, BoardType, DescriptorFlags, ReadHandler, WriteHandler, lookup,
};
use variant::VariantState;

pub const PRG_WINDOWS: usize = 6;
pub const CHR_WINDOWS: usize = 10;

static ZERO_NMT: [u8; SIZE_1K] = [0; SIZE_1K];

/// Which of the two PPU pagemaps a CHR sync writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMapSet {
    Primary = 0,
    Secondary = 1,
}

/// Variant hook invoked on PPU pattern-table reads (CHR latches).
pub type PpuReadHook = fn(&mut Cartridge, u16, u32);

/// Everything a ROM loader has to provide to bind a ROM image to a board.
#[derive(Debug, Clone)]
pub struct RomConfig {
    pub board_type: BoardType,
    pub prg_rom: Vec<u8>,
    pub chr_rom: Vec<u8>,
    /// Work-RAM sizes; `None` falls back to the descriptor's maximum.
    pub wram_size: [Option<usize>; 2],
    /// Video-RAM sizes; `None` falls back to the descriptor's policy.
    pub vram_size: [Option<usize>; 2],
    pub wram_nv: [bool; 2],
    pub vram_nv: [bool; 2],
    /// Header/database mirroring; `None` picks mapper-controlled when the
    /// board supports it, vertical otherwise.
    pub mirroring: Option<Mirroring>,
    pub region: Region,
}

impl RomConfig {
    pub fn new(board_type: BoardType, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self {
            board_type,
            prg_rom,
            chr_rom,
            wram_size: [None, None],
            vram_size: [None, None],
            wram_nv: [false, false],
            vram_nv: [false, false],
            mirroring: None,
            region: Region::Ntsc,
        }
    }
}

/// Mutable board state plus the chip inventory it owns.
#[derive(Debug, Clone)]
pub struct Board {
    pub prg_rom: Chip,
    pub chr_rom: Option<Chip>,
    pub wram: [Option<Chip>; 2],
    pub vram: [Option<Chip>; 2],
    pub mapper_ram: Option<Chip>,
    pub ciram: Chip,
    pub fill_nmt: Chip,

    pub prg_banks: [BankWindow; PRG_WINDOWS],
    pub chr_banks0: [BankWindow; CHR_WINDOWS],
    pub chr_banks1: [BankWindow; CHR_WINDOWS],
    pub nmt_banks: [NametableSlot; 4],

    pub prg_and: u32,
    pub prg_or: u32,
    pub chr_and: u32,
    pub chr_or: u32,
    pub wram_and: u32,
    pub wram_or: u32,

    pub prg_mode: u8,
    pub chr_mode: u8,
    pub irq_control: u8,
    pub irq_counter: u32,
    pub irq_counter_reload: u32,

    /// Mirroring requested by the header/database; `MapperControlled`
    /// boards drive the nametable slots from their registers instead.
    pub mirroring: Mirroring,
    pub dip_switches: u8,
    pub num_dip_switches: u8,

    /// Byte spans of PRG flash modified since load, for the IPS overlay.
    pub modified_ranges: RangeList,

    pub variant_state: VariantState,
}

impl Board {
    /// Access the MMC3-family scratch state. Only reachable from handlers
    /// installed by MMC3-family descriptors.
    pub(crate) fn mmc3(&mut self) -> &mut variant::Mmc3State {
        match &mut self.variant_state {
            VariantState::Mmc3(s) => s,
            _ => unreachable!("handler bound to a non-MMC3 board"),
        }
    }

    pub(crate) fn vrc2(&mut self) -> &mut variant::Vrc2State {
        match &mut self.variant_state {
            VariantState::Vrc2(s) => s,
            _ => unreachable!("handler bound to a non-VRC board"),
        }
    }

    pub(crate) fn jy(&mut self) -> &mut variant::JyState {
        match &mut self.variant_state {
            VariantState::Jy(s) => s,
            _ => unreachable!("handler bound to a non-JY board"),
        }
    }

    pub(crate) fn sunsoft3(&mut self) -> &mut variant::Sunsoft3State {
        match &mut self.variant_state {
            VariantState::Sunsoft3(s) => s,
            _ => unreachable!("handler bound to a non-Sunsoft board"),
        }
    }

    pub(crate) fn unrom512(&mut self) -> &mut variant::Unrom512State {
        match &mut self.variant_state {
            VariantState::Unrom512(s) => s,
            _ => unreachable!("handler bound to a non-UNROM-512 board"),
        }
    }
}

pub struct Cartridge {
    pub(crate) board: Board,
    pub(crate) descriptor: &'static BoardDescriptor,
    pub(crate) cpu_pages: CpuPageTable,
    pub(crate) ppu_maps: [PpuPageMap; 2],
    pub(crate) active_map: usize,
    write_handlers: Vec<Option<WriteHandler>>,
    read_handlers: Vec<Option<ReadHandler>>,
    pub(crate) m2: Option<M2Timer>,
    pub(crate) a12: Option<A12Timer>,
    pub(crate) irq: IrqScheduler,
    pub(crate) timing: SystemTiming,
    pub(crate) ppu_read_hook: Option<PpuReadHook>,
    in_ppu_hook: bool,
}

impl Cartridge {
    pub fn new(config: RomConfig) -> Result<Self, Error> {
        let descriptor =
            lookup(config.board_type).ok_or(Error::UnsupportedBoard(config.board_type))?;
        let timing = SystemTiming::new(config.region);

        let mut prg_rom = config.prg_rom;
        if descriptor.max_prg_rom_size > 0 && prg_rom.len() > descriptor.max_prg_rom_size {
            warn!(
                board = descriptor.name,
                size = prg_rom.len(),
                max = descriptor.max_prg_rom_size,
                "PRG-ROM larger than the board allows; clamping"
            );
            prg_rom.truncate(descriptor.max_prg_rom_size);
        }
        let mut chr_rom = config.chr_rom;
        if descriptor.max_chr_rom_size > 0 && chr_rom.len() > descriptor.max_chr_rom_size {
            warn!(
                board = descriptor.name,
                size = chr_rom.len(),
                max = descriptor.max_chr_rom_size,
                "CHR-ROM larger than the board allows; clamping"
            );
            chr_rom.truncate(descriptor.max_chr_rom_size);
        }

        let mirroring = config.mirroring.unwrap_or(
            if descriptor.flags.contains(DescriptorFlags::MIRROR_MAPPER) {
                Mirroring::MapperControlled
            } else {
                Mirroring::Vertical
            },
        );
        let ciram_size = if mirroring == Mirroring::FourScreen {
            SIZE_4K
        } else {
            SIZE_2K
        };

        let mut wram = [None, None];
        for (i, slot) in wram.iter_mut().enumerate() {
            let mut size = config.wram_size[i].unwrap_or(descriptor.max_wram_size[i]);
            size = size.max(descriptor.min_wram_size[i]);
            if descriptor.max_wram_size[i] > 0 && size > descriptor.max_wram_size[i] {
                warn!(board = descriptor.name, size, "clamping WRAM size");
                size = descriptor.max_wram_size[i];
            }
            if size > 0 {
                let kind = if config.wram_nv[i] {
                    ChipKind::WramNv
                } else {
                    ChipKind::Wram
                };
                *slot = Some(Chip::new(kind, size));
            }
        }

        let mut vram = [None, None];
        for (i, slot) in vram.iter_mut().enumerate() {
            let default = if descriptor.min_vram_size[i] > 0 {
                descriptor.min_vram_size[i]
            } else if i == 0 && chr_rom.is_empty() {
                if descriptor.max_vram_size[0] > 0 {
                    descriptor.max_vram_size[0].min(SIZE_8K)
                } else {
                    SIZE_8K
                }
            } else {
                0
            };
            let mut size = config.vram_size[i].unwrap_or(default);
            size = size.max(descriptor.min_vram_size[i]);
            if descriptor.max_vram_size[i] > 0 && size > descriptor.max_vram_size[i] {
                warn!(board = descriptor.name, size, "clamping VRAM size");
                size = descriptor.max_vram_size[i];
            }
            if size > 0 {
                let kind = if config.vram_nv[i] {
                    ChipKind::VramNv
                } else {
                    ChipKind::Vram
                };
                *slot = Some(Chip::new(kind, size));
            }
        }

        let mapper_ram = (descriptor.mapper_ram_size > 0).then(|| {
            let kind = if descriptor.flags.contains(DescriptorFlags::MAPPER_NV) {
                ChipKind::MapperRamNv
            } else {
                ChipKind::MapperRam
            };
            Chip::new(kind, descriptor.mapper_ram_size)
        });

        let board = Board {
            prg_rom: Chip::from_data(ChipKind::Rom, prg_rom),
            chr_rom: (!chr_rom.is_empty()).then(|| Chip::from_data(ChipKind::Rom, chr_rom)),
            wram,
            vram,
            mapper_ram,
            ciram: Chip::new(ChipKind::Ciram, ciram_size),
            fill_nmt: Chip::new(ChipKind::MapperRam, SIZE_1K),
            prg_banks: [BankWindow::DISABLED; PRG_WINDOWS],
            chr_banks0: [BankWindow::DISABLED; CHR_WINDOWS],
            chr_banks1: [BankWindow::DISABLED; CHR_WINDOWS],
            nmt_banks: [NametableSlot::CIRAM0; 4],
            prg_and: !0,
            prg_or: 0,
            chr_and: !0,
            chr_or: 0,
            wram_and: !0,
            wram_or: 0,
            prg_mode: 0,
            chr_mode: 0,
            irq_control: 0,
            irq_counter: 0,
            irq_counter_reload: 0,
            mirroring,
            dip_switches: 0,
            num_dip_switches: descriptor.num_dip_switches,
            modified_ranges: RangeList::new(),
            variant_state: VariantState::None,
        };

        let mut cart = Self {
            board,
            descriptor,
            cpu_pages: CpuPageTable::default(),
            ppu_maps: [PpuPageMap::default(), PpuPageMap::default()],
            active_map: 0,
            write_handlers: vec![None; 0x10000],
            read_handlers: vec![None; 0x10000],
            m2: descriptor
                .flags
                .contains(DescriptorFlags::M2_TIMER)
                .then(|| M2Timer::new(timing.cpu_clock_divider)),
            a12: descriptor.a12_variant.map(|v| A12Timer::new(v, timing)),
            irq: IrqScheduler::default(),
            timing,
            ppu_read_hook: None,
            in_ppu_hook: false,
        };

        for entry in descriptor.write_handlers {
            cart.set_cpu_write_handler(entry.addr, entry.size, entry.mask, Some(entry.handler));
        }
        for entry in descriptor.read_handlers {
            cart.set_cpu_read_handler(entry.addr, entry.size, entry.mask, Some(entry.handler));
        }

        if let Some(init) = descriptor.ops.init {
            init(&mut cart);
        }
        cart.reset(true);
        Ok(cart)
    }

    pub fn board_type(&self) -> BoardType {
        self.descriptor.board_type
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn timing(&self) -> &SystemTiming {
        &self.timing
    }

    pub fn irq_scheduler(&self) -> &IrqScheduler {
        &self.irq
    }

    pub fn irq_scheduler_mut(&mut self) -> &mut IrqScheduler {
        &mut self.irq
    }

    // ------------------------------------------------------------------
    // Chip plumbing.

    pub(crate) fn chip_slice(&self, sel: ChipSelect) -> Option<&[u8]> {
        match sel {
            ChipSelect::PrgRom => Some(&self.board.prg_rom.data),
            ChipSelect::ChrRom => self.board.chr_rom.as_ref().map(|c| &*c.data),
            ChipSelect::Wram0 => self.board.wram[0].as_ref().map(|c| &*c.data),
            ChipSelect::Wram1 => self.board.wram[1].as_ref().map(|c| &*c.data),
            ChipSelect::Vram0 => self.board.vram[0].as_ref().map(|c| &*c.data),
            ChipSelect::Vram1 => self.board.vram[1].as_ref().map(|c| &*c.data),
            ChipSelect::MapperRam => self.board.mapper_ram.as_ref().map(|c| &*c.data),
            ChipSelect::Ciram => Some(&self.board.ciram.data),
            ChipSelect::FillNmt => Some(&self.board.fill_nmt.data),
            ChipSelect::ZeroNmt => Some(&ZERO_NMT),
        }
    }

    pub(crate) fn chip_slice_mut(&mut self, sel: ChipSelect) -> Option<&mut [u8]> {
        match sel {
            ChipSelect::PrgRom => Some(&mut self.board.prg_rom.data),
            ChipSelect::ChrRom => self.board.chr_rom.as_mut().map(|c| &mut *c.data),
            ChipSelect::Wram0 => self.board.wram[0].as_mut().map(|c| &mut *c.data),
            ChipSelect::Wram1 => self.board.wram[1].as_mut().map(|c| &mut *c.data),
            ChipSelect::Vram0 => self.board.vram[0].as_mut().map(|c| &mut *c.data),
            ChipSelect::Vram1 => self.board.vram[1].as_mut().map(|c| &mut *c.data),
            ChipSelect::MapperRam => self.board.mapper_ram.as_mut().map(|c| &mut *c.data),
            ChipSelect::Ciram => Some(&mut self.board.ciram.data),
            ChipSelect::FillNmt => Some(&mut self.board.fill_nmt.data),
            ChipSelect::ZeroNmt => None,
        }
    }

    // ------------------------------------------------------------------
    // Handler installation (per-address tables, the register map).

    pub(crate) fn set_cpu_write_handler(
        &mut self,
        addr: u16,
        size: usize,
        mask: u16,
        handler: Option<WriteHandler>,
    ) {
        let base = addr as usize;
        let end = (base + size).min(0x10000);
        for a in base..end {
            if mask == 0 || (a as u16 & mask) == (addr & mask) {
                self.write_handlers[a] = handler;
            }
        }
    }

    pub(crate) fn set_cpu_read_handler(
        &mut self,
        addr: u16,
        size: usize,
        mask: u16,
        handler: Option<ReadHandler>,
    ) {
        let base = addr as usize;
        let end = (base + size).min(0x10000);
        for a in base..end {
            if mask == 0 || (a as u16 & mask) == (addr & mask) {
                self.read_handlers[a] = handler;
            }
        }
    }

    // ------------------------------------------------------------------
    // CPU bus.

    /// CPU read. `None` means nothing drove the bus (open bus).
    pub fn cpu_read(&mut self, addr: u16, open_bus: u8, cycles: u32) -> Option<u8> {
        if let Some(handler) = self.read_handlers[addr as usize] {
            return Some(handler(self, addr, open_bus, cycles));
        }
        let (chip, offset, perms) = self.cpu_pages.resolve(addr)?;
        if !perms.contains(Perms::READ) {
            return None;
        }
        self.chip_slice(chip)?.get(offset as usize).copied()
    }

    /// Read without side effects (debuggers, bus-conflict emulation).
    pub fn cpu_peek(&self, addr: u16) -> Option<u8> {
        let (chip, offset, perms) = self.cpu_pages.resolve(addr)?;
        if !perms.contains(Perms::READ) {
            return None;
        }
        self.chip_slice(chip)?.get(offset as usize).copied()
    }

    pub fn cpu_write(&mut self, addr: u16, value: u8, cycles: u32) {
        // Shadow the PPU registers the A12 timer predicts from. The write
        // still belongs to the PPU; this only observes it.
        if self.a12.is_some() {
            match addr {
                0x2000..=0x3fff => {
                    if let Some(a12) = self.a12.as_mut() {
                        match addr & 7 {
                            0 => a12.write_ppu_ctrl(&mut self.irq, value, cycles),
                            1 => a12.write_ppu_mask(&mut self.irq, value, cycles),
                            3 => a12.write_oam_addr(value, cycles),
                            4 => a12.write_oam_data(&mut self.irq, value, cycles),
                            _ => {}
                        }
                    }
                }
                0x4014 => {
                    if let Some(a12) = self.a12.as_mut() {
                        a12.begin_oam_dma();
                    }
                }
                _ => {}
            }
        }

        if let Some(handler) = self.write_handlers[addr as usize] {
            handler(self, addr, value, cycles);
            return;
        }
        if let Some((chip, offset, perms)) = self.cpu_pages.resolve(addr) {
            if perms.contains(Perms::WRITE) {
                if let Some(data) = self.chip_slice_mut(chip) {
                    if let Some(byte) = data.get_mut(offset as usize) {
                        *byte = value;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // PPU bus.

    /// PPU read through the active pagemap. Unmapped space reads zero.
    pub fn ppu_read(&mut self, addr: u16, cycles: u32) -> u8 {
        let value = self
            .ppu_maps[self.active_map]
            .resolve(addr)
            .filter(|(_, _, perms)| perms.contains(Perms::READ))
            .and_then(|(chip, offset, _)| self.chip_slice(chip)?.get(offset as usize).copied())
            .unwrap_or(0);

        if addr < 0x2000 && self.ppu_read_hook.is_some() && !self.in_ppu_hook {
            self.in_ppu_hook = true;
            if let Some(hook) = self.ppu_read_hook {
                hook(self, addr, cycles);
            }
            self.in_ppu_hook = false;
        }
        value
    }

    pub fn ppu_write(&mut self, addr: u16, value: u8, _cycles: u32) {
        if let Some((chip, offset, perms)) = self.ppu_maps[self.active_map].resolve(addr) {
            if perms.contains(Perms::WRITE) {
                if let Some(data) = self.chip_slice_mut(chip) {
                    if let Some(byte) = data.get_mut(offset as usize) {
                        *byte = value;
                    }
                }
            }
        }
    }

    /// The PPU address bus changed outside rendering (a `$2006` write or
    /// `$2007` access); feed the A12 edge detector.
    pub fn ppu_address_changed(&mut self, addr: u16, cycles: u32) {
        if let Some(a12) = self.a12.as_mut() {
            a12.hook(&mut self.irq, addr & 0x1000 != 0, cycles);
        }
    }

    /// Select which pagemap serves PPU fetches.
    pub fn select_pagemap(&mut self, set: PageMapSet) {
        self.active_map = set as usize;
    }

    /// Program the fill-mode nametable (tile index and attribute bits).
    pub fn set_fill_mode(&mut self, tile: u8, attribute: u8) {
        let attr = attribute & 0x03;
        let attr_byte = attr | (attr << 2) | (attr << 4) | (attr << 6);
        self.board.fill_nmt.data[..0x3c0].fill(tile);
        self.board.fill_nmt.data[0x3c0..].fill(attr_byte);
    }

    // ------------------------------------------------------------------
    // Time.

    /// Advance the timers to `cycles`.
    pub fn run(&mut self, cycles: u32) {
        if let Some(m2) = self.m2.as_mut() {
            m2.run(cycles);
        }
        if let Some(a12) = self.a12.as_mut() {
            a12.run(cycles);
        }
    }

    /// Poll the interrupt lines at `cycles`.
    pub fn irq_pending(&mut self, cycles: u32) -> bool {
        self.irq.pending(cycles)
    }

    /// Frame boundary: shift every timebase down by `cycles`.
    pub fn end_frame(&mut self, cycles: u32) {
        if let Some(end_frame) = self.descriptor.ops.end_frame {
            end_frame(self, cycles);
        }
        if let Some(m2) = self.m2.as_mut() {
            m2.end_frame(cycles);
        }
        if let Some(a12) = self.a12.as_mut() {
            a12.end_frame(cycles);
        }
        self.irq.end_frame(cycles);
    }

    // ------------------------------------------------------------------
    // Reset.

    pub fn reset(&mut self, hard: bool) {
        let d = self.descriptor;
        if hard {
            self.board.prg_banks = [BankWindow::DISABLED; PRG_WINDOWS];
            for (dst, src) in self.board.prg_banks.iter_mut().zip(d.init_prg) {
                *dst = *src;
            }
            self.board.chr_banks0 = [BankWindow::DISABLED; CHR_WINDOWS];
            for (dst, src) in self.board.chr_banks0.iter_mut().zip(d.init_chr0) {
                *dst = *src;
            }
            self.board.chr_banks1 = [BankWindow::DISABLED; CHR_WINDOWS];
            for (dst, src) in self.board.chr_banks1.iter_mut().zip(d.init_chr1) {
                *dst = *src;
            }

            for chip in self
                .board
                .wram
                .iter_mut()
                .chain(self.board.vram.iter_mut())
                .flatten()
                .chain(self.board.mapper_ram.iter_mut())
            {
                if !chip.kind.is_nonvolatile() {
                    chip.fill(0x00);
                }
            }
            self.board.ciram.fill(0xff);

            self.board.prg_and = !0;
            self.board.prg_or = 0;
            self.board.chr_and = !0;
            self.board.chr_or = 0;
            self.board.wram_and = !0;
            self.board.wram_or = 0;

            let mirroring = if self.board.mirroring == Mirroring::MapperControlled {
                d.mirroring_values.first().copied().unwrap_or(Mirroring::SingleScreenA)
            } else {
                self.board.mirroring
            };
            self.install_mirroring(mirroring);
            self.internal_nmt_sync();
        }

        if let Some(m2) = self.m2.as_mut() {
            m2.reset(hard);
        }
        if let Some(a12) = self.a12.as_mut() {
            a12.reset(hard, 0);
        }
        if let Some(reset) = d.ops.reset {
            reset(self, hard);
        }

        if hard {
            self.prg_sync();
            self.chr_sync(PageMapSet::Primary);
            self.chr_sync(PageMapSet::Secondary);
            self.active_map = 0;
        }
    }

    // ------------------------------------------------------------------
    // Page-table resolvers.

    fn resolve_cpu_target(&self, target: BankTarget) -> (Option<ChipSelect>, Perms) {
        match target {
            BankTarget::Rom => (Some(ChipSelect::PrgRom), Perms::READ),
            BankTarget::Ram0 => (Some(ChipSelect::Wram0), Perms::READWRITE),
            BankTarget::Ram1 => (Some(ChipSelect::Wram1), Perms::READWRITE),
            BankTarget::MapperRam => (Some(ChipSelect::MapperRam), Perms::READWRITE),
            BankTarget::Auto => {
                if self.board.wram[0].is_some() {
                    (Some(ChipSelect::Wram0), Perms::READWRITE)
                } else {
                    (None, Perms::NONE)
                }
            }
            _ => (None, Perms::NONE),
        }
    }

    /// Rebuild the CPU page table from the PRG bank windows.
    pub fn prg_sync(&mut self) {
        for i in 0..PRG_WINDOWS {
            let w = self.board.prg_banks[i];
            if w.size == 0 {
                continue;
            }

            let (and, or) = if w.target == BankTarget::Rom {
                (self.board.prg_and, self.board.prg_or)
            } else {
                (self.board.wram_and, self.board.wram_or)
            };
            let or = or & !and;

            let (chip, allowed) = self.resolve_cpu_target(w.target);
            let perms = w.perms.intersection(allowed);
            let size = w.size as usize;
            let data_len = chip.and_then(|c| self.chip_slice(c)).map(|d| d.len());

            match (chip, data_len) {
                (Some(chip), Some(data_len)) if data_len > 0 => {
                    let slots = (data_len / size).max(1) as i64;
                    let bank = (w.bank as i64).rem_euclid(slots) as u32;
                    let bank = ((bank & and) | or) >> w.shift;
                    let offset = (bank as u64 * size as u64) % data_len as u64;

                    let step = size.min(data_len);
                    let mut addr = w.address as usize;
                    let end = addr + size;
                    while addr < end && addr < 0x10000 {
                        self.cpu_pages.set_entry(
                            addr as u16,
                            step,
                            Some((chip, offset as u32)),
                            perms,
                        );
                        addr += step;
                    }
                }
                _ => {
                    self.cpu_pages
                        .set_entry(w.address, size, None, Perms::NONE);
                }
            }
        }
    }

    fn resolve_ppu_target(&self, target: BankTarget) -> (Option<ChipSelect>, Perms) {
        match target {
            BankTarget::Rom => (Some(ChipSelect::ChrRom), Perms::READ),
            BankTarget::Ram0 => (Some(ChipSelect::Vram0), Perms::READWRITE),
            BankTarget::Ram1 => (Some(ChipSelect::Vram1), Perms::READWRITE),
            BankTarget::Ciram => (Some(ChipSelect::Ciram), Perms::READWRITE),
            BankTarget::Auto => {
                if self.board.chr_rom.is_some() {
                    (Some(ChipSelect::ChrRom), Perms::READ)
                } else if self.board.vram[0].is_some() {
                    (Some(ChipSelect::Vram0), Perms::READWRITE)
                } else {
                    (None, Perms::NONE)
                }
            }
            _ => (None, Perms::NONE),
        }
    }

    /// Rebuild one PPU pagemap from its CHR bank windows.
    pub fn chr_sync(&mut self, set: PageMapSet) {
        for i in 0..CHR_WINDOWS {
            let w = match set {
                PageMapSet::Primary => self.board.chr_banks0[i],
                PageMapSet::Secondary => self.board.chr_banks1[i],
            };
            if w.size == 0 {
                continue;
            }

            let and = self.board.chr_and;
            let or = self.board.chr_or;
            let (chip, allowed) = self.resolve_ppu_target(w.target);
            let perms = w.perms.intersection(allowed);
            let size = w.size as usize;
            let data_len = chip.and_then(|c| self.chip_slice(c)).map(|d| d.len());

            match (chip, data_len) {
                (Some(chip), Some(data_len)) if data_len > 0 => {
                    let slots = (data_len / size).max(1) as i64;
                    let bank = (w.bank as i64).rem_euclid(slots) as u32;
                    let bank = ((bank & and) | or) >> w.shift;
                    let offset = (bank as u64 * size as u64) % data_len as u64;

                    let step = size.min(data_len);
                    let mut addr = w.address as usize;
                    let end = addr + size;
                    while addr < end {
                        self.ppu_maps[set as usize].set_entry(
                            addr as u16,
                            step,
                            Some((chip, offset as u32)),
                            perms,
                        );
                        addr += step;
                    }
                }
                _ => {
                    self.ppu_maps[set as usize]
                        .set_entry(w.address, size, None, Perms::NONE);
                }
            }
        }
    }

    fn resolve_nmt_target(&self, target: BankTarget) -> (Option<ChipSelect>, Perms) {
        match target {
            BankTarget::Ciram => (Some(ChipSelect::Ciram), Perms::READWRITE),
            BankTarget::Rom => (Some(ChipSelect::ChrRom), Perms::READ),
            BankTarget::Ram0 => (Some(ChipSelect::Vram0), Perms::READWRITE),
            BankTarget::Ram1 => (Some(ChipSelect::Vram1), Perms::READWRITE),
            BankTarget::MapperRam => (Some(ChipSelect::MapperRam), Perms::READWRITE),
            BankTarget::Fill => (Some(ChipSelect::FillNmt), Perms::READ),
            BankTarget::Zero => (Some(ChipSelect::ZeroNmt), Perms::READ),
            _ => (None, Perms::NONE),
        }
    }

    /// Install the four nametable slots into both pagemaps.
    fn internal_nmt_sync(&mut self) {
        for i in 0..4 {
            let slot = self.board.nmt_banks[i];
            let (chip, allowed) = self.resolve_nmt_target(slot.target);
            let perms = if slot.target == BankTarget::Ciram {
                Perms::READWRITE
            } else {
                slot.perms.intersection(allowed)
            };

            let source = chip.and_then(|chip| {
                let len = self.chip_slice(chip)?.len();
                let count = (len / SIZE_1K).max(1) as i64;
                let bank = (slot.bank as i64).rem_euclid(count) as u32;
                Some((chip, bank * SIZE_1K as u32))
            });
            for map in &mut self.ppu_maps {
                map.map_nametable(i, source, perms);
            }
        }
    }

    /// Mapper-requested nametable resync. Ignored unless the board's
    /// mirroring is mapper-controlled.
    pub fn nmt_sync(&mut self) {
        if self.board.mirroring != Mirroring::MapperControlled {
            return;
        }
        self.internal_nmt_sync();
    }

    fn install_mirroring(&mut self, mirroring: Mirroring) {
        let banks = mirroring.nametable_banks();
        for (slot, bank) in self.board.nmt_banks.iter_mut().zip(banks) {
            slot.target = BankTarget::Ciram;
            slot.perms = Perms::READWRITE;
            slot.bank = bank as i32;
        }
    }

    /// Point the nametable slots at CIRAM per `mirroring` and resync.
    /// Boards with header-fixed mirroring ignore the request entirely.
    pub fn set_ppu_mirroring(&mut self, mirroring: Mirroring) {
        if self.board.mirroring != Mirroring::MapperControlled {
            return;
        }
        self.install_mirroring(mirroring);
        self.internal_nmt_sync();
    }

    // ------------------------------------------------------------------
    // Small helpers shared by the variant handlers.

    /// Set a PRG window's bank and resync if it changed.
    pub(crate) fn update_prg_bank(&mut self, window: usize, bank: i32) {
        if self.board.prg_banks[window].bank != bank {
            self.board.prg_banks[window].bank = bank;
            self.prg_sync();
        }
    }

    /// Set a primary CHR window's bank and resync if it changed.
    pub(crate) fn update_chr0_bank(&mut self, window: usize, bank: i32) {
        if self.board.chr_banks0[window].bank != bank {
            self.board.chr_banks0[window].bank = bank;
            self.chr_sync(PageMapSet::Primary);
        }
    }

    /// Discrete-logic PRG switch with bus conflicts: the written value is
    /// ANDed with the byte the ROM drives at that address.
    pub fn simple_prg_write(&mut self, addr: u16, value: u8, _cycles: u32) {
        let value = value & self.cpu_peek(addr).unwrap_or(0xff);
        self.update_prg_bank(1, value as i32);
    }

    pub fn simple_prg_write_no_conflict(&mut self, _addr: u16, value: u8, _cycles: u32) {
        self.update_prg_bank(1, value as i32);
    }

    pub fn simple_chr_write(&mut self, addr: u16, value: u8, _cycles: u32) {
        let value = value & self.cpu_peek(addr).unwrap_or(0xff);
        self.update_chr0_bank(0, value as i32);
    }

    /// Standard mirroring register: index the descriptor's mirroring-value
    /// table with the (shifted) written value.
    pub(crate) fn standard_mirroring_write(&mut self, value: u8) {
        let values = self.descriptor.mirroring_values;
        if values.is_empty() {
            return;
        }
        let index = ((value >> self.descriptor.mirroring_shift) as usize) & (values.len() - 1);
        self.set_ppu_mirroring(values[index]);
    }

    // ------------------------------------------------------------------
    // DIP switches.

    pub fn set_dip_switch(&mut self, switch: u8, on: bool) {
        if switch == 0 || switch > self.board.num_dip_switches {
            return;
        }
        let bit = 1 << (switch - 1);
        if on {
            self.board.dip_switches |= bit;
        } else {
            self.board.dip_switches &= !bit;
        }
    }

    pub fn toggle_dip_switch(&mut self, switch: u8) {
        if switch == 0 || switch > self.board.num_dip_switches {
            return;
        }
        self.board.dip_switches ^= 1 << (switch - 1);
    }

    pub fn dip_switches(&self) -> u8 {
        self.board.dip_switches
    }

    // ------------------------------------------------------------------
    // NVRAM files.

    fn nv_chip_order(&self) -> [&Option<Chip>; 5] {
        [
            &self.board.wram[0],
            &self.board.wram[1],
            &self.board.vram[0],
            &self.board.vram[1],
            &self.board.mapper_ram,
        ]
    }

    /// Total bytes of battery-backed memory on this board.
    pub fn nvram_size(&self) -> usize {
        self.nv_chip_order()
            .into_iter()
            .flatten()
            .filter(|c| c.kind.is_nonvolatile())
            .map(Chip::len)
            .sum()
    }

    /// Concatenate the non-volatile chips in save-file order: WRAM0,
    /// WRAM1, VRAM0, VRAM1, then mapper RAM.
    pub fn nvram_bytes(&self) -> Option<Vec<u8>> {
        if self.nvram_size() == 0 {
            return None;
        }
        let mut out = Vec::with_capacity(self.nvram_size());
        for chip in self.nv_chip_order().into_iter().flatten() {
            if chip.kind.is_nonvolatile() {
                out.extend_from_slice(&chip.data);
            }
        }
        Some(out)
    }

    /// Restore non-volatile chips from a save file. Short files fill what
    /// they cover; excess bytes are ignored with a warning.
    pub fn load_nvram_bytes(&mut self, bytes: &[u8]) {
        let mut offset = 0;
        let [wram0, wram1] = &mut self.board.wram;
        let [vram0, vram1] = &mut self.board.vram;
        let chips = [
            wram0.as_mut(),
            wram1.as_mut(),
            vram0.as_mut(),
            vram1.as_mut(),
            self.board.mapper_ram.as_mut(),
        ];
        for chip in chips.into_iter().flatten() {
            if !chip.kind.is_nonvolatile() {
                continue;
            }
            let take = chip.len().min(bytes.len().saturating_sub(offset));
            chip.data[..take].copy_from_slice(&bytes[offset..offset + take]);
            offset += take;
        }
        if offset < bytes.len() {
            warn!(
                extra = bytes.len() - offset,
                "NVRAM file longer than the board's non-volatile memory"
            );
        }
    }

    pub fn save_nvram(&self, path: &Path) -> Result<(), Error> {
        match self.nvram_bytes() {
            Some(bytes) => Ok(std::fs::write(path, bytes)?),
            None => Ok(()),
        }
    }

    pub fn load_nvram(&mut self, path: &Path) -> Result<(), Error> {
        let bytes = std::fs::read(path)?;
        self.load_nvram_bytes(&bytes);
        Ok(())
    }

    /// Shutdown-time NVRAM flush. Failure is logged and accepted; the data
    /// loss is explicit policy since there is nobody left to retry.
    pub fn flush_nvram(&self, path: &Path) {
        if let Err(err) = self.save_nvram(path) {
            error!(path = %path.display(), %err, "failed to write NVRAM save");
        }
    }

    // ------------------------------------------------------------------
    // Flash journal (IPS overlay).

    /// IPS patch covering every PRG byte range modified since load.
    pub fn ips_overlay(&self) -> Option<Vec<u8>> {
        if self.board.modified_ranges.is_empty() {
            return None;
        }
        Some(create_ips(
            &self.board.prg_rom.data,
            &self.board.modified_ranges,
        ))
    }

    /// Re-apply a previously saved overlay on top of the pristine PRG
    /// image, re-seeding the modified-range journal.
    pub fn apply_ips_overlay(&mut self, patch: &[u8]) -> Result<(), Error> {
        let mut data = std::mem::take(&mut self.board.prg_rom.data).into_vec();
        let mut ranges = RangeList::new();
        let result = apply_ips(&mut data, patch, Some(&mut ranges));
        self.board.prg_rom.data = data.into_boxed_slice();
        result?;
        self.board.modified_ranges = ranges;
        self.prg_sync();
        Ok(())
    }

    pub fn write_ips_save(&self, path: &Path) -> Result<(), Error> {
        match self.ips_overlay() {
            Some(patch) => Ok(std::fs::write(path, patch)?),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Savestate.

    pub fn save_state(&self) -> SaveState {
        let mut state = SaveState::new();

        let mut p = Packer::new();
        p.u8(self.board.prg_mode)
            .u8(self.board.chr_mode)
            .u8(self.board.irq_control)
            .u32(self.board.prg_and)
            .u32(self.board.prg_or)
            .u32(self.board.chr_and)
            .u32(self.board.chr_or)
            .u32(self.board.wram_and)
            .u32(self.board.wram_or)
            .u32(self.board.irq_counter)
            .u32(self.board.irq_counter_reload)
            .u8(self.board.dip_switches)
            .u8(self.board.mirroring.to_tag())
            .u8(self.active_map as u8);
        self.board.variant_state.pack(&mut p);
        state.put_chunk("BRD ", p.finish());

        state.put_chunk("PRGB", pack_windows(&self.board.prg_banks));
        state.put_chunk("CHB0", pack_windows(&self.board.chr_banks0));
        state.put_chunk("CHB1", pack_windows(&self.board.chr_banks1));

        let mut p = Packer::new();
        for slot in &self.board.nmt_banks {
            p.i32(slot.bank)
                .u8(slot.perms.bits())
                .u8(target_tag(slot.target));
        }
        state.put_chunk("NMT ", p.finish());

        state.put_chunk("CIRM", self.board.ciram.data.to_vec());
        for (id, chip) in [
            ("WRM0", &self.board.wram[0]),
            ("WRM1", &self.board.wram[1]),
            ("VRM0", &self.board.vram[0]),
            ("VRM1", &self.board.vram[1]),
            ("MPRM", &self.board.mapper_ram),
        ] {
            if let Some(chip) = chip {
                state.put_chunk(id, chip.data.to_vec());
            }
        }

        if self.descriptor.flags.contains(DescriptorFlags::PRG_IPS) {
            let mut p = Packer::new();
            p.u32(self.board.modified_ranges.len() as u32);
            for (offset, length) in self.board.modified_ranges.iter() {
                p.u32(offset).u32(length);
                let (start, end) = (offset as usize, (offset + length) as usize);
                p.bytes(&self.board.prg_rom.data[start.min(self.board.prg_rom.len())
                    ..end.min(self.board.prg_rom.len())]);
            }
            state.put_chunk("PTCH", p.finish());
        }

        if let Some(m2) = &self.m2 {
            m2.save_state(&mut state);
        }
        if let Some(a12) = &self.a12 {
            a12.save_state(&mut state);
        }
        state
    }

    /// Restore from a savestate. Atomic: every chunk is validated and
    /// decoded before any state is committed.
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), Error> {
        let mut board = self.board.clone();
        let mut active_map = self.active_map;

        {
            let data = state.require_chunk("BRD ")?;
            let err = chunk_err("BRD ");
            let mut u = Unpacker::new(data);
            board.prg_mode = u.u8().map_err(err)?;
            board.chr_mode = u.u8().map_err(err)?;
            board.irq_control = u.u8().map_err(err)?;
            board.prg_and = u.u32().map_err(err)?;
            board.prg_or = u.u32().map_err(err)?;
            board.chr_and = u.u32().map_err(err)?;
            board.chr_or = u.u32().map_err(err)?;
            board.wram_and = u.u32().map_err(err)?;
            board.wram_or = u.u32().map_err(err)?;
            board.irq_counter = u.u32().map_err(err)?;
            board.irq_counter_reload = u.u32().map_err(err)?;
            board.dip_switches = u.u8().map_err(err)?;
            board.mirroring = Mirroring::from_tag(u.u8().map_err(err)?);
            active_map = (u.u8().map_err(err)? as usize).min(1);
            board.variant_state = VariantState::unpack(&mut u).map_err(err)?;
            u.expect_end().map_err(err)?;
        }

        unpack_windows(state.require_chunk("PRGB")?, "PRGB", &mut board.prg_banks)?;
        unpack_windows(state.require_chunk("CHB0")?, "CHB0", &mut board.chr_banks0)?;
        unpack_windows(state.require_chunk("CHB1")?, "CHB1", &mut board.chr_banks1)?;

        {
            let data = state.require_chunk("NMT ")?;
            let err = chunk_err("NMT ");
            let mut u = Unpacker::new(data);
            for slot in &mut board.nmt_banks {
                slot.bank = u.i32().map_err(err)?;
                slot.perms = Perms::from_bits_truncate(u.u8().map_err(err)?);
                slot.target = target_from_tag(u.u8().map_err(err)?);
            }
            u.expect_end().map_err(err)?;
        }

        load_chip_chunk(state, "CIRM", Some(&mut board.ciram))?;
        load_chip_chunk(state, "WRM0", board.wram[0].as_mut())?;
        load_chip_chunk(state, "WRM1", board.wram[1].as_mut())?;
        load_chip_chunk(state, "VRM0", board.vram[0].as_mut())?;
        load_chip_chunk(state, "VRM1", board.vram[1].as_mut())?;
        load_chip_chunk(state, "MPRM", board.mapper_ram.as_mut())?;

        if self.descriptor.flags.contains(DescriptorFlags::PRG_IPS) {
            let data = state.require_chunk("PTCH")?;
            let err = chunk_err("PTCH");
            let mut u = Unpacker::new(data);
            let count = u.u32().map_err(err)?;
            let mut ranges = RangeList::new();
            for _ in 0..count {
                let offset = u.u32().map_err(err)?;
                let length = u.u32().map_err(err)?;
                let bytes = u.bytes(length as usize).map_err(err)?;
                let end = (offset as usize + length as usize).min(board.prg_rom.len());
                if (offset as usize) < end {
                    board.prg_rom.data[offset as usize..end]
                        .copy_from_slice(&bytes[..end - offset as usize]);
                }
                ranges.add(offset, length);
            }
            u.expect_end().map_err(err)?;
            board.modified_ranges = ranges;
        }

        let mut m2 = self.m2.clone();
        if let Some(m2) = m2.as_mut() {
            m2.load_state(state)?;
        }
        let mut a12 = self.a12.clone();
        if let Some(a12) = a12.as_mut() {
            a12.load_state(state)?;
        }

        // Everything decoded; commit.
        self.board = board;
        self.active_map = active_map;
        self.m2 = m2;
        self.a12 = a12;

        self.prg_sync();
        self.chr_sync(PageMapSet::Primary);
        self.chr_sync(PageMapSet::Secondary);
        self.internal_nmt_sync();
        if let Some(post_load) = self.descriptor.ops.post_load {
            post_load(self);
        }
        Ok(())
    }
}

fn pack_windows(windows: &[BankWindow]) -> Vec<u8> {
    let mut p = Packer::new();
    for w in windows {
        p.i32(w.bank)
            .u8(w.shift)
            .u16(w.size)
            .u16(w.address)
            .u8(w.perms.bits())
            .u8(target_tag(w.target));
    }
    p.finish()
}

fn unpack_windows(
    data: &[u8],
    id: &'static str,
    windows: &mut [BankWindow],
) -> Result<(), Error> {
    let err = chunk_err(id);
    let mut u = Unpacker::new(data);
    for w in windows.iter_mut() {
        *w = unpack_window(&mut u).map_err(err)?;
    }
    u.expect_end().map_err(err)
}

fn unpack_window(u: &mut Unpacker<'_>) -> Result<BankWindow, ShortChunk> {
    Ok(BankWindow {
        bank: u.i32()?,
        shift: u.u8()?,
        size: u.u16()?,
        address: u.u16()?,
        perms: Perms::from_bits_truncate(u.u8()?),
        target: target_from_tag(u.u8()?),
    })
}

fn load_chip_chunk(
    state: &SaveState,
    id: &'static str,
    chip: Option<&mut Chip>,
) -> Result<(), Error> {
    let Some(chip) = chip else {
        return Ok(());
    };
    let data = state.require_chunk(id)?;
    if data.len() != chip.len() {
        return Err(Error::BadSaveState {
            id,
            reason: format!("expected {} bytes, got {}", chip.len(), data.len()),
        });
    }
    chip.data.copy_from_slice(data);
    Ok(())
}

fn target_tag(target: BankTarget) -> u8 {
    match target {
        BankTarget::Rom => 0,
        BankTarget::Ram0 => 1,
        BankTarget::Ram1 => 2,
        BankTarget::Ciram => 3,
        BankTarget::MapperRam => 4,
        BankTarget::Auto => 5,
        BankTarget::Fill => 6,
        BankTarget::Zero => 7,
        BankTarget::None => 8,
    }
}

fn target_from_tag(tag: u8) -> BankTarget {
    match tag {
        0 => BankTarget::Rom,
        1 => BankTarget::Ram0,
        2 => BankTarget::Ram1,
        3 => BankTarget::Ciram,
        4 => BankTarget::MapperRam,
        5 => BankTarget::Auto,
        6 => BankTarget::Fill,
        7 => BankTarget::Zero,
        _ => BankTarget::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards;
    use crate::pagetable::CPU_PAGE_SIZE;

    fn prg_rom(banks_8k: usize) -> Vec<u8> {
        // Each 8 KiB bank is filled with its own index.
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

    fn txrom() -> Cartridge {
        let config = RomConfig::new(BoardType::TxRom, prg_rom(32), chr_rom(256));
        Cartridge::new(config).unwrap()
    }

    #[test]
    fn registry_is_self_consistent() {
        assert!(boards::REGISTRY.iter().all(|d| lookup(d.board_type).is_some()));
        assert!(!boards::REGISTRY.is_empty());
    }

    #[test]
    fn page_table_covers_prg_space_after_reset() {
        let mut cart = txrom();
        // $8000-$FFFF all readable ROM; $6000-$7FFF mapped to WRAM.
        for addr in (0x8000..=0xffffu16).step_by(CPU_PAGE_SIZE) {
            assert!(cart.cpu_peek(addr).is_some(), "addr {addr:04x}");
        }
        cart.cpu_write(0x6000, 0x5a, 0);
        assert_eq!(cart.cpu_peek(0x6000), Some(0x5a));
    }

    #[test]
    fn negative_banks_count_from_chip_end() {
        let cart = txrom();
        // MMC3 layout fixes -2/-1 at $C000/$E000 after reset.
        assert_eq!(cart.cpu_peek(0xc000), Some(30));
        assert_eq!(cart.cpu_peek(0xe000), Some(31));
    }

    #[test]
    fn oversized_bank_indices_wrap() {
        let mut cart = txrom();
        // Select PRG register 6 (the $8000 slot) and point it far past the
        // end of a 32-bank chip.
        cart.cpu_write(0x8000, 0x06, 0);
        cart.cpu_write(0x8001, 200, 0);
        assert_eq!(cart.cpu_peek(0x8000), Some((200 % 32) as u8));
    }

    #[test]
    fn ppu_pagemap_reads_chr() {
        let mut cart = txrom();
        // After reset CHR windows map banks 0..7 linearly.
        assert_eq!(cart.ppu_read(0x0000, 0), 0);
        assert_eq!(cart.ppu_read(0x0400, 0), 1);
        assert_eq!(cart.ppu_read(0x1c00, 0), 7);
    }

    #[test]
    fn ciram_and_mirroring() {
        let mut cart = txrom();
        // Mapper-controlled; reset picked the first table entry (vertical).
        cart.ppu_write(0x2000, 0x11, 0);
        assert_eq!(cart.ppu_read(0x2000, 0), 0x11);
        assert_eq!(cart.ppu_read(0x2800, 0), 0x11);

        // Writing 1 to the mirroring register gives
        // horizontal layout {0,0,1,1}.
        cart.cpu_write(0xa000, 0x01, 0);
        let banks: Vec<i32> = cart.board.nmt_banks.iter().map(|slot| slot.bank).collect();
        assert_eq!(banks, vec![0, 0, 1, 1]);
        cart.ppu_write(0x2000, 0x22, 0);
        assert_eq!(cart.ppu_read(0x2400, 0), 0x22);
        // Slot 2 now points at the second CIRAM bank, untouched since the
        // hard-reset fill.
        assert_eq!(cart.ppu_read(0x2800, 0), 0xff);
    }

    #[test]
    fn fixed_mirroring_ignores_mapper_writes() {
        let mut config = RomConfig::new(BoardType::TxRom, prg_rom(32), chr_rom(256));
        config.mirroring = Some(Mirroring::FourScreen);
        let mut cart = Cartridge::new(config).unwrap();
        let before: Vec<i32> = cart.board.nmt_banks.iter().map(|s| s.bank).collect();
        cart.cpu_write(0xa000, 0x01, 0);
        let after: Vec<i32> = cart.board.nmt_banks.iter().map(|s| s.bank).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn dip_switches_clamp_to_declared_count() {
        let mut cart = txrom();
        cart.toggle_dip_switch(1);
        assert_eq!(cart.dip_switches(), 0, "TxROM has no DIP switches");
    }

    #[test]
    fn nvram_round_trip_order() {
        let mut config = RomConfig::new(BoardType::TxRom, prg_rom(32), chr_rom(256));
        config.wram_nv = [true, false];
        let mut cart = Cartridge::new(config).unwrap();
        cart.cpu_write(0x6123, 0xab, 0);
        let bytes = cart.nvram_bytes().unwrap();
        assert_eq!(bytes.len(), SIZE_8K);
        assert_eq!(bytes[0x123], 0xab);

        let mut config = RomConfig::new(BoardType::TxRom, prg_rom(32), chr_rom(256));
        config.wram_nv = [true, false];
        let mut other = Cartridge::new(config).unwrap();
        other.load_nvram_bytes(&bytes);
        assert_eq!(other.cpu_peek(0x6123), Some(0xab));
    }

    #[test]
    fn save_state_round_trip_preserves_banking() {
        let mut cart = txrom();
        cart.cpu_write(0x8000, 0x06, 0);
        cart.cpu_write(0x8001, 0x11, 0);
        cart.cpu_write(0x8000, 0x07, 0);
        cart.cpu_write(0x8001, 0x12, 0);
        cart.cpu_write(0xa000, 0x01, 0);
        cart.cpu_write(0x6000, 0x77, 0);

        let state = cart.save_state();

        let mut other = txrom();
        other.load_state(&state).unwrap();
        assert_eq!(other.cpu_peek(0x8000), cart.cpu_peek(0x8000));
        assert_eq!(other.cpu_peek(0xa000), cart.cpu_peek(0xa000));
        assert_eq!(other.cpu_peek(0x6000), Some(0x77));
        let state2 = other.save_state();
        assert_eq!(state.to_bytes(), state2.to_bytes());
    }

    #[test]
    fn simple_write_helpers_model_bus_conflicts() {
        let mut cart = txrom();
        // The ROM byte at $8000 is bank 0's fill value (0); a conflicted
        // write can only select bank 0, a conflict-free one anything.
        cart.simple_prg_write(0x8000, 0x07, 0);
        assert_eq!(cart.board.prg_banks[1].bank, 0);
        cart.simple_prg_write_no_conflict(0x8000, 0x07, 0);
        assert_eq!(cart.board.prg_banks[1].bank, 7);
        cart.simple_chr_write(0x8000, 0x03, 0);
        assert_eq!(cart.board.chr_banks0[0].bank, 0x03 & 7);
    }

    #[test]
    fn secondary_pagemap_serves_split_fetches() {
        let mut cart = txrom();
        // Configure the secondary map to show a different CHR bank, the
        // mechanism split-screen hardware drives per column.
        cart.board.chr_banks1 = cart.board.chr_banks0;
        cart.board.chr_banks1[0].bank = 0x40;
        cart.chr_sync(PageMapSet::Secondary);

        assert_eq!(cart.ppu_read(0x0000, 0), 0);
        cart.select_pagemap(PageMapSet::Secondary);
        assert_eq!(cart.ppu_read(0x0000, 0), 0x40);
        // Nametables are shared between the maps.
        cart.ppu_write(0x2000, 0x33, 0);
        cart.select_pagemap(PageMapSet::Primary);
        assert_eq!(cart.ppu_read(0x2000, 0), 0x33);
    }

    #[test]
    fn fill_mode_nametable() {
        let mut cart = txrom();
        cart.set_fill_mode(0x5a, 0x02);
        cart.board.nmt_banks[0].target = BankTarget::Fill;
        cart.internal_nmt_sync();
        assert_eq!(cart.ppu_read(0x2000, 0), 0x5a);
        assert_eq!(cart.ppu_read(0x23c0, 0), 0xaa);
        // Fill pages are read-only.
        cart.ppu_write(0x2000, 0x00, 0);
        assert_eq!(cart.ppu_read(0x2000, 0), 0x5a);
    }

    #[test]
    fn load_state_is_atomic_on_bad_input() {
        let mut cart = txrom();
        cart.cpu_write(0x8000, 0x06, 0);
        cart.cpu_write(0x8001, 0x11, 0);
        let reference = cart.cpu_peek(0x8000);

        let mut state = cart.save_state();
        state.put_chunk("CIRM", vec![0; 3]); // wrong size
        assert!(cart.load_state(&state).is_err());
        assert_eq!(cart.cpu_peek(0x8000), reference);
    }
}
