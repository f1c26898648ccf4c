//! Per-family mutable scratch state.
//!
//! Each board family that needs registers beyond the shared bank/mask set
//! gets its own struct with named fields, carried in the board instance as
//! a tagged union. The savestate layer packs whichever variant is live into
//! the `BRD ` chunk with explicit widths.

use crate::savestate::{Packer, ShortChunk, Unpacker};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mmc3State {
    /// `$8000` latch: low bits select the target bank register, high bits
    /// carry the PRG/CHR mode toggles.
    pub bank_select: u8,
    /// Which `bank_select` bits select a register (0x07 MMC3, 0x0f RAMBO-1).
    pub bank_select_mask: u8,
    /// Which `bank_select` bits are CHR layout toggles (0x80 MMC3, 0xa0
    /// RAMBO-1).
    pub chr_mode_mask: u8,
    /// `$A001` value; MMC6 keys its RAM protection off this.
    pub wram_protect: u8,
    /// RAMBO-1 extra 1 KiB CHR registers (K0/K1 and their high pair).
    pub ext_regs: [u8; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vrc2State {
    /// VRC2 one-bit "security" latch readable at `$6000` on RAM-less carts.
    pub security: u8,
    /// Assembled 8-bit IRQ latch (VRC4 writes it as two nibbles).
    pub irq_latch: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JyState {
    /// CHR outer-block select (`$D003`).
    pub chr_block: u8,
    /// Nametable control bits from `$D000` (ROM-nametable enable et al).
    pub nmt_mode: u8,
    /// `$D001` mirroring value.
    pub mirroring: u8,
    /// `$D002` CIRAM/ROM select comparator.
    pub nmt_select: u8,
    /// `$5800`/`$5801` multiplier operands.
    pub mult: [u8; 2],
    /// XOR applied to IRQ counter/prescaler writes (`$C006`).
    pub irq_xor: u8,
    /// MMC2-style CHR latches for 4 KiB mirror mode, one per half.
    pub chr_latch: [u8; 2],
    /// `$5803-$5807` scratch RAM.
    pub ram: [u8; 5],
    /// 16-bit nametable bank registers (`$B000-$B007`).
    pub nmt_banks: [u16; 4],
}

impl JyState {
    #[inline]
    pub fn product(&self) -> u16 {
        (self.mult[0] as u16).wrapping_mul(self.mult[1] as u16)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sunsoft3State {
    /// `$C800` writes alternate between the counter's high and low byte.
    pub load_toggle: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unrom512State {
    /// Last `$C000-$FFFF` write; bits 0-4 are the flash A14-A18 lines.
    pub latch: u8,
    /// Position within the JEDEC command sequence.
    pub command_index: u8,
    /// Accepted command byte (0xA0 program, 0x80 erase, 0x90 software id).
    pub command_id: u8,
    pub software_id_mode: bool,
    /// Set when flash contents changed since the last journal flush.
    pub dirty: bool,
}

/// Tagged union of family scratch states. Families with no extra registers
/// use `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantState {
    #[default]
    None,
    Mmc3(Mmc3State),
    Vrc2(Vrc2State),
    Jy(JyState),
    Sunsoft3(Sunsoft3State),
    Unrom512(Unrom512State),
}

impl VariantState {
    pub(crate) fn pack(&self, p: &mut Packer) {
        match self {
            Self::None => {
                p.u8(0);
            }
            Self::Mmc3(s) => {
                p.u8(1)
                    .u8(s.bank_select)
                    .u8(s.bank_select_mask)
                    .u8(s.chr_mode_mask)
                    .u8(s.wram_protect)
                    .bytes(&s.ext_regs);
            }
            Self::Vrc2(s) => {
                p.u8(2).u8(s.security).u8(s.irq_latch);
            }
            Self::Jy(s) => {
                p.u8(3)
                    .u8(s.chr_block)
                    .u8(s.nmt_mode)
                    .u8(s.mirroring)
                    .u8(s.nmt_select)
                    .bytes(&s.mult)
                    .u8(s.irq_xor)
                    .bytes(&s.chr_latch)
                    .bytes(&s.ram);
                for bank in s.nmt_banks {
                    p.u16(bank);
                }
            }
            Self::Sunsoft3(s) => {
                p.u8(4).bool(s.load_toggle);
            }
            Self::Unrom512(s) => {
                p.u8(5)
                    .u8(s.latch)
                    .u8(s.command_index)
                    .u8(s.command_id)
                    .bool(s.software_id_mode)
                    .bool(s.dirty);
            }
        }
    }

    pub(crate) fn unpack(u: &mut Unpacker<'_>) -> Result<Self, ShortChunk> {
        Ok(match u.u8()? {
            1 => {
                let mut s = Mmc3State {
                    bank_select: u.u8()?,
                    bank_select_mask: u.u8()?,
                    chr_mode_mask: u.u8()?,
                    wram_protect: u.u8()?,
                    ext_regs: [0; 4],
                };
                s.ext_regs.copy_from_slice(u.bytes(4)?);
                Self::Mmc3(s)
            }
            2 => Self::Vrc2(Vrc2State {
                security: u.u8()?,
                irq_latch: u.u8()?,
            }),
            3 => {
                let mut s = JyState {
                    chr_block: u.u8()?,
                    nmt_mode: u.u8()?,
                    mirroring: u.u8()?,
                    nmt_select: u.u8()?,
                    ..JyState::default()
                };
                s.mult.copy_from_slice(u.bytes(2)?);
                s.irq_xor = u.u8()?;
                s.chr_latch.copy_from_slice(u.bytes(2)?);
                s.ram.copy_from_slice(u.bytes(5)?);
                for bank in &mut s.nmt_banks {
                    *bank = u.u16()?;
                }
                Self::Jy(s)
            }
            4 => Self::Sunsoft3(Sunsoft3State {
                load_toggle: u.bool()?,
            }),
            5 => Self::Unrom512(Unrom512State {
                latch: u.u8()?,
                command_index: u.u8()?,
                command_id: u.u8()?,
                software_id_mode: u.bool()?,
                dirty: u.bool()?,
            }),
            _ => Self::None,
        })
    }
}
