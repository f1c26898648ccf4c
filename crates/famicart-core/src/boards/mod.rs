//! Board variant implementations and the descriptor registry.
//!
//! Each module covers one board family: its descriptor statics, register
//! write handlers, and the family's reset/init capability functions.
//! Derivatives compose by listing another family's handlers in their own
//! descriptor tables.

pub mod bandai;
pub mod irem;
pub mod jaleco;
pub mod jycompany;
pub mod mmc3;
pub mod rambo1;
pub mod sunsoft;
pub mod taito;
pub mod unrom512;
pub mod vrc;

use crate::board::Cartridge;
use crate::board::descriptor::BoardDescriptor;

/// Every registered board descriptor. Lookup by tag or name goes through
/// [`crate::board::descriptor::lookup`].
pub static REGISTRY: &[&BoardDescriptor] = &[
    &mmc3::TXROM,
    &mmc3::TXROM_MMC3A,
    &mmc3::TXSROM,
    &mmc3::TQROM,
    &mmc3::HKROM,
    &mmc3::ACCLAIM_MC_ACC,
    &rambo1::TENGEN_800032,
    &rambo1::TENGEN_800037,
    &taito::TAITO_TC0190FMC,
    &taito::TAITO_TC0190FMC_PAL16R4,
    &vrc::VRC2A,
    &vrc::VRC2B,
    &vrc::VRC2C,
    &vrc::VRC4A,
    &vrc::VRC4B,
    &vrc::VRC4C,
    &vrc::VRC4D,
    &vrc::VRC4E,
    &vrc::VRC4F,
    &vrc::VRC4AC_COMPAT,
    &vrc::VRC4BD_COMPAT,
    &vrc::VRC2B_VRC4E_COMPAT,
    &vrc::VRC3,
    &vrc::VRC6A,
    &vrc::VRC6B,
    &bandai::BANDAI_FCG,
    &bandai::BANDAI_LZ93D50,
    &bandai::BANDAI_JUMP2,
    &jaleco::JALECO_SS88006,
    &sunsoft::SUNSOFT3,
    &irem::IREM_H3001,
    &jycompany::JYCOMPANY_A,
    &jycompany::JYCOMPANY_B,
    &jycompany::JYCOMPANY_C,
    &unrom512::UNROM512,
    &unrom512::UNROM512_FLASH,
    &unrom512::BTL_SMB2A,
];

// Handlers shared across families.

/// Route a mirroring-register write through the descriptor's value table.
pub(crate) fn standard_mirroring_handler(cart: &mut Cartridge, _addr: u16, value: u8, _cycles: u32) {
    cart.standard_mirroring_write(value);
}

// A12 timer register handlers in the MMC3 layout; derivative boards list
// these directly in their descriptors.

pub(crate) fn a12_irq_latch(cart: &mut Cartridge, _addr: u16, value: u8, cycles: u32) {
    if let Some(a12) = cart.a12.as_mut() {
        a12.set_reload(&mut cart.irq, value as u32, cycles);
    }
}

pub(crate) fn a12_irq_reload(cart: &mut Cartridge, _addr: u16, _value: u8, cycles: u32) {
    if let Some(a12) = cart.a12.as_mut() {
        a12.force_reload(&mut cart.irq, cycles);
    }
}

pub(crate) fn a12_irq_disable(cart: &mut Cartridge, _addr: u16, _value: u8, cycles: u32) {
    if let Some(a12) = cart.a12.as_mut() {
        a12.set_irq_enabled(&mut cart.irq, false, cycles);
    }
}

pub(crate) fn a12_irq_enable(cart: &mut Cartridge, _addr: u16, _value: u8, cycles: u32) {
    if let Some(a12) = cart.a12.as_mut() {
        a12.set_irq_enabled(&mut cart.irq, true, cycles);
    }
}
