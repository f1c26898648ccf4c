//! Cartridge IRQ timers: the M2 (CPU-bus) counter and the A12 (PPU
//! address-line) counter.

pub mod a12;
pub mod m2;
