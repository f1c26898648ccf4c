//! Physical memory chips carried on a cartridge board.
//!
//! The board instance is the sole owner of chip storage; the CPU and PPU
//! page tables refer to chips through [`ChipSelect`] handles plus byte
//! offsets, never through aliasing pointers.

pub const SIZE_1K: usize = 1024;
pub const SIZE_2K: usize = 2 * 1024;
pub const SIZE_4K: usize = 4 * 1024;
pub const SIZE_8K: usize = 8 * 1024;
pub const SIZE_16K: usize = 16 * 1024;
pub const SIZE_32K: usize = 32 * 1024;
pub const SIZE_64K: usize = 64 * 1024;
pub const SIZE_128K: usize = 128 * 1024;
pub const SIZE_256K: usize = 256 * 1024;
pub const SIZE_512K: usize = 512 * 1024;
pub const SIZE_1024K: usize = 1024 * 1024;
pub const SIZE_2048K: usize = 2048 * 1024;

/// What a chip physically is. `*Nv` chips survive power cycles and are the
/// targets of save-file I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipKind {
    Rom,
    Wram,
    WramNv,
    Vram,
    VramNv,
    MapperRam,
    MapperRamNv,
    Ciram,
}

impl ChipKind {
    #[inline]
    pub fn is_nonvolatile(self) -> bool {
        matches!(self, Self::WramNv | Self::VramNv | Self::MapperRamNv)
    }
}

#[derive(Debug, Clone)]
pub struct Chip {
    pub kind: ChipKind,
    pub data: Box<[u8]>,
}

impl Chip {
    pub fn new(kind: ChipKind, size: usize) -> Self {
        Self {
            kind,
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    pub fn from_data(kind: ChipKind, data: Vec<u8>) -> Self {
        Self {
            kind,
            data: data.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }
}

/// Handle naming one chip of the board's inventory. Page-table entries pair
/// one of these with a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipSelect {
    PrgRom,
    ChrRom,
    Wram0,
    Wram1,
    Vram0,
    Vram1,
    MapperRam,
    Ciram,
    /// Variant-writable 1 KiB fill-mode nametable.
    FillNmt,
    /// All-zero read-only 1 KiB nametable.
    ZeroNmt,
}
