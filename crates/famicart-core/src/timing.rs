//! Master-clock timing parameters shared by the board and its timers.
//!
//! Everything in this crate runs on a single master-cycle timeline. CPU
//! cycles are `cpu_clock_divider` master cycles long, PPU dots are
//! `ppu_clock_divider` master cycles long. A rendered scanline is 341 dots;
//! a frame is the pre-render line (-1), 240 visible lines, one post-render
//! line, and `vblank_scanlines` of vertical blank.

pub const DOTS_PER_SCANLINE: i32 = 341;
pub const VISIBLE_SCANLINES: i32 = 240;

/// Console region. Only the timing parameters differ at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
    Dendy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemTiming {
    /// Master cycles per CPU cycle (12 NTSC, 16 PAL).
    pub cpu_clock_divider: u32,
    /// Master cycles per PPU dot (4 NTSC, 5 PAL/Dendy).
    pub ppu_clock_divider: u32,
    /// Scanlines of vertical blank (20 NTSC, 70 PAL/Dendy).
    pub vblank_scanlines: i32,
    /// NTSC drops one dot on odd rendered frames.
    pub has_short_frame: bool,
}

impl SystemTiming {
    pub const fn new(region: Region) -> Self {
        match region {
            Region::Ntsc => Self {
                cpu_clock_divider: 12,
                ppu_clock_divider: 4,
                vblank_scanlines: 20,
                has_short_frame: true,
            },
            Region::Pal => Self {
                cpu_clock_divider: 16,
                ppu_clock_divider: 5,
                vblank_scanlines: 70,
                has_short_frame: false,
            },
            Region::Dendy => Self {
                cpu_clock_divider: 15,
                ppu_clock_divider: 5,
                vblank_scanlines: 70,
                has_short_frame: false,
            },
        }
    }

    /// Scanlines per frame counting the pre-render line.
    #[inline]
    pub const fn frame_scanlines(&self) -> i32 {
        VISIBLE_SCANLINES + 2 + self.vblank_scanlines
    }
}

impl Default for SystemTiming {
    fn default() -> Self {
        Self::new(Region::Ntsc)
    }
}

/// A point on the PPU dot grid, derived from a master-cycle timestamp.
///
/// `dot` is 1-based within the scanline (1..=341 exclusive of wrap), and the
/// pre-render line is scanline -1, matching the fetch-window arithmetic used
/// by the A12 timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpuPos {
    /// Master-cycle timestamp this position was derived from.
    pub cycles: u32,
    pub scanline: i32,
    pub dot: i32,
}

impl PpuPos {
    /// Locate `cycles` within the frame that started at master cycle
    /// `frame_start` (scanline -1, dot 1).
    pub fn locate(cycles: u32, frame_start: u32, timing: &SystemTiming) -> Self {
        let clocks = cycles.saturating_sub(frame_start) / timing.ppu_clock_divider;
        let frame_len = (timing.frame_scanlines() * DOTS_PER_SCANLINE) as u32;
        let clocks = clocks % frame_len;
        let scanline = (clocks / DOTS_PER_SCANLINE as u32) as i32 - 1;
        let dot = (clocks % DOTS_PER_SCANLINE as u32) as i32 + 1;
        Self {
            cycles,
            scanline,
            dot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntsc_frame_geometry() {
        let t = SystemTiming::new(Region::Ntsc);
        assert_eq!(t.frame_scanlines(), 262);
        assert_eq!(t.frame_scanlines() * DOTS_PER_SCANLINE, 89342);
    }

    #[test]
    fn locate_maps_frame_start_to_prerender() {
        let t = SystemTiming::new(Region::Ntsc);
        let pos = PpuPos::locate(0, 0, &t);
        assert_eq!((pos.scanline, pos.dot), (-1, 1));

        // One full scanline later.
        let pos = PpuPos::locate(341 * t.ppu_clock_divider, 0, &t);
        assert_eq!((pos.scanline, pos.dot), (0, 1));

        // Dot 5 of scanline 2.
        let clocks = (3 * 341 + 4) as u32;
        let pos = PpuPos::locate(clocks * t.ppu_clock_divider, 0, &t);
        assert_eq!((pos.scanline, pos.dot), (2, 5));
    }
}
