// Lighting modes - seven spectrum-to-strip algorithms
//
// Every mode is a transform from the normalized spectrum and the previous
// strip contents to the next strip contents. Band aggregation is always max
// over a contiguous bin range: "is there energy anywhere in this band", not
// average loudness. Switching modes keeps the shared strip, so stale colors
// from the previous mode persist until the new rules fade or overwrite them.

use crate::audio::BIN_COUNT;

/// Number of cells on the strip
pub const CELL_COUNT: usize = 10;

/// Per-tick fade step applied by the decaying modes
pub const DECAY_STEP: u8 = 50;

/// One RGB cell, each component 0-255.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };

    fn fade(&mut self, step: u8) {
        self.r = self.r.saturating_sub(step);
        self.g = self.g.saturating_sub(step);
        self.b = self.b.saturating_sub(step);
    }
}

/// The 10-cell strip state. Persists across ticks; modes read the previous
/// contents to implement fading trails and scrolling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Strip {
    pub cells: [Rgb; CELL_COUNT],
}

impl Strip {
    pub fn is_dark(&self) -> bool {
        self.cells.iter().all(|cell| *cell == Rgb::OFF)
    }

    fn fade_cells(&mut self, from: usize, to: usize) {
        for cell in &mut self.cells[from..to] {
            cell.fade(DECAY_STEP);
        }
    }

    /// Copy the front half onto the back half in reverse order.
    fn mirror_back_half(&mut self) {
        for i in 0..CELL_COUNT / 2 {
            self.cells[CELL_COUNT - 1 - i] = self.cells[i];
        }
    }
}

/// Half-open bin span aggregated into one band level
type Band = (usize, usize);

/// Five narrow low-end bands, one per mirrored cell pair (mode 1)
const MIRROR_BANDS: [Band; 5] = [(0, 2), (2, 4), (4, 8), (8, 14), (14, 30)];

/// Low/mid/high split shared by modes 2, 3, 4, 5 and 7
const THIRD_BANDS: [Band; 3] = [(0, 5), (5, 23), (23, 60)];

/// Trigger threshold for the three-band modes
const THIRD_TRIGGER: f32 = 750.0;

/// Four-cell spans written by the block modes, indexed red/green/blue
const BLOCK_CELLS: [[usize; 4]; 3] = [[0, 1, 2, 3], [3, 4, 5, 6], [6, 7, 8, 9]];

/// Scattered cell sets written by the stripe mode, indexed red/green/blue
const STRIPE_CELLS: [[usize; 4]; 3] = [[0, 3, 6, 9], [1, 4, 5, 8], [2, 4, 5, 7]];

fn band_level(bins: &[f32; BIN_COUNT], band: Band) -> f32 {
    bins[band.0..band.1].iter().fold(0.0f32, |acc, &v| acc.max(v))
}

fn set_component(cell: &mut Rgb, color: usize, value: u8) {
    match color {
        0 => cell.r = value,
        1 => cell.g = value,
        _ => cell.b = value,
    }
}

/// Round a band-derived level into a color component.
fn level_to_component(value: f32) -> u8 {
    let rounded = value.round();
    if rounded >= 255.0 {
        255
    } else if rounded <= 0.0 {
        0
    } else {
        rounded as u8
    }
}

/// The closed set of lighting modes. Ids 1-7 are stable and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightMode {
    /// 1: five mirrored band pairs with a red/green/blue threshold cascade
    MirroredBands,
    /// 2: fixed four-cell color blocks, one per band
    ColorBlocks,
    /// 3: scattered stripe sets, one per band
    Stripes,
    /// 4: whole-strip flood per band
    Flood,
    /// 5: scrolling mirror fed at the center cell
    Scroll,
    /// 6: one cell per band, level-scaled, color picked by tier
    CellMeter,
    /// 7: quartic-response color blocks, overwrite instead of fade
    EnergyPulse,
}

impl LightMode {
    pub const ALL: [LightMode; 7] = [
        LightMode::MirroredBands,
        LightMode::ColorBlocks,
        LightMode::Stripes,
        LightMode::Flood,
        LightMode::Scroll,
        LightMode::CellMeter,
        LightMode::EnergyPulse,
    ];

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(LightMode::MirroredBands),
            2 => Some(LightMode::ColorBlocks),
            3 => Some(LightMode::Stripes),
            4 => Some(LightMode::Flood),
            5 => Some(LightMode::Scroll),
            6 => Some(LightMode::CellMeter),
            7 => Some(LightMode::EnergyPulse),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            LightMode::MirroredBands => 1,
            LightMode::ColorBlocks => 2,
            LightMode::Stripes => 3,
            LightMode::Flood => 4,
            LightMode::Scroll => 5,
            LightMode::CellMeter => 6,
            LightMode::EnergyPulse => 7,
        }
    }

    /// Advance the strip by one tick under this mode's rules.
    pub fn advance(self, bins: &[f32; BIN_COUNT], strip: &mut Strip) {
        match self {
            LightMode::MirroredBands => advance_mirrored(bins, strip),
            LightMode::ColorBlocks => advance_cell_sets(bins, strip, &BLOCK_CELLS),
            LightMode::Stripes => advance_cell_sets(bins, strip, &STRIPE_CELLS),
            LightMode::Flood => advance_flood(bins, strip),
            LightMode::Scroll => advance_scroll(bins, strip),
            LightMode::CellMeter => advance_cell_meter(bins, strip),
            LightMode::EnergyPulse => advance_energy_pulse(bins, strip),
        }
    }
}

/// Mode 1: fade the front half, run the threshold cascade per band, mirror.
///
/// The cascade is deliberately exclusive: a band above 900 lights red only,
/// never red and green together. Highest threshold wins.
fn advance_mirrored(bins: &[f32; BIN_COUNT], strip: &mut Strip) {
    strip.fade_cells(0, 5);

    for (i, band) in MIRROR_BANDS.iter().enumerate() {
        let level = band_level(bins, *band);
        let cell = &mut strip.cells[i];
        if level > 900.0 {
            cell.r = 255;
        } else if level > 800.0 {
            cell.g = 255;
        } else if level > 650.0 {
            cell.b = 255;
        }
    }

    strip.mirror_back_half();
}

/// Modes 2 and 3: fade everything, then saturate one cell set per band that
/// crosses the trigger. The sets may overlap; the layers are independent.
fn advance_cell_sets(bins: &[f32; BIN_COUNT], strip: &mut Strip, sets: &[[usize; 4]; 3]) {
    strip.fade_cells(0, CELL_COUNT);

    for (color, cells) in sets.iter().enumerate() {
        if band_level(bins, THIRD_BANDS[color]) > THIRD_TRIGGER {
            for &i in cells {
                set_component(&mut strip.cells[i], color, 255);
            }
        }
    }
}

/// Mode 4: fade everything, then flood the whole strip per triggered band.
fn advance_flood(bins: &[f32; BIN_COUNT], strip: &mut Strip) {
    strip.fade_cells(0, CELL_COUNT);

    for color in 0..3 {
        if band_level(bins, THIRD_BANDS[color]) > THIRD_TRIGGER {
            for cell in &mut strip.cells {
                set_component(cell, color, 255);
            }
        }
    }
}

/// Mode 5: scroll the front half outward, feed new color at the center.
///
/// Cells 0..4 shift toward the edge, cells 4-5 fade, triggered bands write
/// their component into cell 4 independently (all three may light at once),
/// and the back half mirrors the front. Cell 5 fades before the mirror
/// overwrites it with cell 4.
fn advance_scroll(bins: &[f32; BIN_COUNT], strip: &mut Strip) {
    for i in 0..4 {
        strip.cells[i] = strip.cells[i + 1];
    }
    strip.fade_cells(4, 6);

    for color in 0..3 {
        if band_level(bins, THIRD_BANDS[color]) > THIRD_TRIGGER {
            set_component(&mut strip.cells[4], color, 255);
        }
    }

    strip.mirror_back_half();
}

/// Mode 6: one cell per three-bin band, rebuilt from scratch every tick.
/// The band level picks both the color tier and the brightness.
fn advance_cell_meter(bins: &[f32; BIN_COUNT], strip: &mut Strip) {
    for (i, cell) in strip.cells.iter_mut().enumerate() {
        let level = band_level(bins, (i * 3, i * 3 + 3));
        *cell = Rgb::OFF;
        let value = level_to_component(level / 3.0);
        if level > 800.0 {
            cell.r = value;
        } else if level > 600.0 {
            cell.b = value;
        } else {
            cell.g = value;
        }
    }
}

/// Mode 7: quartic response into fixed color blocks. Only the block
/// components are written; everything else on the strip is left alone.
fn advance_energy_pulse(bins: &[f32; BIN_COUNT], strip: &mut Strip) {
    for (color, cells) in BLOCK_CELLS.iter().enumerate() {
        let level = band_level(bins, THIRD_BANDS[color]);
        let shaped = level.powi(4) / 1e9;
        let value = level_to_component(shaped / 3.0);
        for &i in cells {
            set_component(&mut strip.cells[i], color, value);
        }
    }
}
