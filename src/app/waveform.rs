use std::time::Duration;

/// Number of bars in the visualization.
pub const BAR_COUNT: usize = 40;

/// How often the bars re-randomize while recording.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);

const MIN_HEIGHT: u8 = 1;
const MAX_HEIGHT: u8 = 8;

const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Cosmetic recording indicator: a row of bars that jump to random
/// heights every frame while capture is active. The heights are
/// decorative and carry no information about the incoming audio.
#[derive(Debug)]
pub struct Waveform {
    heights: [u8; BAR_COUNT],
    rng_state: u32,
}

impl Waveform {
    pub fn new() -> Self {
        Self {
            heights: [MIN_HEIGHT; BAR_COUNT],
            rng_state: 0x1F2E_3D4C,
        }
    }

    /// Advance one animation frame, giving every bar a fresh random
    /// height.
    pub fn tick(&mut self) {
        for i in 0..self.heights.len() {
            self.heights[i] =
                MIN_HEIGHT + (self.next_random() % (MAX_HEIGHT - MIN_HEIGHT + 1) as u32) as u8;
        }
    }

    /// Drop all bars back to the resting height. Takes effect on the
    /// next render, with no decay animation.
    pub fn reset(&mut self) {
        self.heights = [MIN_HEIGHT; BAR_COUNT];
    }

    /// Render the bars as one line of block glyphs.
    pub fn render(&self) -> String {
        self.heights
            .iter()
            .map(|&h| BLOCKS[(h - 1).min(7) as usize])
            .collect()
    }

    fn next_random(&mut self) -> u32 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(1_103_515_245)
            .wrapping_add(12_345);
        (self.rng_state >> 16) & 0x3FFF
    }
}

impl Default for Waveform {
    fn default() -> Self {
        Self::new()
    }
}
