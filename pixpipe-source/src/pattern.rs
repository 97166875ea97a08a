//! Synthetic test patterns.
//!
//! Every pattern renders interleaved RGB at the session size. Frame `t`
//! is a pure function of `t`, so a viewer can check what it received.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// Diagonal gradient scrolling one pixel per frame.
    #[default]
    Gradient,
    /// Vertical colour bars with a white box moving across them.
    Bars,
    /// The same image every frame.
    Still,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gradient => write!(f, "gradient"),
            Self::Bars => write!(f, "bars"),
            Self::Still => write!(f, "still"),
        }
    }
}

impl std::str::FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gradient" => Ok(Self::Gradient),
            "bars" => Ok(Self::Bars),
            "still" => Ok(Self::Still),
            other => Err(format!("unknown pattern '{other}'")),
        }
    }
}

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

impl Pattern {
    /// Render frame `t` into `out` (`width * height * 3` bytes).
    pub fn render(self, width: u32, height: u32, t: u64, out: &mut [u8]) {
        let w = width as usize;
        let h = height as usize;
        debug_assert_eq!(out.len(), w * h * 3);

        match self {
            Self::Gradient => render_gradient(w, out, t),
            Self::Still => render_gradient(w, out, 0),
            Self::Bars => render_bars(w, h, out, t),
        }
    }
}

fn render_gradient(w: usize, out: &mut [u8], t: u64) {
    let shift = t as usize;
    for (i, px) in out.chunks_exact_mut(3).enumerate() {
        let x = i % w + shift;
        let y = i / w;
        px[0] = x as u8;
        px[1] = y as u8;
        px[2] = (x + y) as u8 / 2;
    }
}

fn render_bars(w: usize, h: usize, out: &mut [u8], t: u64) {
    let bar_width = w.div_ceil(BARS.len()).max(1);
    let box_size = (h / 4).max(1);
    let box_x = (t as usize * 4) % w.max(1);
    let box_y = h / 2 - box_size / 2;

    for (i, px) in out.chunks_exact_mut(3).enumerate() {
        let x = i % w;
        let y = i / w;
        let in_box = x >= box_x && x < box_x + box_size && y >= box_y && y < box_y + box_size;
        let colour = if in_box {
            [255, 255, 255]
        } else {
            BARS[(x / bar_width).min(BARS.len() - 1)]
        };
        px.copy_from_slice(&colour);
    }
}
