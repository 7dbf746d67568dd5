use crate::types::{Gradient, GradientDirection, Rgba};
use board_snapshot::text_sha256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub name: &'static str,
    pub colors: &'static [&'static str],
}

pub const PALETTES: [Palette; 12] = [
    Palette { name: "Morning Peach", colors: &["#C6FFDD", "#FBD786", "#F7797D"] },
    Palette { name: "Cobalt Ember", colors: &["#009FFF", "#EC2F4B"] },
    Palette { name: "Lagoon Gold", colors: &["#22C1C3", "#FDBB2D"] },
    Palette { name: "Dusk Horizon", colors: &["#3A1C71", "#D76D77", "#FFAF7B"] },
    Palette { name: "Lemon Sky", colors: &["#00C3FF", "#FFFF1C"] },
    Palette { name: "Tropical Haze", colors: &["#FEAC5E", "#C779D0", "#4BC0C8"] },
    Palette { name: "Mint Blossom", colors: &["#C9FFBF", "#FFAFBD"] },
    Palette { name: "Coral Reef", colors: &["#FC354C", "#0ABFBC"] },
    Palette { name: "Velvet Evening", colors: &["#355C7D", "#6C5B7B", "#C06C84"] },
    Palette { name: "Emerald Tide", colors: &["#00F260", "#0575E6"] },
    Palette { name: "Festival Neon", colors: &["#833AB4", "#FD1D1D", "#FCB045"] },
    Palette { name: "Vivid Violet", colors: &["#FC466B", "#3F5EFB"] },
];

/// A palette resolved for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ChosenPalette {
    pub name: &'static str,
    pub colors: Vec<Rgba>,
    pub reversed: bool,
}

impl ChosenPalette {
    pub fn gradient(&self, direction: GradientDirection) -> Gradient {
        Gradient::even(&self.colors, direction)
    }

    /// The leading color; the title block is drawn in a darkened variant of it.
    pub fn accent(&self) -> Rgba {
        self.colors.first().copied().unwrap_or(Rgba::BLACK)
    }
}

fn digest_word(seed: &str, offset: usize) -> u32 {
    let digest = text_sha256(seed);
    digest
        .get(offset..offset + 8)
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .unwrap_or(0)
}

/// Same seed, same palette. Reports seed with board name plus date so a day's image is
/// reproducible.
pub fn choose_palette(seed: &str) -> ChosenPalette {
    let palette = PALETTES[digest_word(seed, 0) as usize % PALETTES.len()];
    let reversed = digest_word(seed, 8) % 2 == 1;
    let mut colors: Vec<Rgba> = palette
        .colors
        .iter()
        .filter_map(|hex| Rgba::from_hex(hex))
        .collect();
    if reversed {
        colors.reverse();
    }
    ChosenPalette {
        name: palette.name,
        colors,
        reversed,
    }
}

pub fn choose_tip<'a>(tips: &'a [String], seed: &str) -> Option<&'a str> {
    if tips.is_empty() {
        return None;
    }
    let index = digest_word(seed, 16) as usize % tips.len();
    tips.get(index).map(String::as_str)
}
