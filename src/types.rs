/// 8-bit straight (non-premultiplied) color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Black at the given alpha; the report draws almost everything this way.
    pub const fn ink(a: u8) -> Self {
        Self { r: 0, g: 0, b: 0, a }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Scales the color channels toward black by `ratio` (0 keeps, 1 is black).
    pub fn darken(self, ratio: f32) -> Self {
        let keep = (1.0 - ratio).clamp(0.0, 1.0);
        let scale = |c: u8| ((c as f32) * keep).round().clamp(0.0, 255.0) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: self.a,
        }
    }

    /// Parses `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().strip_prefix('#')?;
        if !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

/// Axis-aligned box in canvas pixels, y growing downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loc {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Loc {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_i32(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x as f32, y as f32, width as f32, height as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientDirection {
    Horizontal,
    Vertical,
    /// Top-left to bottom-right.
    Diagonal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32, // 0..=1
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub stops: Vec<GradientStop>,
    pub direction: GradientDirection,
}

impl Gradient {
    /// Spreads `colors` evenly over 0..=1.
    pub fn even(colors: &[Rgba], direction: GradientDirection) -> Self {
        let last = colors.len().saturating_sub(1).max(1) as f32;
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, color)| GradientStop {
                offset: i as f32 / last,
                color: *color,
            })
            .collect();
        Self { stops, direction }
    }

    pub fn first_color(&self) -> Rgba {
        self.stops.first().map(|s| s.color).unwrap_or(Rgba::BLACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(Rgba::from_hex("#FC466B"), Some(Rgba::rgb(0xfc, 0x46, 0x6b)));
        assert_eq!(Rgba::from_hex("#00000080"), Some(Rgba::ink(0x80)));
        assert_eq!(Rgba::from_hex("FC466B"), None);
        assert_eq!(Rgba::from_hex("#FC46"), None);
    }

    #[test]
    fn darken_scales_toward_black() {
        let c = Rgba::rgb(200, 100, 10).darken(0.3);
        assert_eq!(c, Rgba::rgb(140, 70, 7));
        assert_eq!(Rgba::WHITE.darken(1.0), Rgba::BLACK);
    }

    #[test]
    fn even_gradient_spans_unit_interval() {
        let g = Gradient::even(
            &[Rgba::BLACK, Rgba::WHITE, Rgba::BLACK],
            GradientDirection::Horizontal,
        );
        let offsets: Vec<f32> = g.stops.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0.0, 0.5, 1.0]);

        let single = Gradient::even(&[Rgba::WHITE], GradientDirection::Vertical);
        assert_eq!(single.stops[0].offset, 0.0);
    }
}
