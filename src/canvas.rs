use crate::font::FontRole;
use crate::types::{Gradient, Loc, Rgba};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetFillColor(Rgba),
    SetFont {
        role: FontRole,
        size: f32,
    },
    // `y` is the top of the line box; the rasterizer places the baseline from font metrics.
    DrawString {
        x: f32,
        y: f32,
        text: String,
    },
    DrawRect {
        loc: Loc,
        radius: f32,
    },
    DrawGradientRect {
        loc: Loc,
        gradient: Gradient,
        radius: f32,
    },
    // `source` is a file path or a data URI, resolved through the resource cache.
    DrawImage {
        loc: Loc,
        source: String,
        tint: Option<Rgba>,
    },
}

/// A fully recorded report, ready for rasterization.
#[derive(Debug, Clone)]
pub struct Document {
    pub width: u32,
    pub height: u32,
    pub background: Rgba,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Rgba,
    font: Option<(FontRole, f32)>,
}

/// Records drawing operations. Sections draw into this; nothing touches pixels until the
/// finished [`Document`] is handed to the rasterizer.
pub struct Canvas {
    width: u32,
    height: u32,
    background: Rgba,
    commands: Vec<Command>,
    state: GraphicsState,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgba) -> Self {
        Self {
            width,
            height,
            background,
            commands: Vec::new(),
            state: GraphicsState {
                fill_color: Rgba::BLACK,
                font: None,
            },
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn set_fill_color(&mut self, color: Rgba) {
        if self.state.fill_color == color {
            return;
        }
        self.state.fill_color = color;
        self.commands.push(Command::SetFillColor(color));
    }

    pub fn set_font(&mut self, role: FontRole, size: f32) {
        if self.state.font == Some((role, size)) {
            return;
        }
        self.state.font = Some((role, size));
        self.commands.push(Command::SetFont { role, size });
    }

    pub fn draw_string(&mut self, x: f32, y: f32, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.commands.push(Command::DrawString { x, y, text });
    }

    pub fn draw_text(&mut self, role: FontRole, size: f32, color: Rgba, x: f32, y: f32, text: &str) {
        self.set_font(role, size);
        self.set_fill_color(color);
        self.draw_string(x, y, text);
    }

    pub fn draw_rect(&mut self, loc: Loc, color: Rgba) {
        self.draw_round_rect(loc, color, 0.0);
    }

    pub fn draw_round_rect(&mut self, loc: Loc, color: Rgba, radius: f32) {
        if loc.width <= 0.0 || loc.height <= 0.0 {
            return;
        }
        self.set_fill_color(color);
        self.commands.push(Command::DrawRect {
            loc,
            radius: radius.max(0.0),
        });
    }

    pub fn draw_gradient_rect(&mut self, loc: Loc, gradient: Gradient, radius: f32) {
        if loc.width <= 0.0 || loc.height <= 0.0 {
            return;
        }
        self.commands.push(Command::DrawGradientRect {
            loc,
            gradient,
            radius: radius.max(0.0),
        });
    }

    pub fn draw_image(&mut self, loc: Loc, source: impl Into<String>, tint: Option<Rgba>) {
        self.commands.push(Command::DrawImage {
            loc,
            source: source.into(),
            tint,
        });
    }

    pub fn finish(self) -> Document {
        Document {
            width: self.width,
            height: self.height,
            background: self.background,
            commands: self.commands,
        }
    }
}
