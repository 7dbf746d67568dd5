use crate::canvas::Canvas;
use crate::error::BoardError;
use crate::section::{BoxedSection, Section};
use serde::{Deserialize, Serialize};

/// Every tuned layout constant, in canvas pixels unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetrics {
    pub content_width: i32,
    pub rank_tile_base_width: f32,
    pub rank_tile_stretch_width: f32,
    pub histogram_tile_base_height: i32,
    pub histogram_tile_stretch_height: i32,
    pub top_padding: i32,
    pub bottom_padding: i32,
    pub side_padding: i32,
    pub column_padding: i32,
    pub section_padding: i32,
    /// A section shorter than `target / small_section_divisor` never opens a new column.
    pub small_section_divisor: i32,
    pub rank_entries_per_column: usize,
    pub max_rank_columns: usize,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            content_width: 1248,
            rank_tile_base_width: 360.0,
            rank_tile_stretch_width: 480.0,
            histogram_tile_base_height: 22,
            histogram_tile_stretch_height: 198,
            top_padding: 168,
            bottom_padding: 158,
            side_padding: 128,
            column_padding: 32,
            section_padding: 108,
            small_section_divisor: 4,
            rank_entries_per_column: 32,
            max_rank_columns: 3,
        }
    }
}

impl LayoutMetrics {
    pub fn validate(&self) -> Result<(), BoardError> {
        let checks: [(bool, &str); 6] = [
            (self.content_width > 0, "content_width must be positive"),
            (self.small_section_divisor > 0, "small_section_divisor must be positive"),
            (self.rank_entries_per_column > 0, "rank_entries_per_column must be positive"),
            (self.max_rank_columns > 0, "max_rank_columns must be positive"),
            (
                self.rank_tile_base_width >= 0.0 && self.rank_tile_stretch_width >= 0.0,
                "rank tile widths must not be negative",
            ),
            (
                [
                    self.top_padding,
                    self.bottom_padding,
                    self.side_padding,
                    self.column_padding,
                    self.section_padding,
                    self.histogram_tile_base_height,
                    self.histogram_tile_stretch_height,
                ]
                .iter()
                .all(|v| *v >= 0),
                "paddings and histogram heights must not be negative",
            ),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(BoardError::InvalidConfiguration(message.to_string())),
            None => Ok(()),
        }
    }

    /// Horizontal distance between the left edges of two adjacent columns.
    pub fn column_pitch(&self) -> i32 {
        self.content_width + self.column_padding
    }

    /// Panel width for `columns` content columns.
    pub fn panel_width(&self, columns: usize) -> i32 {
        let columns = columns.max(1) as i32;
        self.content_width * columns + self.column_padding * (columns - 1)
    }
}

/// Where each section of a multi-column block goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub columns: usize,
    pub target_height: i32,
    /// First column of each section, in input order.
    pub assignments: Vec<usize>,
    spans: Vec<usize>,
}

impl ColumnPlan {
    /// Columns covered by section `index`.
    pub fn span(&self, index: usize) -> std::ops::Range<usize> {
        let start = self.assignments[index];
        start..start + self.spans[index]
    }

    /// Runs the column cursors over `heights`; each cursor starts at `origin - padding`.
    /// A spanning section first moves every column it covers down to the deepest of them.
    pub fn column_bottoms(&self, heights: &[i32], padding: i32, origin: i32) -> Vec<i32> {
        let mut cursors = vec![origin - padding; self.columns];
        for (index, height) in heights.iter().enumerate() {
            let span = self.span(index);
            let bottom = cursors[span.clone()].iter().copied().max().unwrap_or(origin);
            for cursor in &mut cursors[span] {
                *cursor = bottom + padding + height;
            }
        }
        cursors
    }
}

/// Greedy column balancing over `(height, columns)` pairs. Single-column sections fill the
/// current column until the next one would pass the target height; only sections taller
/// than `target / small_section_divisor` open a new column, wrapping after the last one.
/// Spanning sections start at column 0 and restart the fill there.
pub fn balance_columns(sections: &[(i32, usize)], padding: i32, small_section_divisor: i32) -> ColumnPlan {
    let columns = sections.iter().map(|(_, c)| *c).max().unwrap_or(1).max(1);
    let single: Vec<i32> = sections
        .iter()
        .filter(|(_, c)| *c <= 1)
        .map(|(h, _)| *h)
        .collect();
    let target_height = (single.iter().sum::<i32>() / columns as i32)
        .max(single.iter().copied().max().unwrap_or(0));
    let divisor = small_section_divisor.max(1);

    let mut assignments = Vec::with_capacity(sections.len());
    let mut spans = Vec::with_capacity(sections.len());
    let (mut column, mut filled) = (0usize, 0i32);
    for (height, span) in sections {
        if *span > 1 {
            assignments.push(0);
            spans.push((*span).min(columns));
            column = 0;
            filled = 0;
            continue;
        }
        if filled + height > target_height && *height > target_height / divisor {
            column = (column + 1) % columns;
            filled = 0;
        }
        filled += height + padding;
        assignments.push(column);
        spans.push(1);
    }

    ColumnPlan {
        columns,
        target_height,
        assignments,
        spans,
    }
}

/// Lays out child sections over balanced columns. The plan is computed once, at
/// construction, and shared by the height pass and the draw pass.
pub struct MultiColumnSection {
    sections: Vec<BoxedSection>,
    heights: Vec<i32>,
    plan: ColumnPlan,
    padding: i32,
    pitch: i32,
}

impl MultiColumnSection {
    pub fn new(sections: Vec<BoxedSection>, metrics: &LayoutMetrics) -> Self {
        let measured: Vec<(i32, usize)> = sections.iter().map(|s| (s.height(), s.columns())).collect();
        let plan = balance_columns(&measured, metrics.section_padding, metrics.small_section_divisor);
        Self {
            heights: measured.iter().map(|(h, _)| *h).collect(),
            sections,
            plan,
            padding: metrics.section_padding,
            pitch: metrics.column_pitch(),
        }
    }

    pub fn plan(&self) -> &ColumnPlan {
        &self.plan
    }
}

impl Section for MultiColumnSection {
    fn height(&self) -> i32 {
        if self.sections.is_empty() {
            return 0;
        }
        self.plan
            .column_bottoms(&self.heights, self.padding, 0)
            .into_iter()
            .max()
            .unwrap_or(0)
    }

    fn columns(&self) -> usize {
        self.plan.columns
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        if self.sections.is_empty() {
            return y;
        }
        let mut cursors = vec![y - self.padding; self.plan.columns];
        for (index, section) in self.sections.iter().enumerate() {
            let span = self.plan.span(index);
            let top = cursors[span.clone()].iter().copied().max().unwrap_or(y) + self.padding;
            let bottom = section.draw(canvas, x + self.pitch * span.start as i32, top);
            for cursor in &mut cursors[span] {
                *cursor = bottom;
            }
        }
        cursors.into_iter().max().unwrap_or(y)
    }
}
