//! The report's building blocks. Every section measures all of its text when it is built,
//! so `height` is a plain computation and `draw` only records canvas commands.

use crate::aggregate::{HourlyHistogram, VerdictSummary};
use crate::canvas::Canvas;
use crate::font::{FontRole, TextMeasurer};
use crate::layout::LayoutMetrics;
use crate::packer::DisplayRankRecord;
use crate::text::{StyledText, TextStyle, ellipsize, stacked_height};
use crate::types::{Gradient, GradientDirection, Loc, Rgba};
use board_snapshot::Verdict;

pub const TITLE_LIMIT: usize = 25;

const MUTED: Rgba = Rgba::ink(136);
const FOOTER: Rgba = Rgba::ink(208);

pub trait Section: Send + Sync {
    fn height(&self) -> i32;

    /// How many layout columns the section spans.
    fn columns(&self) -> usize {
        1
    }

    /// Draws with the top-left corner at `(x, y)` and returns `y + self.height()`.
    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32;
}

pub type BoxedSection = Box<dyn Section>;

fn text(measurer: &dyn TextMeasurer, content: &str, style: TextStyle) -> StyledText {
    StyledText::new(content, style, measurer)
}

pub struct TitleSection {
    logo: Option<String>,
    tint: Rgba,
    title: StyledText,
    subtitle: StyledText,
}

impl TitleSection {
    pub fn new(
        measurer: &dyn TextMeasurer,
        logo: Option<String>,
        accent: Rgba,
        title: &str,
        subtitle: &str,
    ) -> Self {
        let dark = accent.darken(0.3).with_alpha(255);
        Self {
            logo,
            tint: dark,
            title: text(
                measurer,
                title,
                TextStyle::new(FontRole::Heavy, 96.0).color(dark).padding_bottom(12),
            ),
            subtitle: text(
                measurer,
                subtitle,
                TextStyle::new(FontRole::Heavy, 36.0).color(dark.with_alpha(136)),
            ),
        }
    }
}

impl Section for TitleSection {
    fn height(&self) -> i32 {
        stacked_height([Some(&self.title), Some(&self.subtitle)])
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        if let Some(logo) = &self.logo {
            canvas.draw_image(Loc::from_i32(x - 20, y - 8, 140, 140), logo.clone(), Some(self.tint));
        }
        let y = self.title.draw(canvas, x + 132, y);
        self.subtitle.draw(canvas, x, y)
    }
}

/// Header, one large line and an optional muted hint.
pub struct SimpleTextSection {
    header: StyledText,
    title: StyledText,
    hint: Option<StyledText>,
}

impl SimpleTextSection {
    pub fn new(measurer: &dyn TextMeasurer, header: &str, title: &str, hint: Option<&str>) -> Self {
        Self {
            header: text(measurer, header, TextStyle::new(FontRole::Bold, 36.0).padding_bottom(16)),
            title: text(
                measurer,
                &ellipsize(title, TITLE_LIMIT),
                TextStyle::new(FontRole::Heavy, 72.0).padding_bottom(if hint.is_some() { 16 } else { 0 }),
            ),
            hint: hint.map(|hint| {
                text(measurer, hint, TextStyle::new(FontRole::Medium, 28.0).color(MUTED))
            }),
        }
    }
}

impl Section for SimpleTextSection {
    fn height(&self) -> i32 {
        stacked_height([Some(&self.header), Some(&self.title), self.hint.as_ref()])
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        let y = self.header.draw(canvas, x, y);
        let y = self.title.draw(canvas, x, y);
        match &self.hint {
            Some(hint) => hint.draw(canvas, x, y),
            None => y,
        }
    }
}

struct RankTile {
    rank: StyledText,
    name: StyledText,
    value: StyledText,
    width: f32,
    gradient: Gradient,
}

// Gap above each value line, and the bottom padding the last row gives back.
const ROW_OFFSET: i32 = 40;
const ROW_PADDING: i32 = 32;

fn tile_gradient(record: &DisplayRankRecord) -> Gradient {
    let alphas = if record.unrated {
        [12, 15, 18]
    } else if record.shares_rank {
        [10, 18, 32]
    } else {
        [18, 28, 32]
    };
    Gradient::even(&alphas.map(Rgba::ink), GradientDirection::Horizontal)
}

pub struct RankSection {
    header: StyledText,
    title: StyledText,
    hint: Option<StyledText>,
    tops: Option<StyledText>,
    tiles: Vec<RankTile>,
    max_columns: usize,
    per_column: usize,
    column_pitch: i32,
}

impl RankSection {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        measurer: &dyn TextMeasurer,
        metrics: &LayoutMetrics,
        header: &str,
        title: &str,
        records: &[DisplayRankRecord],
        hint: Option<&str>,
        top_count: Option<usize>,
        separate_columns: bool,
    ) -> Self {
        let has_hint = hint.is_some();
        let tiles = records
            .iter()
            .map(|record| {
                let alpha = if record.unrated { 100 } else { 255 };
                let rank_alpha = if record.unrated {
                    100
                } else if record.shares_rank {
                    0
                } else {
                    255
                };
                RankTile {
                    rank: text(
                        measurer,
                        &record.rank_label,
                        TextStyle::new(FontRole::Heavy, 64.0).color(Rgba::ink(rank_alpha)),
                    ),
                    name: text(
                        measurer,
                        &record.user_label,
                        TextStyle::new(FontRole::Bold, 36.0).color(Rgba::ink(alpha)),
                    ),
                    value: text(
                        measurer,
                        &record.value_label,
                        TextStyle::new(FontRole::Heavy, 36.0)
                            .color(Rgba::ink(alpha))
                            .padding_bottom(ROW_PADDING),
                    ),
                    width: metrics.rank_tile_base_width
                        + metrics.rank_tile_stretch_width * record.progress as f32,
                    gradient: tile_gradient(record),
                }
            })
            .collect();

        Self {
            header: text(measurer, header, TextStyle::new(FontRole::Bold, 36.0).padding_bottom(16)),
            title: text(
                measurer,
                title,
                TextStyle::new(FontRole::Heavy, 72.0).padding_bottom(if has_hint { 32 } else { 16 }),
            ),
            hint: hint.map(|hint| {
                text(
                    measurer,
                    hint,
                    TextStyle::new(FontRole::Medium, 28.0).color(MUTED).padding_bottom(16),
                )
            }),
            tops: top_count.map(|count| {
                text(
                    measurer,
                    &format!("Top {count}th"),
                    TextStyle::new(FontRole::Heavy, 48.0).padding_bottom(if has_hint { 24 } else { 16 }),
                )
            }),
            tiles,
            max_columns: if separate_columns { metrics.max_rank_columns.max(1) } else { 1 },
            per_column: metrics.rank_entries_per_column.max(1),
            column_pitch: metrics.content_width + metrics.column_padding,
        }
    }

    /// The "Top N" badge sits beside the title, so its line is pulled back up.
    fn tops_pullback(&self) -> i32 {
        if self.hint.is_some() { 102 } else { 86 }
    }

    fn chunk_len(&self) -> usize {
        self.tiles.len().div_ceil(self.columns()).max(1)
    }

    fn header_height(&self) -> i32 {
        let mut height = stacked_height([
            Some(&self.header),
            Some(&self.title),
            self.tops.as_ref(),
            self.hint.as_ref(),
        ]);
        if self.tops.is_some() {
            height -= self.tops_pullback();
        }
        height
    }
}

impl Section for RankSection {
    fn height(&self) -> i32 {
        let rows = self
            .tiles
            .chunks(self.chunk_len())
            .map(|column| {
                column.iter().map(|tile| tile.value.height()).sum::<i32>()
                    + ROW_OFFSET * column.len() as i32
                    - ROW_PADDING
            })
            .max()
            .unwrap_or(0);
        self.header_height() + rows
    }

    fn columns(&self) -> usize {
        self.max_columns
            .min(1 + self.tiles.len() / self.per_column)
            .max(1)
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        let mut y = self.header.draw(canvas, x, y);
        y = self.title.draw(canvas, x, y);
        if let Some(tops) = &self.tops {
            y -= self.tops_pullback();
            y = tops.draw(canvas, x + self.title.width() + 28, y);
        }
        if let Some(hint) = &self.hint {
            y = hint.draw(canvas, x, y);
        }
        if self.tiles.is_empty() {
            return y;
        }

        let chunk = self.chunk_len();
        let (top, mut column_x, mut row_y, mut bottom) = (y, x, y, y);
        for (i, tile) in self.tiles.iter().enumerate() {
            canvas.draw_gradient_rect(
                Loc::new(column_x as f32, (row_y + 38) as f32, tile.width, 52.0),
                tile.gradient.clone(),
                26.0,
            );
            let rank_x = column_x + 32;
            tile.rank.draw(canvas, rank_x, row_y + 8);
            let name_x = rank_x + tile.rank.width() + 28;
            tile.name.draw(canvas, name_x, row_y + ROW_OFFSET);
            let value_x = (tile.width.ceil() as i32 + column_x).max(name_x + tile.name.width()) + 36;
            row_y = tile.value.draw(canvas, value_x, row_y + ROW_OFFSET);

            bottom = bottom.max(row_y);
            if (i + 1) % chunk == 0 {
                column_x += self.column_pitch;
                row_y = top;
            }
        }
        bottom - ROW_PADDING
    }
}

/// The numbers shown by [`SubmitDetailSection`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitStats<'a> {
    pub total_submits: usize,
    pub prop_title: String,
    /// Fraction in `[0, 1]`, rendered as a percentage.
    pub prop: f64,
    pub avg_score: Option<f64>,
    /// Distinct submitters and the per-verdict counts behind the detail line.
    pub breakdown: Option<(usize, &'a VerdictSummary)>,
}

/// Integer part and a `.dd` suffix, rendered in two weights.
fn split_fraction(value: f64) -> (String, String) {
    let formatted = format!("{value:.2}");
    match formatted.split_once('.') {
        Some((whole, fraction)) => (whole.to_string(), format!(".{fraction}")),
        None => (formatted, ".00".to_string()),
    }
}

/// "3AC, 2WA" in alias-table order, skipping verdicts without submissions.
pub fn verdict_breakdown(summary: &VerdictSummary) -> String {
    Verdict::ALIASED
        .iter()
        .filter_map(|verdict| {
            let count = summary.count(*verdict);
            let alias = verdict.alias()?;
            (count > 0).then(|| format!("{count}{alias}"))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

struct SplitValue {
    header: StyledText,
    whole: StyledText,
    fraction: StyledText,
}

impl SplitValue {
    fn new(measurer: &dyn TextMeasurer, header: &str, value: f64) -> Self {
        let (whole, fraction) = split_fraction(value);
        Self {
            header: text(measurer, header, TextStyle::new(FontRole::Bold, 36.0).padding_bottom(16)),
            whole: text(measurer, &whole, TextStyle::new(FontRole::Heavy, 72.0)),
            fraction: text(
                measurer,
                &fraction,
                TextStyle::new(FontRole::Heavy, 72.0).color(Rgba::ink(64)),
            ),
        }
    }

    fn width(&self) -> i32 {
        self.header.width().max(self.whole.width() + self.fraction.width())
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) {
        let y = self.header.draw(canvas, x, y);
        self.whole.draw(canvas, x, y);
        self.fraction.draw(canvas, x + self.whole.width(), y);
    }
}

const KPI_GAP: i32 = 132;
const DETAIL_GAP: i32 = 16;

pub struct SubmitDetailSection {
    total_header: StyledText,
    total_value: StyledText,
    average: Option<SplitValue>,
    prop: SplitValue,
    detail: Option<StyledText>,
}

impl SubmitDetailSection {
    pub fn new(measurer: &dyn TextMeasurer, stats: &SubmitStats<'_>) -> Self {
        Self {
            total_header: text(
                measurer,
                "Total submissions",
                TextStyle::new(FontRole::Bold, 36.0).padding_bottom(16),
            ),
            total_value: text(
                measurer,
                &stats.total_submits.to_string(),
                TextStyle::new(FontRole::Heavy, 72.0),
            ),
            average: stats
                .avg_score
                .map(|avg| SplitValue::new(measurer, "Average score", avg)),
            prop: SplitValue::new(measurer, &stats.prop_title, stats.prop * 100.0),
            detail: stats.breakdown.map(|(users, summary)| {
                text(
                    measurer,
                    &format!(
                        "Received submissions from {users} users, including {}",
                        verdict_breakdown(summary)
                    ),
                    TextStyle::new(FontRole::Medium, 28.0).color(MUTED),
                )
            }),
        }
    }
}

impl Section for SubmitDetailSection {
    fn height(&self) -> i32 {
        let numbers = stacked_height([Some(&self.total_header), Some(&self.total_value)]);
        match &self.detail {
            Some(detail) => numbers + DETAIL_GAP + detail.height(),
            None => numbers,
        }
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        let value_y = self.total_header.draw(canvas, x, y);
        self.total_value.draw(canvas, x, value_y);
        let mut column_x = x + self.total_header.width().max(self.total_value.width()) + KPI_GAP;
        if let Some(average) = &self.average {
            average.draw(canvas, column_x, y);
            column_x += average.width() + KPI_GAP;
        }
        self.prop.draw(canvas, column_x, y);

        if let Some(detail) = &self.detail {
            let detail_y = value_y + self.total_value.height() + DETAIL_GAP;
            detail.draw(canvas, x, detail_y);
        }
        y + self.height()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBar {
    /// Bucket size relative to the busiest bucket.
    pub hot: f64,
    pub ac_rate: f64,
}

/// Bar chart with bracket corners, one bar per bucket and a thinner accepted bar inside.
pub struct HistogramSection {
    bars: Vec<HistogramBar>,
    base: f32,
    stretch: f32,
}

const OUTLINE: Rgba = Rgba::ink(32);
const BAR: Rgba = Rgba::ink(26);
const SUB_BAR: Rgba = Rgba::ink(22);
const BAR_WIDTH: i32 = 22;
const BAR_PITCH: i32 = 36;

impl HistogramSection {
    pub fn new(metrics: &LayoutMetrics, bars: Vec<HistogramBar>) -> Self {
        Self {
            bars,
            base: metrics.histogram_tile_base_height as f32,
            stretch: metrics.histogram_tile_stretch_height as f32,
        }
    }

    fn full_height(&self) -> i32 {
        (self.base + self.stretch).ceil() as i32
    }

    fn bracket(canvas: &mut Canvas, x: i32, y: i32, full: i32, right: bool) {
        let stem_x = if right { x + 20 } else { x };
        for (rect_x, rect_y, w, h) in [
            (x, y, 24, 4),
            (stem_x, y + 4, 4, 20),
            (x, y + full + 40, 24, 4),
            (stem_x, y + full + 20, 4, 20),
        ] {
            canvas.draw_rect(Loc::from_i32(rect_x, rect_y, w, h), OUTLINE);
        }
    }
}

impl Section for HistogramSection {
    fn height(&self) -> i32 {
        self.full_height() + 24 + 16
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        let full = self.full_height();
        let top = y + 8;
        Self::bracket(canvas, x, top, full, false);

        let floor = (top + 24 + full) as f32;
        let mut bar_x = x + 26 - BAR_PITCH;
        for bar in &self.bars {
            bar_x += BAR_PITCH;
            let height = self.base + self.stretch * bar.hot as f32;
            let sub_height = self.base + self.stretch * (bar.hot * bar.ac_rate) as f32;
            canvas.draw_round_rect(
                Loc::new(bar_x as f32, floor - height, BAR_WIDTH as f32, height),
                BAR,
                BAR_WIDTH as f32,
            );
            canvas.draw_round_rect(
                Loc::new(bar_x as f32, floor - sub_height, BAR_WIDTH as f32, sub_height),
                SUB_BAR,
                BAR_WIDTH as f32,
            );
        }

        Self::bracket(canvas, bar_x + 24, top, full, true);
        y + self.height()
    }
}

/// Peak bucket summary: the last hour with the maximal count, and the best AC rate among
/// the maximal hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakHour {
    pub hour: usize,
    pub count: usize,
    pub ac_rate: f64,
}

pub fn peak_hour(histogram: &HourlyHistogram) -> Option<PeakHour> {
    let max = histogram.iter().map(|bucket| bucket.total).max().unwrap_or(0);
    if max == 0 {
        return None;
    }
    let mut peak = PeakHour { hour: 0, count: max, ac_rate: 0.0 };
    for (hour, bucket) in histogram.iter().enumerate() {
        if bucket.total == max {
            peak.hour = hour;
            peak.ac_rate = peak.ac_rate.max(bucket.ac_rate);
        }
    }
    Some(peak)
}

pub struct HourlyDistributionSection {
    header: StyledText,
    histogram: HistogramSection,
    hint: Option<StyledText>,
}

const HISTOGRAM_GAP: i32 = 40;

impl HourlyDistributionSection {
    pub fn new(measurer: &dyn TextMeasurer, metrics: &LayoutMetrics, histogram: &HourlyHistogram) -> Self {
        let max = histogram.iter().map(|bucket| bucket.total).max().unwrap_or(0);
        let bars = histogram
            .iter()
            .map(|bucket| HistogramBar {
                hot: if max == 0 { 0.0 } else { bucket.total as f64 / max as f64 },
                ac_rate: bucket.ac_rate,
            })
            .collect();
        let hint = peak_hour(histogram).map(|peak| {
            let line = format!(
                "Peak hour {:02}:00-{:02}:59. Of {} submissions there, {:.2}% were accepted.",
                peak.hour,
                peak.hour,
                peak.count,
                peak.ac_rate * 100.0
            );
            text(measurer, &line, TextStyle::new(FontRole::Medium, 28.0).color(MUTED))
        });
        Self {
            header: text(
                measurer,
                "Submission time distribution",
                TextStyle::new(FontRole::Bold, 36.0).padding_bottom(24),
            ),
            histogram: HistogramSection::new(metrics, bars),
            hint,
        }
    }
}

impl Section for HourlyDistributionSection {
    fn height(&self) -> i32 {
        stacked_height([Some(&self.header), self.hint.as_ref()])
            + self.histogram.height()
            + HISTOGRAM_GAP
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        let y = self.header.draw(canvas, x, y);
        let y = self.histogram.draw(canvas, x, y) + HISTOGRAM_GAP;
        match &self.hint {
            Some(hint) => hint.draw(canvas, x, y),
            None => y,
        }
    }
}

/// Sections stacked in one column span with a fixed gap between them.
pub struct SectionBundle {
    sections: Vec<BoxedSection>,
    padding: i32,
}

impl SectionBundle {
    pub fn new(sections: Vec<BoxedSection>, padding: i32) -> Self {
        Self { sections, padding }
    }
}

impl Section for SectionBundle {
    fn height(&self) -> i32 {
        let gaps = self.padding * (self.sections.len() as i32 - 1).max(0);
        self.sections.iter().map(|s| s.height()).sum::<i32>() + gaps
    }

    fn columns(&self) -> usize {
        self.sections.iter().map(|s| s.columns()).max().unwrap_or(1)
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        let mut current = y;
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                current += self.padding;
            }
            current = section.draw(canvas, x, current);
        }
        current
    }
}

/// Inputs for the footer.
#[derive(Debug, Clone, PartialEq)]
pub struct FooterInfo<'a> {
    pub tip: Option<&'a str>,
    pub board_name: &'a str,
    pub palette_name: &'a str,
    pub generated_at: &'a str,
    pub version: &'a str,
}

pub struct CopyrightSection {
    tips: Option<(StyledText, StyledText)>,
    generator: StyledText,
    version: StyledText,
    info: StyledText,
}

impl CopyrightSection {
    pub fn new(measurer: &dyn TextMeasurer, metrics: &LayoutMetrics, footer: &FooterInfo<'_>) -> Self {
        let tips = footer.tip.map(|tip| {
            let title = text(
                measurer,
                "Tips:",
                TextStyle::new(FontRole::Heavy, 36.0).color(FOOTER).padding_bottom(64),
            );
            let max_width = metrics.content_width - metrics.side_padding - title.width() - 12 - 48;
            let detail = text(
                measurer,
                tip,
                TextStyle::new(FontRole::Medium, 28.0)
                    .color(FOOTER)
                    .line_multiplier(1.32)
                    .max_width(max_width.max(1) as f32)
                    .padding_bottom(64),
            );
            (title, detail)
        });
        let info = format!(
            "Generated at {}.\nFrom {}.\n{}.",
            footer.generated_at, footer.board_name, footer.palette_name
        );
        Self {
            tips,
            generator: text(
                measurer,
                "Peeper Board Generator",
                TextStyle::new(FontRole::Heavy, 36.0).color(FOOTER),
            ),
            version: text(
                measurer,
                footer.version,
                TextStyle::new(FontRole::Bold, 20.0).color(FOOTER).padding_bottom(24),
            ),
            info: text(
                measurer,
                &info,
                TextStyle::new(FontRole::Bold, 20.0).color(MUTED).line_multiplier(1.32),
            ),
        }
    }
}

impl Section for CopyrightSection {
    fn height(&self) -> i32 {
        let tips = self.tips.as_ref().map(|(_, detail)| detail.height() + 8).unwrap_or(0);
        tips + self.generator.height().max(16 + self.version.height()) + self.info.height()
    }

    fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        let mut current = y;
        if let Some((title, detail)) = &self.tips {
            title.draw(canvas, x, current);
            current = detail.draw(canvas, x + title.width() + 12, current + 8);
        }
        self.generator.draw(canvas, x, current);
        self.version
            .draw(canvas, x + self.generator.width() + 12, current + 16);
        current += self.generator.height().max(16 + self.version.height());
        self.info.draw(canvas, x, current);
        y + self.height()
    }
}
