//! Report assembly: derives the board data for one mode, builds the section list and lays
//! the whole report out onto a recorded canvas.

use crate::aggregate::{
    HourlyHistogram, VerdictSummary, classify_by_verdict, count_users_submitted, get_first_ac,
    get_most_popular_problem, hourly_submissions_in, rank_by_verdict,
};
use crate::canvas::{Canvas, Document};
use crate::font::{FontRole, TextMeasurer};
use crate::layout::{LayoutMetrics, MultiColumnSection};
use crate::packer::{
    DisplayRankRecord, has_parallel_top, pack_rank_data, pack_verdict_rank_data, slice_ranking_data,
};
use crate::palette::{ChosenPalette, choose_palette, choose_tip};
use crate::ranking::ReportMode;
use crate::section::{
    BoxedSection, CopyrightSection, FooterInfo, HourlyDistributionSection, RankSection, Section,
    SectionBundle, SimpleTextSection, SubmitDetailSection, SubmitStats, TitleSection,
};
use crate::text::{StyledText, TextStyle};
use crate::types::{GradientDirection, Loc, Rgba};
use board_snapshot::{RankingEntry, Submission, Verdict};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use tracing::debug;

pub const GENERATOR_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));
const WATERMARK: &str = "©2023-2025 P.B.G. Dev Team.";
const FRAME: i32 = 32;
const PANEL_RADIUS: f32 = 96.0;
const PANEL_MASK: Rgba = Rgba::rgba(255, 255, 255, 178);

/// Everything the report shows about one verdict over one list of submissions.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardData {
    /// Leader of the verdict bucket.
    pub play_of_the_day: Option<String>,
    /// When the leader first hit the verdict; used to break a shared lead.
    pub leader_earliest_at: Option<i64>,
    pub top_five: Vec<DisplayRankRecord>,
    pub full_board: Vec<DisplayRankRecord>,
    pub total_submits: usize,
    pub first_ac: Submission,
    pub summary: VerdictSummary,
    pub hourly: HourlyHistogram,
    pub popular_problem: Option<(String, usize)>,
    pub users_submitted: usize,
}

impl BoardData {
    pub fn collect(submissions: &[Submission], verdict: Verdict) -> Self {
        Self::collect_in(submissions, verdict, &Local)
    }

    /// With no submission of `verdict` the board is empty, but still renderable.
    pub fn collect_in<Tz: TimeZone>(submissions: &[Submission], verdict: Verdict, tz: &Tz) -> Self {
        let ranked = rank_by_verdict(submissions);
        let Some(bucket) = ranked.get(&verdict).filter(|bucket| !bucket.is_empty()) else {
            return Self {
                play_of_the_day: None,
                leader_earliest_at: None,
                top_five: Vec::new(),
                full_board: Vec::new(),
                total_submits: 0,
                first_ac: get_first_ac(submissions),
                summary: VerdictSummary::default(),
                hourly: Default::default(),
                popular_problem: None,
                users_submitted: 0,
            };
        };

        let full_board = pack_verdict_rank_data(bucket);
        Self {
            play_of_the_day: bucket.first().map(|leader| leader.user_name.clone()),
            leader_earliest_at: bucket.first().map(|leader| leader.earliest_at),
            top_five: slice_ranking_data(&full_board, 5, true),
            full_board,
            total_submits: submissions.len(),
            first_ac: get_first_ac(submissions),
            summary: classify_by_verdict(submissions),
            hourly: hourly_submissions_in(submissions, tz),
            popular_problem: get_most_popular_problem(submissions),
            users_submitted: count_users_submitted(submissions),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_board.is_empty()
    }
}

/// Board-level settings shared by every report of one board.
pub struct ReportContext<'a> {
    pub measurer: &'a dyn TextMeasurer,
    pub metrics: &'a LayoutMetrics,
    pub board_name: &'a str,
    pub logo: Option<&'a str>,
    pub tips: &'a [String],
    pub show_unrated: bool,
    pub separate_columns: bool,
    pub generated_at: NaiveDateTime,
}

/// One report's data. `date` is the day the data describes; `submissions` are that day's.
pub struct ReportInput<'a> {
    pub mode: ReportMode,
    pub date: NaiveDate,
    pub submissions: &'a [Submission],
    pub rankings: &'a [RankingEntry],
}

/// The three stacked blocks of a report plus the chrome chosen for it.
pub struct ComposedReport {
    pub title: TitleSection,
    pub body: MultiColumnSection,
    pub footer: CopyrightSection,
    pub palette: ChosenPalette,
}

fn clock(at: i64) -> String {
    Local
        .timestamp_opt(at, 0)
        .earliest()
        .map(|when| when.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

fn has_verdict(submissions: &[Submission], verdict: Verdict) -> bool {
    submissions.iter().any(|s| s.verdict == verdict)
}

struct Assembler<'c, 'a> {
    ctx: &'c ReportContext<'a>,
}

impl Assembler<'_, '_> {
    fn simple(&self, header: &str, title: &str, hint: Option<&str>) -> BoxedSection {
        Box::new(SimpleTextSection::new(self.ctx.measurer, header, title, hint))
    }

    fn rank(
        &self,
        header: &str,
        title: &str,
        records: &[DisplayRankRecord],
        hint: Option<&str>,
        top_count: Option<usize>,
    ) -> BoxedSection {
        Box::new(RankSection::new(
            self.ctx.measurer,
            self.ctx.metrics,
            header,
            title,
            records,
            hint,
            top_count,
            self.ctx.separate_columns,
        ))
    }

    fn ranking(&self, rankings: &[RankingEntry], limit: usize) -> Vec<DisplayRankRecord> {
        slice_ranking_data(&pack_rank_data(rankings), limit, self.ctx.show_unrated)
    }

    fn stats_bundle(&self, board: &BoardData) -> BoxedSection {
        let stats = SubmitStats {
            total_submits: board.total_submits,
            prop_title: "Acceptance rate".to_string(),
            prop: board.summary.ac_rate,
            avg_score: Some(board.summary.avg_score),
            breakdown: Some((board.users_submitted, &board.summary)),
        };
        Box::new(SectionBundle::new(
            vec![
                Box::new(SubmitDetailSection::new(self.ctx.measurer, &stats)),
                Box::new(HourlyDistributionSection::new(
                    self.ctx.measurer,
                    self.ctx.metrics,
                    &board.hourly,
                )),
            ],
            self.ctx.metrics.section_padding,
        ))
    }

    fn first_ac(&self, board: &BoardData, header: &str) -> BoxedSection {
        let first = &board.first_ac;
        let hint = format!("Submitted {} at {} and passed.", first.problem_name, clock(first.at));
        self.simple(header, &first.user.name, Some(&hint))
    }

    fn full(&self, board: &BoardData, submissions: &[Submission], rankings: &[RankingEntry]) -> Vec<BoxedSection> {
        let ranking = self.ranking(rankings, 10);
        let has_ac = has_verdict(submissions, Verdict::Accepted);

        let mut sections = Vec::new();
        if !has_ac {
            sections.push(self.simple("No accepted submissions yesterday", "Nothing recorded", None));
        } else {
            let parallel = has_parallel_top(&board.full_board)
                .then(|| board.leader_earliest_at.map(|at| format!("Got there first at {}", clock(at))))
                .flatten();
            sections.push(self.simple(
                "Yesterday's grind king",
                board.play_of_the_day.as_deref().unwrap_or_default(),
                parallel.as_deref(),
            ));
            sections.push(self.rank(
                "Solved count board",
                "Yesterday's solves",
                &board.top_five,
                None,
                Some(5),
            ));
            sections.push(self.stats_bundle(board));
            sections.push(self.first_ac(board, "Yesterday's fastest accept"));
            if let Some((problem, users)) = &board.popular_problem {
                let hint = format!("{users} users submitted this problem");
                sections.push(self.simple("Yesterday's most popular problem", problem, Some(&hint)));
            }
        }

        sections.push(if ranking.is_empty() {
            self.simple("Ranking is empty", "No ranking yet", None)
        } else {
            self.rank("Training board", "Solved ranking", &ranking, None, Some(10))
        });
        if has_ac {
            sections.push(self.rank("Full board", "Yesterday's full board", &board.full_board, None, None));
        }
        sections
    }

    fn now(&self, board: &BoardData, submissions: &[Submission], rankings: &[RankingEntry]) -> Vec<BoxedSection> {
        let ranking = self.ranking(rankings, 5);
        let mut sections = Vec::new();
        if !has_verdict(submissions, Verdict::Accepted) {
            sections.push(self.simple(
                "Nothing recorded",
                &format!("No {} submissions today", Verdict::Accepted.short_label()),
                None,
            ));
        } else {
            sections.push(self.rank("Solved count board", "Today's solves", &board.full_board, None, None));
            sections.push(self.stats_bundle(board));
            sections.push(self.first_ac(board, "Today's fastest accept"));
        }

        sections.push(if ranking.is_empty() {
            self.simple("No ranking yet", "Ranking is empty", None)
        } else {
            self.rank(
                "Training board",
                "Solved ranking",
                &ranking,
                Some("Theoretical count when past accepted problems are solved again"),
                Some(5),
            )
        });
        sections
    }

    fn verdict(&self, board: &BoardData, submissions: &[Submission], verdict: Verdict) -> Vec<BoxedSection> {
        let matching: Vec<Submission> = submissions
            .iter()
            .filter(|s| s.verdict == verdict)
            .cloned()
            .collect();
        let leaderboard = rank_by_verdict(&matching)
            .get(&verdict)
            .map(|bucket| slice_ranking_data(&pack_verdict_rank_data(bucket), 10, true))
            .unwrap_or_default();
        if leaderboard.is_empty() {
            return vec![self.simple("No ranking yet", "Ranking is empty", None)];
        }

        let share = if board.total_submits == 0 {
            0.0
        } else {
            board.full_board.iter().map(|r| r.value).sum::<u64>() as f64 / board.total_submits as f64
        };
        let stats = SubmitStats {
            total_submits: board.total_submits,
            prop_title: format!("{} share", verdict),
            prop: share,
            avg_score: None,
            breakdown: None,
        };
        vec![
            Box::new(SubmitDetailSection::new(self.ctx.measurer, &stats)),
            self.rank(
                "Per-verdict board",
                &format!("{} leaderboard", verdict.short_label()),
                &leaderboard,
                None,
                Some(10),
            ),
        ]
    }
}

/// Builds the sections for one report. Nothing is drawn yet.
pub fn compose_report(ctx: &ReportContext<'_>, input: &ReportInput<'_>) -> ComposedReport {
    let verdict = input.mode.verdict();
    let board = BoardData::collect(input.submissions, verdict);
    let assembler = Assembler { ctx };
    let sections = match input.mode {
        ReportMode::Full => assembler.full(&board, input.submissions, input.rankings),
        ReportMode::Now(Verdict::Accepted) => assembler.now(&board, input.submissions, input.rankings),
        ReportMode::Now(other) => assembler.verdict(&board, input.submissions, other),
    };
    debug!(mode = ?input.mode, sections = sections.len(), "assembled report sections");

    let seed = format!("{}{}", ctx.board_name, input.date.format("%Y-%m-%d"));
    let palette = choose_palette(&seed);
    let title = match input.mode {
        ReportMode::Full => "Yesterday's Grind Leaderboard".to_string(),
        ReportMode::Now(Verdict::Accepted) => "Today's Submission Board".to_string(),
        ReportMode::Now(other) => format!("Today's {} Board", other.short_label()),
    };
    let subtitle = format!("{}  {} Rank List", input.date.format("%Y.%m.%d"), ctx.board_name);
    let generated_at = ctx.generated_at.format("%Y/%m/%d %H:%M:%S").to_string();

    ComposedReport {
        title: TitleSection::new(
            ctx.measurer,
            ctx.logo.map(str::to_string),
            palette.accent(),
            &title,
            &subtitle,
        ),
        body: MultiColumnSection::new(sections, ctx.metrics),
        footer: CopyrightSection::new(
            ctx.measurer,
            ctx.metrics,
            &FooterInfo {
                tip: choose_tip(ctx.tips, &seed),
                board_name: ctx.board_name,
                palette_name: palette.name,
                generated_at: &generated_at,
                version: GENERATOR_VERSION,
            },
        ),
        palette,
    }
}

/// Panel size in pixels, before the outer frame.
pub fn panel_size(metrics: &LayoutMetrics, blocks: &[&dyn Section]) -> (i32, i32) {
    let columns = blocks.iter().map(|b| b.columns()).max().unwrap_or(1);
    let gaps = metrics.section_padding * (blocks.len() as i32 - 1).max(0);
    let height = blocks.iter().map(|b| b.height()).sum::<i32>()
        + gaps
        + metrics.top_padding
        + metrics.bottom_padding;
    (metrics.panel_width(columns), height)
}

/// Records the full report: black frame, gradient panel under a white mask, the three
/// blocks stacked with section padding, and the watermark in the bottom-right corner.
pub fn layout_document(
    report: &ComposedReport,
    metrics: &LayoutMetrics,
    measurer: &dyn TextMeasurer,
) -> Document {
    let blocks: [&dyn Section; 3] = [&report.title, &report.body, &report.footer];
    let (width, height) = panel_size(metrics, &blocks);
    let canvas_width = (width + FRAME * 2).max(1) as u32;
    let canvas_height = (height + FRAME * 2).max(1) as u32;
    let mut canvas = Canvas::new(canvas_width, canvas_height, Rgba::BLACK);

    let panel = Loc::from_i32(FRAME, FRAME, width, height);
    canvas.draw_gradient_rect(panel, report.palette.gradient(GradientDirection::Diagonal), PANEL_RADIUS);
    canvas.draw_round_rect(panel, PANEL_MASK, PANEL_RADIUS);

    let mut y = metrics.top_padding - metrics.section_padding;
    for block in blocks {
        y += metrics.section_padding;
        y = block.draw(&mut canvas, metrics.side_padding, y);
    }

    let watermark = StyledText::new(
        WATERMARK,
        TextStyle::new(FontRole::Heavy, 16.0).color(Rgba::ink(72)),
        measurer,
    );
    watermark.draw(
        &mut canvas,
        width + FRAME * 2 - metrics.side_padding - watermark.width(),
        height + FRAME * 2 - metrics.bottom_padding - watermark.height() - FRAME,
    );
    debug!(width = canvas_width, height = canvas_height, columns = report.body.columns(), "laid out report");
    canvas.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::sub;
    use crate::canvas::Command;
    use crate::font::MonospaceMeasurer;
    use chrono::Utc;

    fn context<'a>(
        measurer: &'a MonospaceMeasurer,
        metrics: &'a LayoutMetrics,
        tips: &'a [String],
    ) -> ReportContext<'a> {
        ReportContext {
            measurer,
            metrics,
            board_name: "Peeper",
            logo: Some("logo.png"),
            tips,
            show_unrated: true,
            separate_columns: false,
            generated_at: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn busy_day() -> Vec<Submission> {
        vec![
            sub("1", Verdict::Accepted, "P1", 1000),
            sub("2", Verdict::Accepted, "P1", 1200),
            sub("2", Verdict::WrongAnswer, "P2", 1300),
            sub("3", Verdict::WrongAnswer, "P2", 1400),
            sub("3", Verdict::WrongAnswer, "P2", 1500),
            sub("1", Verdict::TimeLimitExceeded, "P3", 1600),
        ]
    }

    fn rankings() -> Vec<RankingEntry> {
        vec![
            RankingEntry::new("user1", "1", 12),
            RankingEntry::new("user2", "2", 9),
            RankingEntry::new("user3", "3", 9).unrated(true),
        ]
    }

    #[test]
    fn board_data_follows_the_verdict_bucket() {
        let board = BoardData::collect_in(&busy_day(), Verdict::Accepted, &Utc);
        assert_eq!(board.play_of_the_day.as_deref(), Some("user1"));
        assert_eq!(board.leader_earliest_at, Some(1000));
        assert_eq!(board.full_board.len(), 2);
        assert!(has_parallel_top(&board.full_board));
        assert_eq!(board.total_submits, 6);
        assert_eq!(board.users_submitted, 3);
        assert_eq!(board.first_ac.user.uid, "1");
        assert_eq!(board.popular_problem, Some(("Problem P1".to_string(), 2)));
        assert_eq!(board.hourly[0].total, 6);

        let wrong = BoardData::collect_in(&busy_day(), Verdict::WrongAnswer, &Utc);
        assert_eq!(wrong.play_of_the_day.as_deref(), Some("user3"));
        assert_eq!(wrong.full_board[0].value, 2);
    }

    #[test]
    fn empty_bucket_yields_an_empty_board() {
        let board = BoardData::collect_in(&busy_day(), Verdict::CompileError, &Utc);
        assert!(board.is_empty());
        assert_eq!(board.total_submits, 0);
        assert!(BoardData::collect_in(&[], Verdict::Accepted, &Utc).first_ac.is_no_accepted_sentinel());
    }

    #[test]
    fn full_report_without_accepts_keeps_ranking_block() {
        let m = MonospaceMeasurer::default();
        let metrics = LayoutMetrics::default();
        let ctx = context(&m, &metrics, &[]);
        let quiet = vec![sub("1", Verdict::WrongAnswer, "P1", 10)];
        let ranks = rankings();
        let report = compose_report(
            &ctx,
            &ReportInput { mode: ReportMode::Full, date: day(), submissions: &quiet, rankings: &ranks },
        );
        assert_eq!(report.body.plan().assignments.len(), 2);

        let busy = busy_day();
        let report = compose_report(
            &ctx,
            &ReportInput { mode: ReportMode::Full, date: day(), submissions: &busy, rankings: &ranks },
        );
        // play, top five, stats bundle, first accept, popular problem, ranking, full board.
        assert_eq!(report.body.plan().assignments.len(), 7);
    }

    #[test]
    fn now_and_verdict_modes_pick_their_own_blocks() {
        let m = MonospaceMeasurer::default();
        let metrics = LayoutMetrics::default();
        let ctx = context(&m, &metrics, &[]);
        let busy = busy_day();
        let ranks = rankings();

        let now = compose_report(
            &ctx,
            &ReportInput {
                mode: ReportMode::Now(Verdict::Accepted),
                date: day(),
                submissions: &busy,
                rankings: &ranks,
            },
        );
        assert_eq!(now.body.plan().assignments.len(), 4);

        let wrong = compose_report(
            &ctx,
            &ReportInput {
                mode: ReportMode::Now(Verdict::WrongAnswer),
                date: day(),
                submissions: &busy,
                rankings: &ranks,
            },
        );
        assert_eq!(wrong.body.plan().assignments.len(), 2);

        let compile = compose_report(
            &ctx,
            &ReportInput {
                mode: ReportMode::Now(Verdict::CompileError),
                date: day(),
                submissions: &busy,
                rankings: &[],
            },
        );
        assert_eq!(compile.body.plan().assignments.len(), 1);
    }

    #[test]
    fn document_size_matches_measured_blocks() {
        let m = MonospaceMeasurer::default();
        let metrics = LayoutMetrics::default();
        let tips = vec!["Sleep is also training.".to_string()];
        let ctx = context(&m, &metrics, &tips);
        let busy = busy_day();
        let ranks = rankings();
        let report = compose_report(
            &ctx,
            &ReportInput { mode: ReportMode::Full, date: day(), submissions: &busy, rankings: &ranks },
        );
        let blocks: [&dyn Section; 3] = [&report.title, &report.body, &report.footer];
        let (width, height) = panel_size(&metrics, &blocks);
        assert_eq!(width, 1248);

        let doc = layout_document(&report, &metrics, &m);
        assert_eq!(doc.width, (width + 64) as u32);
        assert_eq!(doc.height, (height + 64) as u32);
        assert_eq!(doc.background, Rgba::BLACK);
        assert!(matches!(doc.commands[0], Command::DrawGradientRect { radius, .. } if radius == 96.0));
        assert!(doc.commands.iter().any(|cmd| matches!(
            cmd,
            Command::DrawString { text, .. } if text == WATERMARK
        )));
        assert!(doc.commands.iter().any(|cmd| matches!(cmd, Command::DrawImage { .. })));
    }

    #[test]
    fn same_board_and_day_reuse_the_palette() {
        let m = MonospaceMeasurer::default();
        let metrics = LayoutMetrics::default();
        let ctx = context(&m, &metrics, &[]);
        let input = ReportInput { mode: ReportMode::Full, date: day(), submissions: &[], rankings: &[] };
        let a = compose_report(&ctx, &input);
        let b = compose_report(&ctx, &input);
        assert_eq!(a.palette, b.palette);
    }
}
