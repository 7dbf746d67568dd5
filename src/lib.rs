mod aggregate;
mod board;
mod cache;
mod canvas;
mod error;
mod font;
mod layout;
mod packer;
mod palette;
mod perf;
mod ranking;
mod raster;
mod section;
mod text;
mod types;

pub use aggregate::{
    HourlyBucket, HourlyHistogram, UserDailySummary, VerdictSummary, VerdictTally,
    classify_by_verdict, count_users_submitted, get_first_ac, get_hourly_submissions,
    get_most_popular_problem, hourly_submissions_in, rank_by_verdict, user_daily_summary,
};
pub use board::{
    BoardData, ComposedReport, GENERATOR_VERSION, ReportContext, ReportInput, compose_report,
    layout_document, panel_size,
};
pub use board_snapshot::{
    DailyReport, RankingEntry, SnapshotError, SnapshotStore, StoredSnapshot, Submission,
    UnknownVerdict, User, Verdict, report_fingerprint_sha256,
};
pub use cache::{DEFAULT_CACHE_TTL, ResourceCache};
pub use canvas::{Canvas, Command, Document};
pub use error::BoardError;
pub use font::{FontPaths, FontRole, FontSet, MonospaceMeasurer, TextMeasurer};
pub use layout::{ColumnPlan, LayoutMetrics, MultiColumnSection, balance_columns};
pub use packer::{
    DisplayRankRecord, NAME_LIMIT, UNRATED_LABEL, has_parallel_top, pack_rank_data,
    pack_verdict_rank_data, slice_ranking_data,
};
pub use palette::{ChosenPalette, PALETTES, Palette, choose_palette, choose_tip};
pub use ranking::{
    ReportMode, UnratedPolicy, calculate_ranking, is_stable_in, resolve_rankings,
    resolve_rankings_in,
};
pub use raster::render_png;
pub use section::{
    BoxedSection, CopyrightSection, FooterInfo, HistogramBar, HistogramSection,
    HourlyDistributionSection, PeakHour, RankSection, Section, SectionBundle, SimpleTextSection,
    SubmitDetailSection, SubmitStats, TITLE_LIMIT, TitleSection, peak_hour, verdict_breakdown,
};
pub use text::{StyledText, TextStyle, ellipsize, stacked_height, wrap_text};
pub use types::{Gradient, GradientDirection, GradientStop, Loc, Rgba};

use chrono::{Local, NaiveDate};
use perf::PerfLogger;
use raster::check_glyph_coverage;
use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const DEFAULT_BOARD_NAME: &str = "Peeper Board";

/// Board configuration as stored on disk (JSON).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoardConfig {
    /// Prefix of the snapshot files in `data_dir`.
    pub id: String,
    pub board_name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_true")]
    pub show_unrated: bool,
    #[serde(default)]
    pub separate_columns: bool,
    pub fonts: FontPaths,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub exclude_uids: Vec<String>,
    #[serde(default)]
    pub layout: Option<LayoutMetrics>,
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_true() -> bool {
    true
}

impl BoardConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoardError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            BoardError::InvalidConfiguration(format!("config {}: {}", path.display(), err))
        })?;
        let config: BoardConfig = serde_json::from_slice(&bytes)?;
        if config.id.trim().is_empty() {
            return Err(BoardError::InvalidConfiguration(
                "config id must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::new(&self.data_dir, &self.id)
    }
}

/// One report to render.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub mode: ReportMode,
    /// The day the report is produced on. Full reports describe the day before.
    pub today: NaiveDate,
    /// The frozen snapshot of the day before `today`.
    pub frozen: Option<StoredSnapshot>,
    /// Submissions judged so far on `today`; unused by full reports.
    pub today_submissions: Vec<Submission>,
}

impl ReportRequest {
    pub fn full(today: NaiveDate, frozen: Option<StoredSnapshot>) -> Self {
        Self {
            mode: ReportMode::Full,
            today,
            frozen,
            today_submissions: Vec::new(),
        }
    }

    pub fn now(
        verdict: Verdict,
        today: NaiveDate,
        frozen: Option<StoredSnapshot>,
        today_submissions: Vec<Submission>,
    ) -> Self {
        Self {
            mode: ReportMode::Now(verdict),
            today,
            frozen,
            today_submissions,
        }
    }

    fn label(&self) -> String {
        match self.mode {
            ReportMode::Full => format!("full-{}", self.today),
            ReportMode::Now(verdict) => format!("now-{}-{}", verdict.short_label(), self.today),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// A configured board: fonts loaded, layout fixed, resources cached. Cheap to share across
/// threads; every render is independent.
pub struct PeeperBoard {
    fonts: FontSet,
    resources: ResourceCache,
    metrics: LayoutMetrics,
    board_name: String,
    logo: Option<String>,
    tips: Vec<String>,
    unrated: UnratedPolicy,
    show_unrated: bool,
    separate_columns: bool,
    shape_text: bool,
    perf: Option<PerfLogger>,
}

impl PeeperBoard {
    pub fn builder() -> PeeperBoardBuilder {
        PeeperBoardBuilder::new()
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    /// Resolves rankings, lays the report out and records it, without rasterizing.
    pub fn compose(&self, request: &ReportRequest) -> Result<Document, BoardError> {
        let label = request.label();
        let snapshot_date = request.today.pred_opt().ok_or_else(|| {
            BoardError::InvalidConfiguration(format!("no day before {}", request.today))
        })?;

        let t_rank = Instant::now();
        let mut rankings = resolve_rankings(
            request.mode,
            snapshot_date,
            request.frozen.as_ref(),
            &request.today_submissions,
        )?;
        self.unrated.apply(&mut rankings);
        self.span("ranking", &label, t_rank);

        let (date, submissions): (NaiveDate, &[Submission]) = match (request.mode, &request.frozen) {
            (ReportMode::Full, Some(frozen)) => (snapshot_date, frozen.report.submissions.as_slice()),
            (ReportMode::Full, None) => return Err(BoardError::MissingSnapshot(snapshot_date)),
            (ReportMode::Now(_), _) => (request.today, request.today_submissions.as_slice()),
        };

        let t_compose = Instant::now();
        let ctx = ReportContext {
            measurer: &self.fonts,
            metrics: &self.metrics,
            board_name: &self.board_name,
            logo: self.logo.as_deref(),
            tips: &self.tips,
            show_unrated: self.show_unrated,
            separate_columns: self.separate_columns,
            generated_at: Local::now().naive_local(),
        };
        let report = compose_report(
            &ctx,
            &ReportInput {
                mode: request.mode,
                date,
                submissions,
                rankings: &rankings,
            },
        );
        self.span("compose", &label, t_compose);

        let t_layout = Instant::now();
        let document = layout_document(&report, &self.metrics, &self.fonts);
        check_glyph_coverage(&document, &self.fonts)?;
        self.span("layout", &label, t_layout);
        debug!(
            report = %label,
            submissions = submissions.len(),
            rankings = rankings.len(),
            palette = report.palette.name,
            "composed report"
        );
        Ok(document)
    }

    pub fn render(&self, request: &ReportRequest) -> Result<RenderedReport, BoardError> {
        let label = request.label();
        let document = self.compose(request)?;

        let t_raster = Instant::now();
        let png = render_png(&document, &self.fonts, &self.resources, self.shape_text)?;
        self.span("raster", &label, t_raster);

        let (hits, loads) = self.resources.stats();
        if let Some(perf) = &self.perf {
            perf.log_counts(
                "render",
                Some(&label),
                &[
                    ("commands", document.commands.len() as u64),
                    ("png_bytes", png.len() as u64),
                    ("cache_hits", hits),
                    ("cache_loads", loads),
                ],
            );
            perf.flush();
        }
        info!(
            report = %label,
            width = document.width,
            height = document.height,
            bytes = png.len(),
            "rendered report"
        );
        Ok(RenderedReport {
            width: document.width,
            height: document.height,
            png,
        })
    }

    /// Renders independent requests in parallel. Results keep the input order.
    pub fn render_batch(&self, requests: &[ReportRequest]) -> Vec<Result<RenderedReport, BoardError>> {
        requests.par_iter().map(|request| self.render(request)).collect()
    }

    fn span(&self, name: &str, label: &str, started: Instant) {
        if let Some(perf) = &self.perf {
            perf.log_span_ms(name, Some(label), started.elapsed().as_secs_f64() * 1000.0);
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeeperBoardBuilder {
    fonts: Option<FontPaths>,
    font_files: Vec<PathBuf>,
    logo: Option<String>,
    board_name: String,
    tips: Vec<String>,
    exclude_uids: Vec<String>,
    show_unrated: bool,
    separate_columns: bool,
    metrics: LayoutMetrics,
    cache_ttl: Duration,
    perf_path: Option<PathBuf>,
    shape_text: bool,
}

impl PeeperBoardBuilder {
    pub fn new() -> Self {
        Self {
            fonts: None,
            font_files: Vec::new(),
            logo: None,
            board_name: DEFAULT_BOARD_NAME.to_string(),
            tips: Vec::new(),
            exclude_uids: Vec::new(),
            show_unrated: true,
            separate_columns: false,
            metrics: LayoutMetrics::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            perf_path: None,
            shape_text: true,
        }
    }

    pub fn from_config(config: &BoardConfig) -> Self {
        let mut builder = Self::new()
            .fonts(
                config.fonts.heavy.clone(),
                config.fonts.bold.clone(),
                config.fonts.medium.clone(),
            )
            .board_name(config.board_name.clone())
            .tips(config.tips.clone())
            .exclude_uids(config.exclude_uids.clone())
            .show_unrated(config.show_unrated)
            .separate_columns(config.separate_columns);
        if let Some(logo) = &config.logo {
            builder = builder.logo(logo.clone());
        }
        if let Some(layout) = &config.layout {
            builder = builder.layout(layout.clone());
        }
        if let Some(secs) = config.cache_ttl_secs {
            builder = builder.cache_ttl(Duration::from_secs(secs));
        }
        builder
    }

    pub fn fonts(
        mut self,
        heavy: impl Into<PathBuf>,
        bold: impl Into<PathBuf>,
        medium: impl Into<PathBuf>,
    ) -> Self {
        self.fonts = Some(FontPaths {
            heavy: heavy.into(),
            bold: bold.into(),
            medium: medium.into(),
        });
        self
    }

    // Fills heavy, bold, medium in order; with fewer files the last one covers the rest.
    // Ignored when `fonts` was set.
    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn logo(mut self, source: impl Into<String>) -> Self {
        self.logo = Some(source.into());
        self
    }

    pub fn board_name(mut self, name: impl Into<String>) -> Self {
        self.board_name = name.into();
        self
    }

    pub fn tips(mut self, tips: Vec<String>) -> Self {
        self.tips = tips;
        self
    }

    pub fn exclude_uids(mut self, uids: Vec<String>) -> Self {
        self.exclude_uids = uids;
        self
    }

    pub fn show_unrated(mut self, enabled: bool) -> Self {
        self.show_unrated = enabled;
        self
    }

    pub fn separate_columns(mut self, enabled: bool) -> Self {
        self.separate_columns = enabled;
        self
    }

    pub fn layout(mut self, metrics: LayoutMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    // Off: glyphs are placed by cmap and advance only.
    pub fn shape_text(mut self, enabled: bool) -> Self {
        self.shape_text = enabled;
        self
    }

    fn font_paths(&self) -> Result<FontPaths, BoardError> {
        if let Some(paths) = &self.fonts {
            return Ok(paths.clone());
        }
        let pick = |i: usize| self.font_files.get(i).or(self.font_files.last()).cloned();
        match (pick(0), pick(1), pick(2)) {
            (Some(heavy), Some(bold), Some(medium)) => Ok(FontPaths {
                heavy,
                bold,
                medium,
            }),
            _ => Err(BoardError::InvalidConfiguration(
                "no fonts configured".to_string(),
            )),
        }
    }

    pub fn build(self) -> Result<PeeperBoard, BoardError> {
        self.metrics.validate()?;
        if self.cache_ttl.is_zero() {
            return Err(BoardError::InvalidConfiguration(
                "cache_ttl must be positive".to_string(),
            ));
        }
        let paths = self.font_paths()?;
        let resources = ResourceCache::new(self.cache_ttl);
        let fonts = FontSet::load(&paths, &resources)?;
        if let Some(logo) = &self.logo {
            resources.image(logo)?;
        }
        let perf = match &self.perf_path {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        info!(
            board = %self.board_name,
            heavy = fonts.family_name(FontRole::Heavy),
            columns_split = self.separate_columns,
            "board ready"
        );
        Ok(PeeperBoard {
            fonts,
            resources,
            metrics: self.metrics,
            board_name: self.board_name,
            logo: self.logo,
            tips: self.tips,
            unrated: UnratedPolicy::new(self.exclude_uids),
            show_unrated: self.show_unrated,
            separate_columns: self.separate_columns,
            shape_text: self.shape_text,
            perf,
        })
    }
}

impl Default for PeeperBoardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::sub;
    use crate::font::find_system_font;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn frozen_for(date: NaiveDate) -> StoredSnapshot {
        let closed = date.succ_opt().unwrap().and_hms_opt(0, 5, 0).unwrap();
        let persisted_at = closed.and_local_timezone(Local).earliest().unwrap().timestamp();
        StoredSnapshot::new(
            DailyReport::new(
                vec![
                    sub("1", Verdict::Accepted, "P1", persisted_at - 7200),
                    sub("2", Verdict::WrongAnswer, "P1", persisted_at - 3600),
                ],
                vec![
                    RankingEntry::new("user1", "1", 10).with_rank(1),
                    RankingEntry::new("user2", "2", 4).with_rank(2),
                ],
            ),
            persisted_at,
        )
    }

    fn board_with_system_font() -> Option<PeeperBoard> {
        let path = find_system_font()?;
        Some(
            PeeperBoard::builder()
                .register_font_file(path)
                .board_name("Test Board")
                .tips(vec!["Read the statement twice.".to_string()])
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "id": "peeper",
                "board_name": "Peeper",
                "fonts": {"heavy": "h.ttf", "bold": "b.ttf", "medium": "m.ttf"},
                "exclude_uids": ["42"],
                "layout": {"small_section_divisor": 3},
                "cache_ttl_secs": 60
            }"#,
        )
        .unwrap();
        let config = BoardConfig::load(&path).unwrap();
        assert!(config.show_unrated);
        assert!(!config.separate_columns);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        let layout = config.layout.clone().unwrap();
        assert_eq!(layout.small_section_divisor, 3);
        assert_eq!(layout.content_width, 1248);
        assert_eq!(
            config.snapshot_store().path_for(day(2)),
            PathBuf::from("data/peeper-2025-03-02.json")
        );

        let builder = PeeperBoardBuilder::from_config(&config);
        assert_eq!(builder.cache_ttl, Duration::from_secs(60));
        assert_eq!(builder.exclude_uids, vec!["42".to_string()]);
        assert_eq!(builder.font_paths().unwrap(), config.fonts);
    }

    #[test]
    fn config_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            BoardConfig::load(dir.path().join("missing.json")).unwrap_err(),
            BoardError::InvalidConfiguration(_)
        ));
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"id\": 3}").unwrap();
        assert!(matches!(BoardConfig::load(&path).unwrap_err(), BoardError::Json(_)));
    }

    #[test]
    fn registered_files_cover_missing_roles() {
        let builder = PeeperBoardBuilder::new()
            .register_font_file("a.ttf")
            .register_font_file("b.ttf");
        let paths = builder.font_paths().unwrap();
        assert_eq!(paths.heavy, PathBuf::from("a.ttf"));
        assert_eq!(paths.bold, PathBuf::from("b.ttf"));
        assert_eq!(paths.medium, PathBuf::from("b.ttf"));
    }

    #[test]
    fn build_validates_before_loading() {
        assert!(matches!(
            PeeperBoard::builder().build().err().unwrap(),
            BoardError::InvalidConfiguration(_)
        ));
        let bad_metrics = LayoutMetrics {
            content_width: 0,
            ..LayoutMetrics::default()
        };
        assert!(matches!(
            PeeperBoard::builder()
                .register_font_file("a.ttf")
                .layout(bad_metrics)
                .build()
                .err()
                .unwrap(),
            BoardError::InvalidConfiguration(_)
        ));
        assert!(matches!(
            PeeperBoard::builder()
                .register_font_file("/no/such/font.ttf")
                .build()
                .err()
                .unwrap(),
            BoardError::Font(_)
        ));
    }

    #[test]
    fn full_report_needs_a_frozen_snapshot() {
        let Some(board) = board_with_system_font() else {
            return;
        };
        let err = board.render(&ReportRequest::full(day(2), None)).unwrap_err();
        assert!(matches!(err, BoardError::MissingSnapshot(date) if date == day(1)));
    }

    #[test]
    fn renders_full_and_now_reports() {
        let Some(board) = board_with_system_font() else {
            return;
        };
        let frozen = frozen_for(day(1));
        let full = board
            .render(&ReportRequest::full(day(2), Some(frozen.clone())))
            .unwrap();
        assert!(full.width > 1248 && full.height > 0);
        let decoded = image::load_from_memory(&full.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (full.width, full.height));

        let today = vec![sub("2", Verdict::Accepted, "P7", frozen.persisted_at + 60)];
        let requests = vec![
            ReportRequest::now(Verdict::Accepted, day(2), Some(frozen.clone()), today.clone()),
            ReportRequest::now(Verdict::WrongAnswer, day(2), Some(frozen), today),
        ];
        let results = board.render_batch(&requests);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.as_ref().is_ok_and(|r| !r.png.is_empty())));
    }

    #[test]
    fn names_outside_the_font_fail_the_report() {
        let Some(board) = board_with_system_font() else {
            return;
        };
        let name = "今天也是卷王";
        if board.fonts().missing_glyph(FontRole::Bold, name).is_none() {
            return;
        }
        let frozen = frozen_for(day(1));
        let today = vec![Submission::new(
            User::new(name, "1"),
            100,
            Verdict::Accepted,
            "P1",
            "题目",
            frozen.persisted_at + 60,
        )];
        let request = ReportRequest::now(Verdict::Accepted, day(2), Some(frozen), today);
        assert!(matches!(board.compose(&request).unwrap_err(), BoardError::Font(_)));
        let err = board.render(&request).unwrap_err();
        assert!(matches!(err, BoardError::Font(message) if message.contains("no glyph")));
    }

    #[test]
    fn perf_log_records_pipeline_stages() {
        let Some(path) = find_system_font() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("perf.log");
        let board = PeeperBoard::builder()
            .register_font_file(path)
            .perf_log(&log)
            .build()
            .unwrap();
        let frozen = frozen_for(day(1));
        board
            .render(&ReportRequest::now(Verdict::Accepted, day(2), Some(frozen), Vec::new()))
            .unwrap();
        let text = std::fs::read_to_string(&log).unwrap();
        for stage in ["ranking", "compose", "layout", "raster"] {
            assert!(text.contains(&format!("\"name\":\"{stage}\"")), "{stage}");
        }
        assert!(text.contains("perf.counts"));
    }
}
