use crate::canvas::Canvas;
use crate::font::{FontRole, TextMeasurer};
use crate::types::Rgba;

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub role: FontRole,
    pub size: f32,
    pub color: Rgba,
    pub line_multiplier: f32,
    pub max_width: Option<f32>,
    pub padding_bottom: i32,
}

impl TextStyle {
    pub fn new(role: FontRole, size: f32) -> Self {
        Self {
            role,
            size,
            color: Rgba::BLACK,
            line_multiplier: 1.0,
            max_width: None,
            padding_bottom: 0,
        }
    }

    pub fn color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    pub fn line_multiplier(mut self, multiplier: f32) -> Self {
        self.line_multiplier = multiplier;
        self
    }

    pub fn max_width(mut self, width: f32) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn padding_bottom(mut self, padding: i32) -> Self {
        self.padding_bottom = padding;
        self
    }
}

/// Text that has already been wrapped and measured. Construction does all the measuring,
/// so height and width queries are plain field reads.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledText {
    style: TextStyle,
    lines: Vec<String>,
    line_pitch: f32,
    width: f32,
}

impl StyledText {
    pub fn new(text: &str, style: TextStyle, measurer: &dyn TextMeasurer) -> Self {
        let lines = wrap_text(text, measurer, style.role, style.size, style.max_width);
        let width = lines
            .iter()
            .map(|line| measurer.text_width(style.role, style.size, line))
            .fold(0.0f32, f32::max);
        let line_pitch = measurer.line_height(style.role, style.size) * style.line_multiplier;
        Self {
            style,
            lines,
            line_pitch,
            width,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    /// Widest line, in pixels, rounded up.
    pub fn width(&self) -> i32 {
        self.width.ceil() as i32
    }

    /// Height of the text block alone.
    pub fn text_height(&self) -> i32 {
        (self.lines.len() as f32 * self.line_pitch).ceil() as i32
    }

    /// Text block plus its bottom padding; what a draw advances the cursor by.
    pub fn height(&self) -> i32 {
        self.text_height() + self.style.padding_bottom
    }

    pub fn draw(&self, canvas: &mut Canvas, x: i32, y: i32) -> i32 {
        for (i, line) in self.lines.iter().enumerate() {
            canvas.draw_text(
                self.style.role,
                self.style.size,
                self.style.color,
                x as f32,
                y as f32 + i as f32 * self.line_pitch,
                line,
            );
        }
        y + self.height()
    }
}

/// Summed height of a vertical run of texts; absent entries count as zero.
pub fn stacked_height<'a>(texts: impl IntoIterator<Item = Option<&'a StyledText>>) -> i32 {
    texts.into_iter().flatten().map(StyledText::height).sum()
}

/// Greedy wrap. Explicit newlines are hard breaks; whitespace sticks to the token after it;
/// a token wider than `max_width` on its own is cut by width, which also covers scripts
/// without spaces.
pub fn wrap_text(
    text: &str,
    measurer: &dyn TextMeasurer,
    role: FontRole,
    size: f32,
    max_width: Option<f32>,
) -> Vec<String> {
    let Some(max_width) = max_width.filter(|w| *w > 0.0) else {
        return text.split('\n').map(str::to_string).collect();
    };
    let width = |s: &str| measurer.text_width(role, size, s);

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut first_token = true;
        for token in tokenize(paragraph) {
            if !current.is_empty() {
                let candidate = [current.as_str(), token].concat();
                if width(&candidate) <= max_width {
                    current = candidate;
                    continue;
                }
                lines.push(std::mem::take(&mut current));
                current = token.trim_start().to_string();
            } else if first_token {
                current = token.to_string();
            } else {
                current = token.trim_start().to_string();
            }
            first_token = false;

            while current.chars().count() > 1 && width(&current) > max_width {
                let (head, tail) = hard_split(&current, width(&current), max_width, &width);
                lines.push(head);
                current = tail;
            }
        }
        lines.push(current);
    }
    lines
}

fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut prev_was_space = true;
    for (idx, ch) in line.char_indices() {
        let is_space = ch.is_whitespace();
        if is_space && !prev_was_space && idx > start {
            tokens.push(&line[start..idx]);
            start = idx;
        }
        prev_was_space = is_space;
    }
    if start < line.len() {
        tokens.push(&line[start..]);
    }
    tokens
}

/// Splits `text` so the head fits in `max_width`: estimate the cut from the width ratio,
/// then walk it back one char at a time. The head always keeps at least one char.
fn hard_split(
    text: &str,
    measured: f32,
    max_width: f32,
    width: &dyn Fn(&str) -> f32,
) -> (String, String) {
    let chars: Vec<char> = text.chars().collect();
    let count = chars.len();
    let ratio = if measured > 0.0 { max_width / measured } else { 1.0 };
    let mut cut = ((count as f32) * ratio).floor() as usize;
    cut = cut.clamp(1, count.saturating_sub(1).max(1));
    while cut > 1 {
        let head: String = chars[..cut].iter().collect();
        if width(&head) <= max_width {
            break;
        }
        cut -= 1;
    }
    let head = chars[..cut].iter().collect();
    let tail = chars[cut..].iter().collect();
    (head, tail)
}

/// Shortens to `head...tail` when longer than `limit` chars.
pub fn ellipsize(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit || limit <= 1 {
        return text.to_string();
    }
    let keep = (limit - 1) / 2;
    let head: String = text.chars().take(keep).collect();
    let tail: String = text.chars().skip(count - keep).collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::MonospaceMeasurer;

    // 10 px per char at size 10.
    fn mono() -> MonospaceMeasurer {
        MonospaceMeasurer::new(1.0, 1.0)
    }

    fn wrap(text: &str, max: f32) -> Vec<String> {
        wrap_text(text, &mono(), FontRole::Medium, 10.0, Some(max))
    }

    #[test]
    fn spaces_travel_with_the_following_word() {
        assert_eq!(tokenize("ab cd  ef"), vec!["ab", " cd", "  ef"]);
        assert_eq!(tokenize(" lead"), vec![" lead"]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn greedy_fill_breaks_before_overflowing_word() {
        assert_eq!(wrap("aaa bbb ccc", 70.0), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap("aaa bbb ccc", 110.0), vec!["aaa bbb ccc"]);
    }

    #[test]
    fn explicit_newlines_are_hard_breaks() {
        assert_eq!(wrap("ab\n\ncd", 100.0), vec!["ab", "", "cd"]);
    }

    #[test]
    fn oversized_token_is_cut_by_width() {
        let lines = wrap("今天也是卷王的一天呢", 40.0);
        assert_eq!(lines, vec!["今天也是", "卷王的一", "天呢"]);
        for line in &lines {
            assert!(mono().text_width(FontRole::Medium, 10.0, line) <= 40.0);
        }
    }

    #[test]
    fn cut_always_keeps_one_char() {
        assert_eq!(wrap("abc", 5.0), vec!["a", "b", "c"]);
    }

    #[test]
    fn no_max_width_only_splits_on_newlines() {
        let lines = wrap_text("a very long line\nb", &mono(), FontRole::Bold, 10.0, None);
        assert_eq!(lines, vec!["a very long line", "b"]);
    }

    #[test]
    fn styled_text_heights_include_padding() {
        let style = TextStyle::new(FontRole::Bold, 10.0)
            .max_width(40.0)
            .line_multiplier(1.5)
            .padding_bottom(16);
        let text = StyledText::new("aaaa bbbb", style, &mono());
        assert_eq!(text.lines().len(), 2);
        assert_eq!(text.text_height(), 30);
        assert_eq!(text.height(), 46);
        assert_eq!(text.width(), 40);
        assert_eq!(stacked_height([Some(&text), None, Some(&text)]), 92);
    }

    #[test]
    fn draw_advances_by_height() {
        let text = StyledText::new("x\ny", TextStyle::new(FontRole::Heavy, 10.0), &mono());
        let mut canvas = Canvas::new(100, 100, Rgba::WHITE);
        assert_eq!(text.draw(&mut canvas, 5, 7), 27);
    }

    #[test]
    fn ellipsize_keeps_head_and_tail() {
        assert_eq!(ellipsize("short", 25), "short");
        let long = "abcdefghijklmnopqrstuvwxyz0123";
        assert_eq!(ellipsize(long, 25), "abcdefghijkl...stuvwxyz0123");
        assert_eq!(ellipsize("用户名特别特别长的一位同学", 7), "用户名...位同学");
    }
}
