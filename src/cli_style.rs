use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Color as CtColor, Stylize};
use hifi_remedy::remediation::{ItemOutcome, WorkStatus};
use unicode_width::UnicodeWidthStr;

pub fn get_styles() -> Styles {
    let bold = |color: AnsiColor| Style::new().bold().fg_color(Some(Color::Ansi(color)));
    Styles::styled()
        .usage(bold(AnsiColor::Cyan).underline())
        .header(bold(AnsiColor::Cyan).underline())
        .literal(bold(AnsiColor::Green))
        .invalid(bold(AnsiColor::Red))
        .error(bold(AnsiColor::Red))
        .valid(bold(AnsiColor::Green))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const FRAME: Color = Color::Rgb { r: 180, g: 100, b: 255 };
    pub const ACCENT: Color = Color::Rgb { r: 0, g: 255, b: 255 };
    pub const HIGHLIGHT: Color = Color::Rgb { r: 255, g: 0, b: 255 };
    pub const TEXT: Color = Color::Rgb { r: 255, g: 255, b: 255 };
    pub const MUTED: Color = Color::Rgb { r: 128, g: 128, b: 128 };
    pub const OK: Color = Color::Rgb { r: 0, g: 255, b: 136 };
    pub const NOTE: Color = Color::Rgb { r: 100, g: 149, b: 237 };
    pub const PENDING: Color = Color::Rgb { r: 255, g: 255, b: 0 };
    pub const WARN: Color = Color::Rgb { r: 255, g: 165, b: 0 };
    pub const FAIL: Color = Color::Rgb { r: 255, g: 85, b: 85 };
}

/// Color used to render a work status.
pub fn status_color(status: WorkStatus) -> CtColor {
    match status {
        WorkStatus::Done => colors::OK,
        WorkStatus::NoMatch => colors::PENDING,
        WorkStatus::QueueFull => colors::WARN,
        WorkStatus::Error => colors::FAIL,
        WorkStatus::Pending | WorkStatus::Downloading | WorkStatus::Retrying(_) => colors::ACCENT,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Frames
// ═══════════════════════════════════════════════════════════════════════════════

/// Corner and edge glyphs of one box style.
struct Frame {
    top_left: &'static str,
    top_right: &'static str,
    bottom_left: &'static str,
    bottom_right: &'static str,
    horizontal: &'static str,
    vertical: &'static str,
}

const DOUBLE: Frame = Frame {
    top_left: "╔",
    top_right: "╗",
    bottom_left: "╚",
    bottom_right: "╝",
    horizontal: "═",
    vertical: "║",
};

const ROUND: Frame = Frame {
    top_left: "╭",
    top_right: "╮",
    bottom_left: "╰",
    bottom_right: "╯",
    horizontal: "─",
    vertical: "│",
};

const SECTION_WIDTH: usize = 60;
const BANNER_WIDTH: usize = 64;

fn rule(left: &str, fill: &str, right: &str, inner: usize) -> String {
    format!("{}{}{}", left, fill.repeat(inner), right)
}

/// Cut `s` so that it fits in `max` terminal columns.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for c in s.chars() {
        if out.width() + 2 > max {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// Banner and sections
// ═══════════════════════════════════════════════════════════════════════════════

/// Boxed title with the session parameters underneath.
pub fn print_banner(lines: &[(&str, String)]) {
    let edge = |left, right| rule(left, DOUBLE.horizontal, right, BANNER_WIDTH);
    println!("  {}", edge(DOUBLE.top_left, DOUBLE.top_right).with(colors::FRAME));

    print_banner_row("  HI-FI REMEDY", |s| s.with(colors::ACCENT).bold().to_string());
    print_banner_row("  find, verify and swap in better-sounding files", |s| {
        s.with(colors::MUTED).to_string()
    });
    print_banner_row("", |s| s.to_string());
    for (key, value) in lines {
        print_banner_row(&format!("  {}: {}", key, value), |s| {
            s.with(colors::TEXT).to_string()
        });
    }

    println!(
        "  {}",
        edge(DOUBLE.bottom_left, DOUBLE.bottom_right).with(colors::FRAME)
    );
    println!();
}

fn print_banner_row(content: &str, paint: impl Fn(&str) -> String) {
    let content = truncate_to_width(content, BANNER_WIDTH);
    let side = DOUBLE.vertical.with(colors::FRAME);
    println!(
        "  {}{}{}{}",
        side,
        paint(&content),
        " ".repeat(BANNER_WIDTH.saturating_sub(content.width())),
        side
    );
}

/// Top edge of a rounded section with `title` centered in it.
pub fn open_section(title: &str) {
    let used = title.width() + 4;
    let left = SECTION_WIDTH.saturating_sub(used) / 2;
    let right = SECTION_WIDTH.saturating_sub(used + left);

    println!();
    println!(
        "{} {} {}",
        rule(ROUND.top_left, ROUND.horizontal, "", left).with(colors::ACCENT),
        title.with(colors::ACCENT).bold().attribute(Attribute::Italic),
        rule("", ROUND.horizontal, ROUND.top_right, right).with(colors::ACCENT)
    );
}

pub fn close_section() {
    println!(
        "{}",
        rule(ROUND.bottom_left, ROUND.horizontal, ROUND.bottom_right, SECTION_WIDTH)
            .with(colors::ACCENT)
    );
    println!();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Notices and fields
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity of a one-line notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Info,
    Warning,
    Error,
}

impl Tone {
    /// Tone matching how a processed file ended up.
    pub fn of_outcome(outcome: &ItemOutcome) -> Tone {
        match outcome {
            ItemOutcome::Replaced(_) => Tone::Success,
            ItemOutcome::NeedsReview(_) | ItemOutcome::NoMatch => Tone::Warning,
            ItemOutcome::QueueFull(_) | ItemOutcome::Failed(_) => Tone::Error,
        }
    }

    fn mark(self) -> &'static str {
        match self {
            Tone::Success => "✓",
            Tone::Info => "ℹ",
            Tone::Warning => "⚠",
            Tone::Error => "✗",
        }
    }

    fn color(self) -> CtColor {
        match self {
            Tone::Success => colors::OK,
            Tone::Info => colors::NOTE,
            Tone::Warning => colors::WARN,
            Tone::Error => colors::FAIL,
        }
    }
}

pub fn notify(tone: Tone, message: &str) {
    println!(
        " {} {}",
        tone.mark().with(tone.color()).bold(),
        message.with(tone.color())
    );
}

/// Heading line for the file currently being resolved.
pub fn print_file_heading(path: &str) {
    println!(
        "  {} {} {}",
        "◆".with(colors::HIGHLIGHT),
        "File:".with(colors::ACCENT).bold(),
        path.with(colors::OK).bold()
    );
}

pub fn print_field(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        "●".with(colors::FRAME),
        format!("{}:", key).with(colors::MUTED),
        value.with(colors::TEXT)
    );
}

/// One file in a listing; `nested` indents it under a preceding notice.
pub fn print_path_item(text: &str, nested: bool) {
    println!(
        "{}{}  {}",
        if nested { "  " } else { "" },
        "▶".with(colors::ACCENT),
        text.with(colors::TEXT)
    );
}

pub fn print_nothing(message: &str) {
    println!(
        "  {} {}",
        "○".with(colors::MUTED),
        message.with(colors::MUTED).attribute(Attribute::Italic)
    );
}

pub fn prompt(label: &str) -> String {
    format!(
        "{}{}{} {} ",
        "❯".with(colors::ACCENT).bold(),
        "❯".with(colors::FRAME).bold(),
        "❯".with(colors::HIGHLIGHT).bold(),
        label.with(colors::MUTED),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tables
// ═══════════════════════════════════════════════════════════════════════════════

const MAX_CELL_WIDTH: usize = 48;

struct Cell {
    text: String,
    color: CtColor,
}

impl Cell {
    fn new(text: &str, color: CtColor) -> Self {
        Self {
            text: truncate_to_width(text, MAX_CELL_WIDTH),
            color,
        }
    }
}

/// Rounded table whose columns grow to fit their widest cell.
pub struct Table {
    header: Vec<Cell>,
    rows: Vec<Vec<Cell>>,
    widths: Vec<usize>,
}

impl Table {
    pub fn new(columns: &[&str]) -> Self {
        let header: Vec<Cell> = columns
            .iter()
            .map(|c| Cell::new(c, colors::ACCENT))
            .collect();
        let widths = header.iter().map(|c| c.text.width()).collect();
        Self {
            header,
            rows: Vec::new(),
            widths,
        }
    }

    pub fn row(&mut self, cells: &[(&str, CtColor)]) {
        let cells: Vec<Cell> = cells
            .iter()
            .map(|(text, color)| Cell::new(text, *color))
            .collect();
        for (width, cell) in self.widths.iter_mut().zip(&cells) {
            *width = (*width).max(cell.text.width());
        }
        self.rows.push(cells);
    }

    pub fn plain_row(&mut self, cells: &[&str]) {
        let colored: Vec<(&str, CtColor)> = cells.iter().map(|c| (*c, colors::TEXT)).collect();
        self.row(&colored);
    }

    fn border(&self, left: &str, junction: &str, right: &str) -> String {
        let segments: Vec<String> = self
            .widths
            .iter()
            .map(|w| ROUND.horizontal.repeat(w + 2))
            .collect();
        format!("{}{}{}", left, segments.join(junction), right)
    }

    fn print_line(&self, cells: &[Cell], bold: bool) {
        let bar = ROUND.vertical.with(colors::ACCENT);
        print!("{}", bar);
        for (cell, width) in cells.iter().zip(&self.widths) {
            let pad = " ".repeat(width.saturating_sub(cell.text.width()));
            let text = cell.text.as_str().with(cell.color);
            if bold {
                print!(" {}{} {}", text.bold(), pad, bar);
            } else {
                print!(" {}{} {}", text, pad, bar);
            }
        }
        println!();
    }

    pub fn print(&self) {
        if self.widths.is_empty() {
            return;
        }
        println!(
            "{}",
            self.border(ROUND.top_left, "┬", ROUND.top_right)
                .with(colors::ACCENT)
        );
        self.print_line(&self.header, true);
        println!("{}", self.border("├", "┼", "┤").with(colors::ACCENT));
        for row in &self.rows {
            self.print_line(row, false);
        }
        println!(
            "{}",
            self.border(ROUND.bottom_left, "┴", ROUND.bottom_right)
                .with(colors::ACCENT)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        let cut = truncate_to_width("a-very-long-file-name.flac", 10);
        assert!(cut.width() <= 10);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_table_widths_follow_content() {
        let mut table = Table::new(&["File", "Status"]);
        table.plain_row(&["song.mp3", "DONE"]);
        table.row(&[("longer-song.mp3", colors::FAIL), ("ERROR", colors::FAIL)]);

        assert_eq!(table.widths, vec![15, 6]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.border("├", "┼", "┤"),
            format!("├{}┼{}┤", "─".repeat(17), "─".repeat(8))
        );
    }

    #[test]
    fn test_outcome_tones() {
        assert_eq!(Tone::of_outcome(&ItemOutcome::NoMatch), Tone::Warning);
        assert_eq!(
            Tone::of_outcome(&ItemOutcome::Failed("API Error (500)".to_string())),
            Tone::Error
        );
    }
}
