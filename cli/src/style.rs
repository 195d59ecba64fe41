use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use ojudge_core::{
    compare::Comparator,
    judge::JudgeStatus,
    testing::{CaseError, RunOutcome, Summary},
};

use crate::util;

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for JudgeStatus {
    fn color(&self) -> Color {
        use JudgeStatus::*;
        if !self::is_truecolor_supported() {
            return match self {
                AC => Color::Green,
                WA => Color::Yellow,
                TLE => Color::Red,
                MLE => Color::Blue,
                RE => Color::Magenta,
            };
        }

        let (r, g, b) = match self {
            AC => (30, 180, 40),
            WA => (210, 138, 4),
            TLE => (220, 42, 42),
            MLE => (40, 96, 220),
            RE => (171, 40, 200),
        };
        Color::TrueColor { r, g, b }
    }
}

pub fn judge_icon(judge: JudgeStatus) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {} ", judge)
        .on_color(judge.color())
        .bold()
        .color(fg)
}

pub fn error_icon() -> ColoredString {
    " ERR ".on_color(Color::BrightRed).bold().color(Color::Black)
}

/// One-line result shown when a testcase finishes.
pub fn outcome_line(outcome: &RunOutcome) -> String {
    let memory = match outcome.peak_memory_mb {
        Some(mb) => format!(" {:.2}MB", mb),
        None => String::new(),
    };
    format!(
        "Testcase {} ... {}{} [{:.0}ms{}]",
        outcome.testcase.name(),
        self::judge_icon(outcome.status),
        " ".repeat(3 - outcome.status.to_string().len()),
        outcome.elapsed_ms(),
        memory,
    )
}

pub fn error_line(err: &CaseError) -> String {
    format!(
        "Testcase {} ... {} {}",
        err.testcase.name(),
        self::error_icon(),
        err.error.to_string().bright_red()
    )
}

pub fn print_test_result_summary(summary: &Summary) {
    let bar = "-".repeat(5);

    if let Some(slow) = summary.slowest() {
        let msg = format!(
            "slowest: {:.2} ms (for {})",
            slow.elapsed_ms(),
            slow.testcase.name()
        );
        match slow.status {
            JudgeStatus::TLE => println!("{}", msg.color(JudgeStatus::TLE.color())),
            _ => println!("{}", msg),
        }
    }
    if let Some(mem) = summary.max_memory() {
        let msg = format!(
            "max memory: {:.2} MB (for {})",
            mem.peak_memory_mb.unwrap_or_default(),
            mem.testcase.name()
        );
        match mem.status {
            JudgeStatus::MLE => println!("{}", msg.color(JudgeStatus::MLE.color())),
            _ => println!("{}", msg),
        }
    }

    print!("{} ", bar);

    let num_total_test = summary.total();
    let num_passed = summary.count(JudgeStatus::AC);
    let num_failed = num_total_test - num_passed;

    if summary.is_all_accepted() {
        let msg = format!("All {} tests passed ✨", num_total_test);
        print!("{}", msg.green());
    } else {
        let summary_msg = if num_passed > 0 {
            format!("{}/{} tests failed 💣", num_failed, num_total_test)
        } else {
            format!("All {} tests failed 💀", num_total_test)
        };

        let mut details: Vec<String> = summary
            .counts()
            .filter(|&(judge, cnt)| judge != JudgeStatus::AC && cnt > 0)
            .map(|(judge, cnt)| {
                format!(
                    "{}{}{}",
                    self::judge_icon(judge),
                    "x".dimmed(),
                    cnt.to_string().bold().bright_white(),
                )
            })
            .collect();
        if summary.num_errors() > 0 {
            details.push(format!(
                "{}{}{}",
                self::error_icon(),
                "x".dimmed(),
                summary.num_errors().to_string().bold().bright_white(),
            ));
        }

        print!("{} ({})", summary_msg.bright_red(), details.join(", "));
    }

    println!(" {}", bar);
}

const BOLD_LINE: &str = "━";
const THIN_LINE: &str = "─";

fn print_sub_title(s: &str, cols: usize) {
    println!(
        "{}{}",
        s.cyan().bold(),
        THIN_LINE
            .repeat(cols.saturating_sub(s.chars().count() + 1))
            .bright_black(),
    )
}

fn print_lines(entire_str: &str) {
    if entire_str.is_empty() {
        println!("{}", "<EMPTY>".magenta().dimmed());
        return;
    }
    let lines: Vec<_> = entire_str.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_end();
        print!("{}", trimmed);

        let num_trailing_whitespace = line.len() - trimmed.len();
        if num_trailing_whitespace > 0 {
            print!(
                "{}{}",
                " ".repeat(num_trailing_whitespace).on_red(),
                "(Trailing whitespace)".bright_red().bold()
            );
        }

        let is_last_line = i + 1 == lines.len();
        if is_last_line && !entire_str.ends_with('\n') {
            print!("{}", " Missing new line ".on_yellow().black().bold());
        }

        println!();
    }
}

/// Prints expected output, actual output and stderr of a non-accepted testcase.
pub fn print_test_result_detail(res: &RunOutcome) {
    let (cols, _) = terminal::size().unwrap_or((40, 40));
    let cols = cols as usize;

    let bold_bar = BOLD_LINE.repeat(cols).blue().bold();

    let exit_code = match res.exit_code {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    };
    println!(
        "\n{}: {} [{:.0}ms]{}\n{}",
        res.testcase.name().color(Color::BrightYellow).bold(),
        self::judge_icon(res.status),
        res.elapsed_ms(),
        exit_code,
        bold_bar,
    );

    let expected = res.testcase.expected_output_path().map(fsutil::read);
    if let Some(expected) = &expected {
        self::print_sub_title("[expected]", cols);
        match expected {
            Ok(bytes) => self::print_lines(&util::lossy(bytes)),
            Err(e) => println!("{}", e.to_string().bright_red()),
        }
    }

    self::print_sub_title("[stdout]", cols);
    self::print_lines(&util::lossy(&res.output));

    if !res.stderr.is_empty() {
        self::print_sub_title("[stderr]", cols);
        print!("{}", util::lossy(&res.stderr));
    }

    if let (JudgeStatus::WA, Some(Ok(expected))) = (res.status, &expected) {
        if Comparator::non_strict().compare(&res.output, expected) {
            println!(
                "{}",
                "Hint: the output would be accepted if spaces and newlines were ignored"
                    .bright_yellow()
            );
        }
    }

    println!("{}", bold_bar);
}

pub fn print_case_error(err: &CaseError) {
    println!(
        "\n{}: {} {}",
        err.testcase.name().color(Color::BrightYellow).bold(),
        self::error_icon(),
        err.error.to_string().bright_red(),
    );
}
