use regex::Regex;
use std::sync::OnceLock;

pub mod config;
pub mod discovery;
pub mod logging;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

fn ansi_escape() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new("\x1b\\[[0-9;]*m").expect("valid ANSI escape pattern"))
}

/// Number of terminal columns `s` occupies once colour codes are stripped.
pub fn visible_len(s: &str) -> usize {
    ansi_escape().replace_all(s, "").chars().count()
}

/// Prints the provided lines inside an ASCII box
pub fn print_ansi_boxed_lines(lines: &[String]) {
    let width = lines.iter().map(|s| visible_len(s)).max().unwrap_or(0);

    let border = "-".repeat(width + 4);
    println_pad!("{}", border);
    for line in lines {
        let pad = width - visible_len(line);
        println_pad!("| {}{} |", line, " ".repeat(pad));
    }
    println_pad!("{}", border);
}

/// Formats an id the way the log and summary print it.
pub fn format_id(id: u64) -> String {
    format!("{:016x}", id)
}
