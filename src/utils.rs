use crate::records::TimestampStyle;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum length of a sanitized file name, in characters.
pub const MAX_NAME_CHARS: usize = 50;

/// File name used when a title sanitizes to nothing.
pub const FALLBACK_NAME: &str = "Unknown";

/// Name of the combined artifact in single-file mode.
pub const SINGLE_FILE_NAME: &str = "all_chats.csv";

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub target_dir: PathBuf,
    pub single_file: bool,
    pub timestamps: TimestampStyle,
    pub verbose: bool,
    pub quiet: bool,
}

impl ExportConfig {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            single_file: false,
            timestamps: TimestampStyle::default(),
            verbose: false,
            quiet: false,
        }
    }
}

/// Turn an arbitrary conversation title into a safe file stem.
///
/// Characters illegal on common filesystems (`< > : " / \ | ? *` and
/// U+0000..=U+001F) become `_`, surrounding whitespace is trimmed and the
/// result is cut to [`MAX_NAME_CHARS`] characters. Never returns an empty
/// string.
pub fn sanitize_filename(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect();

    let name: String = replaced.trim().chars().take(MAX_NAME_CHARS).collect();
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

/// Reserve a file stem for this run, suffixing `_2`, `_3`, … when the
/// sanitized name is already taken. Comparison is case-insensitive so
/// artifacts don't clobber each other on case-folding filesystems.
pub fn allocate_filename(stem: &str, registry: &mut HashSet<String>) -> String {
    if registry.insert(stem.to_lowercase()) {
        return stem.to_string();
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{}_{}", stem, n);
        if registry.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Spinner used while a conversation's history is being walked.
pub fn spinner(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let s = ProgressBar::new_spinner();
    s.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    s.set_message(message);
    s.enable_steady_tick(Duration::from_millis(80));
    s
}
