//! Markdown Import
//!
//! Turns free-form training notes into entries. The first date in the
//! document (`YYYY-MM-DD`, `YYYY.MM.DD` or `MM月DD日`) owns the note; the
//! line holding it is dropped and the rest becomes the entry's content.
//! Training type, duration, heart rate, SpO2 and intensity are picked up
//! from keywords when present.

use super::{store_batch, BatchReport, SkipReason};
use crate::storage::{Entry, RecordStore, StorageError, StorageResult};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Keyword → training type label, checked in order
const TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("静态闭气", "STA"),
    ("无蹼", "DNF"),
    ("双蹼", "DYNB"),
    ("单蹼", "DYN"),
    ("蛙泳", "蛙泳"),
    ("陆地训练", "陆地训练"),
    ("瑜伽", "瑜伽"),
    ("骑行", "骑行"),
    ("跑步", "跑步"),
    ("拉伸", "拉伸"),
];

/// Word-bounded event codes; DYNB before DYN
const TYPE_CODES: &[(&str, &str)] = &[
    (r"(?i)\bstatic\b|\bSTA\b", "STA"),
    (r"\bDNF\b", "DNF"),
    (r"\bDYNB\b", "DYNB"),
    (r"\bDYN\b", "DYN"),
];

const INTENSITY_KEYWORDS: &[(&str, &str)] = &[
    ("高强度", "high"),
    ("中等强度", "medium"),
    ("低强度", "low"),
    ("轻松", "low"),
    ("恢复", "recovery"),
];

/// A note after extraction, before it reaches the store
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNote {
    pub entry: Entry,
    /// The date text as written in the note
    pub matched_date: String,
}

/// Compiled extraction patterns
struct NotePatterns {
    iso_date: Regex,
    cn_date: Regex,
    type_codes: Vec<(Regex, &'static str)>,
    /// (pattern, minutes per unit), first pattern with a match wins
    durations: Vec<(Regex, f64)>,
    heart_rate: Vec<Regex>,
    spo2: Vec<Regex>,
}

impl NotePatterns {
    fn compile() -> StorageResult<Self> {
        Ok(Self {
            iso_date: compile(r"(\d{4})[-.](\d{1,2})[-.](\d{1,2})")?,
            cn_date: compile(r"(\d{1,2})月(\d{1,2})日")?,
            type_codes: TYPE_CODES
                .iter()
                .map(|(pattern, label)| compile(pattern).map(|re| (re, *label)))
                .collect::<StorageResult<_>>()?,
            durations: vec![
                (compile(r"(\d+(?:\.\d+)?)\s*小时")?, 60.0),
                (compile(r"(\d+(?:\.\d+)?)\s*分钟")?, 1.0),
                (compile(r"(\d+(?:\.\d+)?)\s*h\b")?, 60.0),
                (compile(r"(\d+(?:\.\d+)?)\s*min")?, 1.0),
            ],
            heart_rate: vec![
                compile(r"心率\s*(\d+)")?,
                compile(r"HR[:\s]*(\d+)")?,
                compile(r"(\d+)\s*bpm")?,
            ],
            spo2: vec![compile(r"血氧\s*(\d+)")?, compile(r"SpO2[:\s]*(\d+)")?],
        })
    }

    /// Earliest valid date in the text: (date, byte offset, matched text)
    fn first_date(&self, text: &str, reference_year: i32) -> Option<(NaiveDate, usize, String)> {
        let iso = self.iso_date.captures_iter(text).filter_map(|caps| {
            let whole = caps.get(0)?;
            let date = NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            )?;
            Some((date, whole.start(), whole.as_str().to_string()))
        });
        let cn = self.cn_date.captures_iter(text).filter_map(|caps| {
            let whole = caps.get(0)?;
            let date = NaiveDate::from_ymd_opt(
                reference_year,
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
            )?;
            Some((date, whole.start(), whole.as_str().to_string()))
        });

        iso.chain(cn).min_by_key(|(_, offset, _)| *offset)
    }
}

fn compile(pattern: &str) -> StorageResult<Regex> {
    Regex::new(pattern).map_err(|e| StorageError::validation(format!("bad pattern {}: {}", pattern, e)))
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<u32> {
    patterns
        .iter()
        .find_map(|re| re.captures(text).and_then(|caps| caps[1].parse().ok()))
}

/// Markdown note importer
pub struct MarkdownImporter {
    patterns: NotePatterns,
    /// Year used for `MM月DD日` dates
    reference_year: i32,
    overwrite: bool,
}

impl MarkdownImporter {
    pub fn new(reference_year: i32) -> StorageResult<Self> {
        Ok(Self {
            patterns: NotePatterns::compile()?,
            reference_year,
            overwrite: false,
        })
    }

    /// Overwrite entries whose date already exists
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Extract an entry from note text
    pub fn parse(&self, text: &str, source: Option<&Path>) -> Result<ParsedNote, SkipReason> {
        let (date, offset, matched_date) = self
            .patterns
            .first_date(text, self.reference_year)
            .ok_or(SkipReason::MissingDate)?;

        let content = remove_line_at(text, offset);
        let mut entry = Entry::new(date, self.training_type(text), "").content(content.trim());

        if let Some(minutes) = self.duration_minutes(text) {
            entry = entry.duration(minutes);
        }
        if let Some(bpm) = first_capture(&self.patterns.heart_rate, text) {
            entry = entry.metric("heart_rate", bpm);
        }
        if let Some(spo2) = first_capture(&self.patterns.spo2, text) {
            entry = entry.metric("spo2", spo2);
        }
        if let Some((_, level)) = INTENSITY_KEYWORDS.iter().find(|(kw, _)| text.contains(kw)) {
            entry = entry.metric("intensity", *level);
        }
        if let Some(path) = source {
            entry = entry.metric("source_file", path.display().to_string());
        }

        let entry = entry
            .validate()
            .map_err(|e| SkipReason::Invalid(e.to_string()))?;
        Ok(ParsedNote {
            entry,
            matched_date,
        })
    }

    fn training_type(&self, text: &str) -> String {
        TYPE_KEYWORDS
            .iter()
            .find(|(kw, _)| text.contains(kw))
            .map(|(_, label)| *label)
            .or_else(|| {
                self.patterns
                    .type_codes
                    .iter()
                    .find(|(re, _)| re.is_match(text))
                    .map(|(_, label)| *label)
            })
            .unwrap_or_default()
            .to_string()
    }

    fn duration_minutes(&self, text: &str) -> Option<f64> {
        self.patterns.durations.iter().find_map(|(re, per_unit)| {
            re.captures(text)
                .and_then(|caps| caps[1].parse::<f64>().ok())
                .map(|n| n * per_unit)
        })
    }

    /// Import one note from a string
    pub fn import_str(&self, store: &RecordStore, text: &str) -> StorageResult<BatchReport> {
        let mut report = BatchReport::new();
        match self.parse(text, None) {
            Ok(note) => store_batch(store, vec![("note".to_string(), note.entry)], self.overwrite, &mut report)?,
            Err(reason) => report.skip("note", reason),
        }
        Ok(report)
    }

    /// Import one markdown file
    pub fn import_file(&self, store: &RecordStore, path: &Path) -> StorageResult<BatchReport> {
        self.import_paths(store, vec![path.to_path_buf()])
    }

    /// Import every markdown file under a directory (recursively)
    pub fn import_dir(&self, store: &RecordStore, dir: &Path) -> StorageResult<BatchReport> {
        let mut files = Vec::new();
        collect_markdown(dir, &mut files)?;
        files.sort();

        let report = self.import_paths(store, files)?;
        tracing::info!("Imported markdown from {:?}: {}", dir, report);
        Ok(report)
    }

    fn import_paths(&self, store: &RecordStore, paths: Vec<PathBuf>) -> StorageResult<BatchReport> {
        let mut report = BatchReport::new();
        let mut items = Vec::new();

        for path in paths {
            let label = path.display().to_string();
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    report.skip(label, SkipReason::Unreadable(e.to_string()));
                    continue;
                }
            };

            match self.parse(&text, Some(&path)) {
                Ok(note) => items.push((label, note.entry)),
                Err(reason) => report.skip(label, reason),
            }
        }

        store_batch(store, items, self.overwrite, &mut report)?;
        Ok(report)
    }
}

/// Drop the line containing byte `offset`
fn remove_line_at(text: &str, offset: usize) -> String {
    let start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = text[offset..].find('\n').map_or(text.len(), |i| offset + i + 1);

    let mut rest = String::with_capacity(text.len());
    rest.push_str(&text[..start]);
    rest.push_str(&text[end..]);
    rest
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> StorageResult<()> {
    for dirent in std::fs::read_dir(dir)? {
        let path = dirent?.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| MARKDOWN_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::parse_date;
    use tempfile::tempdir;

    fn importer() -> MarkdownImporter {
        MarkdownImporter::new(2026).unwrap()
    }

    #[test]
    fn test_iso_date_line_removed() {
        let note = importer()
            .parse("# 训练日志\n2026-02-04 周三\n无蹼 4x50m\n感觉不错", None)
            .unwrap();

        assert_eq!(note.entry.date, parse_date("2026-02-04").unwrap());
        assert_eq!(note.matched_date, "2026-02-04");
        assert_eq!(note.entry.content, "# 训练日志\n无蹼 4x50m\n感觉不错");
        assert_eq!(note.entry.training_type, "DNF");
        assert_eq!(note.entry.location, "unknown");
    }

    #[test]
    fn test_dotted_and_localized_dates() {
        let note = importer().parse("Session 2026.2.7\nDYNB 150m", None).unwrap();
        assert_eq!(note.entry.date, parse_date("2026-02-07").unwrap());
        assert_eq!(note.entry.training_type, "DYNB");

        let note = importer().parse("02月04日 静态闭气 5:30", None).unwrap();
        assert_eq!(note.entry.date, parse_date("2026-02-04").unwrap());
        assert_eq!(note.entry.training_type, "STA");
        assert_eq!(note.entry.content, "");
    }

    #[test]
    fn test_first_date_wins() {
        let note = importer()
            .parse("02月03日 recap\nplanned for 2026-02-10", None)
            .unwrap();
        assert_eq!(note.entry.date, parse_date("2026-02-03").unwrap());
        assert_eq!(note.entry.content, "planned for 2026-02-10");
    }

    #[test]
    fn test_metrics_extraction() {
        let note = importer()
            .parse(
                "2026-02-04\n陆地训练 2小时，高强度\n心率 150，血氧98",
                Some(Path::new("notes/feb.md")),
            )
            .unwrap();

        let entry = note.entry;
        assert_eq!(entry.training_type, "陆地训练");
        assert_eq!(entry.duration_minutes, Some(120.0));
        assert_eq!(entry.metrics["heart_rate"], serde_json::json!(150));
        assert_eq!(entry.metrics["spo2"], serde_json::json!(98));
        assert_eq!(entry.metrics["intensity"], serde_json::json!("high"));
        assert_eq!(entry.metrics["source_file"], serde_json::json!("notes/feb.md"));
    }

    #[test]
    fn test_english_duration_and_hr() {
        let note = importer()
            .parse("2026-02-05\nDYN practice 90min, HR: 62", None)
            .unwrap();
        assert_eq!(note.entry.training_type, "DYN");
        assert_eq!(note.entry.duration_minutes, Some(90.0));
        assert_eq!(note.entry.metrics["heart_rate"], serde_json::json!(62));
    }

    #[test]
    fn test_undated_note_is_skipped() {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();

        let report = importer().import_str(&store, "just thoughts, no date").unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped[0].reason, SkipReason::MissingDate);
    }

    #[test]
    fn test_import_dir() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("notes");
        std::fs::create_dir_all(notes.join("feb")).unwrap();
        std::fs::write(notes.join("a.md"), "2026-02-01\npool day").unwrap();
        std::fs::write(notes.join("feb").join("b.markdown"), "02月02日\n拉伸").unwrap();
        std::fs::write(notes.join("c.md"), "no date").unwrap();
        std::fs::write(notes.join("d.txt"), "2026-02-03 ignored").unwrap();

        let store = RecordStore::open(&dir.path().join("logs")).unwrap();
        let report = importer().import_dir(&store, &notes).unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(
            store.get(parse_date("2026-02-02").unwrap()).unwrap().training_type,
            "拉伸"
        );

        // Second run: both dates are taken
        let again = importer().import_dir(&store, &notes).unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.skipped.len(), 3);
    }
}
