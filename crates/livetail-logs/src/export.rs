use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local};

use livetail_types::ArcLogRecord;

/// On-disk format for exported views
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// `<ts> [LVL] source | message`, one record per line
    #[default]
    Text,
    /// One JSON record per line
    JsonLines,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "log",
            Self::JsonLines => "jsonl",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::JsonLines => f.write_str("jsonl"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "log" => Ok(Self::Text),
            "jsonl" | "json" => Ok(Self::JsonLines),
            other => Err(format!("unknown export format '{}' (expected text or jsonl)", other)),
        }
    }
}

/// File name for an export of `channel` taken at `now`
pub fn export_file_name(channel: &str, now: DateTime<Local>, format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        channel,
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Write records to `writer`, returning how many were written
pub fn write_records<W: Write>(
    writer: &mut W,
    records: &[ArcLogRecord],
    format: ExportFormat,
) -> io::Result<usize> {
    for record in records {
        match format {
            ExportFormat::Text => {
                writeln!(
                    writer,
                    "{} [{}] {} | {}",
                    record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                    record.level.as_str(),
                    record.source,
                    record.message
                )?;
            }
            ExportFormat::JsonLines => {
                serde_json::to_writer(&mut *writer, &**record)?;
                writer.write_all(b"\n")?;
            }
        }
    }
    writer.flush()?;
    Ok(records.len())
}

/// Export records to a new file at `path`
pub fn export_to_file(
    path: &Path,
    records: &[ArcLogRecord],
    format: ExportFormat,
) -> io::Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_records(&mut writer, records, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use livetail_types::{LogLevel, LogRecord};
    use std::sync::Arc;

    fn records() -> Vec<ArcLogRecord> {
        let ts = chrono::DateTime::from_timestamp_millis(1_705_314_600_123).unwrap();
        vec![
            Arc::new(LogRecord::new("1", ts, LogLevel::Error, "auth", "login failed")),
            Arc::new(LogRecord::new("2", ts, LogLevel::Info, "api", "ok")),
        ]
    }

    #[test]
    fn test_text_format() {
        let mut out = Vec::new();
        let count = write_records(&mut out, &records(), ExportFormat::Text).unwrap();
        assert_eq!(count, 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "2024-01-15T10:30:00.123Z [ERR] auth | login failed"
        );
    }

    #[test]
    fn test_jsonl_format_is_decodable() {
        let mut out = Vec::new();
        write_records(&mut out, &records(), ExportFormat::JsonLines).unwrap();
        let text = String::from_utf8(out).unwrap();
        let decoded: Vec<LogRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].message, "login failed");
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let count = export_to_file(&path, &records(), ExportFormat::Text).unwrap();
        assert_eq!(count, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_file_name_and_parse() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            export_file_name("games", now, ExportFormat::JsonLines),
            "games_20240309_070501.jsonl"
        );
        assert_eq!(
            export_file_name("auth", now, ExportFormat::Text),
            "auth_20240309_070501.log"
        );
        assert_eq!("jsonl".parse::<ExportFormat>(), Ok(ExportFormat::JsonLines));
        assert!("csv".parse::<ExportFormat>().is_err());
    }
}
