use regex::{Regex, RegexBuilder};

use livetail_types::{ArcLogRecord, FilterState, LevelFilter, LogRecord};

/// Compiled view filter over buffered records
///
/// Level and search predicates compose with AND. The filter holds no state
/// derived from any buffer, so applying it is a pure function of its input.
#[derive(Clone)]
pub struct LogFilter {
    /// Level predicate
    level: LevelFilter,

    /// Original search text
    search: String,

    /// Case-insensitive literal matcher (None = empty search)
    matcher: Option<Regex>,
}

impl LogFilter {
    /// Compile a filter from the viewer's filter state
    pub fn new(state: &FilterState) -> Result<Self, regex::Error> {
        Self::from_parts(state.level, &state.search)
    }

    /// Compile a filter from a level selection and search text
    pub fn from_parts(level: LevelFilter, search: &str) -> Result<Self, regex::Error> {
        let matcher = if search.is_empty() {
            None
        } else {
            // Escaped so the query is a plain substring, never a pattern
            Some(
                RegexBuilder::new(&regex::escape(search))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            level,
            search: search.to_string(),
            matcher,
        })
    }

    /// A filter that matches every record
    pub fn everything() -> Self {
        Self {
            level: LevelFilter::All,
            search: String::new(),
            matcher: None,
        }
    }

    /// Check if a record matches this filter
    pub fn matches(&self, record: &LogRecord) -> bool {
        if !self.level.matches(record.level) {
            return false;
        }

        match &self.matcher {
            Some(re) => re.is_match(&record.message) || re.is_match(&record.source),
            None => true,
        }
    }

    /// Matching records, in input order
    pub fn apply(&self, records: &[ArcLogRecord]) -> Vec<ArcLogRecord> {
        if self.is_empty() {
            return records.to_vec();
        }
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    /// Find all match positions in a string (for highlighting)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.matcher {
            Some(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => Vec::new(),
        }
    }

    /// Get the original search text
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Get the level predicate
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Check if filter is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.matcher.is_none() && self.level == LevelFilter::All
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        Self::everything()
    }
}

impl std::fmt::Debug for LogFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFilter")
            .field("level", &self.level)
            .field("search", &self.search)
            .finish()
    }
}
