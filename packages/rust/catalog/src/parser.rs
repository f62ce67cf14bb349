//! Catalog CSV parser.
//!
//! Parses the delimited catalog index into [`CatalogItem`]s. The format
//! is classic CSV: comma-separated, double-quoted fields may contain
//! commas, newlines, and doubled-quote escapes. Header names vary
//! between catalog snapshots, so resolution is whitespace- and
//! case-insensitive with aliases for the popularity column.

use insightforge_shared::{CatalogItem, InsightForgeError, Result};

/// Accepted header names for the id column.
const ID_COLUMNS: &[&str] = &["text#", "id"];

/// Accepted header names for the popularity column.
const POPULARITY_COLUMNS: &[&str] = &["downloads", "download_count", "popularity"];

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

/// Column indexes resolved from the header row.
#[derive(Debug)]
struct Columns {
    id: usize,
    title: usize,
    author: Option<usize>,
    subjects: Option<usize>,
    /// `None` when no popularity column exists: ranking degrades to
    /// catalog file order.
    popularity: Option<usize>,
}

impl Columns {
    fn resolve(header: &[String]) -> Result<Self> {
        let normalized: Vec<String> = header
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();

        let find = |names: &[&str]| {
            normalized
                .iter()
                .position(|h| names.contains(&h.as_str()))
        };

        let id = find(ID_COLUMNS).ok_or_else(|| {
            InsightForgeError::parse("catalog header has no id column (expected Text# or id)")
        })?;
        let title = find(&["title"])
            .ok_or_else(|| InsightForgeError::parse("catalog header has no title column"))?;

        Ok(Self {
            id,
            title,
            author: find(&["authors", "author"]),
            subjects: find(&["subjects", "subject"]),
            popularity: find(POPULARITY_COLUMNS),
        })
    }
}

// ---------------------------------------------------------------------------
// CSV record reader
// ---------------------------------------------------------------------------

/// Split CSV content into records of fields.
///
/// Handles quoted fields with embedded commas/newlines and `""` escape
/// sequences; tolerates CRLF line endings and a trailing newline.
fn read_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => {
                record.push(std::mem::take(&mut field));
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    // Final record without trailing newline
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

// ---------------------------------------------------------------------------
// Catalog parsing
// ---------------------------------------------------------------------------

/// Parse the raw catalog text into items in file order.
///
/// Rows with a blank id are skipped; missing/blank/unparsable
/// popularity cells count as zero. Ranks are not assigned here; the
/// caller ranks after deciding whether a popularity column exists.
pub(crate) fn parse_catalog(content: &str) -> Result<(Vec<CatalogItem>, bool)> {
    let mut records = read_records(content).into_iter();

    let header = records
        .next()
        .ok_or_else(|| InsightForgeError::parse("catalog is empty"))?;
    let columns = Columns::resolve(&header)?;

    let cell = |record: &[String], idx: usize| -> String {
        record.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
    };

    let mut items = Vec::new();
    for record in records {
        let id = cell(&record, columns.id);
        if id.is_empty() {
            continue;
        }

        let popularity = columns
            .popularity
            .map(|idx| cell(&record, idx).parse::<u64>().unwrap_or(0))
            .unwrap_or(0);

        items.push(CatalogItem {
            id,
            title: cell(&record, columns.title),
            author: columns.author.map(|idx| cell(&record, idx)).unwrap_or_default(),
            subjects: columns
                .subjects
                .map(|idx| cell(&record, idx))
                .unwrap_or_default(),
            popularity,
            rank: 0,
        });
    }

    Ok((items, columns.popularity.is_some()))
}
