//! Streaming record reader over a MIND archive
//!
//! The archive is a zip holding `news.tsv` and `behaviors.tsv`. Rows are decoded
//! one at a time straight out of the compressed entry; nothing is buffered beyond
//! the current row. Each call to [`RecordReader::articles`] or
//! [`RecordReader::impressions`] re-opens the entry and starts from the top.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use chrono::NaiveDateTime;
use csv::StringRecord;
use zip::ZipArchive;

use crate::error::{IngestError, Result};
use crate::types::{ArticleRecord, EntityMention, ImpressionRecord, ImpressionToken};

pub const NEWS_ENTRY: &str = "news.tsv";
pub const BEHAVIORS_ENTRY: &str = "behaviors.tsv";

/// Timestamp format used by `behaviors.tsv`, e.g. `11/15/2019 8:55:22 AM`.
pub const IMPRESSION_TIME_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

type Rows<'a> = Box<dyn Iterator<Item = csv::Result<StringRecord>> + 'a>;

pub struct RecordReader<R> {
    archive: ZipArchive<R>,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> RecordReader<R> {
    pub fn new(source: R) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(source)?,
        })
    }

    /// Lazily decode every row of `news.tsv`.
    pub fn articles(&mut self) -> Result<Articles<'_>> {
        Ok(Articles {
            rows: self.rows(NEWS_ENTRY)?,
            row: 0,
        })
    }

    /// Lazily decode every row of `behaviors.tsv`.
    pub fn impressions(&mut self) -> Result<Impressions<'_>> {
        Ok(Impressions {
            rows: self.rows(BEHAVIORS_ENTRY)?,
            row: 0,
        })
    }

    fn rows(&mut self, file_name: &str) -> Result<Rows<'_>> {
        let name = self.entry_name(file_name)?;
        let entry = self.archive.by_name(&name)?;

        Ok(Box::new(
            csv::ReaderBuilder::new()
                .delimiter(b'\t')
                .quoting(false)
                .has_headers(false)
                .flexible(true)
                .from_reader(entry)
                .into_records(),
        ))
    }

    /// Entries are matched on their base name so nested layouts work too.
    fn entry_name(&self, file_name: &str) -> Result<String> {
        self.archive
            .file_names()
            .find(|name| name.rsplit('/').next() == Some(file_name))
            .map(str::to_string)
            .ok_or_else(|| IngestError::MissingEntry(file_name.to_string()))
    }
}

pub struct Articles<'a> {
    rows: Rows<'a>,
    row: u64,
}

impl Iterator for Articles<'_> {
    type Item = Result<ArticleRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.rows.next()?;
        self.row += 1;
        let row = self.row;
        Some(record.map_err(IngestError::from).and_then(|r| parse_article(&r, row)))
    }
}

pub struct Impressions<'a> {
    rows: Rows<'a>,
    row: u64,
}

impl Iterator for Impressions<'_> {
    type Item = Result<ImpressionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.rows.next()?;
        self.row += 1;
        let row = self.row;
        Some(record.map_err(IngestError::from).and_then(|r| parse_impression(&r, row)))
    }
}

fn required<'r>(
    record: &'r StringRecord,
    index: usize,
    field: &'static str,
    row: u64,
) -> Result<&'r str> {
    record.get(index).ok_or_else(|| IngestError::MalformedField {
        field,
        row,
        message: format!("row has only {} columns", record.len()),
    })
}

fn parse_article(record: &StringRecord, row: u64) -> Result<ArticleRecord> {
    Ok(ArticleRecord {
        id: required(record, 0, "id", row)?.to_string(),
        category: required(record, 1, "category", row)?.to_string(),
        subcategory: required(record, 2, "subcategory", row)?.to_string(),
        title: required(record, 3, "title", row)?.to_string(),
        abstract_text: required(record, 4, "abstract", row)?.to_string(),
        url: required(record, 5, "url", row)?.to_string(),
        title_entities: parse_entities(record.get(6))?,
        abstract_entities: parse_entities(record.get(7))?,
    })
}

/// A missing or blank column is an empty list; anything else must be a JSON array.
fn parse_entities(field: Option<&str>) -> Result<Vec<EntityMention>> {
    match field.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(json) => Ok(serde_json::from_str(json)?),
    }
}

fn parse_impression(record: &StringRecord, row: u64) -> Result<ImpressionRecord> {
    let raw_time = required(record, 2, "time", row)?;
    let time = NaiveDateTime::parse_from_str(raw_time.trim(), IMPRESSION_TIME_FORMAT).map_err(
        |e| IngestError::MalformedField {
            field: "time",
            row,
            message: format!("`{raw_time}`: {e}"),
        },
    )?;

    let impressions = tokens(record.get(4))
        .map(|token| {
            ImpressionToken::parse(token).map_err(|message| IngestError::MalformedField {
                field: "impressions",
                row,
                message,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ImpressionRecord {
        id: required(record, 0, "id", row)?.to_string(),
        user_id: required(record, 1, "user_id", row)?.to_string(),
        time,
        history: tokens(record.get(3)).map(str::to_string).collect(),
        impressions,
    })
}

fn tokens(field: Option<&str>) -> impl Iterator<Item = &str> {
    field.unwrap_or_default().split(' ').filter(|t| !t.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::ImpressionLabel;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    pub(crate) fn build_archive(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap()
    }

    const NEWS: &str = "N1\tnews\tpolitics\tA \"quoted\" title\tAbstract one\thttps://assets.msn.com/labs/mind/AA1.html\t[{\"Label\": \"Foo\", \"Type\": \"P\", \"WikidataId\": \"Q1\", \"Confidence\": 1.0, \"OccurrenceOffsets\": [0], \"SurfaceForms\": [\"Foo\", \"F.\"]}]\t[]\n\
N2\tsports\tfootball\tTitle two\t\thttps://assets.msn.com/labs/mind/AA2.html\t\t\n";

    const BEHAVIORS: &str = "1\tU1\t11/11/2019 9:05:58 AM\tN1 N2\tN1-1 N2-0\n\
2\tU2\t11/12/2019 1:15:00 PM\t\tN2-1\n\
3\tU3\t11/13/2019 12:00:00 AM\n";

    #[test]
    fn test_reads_every_article_row() {
        let mut reader =
            RecordReader::new(build_archive(&[(NEWS_ENTRY, NEWS), (BEHAVIORS_ENTRY, BEHAVIORS)]))
                .unwrap();

        let articles = reader.articles().unwrap().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.id, "N1");
        assert_eq!(first.category, "news");
        assert_eq!(first.subcategory, "politics");
        assert_eq!(first.title, "A \"quoted\" title");
        assert_eq!(first.title_entities.len(), 1);
        assert_eq!(first.title_entities[0].surface_forms, vec!["Foo", "F."]);
        assert!(first.abstract_entities.is_empty());

        let second = &articles[1];
        assert_eq!(second.abstract_text, "");
        assert!(second.title_entities.is_empty());
        assert!(second.abstract_entities.is_empty());
    }

    #[test]
    fn test_reads_every_impression_row() {
        let mut reader = RecordReader::new(build_archive(&[(BEHAVIORS_ENTRY, BEHAVIORS)])).unwrap();

        let impressions = reader
            .impressions()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(impressions.len(), 3);

        let first = &impressions[0];
        assert_eq!(first.user_id, "U1");
        assert_eq!(first.history, vec!["N1", "N2"]);
        assert_eq!(first.impressions.len(), 2);
        assert_eq!(first.impressions[1].article_id, "N2");
        assert_eq!(first.impressions[1].label, ImpressionLabel::Skipped);
        assert_eq!(first.time.to_string(), "2019-11-11 09:05:58");

        assert!(impressions[1].history.is_empty());
        assert_eq!(impressions[1].time.to_string(), "2019-11-12 13:15:00");

        // Missing trailing columns are empty lists, not errors
        assert!(impressions[2].history.is_empty());
        assert!(impressions[2].impressions.is_empty());
    }

    #[test]
    fn test_sequences_restart_on_reopen() {
        let mut reader = RecordReader::new(build_archive(&[(NEWS_ENTRY, NEWS)])).unwrap();

        assert_eq!(reader.articles().unwrap().count(), 2);
        assert_eq!(reader.articles().unwrap().count(), 2);
    }

    #[test]
    fn test_entries_found_in_subdirectories() {
        let mut reader =
            RecordReader::new(build_archive(&[("MINDsmall_train/news.tsv", NEWS)])).unwrap();
        assert_eq!(reader.articles().unwrap().count(), 2);
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let mut reader = RecordReader::new(build_archive(&[(NEWS_ENTRY, NEWS)])).unwrap();
        assert!(matches!(
            reader.impressions(),
            Err(IngestError::MissingEntry(name)) if name == BEHAVIORS_ENTRY
        ));
    }

    #[test]
    fn test_malformed_rows_fail_the_read() {
        let bad_json = "N1\tnews\tpolitics\tT\tA\thttps://x/N1.html\t[{broken\t[]\n";
        let mut reader = RecordReader::new(build_archive(&[(NEWS_ENTRY, bad_json)])).unwrap();
        let result = reader.articles().unwrap().collect::<Result<Vec<_>>>();
        assert!(matches!(result, Err(IngestError::Json(_))));

        let short_row = "N1\tnews\tpolitics\n";
        let mut reader = RecordReader::new(build_archive(&[(NEWS_ENTRY, short_row)])).unwrap();
        let result = reader.articles().unwrap().collect::<Result<Vec<_>>>();
        assert!(matches!(result, Err(IngestError::MalformedField { field: "title", row: 1, .. })));

        let bad_time = "1\tU1\tyesterday\tN1\tN1-1\n";
        let mut reader = RecordReader::new(build_archive(&[(BEHAVIORS_ENTRY, bad_time)])).unwrap();
        let result = reader.impressions().unwrap().collect::<Result<Vec<_>>>();
        assert!(matches!(result, Err(IngestError::MalformedField { field: "time", .. })));

        let bad_token = "1\tU1\t11/11/2019 9:05:58 AM\tN1\tN1-7\n";
        let mut reader = RecordReader::new(build_archive(&[(BEHAVIORS_ENTRY, bad_token)])).unwrap();
        let result = reader.impressions().unwrap().collect::<Result<Vec<_>>>();
        assert!(matches!(
            result,
            Err(IngestError::MalformedField { field: "impressions", .. })
        ));
    }
}
