//! Parser for MovieLens ratings files.
//!
//! Two layouts are understood:
//! - `ratings.dat` (MovieLens 1M): `userId::movieId::rating::timestamp`
//! - `ratings.csv` (ml-latest and friends): header line, then
//!   `userId,movieId,rating,timestamp`
//!
//! The layout is chosen from the file extension. Every record is range
//! checked; a bad line aborts the load with its file and line number.

use crate::error::{DataLoadError, Result};
use crate::types::{RatingRecord, MAX_RATING, MIN_RATING};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Field layout of a ratings file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingsFormat {
    /// `::`-separated, no header
    Dat,
    /// comma-separated with a header row
    Csv,
}

impl RatingsFormat {
    /// Pick the layout from a path's extension (`.csv` or anything else)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => RatingsFormat::Csv,
            _ => RatingsFormat::Dat,
        }
    }

    fn separator(self) -> &'static str {
        match self {
            RatingsFormat::Dat => "::",
            RatingsFormat::Csv => ",",
        }
    }
}

/// Read a file with ISO-8859-1 encoding (Latin-1)
///
/// The MovieLens 1M dataset uses ISO-8859-1, not UTF-8. Each byte maps
/// directly to a Unicode code point, so the conversion cannot fail.
fn read_lines_latin1(path: &Path) -> Result<Vec<String>> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let content: String = bytes.iter().map(|&b| b as char).collect();

    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Parse a ratings file, detecting the layout from its extension
pub fn parse_ratings(path: &Path) -> Result<Vec<RatingRecord>> {
    parse_ratings_with_format(path, RatingsFormat::from_path(path))
}

/// Parse a ratings file with an explicit layout
pub fn parse_ratings_with_format(path: &Path, format: RatingsFormat) -> Result<Vec<RatingRecord>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let lines = read_lines_latin1(path)?;
    parse_rating_lines(&lines, format, &file_name)
}

/// Parse already-read lines. Split out from file reading so tests don't need files.
pub(crate) fn parse_rating_lines(
    lines: &[String],
    format: RatingsFormat,
    file: &str,
) -> Result<Vec<RatingRecord>> {
    let mut ratings = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }
        if format == RatingsFormat::Csv && idx == 0 && line_trimmed.starts_with("userId") {
            continue; // header
        }

        let parts: Vec<&str> = line_trimmed.split(format.separator()).collect();
        if parts.len() != 4 {
            return Err(DataLoadError::FieldCountMismatch {
                expected: 4,
                found: parts.len(),
                line: line_no,
            });
        }

        let rating = RatingRecord {
            user_id: parse_field(parts[0], "userId", file, line_no)?,
            movie_id: parse_field(parts[1], "movieId", file, line_no)?,
            rating: parse_field(parts[2], "rating", file, line_no)?,
            timestamp: parse_field(parts[3], "timestamp", file, line_no)?,
        };

        if !rating.is_valid() {
            return Err(DataLoadError::InvalidValue {
                field: format!("rating (expected {MIN_RATING}..={MAX_RATING})"),
                value: parts[2].to_string(),
                line: line_no,
            });
        }

        ratings.push(rating);
    }

    Ok(ratings)
}

fn parse_field<T>(raw: &str, name: &str, file: &str, line: usize) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Invalid {}: {}", name, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &str) -> Vec<String> {
        raw.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_dat_lines() {
        let input = lines("1::1193::5::978300760\n1::661::3::978302109\n\n");
        let ratings = parse_rating_lines(&input, RatingsFormat::Dat, "ratings.dat").unwrap();

        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0], RatingRecord::new(1, 1193, 5.0, 978300760));
        assert_eq!(ratings[1].movie_id, 661);
    }

    #[test]
    fn test_parse_csv_with_header() {
        let input = lines("userId,movieId,rating,timestamp\n1,1,4.0,964982703\n1,3,3.5,964981247");
        let ratings = parse_rating_lines(&input, RatingsFormat::Csv, "ratings.csv").unwrap();

        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[1].rating, 3.5);
    }

    #[test]
    fn test_out_of_range_rating_rejected() {
        let input = lines("1::2::7::100");
        let err = parse_rating_lines(&input, RatingsFormat::Dat, "ratings.dat").unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidValue { line: 1, .. }));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let input = lines("1::2::4::100\nx::2::4::100");
        let err = parse_rating_lines(&input, RatingsFormat::Dat, "ratings.dat").unwrap_err();
        match err {
            DataLoadError::ParseError { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("userId"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_field_count_mismatch() {
        let input = lines("1,2,3.0");
        let err = parse_rating_lines(&input, RatingsFormat::Csv, "ratings.csv").unwrap_err();
        assert!(matches!(err, DataLoadError::FieldCountMismatch { found: 3, .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(RatingsFormat::from_path(Path::new("a/ratings.csv")), RatingsFormat::Csv);
        assert_eq!(RatingsFormat::from_path(Path::new("a/ratings.dat")), RatingsFormat::Dat);
    }
}
