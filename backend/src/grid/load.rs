//! Delimited-file loading with encoding and delimiter auto-detection.
//!
//! Turns CSV/TSV bytes into a [`Grid`]. No header row is assumed: usage
//! reports routinely carry titles, notes and several tables in one sheet, so
//! every line becomes a grid row as-is.

use std::path::Path;

use super::{Cell, Grid};
use crate::error::{GridError, GridResult};

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> GridResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    let (decoded, had_errors) = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => return Ok(s),
            Err(_) => (String::from_utf8_lossy(bytes).to_string(), true),
        },
        "iso-8859-1" | "latin-1" | "latin1" => {
            let (text, _, errors) = encoding_rs::ISO_8859_15.decode(bytes);
            (text.to_string(), errors)
        }
        "windows-1252" | "cp1252" => {
            let (text, _, errors) = encoding_rs::WINDOWS_1252.decode(bytes);
            (text.to_string(), errors)
        }
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => {
                let (text, _, errors) = enc.decode(bytes);
                (text.to_string(), errors)
            }
            None => (String::from_utf8_lossy(bytes).to_string(), true),
        },
    };

    if had_errors && decoded.trim().is_empty() {
        return Err(GridError::Encoding(format!("nothing decodable as {}", encoding)));
    }
    Ok(decoded)
}

/// Detect the delimiter by checking which candidate splits the first lines
/// most consistently.
pub fn detect_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b';', b',', b'\t', b'|'];
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in candidates {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| line.bytes().filter(|&b| b == delim).count())
            .collect();
        let Some(&max) = counts.iter().max() else {
            continue;
        };
        if max == 0 {
            continue;
        }
        let consistent = counts.iter().filter(|&&c| c == max).count();
        let score = consistent * max;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Parse delimited text into a grid.
pub fn parse_str(content: &str, delimiter: u8) -> GridResult<Grid> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from_text).collect::<Vec<_>>());
    }

    let grid = Grid::new(rows).trim_trailing_blank_rows();
    if grid.is_empty() {
        return Err(GridError::Empty);
    }
    Ok(grid)
}

/// Load a grid from raw bytes with auto-detection of encoding and delimiter.
pub fn load_bytes(bytes: &[u8]) -> GridResult<Grid> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    parse_str(&content, delimiter)
}

/// Load a grid from a file with auto-detection of encoding and delimiter.
pub fn load_path<P: AsRef<Path>>(path: P) -> GridResult<Grid> {
    let bytes = std::fs::read(path.as_ref())?;
    load_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Coord;

    #[test]
    fn test_semicolon_grid() {
        let grid = parse_str("Report;;\n;Jan-21;Feb-21\nViews;4;5\n", b';').unwrap();
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.get(Coord::new(1, 2)), Some(&Cell::Text("Feb-21".into())));
        assert_eq!(grid.get(Coord::new(0, 1)), Some(&Cell::Blank));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter("a\tb\n1\t2"), b'\t');
        assert_eq!(detect_delimiter("title only"), b',');
    }

    #[test]
    fn test_quoted_fields_keep_delimiters() {
        let grid = parse_str("\"Smith, J.\",3\n", b',').unwrap();
        assert_eq!(grid.get(Coord::new(0, 0)), Some(&Cell::Text("Smith, J.".into())));
    }

    #[test]
    fn test_empty_content() {
        assert!(matches!(parse_str("\n\n", b','), Err(GridError::Empty)));
    }

    #[test]
    fn test_latin1_bytes() {
        let bytes = b"Caf\xe9;1\n";
        let content = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(content.starts_with("Café"));
    }

    #[test]
    fn test_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "Metric,Jan-21\nViews,12\n").unwrap();
        let grid = load_path(&path).unwrap();
        assert_eq!(grid.get(Coord::new(1, 1)), Some(&Cell::Text("12".into())));
    }
}
