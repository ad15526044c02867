//! Parser for Tesseract's TSV output.

use tracing::trace;

use super::{BoundingBox, Token};
use crate::error::OcrError;

const COLUMNS: [&str; 12] = [
    "level", "page_num", "block_num", "par_num", "line_num", "word_num", "left", "top", "width",
    "height", "conf", "text",
];

const LEFT: usize = 6;
const CONF: usize = 10;
const TEXT: usize = 11;

/// Parse TSV output into one token per row, preserving empty rows.
///
/// Negative confidence (structural rows) maps to `None`. Completely empty
/// output yields no tokens.
pub fn parse_tsv(output: &str) -> Result<Vec<Token>, OcrError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(output.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| OcrError::MalformedOutput(e.to_string()))?;
    let header: Vec<&str> = headers.iter().map(str::trim).collect();
    if header != COLUMNS {
        return Err(OcrError::MalformedOutput(format!(
            "unexpected TSV header: {}",
            header.join(" ")
        )));
    }

    let mut tokens = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| OcrError::MalformedOutput(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        // Structural rows may omit the trailing empty text column.
        if record.len() < TEXT {
            return Err(OcrError::MalformedOutput(format!(
                "line {}: expected {} columns, found {}",
                line,
                COLUMNS.len(),
                record.len()
            )));
        }

        let number = |index: usize| -> Result<f64, OcrError> {
            let field = record.get(index).unwrap_or_default().trim();
            field.parse::<f64>().map_err(|_| {
                OcrError::MalformedOutput(format!(
                    "line {}: {} is not a number: {:?}",
                    line, COLUMNS[index], field
                ))
            })
        };

        let [left, top, width, height] = [
            number(LEFT)?,
            number(LEFT + 1)?,
            number(LEFT + 2)?,
            number(LEFT + 3)?,
        ]
        .map(|v| v.max(0.0) as u32);
        let conf = number(CONF)?;

        let text = record.get(TEXT).unwrap_or_default();
        trace!("row {}: {:?} (conf {})", line, text, conf);

        tokens.push(Token {
            text: text.to_string(),
            bbox: Some(BoundingBox {
                left,
                top,
                width,
                height,
            }),
            confidence: (conf >= 0.0).then_some(conf as f32),
        });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn sample() -> String {
        [
            HEADER,
            "1\t1\t0\t0\t0\t0\t0\t0\t2500\t3500\t-1\t",
            "4\t1\t1\t1\t1\t0\t120\t300\t800\t60\t-1\t",
            "5\t1\t1\t1\t1\t1\t120\t300\t200\t60\t96.06\tTotal",
            "5\t1\t1\t1\t1\t2\t340\t300\t150\t60\t91.5\tCHF",
            "5\t1\t1\t1\t1\t3\t520\t300\t240\t60\t88\t120.50",
        ]
        .join("\n")
            + "\n"
    }

    #[test]
    fn test_rows_kept_in_order_including_empty() {
        let tokens = parse_tsv(&sample()).unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["", "", "Total", "CHF", "120.50"]);
    }

    #[test]
    fn test_positions_and_confidence() {
        let tokens = parse_tsv(&sample()).unwrap();

        assert_eq!(tokens[0].confidence, None);
        assert_eq!(tokens[3].confidence, Some(91.5));
        assert_eq!(
            tokens[3].bbox,
            Some(BoundingBox {
                left: 340,
                top: 300,
                width: 150,
                height: 60
            })
        );
    }

    #[test]
    fn test_structural_row_without_text_column() {
        let output = format!("{HEADER}\n2\t1\t1\t0\t0\t0\t0\t0\t10\t10\t-1\n");
        let tokens = parse_tsv(&output).unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_empty());
    }

    #[test]
    fn test_quotes_are_literal() {
        let output = format!("{HEADER}\n5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\t\"Discount\n");
        let tokens = parse_tsv(&output).unwrap();
        assert_eq!(tokens[0].text, "\"Discount");
    }

    #[test]
    fn test_crlf_output() {
        let output = format!("{HEADER}\r\n5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\tDiscount\r\n");
        let tokens = parse_tsv(&output).unwrap();
        assert_eq!(tokens[0].text, "Discount");
    }

    #[test]
    fn test_empty_output_is_empty_result() {
        assert!(parse_tsv("").unwrap().is_empty());
        assert!(parse_tsv(&format!("{HEADER}\n")).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_header_is_malformed() {
        let err = parse_tsv("Total CHF 120.50\n").unwrap_err();
        assert!(matches!(err, OcrError::MalformedOutput(_)));
    }

    #[test]
    fn test_short_row_is_malformed() {
        let output = format!("{HEADER}\n5\t1\t1\n");
        let err = parse_tsv(&output).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_non_numeric_position_is_malformed() {
        let output = format!("{HEADER}\n5\t1\t1\t1\t1\t1\tleft\t0\t10\t10\t90\tx\n");
        assert!(matches!(
            parse_tsv(&output),
            Err(OcrError::MalformedOutput(_))
        ));
    }
}
