use crate::solver::matrix::builder::MatrixBuilder;
use crate::solver::matrix::csc::CscMatrix;
use crate::solver::matrix::error::{MatrixError, MatrixMarketError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MmField {
    Integer,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MmSymmetry {
    General,
    Symmetric,
}

/// Load a sparse matrix from a MatrixMarket `.mtx` file (coordinate format) into a canonical CSC.
///
/// Supports:
/// - banner: `%%MatrixMarket matrix coordinate {integer|real} {general|symmetric}`
/// - 1-based indices in the file, converted to 0-based indices internally.
///
/// `symmetric` files hold one triangle; the result stores it as the upper
/// triangle, which is the layout the KKT assembler expects for `P`.
/// Explicit zeros are kept.
pub fn load_matrix_market_csc_file(path: impl AsRef<Path>) -> Result<CscMatrix, MatrixError> {
    let f = File::open(path.as_ref()).map_err(MatrixMarketError::from)?;
    load_matrix_market_csc_from_reader(BufReader::new(f))
}

/// Same as [`load_matrix_market_csc_file`], but reads from any buffered reader (useful for tests).
pub fn load_matrix_market_csc_from_reader<R: BufRead>(reader: R) -> Result<CscMatrix, MatrixError> {
    let mut lines = reader.lines().enumerate();

    // Header (first non-empty line)
    let (header_line_no, header) = loop {
        match lines.next() {
            None => return Err(MatrixMarketError::InvalidBanner("empty input".to_string()).into()),
            Some((i, line)) => {
                let line = line.map_err(MatrixMarketError::from)?;
                // tolerate BOM
                let t = line.trim().trim_start_matches('\u{feff}');
                if t.is_empty() {
                    continue;
                }
                break (i + 1, t.to_string());
            }
        }
    };

    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.len() != 5 {
        return Err(MatrixMarketError::InvalidBanner(format!(
            "expected 5 tokens, got {} at line {}: {:?}",
            tokens.len(),
            header_line_no,
            header
        ))
        .into());
    }
    if tokens[0] != "%%MatrixMarket" {
        return Err(MatrixMarketError::InvalidBanner(format!(
            "missing %%MatrixMarket at line {}: {}",
            header_line_no, header
        ))
        .into());
    }

    let object = tokens[1].to_ascii_lowercase();
    let format = tokens[2].to_ascii_lowercase();
    if object != "matrix" || format != "coordinate" {
        return Err(MatrixMarketError::UnsupportedType(format!(
            "only 'matrix coordinate' is supported, got '{}' '{}' (line {})",
            tokens[1], tokens[2], header_line_no
        ))
        .into());
    }

    let field = match tokens[3].to_ascii_lowercase().as_str() {
        "integer" => MmField::Integer,
        "real" => MmField::Real,
        _ => {
            return Err(MatrixMarketError::UnsupportedType(format!(
                "only 'integer' and 'real' fields are supported, got '{}' (line {})",
                tokens[3], header_line_no
            ))
            .into());
        }
    };
    let symmetry = match tokens[4].to_ascii_lowercase().as_str() {
        "general" => MmSymmetry::General,
        "symmetric" => MmSymmetry::Symmetric,
        _ => {
            return Err(MatrixMarketError::UnsupportedType(format!(
                "only 'general' and 'symmetric' are supported, got '{}' (line {})",
                tokens[4], header_line_no
            ))
            .into());
        }
    };

    // Size line (skip comments/empty)
    let (size_line_no, size_line) = loop {
        match lines.next() {
            None => {
                return Err(
                    MatrixMarketError::InvalidSizeLine("missing size line".to_string()).into(),
                );
            }
            Some((i, line)) => {
                let line = line.map_err(MatrixMarketError::from)?;
                let t = line.trim();
                if t.is_empty() || t.starts_with('%') {
                    continue;
                }
                break (i + 1, t.to_string());
            }
        }
    };

    let parts: Vec<&str> = size_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(MatrixMarketError::InvalidSizeLine(format!(
            "expected 3 integers at line {}: {}",
            size_line_no, size_line
        ))
        .into());
    }
    let parse_size = |token: &str, what: &str| {
        token.parse::<usize>().map_err(|e| {
            MatrixMarketError::InvalidSizeLine(format!(
                "bad {what} '{token}' at line {size_line_no}: {e}"
            ))
        })
    };
    let nrows = parse_size(parts[0], "nrows")?;
    let ncols = parse_size(parts[1], "ncols")?;
    let nnz = parse_size(parts[2], "nnz")?;

    if symmetry == MmSymmetry::Symmetric && nrows != ncols {
        return Err(MatrixMarketError::InvalidSizeLine(format!(
            "symmetric matrix must be square, got {nrows} x {ncols}"
        ))
        .into());
    }

    // the built matrix needs ncols + 1 column pointers
    let pointers = ncols.checked_add(1).ok_or_else(|| {
        MatrixMarketError::InvalidSizeLine(format!(
            "ncols {ncols} at line {size_line_no} is too large"
        ))
    })?;
    Vec::<usize>::new()
        .try_reserve_exact(pointers)
        .map_err(|e| {
            MatrixMarketError::InvalidSizeLine(format!(
                "cannot allocate {pointers} column pointers for line {size_line_no}: {e}"
            ))
        })?;

    let mut b = MatrixBuilder::new(nrows, ncols);
    // the header is untrusted, grow past this as entries arrive
    b.reserve(nnz.min(1 << 20));

    let mut read_entries = 0usize;
    for (i, line) in lines {
        let line_no = i + 1;
        let line = line.map_err(MatrixMarketError::from)?;
        let t = line.trim();
        if t.is_empty() || t.starts_with('%') {
            continue;
        }
        if read_entries >= nnz {
            return Err(MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: format!("found more than nnz={} entries", nnz),
            }
            .into());
        }

        let parts: Vec<&str> = t.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: format!("expected 3 tokens 'row col val', got: {}", t),
            }
            .into());
        }

        let parse_index = |token: &str| -> Result<usize, MatrixMarketError> {
            let index = token
                .parse::<usize>()
                .map_err(|e| MatrixMarketError::InvalidEntry {
                    line: line_no,
                    msg: format!("bad index '{}': {}", token, e),
                })?;
            index.checked_sub(1).ok_or(MatrixMarketError::InvalidEntry {
                line: line_no,
                msg: "MatrixMarket indices are 1-based; found 0".to_string(),
            })
        };
        let row = parse_index(parts[0])?;
        let col = parse_index(parts[1])?;

        let val = match field {
            MmField::Integer => {
                parts[2]
                    .parse::<i64>()
                    .map_err(|e| MatrixMarketError::InvalidEntry {
                        line: line_no,
                        msg: format!("bad integer value '{}': {}", parts[2], e),
                    })? as f64
            }
            MmField::Real => parts[2]
                .parse::<f64>()
                .map_err(|e| MatrixMarketError::InvalidEntry {
                    line: line_no,
                    msg: format!("bad real value '{}': {}", parts[2], e),
                })?,
        };

        // MatrixBuilder expects (column, row, value)
        match symmetry {
            MmSymmetry::General => b.push(col, row, val)?,
            MmSymmetry::Symmetric => b.push(row.max(col), row.min(col), val)?,
        };
        read_entries += 1;
    }

    if read_entries != nnz {
        return Err(MatrixMarketError::EntryCountMismatch {
            expected: nnz,
            actual: read_entries,
        }
        .into());
    }

    Ok(b.build_csc()?)
}
