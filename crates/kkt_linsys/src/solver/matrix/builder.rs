use crate::solver::matrix::Dim;
use crate::solver::matrix::csc::CscMatrix;
use crate::solver::matrix::error::CscError;

#[derive(Debug, Clone, Copy)]
struct Triplet {
    column: usize,
    row: usize,
    value: f64,
}

/// Maps the index returned by [`MatrixBuilder::push`] to the position of that
/// entry in the nonzero array of the built matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMapping(Vec<usize>);

impl EntryMapping {
    pub fn get(&self, entry: usize) -> usize {
        self.0[entry]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Positions for a contiguous run of pushed entries.
    pub fn range(&self, start: usize, len: usize) -> &[usize] {
        &self.0[start..start + len]
    }
}

/// Builder from triplets (COO → canonical CSC).
///
/// Duplicates are summed into one slot and explicit zeros are kept, so a
/// pattern can be reserved now and stamped later.
///
/// Usage:
///   let mut b = MatrixBuilder::new(nrows, ncols);
///   let e = b.push(column, row, value)?;
///   let (a, mapping) = b.build_csc_with_mapping();
///   a.values[mapping.get(e)] // where the entry landed
#[derive(Debug)]
pub struct MatrixBuilder {
    dim: Dim,
    /// COO entries in insertion order.
    entries: Vec<Triplet>,
}

impl MatrixBuilder {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            dim: Dim { nrows, ncols },
            entries: Vec::new(),
        }
    }

    pub fn reserve(&mut self, nnz: usize) {
        self.entries.reserve(nnz);
    }

    /// Number of entries pushed so far (duplicates counted separately).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// push a COO (column, row, value) tuple, returns the entry index
    pub fn push(&mut self, column: usize, row: usize, value: f64) -> Result<usize, CscError> {
        if column >= self.dim.ncols {
            return Err(CscError::OutOfBoundsIndex {
                index: column,
                max: self.dim.ncols,
            });
        }
        if row >= self.dim.nrows {
            return Err(CscError::OutOfBoundsIndex {
                index: row,
                max: self.dim.nrows,
            });
        }
        self.entries.push(Triplet { column, row, value });
        Ok(self.entries.len() - 1)
    }

    pub fn build_csc(self) -> Result<CscMatrix, CscError> {
        Ok(self.build_csc_with_mapping().0)
    }

    pub fn build_csc_with_mapping(self) -> (CscMatrix, EntryMapping) {
        let n = self.dim.ncols;
        let entries = self.entries;

        // stable sort of entry indices by (col,row)
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by_key(|&e| (entries[e].column, entries[e].row));

        let mut column_pointers = vec![0usize; n + 1];
        let mut row_indices = Vec::with_capacity(entries.len());
        let mut values: Vec<f64> = Vec::with_capacity(entries.len());
        let mut mapping = vec![0usize; entries.len()];

        let mut last = None;
        for e in order {
            let Triplet { column, row, value } = entries[e];
            if last == Some((column, row)) {
                // duplicate, accumulate into the slot we just opened
                let slot = values.len() - 1;
                values[slot] += value;
                mapping[e] = slot;
            } else {
                column_pointers[column + 1] += 1;
                mapping[e] = values.len();
                row_indices.push(row);
                values.push(value);
                last = Some((column, row));
            }
        }

        for j in 0..n {
            column_pointers[j + 1] += column_pointers[j];
        }

        let a = CscMatrix {
            dim: self.dim,
            column_pointers,
            row_indices,
            values,
        };
        debug_assert!(a.check_invariants().is_ok());
        (a, EntryMapping(mapping))
    }
}
