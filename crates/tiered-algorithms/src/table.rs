//! Numeric tables consumed by the algorithm front-ends

use tiered_core::{Error, KernelFloat, Result};

/// Dense `rows × cols` table stored column by column
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTable<F> {
    rows: usize,
    cols: usize,
    data: Vec<F>,
}

impl<F: KernelFloat> DenseTable<F> {
    /// Wrap column-major data
    pub fn new(rows: usize, cols: usize, data: Vec<F>) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::InvalidInput(format!("{rows} x {cols} table is too large")))?;
        if data.len() != expected {
            return Err(Error::size_mismatch(expected, data.len(), "DenseTable::new"));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from observations given row by row
    pub fn from_rows(rows: &[Vec<F>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = vec![F::zero(); rows.len() * cols];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::size_mismatch(cols, row.len(), "DenseTable::from_rows"));
            }
            for (j, &value) in row.iter().enumerate() {
                data[j * rows.len() + i] = value;
            }
        }
        Self::new(rows.len(), cols, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn column(&self, j: usize) -> &[F] {
        &self.data[j * self.rows..(j + 1) * self.rows]
    }

    pub fn columns(&self) -> impl Iterator<Item = &[F]> + '_ {
        (0..self.cols).map(move |j| self.column(j))
    }

    pub fn get(&self, i: usize, j: usize) -> F {
        self.data[j * self.rows + i]
    }

    /// Column-major storage
    pub fn as_slice(&self) -> &[F] {
        &self.data
    }

    /// Split into at most `parts` row blocks of near-equal size
    pub fn split_rows(&self, parts: usize) -> Vec<DenseTable<F>> {
        let parts = parts.clamp(1, self.rows.max(1));
        let base = self.rows / parts;
        let extra = self.rows % parts;

        let mut blocks = Vec::with_capacity(parts);
        let mut start = 0;
        for part in 0..parts {
            let len = base + usize::from(part < extra);
            let data = self
                .columns()
                .flat_map(|column| column[start..start + len].iter().copied())
                .collect();
            blocks.push(DenseTable {
                rows: len,
                cols: self.cols,
                data,
            });
            start += len;
        }
        blocks
    }
}

/// Sparse table in compressed sparse row form, 0-based indices
#[derive(Debug, Clone, PartialEq)]
pub struct CsrTable<F> {
    rows: usize,
    cols: usize,
    values: Vec<F>,
    col_indices: Vec<usize>,
    row_offsets: Vec<usize>,
}

impl<F: KernelFloat> CsrTable<F> {
    pub fn new(
        rows: usize,
        cols: usize,
        values: Vec<F>,
        col_indices: Vec<usize>,
        row_offsets: Vec<usize>,
    ) -> Result<Self> {
        let offsets = rows
            .checked_add(1)
            .ok_or_else(|| Error::InvalidInput(format!("CSR table cannot have {rows} rows")))?;
        if row_offsets.len() != offsets {
            return Err(Error::size_mismatch(offsets, row_offsets.len(), "CSR row offsets"));
        }
        if values.len() != col_indices.len() {
            return Err(Error::size_mismatch(values.len(), col_indices.len(), "CSR column indices"));
        }
        if row_offsets[0] != 0 || row_offsets[rows] != values.len() {
            return Err(Error::InvalidInput(format!(
                "CSR row offsets must span 0..{}, got {}..{}",
                values.len(),
                row_offsets[0],
                row_offsets[rows]
            )));
        }
        if row_offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidInput("CSR row offsets must be non-decreasing".to_string()));
        }
        if let Some(&bad) = col_indices.iter().find(|&&c| c >= cols) {
            return Err(Error::InvalidInput(format!(
                "CSR column index {bad} out of range for {cols} columns"
            )));
        }
        Ok(Self {
            rows,
            cols,
            values,
            col_indices,
            row_offsets,
        })
    }

    /// Keep the non-zero entries of a dense table
    pub fn from_dense(table: &DenseTable<F>) -> Self {
        let mut values = Vec::new();
        let mut col_indices = Vec::new();
        let mut row_offsets = Vec::with_capacity(table.rows() + 1);
        row_offsets.push(0);
        for i in 0..table.rows() {
            for j in 0..table.cols() {
                let value = table.get(i, j);
                if value != F::zero() {
                    values.push(value);
                    col_indices.push(j);
                }
            }
            row_offsets.push(values.len());
        }
        Self {
            rows: table.rows(),
            cols: table.cols(),
            values,
            col_indices,
            row_offsets,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of row `i`
    pub fn row(&self, i: usize) -> (&[usize], &[F]) {
        let range = self.row_offsets[i]..self.row_offsets[i + 1];
        (&self.col_indices[range.clone()], &self.values[range])
    }
}
