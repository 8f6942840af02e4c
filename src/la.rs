//! Distributed monolithic containers.
//!
//! Each rank stores the rows of the monolithic system it owns (a contiguous range of global
//! indices) plus, for vectors, read-only copies of the ghost entries its local cells touch.
//! Contributions to rows owned by other ranks are stashed during assembly and exchanged in a
//! collective `finalize`.
use crate::block::BlockDofMap;
use crate::comm::Communicator;
use itertools::izip;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::ops::Range;

/// Accumulates (row, column, value) contributions into the owned rows of a monolithic matrix.
#[derive(Debug, Clone)]
pub struct MonolithicMatrixBuilder {
    row_range: Range<usize>,
    ncols: usize,
    owned: CooMatrix<f64>,
    stash: Vec<(usize, usize, f64)>,
}

impl MonolithicMatrixBuilder {
    pub fn new(dofmap: &BlockDofMap) -> Self {
        let row_range = dofmap.owned_range();
        Self {
            owned: CooMatrix::new(row_range.len(), dofmap.dim()),
            ncols: dofmap.dim(),
            row_range,
            stash: Vec::new(),
        }
    }

    /// Adds `value` to entry `(row, col)`. Explicit zeros become part of the sparsity pattern.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if self.row_range.contains(&row) {
            self.owned.push(row - self.row_range.start, col, value);
        } else {
            self.stash.push((row, col, value));
        }
    }

    /// Exchanges stashed off-rank contributions and compresses the owned rows. Collective.
    pub fn finalize<C: Communicator>(self, comm: &C) -> MonolithicMatrix {
        let Self {
            row_range,
            ncols,
            mut owned,
            stash,
        } = self;
        for contributions in comm.all_gather(stash) {
            for (row, col, value) in contributions {
                if row_range.contains(&row) {
                    owned.push(row - row_range.start, col, value);
                }
            }
        }
        MonolithicMatrix {
            csr: CsrMatrix::from(&owned),
            row_range,
            ncols,
        }
    }
}

/// The owned rows of a square monolithic matrix, with global column indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MonolithicMatrix {
    row_range: Range<usize>,
    ncols: usize,
    csr: CsrMatrix<f64>,
}

impl MonolithicMatrix {
    /// Range of global rows stored on this rank.
    pub fn row_range(&self) -> Range<usize> {
        self.row_range.clone()
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Local rows (offset by `row_range().start`) of the owned block.
    pub fn csr(&self) -> &CsrMatrix<f64> {
        &self.csr
    }

    pub fn csr_mut(&mut self) -> &mut CsrMatrix<f64> {
        &mut self.csr
    }

    pub(crate) fn replace_csr(&mut self, csr: CsrMatrix<f64>) {
        self.csr = csr;
    }

    /// Entry at global position `(row, col)`, or `None` if the row is not owned or the entry is
    /// not part of the sparsity pattern.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if !self.row_range.contains(&row) || col >= self.ncols {
            return None;
        }
        self.csr
            .get_entry(row - self.row_range.start, col)
            .and_then(|entry| match entry {
                nalgebra_sparse::SparseEntry::NonZero(value) => Some(*value),
                nalgebra_sparse::SparseEntry::Zero => None,
            })
    }

    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    /// Assembles the full matrix on every rank. Collective.
    pub fn gather<C: Communicator>(&self, comm: &C) -> CsrMatrix<f64> {
        let offset = self.row_range.start;
        let local: Vec<_> = self
            .csr
            .triplet_iter()
            .map(|(i, j, &v)| (i + offset, j, v))
            .collect();
        let mut coo = CooMatrix::new(self.ncols, self.ncols);
        for (i, j, v) in comm.all_gather(local).into_iter().flatten() {
            coo.push(i, j, v);
        }
        CsrMatrix::from(&coo)
    }
}

/// The owned entries and ghost copies of a monolithic vector.
#[derive(Debug, Clone, PartialEq)]
pub struct MonolithicVector {
    dim: usize,
    owned_range: Range<usize>,
    owned: DVector<f64>,
    ghost_indices: Vec<usize>,
    ghost_values: DVector<f64>,
    stash: Vec<(usize, f64)>,
}

impl MonolithicVector {
    pub fn zeros(dofmap: &BlockDofMap) -> Self {
        let owned_range = dofmap.owned_range();
        let ghost_indices = dofmap.ghosts().to_vec();
        Self {
            dim: dofmap.dim(),
            owned: DVector::zeros(owned_range.len()),
            ghost_values: DVector::zeros(ghost_indices.len()),
            owned_range,
            ghost_indices,
            stash: Vec::new(),
        }
    }

    /// Global dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn owned_range(&self) -> Range<usize> {
        self.owned_range.clone()
    }

    pub fn owned_values(&self) -> &DVector<f64> {
        &self.owned
    }

    pub fn owned_values_mut(&mut self) -> &mut DVector<f64> {
        &mut self.owned
    }

    /// Sorted global indices of the ghost entries.
    pub fn ghost_indices(&self) -> &[usize] {
        &self.ghost_indices
    }

    pub fn ghost_values(&self) -> &DVector<f64> {
        &self.ghost_values
    }

    pub(crate) fn set_ghost_values(&mut self, values: &[f64]) {
        self.ghost_values.copy_from_slice(values);
    }

    /// Adds `value` to a global entry. Contributions to entries owned elsewhere are stashed
    /// until [`finalize`](Self::finalize).
    pub fn add(&mut self, index: usize, value: f64) {
        if self.owned_range.contains(&index) {
            self.owned[index - self.owned_range.start] += value;
        } else {
            self.stash.push((index, value));
        }
    }

    /// Value of an owned or ghost entry.
    pub fn get(&self, index: usize) -> Option<f64> {
        if self.owned_range.contains(&index) {
            Some(self.owned[index - self.owned_range.start])
        } else {
            self.ghost_indices
                .binary_search(&index)
                .ok()
                .map(|position| self.ghost_values[position])
        }
    }

    /// Exchanges stashed contributions, then refreshes ghost values. Collective.
    pub fn finalize<C: Communicator>(&mut self, comm: &C) {
        let stash = std::mem::take(&mut self.stash);
        for contributions in comm.all_gather(stash) {
            for (index, value) in contributions {
                if self.owned_range.contains(&index) {
                    self.owned[index - self.owned_range.start] += value;
                }
            }
        }
        self.update_ghosts(comm);
    }

    /// Copies the current owner values into the ghost entries. Collective.
    pub fn update_ghosts<C: Communicator>(&mut self, comm: &C) {
        let full = self.gather(comm);
        for (index, ghost_value) in izip!(&self.ghost_indices, self.ghost_values.iter_mut()) {
            *ghost_value = full[*index];
        }
    }

    /// Assembles the full vector from the owned parts of all ranks. Collective.
    pub fn gather<C: Communicator>(&self, comm: &C) -> DVector<f64> {
        let local = (self.owned_range.start, self.owned.as_slice().to_vec());
        let mut full = DVector::zeros(self.dim);
        for (start, values) in comm.all_gather(vec![local]).into_iter().flatten() {
            full.rows_mut(start, values.len()).copy_from_slice(&values);
        }
        full
    }
}
