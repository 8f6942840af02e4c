use crate::block::BlockFunctionSpace;
use crate::error::BlockError;
use crate::la::{MonolithicMatrix, MonolithicVector};
use log::debug;
use nalgebra::{DVector, Point2};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// Prescribed value of a Dirichlet condition.
#[derive(Clone)]
pub enum DirichletValue {
    Constant(f64),
    /// Evaluated at the coordinates of each constrained DOF.
    Function(Arc<dyn Fn(&Point2<f64>) -> f64 + Send + Sync>),
    /// One value per sub-space DOF, e.g. an interpolated function.
    Values(DVector<f64>),
}

impl DirichletValue {
    pub fn function(f: impl Fn(&Point2<f64>) -> f64 + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }
}

impl fmt::Debug for DirichletValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Function(_) => f.debug_tuple("Function").finish_non_exhaustive(),
            Self::Values(values) => f.debug_tuple("Values").field(&values.len()).finish(),
        }
    }
}

/// Elementary Dirichlet condition on the DOFs of a set of facets.
///
/// The component it constrains is given by the row of the [`BlockDirichletBC`] it is placed in.
#[derive(Debug, Clone)]
pub struct DirichletBC {
    facets: Vec<usize>,
    value: DirichletValue,
}

impl DirichletBC {
    pub fn new(facets: impl IntoIterator<Item = usize>, value: DirichletValue) -> Self {
        Self {
            facets: facets.into_iter().collect(),
            value,
        }
    }

    pub fn facets(&self) -> &[usize] {
        &self.facets
    }

    pub fn value(&self) -> &DirichletValue {
        &self.value
    }
}

/// Dirichlet conditions of a block system, one list per block row.
#[derive(Debug, Clone, Default)]
pub struct BlockDirichletBC {
    rows: Vec<Vec<DirichletBC>>,
}

impl BlockDirichletBC {
    pub fn new(rows: Vec<Vec<DirichletBC>>) -> Self {
        Self { rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// The conditions of the given rows, renumbered to the order of `components`.
    pub fn extract_block(&self, components: &[usize]) -> Self {
        let rows = components
            .iter()
            .map(|&component| self.rows.get(component).cloned().unwrap_or_default())
            .collect();
        Self { rows }
    }

    /// Resolves all conditions to (monolithic index, value) pairs.
    ///
    /// Every named facet must exist and carry at least one active DOF of its component. When
    /// several conditions constrain the same DOF, the last one wins.
    pub fn constrained_dofs(&self, space: &BlockFunctionSpace) -> Result<BTreeMap<usize, f64>, BlockError> {
        if self.rows.len() > space.num_components() {
            return Err(BlockError::UnassembledCoupling(format!(
                "boundary conditions given for {} rows, but the block space has {} components",
                self.rows.len(),
                space.num_components()
            )));
        }

        let mesh = space.mesh();
        let dofmap = space.dofmap();
        let mut constraints = BTreeMap::new();
        for (component, bcs) in self.rows.iter().enumerate() {
            let sub_space = space.sub(component);
            for bc in bcs {
                if let DirichletValue::Values(values) = &bc.value {
                    if values.len() != sub_space.num_dofs() {
                        return Err(BlockError::DimensionMismatch {
                            expected: sub_space.num_dofs(),
                            actual: values.len(),
                        });
                    }
                }
                for &facet in &bc.facets {
                    if facet >= mesh.num_facets() {
                        return Err(BlockError::DofOutsideMesh(format!(
                            "facet {facet} does not exist (mesh has {} facets)",
                            mesh.num_facets()
                        )));
                    }
                    let mut num_active = 0;
                    for &dof in sub_space.facet_dofs(facet) {
                        let Some(global) = dofmap.global_index(component, dof) else {
                            continue;
                        };
                        let value = match &bc.value {
                            DirichletValue::Constant(value) => *value,
                            DirichletValue::Function(f) => f(&sub_space.dof_coordinates(dof)),
                            DirichletValue::Values(values) => values[dof],
                        };
                        constraints.insert(global, value);
                        num_active += 1;
                    }
                    if num_active == 0 {
                        return Err(BlockError::DofOutsideMesh(format!(
                            "facet {facet} carries no active DOF of component {component}"
                        )));
                    }
                }
            }
        }
        Ok(constraints)
    }

    /// Imposes the conditions on an assembled system by elimination with lifting.
    ///
    /// For every constrained DOF `c` with value `g`: row `c` becomes the identity row with
    /// right-hand side `g` (the diagonal entry is added to the sparsity pattern if missing), and
    /// every other owned row `k` gets `b_k -= A_kc * g` before `A_kc` is set to zero. The result
    /// is symmetric whenever the input was.
    pub fn apply(
        &self,
        matrix: &mut MonolithicMatrix,
        rhs: &mut MonolithicVector,
        space: &BlockFunctionSpace,
    ) -> Result<(), BlockError> {
        let constraints = self.constrained_dofs(space)?;
        if matrix.row_range() != rhs.owned_range() || matrix.ncols() != rhs.dim() {
            return Err(BlockError::DimensionMismatch {
                expected: matrix.ncols(),
                actual: rhs.dim(),
            });
        }
        debug!("Applying {} Dirichlet constraints", constraints.len());

        let row_range = matrix.row_range();
        let missing_diagonal: Vec<usize> = constraints
            .keys()
            .copied()
            .filter(|&row| row_range.contains(&row) && matrix.get(row, row).is_none())
            .collect();
        if !missing_diagonal.is_empty() {
            let csr = with_explicit_diagonal(matrix.csr(), row_range.start, &missing_diagonal);
            matrix.replace_csr(csr);
        }

        let offset = row_range.start;
        let rhs_values = rhs.owned_values_mut();
        for (local_row, mut row) in matrix.csr_mut().row_iter_mut().enumerate() {
            let global_row = local_row + offset;
            let (cols, values) = row.cols_and_values_mut();
            if let Some(&g) = constraints.get(&global_row) {
                for (&col, value) in cols.iter().zip(values.iter_mut()) {
                    *value = if col == global_row { 1.0 } else { 0.0 };
                }
                rhs_values[local_row] = g;
            } else {
                for (&col, value) in cols.iter().zip(values.iter_mut()) {
                    if let Some(&g) = constraints.get(&col) {
                        rhs_values[local_row] -= *value * g;
                        *value = 0.0;
                    }
                }
            }
        }
        Ok(())
    }

    /// Sets the constrained entries of a right-hand side to their prescribed values, leaving
    /// all other entries untouched.
    pub fn apply_to_vector(&self, rhs: &mut MonolithicVector, space: &BlockFunctionSpace) -> Result<(), BlockError> {
        let constraints = self.constrained_dofs(space)?;
        set_owned(rhs, &constraints, |_, g| g);
        Ok(())
    }

    /// Sets the constrained entries of a residual to `x - g`, where `x` is the current iterate.
    ///
    /// Together with identity rows in the Jacobian, this drives a Newton update towards the
    /// prescribed values.
    pub fn apply_to_residual(
        &self,
        residual: &mut MonolithicVector,
        x: &MonolithicVector,
        space: &BlockFunctionSpace,
    ) -> Result<(), BlockError> {
        if residual.owned_range() != x.owned_range() {
            return Err(BlockError::DimensionMismatch {
                expected: residual.owned_range().len(),
                actual: x.owned_range().len(),
            });
        }
        let constraints = self.constrained_dofs(space)?;
        set_owned(residual, &constraints, |global, g| x.get(global).unwrap_or(0.0) - g);
        Ok(())
    }
}

impl Index<usize> for BlockDirichletBC {
    type Output = [DirichletBC];

    fn index(&self, row: usize) -> &Self::Output {
        &self.rows[row]
    }
}

fn set_owned(vector: &mut MonolithicVector, constraints: &BTreeMap<usize, f64>, value: impl Fn(usize, f64) -> f64) {
    let range = vector.owned_range();
    let offset = range.start;
    let owned = vector.owned_values_mut();
    for (&global, &g) in constraints.range(range) {
        owned[global - offset] = value(global, g);
    }
}

/// Copy of `csr` (local rows starting at global row `offset`) with explicit zero diagonal
/// entries added for the given global rows.
fn with_explicit_diagonal(csr: &CsrMatrix<f64>, offset: usize, rows: &[usize]) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(csr.nrows(), csr.ncols());
    for (i, j, &v) in csr.triplet_iter() {
        coo.push(i, j, v);
    }
    for &row in rows {
        coo.push(row - offset, row, 0.0);
    }
    CsrMatrix::from(&coo)
}
