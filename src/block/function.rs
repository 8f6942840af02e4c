use crate::block::BlockFunctionSpace;
use crate::comm::Communicator;
use crate::error::BlockError;
use crate::la::MonolithicVector;
use nalgebra::DVector;
use std::sync::Arc;

/// A function in a block space: one vector per component over the full sub-space numbering,
/// together with the monolithic vector those component vectors are copies of.
///
/// Inactive entries of the component vectors are zero. A block function starts out unsolved and
/// becomes solved through [`block_solve`](crate::block::block_solve).
#[derive(Debug, Clone)]
pub struct BlockFunction {
    space: Arc<BlockFunctionSpace>,
    components: Vec<DVector<f64>>,
    vector: MonolithicVector,
    solved: bool,
}

impl BlockFunction {
    /// The zero function.
    pub fn new(space: &Arc<BlockFunctionSpace>) -> Self {
        let components = (0..space.num_components())
            .map(|component| DVector::zeros(space.dofmap().num_dofs(component)))
            .collect();
        Self {
            space: Arc::clone(space),
            components,
            vector: MonolithicVector::zeros(space.dofmap()),
            solved: false,
        }
    }

    /// A function with the given component values. Values at inactive DOFs are discarded.
    pub fn from_components(space: &Arc<BlockFunctionSpace>, components: &[DVector<f64>]) -> Result<Self, BlockError> {
        let vector = space.merge_block_function(components)?;
        let components = space.extract_block_function(&vector)?;
        Ok(Self {
            space: Arc::clone(space),
            components,
            vector,
            solved: false,
        })
    }

    pub fn space(&self) -> &Arc<BlockFunctionSpace> {
        &self.space
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// The component vectors, in component order.
    pub fn split(&self) -> &[DVector<f64>] {
        &self.components
    }

    /// # Panics
    ///
    /// Panics if `component` is not a component of the block space.
    pub fn component(&self, component: usize) -> &DVector<f64> {
        &self.components[component]
    }

    pub fn get_component(&self, component: usize) -> Option<&DVector<f64>> {
        self.components.get(component)
    }

    pub fn vector(&self) -> &MonolithicVector {
        &self.vector
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// Stores the owned part of a full monolithic solution, refreshes ghosts and splits the
    /// result into components. Collective.
    pub(crate) fn assign_solution<C: Communicator>(&mut self, solution: &DVector<f64>, comm: &C) -> Result<(), BlockError> {
        if solution.len() != self.vector.dim() {
            return Err(BlockError::DimensionMismatch {
                expected: self.vector.dim(),
                actual: solution.len(),
            });
        }
        let range = self.vector.owned_range();
        let mut vector = MonolithicVector::zeros(self.space.dofmap());
        vector
            .owned_values_mut()
            .copy_from(&solution.rows(range.start, range.len()));
        vector.update_ghosts(comm);

        self.components = self.space.extract_block_function(&vector)?;
        self.vector = vector;
        self.solved = true;
        Ok(())
    }
}
