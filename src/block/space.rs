use crate::block::BlockDofMap;
use crate::comm::Communicator;
use crate::error::BlockError;
use crate::la::MonolithicVector;
use crate::mesh::{MeshPartition, TriangleMesh};
use crate::restriction::Restriction;
use crate::space::FunctionSpace;
use log::debug;
use nalgebra::DVector;
use std::fmt;
use std::sync::Arc;

/// A sub-space paired with an optional restriction. `None` means the whole mesh.
pub type BlockComponent = (Arc<dyn FunctionSpace>, Option<Restriction>);

/// Ordered collection of (possibly restricted) sub-spaces on one shared mesh.
///
/// The rank-local view of the monolithic numbering is fixed at construction and exposed
/// through [`dofmap`](Self::dofmap).
#[derive(Clone)]
pub struct BlockFunctionSpace {
    mesh: Arc<TriangleMesh>,
    components: Vec<BlockComponent>,
    partition: MeshPartition,
    dofmap: BlockDofMap,
}

impl BlockFunctionSpace {
    /// Builds a single-rank block space.
    pub fn new(components: Vec<BlockComponent>) -> Result<Self, BlockError> {
        let mesh = common_mesh(&components)?;
        let partition = MeshPartition::serial(&mesh);
        Self::build(mesh, components, partition, 0)
    }

    /// Builds the view of rank `comm.rank()` of a block space distributed by `partition`.
    pub fn distributed<C: Communicator>(
        components: Vec<BlockComponent>,
        partition: &MeshPartition,
        comm: &C,
    ) -> Result<Self, BlockError> {
        let mesh = common_mesh(&components)?;
        if partition.num_ranks() != comm.size() {
            return Err(BlockError::DimensionMismatch {
                expected: comm.size(),
                actual: partition.num_ranks(),
            });
        }
        if partition.cell_owners().len() != mesh.num_cells() {
            return Err(BlockError::DimensionMismatch {
                expected: mesh.num_cells(),
                actual: partition.cell_owners().len(),
            });
        }
        Self::build(mesh, components, partition.clone(), comm.rank())
    }

    fn build(
        mesh: Arc<TriangleMesh>,
        components: Vec<BlockComponent>,
        partition: MeshPartition,
        rank: usize,
    ) -> Result<Self, BlockError> {
        let views: Vec<_> = components
            .iter()
            .map(|(space, restriction)| (space.as_ref(), restriction.as_ref()))
            .collect();
        let dofmap = BlockDofMap::build(&views, &partition, rank);
        debug!(
            "Built block space with {} components, dimension {} ({} owned, {} ghosts on rank {})",
            components.len(),
            dofmap.dim(),
            dofmap.owned_range().len(),
            dofmap.ghosts().len(),
            rank
        );
        Ok(Self {
            mesh,
            components,
            partition,
            dofmap,
        })
    }

    pub fn mesh(&self) -> &Arc<TriangleMesh> {
        &self.mesh
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// The unrestricted function space of a component.
    ///
    /// # Panics
    ///
    /// Panics if `component >= self.num_components()`. See [`Self::get`] for a checked variant.
    pub fn sub(&self, component: usize) -> &Arc<dyn FunctionSpace> {
        &self.components[component].0
    }

    /// The restriction of a component, or `None` if the component lives on the whole mesh.
    ///
    /// # Panics
    ///
    /// Panics if `component >= self.num_components()`. See [`Self::get`] for a checked variant.
    pub fn restriction(&self, component: usize) -> Option<&Restriction> {
        self.components[component].1.as_ref()
    }

    /// Function space and restriction of a component, or `None` if there is no such component.
    pub fn get(&self, component: usize) -> Option<(&Arc<dyn FunctionSpace>, Option<&Restriction>)> {
        self.components
            .get(component)
            .map(|(space, restriction)| (space, restriction.as_ref()))
    }

    pub fn components(&self) -> &[BlockComponent] {
        &self.components
    }

    pub fn partition(&self) -> &MeshPartition {
        &self.partition
    }

    pub fn rank(&self) -> usize {
        self.dofmap.rank()
    }

    /// Total number of active DOFs.
    pub fn dim(&self) -> usize {
        self.dofmap.dim()
    }

    pub fn dofmap(&self) -> &BlockDofMap {
        &self.dofmap
    }

    /// Splits a monolithic vector into one vector per component over the full sub-space
    /// numbering. Inactive entries, and entries this rank holds no value for, are zero.
    pub fn extract_block_function(&self, vector: &MonolithicVector) -> Result<Vec<DVector<f64>>, BlockError> {
        if vector.dim() != self.dim() {
            return Err(BlockError::DimensionMismatch {
                expected: self.dim(),
                actual: vector.dim(),
            });
        }
        let mut parts: Vec<_> = (0..self.num_components())
            .map(|component| DVector::zeros(self.dofmap.num_dofs(component)))
            .collect();
        let local_indices = vector
            .owned_range()
            .chain(vector.ghost_indices().iter().copied());
        for global in local_indices {
            if let (Some((component, dof)), Some(value)) = (self.dofmap.block_index(global), vector.get(global)) {
                parts[component][dof] = value;
            }
        }
        Ok(parts)
    }

    /// Inverse of [`extract_block_function`](Self::extract_block_function): gathers the active
    /// entries of the component vectors into the owned and ghost entries of a monolithic
    /// vector.
    pub fn merge_block_function(&self, parts: &[DVector<f64>]) -> Result<MonolithicVector, BlockError> {
        if parts.len() != self.num_components() {
            return Err(BlockError::DimensionMismatch {
                expected: self.num_components(),
                actual: parts.len(),
            });
        }
        for (component, part) in parts.iter().enumerate() {
            if part.len() != self.dofmap.num_dofs(component) {
                return Err(BlockError::DimensionMismatch {
                    expected: self.dofmap.num_dofs(component),
                    actual: part.len(),
                });
            }
        }

        let mut vector = MonolithicVector::zeros(&self.dofmap);
        let owned_range = vector.owned_range();
        for (local, global) in owned_range.enumerate() {
            if let Some((component, dof)) = self.dofmap.block_index(global) {
                vector.owned_values_mut()[local] = parts[component][dof];
            }
        }
        let ghost_values: Vec<_> = vector
            .ghost_indices()
            .iter()
            .map(|&global| {
                self.dofmap
                    .block_index(global)
                    .map_or(0.0, |(component, dof)| parts[component][dof])
            })
            .collect();
        vector.set_ghost_values(&ghost_values);
        Ok(vector)
    }

    /// A block space made of a subset of the components, in the given order.
    ///
    /// When `with_restrictions` is false the extracted components are unrestricted.
    pub fn extract_block_sub_space(&self, components: &[usize], with_restrictions: bool) -> Result<Self, BlockError> {
        if components.is_empty() {
            return Err(BlockError::EmptyBlockSpace);
        }
        let extracted = components
            .iter()
            .map(|&component| {
                let (space, restriction) = self.components.get(component).ok_or_else(|| {
                    BlockError::UnassembledCoupling(format!(
                        "cannot extract component {component} from a block space with {} components",
                        self.num_components()
                    ))
                })?;
                let restriction = if with_restrictions { restriction.clone() } else { None };
                Ok((Arc::clone(space), restriction))
            })
            .collect::<Result<Vec<_>, BlockError>>()?;
        Self::build(Arc::clone(&self.mesh), extracted, self.partition.clone(), self.rank())
    }
}

/// Checks that all sub-spaces and restrictions live on the mesh of the first sub-space.
fn common_mesh(components: &[BlockComponent]) -> Result<Arc<TriangleMesh>, BlockError> {
    let (first_space, _) = components.first().ok_or(BlockError::EmptyBlockSpace)?;
    let mesh = Arc::clone(first_space.mesh());
    for (component, (space, restriction)) in components.iter().enumerate() {
        if !Arc::ptr_eq(space.mesh(), &mesh) {
            return Err(BlockError::InconsistentMesh(format!(
                "sub-space {component} is defined on a different mesh than sub-space 0"
            )));
        }
        if let Some(restriction) = restriction {
            if !Arc::ptr_eq(restriction.mesh(), &mesh) {
                return Err(BlockError::InconsistentMesh(format!(
                    "restriction of component {component} is defined on a different mesh"
                )));
            }
        }
    }
    Ok(mesh)
}

impl PartialEq for BlockFunctionSpace {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mesh, &other.mesh)
            && self.partition == other.partition
            && self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|((space_a, restriction_a), (space_b, restriction_b))| {
                    (Arc::ptr_eq(space_a, space_b)
                        || (space_a.element_name() == space_b.element_name()
                            && space_a.num_dofs() == space_b.num_dofs()))
                        && restriction_a == restriction_b
                })
    }
}

impl fmt::Debug for BlockFunctionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components: Vec<_> = self
            .components
            .iter()
            .map(|(space, restriction)| (space.element_name().to_string(), restriction.clone()))
            .collect();
        f.debug_struct("BlockFunctionSpace")
            .field("components", &components)
            .field("dim", &self.dim())
            .field("rank", &self.rank())
            .finish()
    }
}
