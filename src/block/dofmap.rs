use crate::mesh::MeshPartition;
use crate::restriction::Restriction;
use crate::space::FunctionSpace;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Status of a (component, DOF) slot of the DOF table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DofStatus {
    /// The slot is past the dimension of the component's sub-space.
    Absent,
    /// The DOF takes part in the monolithic system.
    Active,
    /// The DOF exists in the sub-space but lies outside the component's restriction.
    Inactive,
}

/// Bijection between active (component, DOF) pairs and monolithic indices.
///
/// Monolithic indices are ordered by owning rank, then by component, then by ascending
/// sub-space DOF. The table is a deterministic function of the mesh, the partition and the
/// restrictions, so every rank builds an identical map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDofMap {
    num_components: usize,
    width: usize,
    num_dofs: Vec<usize>,
    status: Vec<DofStatus>,
    global: Vec<Option<usize>>,
    block_of: Vec<(usize, usize)>,
    ownership_ranges: Vec<Range<usize>>,
    rank: usize,
    ghosts: Vec<usize>,
}

impl BlockDofMap {
    pub(crate) fn build(
        components: &[(&dyn FunctionSpace, Option<&Restriction>)],
        partition: &MeshPartition,
        rank: usize,
    ) -> Self {
        let num_components = components.len();
        let num_dofs: Vec<_> = components.iter().map(|(space, _)| space.num_dofs()).collect();
        let width = num_dofs.iter().copied().max().unwrap_or(0);
        let slot = |component: usize, dof: usize| component * width + dof;

        let mut status = vec![DofStatus::Absent; num_components * width];
        for (component, (space, restriction)) in components.iter().enumerate() {
            for dof in 0..space.num_dofs() {
                let (kind, entity) = space.dof_entity(dof);
                let active = restriction.map_or(true, |r| r.contains(kind, entity));
                status[slot(component, dof)] = if active {
                    DofStatus::Active
                } else {
                    DofStatus::Inactive
                };
            }
        }

        // Each DOF is owned by the lowest rank owning a cell that contains it
        let num_ranks = partition.num_ranks().max(1);
        let mut owner = vec![usize::MAX; num_components * width];
        for (component, (space, _)) in components.iter().enumerate() {
            for cell in 0..space.mesh().num_cells() {
                let cell_owner = partition.cell_owner(cell);
                for &dof in space.cell_dofs(cell) {
                    let o = &mut owner[slot(component, dof)];
                    *o = (*o).min(cell_owner);
                }
            }
        }
        for o in &mut owner {
            if *o == usize::MAX {
                *o = 0;
            }
        }

        let mut global = vec![None; num_components * width];
        let mut block_of = Vec::new();
        let mut ownership_ranges = Vec::with_capacity(num_ranks);
        for r in 0..num_ranks {
            let start = block_of.len();
            for component in 0..num_components {
                for dof in 0..num_dofs[component] {
                    let s = slot(component, dof);
                    if status[s] == DofStatus::Active && owner[s] == r {
                        global[s] = Some(block_of.len());
                        block_of.push((component, dof));
                    }
                }
            }
            ownership_ranges.push(start..block_of.len());
        }

        let mut ghosts = Vec::new();
        for (component, (space, _)) in components.iter().enumerate() {
            for cell in 0..space.mesh().num_cells() {
                if partition.cell_owner(cell) != rank {
                    continue;
                }
                for &dof in space.cell_dofs(cell) {
                    let s = slot(component, dof);
                    if let Some(index) = global[s] {
                        if owner[s] != rank {
                            ghosts.push(index);
                        }
                    }
                }
            }
        }
        ghosts.sort_unstable();
        ghosts.dedup();

        Self {
            num_components,
            width,
            num_dofs,
            status,
            global,
            block_of,
            ownership_ranges,
            rank,
            ghosts,
        }
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Number of slots per component in the DOF table (the largest sub-space dimension).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Dimension of the sub-space of a component.
    pub fn num_dofs(&self, component: usize) -> usize {
        self.num_dofs[component]
    }

    /// Total number of active DOFs over all components and ranks.
    pub fn dim(&self) -> usize {
        self.block_of.len()
    }

    pub fn status(&self, component: usize, dof: usize) -> DofStatus {
        if component < self.num_components && dof < self.width {
            self.status[component * self.width + dof]
        } else {
            DofStatus::Absent
        }
    }

    pub fn is_active(&self, component: usize, dof: usize) -> bool {
        self.status(component, dof) == DofStatus::Active
    }

    /// Monolithic index of an active DOF.
    pub fn global_index(&self, component: usize, dof: usize) -> Option<usize> {
        if component < self.num_components && dof < self.width {
            self.global[component * self.width + dof]
        } else {
            None
        }
    }

    /// The (component, sub-space DOF) pair of a monolithic index.
    pub fn block_index(&self, global: usize) -> Option<(usize, usize)> {
        self.block_of.get(global).copied()
    }

    /// Active DOFs of a component in ascending order.
    pub fn active_dofs(&self, component: usize) -> impl '_ + Iterator<Item = usize> {
        let num_dofs = self.num_dofs.get(component).copied().unwrap_or(0);
        (0..num_dofs).filter(move |&dof| self.is_active(component, dof))
    }

    pub fn num_active(&self, component: usize) -> usize {
        self.active_dofs(component).count()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Monolithic indices owned by each rank.
    pub fn ownership_ranges(&self) -> &[Range<usize>] {
        &self.ownership_ranges
    }

    pub fn owned_range(&self) -> Range<usize> {
        self.ownership_ranges
            .get(self.rank)
            .cloned()
            .unwrap_or(0..0)
    }

    pub fn is_owned(&self, global: usize) -> bool {
        self.owned_range().contains(&global)
    }

    /// Sorted monolithic indices owned by other ranks but touched by cells of this rank.
    pub fn ghosts(&self) -> &[usize] {
        &self.ghosts
    }

    /// Whether this rank holds a value (owned or ghost) for a monolithic index.
    pub fn is_local(&self, global: usize) -> bool {
        self.is_owned(global) || self.ghosts.binary_search(&global).is_ok()
    }
}
