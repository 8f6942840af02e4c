//! Strategies for property-based testing.
use crate::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use crate::mesh::{MeshPartition, TriangleMesh};
use crate::restriction::Restriction;
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use std::sync::Arc;

/// Unit square meshes with 1 to `max_cells_per_dim` squares per side.
pub fn unit_square_mesh(max_cells_per_dim: usize) -> impl Strategy<Value = Arc<TriangleMesh>> {
    (1..=max_cells_per_dim.max(1)).prop_map(|n| Arc::new(create_unit_square_uniform_tri_mesh_2d(n)))
}

/// Restrictions to an arbitrary (possibly empty) subset of the cells of `mesh`.
pub fn cell_restriction(mesh: Arc<TriangleMesh>) -> impl Strategy<Value = Restriction> {
    vec(any::<bool>(), mesh.num_cells()).prop_map(move |selected| {
        let cells = selected.iter().enumerate().filter(|&(_, &s)| s).map(|(c, _)| c);
        Restriction::from_cells(&mesh, cells).expect("Selected cells are in bounds")
    })
}

/// Restrictions to an arbitrary subset of the boundary facets of `mesh`.
pub fn boundary_facet_restriction(mesh: Arc<TriangleMesh>) -> impl Strategy<Value = Restriction> {
    let boundary = mesh.boundary_facets();
    vec(any::<bool>(), boundary.len()).prop_map(move |selected| {
        let facets = boundary
            .iter()
            .zip(&selected)
            .filter(|&(_, &s)| s)
            .map(|(&f, _)| f);
        Restriction::from_facets(&mesh, facets).expect("Boundary facets are in bounds")
    })
}

/// Partitions of `mesh` over exactly `num_ranks` ranks, each rank owning at least one cell.
///
/// Requires `mesh` to have at least `num_ranks` cells.
pub fn partition(mesh: Arc<TriangleMesh>, num_ranks: usize) -> impl Strategy<Value = MeshPartition> {
    let num_cells = mesh.num_cells();
    vec(0..num_ranks.max(1), num_cells).prop_map(move |mut owners| {
        // Ensure that no rank is left without cells
        for (rank, owner) in owners.iter_mut().take(num_ranks).enumerate() {
            *owner = rank;
        }
        MeshPartition::from_cell_owners(&mesh, owners, num_ranks.max(1)).expect("Owners are valid ranks")
    })
}
