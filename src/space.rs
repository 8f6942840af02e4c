//! Scalar finite element spaces on a [`TriangleMesh`].
use crate::mesh::{EntityKind, TriangleMesh};
use nalgebra::{DVector, Point2};
use std::fmt::Debug;
use std::sync::Arc;

/// A scalar finite element space defined on the whole of a mesh.
///
/// Every DOF is attached to exactly one mesh entity; a restriction keeps a DOF whenever it
/// contains that entity.
pub trait FunctionSpace: Debug + Send + Sync {
    fn mesh(&self) -> &Arc<TriangleMesh>;

    fn num_dofs(&self) -> usize;

    /// DOFs of a cell, in the order expected by element tensors on that cell.
    fn cell_dofs(&self, cell: usize) -> &[usize];

    /// DOFs on the closure of a facet, in the order expected by element tensors on that facet.
    fn facet_dofs(&self, facet: usize) -> &[usize];

    /// The entity a DOF is attached to.
    fn dof_entity(&self, dof: usize) -> (EntityKind, usize);

    fn dof_coordinates(&self, dof: usize) -> Point2<f64>;

    /// Short identifier of the element family and degree, e.g. `"P1"`.
    fn element_name(&self) -> &str;
}

/// Piecewise linear continuous Lagrange space: one DOF per mesh vertex.
#[derive(Debug, Clone)]
pub struct LagrangeP1Space {
    mesh: Arc<TriangleMesh>,
}

impl LagrangeP1Space {
    pub fn new(mesh: Arc<TriangleMesh>) -> Self {
        Self { mesh }
    }
}

impl FunctionSpace for LagrangeP1Space {
    fn mesh(&self) -> &Arc<TriangleMesh> {
        &self.mesh
    }

    fn num_dofs(&self) -> usize {
        self.mesh.num_vertices()
    }

    fn cell_dofs(&self, cell: usize) -> &[usize] {
        &self.mesh.cells()[cell].0
    }

    fn facet_dofs(&self, facet: usize) -> &[usize] {
        &self.mesh.facets()[facet].0
    }

    fn dof_entity(&self, dof: usize) -> (EntityKind, usize) {
        (EntityKind::Vertex, dof)
    }

    fn dof_coordinates(&self, dof: usize) -> Point2<f64> {
        self.mesh.vertices()[dof]
    }

    fn element_name(&self) -> &str {
        "P1"
    }
}

/// Nodal interpolation of `f` into `space`.
pub fn interpolate(space: &dyn FunctionSpace, f: impl Fn(&Point2<f64>) -> f64) -> DVector<f64> {
    DVector::from_fn(space.num_dofs(), |dof, _| f(&space.dof_coordinates(dof)))
}
