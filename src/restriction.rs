//! Subsets of mesh entities that a block component is restricted to.
use crate::error::BlockError;
use crate::mesh::{EntityKind, TriangleMesh};
use nalgebra::Point2;
use std::fmt;
use std::sync::Arc;

/// A set of cells, facets and vertices of a mesh, closed downward: a contained cell contains
/// its facets and vertices, and a contained facet contains its vertices.
///
/// Membership is stored as one flag per entity, so two restrictions built from the same entity
/// set compare equal regardless of the order or multiplicity of the input indices.
#[derive(Clone)]
pub struct Restriction {
    mesh: Arc<TriangleMesh>,
    cells: Vec<bool>,
    facets: Vec<bool>,
    vertices: Vec<bool>,
}

impl Restriction {
    fn empty(mesh: &Arc<TriangleMesh>) -> Self {
        Self {
            mesh: Arc::clone(mesh),
            cells: vec![false; mesh.num_cells()],
            facets: vec![false; mesh.num_facets()],
            vertices: vec![false; mesh.num_vertices()],
        }
    }

    pub fn from_cells(mesh: &Arc<TriangleMesh>, cells: impl IntoIterator<Item = usize>) -> Result<Self, BlockError> {
        let mut restriction = Self::empty(mesh);
        for cell in cells {
            restriction.insert(EntityKind::Cell, cell)?;
        }
        Ok(restriction)
    }

    pub fn from_facets(mesh: &Arc<TriangleMesh>, facets: impl IntoIterator<Item = usize>) -> Result<Self, BlockError> {
        let mut restriction = Self::empty(mesh);
        for facet in facets {
            restriction.insert(EntityKind::Facet, facet)?;
        }
        Ok(restriction)
    }

    pub fn from_vertices(
        mesh: &Arc<TriangleMesh>,
        vertices: impl IntoIterator<Item = usize>,
    ) -> Result<Self, BlockError> {
        let mut restriction = Self::empty(mesh);
        for vertex in vertices {
            restriction.insert(EntityKind::Vertex, vertex)?;
        }
        Ok(restriction)
    }

    /// All cells whose centroid satisfies `predicate`.
    pub fn from_cell_predicate(mesh: &Arc<TriangleMesh>, predicate: impl Fn(&Point2<f64>) -> bool) -> Self {
        let cells = (0..mesh.num_cells()).filter(|&c| predicate(&mesh.cell_geometry(c).midpoint()));
        Self::from_cells(mesh, cells).expect("Cell indices are in bounds by construction")
    }

    /// All facets whose midpoint satisfies `predicate`.
    pub fn from_facet_predicate(mesh: &Arc<TriangleMesh>, predicate: impl Fn(&Point2<f64>) -> bool) -> Self {
        let facets = (0..mesh.num_facets()).filter(|&f| predicate(&mesh.facet_geometry(f).midpoint()));
        Self::from_facets(mesh, facets).expect("Facet indices are in bounds by construction")
    }

    /// All facets carrying one of the given markers.
    pub fn from_facet_markers(mesh: &Arc<TriangleMesh>, markers: &[usize]) -> Self {
        let facets = (0..mesh.num_facets()).filter(|&f| markers.contains(&mesh.facet_markers()[f]));
        Self::from_facets(mesh, facets).expect("Facet indices are in bounds by construction")
    }

    /// All cells carrying one of the given markers.
    pub fn from_cell_markers(mesh: &Arc<TriangleMesh>, markers: &[usize]) -> Self {
        let cells = (0..mesh.num_cells()).filter(|&c| markers.contains(&mesh.cell_markers()[c]));
        Self::from_cells(mesh, cells).expect("Cell indices are in bounds by construction")
    }

    fn insert(&mut self, kind: EntityKind, index: usize) -> Result<(), BlockError> {
        let num_entities = self.mesh.num_entities(kind);
        if index >= num_entities {
            return Err(BlockError::InvalidRestriction {
                kind,
                index,
                num_entities,
            });
        }
        match kind {
            EntityKind::Cell => {
                self.cells[index] = true;
                for &facet in self.mesh.cell_facets(index) {
                    self.facets[facet] = true;
                }
                for &vertex in &self.mesh.cells()[index].0 {
                    self.vertices[vertex] = true;
                }
            }
            EntityKind::Facet => {
                self.facets[index] = true;
                for &vertex in &self.mesh.facets()[index].0 {
                    self.vertices[vertex] = true;
                }
            }
            EntityKind::Vertex => self.vertices[index] = true,
        }
        Ok(())
    }

    pub fn mesh(&self) -> &Arc<TriangleMesh> {
        &self.mesh
    }

    pub fn contains(&self, kind: EntityKind, index: usize) -> bool {
        let flags = match kind {
            EntityKind::Cell => &self.cells,
            EntityKind::Facet => &self.facets,
            EntityKind::Vertex => &self.vertices,
        };
        flags.get(index).copied().unwrap_or(false)
    }

    pub fn contains_cell(&self, cell: usize) -> bool {
        self.contains(EntityKind::Cell, cell)
    }

    pub fn contains_facet(&self, facet: usize) -> bool {
        self.contains(EntityKind::Facet, facet)
    }

    pub fn contains_vertex(&self, vertex: usize) -> bool {
        self.contains(EntityKind::Vertex, vertex)
    }

    pub fn num_cells(&self) -> usize {
        count(&self.cells)
    }

    pub fn num_facets(&self) -> usize {
        count(&self.facets)
    }

    pub fn num_vertices(&self) -> usize {
        count(&self.vertices)
    }
}

fn count(flags: &[bool]) -> usize {
    flags.iter().filter(|&&flag| flag).count()
}

impl PartialEq for Restriction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mesh, &other.mesh)
            && self.cells == other.cells
            && self.facets == other.facets
            && self.vertices == other.vertices
    }
}

impl fmt::Debug for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Restriction")
            .field("num_cells", &self.num_cells())
            .field("num_facets", &self.num_facets())
            .field("num_vertices", &self.num_vertices())
            .finish()
    }
}
