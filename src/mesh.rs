use crate::connectivity::{Connectivity, Segment2d2Connectivity, Tri3d2Connectivity};
use crate::error::BlockError;
use nalgebra::{Point2, Vector2};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod procedural;

/// The kinds of mesh entities of a 2D triangle mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Cell,
    Facet,
    Vertex,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cell => write!(f, "cell"),
            Self::Facet => write!(f, "facet"),
            Self::Vertex => write!(f, "vertex"),
        }
    }
}

/// Geometry of a single mesh entity, as consumed by form kernels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum EntityGeometry {
    Triangle([Point2<f64>; 3]),
    Segment([Point2<f64>; 2]),
}

impl EntityGeometry {
    /// Area of a triangle or length of a segment.
    pub fn measure(&self) -> f64 {
        match self {
            Self::Triangle([a, b, c]) => {
                let ab = b - a;
                let ac = c - a;
                0.5 * (ab.x * ac.y - ab.y * ac.x).abs()
            }
            Self::Segment([a, b]) => (b - a).norm(),
        }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        match self {
            Self::Triangle(vertices) => vertices,
            Self::Segment(vertices) => vertices,
        }
    }

    pub fn midpoint(&self) -> Point2<f64> {
        let vertices = self.vertices();
        let sum = vertices
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / vertices.len() as f64)
    }
}

/// Conforming 2D triangle mesh with derived facet (edge) topology and integer markers.
///
/// Facets are numbered in order of first appearance when visiting the faces of the cells in
/// cell order, so that the numbering is a deterministic function of the connectivity.
/// Marker value `0` means "unmarked".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    vertices: Vec<Point2<f64>>,
    cells: Vec<Tri3d2Connectivity>,
    facets: Vec<Segment2d2Connectivity>,
    cell_facets: Vec<[usize; 3]>,
    facet_cells: Vec<(usize, Option<usize>)>,
    cell_markers: Vec<usize>,
    facet_markers: Vec<usize>,
}

impl TriangleMesh {
    /// Construct a mesh from vertices and triangle connectivity, deriving its facets.
    ///
    /// Fails if a cell references a vertex out of bounds or if an edge is shared by more than
    /// two cells.
    pub fn from_vertices_and_connectivity(
        vertices: Vec<Point2<f64>>,
        cells: Vec<Tri3d2Connectivity>,
    ) -> Result<Self, BlockError> {
        for (cell_index, cell) in cells.iter().enumerate() {
            if let Some(&v) = cell.vertex_indices().iter().find(|&&v| v >= vertices.len()) {
                return Err(BlockError::InconsistentMesh(format!(
                    "cell {cell_index} references vertex {v}, but the mesh has {} vertices",
                    vertices.len()
                )));
            }
        }

        let mut facet_lookup = FxHashMap::default();
        let mut facets = Vec::new();
        let mut facet_cells: Vec<(usize, Option<usize>)> = Vec::new();
        let mut cell_facets = Vec::with_capacity(cells.len());
        for (cell_index, cell) in cells.iter().enumerate() {
            let mut local_facets = [0; 3];
            for (local_index, local_facet) in local_facets.iter_mut().enumerate() {
                let face = cell
                    .get_face_connectivity(local_index)
                    .ok_or_else(|| BlockError::InconsistentMesh("triangle without three faces".to_string()))?
                    .sorted();
                let facet_index = *facet_lookup.entry(face).or_insert_with(|| {
                    facets.push(face);
                    facet_cells.push((cell_index, None));
                    facets.len() - 1
                });
                if facet_cells[facet_index].0 != cell_index {
                    match facet_cells[facet_index].1 {
                        None => facet_cells[facet_index].1 = Some(cell_index),
                        Some(_) => {
                            return Err(BlockError::InconsistentMesh(format!(
                                "facet {:?} is shared by more than two cells",
                                face.0
                            )))
                        }
                    }
                }
                *local_facet = facet_index;
            }
            cell_facets.push(local_facets);
        }

        Ok(Self {
            cell_markers: vec![0; cells.len()],
            facet_markers: vec![0; facets.len()],
            vertices,
            cells,
            facets,
            cell_facets,
            facet_cells,
        })
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn cells(&self) -> &[Tri3d2Connectivity] {
        &self.cells
    }

    pub fn facets(&self) -> &[Segment2d2Connectivity] {
        &self.facets
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_facets(&self) -> usize {
        self.facets.len()
    }

    pub fn num_entities(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Cell => self.num_cells(),
            EntityKind::Facet => self.num_facets(),
            EntityKind::Vertex => self.num_vertices(),
        }
    }

    /// Facet indices of a cell, facet `k` being opposite to local vertex `k`.
    pub fn cell_facets(&self, cell: usize) -> &[usize; 3] {
        &self.cell_facets[cell]
    }

    /// The cells adjacent to a facet. The first cell is the one with the lowest index.
    pub fn facet_cells(&self, facet: usize) -> (usize, Option<usize>) {
        self.facet_cells[facet]
    }

    pub fn is_boundary_facet(&self, facet: usize) -> bool {
        self.facet_cells[facet].1.is_none()
    }

    /// Sorted indices of all facets adjacent to exactly one cell.
    pub fn boundary_facets(&self) -> Vec<usize> {
        (0..self.num_facets())
            .filter(|&f| self.is_boundary_facet(f))
            .collect()
    }

    pub fn cell_markers(&self) -> &[usize] {
        &self.cell_markers
    }

    pub fn facet_markers(&self) -> &[usize] {
        &self.facet_markers
    }

    pub fn cell_geometry(&self, cell: usize) -> EntityGeometry {
        let [a, b, c] = self.cells[cell].0;
        EntityGeometry::Triangle([self.vertices[a], self.vertices[b], self.vertices[c]])
    }

    pub fn facet_geometry(&self, facet: usize) -> EntityGeometry {
        let [a, b] = self.facets[facet].0;
        EntityGeometry::Segment([self.vertices[a], self.vertices[b]])
    }

    /// Facets carrying the given marker, in ascending order.
    pub fn facets_with_marker(&self, marker: usize) -> Vec<usize> {
        entities_with_marker(&self.facet_markers, marker)
    }

    pub fn cells_with_marker(&self, marker: usize) -> Vec<usize> {
        entities_with_marker(&self.cell_markers, marker)
    }

    /// Replaces the cell markers. There must be exactly one marker per cell.
    pub fn with_cell_markers(self, cell_markers: Vec<usize>) -> Result<Self, BlockError> {
        if cell_markers.len() != self.num_cells() {
            return Err(BlockError::DimensionMismatch {
                expected: self.num_cells(),
                actual: cell_markers.len(),
            });
        }
        Ok(Self { cell_markers, ..self })
    }

    /// Replaces the facet markers. There must be exactly one marker per facet.
    pub fn with_facet_markers(self, facet_markers: Vec<usize>) -> Result<Self, BlockError> {
        if facet_markers.len() != self.num_facets() {
            return Err(BlockError::DimensionMismatch {
                expected: self.num_facets(),
                actual: facet_markers.len(),
            });
        }
        Ok(Self { facet_markers, ..self })
    }

    /// Assigns `marker` to every boundary facet whose midpoint satisfies `predicate`.
    pub fn mark_boundary_facets(mut self, marker: usize, predicate: impl Fn(&Point2<f64>) -> bool) -> Self {
        for facet in 0..self.num_facets() {
            if self.is_boundary_facet(facet) && predicate(&self.facet_geometry(facet).midpoint()) {
                self.facet_markers[facet] = marker;
            }
        }
        self
    }

    /// Assigns `marker` to every cell whose centroid satisfies `predicate`.
    pub fn mark_cells(mut self, marker: usize, predicate: impl Fn(&Point2<f64>) -> bool) -> Self {
        for cell in 0..self.num_cells() {
            if predicate(&self.cell_geometry(cell).midpoint()) {
                self.cell_markers[cell] = marker;
            }
        }
        self
    }
}

fn entities_with_marker(markers: &[usize], marker: usize) -> Vec<usize> {
    markers
        .iter()
        .enumerate()
        .filter(|&(_, &m)| m == marker)
        .map(|(index, _)| index)
        .collect()
}

/// Assignment of every cell of a (replicated) mesh to an owning rank.
///
/// Facets belong to the rank owning their first adjacent cell. DOFs belong to the lowest rank
/// owning a cell that contains them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshPartition {
    cell_owners: Vec<usize>,
    num_ranks: usize,
}

impl MeshPartition {
    /// All cells owned by rank 0 of a single-rank run.
    pub fn serial(mesh: &TriangleMesh) -> Self {
        Self {
            cell_owners: vec![0; mesh.num_cells()],
            num_ranks: 1,
        }
    }

    pub fn from_cell_owners(mesh: &TriangleMesh, cell_owners: Vec<usize>, num_ranks: usize) -> Result<Self, BlockError> {
        if cell_owners.len() != mesh.num_cells() {
            return Err(BlockError::DimensionMismatch {
                expected: mesh.num_cells(),
                actual: cell_owners.len(),
            });
        }
        if let Some(&owner) = cell_owners.iter().find(|&&owner| owner >= num_ranks) {
            return Err(BlockError::InconsistentMesh(format!(
                "cell owner {owner} is not a rank of a {num_ranks}-rank partition"
            )));
        }
        Ok(Self { cell_owners, num_ranks })
    }

    /// Splits the cells into `num_ranks` contiguous chunks of nearly equal size.
    pub fn contiguous(mesh: &TriangleMesh, num_ranks: usize) -> Self {
        let num_ranks = num_ranks.max(1);
        let num_cells = mesh.num_cells();
        let cell_owners = (0..num_cells)
            .map(|cell| cell * num_ranks / num_cells.max(1))
            .collect();
        Self { cell_owners, num_ranks }
    }

    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    pub fn cell_owners(&self) -> &[usize] {
        &self.cell_owners
    }

    pub fn cell_owner(&self, cell: usize) -> usize {
        self.cell_owners[cell]
    }

    pub fn facet_owner(&self, mesh: &TriangleMesh, facet: usize) -> usize {
        self.cell_owners[mesh.facet_cells(facet).0]
    }
}
