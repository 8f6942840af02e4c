//! Basic procedural mesh generation routines.
use crate::connectivity::Tri3d2Connectivity;
use crate::mesh::TriangleMesh;
use nalgebra::Point2;

/// Marker of the facets on `y = y_min`.
pub const BOTTOM_MARKER: usize = 1;
/// Marker of the facets on `x = x_min`.
pub const LEFT_MARKER: usize = 2;
/// Marker of the facets on `y = y_max`.
pub const TOP_MARKER: usize = 3;
/// Marker of the facets on `x = x_max`.
pub const RIGHT_MARKER: usize = 4;

/// Uniform triangle mesh of the unit square with `cells_per_dim` squares along each side.
///
/// See [`create_rectangular_uniform_tri_mesh_2d`] for the layout and boundary markers.
pub fn create_unit_square_uniform_tri_mesh_2d(cells_per_dim: usize) -> TriangleMesh {
    create_rectangular_uniform_tri_mesh_2d(&Point2::origin(), 1.0, 1.0, cells_per_dim, cells_per_dim)
}

/// Generates an axis-aligned rectangle `[x0, x0 + width] x [y0, y0 + height]` split into
/// `cells_x * cells_y` squares, each split into two counter-clockwise triangles along the
/// diagonal from its lower left to its upper right corner.
///
/// Vertex `(i, j)` has index `j * (cells_x + 1) + i`. Boundary facets are marked with
/// [`BOTTOM_MARKER`], [`LEFT_MARKER`], [`TOP_MARKER`] and [`RIGHT_MARKER`].
pub fn create_rectangular_uniform_tri_mesh_2d(
    lower_left: &Point2<f64>,
    width: f64,
    height: f64,
    cells_x: usize,
    cells_y: usize,
) -> TriangleMesh {
    let cells_x = cells_x.max(1);
    let cells_y = cells_y.max(1);
    let hx = width / cells_x as f64;
    let hy = height / cells_y as f64;
    let vertex_index = |i: usize, j: usize| j * (cells_x + 1) + i;

    let mut vertices = Vec::with_capacity((cells_x + 1) * (cells_y + 1));
    for j in 0..=cells_y {
        for i in 0..=cells_x {
            vertices.push(Point2::new(lower_left.x + i as f64 * hx, lower_left.y + j as f64 * hy));
        }
    }

    let mut cells = Vec::with_capacity(2 * cells_x * cells_y);
    for j in 0..cells_y {
        for i in 0..cells_x {
            let v00 = vertex_index(i, j);
            let v10 = vertex_index(i + 1, j);
            let v11 = vertex_index(i + 1, j + 1);
            let v01 = vertex_index(i, j + 1);
            cells.push(Tri3d2Connectivity([v00, v10, v11]));
            cells.push(Tri3d2Connectivity([v00, v11, v01]));
        }
    }

    let (x_min, y_min) = (lower_left.x, lower_left.y);
    let (x_max, y_max) = (x_min + width, y_min + height);
    let tol = 1e-10 * width.abs().max(height.abs());
    TriangleMesh::from_vertices_and_connectivity(vertices, cells)
        .expect("Procedural connectivity only references existing vertices")
        .mark_boundary_facets(BOTTOM_MARKER, |p| (p.y - y_min).abs() <= tol)
        .mark_boundary_facets(LEFT_MARKER, |p| (p.x - x_min).abs() <= tol)
        .mark_boundary_facets(TOP_MARKER, |p| (p.y - y_max).abs() <= tol)
        .mark_boundary_facets(RIGHT_MARKER, |p| (p.x - x_max).abs() <= tol)
}
