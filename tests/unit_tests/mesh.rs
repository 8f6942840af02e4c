use blockfem::connectivity::Tri3d2Connectivity;
use blockfem::mesh::procedural::{
    create_rectangular_uniform_tri_mesh_2d, create_unit_square_uniform_tri_mesh_2d, BOTTOM_MARKER, LEFT_MARKER,
    RIGHT_MARKER, TOP_MARKER,
};
use blockfem::mesh::{EntityGeometry, EntityKind, MeshPartition, TriangleMesh};
use blockfem::BlockError;
use nalgebra::Point2;
use proptest::prelude::*;

#[test]
fn unit_square_single_cell_topology() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    assert_eq!(mesh.num_vertices(), 4);
    assert_eq!(mesh.num_cells(), 2);
    assert_eq!(mesh.num_facets(), 5);
    assert_eq!(mesh.cells()[0], Tri3d2Connectivity([0, 1, 3]));
    assert_eq!(mesh.cells()[1], Tri3d2Connectivity([0, 3, 2]));

    // The diagonal is the only interior facet
    let interior: Vec<_> = (0..mesh.num_facets())
        .filter(|&f| !mesh.is_boundary_facet(f))
        .collect();
    assert_eq!(interior.len(), 1);
    assert_eq!(mesh.facets()[interior[0]].0, [0, 3]);
    assert_eq!(mesh.facet_cells(interior[0]), (0, Some(1)));
}

#[test]
fn cell_facets_are_opposite_to_local_vertices() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(3);
    for cell in 0..mesh.num_cells() {
        let vertices = mesh.cells()[cell].0;
        for (local, &facet) in mesh.cell_facets(cell).iter().enumerate() {
            assert!(!mesh.facets()[facet].0.contains(&vertices[local]));
        }
    }
}

#[test]
fn procedural_markers_cover_the_boundary() {
    let n = 4;
    let mesh = create_unit_square_uniform_tri_mesh_2d(n);
    for marker in [BOTTOM_MARKER, LEFT_MARKER, TOP_MARKER, RIGHT_MARKER] {
        assert_eq!(mesh.facets_with_marker(marker).len(), n);
    }
    // Interior facets stay unmarked
    for facet in 0..mesh.num_facets() {
        assert_eq!(mesh.facet_markers()[facet] == 0, !mesh.is_boundary_facet(facet));
    }
    for facet in mesh.facets_with_marker(LEFT_MARKER) {
        assert_eq!(mesh.facet_geometry(facet).midpoint().x, 0.0);
    }
    for facet in mesh.facets_with_marker(TOP_MARKER) {
        assert_eq!(mesh.facet_geometry(facet).midpoint().y, 1.0);
    }
}

#[test]
fn rectangular_mesh_geometry() {
    let mesh = create_rectangular_uniform_tri_mesh_2d(&Point2::new(-1.0, 2.0), 3.0, 1.0, 3, 2);
    assert_eq!(mesh.num_vertices(), 12);
    assert_eq!(mesh.num_cells(), 12);
    let area: f64 = (0..mesh.num_cells())
        .map(|c| mesh.cell_geometry(c).measure())
        .sum();
    assert!((area - 3.0).abs() < 1e-12);
    let perimeter: f64 = mesh
        .boundary_facets()
        .iter()
        .map(|&f| mesh.facet_geometry(f).measure())
        .sum();
    assert!((perimeter - 8.0).abs() < 1e-12);
    assert_eq!(mesh.vertices()[5], Point2::new(0.0, 2.5));
}

#[test]
fn entity_geometry_measures() {
    let triangle = EntityGeometry::Triangle([Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(0.0, 3.0)]);
    assert_eq!(triangle.measure(), 3.0);
    assert_eq!(triangle.midpoint(), Point2::new(2.0 / 3.0, 1.0));
    let segment = EntityGeometry::Segment([Point2::new(1.0, 1.0), Point2::new(4.0, 5.0)]);
    assert_eq!(segment.measure(), 5.0);
    assert_eq!(segment.vertices().len(), 2);
}

#[test]
fn invalid_connectivity_is_rejected() {
    let vertices = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
    let result = TriangleMesh::from_vertices_and_connectivity(vertices.clone(), vec![Tri3d2Connectivity([0, 1, 3])]);
    assert!(matches!(result, Err(BlockError::InconsistentMesh(_))));

    // Three triangles sharing the edge (0, 1)
    let mut vertices = vertices;
    vertices.push(Point2::new(0.0, -1.0));
    vertices.push(Point2::new(1.0, 1.0));
    let cells = vec![
        Tri3d2Connectivity([0, 1, 2]),
        Tri3d2Connectivity([1, 0, 3]),
        Tri3d2Connectivity([0, 1, 4]),
    ];
    let result = TriangleMesh::from_vertices_and_connectivity(vertices, cells);
    assert!(matches!(result, Err(BlockError::InconsistentMesh(_))));
}

#[test]
fn markers_must_match_entity_counts() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let num_cells = mesh.num_cells();
    let result = mesh.clone().with_cell_markers(vec![1; num_cells + 1]);
    assert!(matches!(
        result,
        Err(BlockError::DimensionMismatch { expected, actual }) if expected == num_cells && actual == num_cells + 1
    ));

    let marked = mesh
        .with_cell_markers(vec![7; num_cells])
        .unwrap()
        .mark_cells(3, |p| p.x < 0.5);
    assert_eq!(marked.cells_with_marker(3).len(), num_cells / 2);
    assert_eq!(marked.cells_with_marker(7).len(), num_cells / 2);
    assert_eq!(marked.num_entities(EntityKind::Cell), num_cells);
}

#[test]
fn mesh_serde_round_trip() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let json = serde_json::to_string(&mesh).unwrap();
    let deserialized: TriangleMesh = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, mesh);
}

#[test]
fn partition_owners() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let partition = MeshPartition::contiguous(&mesh, 3);
    assert_eq!(partition.num_ranks(), 3);
    assert_eq!(partition.cell_owners(), &[0, 0, 0, 1, 1, 1, 2, 2]);
    for facet in 0..mesh.num_facets() {
        let (first_cell, _) = mesh.facet_cells(facet);
        assert_eq!(partition.facet_owner(&mesh, facet), partition.cell_owner(first_cell));
    }

    assert!(MeshPartition::from_cell_owners(&mesh, vec![0, 1, 2, 3, 0, 1, 2, 3], 3).is_err());
    assert!(MeshPartition::from_cell_owners(&mesh, vec![0; 7], 1).is_err());
    assert!(MeshPartition::serial(&mesh).cell_owners().iter().all(|&owner| owner == 0));
}

proptest! {
    #[test]
    fn unit_square_entity_counts(n in 1usize..12) {
        let mesh = create_unit_square_uniform_tri_mesh_2d(n);
        prop_assert_eq!(mesh.num_vertices(), (n + 1) * (n + 1));
        prop_assert_eq!(mesh.num_cells(), 2 * n * n);
        prop_assert_eq!(mesh.num_facets(), 3 * n * n + 2 * n);
        prop_assert_eq!(mesh.boundary_facets().len(), 4 * n);
        // Euler characteristic of a disk
        prop_assert_eq!(mesh.num_vertices() + mesh.num_cells(), mesh.num_facets() + 1);
    }
}
