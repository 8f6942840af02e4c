use blockfem::mesh::procedural::{create_unit_square_uniform_tri_mesh_2d, LEFT_MARKER, RIGHT_MARKER};
use blockfem::mesh::EntityKind;
use blockfem::proptest::{boundary_facet_restriction, cell_restriction, unit_square_mesh};
use blockfem::restriction::Restriction;
use blockfem::BlockError;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn cell_restriction_is_closed_downward() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(2));
    let restriction = Restriction::from_cells(&mesh, [0]).unwrap();
    assert_eq!(restriction.num_cells(), 1);
    assert_eq!(restriction.num_facets(), 3);
    assert_eq!(restriction.num_vertices(), 3);
    for &facet in mesh.cell_facets(0) {
        assert!(restriction.contains_facet(facet));
    }
    for &vertex in &mesh.cells()[0].0 {
        assert!(restriction.contains_vertex(vertex));
    }
    assert!(!restriction.contains_cell(1));
}

#[test]
fn facet_restriction_contains_no_cells() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(3));
    let restriction = Restriction::from_facet_markers(&mesh, &[LEFT_MARKER]);
    assert_eq!(restriction.num_cells(), 0);
    assert_eq!(restriction.num_facets(), 3);
    assert_eq!(restriction.num_vertices(), 4);
    for vertex in 0..mesh.num_vertices() {
        let on_left = mesh.vertices()[vertex].x == 0.0;
        assert_eq!(restriction.contains(EntityKind::Vertex, vertex), on_left);
    }
}

#[test]
fn vertex_restriction_contains_only_vertices() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(1));
    let restriction = Restriction::from_vertices(&mesh, [0, 3]).unwrap();
    assert_eq!(restriction.num_vertices(), 2);
    assert_eq!(restriction.num_facets(), 0);
    assert_eq!(restriction.num_cells(), 0);
}

#[test]
fn predicates_select_by_midpoint() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(4));
    let left_half = Restriction::from_cell_predicate(&mesh, |p| p.x < 0.5);
    assert_eq!(left_half.num_cells(), mesh.num_cells() / 2);
    // Vertices on x <= 0.5 are all touched by a left cell
    assert_eq!(left_half.num_vertices(), 3 * 5);

    let right = Restriction::from_facet_predicate(&mesh, |p| p.x == 1.0);
    assert_eq!(right, Restriction::from_facet_markers(&mesh, &[RIGHT_MARKER]));
}

#[test]
fn out_of_bounds_entities_are_rejected() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(1));
    let result = Restriction::from_cells(&mesh, [0, 2]);
    assert!(matches!(
        result,
        Err(BlockError::InvalidRestriction {
            kind: EntityKind::Cell,
            index: 2,
            num_entities: 2
        })
    ));
    assert!(matches!(
        Restriction::from_facets(&mesh, [5]),
        Err(BlockError::InvalidRestriction {
            kind: EntityKind::Facet,
            ..
        })
    ));
    assert!(matches!(
        Restriction::from_vertices(&mesh, [4]),
        Err(BlockError::InvalidRestriction {
            kind: EntityKind::Vertex,
            ..
        })
    ));
}

#[test]
fn restrictions_on_different_meshes_differ() {
    let mesh_a = Arc::new(create_unit_square_uniform_tri_mesh_2d(1));
    let mesh_b = Arc::new(create_unit_square_uniform_tri_mesh_2d(1));
    let a = Restriction::from_cells(&mesh_a, [0]).unwrap();
    let b = Restriction::from_cells(&mesh_b, [0]).unwrap();
    assert_ne!(a, b);
}

proptest! {
    #[test]
    fn restriction_does_not_depend_on_input_order(
        (mesh, restriction) in unit_square_mesh(5)
            .prop_flat_map(|mesh| (Just(mesh.clone()), cell_restriction(mesh)))
    ) {
        let cells: Vec<_> = (0..mesh.num_cells()).filter(|&c| restriction.contains_cell(c)).collect();
        let reversed_with_duplicates = cells.iter().rev().chain(cells.iter()).copied();
        let rebuilt = Restriction::from_cells(&mesh, reversed_with_duplicates).unwrap();
        prop_assert_eq!(&rebuilt, &restriction);
    }

    #[test]
    fn cell_restrictions_are_closed(
        (mesh, restriction) in unit_square_mesh(5)
            .prop_flat_map(|mesh| (Just(mesh.clone()), cell_restriction(mesh)))
    ) {
        for cell in 0..mesh.num_cells() {
            if restriction.contains_cell(cell) {
                for &facet in mesh.cell_facets(cell) {
                    prop_assert!(restriction.contains_facet(facet));
                }
            }
        }
        for facet in 0..mesh.num_facets() {
            if restriction.contains_facet(facet) {
                for &vertex in &mesh.facets()[facet].0 {
                    prop_assert!(restriction.contains_vertex(vertex));
                }
            }
        }
    }

    #[test]
    fn boundary_facet_restrictions_stay_on_the_boundary(
        (mesh, restriction) in unit_square_mesh(5)
            .prop_flat_map(|mesh| (Just(mesh.clone()), boundary_facet_restriction(mesh)))
    ) {
        prop_assert_eq!(restriction.num_cells(), 0);
        for facet in 0..mesh.num_facets() {
            if restriction.contains_facet(facet) {
                prop_assert!(mesh.is_boundary_facet(facet));
            }
        }
    }
}
