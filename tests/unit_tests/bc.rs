use crate::{boundary_control_components, p1, serial_space, unrestricted_components};
use blockfem::block::{
    BilinearForm, BlockAssembler, BlockDirichletBC, BlockEntry, BlockForm1, BlockForm2, BlockFunctionSpace,
    DirichletBC, DirichletValue, LinearForm, TestFunction, TrialFunction,
};
use blockfem::comm::SerialCommunicator;
use blockfem::forms::{Advection, Diffusion, Mass, Measure, Source};
use blockfem::la::{MonolithicMatrix, MonolithicVector};
use blockfem::mesh::procedural::{create_unit_square_uniform_tri_mesh_2d, LEFT_MARKER, RIGHT_MARKER, TOP_MARKER};
use blockfem::space::interpolate;
use blockfem::BlockError;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, Vector2};
use std::sync::Arc;

fn assemble(a: &BlockForm2, f: &BlockForm1, space: &BlockFunctionSpace) -> (MonolithicMatrix, MonolithicVector) {
    let assembler = BlockAssembler::new();
    (
        assembler.assemble_matrix(a, space, &SerialCommunicator).unwrap(),
        assembler.assemble_vector(f, space, &SerialCommunicator).unwrap(),
    )
}

fn poisson(space: &BlockFunctionSpace) -> (MonolithicMatrix, MonolithicVector) {
    let (v, u) = (TestFunction::new(0), TrialFunction::new(0));
    let a = BlockForm2::new(vec![vec![BilinearForm::new(v, u, Measure::dx(), Diffusion::new(1.0))
        .plus(Measure::dx(), Mass::new(0.5))
        .into()]])
    .unwrap();
    let f = BlockForm1::new(vec![LinearForm::new(v, Measure::dx(), Source::constant(1.0)).into()]).unwrap();
    assemble(&a, &f, space)
}

#[test]
fn lifting_eliminates_constrained_dofs() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(3));
    let space = serial_space(unrestricted_components(&mesh, 1));
    let (mut matrix, mut rhs) = poisson(&space);
    let original_matrix = DMatrix::from(matrix.csr());
    let original_rhs = rhs.owned_values().clone();

    let bcs = BlockDirichletBC::new(vec![vec![DirichletBC::new(
        mesh.facets_with_marker(LEFT_MARKER),
        DirichletValue::Constant(2.0),
    )]]);
    bcs.apply(&mut matrix, &mut rhs, &space).unwrap();
    let constrained = bcs.constrained_dofs(&space).unwrap();
    assert_eq!(constrained.keys().copied().collect::<Vec<_>>(), vec![0, 4, 8, 12]);

    let dense = DMatrix::from(matrix.csr());
    let mut g = DVector::zeros(16);
    for (&dof, &value) in &constrained {
        g[dof] = value;
    }
    let lifted = &original_rhs - &original_matrix * &g;
    for row in 0..16 {
        if constrained.contains_key(&row) {
            assert_eq!(rhs.owned_values()[row], 2.0);
            for col in 0..16 {
                assert_eq!(dense[(row, col)], if row == col { 1.0 } else { 0.0 });
            }
        } else {
            assert!((rhs.owned_values()[row] - lifted[row]).abs() < 1e-14);
            for col in 0..16 {
                let expected = if constrained.contains_key(&col) { 0.0 } else { original_matrix[(row, col)] };
                assert_eq!(dense[(row, col)], expected);
            }
        }
    }
    // The pattern is kept, eliminated entries are explicit zeros
    assert_eq!(matrix.nnz(), original_matrix.iter().filter(|&&v| v != 0.0).count());
}

#[test]
fn lifting_preserves_symmetry() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(4));
    let space = serial_space(unrestricted_components(&mesh, 1));
    let (mut matrix, mut rhs) = poisson(&space);
    let p1_space = p1(&mesh);
    let boundary_values = interpolate(p1_space.as_ref(), |p| p.x * p.x - p.y);
    let bcs = BlockDirichletBC::new(vec![vec![
        DirichletBC::new(mesh.boundary_facets(), DirichletValue::Values(boundary_values.clone())),
    ]]);
    let asymmetry = |dense: &DMatrix<f64>| (dense - dense.transpose()).amax();
    // Summation order of duplicate entries may already break symmetry in the last bit
    let assembled_asymmetry = asymmetry(&DMatrix::from(matrix.csr()));
    assert!(assembled_asymmetry <= 1e-15);
    bcs.apply(&mut matrix, &mut rhs, &space).unwrap();

    let dense = DMatrix::from(matrix.csr());
    assert!(asymmetry(&dense) <= assembled_asymmetry);
    assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-15);
    for vertex in 0..mesh.num_vertices() {
        let p = mesh.vertices()[vertex];
        let on_boundary = p.x == 0.0 || p.x == 1.0 || p.y == 0.0 || p.y == 1.0;
        if on_boundary {
            assert_eq!(rhs.owned_values()[vertex], boundary_values[vertex]);
        }
    }
}

#[test]
fn application_is_idempotent() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(3));
    let space = serial_space(unrestricted_components(&mesh, 1));
    let (mut matrix, mut rhs) = poisson(&space);
    let bcs = BlockDirichletBC::new(vec![vec![DirichletBC::new(
        mesh.facets_with_marker(TOP_MARKER),
        DirichletValue::function(|p| p.x),
    )]]);
    bcs.apply(&mut matrix, &mut rhs, &space).unwrap();
    let (once_matrix, once_rhs) = (matrix.clone(), rhs.clone());
    bcs.apply(&mut matrix, &mut rhs, &space).unwrap();
    assert_eq!(matrix, once_matrix);
    assert_eq!(rhs, once_rhs);
}

#[test]
fn missing_diagonal_is_inserted() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(2));
    let space = serial_space(unrestricted_components(&mesh, 2));
    let ([z, q], [y, p]) = ([TestFunction::new(0), TestFunction::new(1)], [TrialFunction::new(0), TrialFunction::new(1)]);
    let a = BlockForm2::new(vec![
        vec![
            BilinearForm::new(z, y, Measure::dx(), Mass::default()).into(),
            BilinearForm::new(z, p, Measure::dx(), Diffusion::new(1.0)).into(),
        ],
        vec![
            BilinearForm::new(q, y, Measure::dx(), Diffusion::new(1.0)).into(),
            BlockEntry::Absent,
        ],
    ])
    .unwrap();
    let f = BlockForm1::new(vec![BlockEntry::Absent, LinearForm::new(q, Measure::dx(), Source::constant(1.0)).into()])
        .unwrap();
    let (mut matrix, mut rhs) = assemble(&a, &f, &space);
    let constrained_row = space.dofmap().global_index(1, 0).unwrap();
    assert_eq!(matrix.get(constrained_row, constrained_row), None);

    let bcs = BlockDirichletBC::new(vec![
        vec![],
        vec![DirichletBC::new(mesh.facets_with_marker(LEFT_MARKER), DirichletValue::Constant(-1.0))],
    ]);
    bcs.apply(&mut matrix, &mut rhs, &space).unwrap();
    assert_eq!(matrix.get(constrained_row, constrained_row), Some(1.0));
    assert_eq!(rhs.get(constrained_row), Some(-1.0));
    // A DOF of the second component away from the left side is unaffected
    let free_row = space.dofmap().global_index(1, 4).unwrap();
    assert_eq!(matrix.get(free_row, free_row), None);
}

#[test]
fn nonsymmetric_operators_are_lifted_by_column() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(2));
    let space = serial_space(unrestricted_components(&mesh, 1));
    let (v, u) = (TestFunction::new(0), TrialFunction::new(0));
    let a = BlockForm2::new(vec![vec![BilinearForm::new(v, u, Measure::dx(), Advection::new(Vector2::new(1.0, 0.5)))
        .plus(Measure::dx(), Diffusion::new(0.1))
        .into()]])
    .unwrap();
    let f = BlockForm1::new(vec![BlockEntry::Absent]).unwrap();
    let (mut matrix, mut rhs) = assemble(&a, &f, &space);
    let original = DMatrix::from(matrix.csr());

    let bcs = BlockDirichletBC::new(vec![vec![DirichletBC::new(
        mesh.facets_with_marker(RIGHT_MARKER),
        DirichletValue::Constant(1.0),
    )]]);
    bcs.apply(&mut matrix, &mut rhs, &space).unwrap();
    let right: Vec<_> = bcs.constrained_dofs(&space).unwrap().into_keys().collect();
    assert_eq!(right, vec![2, 5, 8]);
    for row in [0, 1, 3, 4, 6, 7] {
        let expected: f64 = right.iter().map(|&col| -original[(row, col)]).sum();
        assert!((rhs.owned_values()[row] - expected).abs() < 1e-14);
    }
}

#[test]
fn later_conditions_override_earlier_ones() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(2));
    let space = serial_space(unrestricted_components(&mesh, 1));
    let bcs = BlockDirichletBC::new(vec![vec![
        DirichletBC::new(mesh.boundary_facets(), DirichletValue::Constant(1.0)),
        DirichletBC::new(mesh.facets_with_marker(LEFT_MARKER), DirichletValue::Constant(5.0)),
    ]]);
    let constrained = bcs.constrained_dofs(&space).unwrap();
    assert_eq!(constrained.len(), 8);
    assert_eq!(constrained[&0], 5.0);
    assert_eq!(constrained[&3], 5.0);
    assert_eq!(constrained[&1], 1.0);
    assert_eq!(bcs.num_rows(), 1);
    assert_eq!(bcs[0].len(), 2);
}

#[test]
fn restricted_components_constrain_only_active_dofs() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(2));
    let space = serial_space(boundary_control_components(&mesh));
    // The bottom facets touch the left side in one vertex only
    let bottom_left = mesh
        .facets_with_marker(blockfem::mesh::procedural::BOTTOM_MARKER)
        .into_iter()
        .filter(|&f| mesh.facets()[f].0.contains(&0));
    let bcs = BlockDirichletBC::new(vec![vec![], vec![DirichletBC::new(bottom_left, DirichletValue::Constant(3.0))]]);
    let constrained = bcs.constrained_dofs(&space).unwrap();
    let control_dof = space.dofmap().global_index(1, 0).unwrap();
    assert_eq!(constrained.into_iter().collect::<Vec<_>>(), vec![(control_dof, 3.0)]);
}

#[test]
fn invalid_conditions_leave_the_system_untouched() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(2));
    let space = serial_space(boundary_control_components(&mesh));
    let (mut matrix, mut rhs) = {
        let a = BlockForm2::new(vec![vec![BilinearForm::new(
            TestFunction::new(0),
            TrialFunction::new(0),
            Measure::dx(),
            Mass::default(),
        )
        .into()]])
        .unwrap();
        let f = BlockForm1::new(vec![LinearForm::new(TestFunction::new(0), Measure::dx(), Source::constant(1.0)).into()])
            .unwrap();
        assemble(&a, &f, &space)
    };
    let (original_matrix, original_rhs) = (matrix.clone(), rhs.clone());

    // Facet index past the end of the mesh
    let out_of_bounds = BlockDirichletBC::new(vec![
        vec![DirichletBC::new(mesh.boundary_facets(), DirichletValue::Constant(1.0))],
        vec![],
        vec![DirichletBC::new([mesh.num_facets()], DirichletValue::Constant(1.0))],
    ]);
    assert!(matches!(
        out_of_bounds.apply(&mut matrix, &mut rhs, &space),
        Err(BlockError::DofOutsideMesh(_))
    ));

    // A right facet carries no active DOF of the control restricted to the left side
    let inactive = BlockDirichletBC::new(vec![
        vec![DirichletBC::new(mesh.boundary_facets(), DirichletValue::Constant(1.0))],
        vec![DirichletBC::new(mesh.facets_with_marker(RIGHT_MARKER), DirichletValue::Constant(1.0))],
    ]);
    assert!(matches!(
        inactive.apply(&mut matrix, &mut rhs, &space),
        Err(BlockError::DofOutsideMesh(_))
    ));

    let too_many_rows = BlockDirichletBC::new(vec![vec![], vec![], vec![], vec![]]);
    assert!(matches!(
        too_many_rows.apply(&mut matrix, &mut rhs, &space),
        Err(BlockError::UnassembledCoupling(_))
    ));

    let wrong_length = BlockDirichletBC::new(vec![vec![DirichletBC::new(
        mesh.boundary_facets(),
        DirichletValue::Values(DVector::zeros(3)),
    )]]);
    assert!(matches!(
        wrong_length.apply(&mut matrix, &mut rhs, &space),
        Err(BlockError::DimensionMismatch { expected: 9, actual: 3 })
    ));

    assert_eq!(matrix, original_matrix);
    assert_eq!(rhs, original_rhs);
}

#[test]
fn vector_and_residual_application() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(2));
    let space = serial_space(unrestricted_components(&mesh, 1));
    let (_, mut rhs) = poisson(&space);
    let original = rhs.owned_values().clone();
    let bcs = BlockDirichletBC::new(vec![vec![DirichletBC::new(
        mesh.facets_with_marker(LEFT_MARKER),
        DirichletValue::Constant(4.0),
    )]]);
    bcs.apply_to_vector(&mut rhs, &space).unwrap();
    for dof in 0..9 {
        let expected = if [0, 3, 6].contains(&dof) { 4.0 } else { original[dof] };
        assert_eq!(rhs.owned_values()[dof], expected);
    }

    let x = space
        .merge_block_function(&[DVector::from_element(9, 1.5)])
        .unwrap();
    let mut residual = space.merge_block_function(&[DVector::from_element(9, 7.0)]).unwrap();
    bcs.apply_to_residual(&mut residual, &x, &space).unwrap();
    for dof in 0..9 {
        let expected = if [0, 3, 6].contains(&dof) { 1.5 - 4.0 } else { 7.0 };
        assert_eq!(residual.owned_values()[dof], expected);
    }
}

#[test]
fn extract_block_renumbers_rows() {
    let mesh = Arc::new(create_unit_square_uniform_tri_mesh_2d(2));
    let bcs = BlockDirichletBC::new(vec![
        vec![DirichletBC::new(mesh.facets_with_marker(LEFT_MARKER), DirichletValue::Constant(1.0))],
        vec![],
        vec![DirichletBC::new(mesh.facets_with_marker(RIGHT_MARKER), DirichletValue::Constant(2.0))],
    ]);
    let extracted = bcs.extract_block(&[2, 0, 5]);
    assert_eq!(extracted.num_rows(), 3);
    assert_eq!(extracted[0][0].facets(), mesh.facets_with_marker(RIGHT_MARKER).as_slice());
    assert_eq!(extracted[1][0].facets(), mesh.facets_with_marker(LEFT_MARKER).as_slice());
    assert!(extracted[2].is_empty());
}
