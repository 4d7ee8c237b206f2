use sparsebases::{BasisKind, TensorProductBasis, create_basis, full_grid_matrix, matrix_rank};

const RANK_TOL: f64 = 1e-10;

fn tensor(kind: &BasisKind, dim: usize) -> TensorProductBasis {
    TensorProductBasis::uniform(create_basis(kind).expect("basis construction"), dim)
}

fn boundary_levels(dim: usize) -> Vec<u32> {
    match dim {
        1 => vec![3],
        2 => vec![2, 2],
        3 => vec![2, 1, 1],
        _ => vec![1; dim],
    }
}

/// Tensor-product full-grid bases are linearly independent: the collocation
/// matrix has full rank for every family and every dimension up to 4.
#[test]
fn full_grid_matrices_have_full_rank() {
    let kinds = [
        BasisKind::BSpline { degree: 1, nu: 0 },
        BasisKind::BSpline { degree: 3, nu: 0 },
        BasisKind::ClenshawCurtisBSpline { degree: 3, nu: 0 },
        BasisKind::NotAKnotBSpline { degree: 3, nu: 0 },
        BasisKind::ClenshawCurtisNotAKnotBSpline { degree: 3, nu: 0 },
        BasisKind::NaturalBSpline { degree: 3, nu: 0 },
        BasisKind::FundamentalSpline { degree: 3, nu: 0 },
        BasisKind::WeaklyFundamentalSpline { degree: 3, nu: 0 },
        BasisKind::LagrangePolynomial { nu: 0 },
        BasisKind::FundamentalTransformed {
            underlying: Box::new(BasisKind::NotAKnotBSpline { degree: 3, nu: 0 }),
        },
    ];
    for kind in &kinds {
        let distribution = kind.distribution();
        for dim in 1..=4usize {
            let basis = tensor(kind, dim);
            let levels = boundary_levels(dim);
            let matrix = full_grid_matrix(&basis, &levels, true, distribution);
            let n = matrix.nrows();
            let rank = matrix_rank(&matrix, RANK_TOL).expect("rank computation");
            assert_eq!(
                rank, n,
                "rank deficiency for {kind:?} in dimension {dim}: rank {rank} of {n}"
            );
        }
    }
}

/// Interior (boundary-less) families on interior full grids.
#[test]
fn interior_full_grid_matrices_have_full_rank() {
    let kinds = [
        BasisKind::ModifiedBSpline { degree: 1, nu: 0 },
        BasisKind::ModifiedBSpline { degree: 3, nu: 0 },
        BasisKind::ModifiedClenshawCurtisBSpline { degree: 3, nu: 0 },
        BasisKind::ModifiedFundamentalSpline { degree: 3, nu: 0 },
    ];
    for kind in &kinds {
        let distribution = kind.distribution();
        for dim in 1..=4usize {
            let basis = tensor(kind, dim);
            let levels = match dim {
                1 => vec![4],
                2 => vec![3, 2],
                _ => vec![2; dim],
            };
            let matrix = full_grid_matrix(&basis, &levels, false, distribution);
            let n = matrix.nrows();
            let rank = matrix_rank(&matrix, RANK_TOL).expect("rank computation");
            assert_eq!(
                rank, n,
                "rank deficiency for {kind:?} in dimension {dim}: rank {rank} of {n}"
            );
        }
    }
}
