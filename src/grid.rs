use itertools::Itertools;
use ndarray::Array2;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Grid dimension must be at least 1, but was {0}.")]
    InvalidDimension(usize),

    #[error("Boundary parameter b must lie in 0..={dim}, but was {b}.")]
    InvalidBoundary { b: u32, dim: usize },

    #[error("Level vector has {found} components, expected {expected}.")]
    LevelVectorDimensionMismatch { expected: usize, found: usize },

    #[error("Point {0} is out of range for a grid of {1} points.")]
    PointOutOfRange(usize, usize),
}

/// Placement of the one-dimensional grid points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Distribution {
    #[default]
    Uniform,
    ClenshawCurtis,
}

/// All 2^l + 1 nodal indices of level l.
pub fn nodal_indices(level: u32) -> Vec<i64> {
    (0..=(1i64 << level)).collect()
}

/// Indices of the points first introduced at level l: {0, 1} at level 0, the
/// odd indices in (0, 2^l) afterwards.
pub fn hierarchical_indices(level: u32) -> Vec<i64> {
    if level == 0 {
        vec![0, 1]
    } else {
        (1..(1i64 << level)).step_by(2).collect()
    }
}

/// Maps a nodal index i at nodal level l to the (level, index) pair of the
/// level at which the point was first introduced. The hierarchical level is
/// l minus the 2-adic valuation of i.
pub fn nodal_to_hierarchical(level: u32, i: i64) -> (u32, i64) {
    debug_assert!((0..=(1i64 << level)).contains(&i));
    if i == 0 {
        return (0, 0);
    }
    if i == 1i64 << level {
        return (0, 1);
    }
    let shift = i.trailing_zeros();
    (level - shift, i >> shift)
}

/// Inverse of [`nodal_to_hierarchical`]: the nodal index of the hierarchical
/// pair (l, i) in the nodal numbering of level `nodal_level` >= l.
pub fn hierarchical_to_nodal(level: u32, i: i64, nodal_level: u32) -> i64 {
    debug_assert!(nodal_level >= level);
    i << (nodal_level - level)
}

/// Real coordinate of the pair (l, i). Indices outside [0, 2^l] are mapped by
/// point reflection at the endpoints, which extends the uniform lattice
/// affinely and keeps Clenshaw-Curtis knot sequences strictly increasing.
pub fn coordinate(level: u32, i: i64, distribution: Distribution) -> f64 {
    let h_inv = 1i64 << level;
    match distribution {
        Distribution::Uniform => i as f64 / h_inv as f64,
        Distribution::ClenshawCurtis => {
            if i < 0 {
                -coordinate(level, -i, distribution)
            } else if i > h_inv {
                2.0 - coordinate(level, 2 * h_inv - i, distribution)
            } else {
                0.5 * (1.0 - (std::f64::consts::PI * i as f64 / h_inv as f64).cos())
            }
        }
    }
}

/// An ordered collection of d-dimensional grid points with parallel
/// level/index/coordinate rows. Insertion order is significant only insofar
/// as it fixes the row/column order of interpolation matrices; (level, index)
/// pairs are unique.
#[derive(Clone, Debug)]
pub struct GridPointSet {
    dim: usize,
    distribution: Distribution,
    levels: Vec<u32>,
    indices: Vec<i64>,
    coords: Vec<f64>,
}

impl GridPointSet {
    pub fn new(dim: usize, distribution: Distribution) -> Self {
        Self {
            dim,
            distribution,
            levels: Vec::new(),
            indices: Vec::new(),
            coords: Vec::new(),
        }
    }

    pub fn from_pairs(
        levels: &[Vec<u32>],
        indices: &[Vec<i64>],
        distribution: Distribution,
    ) -> Result<Self, GridError> {
        let dim = levels.first().map_or(0, |l| l.len());
        if dim == 0 {
            return Err(GridError::InvalidDimension(0));
        }
        let mut set = Self::new(dim, distribution);
        for (l, i) in levels.iter().zip(indices.iter()) {
            if l.len() != dim || i.len() != dim {
                return Err(GridError::LevelVectorDimensionMismatch {
                    expected: dim,
                    found: l.len().min(i.len()),
                });
            }
            set.push(l, i);
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.levels.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    pub fn push(&mut self, level: &[u32], index: &[i64]) {
        debug_assert_eq!(level.len(), self.dim);
        debug_assert_eq!(index.len(), self.dim);
        self.levels.extend_from_slice(level);
        self.indices.extend_from_slice(index);
        for t in 0..self.dim {
            self.coords
                .push(coordinate(level[t], index[t], self.distribution));
        }
    }

    pub fn level(&self, k: usize) -> &[u32] {
        &self.levels[k * self.dim..(k + 1) * self.dim]
    }

    pub fn index(&self, k: usize) -> &[i64] {
        &self.indices[k * self.dim..(k + 1) * self.dim]
    }

    pub fn coord(&self, k: usize) -> &[f64] {
        &self.coords[k * self.dim..(k + 1) * self.dim]
    }

    pub fn level_sum(&self, k: usize) -> u32 {
        self.level(k).iter().sum()
    }

    /// Coordinates as an N x d matrix (query-point layout).
    pub fn coords_matrix(&self) -> Array2<f64> {
        Array2::from_shape_vec((self.len(), self.dim), self.coords.clone())
            .expect("row-major coordinate storage matches (len, dim)")
    }
}

fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut out: u128 = 1;
    for j in 0..k {
        out = out * (n - j) as u128 / (j + 1) as u128;
    }
    out as u64
}

/// Number of points of the interior regular sparse grid in `dim` dimensions
/// with level sum at most `max_sum`.
fn interior_size(dim: usize, max_sum: i64) -> u64 {
    if max_sum < dim as i64 {
        return 0;
    }
    let d = dim as u64;
    let mut total = 0u64;
    for q in 0..=(max_sum as u64 - d) {
        total += (1u64 << q) * binomial(q + d - 1, d - 1);
    }
    total
}

/// Enumerates interior level vectors (all components >= 1) with
/// |l|_1 <= max_sum into `out`, in lexicographic recursion order.
fn enumerate_interior_levels(
    dim: usize,
    max_sum: i64,
    current: &mut Vec<u32>,
    out: &mut Vec<Vec<u32>>,
) {
    if current.len() == dim {
        out.push(current.clone());
        return;
    }
    let used: i64 = current.iter().map(|&l| l as i64).sum();
    let remaining_dims = (dim - current.len() - 1) as i64;
    let mut l = 1i64;
    while used + l + remaining_dims <= max_sum {
        current.push(l as u32);
        enumerate_interior_levels(dim, max_sum, current, out);
        current.pop();
        l += 1;
    }
}

fn cartesian_hierarchical(
    level: &[u32],
    set: &mut GridPointSet,
    mut seen: Option<&mut HashSet<(Vec<u32>, Vec<i64>)>>,
) {
    let per_dim: Vec<Vec<i64>> = level.iter().map(|&l| hierarchical_indices(l)).collect();
    for index in per_dim
        .iter()
        .map(|indices| indices.iter().copied())
        .multi_cartesian_product()
    {
        let fresh = match seen.as_mut() {
            Some(seen) => seen.insert((level.to_vec(), index.clone())),
            None => true,
        };
        if fresh {
            set.push(level, &index);
        }
    }
}

/// Interior regular sparse grid: level vectors l >= 1 with |l|_1 <= n.
#[derive(Clone, Copy, Debug)]
pub struct RegularSparse {
    pub n: u32,
    pub d: usize,
}

impl RegularSparse {
    pub fn new(n: u32, d: usize) -> Result<Self, GridError> {
        if d == 0 {
            return Err(GridError::InvalidDimension(d));
        }
        Ok(Self { n, d })
    }

    /// Closed-form point count: sum over q of 2^q * C(q + d - 1, d - 1).
    pub fn size(&self) -> u64 {
        interior_size(self.d, self.n as i64)
    }

    pub fn level_vectors(&self) -> Vec<Vec<u32>> {
        let mut out = Vec::new();
        let mut current = Vec::with_capacity(self.d);
        enumerate_interior_levels(self.d, self.n as i64, &mut current, &mut out);
        out
    }

    pub fn generate(&self, distribution: Distribution) -> GridPointSet {
        let mut set = GridPointSet::new(self.d, distribution);
        for level in self.level_vectors() {
            cartesian_hierarchical(&level, &mut set, None);
        }
        set
    }
}

/// Regular sparse grid with boundary points, parameterized by the boundary
/// coarsening b: a level vector with z >= 1 zero components is admitted iff
/// |l|_1 + b*z <= n; the 2^d corner points are always present.
#[derive(Clone, Copy, Debug)]
pub struct RegularSparseBoundary {
    pub n: u32,
    pub d: usize,
    pub b: u32,
}

impl RegularSparseBoundary {
    pub fn new(n: u32, d: usize, b: u32) -> Result<Self, GridError> {
        if d == 0 {
            return Err(GridError::InvalidDimension(d));
        }
        if b as usize > d {
            return Err(GridError::InvalidBoundary { b, dim: d });
        }
        Ok(Self { n, d, b })
    }

    /// Closed-form point count, stratified by the number z of zero level
    /// components: C(d, z) placements, 2^z boundary sides, and an interior
    /// grid of the remaining d-z dimensions with level sum capped at
    /// n - b*z. The corner stratum (z = d) always contributes 2^d.
    pub fn size(&self) -> u64 {
        let d = self.d as u64;
        let mut total = 1u64 << d;
        for z in 0..self.d as u64 {
            let cap = self.n as i64 - (self.b as i64) * z as i64;
            total += binomial(d, z) * (1u64 << z) * interior_size(self.d - z as usize, cap);
        }
        total
    }

    pub fn level_vectors(&self) -> Vec<Vec<u32>> {
        let mut out = Vec::new();
        let mut current = Vec::with_capacity(self.d);
        self.enumerate_levels(&mut current, &mut out);
        out
    }

    fn enumerate_levels(&self, current: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
        if current.len() == self.d {
            if self.admits(current) {
                out.push(current.clone());
            }
            return;
        }
        let used: i64 = current.iter().map(|&l| l as i64).sum();
        let mut l = 0i64;
        // Zero levels are always worth descending into (corners are
        // unconditional); positive levels are bounded by the level-sum cap.
        while l == 0 || used + l <= self.n as i64 {
            current.push(l as u32);
            self.enumerate_levels(current, out);
            current.pop();
            l += 1;
        }
    }

    fn admits(&self, level: &[u32]) -> bool {
        let zeros = level.iter().filter(|&&l| l == 0).count();
        let sum: i64 = level.iter().map(|&l| l as i64).sum();
        if zeros == self.d {
            return true;
        }
        if zeros == 0 {
            return sum <= self.n as i64;
        }
        sum + (self.b as i64) * zeros as i64 <= self.n as i64
    }

    pub fn generate(&self, distribution: Distribution) -> GridPointSet {
        let mut set = GridPointSet::new(self.d, distribution);
        for level in self.level_vectors() {
            cartesian_hierarchical(&level, &mut set, None);
        }
        set
    }

    /// Number of points the combinatorial generator produces, without
    /// materializing them (the large named cases are several million points).
    pub fn count_generated(&self) -> u64 {
        self.level_vectors()
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(|&l| hierarchical_indices(l).len() as u64)
                    .product::<u64>()
            })
            .sum()
    }
}

/// Sparse grid built from an explicit set of active level vectors: the union
/// of the Cartesian products of per-dimension hierarchical indices.
#[derive(Clone, Debug)]
pub struct DimensionallyAdaptiveSparse {
    levels: Vec<Vec<u32>>,
    dim: usize,
}

impl DimensionallyAdaptiveSparse {
    pub fn new(levels: Vec<Vec<u32>>) -> Result<Self, GridError> {
        let dim = levels.first().map_or(0, |l| l.len());
        if dim == 0 {
            return Err(GridError::InvalidDimension(0));
        }
        if let Some(bad) = levels.iter().find(|l| l.len() != dim) {
            return Err(GridError::LevelVectorDimensionMismatch {
                expected: dim,
                found: bad.len(),
            });
        }
        Ok(Self { levels, dim })
    }

    pub fn generate(&self, distribution: Distribution) -> GridPointSet {
        let mut set = GridPointSet::new(self.dim, distribution);
        let mut seen = HashSet::new();
        for level in &self.levels {
            cartesian_hierarchical(level, &mut set, Some(&mut seen));
        }
        set
    }
}

/// Full (tensor-product) grid of the level vector l: every hierarchical pair
/// (l', i') with l' <= l componentwise. The interior variant restricts to
/// l' >= 1.
#[derive(Clone, Debug)]
pub struct FullGrid {
    pub levels: Vec<u32>,
    pub with_boundary: bool,
}

impl FullGrid {
    pub fn interior(levels: Vec<u32>) -> Self {
        Self {
            levels,
            with_boundary: false,
        }
    }

    pub fn with_boundary(levels: Vec<u32>) -> Self {
        Self {
            levels,
            with_boundary: true,
        }
    }

    pub fn size(&self) -> u64 {
        self.levels
            .iter()
            .map(|&l| {
                if self.with_boundary {
                    (1u64 << l) + 1
                } else {
                    (1u64 << l) - 1
                }
            })
            .product()
    }

    pub fn generate(&self, distribution: Distribution) -> GridPointSet {
        let dim = self.levels.len();
        let per_dim: Vec<Vec<(u32, i64)>> = self
            .levels
            .iter()
            .map(|&l_max| {
                let start = if self.with_boundary { 0 } else { 1 };
                let mut pairs = Vec::new();
                for l in start..=l_max {
                    for i in hierarchical_indices(l) {
                        pairs.push((l, i));
                    }
                }
                pairs
            })
            .collect();

        let mut set = GridPointSet::new(dim, distribution);
        for pairs in per_dim
            .iter()
            .map(|pairs| pairs.iter().copied())
            .multi_cartesian_product()
        {
            let level: Vec<u32> = pairs.iter().map(|&(l, _)| l).collect();
            let index: Vec<i64> = pairs.iter().map(|&(_, i)| i).collect();
            set.push(&level, &index);
        }
        set
    }
}

/// Spatially adaptive sparse grid: an insertion-ordered point list that grows
/// by refining single points, adding up to two children per dimension.
#[derive(Clone, Debug)]
pub struct SpatiallyAdaptiveSparse {
    points: GridPointSet,
    present: HashSet<(Vec<u32>, Vec<i64>)>,
}

impl SpatiallyAdaptiveSparse {
    pub fn new(
        levels: &[Vec<u32>],
        indices: &[Vec<i64>],
        distribution: Distribution,
    ) -> Result<Self, GridError> {
        let points = GridPointSet::from_pairs(levels, indices, distribution)?;
        let mut present = HashSet::new();
        for k in 0..points.len() {
            present.insert((points.level(k).to_vec(), points.index(k).to_vec()));
        }
        Ok(Self { points, present })
    }

    pub fn points(&self) -> &GridPointSet {
        &self.points
    }

    /// Refines point `k`: for every dimension, inserts the child pairs
    /// (l+1, 2i-1) and (l+1, 2i+1), or the single level-1 child of a level-0
    /// point (refining the other boundary side would duplicate it). Points
    /// already present are skipped. Returns the number of points added.
    pub fn refine(&mut self, k: usize) -> Result<usize, GridError> {
        if k >= self.points.len() {
            return Err(GridError::PointOutOfRange(k, self.points.len()));
        }
        let parent_level = self.points.level(k).to_vec();
        let parent_index = self.points.index(k).to_vec();
        let mut added = 0;
        for t in 0..self.points.dim() {
            let (l, i) = (parent_level[t], parent_index[t]);
            let children: Vec<(u32, i64)> = if l == 0 {
                vec![(1, 1)]
            } else {
                vec![(l + 1, 2 * i - 1), (l + 1, 2 * i + 1)]
            };
            for (cl, ci) in children {
                let mut level = parent_level.clone();
                let mut index = parent_index.clone();
                level[t] = cl;
                index[t] = ci;
                if self.present.insert((level.clone(), index.clone())) {
                    self.points.push(&level, &index);
                    added += 1;
                }
            }
        }
        Ok(added)
    }
}
