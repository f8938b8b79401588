//! Grouping of merged columns by nonzero structure

use std::ops::Range;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, NdFloat};

use crate::{deflation::ColumnType, perm::Permutation, LinalgError, Result};

/// Diagonal and singular vectors reordered by [`ColumnType`]
#[derive(Debug, Clone)]
pub struct Packing<A> {
    /// Maps positions in the deflation order to packed positions. Undeflated positions are
    /// mapped onto undeflated positions.
    pub perm: Permutation,
    /// Number of columns of each type, indexed by [`ColumnType::index`]
    pub counts: [usize; ColumnType::COUNT],
    pub d: Array1<A>,
    pub u: Array2<A>,
    pub v: Array2<A>,
}

impl<A> Packing<A> {
    /// Packed columns of the given type
    pub fn range(&self, ty: ColumnType) -> Range<usize> {
        let start: usize = self.counts[..ty.index()].iter().sum();
        start..start + self.counts[ty.index()]
    }
}

/// Copies `d` and the columns of `u` and `v` into packed order.
///
/// `types`, `d` and `deflation_perm` are indexed by sorted position, and `columns[j]` is the
/// column of `u` and `v` holding the vectors of sorted index `j`. The packed `u` keeps all rows
/// of `u`, the packed `v` all rows of `v`; both get one column per sorted index. Fails if the
/// per-index inputs differ in length.
pub fn pack<A: NdFloat>(
    types: &[ColumnType],
    deflation_perm: &Permutation,
    d: ArrayView1<A>,
    u: ArrayView2<A>,
    v: ArrayView2<A>,
    columns: &[usize],
) -> Result<Packing<A>> {
    let m = types.len();
    for actual in [d.len(), deflation_perm.len(), columns.len()] {
        if actual != m {
            return Err(LinalgError::WrongLength {
                expected: m,
                actual,
            });
        }
    }

    let mut counts = [0; ColumnType::COUNT];
    for ty in types {
        counts[ty.index()] += 1;
    }
    let mut offsets = [0; ColumnType::COUNT];
    for ty in 1..ColumnType::COUNT {
        offsets[ty] = offsets[ty - 1] + counts[ty - 1];
    }

    let mut image = vec![0; m];
    let mut packed_d = Array1::zeros(m);
    let mut packed_u = Array2::zeros((u.nrows(), m));
    let mut packed_v = Array2::zeros((v.nrows(), m));
    for (j, ty) in types.iter().enumerate() {
        let dest = offsets[ty.index()];
        offsets[ty.index()] += 1;
        image[deflation_perm.image(j)] = dest;

        packed_d[dest] = d[j];
        packed_u.column_mut(dest).assign(&u.column(columns[j]));
        packed_v.column_mut(dest).assign(&v.column(columns[j]));
    }

    Ok(Packing {
        perm: Permutation::from_images_unchecked(image),
        counts,
        d: packed_d,
        u: packed_u,
        v: packed_v,
    })
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use super::*;

    #[test]
    fn pack_by_type() {
        use ColumnType::*;

        let types = [Dense, Deflated, SecondBlock, FirstBlock, Deflated];
        // Undeflated 0, 2, 3 first, then deflated 4, 1 from the back
        let deflation_perm = Permutation::from_images(vec![0, 4, 1, 2, 3]).unwrap();
        let d = array![0., 1., 2., 3., 4.];
        let u = Array2::from_shape_fn((5, 5), |(i, j)| (10 * i + j) as f64);
        let v = Array2::from_shape_fn((6, 5), |(i, j)| (10 * i + j) as f64);
        let columns = [2, 0, 1, 3, 4];
        let packing =
            pack(&types, &deflation_perm, d.view(), u.view(), v.view(), &columns).unwrap();

        assert_eq!(packing.counts, [1, 1, 1, 2]);
        assert_eq!(packing.range(FirstBlock), 0..1);
        assert_eq!(packing.range(SecondBlock), 1..2);
        assert_eq!(packing.range(Dense), 2..3);
        assert_eq!(packing.range(Deflated), 3..5);
        assert_eq!(packing.d, array![3., 2., 0., 1., 4.]);
        assert_eq!(packing.u.column(0), u.column(3));
        assert_eq!(packing.u.column(2), u.column(2));
        assert_eq!(packing.v.column(3), v.column(0));
        assert_eq!(packing.v.nrows(), 6);
        // Undeflated positions stay undeflated
        assert_eq!(packing.perm.images(), &[2, 1, 0, 4, 3]);
        for pos in 0..3 {
            assert!(packing.perm.image(pos) < 3);
        }
    }

    #[test]
    fn pack_wrong_lengths() {
        let types = [ColumnType::Dense, ColumnType::FirstBlock];
        let perm = Permutation::identity(2);
        let u = Array2::<f64>::eye(2);
        assert!(matches!(
            pack(&types, &perm, array![0., 1., 2.].view(), u.view(), u.view(), &[0, 1]),
            Err(LinalgError::WrongLength { expected: 2, actual: 3 })
        ));
        let short = Permutation::identity(1);
        assert!(matches!(
            pack(&types, &short, array![0., 1.].view(), u.view(), u.view(), &[0, 1]),
            Err(LinalgError::WrongLength { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            pack(&types, &perm, array![0., 1.].view(), u.view(), u.view(), &[0]),
            Err(LinalgError::WrongLength { expected: 2, actual: 1 })
        ));
    }
}
