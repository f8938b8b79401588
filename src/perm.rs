//! Index permutations with cached inverse

use std::cmp::Ordering;

use crate::{LinalgError, Result};

/// A bijection on `0..n`, stored as both its image and preimage arrays.
///
/// Applying the permutation to a sequence `x` produces `y` with `y[image[i]] = x[i]`, so
/// `preimage[j]` names the source of entry `j` of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    image: Vec<usize>,
    preimage: Vec<usize>,
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        let image: Vec<usize> = (0..n).collect();
        Self {
            preimage: image.clone(),
            image,
        }
    }

    /// Builds a permutation from its image array, checking that it is a bijection.
    pub fn from_images(image: Vec<usize>) -> Result<Self> {
        let n = image.len();
        let mut preimage = vec![usize::MAX; n];
        for (i, &dest) in image.iter().enumerate() {
            if dest >= n || preimage[dest] != usize::MAX {
                return Err(LinalgError::NotPermutation);
            }
            preimage[dest] = i;
        }
        Ok(Self { image, preimage })
    }

    /// Builds a permutation from an image array already known to be a bijection.
    pub(crate) fn from_images_unchecked(image: Vec<usize>) -> Self {
        let mut preimage = vec![0; image.len()];
        for (i, &dest) in image.iter().enumerate() {
            preimage[dest] = i;
        }
        debug_assert!(Self::from_images(image.clone()).is_ok());
        Self { image, preimage }
    }

    /// Builds a permutation from its preimage array, checking that it is a bijection.
    pub fn from_preimages(preimage: Vec<usize>) -> Result<Self> {
        Ok(Self::from_images(preimage)?.inverse())
    }

    /// The stable permutation that sorts `values` in ascending order.
    ///
    /// Incomparable values (NaN) are treated as equal, which keeps them in place relative to
    /// each other.
    pub fn sorting<A: PartialOrd>(values: &[A]) -> Self {
        let mut preimage: Vec<usize> = (0..values.len()).collect();
        preimage.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(Ordering::Equal)
        });
        let mut image = vec![0; preimage.len()];
        for (j, &i) in preimage.iter().enumerate() {
            image[i] = j;
        }
        Self { image, preimage }
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// Destination of source index `i`
    pub fn image(&self, i: usize) -> usize {
        self.image[i]
    }

    /// Source of destination index `j`
    pub fn preimage(&self, j: usize) -> usize {
        self.preimage[j]
    }

    pub fn images(&self) -> &[usize] {
        &self.image
    }

    pub fn preimages(&self) -> &[usize] {
        &self.preimage
    }

    pub fn inverse(self) -> Self {
        Self {
            image: self.preimage,
            preimage: self.image,
        }
    }

    /// Applies the permutation to a sequence, returning `y` with `y[image[i]] = x[i]`.
    ///
    /// Panics if the lengths differ.
    pub fn permute<T: Clone>(&self, x: &[T]) -> Vec<T> {
        assert_eq!(self.len(), x.len());
        self.preimage.iter().map(|&i| x[i].clone()).collect()
    }
}
