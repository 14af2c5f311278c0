use crate::errors::{Result, shape_err};

/// Dimension sizes (outermost first) and their row-major strides.
///
/// A shape with no dimensions marks an absent tensor and has size 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Shape {
    dims: Vec<usize>,
    strides: Vec<usize>,
}

impl Shape {
    /// Build a shape, rejecting zero-sized dimensions.
    pub fn new(dims: &[usize]) -> Result<Self> {
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(shape_err!("dimension {} of {:?} is 0", axis, dims));
        }
        dims.iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| shape_err!("shape {:?} overflows usize", dims))?;

        Ok(Self {
            dims: dims.to_vec(),
            strides: row_major_strides(dims),
        })
    }

    /// Resolve a reshape request against `available` elements.
    ///
    /// At most one entry may be `-1`; it is inferred from the element count,
    /// which must divide exactly. Any other non-positive entry is rejected.
    pub fn resolve(requested: &[isize], available: usize) -> Result<Self> {
        let mut wildcard = None;
        let mut known = 1usize;

        for (axis, &d) in requested.iter().enumerate() {
            match d {
                -1 => {
                    if wildcard.replace(axis).is_some() {
                        return Err(shape_err!("more than one wildcard in {:?}", requested));
                    }
                }
                d if d > 0 => {
                    known = known
                        .checked_mul(d as usize)
                        .ok_or_else(|| shape_err!("shape {:?} overflows usize", requested))?;
                }
                _ => return Err(shape_err!("invalid dimension {} in {:?}", d, requested)),
            }
        }

        let mut dims: Vec<usize> = requested.iter().map(|&d| d.max(0) as usize).collect();

        if known > available {
            return Err(shape_err!(
                "shape {:?} needs {} elements, only {} available",
                requested,
                known,
                available
            ));
        }

        if let Some(axis) = wildcard {
            if available % known != 0 {
                return Err(shape_err!(
                    "cannot infer wildcard in {:?} from {} elements",
                    requested,
                    available
                ));
            }
            dims[axis] = available / known;
        }

        Self::new(&dims)
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn size(&self) -> usize {
        if self.dims.is_empty() {
            0
        } else {
            self.dims.iter().product()
        }
    }
}

fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}
