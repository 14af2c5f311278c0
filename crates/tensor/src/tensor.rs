use crate::Element;
use crate::errors::{Result, TensorError, shape_err};
use crate::shape::Shape;
use crate::storage::{Buffer, ReadGuard, Storage, WriteGuard};
use std::fmt;

/// N-dimensional row-major array over shared storage.
///
/// Owned tensors keep their elements in a reference-counted buffer. Cloning a
/// tensor, slicing it or reshaping it produces another view of the same
/// buffer, and a write through any view is visible through all of them. There
/// is no copy-on-write: use [`Tensor::deep_clone`] for an independent copy.
///
/// Borrowed tensors wrap a caller-owned slice without copying it. They are
/// read-only and every view derived from them stays borrowed.
///
/// A tensor with an empty shape is "absent"; operations on it short-circuit
/// to another absent tensor or an empty result.
pub struct Tensor<'a, T = f32> {
    storage: Option<Storage<'a, T>>,
    offset: usize,
    shape: Shape,
}

impl<T: Element> Tensor<'static, T> {
    /// Allocate zero-filled (`T::default()`) owned storage.
    pub fn zeros(shape: &[usize]) -> Result<Self> {
        Self::full(shape, T::default())
    }

    pub fn full(shape: &[usize], value: T) -> Result<Self> {
        let shape = Shape::new(shape)?;
        if shape.is_empty() {
            return Ok(Self::absent());
        }
        let data = vec![value; shape.size()];
        Ok(Self::owned(shape, data))
    }

    /// Take ownership of `data` laid out row-major in `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let shape = Shape::new(shape)?;
        if shape.is_empty() {
            return Ok(Self::absent());
        }
        if data.len() != shape.size() {
            return Err(shape_err!(
                "shape {:?} needs {} elements, got {}",
                shape.dims(),
                shape.size(),
                data.len()
            ));
        }
        Ok(Self::owned(shape, data))
    }

    pub fn from_slice(shape: &[usize], data: &[T]) -> Result<Self> {
        Self::from_vec(shape, data.to_vec())
    }

    fn owned(shape: Shape, data: Vec<T>) -> Self {
        Self {
            storage: Some(Storage::Owned(Buffer::new(data))),
            offset: 0,
            shape,
        }
    }
}

impl<'a, T: Element> Tensor<'a, T> {
    pub fn absent() -> Self {
        Self {
            storage: None,
            offset: 0,
            shape: Shape::default(),
        }
    }

    /// Wrap a caller-owned buffer without copying it.
    ///
    /// `data` may be longer than the shape requires; the leading elements are used.
    pub fn from_view(shape: &[usize], data: &'a [T]) -> Result<Self> {
        let shape = Shape::new(shape)?;
        if shape.is_empty() {
            return Ok(Self::absent());
        }
        if data.len() < shape.size() {
            return Err(shape_err!(
                "view of shape {:?} needs {} elements, buffer holds {}",
                shape.dims(),
                shape.size(),
                data.len()
            ));
        }
        Ok(Self {
            storage: Some(Storage::Borrowed(data)),
            offset: 0,
            shape,
        })
    }

    pub fn is_absent(&self) -> bool {
        self.storage.is_none() || self.shape.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn strides(&self) -> &[usize] {
        self.shape.strides()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn size(&self) -> usize {
        if self.storage.is_none() {
            0
        } else {
            self.shape.size()
        }
    }

    /// Whether the elements live in shared owned storage (as opposed to a borrowed view).
    pub fn is_owned(&self) -> bool {
        self.storage.as_ref().is_some_and(Storage::is_owned)
    }

    /// Number of live handles on the owned buffer; 0 for borrowed or absent tensors.
    pub fn ref_count(&self) -> usize {
        self.storage.as_ref().map_or(0, Storage::ref_count)
    }

    pub fn shares_storage_with<'b>(&self, other: &Tensor<'b, T>) -> bool {
        match (&self.storage, &other.storage) {
            (Some(a), Some(b)) => a.same_as(b),
            _ => false,
        }
    }

    /// View `new_shape` elements starting `offset` elements into this tensor.
    ///
    /// One dimension may be `-1` and is inferred from the elements remaining
    /// after `offset`. The result shares storage with `self`.
    pub fn slice(&self, offset: usize, new_shape: &[isize]) -> Result<Tensor<'a, T>> {
        let Some(storage) = &self.storage else {
            return Ok(Self::absent());
        };
        if new_shape.is_empty() {
            return Ok(Self::absent());
        }

        let size = self.shape.size();
        if offset >= size {
            return Err(shape_err!(
                "slice offset {} out of bounds for {} elements",
                offset,
                size
            ));
        }

        let shape = Shape::resolve(new_shape, size - offset)?;
        Ok(Tensor {
            storage: Some(storage.clone()),
            offset: self.offset + offset,
            shape,
        })
    }

    /// View the same elements under another shape (`-1` allowed once).
    pub fn reshape(&self, new_shape: &[isize]) -> Result<Tensor<'a, T>> {
        self.slice(0, new_shape)
    }

    /// View of the sub-tensor at `index` along the outermost axis.
    pub fn outer(&self, index: usize) -> Result<Tensor<'a, T>> {
        if self.is_absent() {
            return Ok(Self::absent());
        }
        let dims = self.shape.dims();
        if index >= dims[0] {
            return Err(shape_err!(
                "index {} out of bounds for outer dimension {}",
                index,
                dims[0]
            ));
        }
        if dims.len() == 1 {
            return self.slice(index, &[1]);
        }
        let inner: Vec<isize> = dims[1..].iter().map(|&d| d as isize).collect();
        self.slice(index * self.shape.strides()[0], &inner)
    }

    /// Flat offset `Σ strides[i] * coords[i]` relative to this view.
    ///
    /// `None` skips an axis, so a prefix of coordinates addresses the start of
    /// a sub-tensor. Coordinates are not bounds-checked; see [`Tensor::index_of`].
    pub fn index(&self, coords: &[Option<usize>]) -> usize {
        self.shape
            .strides()
            .iter()
            .zip(coords)
            .filter_map(|(stride, coord)| coord.map(|c| stride * c))
            .sum()
    }

    /// Bounds-checked flat offset for a full set of coordinates.
    pub fn index_of(&self, coords: &[usize]) -> Result<usize> {
        let dims = self.shape.dims();
        if coords.len() != dims.len() {
            return Err(shape_err!(
                "expected {} coordinates, got {}",
                dims.len(),
                coords.len()
            ));
        }
        if let Some(axis) = coords.iter().zip(dims).position(|(c, d)| c >= d) {
            return Err(shape_err!(
                "coordinate {} out of bounds for axis {} of size {}",
                coords[axis],
                axis,
                dims[axis]
            ));
        }
        Ok(coords
            .iter()
            .zip(self.shape.strides())
            .map(|(c, s)| c * s)
            .sum())
    }

    pub fn get(&self, coords: &[usize]) -> Result<T> {
        let idx = self.index_of(coords)?;
        Ok(self.read()[idx])
    }

    pub fn set(&self, coords: &[usize], value: T) -> Result<()> {
        let idx = self.index_of(coords)?;
        self.write()?[idx] = value;
        Ok(())
    }

    /// Lock the elements of this view for reading.
    pub fn read(&self) -> ReadGuard<'_, T> {
        match &self.storage {
            Some(storage) => storage.read(self.offset..self.offset + self.shape.size()),
            None => ReadGuard::empty(),
        }
    }

    /// Lock the elements of this view for writing. Fails on borrowed views.
    pub fn write(&self) -> Result<WriteGuard<'_, T>> {
        match &self.storage {
            Some(storage) => storage
                .write(self.offset..self.offset + self.shape.size())
                .ok_or(TensorError::ReadOnly),
            None => Ok(WriteGuard::empty()),
        }
    }

    pub fn fill(&self, value: T) -> Result<()> {
        self.write()?.fill(value);
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.read().to_vec()
    }

    /// Copy this view's elements into fresh owned storage.
    pub fn deep_clone(&self) -> Tensor<'static, T> {
        if self.is_absent() {
            return Tensor::absent();
        }
        Tensor::owned(self.shape.clone(), self.to_vec())
    }

    /// Detach from any borrowed buffer. Owned views keep sharing their storage.
    pub fn into_owned(self) -> Tensor<'static, T> {
        let Some(storage) = self.storage else {
            return Tensor::absent();
        };
        match storage.into_static() {
            Ok(storage) => Tensor {
                storage: Some(storage),
                offset: self.offset,
                shape: self.shape,
            },
            Err(slice) => {
                let data = slice[self.offset..self.offset + self.shape.size()].to_vec();
                Tensor::owned(self.shape, data)
            }
        }
    }

    /// Expand to `target` with trailing-dimension alignment.
    ///
    /// Each source dimension must equal the aligned target dimension or be 1.
    /// The result is always a new owned tensor.
    pub fn broadcast(&self, target: &[usize]) -> Result<Tensor<'static, T>> {
        if self.is_absent() {
            return Ok(Tensor::absent());
        }

        let src_dims = self.shape.dims();
        if target.len() < src_dims.len() {
            return Err(shape_err!(
                "cannot broadcast {:?} to lower rank {:?}",
                src_dims,
                target
            ));
        }
        let lead = target.len() - src_dims.len();
        for (axis, (&s, &t)) in src_dims.iter().zip(&target[lead..]).enumerate() {
            if s != t && s != 1 {
                return Err(shape_err!(
                    "cannot broadcast {:?} to {:?}: axis {} has {} vs {}",
                    src_dims,
                    target,
                    axis,
                    s,
                    t
                ));
            }
        }

        let target_shape = Shape::new(target)?;
        let src_strides = self.shape.strides();
        let src = self.read();

        let total = target_shape.size();
        let mut out = Vec::with_capacity(total);
        let mut coord = vec![0usize; target.len()];
        for _ in 0..total {
            let mut offset = 0;
            for (axis, &d) in src_dims.iter().enumerate() {
                if d != 1 {
                    offset += src_strides[axis] * coord[lead + axis];
                }
            }
            out.push(src[offset]);

            for axis in (0..target.len()).rev() {
                coord[axis] += 1;
                if coord[axis] < target[axis] {
                    break;
                }
                coord[axis] = 0;
            }
        }

        Ok(Tensor::owned(target_shape, out))
    }
}

impl<T> Clone for Tensor<'_, T> {
    /// Another view of the same storage.
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            offset: self.offset,
            shape: self.shape.clone(),
        }
    }
}

impl<T: Element> Default for Tensor<'_, T> {
    fn default() -> Self {
        Self::absent()
    }
}

impl<'b, T: Element> PartialEq<Tensor<'b, T>> for Tensor<'_, T> {
    fn eq(&self, other: &Tensor<'b, T>) -> bool {
        self.shape() == other.shape() && *self.read() == *other.read()
    }
}

impl<T: Element> fmt::Debug for Tensor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape.dims())
            .field("offset", &self.offset)
            .field("owned", &self.is_owned())
            .finish()
    }
}
