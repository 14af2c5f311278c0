use std::ops::{Deref, DerefMut, Range};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Backing buffer shared by every view sliced from the same tensor.
pub(crate) struct Buffer<T> {
    data: RwLock<Vec<T>>,
}

impl<T> Buffer<T> {
    pub(crate) fn new(data: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) enum Storage<'a, T> {
    Owned(Arc<Buffer<T>>),
    Borrowed(&'a [T]),
}

impl<T> Clone for Storage<'_, T> {
    fn clone(&self) -> Self {
        match self {
            Storage::Owned(buffer) => Storage::Owned(Arc::clone(buffer)),
            Storage::Borrowed(slice) => Storage::Borrowed(slice),
        }
    }
}

impl<'a, T> Storage<'a, T> {
    pub(crate) fn read(&self, range: Range<usize>) -> ReadGuard<'_, T> {
        match self {
            Storage::Owned(buffer) => ReadGuard(ReadInner::Locked(buffer.read(), range)),
            Storage::Borrowed(slice) => ReadGuard(ReadInner::Borrowed(&slice[range])),
        }
    }

    pub(crate) fn write(&self, range: Range<usize>) -> Option<WriteGuard<'_, T>> {
        match self {
            Storage::Owned(buffer) => Some(WriteGuard(WriteInner::Locked(buffer.write(), range))),
            Storage::Borrowed(_) => None,
        }
    }

    pub(crate) fn ref_count(&self) -> usize {
        match self {
            Storage::Owned(buffer) => Arc::strong_count(buffer),
            Storage::Borrowed(_) => 0,
        }
    }

    pub(crate) fn is_owned(&self) -> bool {
        matches!(self, Storage::Owned(_))
    }

    pub(crate) fn same_as(&self, other: &Storage<'_, T>) -> bool {
        match (self, other) {
            (Storage::Owned(a), Storage::Owned(b)) => Arc::ptr_eq(a, b),
            (Storage::Borrowed(a), Storage::Borrowed(b)) => std::ptr::eq(a.as_ptr(), b.as_ptr()),
            _ => false,
        }
    }

    /// Re-tag owned storage with any lifetime; borrowed storage is returned as-is.
    pub(crate) fn into_static(self) -> Result<Storage<'static, T>, &'a [T]> {
        match self {
            Storage::Owned(buffer) => Ok(Storage::Owned(buffer)),
            Storage::Borrowed(slice) => Err(slice),
        }
    }
}

/// Scoped read access to a tensor's elements.
pub struct ReadGuard<'g, T>(ReadInner<'g, T>);

enum ReadInner<'g, T> {
    Locked(RwLockReadGuard<'g, Vec<T>>, Range<usize>),
    Borrowed(&'g [T]),
    Empty,
}

impl<T> ReadGuard<'_, T> {
    pub(crate) fn empty() -> Self {
        ReadGuard(ReadInner::Empty)
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match &self.0 {
            ReadInner::Locked(guard, range) => &guard[range.clone()],
            ReadInner::Borrowed(slice) => slice,
            ReadInner::Empty => &[],
        }
    }
}

/// Scoped write access to an owned tensor's elements.
///
/// Writes are visible through every view that shares the buffer.
pub struct WriteGuard<'g, T>(WriteInner<'g, T>);

enum WriteInner<'g, T> {
    Locked(RwLockWriteGuard<'g, Vec<T>>, Range<usize>),
    Empty,
}

impl<T> WriteGuard<'_, T> {
    pub(crate) fn empty() -> Self {
        WriteGuard(WriteInner::Empty)
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match &self.0 {
            WriteInner::Locked(guard, range) => &guard[range.clone()],
            WriteInner::Empty => &[],
        }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        match &mut self.0 {
            WriteInner::Locked(guard, range) => &mut guard[range.clone()],
            WriteInner::Empty => &mut [],
        }
    }
}
