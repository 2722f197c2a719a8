//! Single-owner handles for engine result buffers
//!
//! Every call into the analysis engine that produces a result buffer returns
//! a `BufferHandle`. The handle is the only owner of that buffer: it is moved,
//! never copied, and `release` drops the payload and nulls the handle so that
//! later reads surface a `NullHandle` error instead of touching freed state.

use crate::error::{Result, SqlscopeError};

/// Owning handle for one engine result buffer.
///
/// `release` is idempotent: releasing an already-released or null handle is a
/// no-op. Reading through a released handle is a caller bug and reported as
/// `SqlscopeError::NullHandle`.
#[derive(Debug)]
pub struct BufferHandle<T> {
    inner: Option<Box<T>>,
    label: &'static str,
}

impl<T> BufferHandle<T> {
    /// Wrap a freshly produced engine result
    pub fn new(value: T) -> Self {
        Self {
            inner: Some(Box::new(value)),
            label: std::any::type_name::<T>(),
        }
    }

    /// A handle that never held a buffer
    pub fn null() -> Self {
        Self {
            inner: None,
            label: std::any::type_name::<T>(),
        }
    }

    /// Read the buffer contents, failing on a released or null handle
    pub fn read(&self) -> Result<&T> {
        debug_assert!(
            self.inner.is_some(),
            "read through released buffer handle: {}",
            self.label
        );
        self.inner
            .as_deref()
            .ok_or(SqlscopeError::NullHandle(self.label))
    }

    /// Read the buffer contents, treating a null handle as "nothing to show"
    pub fn get(&self) -> Option<&T> {
        self.inner.as_deref()
    }

    /// Whether the handle currently holds no buffer
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Release the buffer. Safe to call any number of times.
    pub fn release(&mut self) {
        self.inner = None;
    }

    /// Release this handle and replace it with a new one in a single step
    pub fn replace(&mut self, next: BufferHandle<T>) {
        self.release();
        *self = next;
    }
}

impl<T> Default for BufferHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_release() {
        let mut handle = BufferHandle::new(42u32);
        assert!(!handle.is_null());
        assert_eq!(*handle.read().unwrap(), 42);

        handle.release();
        assert!(handle.is_null());
        assert!(handle.get().is_none());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "released buffer handle"))]
    fn test_read_after_release_is_null_handle() {
        let mut handle = BufferHandle::new("buffer".to_string());
        handle.release();
        match handle.read() {
            Err(SqlscopeError::NullHandle(_)) => {}
            other => panic!("expected null handle error, got {other:?}"),
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut handle = BufferHandle::new(vec![1, 2, 3]);
        handle.release();
        handle.release();
        handle.release();
        assert!(handle.is_null());

        let mut never_filled: BufferHandle<u32> = BufferHandle::null();
        never_filled.release();
        assert!(never_filled.is_null());
    }

    #[test]
    fn test_replace_releases_previous() {
        let mut handle = BufferHandle::new(1u32);
        handle.replace(BufferHandle::new(2u32));
        assert_eq!(*handle.read().unwrap(), 2);

        handle.replace(BufferHandle::null());
        assert!(handle.is_null());
    }
}
