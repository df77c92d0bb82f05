//! Scope guard for native handles
//!
//! Most NDI objects come with a C-style destroy function that must be called exactly
//! once. [`DeleteGuard`] pairs a handle with that function and calls it when the guard
//! goes out of scope, on every exit path including early returns and unwinding.

use std::fmt;

use super::{FindInstance, FrameSyncInstance, RecvInstance};

/// A handle that may be null
pub trait NullableHandle: Copy {
    fn is_null(&self) -> bool;
}

impl<T> NullableHandle for *mut T {
    fn is_null(&self) -> bool {
        <*mut T>::is_null(*self)
    }
}

impl<T> NullableHandle for *const T {
    fn is_null(&self) -> bool {
        <*const T>::is_null(*self)
    }
}

impl NullableHandle for FindInstance {
    fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl NullableHandle for RecvInstance {
    fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl NullableHandle for FrameSyncInstance {
    fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

/// Calls `release(handle)` on drop if the handle is non-null.
///
/// The guard is neither `Clone` nor `Copy`, so a handle cannot be released twice through
/// it. The handle is fixed at construction; the only way to skip the release is
/// [`DeleteGuard::disarm`].
pub struct DeleteGuard<H: NullableHandle, F: FnOnce(H)> {
    handle: H,
    release: Option<F>,
}

impl<H: NullableHandle, F: FnOnce(H)> DeleteGuard<H, F> {
    pub fn new(release: F, handle: H) -> Self {
        Self {
            handle,
            release: Some(release),
        }
    }

    /// The guarded handle
    pub fn get(&self) -> H {
        self.handle
    }

    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }

    /// Will dropping this guard call the release function?
    pub fn is_armed(&self) -> bool {
        self.release.is_some() && !self.handle.is_null()
    }

    /// Give up ownership without releasing
    pub fn disarm(mut self) -> H {
        self.release = None;
        self.handle
    }
}

impl<H: NullableHandle, F: FnOnce(H)> Drop for DeleteGuard<H, F> {
    fn drop(&mut self) {
        if self.handle.is_null() {
            return;
        }
        if let Some(release) = self.release.take() {
            release(self.handle);
        }
    }
}

impl<H: NullableHandle + fmt::Debug, F: FnOnce(H)> fmt::Debug for DeleteGuard<H, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteGuard")
            .field("handle", &self.handle)
            .field("armed", &self.is_armed())
            .finish()
    }
}
