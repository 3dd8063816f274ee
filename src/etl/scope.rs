//! Scoped resources with guaranteed setup and cleanup
//!
//! Every role in a pipe (extractor, writer, composed sources) is a
//! [`Cleanable`]. The lifecycle itself lives in [`Resource`], and the only way
//! to use a resource is through the [`Scope`] guard returned by
//! [`Resource::enter`]. Dropping the guard runs cleanup, so an early return,
//! a `?` or an abandoned iterator all release the resource.

use super::LifecycleError;
use eyre::Result;
use std::any::type_name;
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Acquire/release hooks run around a block of use
///
/// Both hooks default to no-ops for roles that own no external resource.
pub trait Cleanable {
    /// Acquire whatever the resource needs (open files, reset buffers)
    ///
    /// # Errors
    /// A failed setup leaves the resource inactive; cleanup is not run.
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release what setup acquired
    ///
    /// # Errors
    /// Returned from [`Scope::exit`]. When cleanup runs while unwinding from an
    /// earlier failure the error is logged and the earlier failure wins.
    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Where a resource is in its single setup/cleanup cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    NotEntered,
    Active,
    Exited,
}

/// A [`Cleanable`] together with its lifecycle state
pub struct Resource<R> {
    inner: R,
    lifecycle: Lifecycle,
}

impl<R> Resource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            lifecycle: Lifecycle::NotEntered,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> From<R> for Resource<R> {
    fn from(inner: R) -> Self {
        Self::new(inner)
    }
}

impl<R: Cleanable> Resource<R> {
    /// Run setup and hand out the guard that owns the active scope
    ///
    /// # Errors
    /// [`LifecycleError::AlreadyActive`] or [`LifecycleError::AlreadyExited`]
    /// when the resource is not fresh, otherwise whatever setup returns.
    pub fn enter(&mut self) -> Result<Scope<'_, R>> {
        match self.lifecycle {
            Lifecycle::NotEntered => {}
            Lifecycle::Active => return Err(LifecycleError::AlreadyActive.into()),
            Lifecycle::Exited => return Err(LifecycleError::AlreadyExited.into()),
        }

        log::debug!("Entering scope of {}", type_name::<R>());
        self.inner.setup()?;
        self.lifecycle = Lifecycle::Active;

        Ok(Scope { resource: self })
    }
}

/// Guard over an active resource; cleanup runs exactly once when it ends
pub struct Scope<'a, R: Cleanable> {
    resource: &'a mut Resource<R>,
}

impl<R: Cleanable> Scope<'_, R> {
    /// Leave the scope, surfacing any cleanup error
    ///
    /// # Errors
    /// Whatever [`Cleanable::cleanup`] returns.
    pub fn exit(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        if self.resource.lifecycle != Lifecycle::Active {
            return Ok(());
        }

        // Marked exited before cleanup runs so a failing cleanup is never retried.
        self.resource.lifecycle = Lifecycle::Exited;
        log::debug!("Leaving scope of {}", type_name::<R>());
        self.resource.inner.cleanup()
    }
}

impl<R: Cleanable> Deref for Scope<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource.inner
    }
}

impl<R: Cleanable> DerefMut for Scope<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.resource.inner
    }
}

impl<R: Cleanable> Drop for Scope<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("Cleanup of {} failed: {:#}", type_name::<R>(), err);
        }
    }
}

/// Set up both sides of a combined source, releasing the left if the right fails
pub(crate) fn setup_pair(left: &mut impl Cleanable, right: &mut impl Cleanable) -> Result<()> {
    left.setup()?;
    if let Err(err) = right.setup() {
        if let Err(cleanup_err) = left.cleanup() {
            log::warn!("Cleanup of left source failed: {:#}", cleanup_err);
        }
        return Err(err);
    }
    Ok(())
}

/// Clean up both sides in reverse order; the first error wins
pub(crate) fn cleanup_pair(left: &mut impl Cleanable, right: &mut impl Cleanable) -> Result<()> {
    let right = right.cleanup();
    let left = left.cleanup();
    right.and(left)
}

/// A resource handle shared between its owner and the records read from it
///
/// The owner opens the handle in setup and closes it in cleanup. Records hold
/// a clone, so closing the handle ends every outstanding sequence: a pull
/// after cleanup yields [`LifecycleError::Closed`].
pub struct Handle<T> {
    slot: Rc<RefCell<Option<T>>>,
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> Handle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, value: T) {
        *self.slot.borrow_mut() = Some(value);
    }

    /// Take the value out, closing the handle for every clone
    pub fn close(&self) -> Option<T> {
        self.slot.borrow_mut().take()
    }

    pub fn is_open(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Run `use_it` on the open value
    ///
    /// # Errors
    /// [`LifecycleError::Closed`] once the handle has been closed.
    pub fn with<O>(&self, use_it: impl FnOnce(&mut T) -> O) -> Result<O> {
        match self.slot.borrow_mut().as_mut() {
            Some(value) => Ok(use_it(value)),
            None => Err(LifecycleError::Closed.into()),
        }
    }
}
