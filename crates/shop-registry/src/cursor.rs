//! Lazy, single-pass, possibly-failing sequences.
//!
//! Every listing in the registry is a [`Cursor`]. A cursor is pulled one
//! element at a time with [`Cursor::next_item`], which yields `Ok(Some(_))`
//! for an element, `Ok(None)` once exhausted, or an error.
//!
//! [`Fuse`] enforces the terminal contract: after the first `Ok(None)` or
//! `Err(_)` every later call returns the same result, and the wrapped cursor
//! (with any directory handle it owns) is dropped at that moment, exactly
//! once. Cursors handed out by the registry are always fused.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{RegistryError, Result};

/// A pull-based sequence of `Item`s.
pub trait Cursor {
    type Item;

    /// Fetch the next element, `None` on exhaustion.
    fn next_item(&mut self) -> Result<Option<Self::Item>>;
}

/// A type-erased cursor borrowing from `'a`.
pub type BoxCursor<'a, T> = Box<dyn Cursor<Item = T> + 'a>;

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    type Item = C::Item;

    fn next_item(&mut self) -> Result<Option<Self::Item>> {
        (**self).next_item()
    }
}

enum FuseState<C> {
    Active(C),
    Exhausted,
    Failed(RegistryError),
}

/// Cursor adapter making the first terminal result sticky.
pub struct Fuse<C> {
    state: FuseState<C>,
}

impl<C: Cursor> Fuse<C> {
    pub fn new(inner: C) -> Self {
        Fuse {
            state: FuseState::Active(inner),
        }
    }

    /// Whether the cursor has reached a terminal result.
    pub fn is_terminated(&self) -> bool {
        !matches!(self.state, FuseState::Active(_))
    }
}

impl<C: Cursor> Cursor for Fuse<C> {
    type Item = C::Item;

    fn next_item(&mut self) -> Result<Option<C::Item>> {
        let result = match &mut self.state {
            FuseState::Active(inner) => inner.next_item(),
            FuseState::Exhausted => return Ok(None),
            FuseState::Failed(e) => return Err(e.clone()),
        };

        match &result {
            Ok(Some(_)) => {}
            Ok(None) => self.state = FuseState::Exhausted,
            Err(e) => self.state = FuseState::Failed(e.clone()),
        }
        result
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cursor that stops with [`RegistryError::Cancelled`] once its token is
/// raised, dropping the wrapped cursor on the first poll after that.
pub struct Cancellable<C> {
    inner: Option<C>,
    token: CancelToken,
}

impl<C: Cursor> Cursor for Cancellable<C> {
    type Item = C::Item;

    fn next_item(&mut self) -> Result<Option<C::Item>> {
        if self.token.is_cancelled() {
            self.inner = None;
            return Err(RegistryError::Cancelled);
        }
        match self.inner.as_mut() {
            Some(inner) => inner.next_item(),
            None => Err(RegistryError::Cancelled),
        }
    }
}

/// Cursor over an owned list of elements.
pub struct SliceCursor<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> SliceCursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        SliceCursor {
            items: items.into_iter(),
        }
    }
}

impl<T> Cursor for SliceCursor<T> {
    type Item = T;

    fn next_item(&mut self) -> Result<Option<T>> {
        Ok(self.items.next())
    }
}

/// Cursor that fails immediately, and forever.
pub struct ErrorCursor<T> {
    error: RegistryError,
    _item: PhantomData<fn() -> T>,
}

impl<T> ErrorCursor<T> {
    pub fn new(error: RegistryError) -> Self {
        ErrorCursor {
            error,
            _item: PhantomData,
        }
    }
}

impl<T> Cursor for ErrorCursor<T> {
    type Item = T;

    fn next_item(&mut self) -> Result<Option<T>> {
        Err(self.error.clone())
    }
}

/// Cursor with no elements.
pub struct EmptyCursor<T>(PhantomData<fn() -> T>);

impl<T> EmptyCursor<T> {
    pub fn new() -> Self {
        EmptyCursor(PhantomData)
    }
}

impl<T> Default for EmptyCursor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Cursor for EmptyCursor<T> {
    type Item = T;

    fn next_item(&mut self) -> Result<Option<T>> {
        Ok(None)
    }
}

/// Cursor resolving each inner element into zero or one outputs.
///
/// The closure returns `Ok(None)` to skip an element. The first error from
/// either the inner cursor or the closure is returned as-is; wrap in
/// [`Fuse`] to make it terminal.
pub struct TryFilterMap<C, F> {
    inner: C,
    f: F,
}

impl<C, F, T> Cursor for TryFilterMap<C, F>
where
    C: Cursor,
    F: FnMut(C::Item) -> Result<Option<T>>,
{
    type Item = T;

    fn next_item(&mut self) -> Result<Option<T>> {
        while let Some(item) = self.inner.next_item()? {
            if let Some(out) = (self.f)(item)? {
                return Ok(Some(out));
            }
        }
        Ok(None)
    }
}

/// Iterator over a cursor's results. Yields at most one error, then ends.
pub struct CursorIter<C> {
    inner: Fuse<C>,
    done: bool,
}

impl<C: Cursor> Iterator for CursorIter<C> {
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Combinators available on every cursor.
pub trait CursorExt: Cursor + Sized {
    fn fuse(self) -> Fuse<Self> {
        Fuse::new(self)
    }

    /// Stop with `Cancelled` once `token` is raised.
    fn cancel_on(self, token: &CancelToken) -> Fuse<Cancellable<Self>> {
        Fuse::new(Cancellable {
            inner: Some(self),
            token: token.clone(),
        })
    }

    fn try_filter_map<T, F>(self, f: F) -> TryFilterMap<Self, F>
    where
        F: FnMut(Self::Item) -> Result<Option<T>>,
    {
        TryFilterMap { inner: self, f }
    }

    fn boxed<'a>(self) -> BoxCursor<'a, Self::Item>
    where
        Self: 'a,
    {
        Box::new(self)
    }

    /// Drain the cursor, stopping at the first error.
    fn collect_vec(mut self) -> Result<Vec<Self::Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item()? {
            items.push(item);
        }
        Ok(items)
    }

    fn into_iter(self) -> CursorIter<Self> {
        CursorIter {
            inner: Fuse::new(self),
            done: false,
        }
    }
}

impl<C: Cursor> CursorExt for C {}
