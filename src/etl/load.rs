//! Writer trait for consuming records at the end of a pipe

use super::scope::{cleanup_pair, setup_pair};
use super::{Cleanable, Extractor, IterExtractor, Scope, extractor};
use eyre::Result;
use std::marker::PhantomData;

/// Writer trait for sending records to a destination
///
/// The destination is acquired in [`Cleanable::setup`] and released in
/// [`Cleanable::cleanup`]. Records only reach [`Writer::write`] through
/// [`Scope::drain`], so a writer is never fed outside its scope.
///
/// # Example
/// ```
/// use plumber::etl::{Cleanable, Resource, Writer};
/// use eyre::Result;
///
/// struct Sum(i64);
///
/// impl Cleanable for Sum {}
///
/// impl Writer for Sum {
///     type Item = i64;
///
///     fn write(&mut self, item: i64) -> Result<()> {
///         self.0 += item;
///         Ok(())
///     }
/// }
///
/// # fn main() -> Result<()> {
/// let mut sink = Resource::new(Sum(0));
/// let mut scope = sink.enter()?;
/// let written = scope.drain((1..=4).map(Ok))?;
/// scope.exit()?;
///
/// assert_eq!(written, 4);
/// assert_eq!(sink.get_ref().0, 10);
/// # Ok(())
/// # }
/// ```
pub trait Writer: Cleanable {
    /// The type of records consumed
    type Item;

    /// Write a single record
    ///
    /// # Errors
    /// Returns an error if the destination rejects the record; it aborts the run.
    fn write(&mut self, item: Self::Item) -> Result<()>;
}

impl<W: Writer> Scope<'_, W> {
    /// Pull every record from `records` and write it
    ///
    /// This is the pull point of a pipe: nothing upstream runs until draining
    /// starts. Returns the number of records written.
    ///
    /// # Errors
    /// The first error from upstream or from [`Writer::write`], unchanged.
    pub fn drain<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<W::Item>>,
    {
        let mut count = 0;
        for record in records {
            self.write(record?)?;
            count += 1;
        }
        Ok(count)
    }
}

/// Consuming function lifted into a writer; see [`writer`]
pub struct FnWriter<F, T> {
    sink: F,
    _item: PhantomData<fn(T)>,
}

impl<F, T> Cleanable for FnWriter<F, T> {}

impl<F: FnMut(T), T> Writer for FnWriter<F, T> {
    type Item = T;

    fn write(&mut self, item: T) -> Result<()> {
        (self.sink)(item);
        Ok(())
    }
}

/// Lift a one-argument consuming function into a writer with no-op setup and cleanup
pub fn writer<F: FnMut(T), T>(sink: F) -> FnWriter<F, T> {
    FnWriter {
        sink,
        _item: PhantomData,
    }
}

/// Fallible consuming function lifted into a writer; see [`try_writer`]
pub struct TryFnWriter<F, T> {
    sink: F,
    _item: PhantomData<fn(T)>,
}

impl<F, T> Cleanable for TryFnWriter<F, T> {}

impl<F: FnMut(T) -> Result<()>, T> Writer for TryFnWriter<F, T> {
    type Item = T;

    fn write(&mut self, item: T) -> Result<()> {
        (self.sink)(item)
    }
}

/// Lift a fallible consuming function into a writer
pub fn try_writer<F: FnMut(T) -> Result<()>, T>(sink: F) -> TryFnWriter<F, T> {
    TryFnWriter {
        sink,
        _item: PhantomData,
    }
}

/// Writer that collects records in memory
///
/// The buffer is cleared on setup, so it only ever holds the records of the
/// most recent scope.
pub struct VecWriter<T> {
    records: Vec<T>,
}

impl<T> Default for VecWriter<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T> VecWriter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }
}

impl<T> Cleanable for VecWriter<T> {
    fn setup(&mut self) -> Result<()> {
        self.records.clear();
        Ok(())
    }
}

impl<T> Writer for VecWriter<T> {
    type Item = T;

    fn write(&mut self, item: T) -> Result<()> {
        self.records.push(item);
        Ok(())
    }
}

/// Writer of optional pairs that routes each half to its own writer
///
/// Both writers share one scope. `None` halves (the fill of a zipped source)
/// are skipped.
pub struct Fanout<L, R> {
    left: L,
    right: R,
}

impl<L, R> Fanout<L, R> {
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }

    pub fn left(&self) -> &L {
        &self.left
    }

    pub fn right(&self) -> &R {
        &self.right
    }

    pub fn into_parts(self) -> (L, R) {
        (self.left, self.right)
    }
}

impl<L: Cleanable, R: Cleanable> Cleanable for Fanout<L, R> {
    fn setup(&mut self) -> Result<()> {
        setup_pair(&mut self.left, &mut self.right)
    }

    fn cleanup(&mut self) -> Result<()> {
        cleanup_pair(&mut self.left, &mut self.right)
    }
}

impl<L: Writer, R: Writer> Writer for Fanout<L, R> {
    type Item = (Option<L::Item>, Option<R::Item>);

    fn write(&mut self, (left, right): Self::Item) -> Result<()> {
        if let Some(left) = left {
            self.left.write(left)?;
        }
        if let Some(right) = right {
            self.right.write(right)?;
        }
        Ok(())
    }
}

/// Writers whose output can be read back as a source
///
/// Used to run one pipe's output into another.
pub trait IntoExtractor: Writer {
    type Extractor: Extractor<Item = Self::Item>;

    fn into_extractor(self) -> Self::Extractor;
}

impl<T> IntoExtractor for VecWriter<T> {
    type Extractor = IterExtractor<std::vec::IntoIter<T>>;

    fn into_extractor(self) -> Self::Extractor {
        extractor(self.records)
    }
}
