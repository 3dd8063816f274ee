//! Extractors: scoped sources of lazy record sequences

use super::scope::{cleanup_pair, setup_pair};
use super::{Cleanable, LifecycleError, Scope};
use eyre::Result;
use std::iter::Fuse;

/// Extractor trait for reading records from a source
///
/// Implementors acquire their handle in [`Cleanable::setup`], hand out an
/// owned lazy iterator from [`Extractor::read`] and release the handle in
/// [`Cleanable::cleanup`]. Records are pulled one at a time; a failed read is
/// reported in-band as an `Err` item.
///
/// Records outlive the borrow of the scope they were read in. Sources backed
/// by an external handle keep it in a [`Handle`](super::Handle) shared with
/// their records, so that cleanup ends any sequence still held and later
/// pulls yield [`LifecycleError::Closed`].
///
/// # Example
/// ```
/// use plumber::etl::{Cleanable, Extractor, Resource};
/// use eyre::Result;
///
/// struct Countdown(u32);
///
/// impl Cleanable for Countdown {}
///
/// impl Extractor for Countdown {
///     type Item = u32;
///     type Records = std::vec::IntoIter<Result<u32>>;
///
///     fn read(&mut self) -> Result<Self::Records> {
///         Ok((0..self.0).rev().map(Ok).collect::<Vec<_>>().into_iter())
///     }
/// }
///
/// # fn main() -> Result<()> {
/// let mut source = Resource::new(Countdown(3));
/// let mut scope = source.enter()?;
/// let records = scope.records()?.collect::<Result<Vec<_>>>()?;
/// assert_eq!(records, vec![2, 1, 0]);
/// # Ok(())
/// # }
/// ```
pub trait Extractor: Cleanable {
    /// The type of records produced
    type Item;

    /// Lazy sequence handed out by [`Extractor::read`]
    type Records: Iterator<Item = Result<Self::Item>>;

    /// Start reading from the source
    ///
    /// The base contract is single-pass: reading again after the sequence was
    /// consumed is only supported where an implementor says so.
    ///
    /// # Errors
    /// Returns an error if the source cannot be opened for reading.
    fn read(&mut self) -> Result<Self::Records>;
}

impl<E: Extractor> Scope<'_, E> {
    /// Read the scoped extractor's records
    ///
    /// # Errors
    /// Whatever [`Extractor::read`] returns.
    pub fn records(&mut self) -> Result<E::Records> {
        self.read()
    }
}

/// Iterator of plain values lifted into the record contract
pub type Lifted<I> = std::iter::Map<I, fn(<I as Iterator>::Item) -> Result<<I as Iterator>::Item>>;

fn lift<I: Iterator>(iter: I) -> Lifted<I> {
    iter.map(Ok::<I::Item, eyre::Report> as fn(I::Item) -> Result<I::Item>)
}

/// Single-pass extractor over a plain iterator; see [`extractor`]
pub struct IterExtractor<I> {
    source: Option<I>,
}

impl<I> Cleanable for IterExtractor<I> {}

impl<I: Iterator> Extractor for IterExtractor<I> {
    type Item = I::Item;
    type Records = Lifted<I>;

    fn read(&mut self) -> Result<Self::Records> {
        let source = self.source.take().ok_or(LifecycleError::Exhausted)?;
        Ok(lift(source))
    }
}

/// Lift any iterable into an extractor with no-op setup and cleanup
///
/// The iterable is consumed by the first read; a second read fails with
/// [`LifecycleError::Exhausted`].
pub fn extractor<I: IntoIterator>(iterable: I) -> IterExtractor<I::IntoIter> {
    IterExtractor {
        source: Some(iterable.into_iter()),
    }
}

/// Extractor that calls a function for a fresh iterable on every read; see [`extractor_fn`]
pub struct FnExtractor<F> {
    produce: F,
}

impl<F> Cleanable for FnExtractor<F> {}

impl<F, It> Extractor for FnExtractor<F>
where
    F: FnMut() -> It,
    It: IntoIterator,
{
    type Item = It::Item;
    type Records = Lifted<It::IntoIter>;

    fn read(&mut self) -> Result<Self::Records> {
        Ok(lift((self.produce)().into_iter()))
    }
}

/// Lift a zero-argument function returning an iterable into an extractor
///
/// Unlike [`extractor`], every read calls the function again.
pub fn extractor_fn<F, It>(produce: F) -> FnExtractor<F>
where
    F: FnMut() -> It,
    It: IntoIterator,
{
    FnExtractor { produce }
}

/// Positional pairing of two extractors; see [`zip_with_fill`]
pub struct Zip<L, R> {
    left: L,
    right: R,
}

/// Pair two extractors record by record, padding the shorter side with `None`
///
/// The longer side is never truncated: combining a 10 record source with a
/// 2 record source yields 10 pairs, the last 8 with `None` on the right.
pub fn zip_with_fill<L, R>(left: L, right: R) -> Zip<L, R>
where
    L: Extractor,
    R: Extractor,
{
    Zip { left, right }
}

impl<L: Cleanable, R: Cleanable> Cleanable for Zip<L, R> {
    fn setup(&mut self) -> Result<()> {
        setup_pair(&mut self.left, &mut self.right)
    }

    fn cleanup(&mut self) -> Result<()> {
        cleanup_pair(&mut self.left, &mut self.right)
    }
}

impl<L: Extractor, R: Extractor> Extractor for Zip<L, R> {
    type Item = (Option<L::Item>, Option<R::Item>);
    type Records = ZipRecords<L::Records, R::Records>;

    fn read(&mut self) -> Result<Self::Records> {
        Ok(ZipRecords {
            left: self.left.read()?.fuse(),
            right: self.right.read()?.fuse(),
        })
    }
}

pub struct ZipRecords<A, B> {
    left: Fuse<A>,
    right: Fuse<B>,
}

impl<A, B, X, Y> Iterator for ZipRecords<A, B>
where
    A: Iterator<Item = Result<X>>,
    B: Iterator<Item = Result<Y>>,
{
    type Item = Result<(Option<X>, Option<Y>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let left = self.left.next().transpose();
        let right = self.right.next().transpose();

        match (left, right) {
            (Err(err), _) | (_, Err(err)) => Some(Err(err)),
            (Ok(None), Ok(None)) => None,
            (Ok(left), Ok(right)) => Some(Ok((left, right))),
        }
    }
}

/// Cartesian pairing of two extractors; see [`product`]
pub struct Product<L, R> {
    left: L,
    right: R,
}

/// Pair every record of `left` with every record of `right`
///
/// The left side streams; the right side is read once into memory on the
/// first pull so it can be replayed for each left record.
pub fn product<L, R>(left: L, right: R) -> Product<L, R>
where
    L: Extractor,
    R: Extractor,
{
    Product { left, right }
}

impl<L: Cleanable, R: Cleanable> Cleanable for Product<L, R> {
    fn setup(&mut self) -> Result<()> {
        setup_pair(&mut self.left, &mut self.right)
    }

    fn cleanup(&mut self) -> Result<()> {
        cleanup_pair(&mut self.left, &mut self.right)
    }
}

impl<L, R> Extractor for Product<L, R>
where
    L: Extractor,
    L::Item: Clone,
    R: Extractor,
    R::Item: Clone,
{
    type Item = (L::Item, R::Item);
    type Records = ProductRecords<L::Records, L::Item, R::Item>;

    fn read(&mut self) -> Result<Self::Records> {
        let right = self.right.read()?.collect::<Result<Vec<_>>>()?;
        log::debug!("Buffered {} right-hand records for product", right.len());

        Ok(ProductRecords {
            left: self.left.read()?,
            current: None,
            right: right.into_boxed_slice(),
            position: 0,
        })
    }
}

pub struct ProductRecords<A, X, Y> {
    left: A,
    current: Option<X>,
    right: Box<[Y]>,
    position: usize,
}

impl<A, X, Y> Iterator for ProductRecords<A, X, Y>
where
    A: Iterator<Item = Result<X>>,
    X: Clone,
    Y: Clone,
{
    type Item = Result<(X, Y)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = &self.current {
                if let Some(other) = self.right.get(self.position) {
                    self.position += 1;
                    return Some(Ok((current.clone(), other.clone())));
                }
            }

            match self.left.next()? {
                Ok(next) => {
                    self.current = Some(next);
                    self.position = 0;
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
