//! Transformer trait and chaining

use super::{Cleanable, Extractor, Resource, Scope};
use eyre::Result;
use std::marker::PhantomData;
use std::rc::Rc;

/// Transformer trait for mapping one record to another
///
/// A transformer is a typed chain of elementary steps. Leaf transformers hold
/// one step; [`Transformer::chain`] and [`Transformer::then`] build longer
/// chains whose steps run in insertion order.
///
/// # Example
/// ```
/// use plumber::etl::{Transformer, transformer};
///
/// let trim = transformer(|s: String| s.trim().to_string());
/// let shout = transformer(|s: String| s.to_uppercase());
/// let both = trim.chain(&shout);
///
/// assert_eq!(both.transform("  pipe ".to_string()).unwrap(), "PIPE");
/// assert_eq!(both.steps(), 2);
/// // Chaining copies its operands; the originals still work on their own
/// assert_eq!(trim.transform(" a ".to_string()).unwrap(), "a");
/// ```
pub trait Transformer {
    /// Input record type
    type Input;

    /// Output record type after transformation
    type Output;

    /// Transform a single record
    ///
    /// # Errors
    /// Returns an error if the record cannot be mapped; it aborts the run.
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Number of elementary steps in this chain
    fn steps(&self) -> usize {
        1
    }

    /// Append `next` to copies of both chains, leaving the operands untouched
    fn chain<N>(&self, next: &N) -> Chain<Self, N>
    where
        Self: Clone,
        N: Transformer<Input = Self::Output> + Clone,
    {
        Chain {
            first: self.clone(),
            second: next.clone(),
        }
    }

    /// Append `next`, consuming both chains
    fn then<N>(self, next: N) -> Chain<Self, N>
    where
        Self: Sized,
        N: Transformer<Input = Self::Output>,
    {
        Chain {
            first: self,
            second: next,
        }
    }

    /// Attach this chain to a source for one lazy pass
    ///
    /// Nothing is read until the returned iterator is first pulled. The
    /// source's scope is entered then and exited when the records run out,
    /// after the first error, or when the iterator is dropped.
    fn bind<'a, E>(&'a self, source: &'a mut Resource<E>) -> Bound<'a, E, Self>
    where
        Self: Sized,
        E: Extractor<Item = Self::Input>,
    {
        Bound {
            transformer: self,
            stage: Stage::Pending(source),
            pulled: 0,
        }
    }
}

/// Identity transformer that passes records through unchanged
pub struct Identity<T> {
    _record: PhantomData<fn(T) -> T>,
}

impl<T> Default for Identity<T> {
    fn default() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<T> Clone for Identity<T> {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<T> Identity<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> Transformer for Identity<T> {
    type Input = T;
    type Output = T;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(input)
    }
}

/// Infallible function lifted into a transformer; see [`transformer`]
pub struct FnTransformer<F, I> {
    step: F,
    _input: PhantomData<fn(I)>,
}

impl<F: Clone, I> Clone for FnTransformer<F, I> {
    fn clone(&self) -> Self {
        Self {
            step: self.step.clone(),
            _input: PhantomData,
        }
    }
}

impl<F, I, O> Transformer for FnTransformer<F, I>
where
    F: Fn(I) -> O,
{
    type Input = I;
    type Output = O;

    fn transform(&self, input: I) -> Result<O> {
        Ok((self.step)(input))
    }
}

/// Lift a one-argument function into a single-step transformer
pub fn transformer<F, I, O>(step: F) -> FnTransformer<F, I>
where
    F: Fn(I) -> O,
{
    FnTransformer {
        step,
        _input: PhantomData,
    }
}

/// Fallible function lifted into a transformer; see [`try_transformer`]
pub struct TryFnTransformer<F, I> {
    step: F,
    _input: PhantomData<fn(I)>,
}

impl<F: Clone, I> Clone for TryFnTransformer<F, I> {
    fn clone(&self) -> Self {
        Self {
            step: self.step.clone(),
            _input: PhantomData,
        }
    }
}

impl<F, I, O> Transformer for TryFnTransformer<F, I>
where
    F: Fn(I) -> Result<O>,
{
    type Input = I;
    type Output = O;

    fn transform(&self, input: I) -> Result<O> {
        (self.step)(input)
    }
}

/// Lift a fallible one-argument function into a single-step transformer
///
/// Errors returned by `step` reach the caller of the pipe unchanged.
pub fn try_transformer<F, I, O>(step: F) -> TryFnTransformer<F, I>
where
    F: Fn(I) -> Result<O>,
{
    TryFnTransformer {
        step,
        _input: PhantomData,
    }
}

/// Two chains run back to back; built by [`Transformer::chain`] or [`Transformer::then`]
#[derive(Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Transformer for Chain<A, B>
where
    A: Transformer,
    B: Transformer<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        self.second.transform(self.first.transform(input)?)
    }

    fn steps(&self) -> usize {
        self.first.steps() + self.second.steps()
    }
}

/// A transformer bound to a borrowed source; see [`Transformer::bind`]
pub struct Bound<'a, E: Extractor, T> {
    transformer: &'a T,
    stage: Stage<'a, E>,
    pulled: usize,
}

enum Stage<'a, E: Extractor> {
    Pending(&'a mut Resource<E>),
    // Field order matters: the records are dropped before the scope closes.
    Flowing {
        records: E::Records,
        scope: Scope<'a, E>,
    },
    Done,
}

impl<E: Extractor, T> Bound<'_, E, T> {
    fn open(&mut self) -> Result<()> {
        let Stage::Pending(source) = std::mem::replace(&mut self.stage, Stage::Done) else {
            return Ok(());
        };

        let mut scope = source.enter()?;
        let records = scope.records()?;
        self.stage = Stage::Flowing { records, scope };
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Flowing { records, scope } => {
                drop(records);
                log::debug!("Source exhausted after {} record(s)", self.pulled);
                scope.exit()
            }
            Stage::Pending(_) | Stage::Done => Ok(()),
        }
    }
}

impl<E, T> Iterator for Bound<'_, E, T>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
{
    type Item = Result<T::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.stage, Stage::Pending(_)) {
            if let Err(err) = self.open() {
                return Some(Err(err));
            }
        }

        let Stage::Flowing { records, .. } = &mut self.stage else {
            return None;
        };

        let outcome = match records.next() {
            Some(Ok(record)) => self.transformer.transform(record),
            Some(Err(err)) => Err(err),
            None => return self.finish().err().map(Err),
        };

        match outcome {
            Ok(output) => {
                self.pulled += 1;
                Some(Ok(output))
            }
            Err(err) => {
                // A failed record ends the pass; dropping the stage releases the source.
                self.stage = Stage::Done;
                Some(Err(err))
            }
        }
    }
}

/// An extractor whose records run through a transformer before leaving it
///
/// Where [`Bound`] borrows its parts for one pass, a flow owns them and is
/// itself an [`Extractor`], so transformed sources compose like any other.
pub struct Flow<E, T> {
    source: E,
    transformer: Rc<T>,
}

impl<E, T> Flow<E, T> {
    pub fn new(source: E, transformer: T) -> Self {
        Self {
            source,
            transformer: Rc::new(transformer),
        }
    }
}

impl<E: Cleanable, T> Cleanable for Flow<E, T> {
    fn setup(&mut self) -> Result<()> {
        self.source.setup()
    }

    fn cleanup(&mut self) -> Result<()> {
        self.source.cleanup()
    }
}

impl<E, T> Extractor for Flow<E, T>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
{
    type Item = T::Output;
    type Records = FlowRecords<E::Records, T>;

    fn read(&mut self) -> Result<Self::Records> {
        Ok(FlowRecords {
            records: self.source.read()?,
            transformer: Rc::clone(&self.transformer),
        })
    }
}

pub struct FlowRecords<R, T> {
    records: R,
    transformer: Rc<T>,
}

impl<R, T> Iterator for FlowRecords<R, T>
where
    T: Transformer,
    R: Iterator<Item = Result<T::Input>>,
{
    type Item = Result<T::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.and_then(|record| self.transformer.transform(record)))
    }
}
