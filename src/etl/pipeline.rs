//! Pipe orchestration: one extractor, one transformer chain, one writer

use super::{
    Extractor, Fanout, Flow, Identity, IntoExtractor, Lifecycle, LifecycleError, Product,
    Resource, Transformer, Writer, Zip, product, zip_with_fill,
};
use eyre::Result;
use std::marker::PhantomData;

/// Where a pipe is in its single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    Ready,
    Running,
    Finished,
    Failed,
}

/// ETL pipe that drives Extract, Transform and Load for one run
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `T`: Transformer type (must transform from `E::Item`)
/// - `W`: Writer type (must write `T::Output`)
///
/// # Example
/// ```
/// use plumber::etl::{Pipe, VecWriter, extractor, transformer};
///
/// # fn main() -> eyre::Result<()> {
/// let mut pipe = Pipe::new(
///     extractor(1..=3),
///     transformer(|x: i32| x * 2),
///     VecWriter::new(),
/// );
///
/// let count = pipe.run()?;
/// assert_eq!(count, 3);
/// assert!(pipe.finished());
/// assert_eq!(pipe.writer().records(), &[2, 4, 6]);
/// # Ok(())
/// # }
/// ```
pub struct Pipe<E, T, W> {
    extractor: Resource<E>,
    transformer: T,
    writer: Resource<W>,
    state: PipeState,
}

impl<E, T, W> Pipe<E, T, W>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
    W: Writer<Item = T::Output>,
{
    /// Create a new pipe
    pub fn new(extractor: E, transformer: T, writer: W) -> Self {
        Self {
            extractor: Resource::new(extractor),
            transformer,
            writer: Resource::new(writer),
            state: PipeState::Ready,
        }
    }

    /// Run the pipe to completion
    ///
    /// Enters the writer's scope, then pulls every record from the extractor
    /// through the transformer chain into the writer. Both scopes are exited
    /// before this returns, whether or not the run failed.
    ///
    /// Returns the number of records written
    ///
    /// # Errors
    /// The first error raised by any stage, unchanged. A second call fails
    /// with [`LifecycleError::PipeAlreadyRun`].
    pub fn run(&mut self) -> Result<usize> {
        if self.state != PipeState::Ready {
            return Err(LifecycleError::PipeAlreadyRun.into());
        }

        log::info!(
            "Starting pipe with {} transform step(s)",
            self.transformer.steps()
        );
        self.state = PipeState::Running;

        match drive(&mut self.extractor, &self.transformer, &mut self.writer) {
            Ok(count) => {
                self.state = PipeState::Finished;
                log::info!("Pipe finished, wrote {} record(s)", count);
                Ok(count)
            }
            Err(err) => {
                self.state = PipeState::Failed;
                log::debug!("Pipe failed: {:#}", err);
                Err(err)
            }
        }
    }

    fn into_flow(self) -> Result<(Flow<E, T>, W)> {
        if self.state != PipeState::Ready {
            return Err(LifecycleError::PipeAlreadyRun.into());
        }
        let flow = Flow::new(self.extractor.into_inner(), self.transformer);
        Ok((flow, self.writer.into_inner()))
    }

    /// Run this pipe, then run its written records through a second stage
    ///
    /// The writer must be readable as a source ([`IntoExtractor`]).
    pub fn then<T2, W2>(self, transformer: T2, writer: W2) -> Sequence<E, T, W, T2, W2>
    where
        W: IntoExtractor,
        T2: Transformer<Input = W::Item>,
        W2: Writer<Item = T2::Output>,
    {
        Sequence {
            first: Some(self),
            second: None,
            pending: Some((transformer, writer)),
            state: PipeState::Ready,
        }
    }

    /// Pair this pipe's transformed records with another's, position by position
    ///
    /// The shorter side is padded with `None`. Each half of a pair goes to
    /// the writer of the pipe it came from; both writers share one scope.
    ///
    /// # Errors
    /// [`LifecycleError::PipeAlreadyRun`] if either pipe has been run.
    #[allow(clippy::type_complexity)]
    pub fn zip<E2, T2, W2>(
        self,
        other: Pipe<E2, T2, W2>,
    ) -> Result<
        Pipe<
            Zip<Flow<E, T>, Flow<E2, T2>>,
            Identity<(Option<T::Output>, Option<T2::Output>)>,
            Fanout<W, W2>,
        >,
    >
    where
        E2: Extractor,
        T2: Transformer<Input = E2::Item>,
        W2: Writer<Item = T2::Output>,
    {
        let (left, left_writer) = self.into_flow()?;
        let (right, right_writer) = other.into_flow()?;

        Ok(Pipe::new(
            zip_with_fill(left, right),
            Identity::new(),
            Fanout::new(left_writer, right_writer),
        ))
    }

    /// Pair every record of this pipe with every record of another
    ///
    /// The other pipe's records are buffered once; this pipe's stream.
    ///
    /// # Errors
    /// [`LifecycleError::PipeAlreadyRun`] if either pipe has been run.
    #[allow(clippy::type_complexity)]
    pub fn product<E2, T2, W2>(
        self,
        other: Pipe<E2, T2, W2>,
    ) -> Result<
        Pipe<
            Product<Flow<E, T>, Flow<E2, T2>>,
            BothPresent<T::Output, T2::Output>,
            Fanout<W, W2>,
        >,
    >
    where
        T::Output: Clone,
        E2: Extractor,
        T2: Transformer<Input = E2::Item>,
        T2::Output: Clone,
        W2: Writer<Item = T2::Output>,
    {
        let (left, left_writer) = self.into_flow()?;
        let (right, right_writer) = other.into_flow()?;

        Ok(Pipe::new(
            product(left, right),
            BothPresent::default(),
            Fanout::new(left_writer, right_writer),
        ))
    }
}

impl<E, T, W> Pipe<E, T, W> {
    pub fn state(&self) -> PipeState {
        self.state
    }

    /// Whether the writer's scope has been exited
    pub fn finished(&self) -> bool {
        self.writer.lifecycle() == Lifecycle::Exited
    }

    pub fn writer(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

fn drive<E, T, W>(
    extractor: &mut Resource<E>,
    transformer: &T,
    writer: &mut Resource<W>,
) -> Result<usize>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
    W: Writer<Item = T::Output>,
{
    let mut sink = writer.enter()?;
    let written = sink.drain(transformer.bind(extractor))?;
    sink.exit()?;
    Ok(written)
}

/// Marks both halves of a product pair as present so it fits a [`Fanout`]
pub struct BothPresent<A, B> {
    _pair: PhantomData<fn(A, B)>,
}

impl<A, B> Default for BothPresent<A, B> {
    fn default() -> Self {
        Self { _pair: PhantomData }
    }
}

impl<A, B> Transformer for BothPresent<A, B> {
    type Input = (A, B);
    type Output = (Option<A>, Option<B>);

    fn transform(&self, (a, b): Self::Input) -> Result<Self::Output> {
        Ok((Some(a), Some(b)))
    }
}

/// Two pipes run back to back; built by [`Pipe::then`]
pub struct Sequence<E, T, W: IntoExtractor, T2, W2> {
    first: Option<Pipe<E, T, W>>,
    second: Option<Pipe<W::Extractor, T2, W2>>,
    pending: Option<(T2, W2)>,
    state: PipeState,
}

impl<E, T, W, T2, W2> Sequence<E, T, W, T2, W2>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
    W: Writer<Item = T::Output> + IntoExtractor,
    T2: Transformer<Input = W::Item>,
    W2: Writer<Item = T2::Output>,
{
    /// Run the first pipe, then feed what it wrote into the second
    ///
    /// Returns the number of records written by the second stage
    ///
    /// # Errors
    /// The first error from either stage; the second stage never starts if
    /// the first fails.
    pub fn run(&mut self) -> Result<usize> {
        let (Some(mut first), Some((transformer, writer))) =
            (self.first.take(), self.pending.take())
        else {
            return Err(LifecycleError::PipeAlreadyRun.into());
        };

        self.state = PipeState::Running;
        let upstream = first.run().inspect_err(|_| self.state = PipeState::Failed)?;
        log::debug!("First stage wrote {} record(s), starting second", upstream);

        let mut second = Pipe::new(first.into_writer().into_extractor(), transformer, writer);
        let outcome = second.run();
        self.state = second.state();
        self.second = Some(second);
        outcome
    }

    pub fn state(&self) -> PipeState {
        self.state
    }

    /// Whether the second stage's writer has been exited
    pub fn finished(&self) -> bool {
        self.second.as_ref().is_some_and(Pipe::finished)
    }

    /// The second stage's writer, once the sequence has run
    pub fn into_writer(self) -> Option<W2> {
        self.second.map(Pipe::into_writer)
    }
}
