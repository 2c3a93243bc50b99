//! [`MergingResult`] aggregates N source results into a single [`AsyncResult`].
//!
//! A completion callback is registered on every source. Once every source succeeded, the [`Merger`] is invoked
//! exactly once, over the values in source order, and its outcome becomes the outcome of the merge.
//! The first source failure short-circuits the merge (the source error is propagated as is) and every later
//! outcome is discarded. A source that gets cancelled simply contributes nothing.
//!
//! Cancelling the merge cancels it unconditionally and asks every source to cancel as well.
//!
//! Note: source callbacks keep the merge alive, so callbacks registered on a [`MergingResult`] are delivered even after
//! every handle to it was dropped. The merge releases its sources once it reaches a terminal state.
use std::{sync::Arc, time::Duration};

use tracing::{event, Level};

use super::{
    completion::{Completion, State, Task},
    AsyncResult, Callback, Executor,
};
use crate::{
    error::{Error, Result},
    merge::Merger,
};

/// A source observed by a [`MergingResult`]
pub type Source<V> = Arc<dyn AsyncResult<V>>;

/// Fixed width bitset tracking which sources already yielded a value
#[derive(Debug)]
struct BitSet {
    words: Vec<u64>,
    cardinality: usize,
}

impl BitSet {
    fn new(size: usize) -> Self {
        Self {
            words: vec![0; size.div_ceil(64)],
            cardinality: 0,
        }
    }

    /// Returns false if the bit was already set
    fn insert(&mut self, index: usize) -> bool {
        let word = &mut self.words[index / 64];
        let mask = 1u64 << (index % 64);
        if *word & mask != 0 {
            return false;
        }

        *word |= mask;
        self.cardinality += 1;
        true
    }

    fn cardinality(&self) -> usize {
        self.cardinality
    }
}

/// Merge bookkeeping, protected by the same lock as the terminal state
struct Accumulator<V> {
    completed: BitSet,
    slots: Vec<Option<V>>,
    /// emptied by the terminal transition
    sources: Vec<Source<V>>,
}

impl<V> Accumulator<V> {
    fn release_sources(&mut self) -> Vec<Source<V>> {
        std::mem::take(&mut self.sources)
    }
}

struct Shared<V> {
    completion: Completion<V, Accumulator<V>>,
    merger: Arc<dyn Merger<V>>,
    size: usize,
}

/// An [`AsyncResult`] that merges the values of several sources. See the module docs.
pub struct MergingResult<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for MergingResult<V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<V> std::fmt::Debug for MergingResult<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergingResult")
            .field("size", &self.shared.size)
            .field("completion", &self.shared.completion)
            .finish()
    }
}

impl<V: Clone + Send + 'static> MergingResult<V> {
    /// Constructs a new [`MergingResult`] over `sources`.
    ///
    /// Sources that are already terminal are accounted for before this function returns.
    /// With no sources at all, the merger is invoked right away over an empty collection.
    pub fn new(merger: Arc<dyn Merger<V>>, sources: Vec<Source<V>>) -> Self {
        let size = sources.len();
        let shared = Arc::new(Shared {
            completion: Completion::new(Accumulator {
                completed: BitSet::new(size),
                slots: (0..size).map(|_| None).collect(),
                sources: sources.clone(),
            }),
            merger,
            size,
        });

        if size == 0 {
            let state = match shared.merger.merge(Vec::new()) {
                Ok(value) => State::Succeeded(value),
                Err(err) => State::Failed(err),
            };
            shared.completion.complete(state);
        }

        for (index, source) in sources.iter().enumerate() {
            if shared.completion.is_done() {
                // an already failed source decided the merge, the remaining ones are irrelevant
                break;
            }
            let shared = shared.clone();
            source.on_completion(Box::new(move || source_done(&shared, index)));
        }

        event!(Level::DEBUG, "merging result created over {} sources", size);
        Self { shared }
    }

    /// Returns a [`Builder`] for [`MergingResult`]
    pub fn builder() -> Builder<V> {
        Builder::default()
    }

    /// Number of sources being merged
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Number of sources that already yielded a value
    pub fn completed(&self) -> usize {
        self.shared.completion.lock().extra.completed.cardinality()
    }
}

/// Completion callback registered on the source at `index`
fn source_done<V: Clone + Send + 'static>(shared: &Shared<V>, index: usize) {
    let source = {
        let guard = shared.completion.lock();
        match guard.extra.sources.get(index) {
            Some(source) => source.clone(),
            None => {
                event!(Level::TRACE, "merge already terminal, ignoring source {}", index);
                return;
            }
        }
    };

    if !source.is_done() {
        event!(
            Level::ERROR,
            "completion callback invoked for source {} which is not done",
            index
        );
        panic!(
            "completion callback invoked for source {} which is not done. This is a bug in the source implementation",
            index
        );
    }
    if source.is_cancelled() {
        event!(Level::DEBUG, "source {} was cancelled, ignoring it", index);
        return;
    }

    // the source is terminal, so this never blocks
    let outcome = source.get();

    let mut guard = shared.completion.lock();
    if !guard.state.is_pending() {
        return;
    }

    let mut released = Vec::new();
    let drained = match outcome {
        Ok(value) => {
            let accumulator = &mut guard.extra;
            if !accumulator.completed.insert(index) {
                drop(guard);
                event!(Level::ERROR, "source {} completed twice", index);
                panic!(
                    "source {} delivered its completion twice. This is a bug in the source implementation",
                    index
                );
            }
            accumulator.slots[index] = Some(value);

            if accumulator.completed.cardinality() == shared.size {
                released = accumulator.release_sources();
                let values: Vec<V> = accumulator.slots.iter_mut().filter_map(Option::take).collect();
                event!(Level::DEBUG, "all {} sources succeeded, merging", values.len());
                let state = match shared.merger.merge(values) {
                    Ok(value) => State::Succeeded(value),
                    Err(err) => {
                        event!(Level::DEBUG, "merge failed: {}", err);
                        State::Failed(err)
                    }
                };
                guard.transition(state)
            } else {
                None
            }
        }
        Err(err) => {
            event!(Level::DEBUG, "source {} failed: {}", index, err);
            released = guard.extra.release_sources();
            guard.transition(State::Failed(err))
        }
    };
    drop(guard);
    drop(released);

    if let Some(drained) = drained {
        shared.completion.deliver(drained);
    }
}

impl<V: Clone + Send + 'static> AsyncResult<V> for MergingResult<V> {
    fn get(&self) -> Result<V> {
        self.shared.completion.wait(None)
    }

    fn get_timeout(&self, timeout: Duration) -> Result<V> {
        self.shared.completion.wait(Some(timeout))
    }

    /// Cancels the merge and every source. Returns false if the merge was already terminal,
    /// otherwise whether every source was successfully cancelled.
    fn cancel(&self) -> bool {
        let (drained, sources) = {
            let mut guard = self.shared.completion.lock();
            let Some(drained) = guard.transition(State::Cancelled) else {
                return false;
            };
            (drained, guard.extra.release_sources())
        };

        // sources run their callbacks inline, so this must happen without holding our lock
        let mut all_cancelled = true;
        for source in sources.iter() {
            all_cancelled &= source.cancel();
        }
        event!(
            Level::DEBUG,
            "merging result cancelled, all sources cancelled: {}",
            all_cancelled
        );

        self.shared.completion.deliver(drained);
        all_cancelled
    }

    fn is_done(&self) -> bool {
        self.shared.completion.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.shared.completion.is_cancelled()
    }

    fn on_completion(&self, callback: Callback) {
        self.shared.completion.register(Task::inline(callback));
    }

    fn on_completion_with(&self, callback: Callback, executor: Arc<dyn Executor>) {
        self.shared
            .completion
            .register(Task::with_executor(callback, executor));
    }
}

/// Builder for [`MergingResult`]. A merger is mandatory.
pub struct Builder<V> {
    merger: Option<Arc<dyn Merger<V>>>,
    sources: Vec<Source<V>>,
}

impl<V> Default for Builder<V> {
    fn default() -> Self {
        Self {
            merger: None,
            sources: Vec::new(),
        }
    }
}

impl<V: Clone + Send + 'static> Builder<V> {
    /// Use a specific [`Merger`] to aggregate results from the merged sources
    pub fn merge_with(mut self, merger: Arc<dyn Merger<V>>) -> Self {
        self.merger = Some(merger);
        self
    }

    pub fn add(mut self, source: Source<V>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn add_all(mut self, sources: impl IntoIterator<Item = Source<V>>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// # Error
    /// [`Error::InvalidArgument`] if no merger was provided
    pub fn build(self) -> Result<MergingResult<V>> {
        let merger = self.merger.ok_or(Error::InvalidArgument {
            reason: "MergingResult requires a merger".to_string(),
        })?;

        Ok(MergingResult::new(merger, self.sources))
    }
}
