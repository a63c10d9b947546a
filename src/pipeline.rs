use crate::element::{Element, PipelineId};
use crate::error::Result;
use crate::metrics::{MetricsSnapshot, StageMetrics};
use crate::stage::{FilterStage, MapStage, ReduceStage, Stage};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Receiving end of a link: anything an element can be handed to
pub(crate) trait Relay<T>: Send + Sync {
    fn send(&self, element: Element<T>) -> Result<()>;
}

/// Something a downstream relay can be attached behind
pub(crate) trait Attach<T>: Send + Sync {
    fn attach(&self, next: Arc<dyn Relay<T>>);
}

/// Forward link to the next stage in a chain
pub(crate) struct Link<T> {
    next: RwLock<Option<Arc<dyn Relay<T>>>>,
}

impl<T> Link<T> {
    fn new() -> Self {
        Self {
            next: RwLock::new(None),
        }
    }

    fn forward(&self, element: Element<T>) -> Result<()> {
        // Clone the target out so no lock is held while the rest of the chain runs
        let next = self.next.read().clone();
        match next {
            Some(next) => next.send(element),
            None => Ok(()),
        }
    }
}

impl<T> Attach<T> for Link<T> {
    fn attach(&self, next: Arc<dyn Relay<T>>) {
        *self.next.write() = Some(next);
    }
}

/// A stage wired into a chain, together with its downstream link and metrics
pub(crate) struct StageNode<S, In>
where
    S: Stage<In>,
{
    stage: Mutex<S>,
    downstream: Link<S::Out>,
    metrics: StageMetrics,
    _input: PhantomData<fn(In)>,
}

impl<S, In> StageNode<S, In>
where
    S: Stage<In>,
{
    pub(crate) fn new(stage: S) -> Self {
        Self {
            stage: Mutex::new(stage),
            downstream: Link::new(),
            metrics: StageMetrics::new(),
            _input: PhantomData,
        }
    }

    pub(crate) fn name(&self) -> String {
        self.stage.lock().name().to_string()
    }

    pub(crate) fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}

impl<S, In> Relay<In> for StageNode<S, In>
where
    S: Stage<In>,
    In: 'static,
{
    fn send(&self, element: Element<In>) -> Result<()> {
        self.metrics.record_received();
        let start = Instant::now();
        // The stage lock covers only this stage's own work
        let output = self.stage.lock().process(element);
        self.metrics.record_latency(start.elapsed().as_nanos() as u64);

        match output? {
            Some(element) => {
                self.metrics.record_emitted();
                self.downstream.forward(element)
            }
            None => {
                self.metrics.record_suppressed();
                Ok(())
            }
        }
    }
}

impl<S, In> Attach<S::Out> for StageNode<S, In>
where
    S: Stage<In>,
    In: 'static,
{
    fn attach(&self, next: Arc<dyn Relay<S::Out>>) {
        self.downstream.attach(next);
    }
}

struct StageEntry {
    name: String,
    metrics: StageMetrics,
}

/// A chain of stages with an entry point.
///
/// `I` is the type of raw values fed to [`Pipeline::process`], `O` the
/// payload type produced by the current tail. Stages are appended in
/// builder style, each call returning the pipeline re-typed at its new
/// tail. Joining consumes the two input pipelines, leaving only their
/// [`Inlet`]s, so a chain can never be extended past a join except
/// through the join's target pipeline.
///
/// Processing is synchronous: `process` returns once every reachable
/// downstream stage has handled the element, or with the first error a
/// stage returned. Errors are never caught, logged or retried here.
pub struct Pipeline<I, O = I> {
    id: PipelineId,
    head: Arc<Link<I>>,
    tail: Arc<dyn Attach<O>>,
    stages: Vec<StageEntry>,
}

impl<I> Pipeline<I, I>
where
    I: Send + 'static,
{
    /// Create an empty pipeline with a generated identity
    pub fn new() -> Self {
        Self::with_id(PipelineId::generate())
    }

    /// Create an empty pipeline with the given identity
    pub fn with_id(id: impl Into<PipelineId>) -> Self {
        let id = id.into();
        let head = Arc::new(Link::new());
        let tail: Arc<dyn Attach<I>> = head.clone();
        debug!(pipeline = %id, "created pipeline");
        Self {
            id,
            head,
            tail,
            stages: Vec::new(),
        }
    }
}

impl<I> Default for Pipeline<I, I>
where
    I: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> Pipeline<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Get the identity stamped on elements entering this pipeline
    pub fn id(&self) -> &PipelineId {
        &self.id
    }

    /// Feed one raw value into the head of the chain.
    /// A pipeline with no stages silently accepts and drops the value.
    pub fn process(&self, data: I) -> Result<()> {
        self.head.forward(Element::new(self.id.clone(), data))
    }

    /// Get a cloneable entry handle for this pipeline
    pub fn inlet(&self) -> Inlet<I> {
        Inlet {
            pipeline_id: self.id.clone(),
            head: Arc::clone(&self.head),
        }
    }

    /// Number of stages appended to this pipeline
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no stage has been appended yet
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Append a stage after the current tail
    pub fn append<S>(self, stage: S) -> Pipeline<I, S::Out>
    where
        S: Stage<O>,
    {
        self.link(Arc::new(StageNode::new(stage)))
    }

    /// Append a stage transforming each payload with `f`
    pub fn map<U, F>(self, mut f: F) -> Pipeline<I, U>
    where
        F: FnMut(O) -> U + Send + 'static,
        U: Send + 'static,
    {
        self.try_map(move |data| Ok(f(data)))
    }

    /// Append a stage transforming each payload with a fallible `f`
    pub fn try_map<U, F>(self, f: F) -> Pipeline<I, U>
    where
        F: FnMut(O) -> Result<U> + Send + 'static,
        U: Send + 'static,
    {
        self.link(Arc::new(StageNode::new(MapStage::new("map", f))))
    }

    /// Append a stage that forwards only payloads matching `predicate`
    pub fn filter<F>(self, predicate: F) -> Pipeline<I, O>
    where
        F: FnMut(&O) -> bool + Send + 'static,
    {
        self.link(Arc::new(StageNode::new(FilterStage::new("filter", predicate))))
    }

    /// Append a stage folding payloads into an accumulator seeded with
    /// `initial`, emitting the accumulator after every input
    pub fn reduce<A, F>(self, mut f: F, initial: A) -> Pipeline<I, A>
    where
        F: FnMut(&A, O) -> A + Send + 'static,
        A: Clone + Send + 'static,
    {
        self.try_reduce(move |acc, data| Ok(f(acc, data)), initial)
    }

    /// Fallible variant of [`Pipeline::reduce`]; on error the accumulator
    /// keeps its previous value
    pub fn try_reduce<A, F>(self, f: F, initial: A) -> Pipeline<I, A>
    where
        F: FnMut(&A, O) -> Result<A> + Send + 'static,
        A: Clone + Send + 'static,
    {
        self.link(Arc::new(StageNode::new(ReduceStage::new(
            "reduce", f, initial,
        ))))
    }

    /// Per-stage metrics in chain order
    pub fn stage_metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.stages
            .iter()
            .map(|entry| (entry.name.clone(), entry.metrics.snapshot()))
            .collect()
    }

    /// Get a summary of all stage metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = format!("Pipeline {} Metrics Summary:\n", self.id);
        for (i, entry) in self.stages.iter().enumerate() {
            summary.push_str(&format!(
                "  Stage {} ({}): {}\n",
                i,
                entry.name,
                entry.metrics.snapshot().format()
            ));
        }
        summary
    }

    /// Wire `node` behind the current tail and make it the new tail
    pub(crate) fn link<S>(mut self, node: Arc<StageNode<S, O>>) -> Pipeline<I, S::Out>
    where
        S: Stage<O>,
    {
        let name = node.name();
        let relay: Arc<dyn Relay<O>> = node.clone();
        self.tail.attach(relay);
        debug!(
            pipeline = %self.id,
            stage = %name,
            position = self.stages.len(),
            "appended stage"
        );
        self.stages.push(StageEntry {
            name,
            metrics: node.metrics().clone(),
        });

        Pipeline {
            id: self.id,
            head: self.head,
            tail: node,
            stages: self.stages,
        }
    }

    /// Terminate this chain in a stage shared with other pipelines,
    /// keeping only the entry handle
    pub(crate) fn close_into<S>(self, node: &Arc<StageNode<S, O>>) -> Inlet<I>
    where
        S: Stage<O>,
    {
        let relay: Arc<dyn Relay<O>> = node.clone();
        self.tail.attach(relay);
        debug!(pipeline = %self.id, stage = %node.name(), "closed chain into shared stage");
        Inlet {
            pipeline_id: self.id,
            head: self.head,
        }
    }
}

impl<I, O> fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Entry handle for a pipeline.
///
/// Feeding an inlet is the same as calling [`Pipeline::process`] on the
/// pipeline it came from. Inlets are cheap to clone and may be moved to
/// other threads.
pub struct Inlet<I> {
    pipeline_id: PipelineId,
    head: Arc<Link<I>>,
}

impl<I> Inlet<I> {
    /// Get the identity of the pipeline this inlet feeds
    pub fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    /// Feed one raw value, exactly as [`Pipeline::process`] would
    pub fn process(&self, data: I) -> Result<()> {
        self.head.forward(Element::new(self.pipeline_id.clone(), data))
    }
}

impl<I> Clone for Inlet<I> {
    fn clone(&self) -> Self {
        Self {
            pipeline_id: self.pipeline_id.clone(),
            head: Arc::clone(&self.head),
        }
    }
}

impl<I> fmt::Debug for Inlet<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inlet")
            .field("pipeline_id", &self.pipeline_id)
            .finish()
    }
}
