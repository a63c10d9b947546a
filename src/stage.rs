use crate::element::Element;
use crate::error::Result;
use std::marker::PhantomData;

/// Trait for a processing stage in a pipeline
pub trait Stage<In>: Send + 'static {
    /// Payload type of the elements this stage emits
    type Out: Send + 'static;

    /// Process one element.
    /// Returning `None` halts the element at this stage.
    fn process(&mut self, element: Element<In>) -> Result<Option<Element<Self::Out>>>;

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

/// A mapping stage that transforms each element's payload
pub struct MapStage<F, In, Out> {
    name: String,
    mapper: F,
    _types: PhantomData<fn(In) -> Out>,
}

impl<F, In, Out> MapStage<F, In, Out>
where
    F: FnMut(In) -> Result<Out> + Send + 'static,
{
    /// Create a new map stage
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        Self {
            name: name.into(),
            mapper,
            _types: PhantomData,
        }
    }
}

impl<F, In, Out> Stage<In> for MapStage<F, In, Out>
where
    F: FnMut(In) -> Result<Out> + Send + 'static,
    In: 'static,
    Out: Send + 'static,
{
    type Out = Out;

    fn process(&mut self, element: Element<In>) -> Result<Option<Element<Out>>> {
        let (pipeline_id, data) = element.into_parts();
        let output = (self.mapper)(data)?;
        Ok(Some(Element::new(pipeline_id, output)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A filtering stage that passes through elements matching a predicate
pub struct FilterStage<F, T> {
    name: String,
    predicate: F,
    _types: PhantomData<fn(T)>,
}

impl<F, T> FilterStage<F, T>
where
    F: FnMut(&T) -> bool + Send + 'static,
{
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
            _types: PhantomData,
        }
    }
}

impl<F, T> Stage<T> for FilterStage<F, T>
where
    F: FnMut(&T) -> bool + Send + 'static,
    T: Send + 'static,
{
    type Out = T;

    fn process(&mut self, element: Element<T>) -> Result<Option<Element<T>>> {
        if (self.predicate)(element.data()) {
            Ok(Some(element))
        } else {
            Ok(None)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A folding stage that keeps a running accumulator.
///
/// Every input updates the accumulator and emits its current value, so the
/// stage never suppresses an element.
pub struct ReduceStage<F, T, A> {
    name: String,
    folder: F,
    acc: A,
    _types: PhantomData<fn(T)>,
}

impl<F, T, A> ReduceStage<F, T, A>
where
    F: FnMut(&A, T) -> Result<A> + Send + 'static,
    A: Clone + Send + 'static,
{
    /// Create a new reduce stage seeded with `initial`
    pub fn new(name: impl Into<String>, folder: F, initial: A) -> Self {
        Self {
            name: name.into(),
            folder,
            acc: initial,
            _types: PhantomData,
        }
    }

    /// Current accumulator value
    pub fn accumulator(&self) -> &A {
        &self.acc
    }
}

impl<F, T, A> Stage<T> for ReduceStage<F, T, A>
where
    F: FnMut(&A, T) -> Result<A> + Send + 'static,
    T: 'static,
    A: Clone + Send + 'static,
{
    type Out = A;

    fn process(&mut self, element: Element<T>) -> Result<Option<Element<A>>> {
        let (pipeline_id, data) = element.into_parts();
        self.acc = (self.folder)(&self.acc, data)?;
        Ok(Some(Element::new(pipeline_id, self.acc.clone())))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PipelineId;
    use crate::error::PipelineError;

    fn element<T>(data: T) -> Element<T> {
        Element::new(PipelineId::from("test"), data)
    }

    #[test]
    fn test_map_stage() {
        let mut stage = MapStage::new("double", |x: i32| Ok(x * 2));
        let output = stage.process(element(5)).unwrap().unwrap();
        assert_eq!(*output.data(), 10);
        assert_eq!(output.pipeline_id().as_str(), "test");
    }

    #[test]
    fn test_map_stage_error() {
        let mut stage = MapStage::new("fails", |_: i32| -> Result<i32> {
            Err(PipelineError::StageError("boom".into()))
        });
        assert!(stage.process(element(1)).is_err());
    }

    #[test]
    fn test_filter_stage() {
        let mut stage = FilterStage::new("even", |x: &u8| x % 2 == 0);
        assert!(stage.process(element(3)).unwrap().is_none());
        assert_eq!(stage.process(element(4)).unwrap().map(Element::into_data), Some(4));
    }

    #[test]
    fn test_reduce_stage_running_total() {
        let mut stage = ReduceStage::new("sum", |acc: &i64, x: i64| Ok(acc + x), 1);
        let outputs: Vec<i64> = (0..3)
            .map(|_| stage.process(element(4)).unwrap().unwrap().into_data())
            .collect();
        assert_eq!(outputs, vec![5, 9, 13]);
        assert_eq!(*stage.accumulator(), 13);
    }

    #[test]
    fn test_reduce_stage_error_keeps_accumulator() {
        let mut stage = ReduceStage::new(
            "checked",
            |acc: &u8, x: u8| {
                acc.checked_add(x)
                    .ok_or_else(|| PipelineError::StageError("overflow".into()))
            },
            250,
        );
        assert!(stage.process(element(10)).is_err());
        assert_eq!(*stage.accumulator(), 250);
    }
}
