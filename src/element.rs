use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a pipeline, stable for the pipeline's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(Arc<str>);

impl PipelineId {
    /// Generate a fresh, random identity
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Get the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PipelineId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for PipelineId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// A single data element travelling through a pipeline.
///
/// The element is tagged with the identity of the pipeline whose stage
/// produced it most recently. Mapping and reducing stages carry the tag
/// forward; a join re-tags its output with the target pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Element<T> {
    pipeline_id: PipelineId,
    data: T,
}

impl<T> Element<T> {
    /// Wrap `data` in an element tagged with `pipeline_id`
    pub fn new(pipeline_id: PipelineId, data: T) -> Self {
        Self { pipeline_id, data }
    }

    /// Get the identity of the pipeline that produced this element
    pub fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    /// Get a reference to the payload
    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn into_parts(self) -> (PipelineId, T) {
        (self.pipeline_id, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = PipelineId::generate();
        let b = PipelineId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_into_parts_keeps_identity() {
        let element = Element::new(PipelineId::from("left"), 21);
        assert_eq!(*element.data(), 21);
        let (id, data) = element.into_parts();
        assert_eq!(id.as_str(), "left");
        assert_eq!(data, 21);
    }
}
