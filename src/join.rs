use crate::cache::CorrelationCache;
use crate::element::{Element, PipelineId};
use crate::error::{PipelineError, Result};
use crate::pipeline::{Inlet, Pipeline, StageNode};
use crate::stage::Stage;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, trace};

/// Default number of unmatched keys each side of a join keeps
pub const DEFAULT_JOIN_CAPACITY: usize = 128;

/// Cache sizing for a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinConfig {
    /// Unmatched keys retained from the left pipeline
    pub left_capacity: usize,
    /// Unmatched keys retained from the right pipeline
    pub right_capacity: usize,
}

impl JoinConfig {
    /// Same capacity on both sides
    pub fn symmetric(capacity: usize) -> Self {
        Self {
            left_capacity: capacity,
            right_capacity: capacity,
        }
    }

    /// Set the number of unmatched left keys to retain
    pub fn with_left_capacity(mut self, capacity: usize) -> Self {
        self.left_capacity = capacity;
        self
    }

    /// Set the number of unmatched right keys to retain
    pub fn with_right_capacity(mut self, capacity: usize) -> Self {
        self.right_capacity = capacity;
        self
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self::symmetric(DEFAULT_JOIN_CAPACITY)
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Two-input stage correlating `(key, value)` payloads by key.
///
/// An arrival is looked up in the opposite side's cache. On a hit the
/// joined payload `(key, (left, right))` is emitted, tagged with the target
/// pipeline; the cached partner stays in place and can match again until it
/// is evicted. On a miss the arrival is cached on its own side and nothing
/// is emitted.
pub struct JoinStage<K: Hash + Eq, V> {
    left: PipelineId,
    right: PipelineId,
    target: PipelineId,
    left_cache: CorrelationCache<K, V>,
    right_cache: CorrelationCache<K, V>,
}

impl<K: Hash + Eq, V> JoinStage<K, V> {
    /// Create a join stage; fails if either capacity is zero
    pub fn new(
        left: PipelineId,
        right: PipelineId,
        target: PipelineId,
        config: JoinConfig,
    ) -> Result<Self> {
        Ok(Self {
            left,
            right,
            target,
            left_cache: CorrelationCache::new(config.left_capacity)?,
            right_cache: CorrelationCache::new(config.right_capacity)?,
        })
    }

    /// Get the cache of unmatched left values
    pub fn left_cache(&self) -> &CorrelationCache<K, V> {
        &self.left_cache
    }

    /// Get the cache of unmatched right values
    pub fn right_cache(&self) -> &CorrelationCache<K, V> {
        &self.right_cache
    }

    fn store(&mut self, side: Side, key: K, value: V) {
        let cache = match side {
            Side::Left => &mut self.left_cache,
            Side::Right => &mut self.right_cache,
        };
        if cache.insert(key, value).is_some() {
            debug!(
                pipeline = %self.target,
                side = ?side,
                evictions = cache.evictions(),
                "join cache full, evicted least recently used key"
            );
        }
    }
}

impl<K, V> Stage<(K, V)> for JoinStage<K, V>
where
    K: Hash + Eq + Send + 'static,
    V: Clone + Send + 'static,
{
    type Out = (K, (V, V));

    fn process(&mut self, element: Element<(K, V)>) -> Result<Option<Element<Self::Out>>> {
        // Anything not tagged by the left pipeline counts as a right arrival
        let side = if *element.pipeline_id() == self.left {
            Side::Left
        } else {
            Side::Right
        };
        let (key, value) = element.into_data();

        let partner = match side {
            Side::Left => self.right_cache.get(&key).cloned(),
            Side::Right => self.left_cache.get(&key).cloned(),
        };

        match partner {
            Some(other) => {
                trace!(pipeline = %self.target, side = ?side, "join matched");
                let pair = match side {
                    Side::Left => (value, other),
                    Side::Right => (other, value),
                };
                Ok(Some(Element::new(self.target.clone(), (key, pair))))
            }
            None => {
                trace!(
                    pipeline = %self.target,
                    side = ?side,
                    left = %self.left,
                    right = %self.right,
                    "join miss, caching value"
                );
                self.store(side, key, value);
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "join"
    }
}

/// Result of joining two pipelines.
///
/// The inputs are consumed by the join; what remains of them are their
/// inlets. Further stages go on `target`.
pub struct Joined<IL, IR, K, V> {
    /// Pipeline carrying `(key, (left, right))` rows
    pub target: Pipeline<(K, V), (K, (V, V))>,
    /// Entry point of the former left pipeline
    pub left: Inlet<IL>,
    /// Entry point of the former right pipeline
    pub right: Inlet<IR>,
}

/// Join two pipelines on the key of their `(key, value)` payloads.
///
/// Both pipelines end in one shared [`JoinStage`], which also becomes the
/// head of the returned target pipeline. Each side keeps at most
/// `capacity` unmatched keys.
pub fn join<IL, IR, K, V>(
    left: Pipeline<IL, (K, V)>,
    right: Pipeline<IR, (K, V)>,
    capacity: usize,
) -> Result<Joined<IL, IR, K, V>>
where
    IL: Send + 'static,
    IR: Send + 'static,
    K: Hash + Eq + Send + 'static,
    V: Clone + Send + 'static,
{
    join_with(left, right, JoinConfig::symmetric(capacity))
}

/// Join two pipelines with explicit per-side cache sizing
pub fn join_with<IL, IR, K, V>(
    left: Pipeline<IL, (K, V)>,
    right: Pipeline<IR, (K, V)>,
    config: JoinConfig,
) -> Result<Joined<IL, IR, K, V>>
where
    IL: Send + 'static,
    IR: Send + 'static,
    K: Hash + Eq + Send + 'static,
    V: Clone + Send + 'static,
{
    // Sides are told apart by identity alone
    if left.id() == right.id() {
        return Err(PipelineError::ConfigError(format!(
            "cannot join two pipelines sharing the identity {}",
            left.id()
        )));
    }

    let target = Pipeline::<(K, V)>::new();
    let stage = JoinStage::new(
        left.id().clone(),
        right.id().clone(),
        target.id().clone(),
        config,
    )?;
    let node = Arc::new(StageNode::new(stage));

    debug!(
        left = %left.id(),
        right = %right.id(),
        target = %target.id(),
        left_capacity = config.left_capacity,
        right_capacity = config.right_capacity,
        "joining pipelines"
    );
    let left = left.close_into(&node);
    let right = right.close_into(&node);
    Ok(Joined {
        target: target.link(node),
        left,
        right,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(capacity: usize) -> JoinStage<u32, &'static str> {
        JoinStage::new(
            PipelineId::from("left"),
            PipelineId::from("right"),
            PipelineId::from("target"),
            JoinConfig::symmetric(capacity),
        )
        .unwrap()
    }

    fn left(key: u32, value: &'static str) -> Element<(u32, &'static str)> {
        Element::new(PipelineId::from("left"), (key, value))
    }

    fn right(key: u32, value: &'static str) -> Element<(u32, &'static str)> {
        Element::new(PipelineId::from("right"), (key, value))
    }

    #[test]
    fn test_default_config() {
        let config = JoinConfig::default();
        assert_eq!(config.left_capacity, 128);
        assert_eq!(config.right_capacity, 128);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = JoinStage::<u32, u32>::new(
            PipelineId::from("left"),
            PipelineId::from("right"),
            PipelineId::from("target"),
            JoinConfig::default().with_right_capacity(0),
        );
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_miss_then_match() {
        let mut join = stage(4);
        assert!(join.process(left(1, "a")).unwrap().is_none());
        assert_eq!(join.left_cache().len(), 1);

        let out = join.process(right(1, "b")).unwrap().unwrap();
        assert_eq!(out.pipeline_id().as_str(), "target");
        assert_eq!(out.into_data(), (1, ("a", "b")));
    }

    #[test]
    fn test_order_is_left_then_right() {
        let mut join = stage(4);
        assert!(join.process(right(7, "r")).unwrap().is_none());
        let out = join.process(left(7, "l")).unwrap().unwrap();
        assert_eq!(out.into_data(), (7, ("l", "r")));
    }

    #[test]
    fn test_cached_value_matches_repeatedly() {
        let mut join = stage(4);
        join.process(left(1, "a")).unwrap();
        let first = join.process(right(1, "b")).unwrap().unwrap();
        let second = join.process(right(1, "c")).unwrap().unwrap();
        assert_eq!(first.into_data(), (1, ("a", "b")));
        assert_eq!(second.into_data(), (1, ("a", "c")));
        // Hits never populate the arriving side's cache
        assert!(join.right_cache().is_empty());
    }

    #[test]
    fn test_eviction_drops_late_match() {
        let mut join = stage(2);
        join.process(left(1, "a")).unwrap();
        join.process(left(2, "b")).unwrap();
        join.process(left(3, "c")).unwrap();
        assert_eq!(join.left_cache().evictions(), 1);

        assert!(join.process(right(1, "x")).unwrap().is_none());
        assert!(join.process(right(3, "y")).unwrap().is_some());
    }

    #[test]
    fn test_unknown_identity_is_right_side() {
        let mut join = stage(2);
        let stray = Element::new(PipelineId::from("target"), (5, "t"));
        assert!(join.process(stray).unwrap().is_none());
        assert!(join.right_cache().contains(&5));
    }

    #[test]
    fn test_hit_refreshes_cached_partner() {
        let mut join = stage(2);
        join.process(left(1, "a")).unwrap();
        join.process(left(2, "b")).unwrap();
        assert!(join.process(right(1, "x")).unwrap().is_some());

        // Key 1 was touched by the hit, so key 2 is the one evicted
        join.process(left(3, "c")).unwrap();
        assert!(join.left_cache().contains(&1));
        assert!(!join.left_cache().contains(&2));
    }

    #[test]
    fn test_join_hands_back_input_inlets() {
        let l = Pipeline::<(u8, u8)>::with_id("l");
        let r = Pipeline::<(u8, u8)>::with_id("r");
        let Joined {
            target,
            left,
            right,
        } = join(l, r, 8).unwrap();

        assert_eq!(left.pipeline_id().as_str(), "l");
        assert_eq!(right.pipeline_id().as_str(), "r");
        assert_eq!(target.stage_metrics()[0].0, "join");
    }

    #[test]
    fn test_join_rejects_shared_identity() {
        let l = Pipeline::<(u8, u8)>::with_id("same");
        let r = Pipeline::<(u8, u8)>::with_id("same");
        assert!(matches!(
            join(l, r, 8),
            Err(PipelineError::ConfigError(_))
        ));
    }
}
