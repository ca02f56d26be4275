//! Conflict resolvers and the pipeline that chains them.

use serde_json::Value;

use super::{Conflict, MergeContext, MergeResolution, ResolutionStrategy};

/// Turns a conflict into a resolution.
pub trait ConflictResolver: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this resolver handles `conflict`.
    fn can_resolve(&self, conflict: &Conflict, context: &MergeContext<'_>) -> bool;

    /// Resolve `conflict`. Only called when [`Self::can_resolve`] accepted it.
    fn resolve(&self, conflict: &Conflict, context: &MergeContext<'_>) -> MergeResolution;
}

/// Keeps the local value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferLocalResolver;

impl ConflictResolver for PreferLocalResolver {
    fn name(&self) -> &'static str {
        "prefer-local"
    }

    fn can_resolve(&self, _conflict: &Conflict, _context: &MergeContext<'_>) -> bool {
        true
    }

    fn resolve(&self, conflict: &Conflict, _context: &MergeContext<'_>) -> MergeResolution {
        MergeResolution {
            conflict: conflict.clone(),
            strategy: ResolutionStrategy::PreferLocal,
            resolved_value: conflict.local_value.clone(),
            confidence: 1.0,
            requires_review: false,
            explanation: "kept the local value".to_string(),
            applied: true,
        }
    }
}

/// Takes the remote value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferRemoteResolver;

impl ConflictResolver for PreferRemoteResolver {
    fn name(&self) -> &'static str {
        "prefer-remote"
    }

    fn can_resolve(&self, _conflict: &Conflict, _context: &MergeContext<'_>) -> bool {
        true
    }

    fn resolve(&self, conflict: &Conflict, _context: &MergeContext<'_>) -> MergeResolution {
        MergeResolution {
            conflict: conflict.clone(),
            strategy: ResolutionStrategy::PreferRemote,
            resolved_value: conflict.remote_value.clone(),
            confidence: 1.0,
            requires_review: false,
            explanation: "took the remote value".to_string(),
            applied: true,
        }
    }
}

/// Leaves the conflict for a human, proposing the base value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualResolver;

impl ConflictResolver for ManualResolver {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn can_resolve(&self, _conflict: &Conflict, _context: &MergeContext<'_>) -> bool {
        true
    }

    fn resolve(&self, conflict: &Conflict, _context: &MergeContext<'_>) -> MergeResolution {
        MergeResolution {
            conflict: conflict.clone(),
            strategy: ResolutionStrategy::Manual,
            resolved_value: conflict.base_value.clone(),
            confidence: 0.0,
            requires_review: true,
            explanation: format!("{} needs manual review", conflict.code),
            applied: false,
        }
    }
}

/// Mean of the local and remote numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageResolver;

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

/// Finite mean of the local and remote numbers.
fn mean(conflict: &Conflict) -> Option<f64> {
    let local = number(conflict.local_value.as_ref())?;
    let remote = number(conflict.remote_value.as_ref())?;
    Some((local + remote) / 2.0).filter(|m| m.is_finite())
}

impl ConflictResolver for AverageResolver {
    fn name(&self) -> &'static str {
        "average"
    }

    fn can_resolve(&self, conflict: &Conflict, _context: &MergeContext<'_>) -> bool {
        number(conflict.base_value.as_ref()).is_some() && mean(conflict).is_some()
    }

    fn resolve(&self, conflict: &Conflict, context: &MergeContext<'_>) -> MergeResolution {
        let Some(mean) = mean(conflict).and_then(serde_json::Number::from_f64) else {
            return ManualResolver.resolve(conflict, context);
        };
        MergeResolution {
            conflict: conflict.clone(),
            strategy: ResolutionStrategy::Average,
            resolved_value: Some(Value::Number(mean)),
            confidence: 0.75,
            requires_review: false,
            explanation: format!(
                "averaged {} and {}",
                conflict.local_value.as_ref().unwrap_or(&Value::Null),
                conflict.remote_value.as_ref().unwrap_or(&Value::Null)
            ),
            applied: true,
        }
    }
}

/// Applies the strategy a conflict suggests when it is auto-resolvable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoResolver;

impl AutoResolver {
    fn delegate(strategy: ResolutionStrategy) -> Option<&'static dyn ConflictResolver> {
        match strategy {
            ResolutionStrategy::PreferLocal => Some(&PreferLocalResolver),
            ResolutionStrategy::PreferRemote => Some(&PreferRemoteResolver),
            ResolutionStrategy::Average => Some(&AverageResolver),
            ResolutionStrategy::Manual | ResolutionStrategy::AutoResolve => None,
        }
    }
}

impl ConflictResolver for AutoResolver {
    fn name(&self) -> &'static str {
        "auto-resolve"
    }

    fn can_resolve(&self, conflict: &Conflict, context: &MergeContext<'_>) -> bool {
        conflict.auto_resolvable
            && conflict
                .resolution_strategy
                .and_then(Self::delegate)
                .is_some_and(|inner| inner.can_resolve(conflict, context))
    }

    fn resolve(&self, conflict: &Conflict, context: &MergeContext<'_>) -> MergeResolution {
        let Some(inner) = conflict.resolution_strategy.and_then(Self::delegate) else {
            return ManualResolver.resolve(conflict, context);
        };
        let resolution = inner.resolve(conflict, context);
        MergeResolution {
            strategy: ResolutionStrategy::AutoResolve,
            confidence: 0.9,
            explanation: format!("auto-resolved with {}: {}", inner.name(), resolution.explanation),
            ..resolution
        }
    }
}

/// Resolvers tried in order; the first that accepts a conflict resolves it.
#[derive(Default)]
pub struct ResolverPipeline {
    resolvers: Vec<Box<dyn ConflictResolver>>,
}

impl std::fmt::Debug for ResolverPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.resolvers.iter().map(|r| r.name()))
            .finish()
    }
}

impl ResolverPipeline {
    /// Empty pipeline: every conflict stays unresolved.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver.
    #[must_use]
    pub fn with(mut self, resolver: impl ConflictResolver + 'static) -> Self {
        self.push(resolver);
        self
    }

    /// Append a resolver.
    pub fn push(&mut self, resolver: impl ConflictResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }

    /// Pipeline for one strategy, falling back to manual review.
    #[must_use]
    pub fn for_strategy(strategy: ResolutionStrategy) -> Self {
        let pipeline = Self::new();
        let pipeline = match strategy {
            ResolutionStrategy::PreferLocal => pipeline.with(PreferLocalResolver),
            ResolutionStrategy::PreferRemote => pipeline.with(PreferRemoteResolver),
            ResolutionStrategy::AutoResolve => pipeline.with(AutoResolver),
            ResolutionStrategy::Average => pipeline.with(AverageResolver),
            ResolutionStrategy::Manual => pipeline,
        };
        pipeline.with(ManualResolver)
    }

    /// Names of the resolvers, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Resolve one conflict with the first accepting resolver.
    #[must_use]
    pub fn resolve(&self, conflict: &Conflict, context: &MergeContext<'_>) -> Option<MergeResolution> {
        let resolver = self
            .resolvers
            .iter()
            .find(|r| r.can_resolve(conflict, context))?;
        tracing::trace!(conflict = %conflict.id, resolver = resolver.name(), "resolving conflict");
        Some(resolver.resolve(conflict, context))
    }

    /// Resolve all conflicts; returns resolutions and the conflicts no
    /// resolver accepted.
    #[must_use]
    pub fn resolve_all(
        &self,
        conflicts: &[Conflict],
        context: &MergeContext<'_>,
    ) -> (Vec<MergeResolution>, Vec<Conflict>) {
        let mut resolutions = Vec::new();
        let mut unresolved = Vec::new();
        for conflict in conflicts {
            match self.resolve(conflict, context) {
                Some(resolution) => resolutions.push(resolution),
                None => unresolved.push(conflict.clone()),
            }
        }
        tracing::debug!(
            resolved = resolutions.len(),
            unresolved = unresolved.len(),
            "ran resolver pipeline"
        );
        (resolutions, unresolved)
    }
}
