//! Subject → resolver registry with a default fallback.

use std::collections::HashMap;
use std::sync::Arc;
use tempid_types::Subject;

use super::Resolver;

/// Immutable mapping from subjects to resolvers, built once.
///
/// Each distinct resolver instance appears once in [`resolvers`](Self::resolvers)
/// no matter how many subjects it serves, so sessions start and end it once.
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn Resolver>>,
    by_subject: HashMap<Subject, usize>,
    default: Option<usize>,
}

impl ResolverRegistry {
    pub fn builder() -> ResolverRegistryBuilder {
        ResolverRegistryBuilder::default()
    }

    /// Distinct registered resolvers in registration order.
    pub fn resolvers(&self) -> &[Arc<dyn Resolver>] {
        &self.resolvers
    }

    /// Position in [`resolvers`](Self::resolvers) serving `subject`: the
    /// subject's own registration, else the default.
    pub fn lookup(&self, subject: &Subject) -> Option<usize> {
        self.by_subject.get(subject).copied().or(self.default)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &names)
            .field("subjects", &self.by_subject.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}

#[derive(Default)]
pub struct ResolverRegistryBuilder {
    default: Option<Arc<dyn Resolver>>,
    subjects: Vec<(Subject, Arc<dyn Resolver>)>,
}

impl ResolverRegistryBuilder {
    #[must_use]
    pub fn default_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.default = Some(resolver);
        self
    }

    /// Routes `subject` to `resolver`; a later registration for the same
    /// subject wins.
    #[must_use]
    pub fn subject_resolver(
        mut self,
        subject: impl Into<Subject>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        self.subjects.push((subject.into(), resolver));
        self
    }

    pub fn build(self) -> ResolverRegistry {
        let mut resolvers: Vec<Arc<dyn Resolver>> = Vec::new();
        let mut position = |resolver: Arc<dyn Resolver>| -> usize {
            if let Some(pos) = resolvers.iter().position(|r| same_instance(r, &resolver)) {
                return pos;
            }
            resolvers.push(resolver);
            resolvers.len() - 1
        };

        let default = self.default.map(&mut position);
        let mut by_subject = HashMap::new();
        for (subject, resolver) in self.subjects {
            by_subject.insert(subject, position(resolver));
        }

        ResolverRegistry { resolvers, by_subject, default }
    }
}

fn same_instance(a: &Arc<dyn Resolver>, b: &Arc<dyn Resolver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Dispatch, PendingRequest, ResolverInput};

    struct Named(&'static str);

    struct NoopInput;

    impl ResolverInput for NoopInput {
        fn resolve(&mut self, _request: PendingRequest) {}

        fn end_input(self: Box<Self>, _dispatch: &mut Dispatch) {}
    }

    impl Resolver for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn start_input(&self) -> Box<dyn ResolverInput> {
            Box::new(NoopInput)
        }
    }

    #[test]
    fn test_subject_override_and_default() {
        let default: Arc<dyn Resolver> = Arc::new(Named("default"));
        let custom: Arc<dyn Resolver> = Arc::new(Named("custom"));
        let registry = ResolverRegistry::builder()
            .default_resolver(default)
            .subject_resolver("special", custom)
            .build();

        let name = |s: &str| {
            registry.lookup(&Subject::from(s)).map(|i| registry.resolvers()[i].name())
        };
        assert_eq!(name("special"), Some("custom"));
        assert_eq!(name("anything"), Some("default"));
    }

    #[test]
    fn test_no_default_means_no_resolver() {
        let registry = ResolverRegistry::builder()
            .subject_resolver("special", Arc::new(Named("custom")))
            .build();
        assert!(registry.lookup(&Subject::from("other")).is_none());
        assert!(registry.lookup(&Subject::from("special")).is_some());
    }

    #[test]
    fn test_shared_instance_registered_once() {
        let shared: Arc<dyn Resolver> = Arc::new(Named("shared"));
        let registry = ResolverRegistry::builder()
            .default_resolver(shared.clone())
            .subject_resolver("a", shared.clone())
            .subject_resolver("b", shared)
            .subject_resolver("c", Arc::new(Named("other")))
            .build();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(&Subject::from("a")), registry.lookup(&Subject::from("b")));
    }

    #[test]
    fn test_later_registration_wins() {
        let registry = ResolverRegistry::builder()
            .subject_resolver("a", Arc::new(Named("first")))
            .subject_resolver("a", Arc::new(Named("second")))
            .build();

        let pos = registry.lookup(&Subject::from("a"));
        assert_eq!(pos.map(|i| registry.resolvers()[i].name()), Some("second"));
    }
}
