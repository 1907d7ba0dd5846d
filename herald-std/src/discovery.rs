//! Handler discovery.
//!
//! Turns a subscriber type's [`HandlerSet`] into the flat list of
//! [`HandlerDescriptor`]s a bus registers, applying the inheritance rules:
//!
//! - declarations are resolved from the deepest base up to the subscriber;
//! - a marked derived method replaces a base method of the same name;
//! - an unmarked override keeps the base method's marker (and priority);
//! - an override with no marked ancestor is not a handler.
//!
//! Invalid declarations are logged and skipped. The result is cached per
//! subscriber type for the life of the process.

use herald_core::{
    DeclKind, DiscoveryError, HandlerSet, InvokeFn, Priority, Subscriber, TypeKey,
    short_type_name,
};
use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock, Mutex, PoisonError},
};

// ============================================================================
// Descriptor
// ============================================================================

/// One discovered handler of subscriber type `S`.
pub struct HandlerDescriptor<S> {
    method: &'static str,
    origin: &'static str,
    event_type: TypeKey,
    priority: Priority,
    invoke: InvokeFn<S>,
}

impl<S> HandlerDescriptor<S> {
    /// Method name.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Type that declared the method body that will run.
    pub fn origin(&self) -> &'static str {
        self.origin
    }

    /// Declared event type.
    pub fn event_type(&self) -> TypeKey {
        self.event_type
    }

    /// Resolved priority.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// `Origin::method`, without module paths.
    pub fn label(&self) -> String {
        format!("{}::{}", short_type_name(self.origin), self.method)
    }

    pub(crate) fn invoker(&self) -> InvokeFn<S> {
        Arc::clone(&self.invoke)
    }
}

impl<S> Clone for HandlerDescriptor<S> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            origin: self.origin,
            event_type: self.event_type,
            priority: self.priority,
            invoke: Arc::clone(&self.invoke),
        }
    }
}

impl<S> fmt::Debug for HandlerDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("method", &self.method)
            .field("origin", &self.origin)
            .field("event_type", &self.event_type)
            .field("priority", &self.priority)
            .finish()
    }
}

// ============================================================================
// Resolution
// ============================================================================

struct Resolved<S> {
    method: &'static str,
    origin: &'static str,
    depth: u32,
    event_type: TypeKey,
    priority: Option<Priority>,
    invoke: InvokeFn<S>,
}

/// The outcome of resolving one handler set.
pub struct Resolution<S> {
    /// Handlers, in registration order.
    pub descriptors: Vec<HandlerDescriptor<S>>,
    /// Declarations that were skipped.
    pub errors: Vec<DiscoveryError>,
}

/// Resolve a handler set without touching the cache.
pub fn resolve<S: 'static>(set: HandlerSet<S>) -> Resolution<S> {
    let subscriber = type_name::<S>();
    let mut decls = set.into_decls();
    // Stable: declaration order survives within one depth.
    decls.sort_by(|a, b| b.depth().cmp(&a.depth()));

    let mut resolved: Vec<Resolved<S>> = Vec::new();
    let mut errors = Vec::new();

    for decl in decls {
        let (method, origin, depth) = (decl.method(), decl.origin(), decl.depth());
        let existing = resolved.iter().position(|r| r.method == method);

        if let Some(pos) = existing
            && resolved[pos].depth == depth
        {
            errors.push(DiscoveryError::DuplicateMethod {
                subscriber: origin,
                method,
            });
            continue;
        }

        match decl.into_kind() {
            DeclKind::Rejected { reason } => {
                errors.push(DiscoveryError::InvalidSignature {
                    subscriber: origin,
                    method,
                    reason,
                });
            }
            DeclKind::Marked {
                event,
                priority,
                invoke,
            } => {
                let entry = Resolved {
                    method,
                    origin,
                    depth,
                    event_type: event,
                    priority,
                    invoke,
                };
                match existing {
                    Some(pos) => resolved[pos] = entry,
                    None => resolved.push(entry),
                }
            }
            DeclKind::Override { event, invoke } => {
                let Some(pos) = existing else {
                    tracing::debug!(
                        subscriber,
                        method,
                        "unmarked method overrides no handler; ignoring"
                    );
                    continue;
                };
                let base = &mut resolved[pos];
                if base.event_type != event {
                    errors.push(DiscoveryError::OverrideMismatch {
                        subscriber: origin,
                        method,
                        expected: base.event_type.name(),
                        found: event.name(),
                    });
                    continue;
                }
                base.origin = origin;
                base.depth = depth;
                base.invoke = invoke;
            }
        }
    }

    let descriptors = resolved
        .into_iter()
        .map(|r| HandlerDescriptor {
            method: r.method,
            origin: r.origin,
            event_type: r.event_type,
            priority: r.priority.unwrap_or_default(),
            invoke: r.invoke,
        })
        .collect();

    Resolution {
        descriptors,
        errors,
    }
}

// ============================================================================
// Cache
// ============================================================================

type CacheEntry = Arc<dyn Any + Send + Sync>;

static CACHE: LazyLock<Mutex<HashMap<TypeId, CacheEntry>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn cached<S: 'static>() -> Option<Arc<[HandlerDescriptor<S>]>> {
    let cache = CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    cache
        .get(&TypeId::of::<S>())
        .and_then(|entry| entry.downcast_ref::<Arc<[HandlerDescriptor<S>]>>())
        .cloned()
}

/// The handlers of `S`, discovered on first use and cached afterwards.
///
/// Discovery errors are logged at `error` level; the offending declarations
/// are skipped and every other handler is still returned.
pub fn discover<S: Subscriber>() -> Arc<[HandlerDescriptor<S>]> {
    let subscriber = type_name::<S>();
    if let Some(hit) = cached::<S>() {
        tracing::debug!(subscriber, "handler cache hit");
        return hit;
    }

    // Resolved outside the lock: `handlers()` may itself discover base types.
    let Resolution {
        descriptors,
        errors,
    } = resolve(S::handlers());
    for error in &errors {
        tracing::error!(subscriber, %error, "skipping invalid handler declaration");
    }
    tracing::debug!(
        subscriber,
        handlers = descriptors.len(),
        skipped = errors.len(),
        "discovered handlers"
    );

    let fresh: Arc<[HandlerDescriptor<S>]> = descriptors.into();
    let mut cache = CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    // First writer wins; a racing discovery of the same type is discarded.
    let entry = cache
        .entry(TypeId::of::<S>())
        .or_insert_with(|| Arc::new(fresh.clone()) as CacheEntry);
    entry
        .downcast_ref::<Arc<[HandlerDescriptor<S>]>>()
        .cloned()
        .unwrap_or(fresh)
}

/// Whether `S` has been discovered.
pub fn is_cached<S: 'static>() -> bool {
    CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(&TypeId::of::<S>())
}

/// Number of subscriber types discovered so far.
pub fn cached_types() -> usize {
    CACHE.lock().unwrap_or_else(PoisonError::into_inner).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{Event, EventState, impl_event};

    struct Ping {
        state: EventState,
        trail: Vec<&'static str>,
    }
    impl_event!(Ping { state: state });

    struct Pong {
        state: EventState,
    }
    impl_event!(Pong { state: state });

    fn ping() -> Ping {
        Ping {
            state: EventState::new(),
            trail: Vec::new(),
        }
    }

    struct Base;

    impl Subscriber for Base {
        fn handlers() -> HandlerSet<Self> {
            HandlerSet::<Self>::new()
                .handler::<Ping, _, _>("on_ping", Some(Priority::High), |_, e| {
                    e.trail.push("base")
                })
                .handler::<Ping, _, _>("on_other", None, |_, e| e.trail.push("other"))
        }
    }

    struct Middle {
        base: Base,
    }

    impl Subscriber for Middle {
        fn handlers() -> HandlerSet<Self> {
            HandlerSet::<Self>::new()
                .inherit::<Base>(|m| &m.base)
                .overrides::<Ping, _, _>("on_ping", |_, e| e.trail.push("middle"))
        }
    }

    struct Leaf {
        middle: Middle,
    }

    impl Subscriber for Leaf {
        fn handlers() -> HandlerSet<Self> {
            HandlerSet::<Self>::new()
                .inherit::<Middle>(|l| &l.middle)
                .overrides::<Ping, _, _>("on_ping", |_, e| e.trail.push("leaf"))
                .handler::<Ping, _, _>("on_other", Some(Priority::Low), |_, e| {
                    e.trail.push("leaf-other")
                })
        }
    }

    fn invoke_all<S: 'static>(subscriber: &S, descriptors: &[HandlerDescriptor<S>]) -> Ping {
        let mut event = ping();
        for d in descriptors {
            (d.invoke)(subscriber, &mut event).unwrap();
        }
        event
    }

    #[test]
    fn test_override_inherits_marker_through_levels() {
        let Resolution {
            descriptors,
            errors,
        } = resolve(Leaf::handlers());
        assert!(errors.is_empty());
        assert_eq!(descriptors.len(), 2);

        let on_ping = &descriptors[0];
        assert_eq!(on_ping.method(), "on_ping");
        assert_eq!(on_ping.priority(), Priority::High);
        assert_eq!(on_ping.label(), "Leaf::on_ping");

        let on_other = &descriptors[1];
        assert_eq!(on_other.priority(), Priority::Low);

        let leaf = Leaf {
            middle: Middle { base: Base },
        };
        assert_eq!(invoke_all(&leaf, &descriptors).trail, vec!["leaf", "leaf-other"]);
    }

    #[test]
    fn test_unspecified_priority_is_normal() {
        let Resolution { descriptors, .. } = resolve(Base::handlers());
        assert_eq!(descriptors[1].priority(), Priority::Normal);
    }

    #[test]
    fn test_invalid_declarations_are_skipped() {
        struct Broken;
        let set = HandlerSet::<Broken>::new()
            .handler::<Ping, _, _>("ok", None, |_, _| ())
            .rejected("bad", "expected exactly one event parameter")
            .handler::<Ping, _, _>("ok", None, |_, _| ())
            .overrides::<Ping, _, _>("orphan", |_, _| ());

        let Resolution {
            descriptors,
            errors,
        } = resolve(set);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            DiscoveryError::InvalidSignature { method: "bad", .. }
        ));
        assert!(matches!(
            errors[1],
            DiscoveryError::DuplicateMethod { method: "ok", .. }
        ));
    }

    #[test]
    fn test_override_with_other_event_type_is_rejected() {
        struct Odd {
            base: Base,
        }
        let set = HandlerSet::<Odd>::new()
            .inherit::<Base>(|o| &o.base)
            .overrides::<Pong, _, _>("on_ping", |_, _| ());

        let Resolution {
            descriptors,
            errors,
        } = resolve(set);
        assert_eq!(descriptors.len(), 2);
        assert!(descriptors[0].origin().ends_with("Base"));
        assert!(matches!(
            errors[0],
            DiscoveryError::OverrideMismatch {
                method: "on_ping",
                ..
            }
        ));
    }

    #[test]
    fn test_discovery_is_cached() {
        struct Cached;
        impl Subscriber for Cached {
            fn handlers() -> HandlerSet<Self> {
                HandlerSet::<Self>::new().handler::<Pong, _, _>("on_pong", None, |_, e| e.cancel())
            }
        }

        assert!(!is_cached::<Cached>());
        let first = discover::<Cached>();
        assert!(is_cached::<Cached>());
        assert!(cached_types() >= 1);
        let second = discover::<Cached>();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
