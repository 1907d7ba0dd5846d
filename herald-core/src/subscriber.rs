//! Declarative handler sets.
//!
//! A [`Subscriber`] describes its handler methods as a [`HandlerSet`]: one
//! [`HandlerDecl`] per method, carrying the declared event type, the
//! optional priority marker and a thunk that invokes the method. The
//! `#[handlers]` attribute builds the set from `#[handler]`-marked methods;
//! it can also be built by hand.
//!
//! Inheritance is expressed through composition: [`HandlerSet::inherit`]
//! pulls in the declarations of an embedded base subscriber. A derived
//! declaration for the same method name replaces the base one, and an
//! unmarked [`HandlerSet::overrides`] keeps the base's marker.

use crate::{
    error::BoxError,
    event::{Event, EventKind, TypeKey},
    handler::IntoHandlerOutcome,
    priority::Priority,
};
use std::{any::type_name, borrow::Cow, fmt, sync::Arc};

/// Type-erased invocation of one handler method on a subscriber.
pub type InvokeFn<S> =
    Arc<dyn Fn(&S, &mut (dyn Event + 'static)) -> Result<(), BoxError> + Send + Sync>;

/// The kind of a handler declaration.
pub enum DeclKind<S> {
    /// A method carrying a handler marker.
    Marked {
        /// Declared event type.
        event: TypeKey,
        /// Marker priority; `None` means the default band.
        priority: Option<Priority>,
        /// Invocation thunk.
        invoke: InvokeFn<S>,
    },
    /// An unmarked method overriding an inherited handler.
    Override {
        /// Declared event type.
        event: TypeKey,
        /// Invocation thunk.
        invoke: InvokeFn<S>,
    },
    /// A marked method whose signature cannot be a handler.
    Rejected {
        /// Why the signature was rejected.
        reason: Cow<'static, str>,
    },
}

impl<S> Clone for DeclKind<S> {
    fn clone(&self) -> Self {
        match self {
            DeclKind::Marked {
                event,
                priority,
                invoke,
            } => DeclKind::Marked {
                event: *event,
                priority: *priority,
                invoke: Arc::clone(invoke),
            },
            DeclKind::Override { event, invoke } => DeclKind::Override {
                event: *event,
                invoke: Arc::clone(invoke),
            },
            DeclKind::Rejected { reason } => DeclKind::Rejected {
                reason: reason.clone(),
            },
        }
    }
}

/// One method declaration of a subscriber.
pub struct HandlerDecl<S> {
    method: &'static str,
    origin: &'static str,
    depth: u32,
    kind: DeclKind<S>,
}

impl<S> HandlerDecl<S> {
    /// Method name.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Name of the type that declared the method.
    pub fn origin(&self) -> &'static str {
        self.origin
    }

    /// Inheritance depth: `0` for the subscriber's own methods, `1` for its
    /// base, and so on.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The declaration itself.
    pub fn kind(&self) -> &DeclKind<S> {
        &self.kind
    }

    /// Consume the declaration.
    pub fn into_kind(self) -> DeclKind<S> {
        self.kind
    }
}

impl<S> fmt::Debug for HandlerDecl<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            DeclKind::Marked { event, priority, .. } => {
                format!("marked({}, {:?})", event.short_name(), priority)
            }
            DeclKind::Override { event, .. } => format!("override({})", event.short_name()),
            DeclKind::Rejected { reason } => format!("rejected({reason})"),
        };
        f.debug_struct("HandlerDecl")
            .field("method", &self.method)
            .field("origin", &self.origin)
            .field("depth", &self.depth)
            .field("kind", &kind)
            .finish()
    }
}

/// The ordered handler declarations of a subscriber type.
///
/// # Example
///
/// ```rust,ignore
/// impl Subscriber for Shield {
///     fn handlers() -> HandlerSet<Self> {
///         HandlerSet::<Self>::new()
///             .inherit::<Armor>(|s| &s.armor)
///             .handler::<HitEvent, _, _>("absorb", Some(Priority::High), |s, e| s.absorb(e))
///     }
/// }
/// ```
pub struct HandlerSet<S> {
    decls: Vec<HandlerDecl<S>>,
}

impl<S: 'static> HandlerSet<S> {
    /// An empty set.
    pub fn new() -> Self {
        Self { decls: Vec::new() }
    }

    /// Declare a marked handler method.
    pub fn handler<E, R, F>(mut self, method: &'static str, priority: Option<Priority>, f: F) -> Self
    where
        E: EventKind + ?Sized,
        R: IntoHandlerOutcome,
        F: Fn(&S, &mut E) -> R + Send + Sync + 'static,
    {
        self.decls.push(HandlerDecl {
            method,
            origin: type_name::<S>(),
            depth: 0,
            kind: DeclKind::Marked {
                event: E::key(),
                priority,
                invoke: erase::<S, E, R, F>(f),
            },
        });
        self
    }

    /// Declare an unmarked method overriding an inherited handler.
    ///
    /// It is only a handler if an inherited method of the same name is one.
    pub fn overrides<E, R, F>(mut self, method: &'static str, f: F) -> Self
    where
        E: EventKind + ?Sized,
        R: IntoHandlerOutcome,
        F: Fn(&S, &mut E) -> R + Send + Sync + 'static,
    {
        self.decls.push(HandlerDecl {
            method,
            origin: type_name::<S>(),
            depth: 0,
            kind: DeclKind::Override {
                event: E::key(),
                invoke: erase::<S, E, R, F>(f),
            },
        });
        self
    }

    /// Record a marked method that cannot be a handler.
    pub fn rejected(mut self, method: &'static str, reason: impl Into<Cow<'static, str>>) -> Self {
        self.decls.push(HandlerDecl {
            method,
            origin: type_name::<S>(),
            depth: 0,
            kind: DeclKind::Rejected {
                reason: reason.into(),
            },
        });
        self
    }

    /// Inherit the declarations of an embedded base subscriber.
    pub fn inherit<B: Subscriber>(mut self, project: fn(&S) -> &B) -> Self {
        for decl in B::handlers().decls {
            let kind = match decl.kind {
                DeclKind::Marked {
                    event,
                    priority,
                    invoke,
                } => DeclKind::Marked {
                    event,
                    priority,
                    invoke: Arc::new(move |s: &S, e: &mut (dyn Event + 'static)| {
                        invoke(project(s), e)
                    }),
                },
                DeclKind::Override { event, invoke } => DeclKind::Override {
                    event,
                    invoke: Arc::new(move |s: &S, e: &mut (dyn Event + 'static)| {
                        invoke(project(s), e)
                    }),
                },
                DeclKind::Rejected { reason } => DeclKind::Rejected { reason },
            };
            self.decls.push(HandlerDecl {
                method: decl.method,
                origin: decl.origin,
                depth: decl.depth + 1,
                kind,
            });
        }
        self
    }

    /// Number of declarations, including inherited and rejected ones.
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Whether the set has no declarations.
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// The declarations, in declaration order.
    pub fn decls(&self) -> &[HandlerDecl<S>] {
        &self.decls
    }

    /// Consume the set.
    pub fn into_decls(self) -> Vec<HandlerDecl<S>> {
        self.decls
    }
}

impl<S: 'static> Default for HandlerSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn erase<S, E, R, F>(f: F) -> InvokeFn<S>
where
    S: 'static,
    E: EventKind + ?Sized,
    R: IntoHandlerOutcome,
    F: Fn(&S, &mut E) -> R + Send + Sync + 'static,
{
    Arc::new(move |s: &S, event: &mut (dyn Event + 'static)| {
        let name = event.event_name();
        match E::project_mut(event) {
            Some(event) => f(s, event).into_outcome(),
            None => Err(format!(
                "event `{}` is not a `{}`",
                name,
                E::key().short_name()
            )
            .into()),
        }
    })
}

/// A type whose handler methods are declared as a [`HandlerSet`].
///
/// Usually implemented by `#[handlers]` on the type's inherent impl block.
/// Registering requires the type to also be a [`Listener`](crate::Listener).
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not declare handlers",
    label = "missing `Subscriber` implementation",
    note = "Add `#[handlers]` to the impl block holding its `#[handler]` methods."
)]
pub trait Subscriber: Send + Sync + Sized + 'static {
    /// The type's handler declarations.
    fn handlers() -> HandlerSet<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventState;

    struct Ping {
        state: EventState,
        hops: u32,
    }
    crate::impl_event!(Ping { state: state });

    struct Armor {
        absorbed: std::sync::atomic::AtomicU32,
    }

    impl Armor {
        fn absorb(&self, ping: &mut Ping) {
            ping.hops += 10;
            self.absorbed
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl Subscriber for Armor {
        fn handlers() -> HandlerSet<Self> {
            HandlerSet::<Self>::new().handler::<Ping, _, _>("absorb", Some(Priority::High), |s, e| {
                s.absorb(e)
            })
        }
    }

    struct Knight {
        armor: Armor,
    }

    impl Subscriber for Knight {
        fn handlers() -> HandlerSet<Self> {
            HandlerSet::<Self>::new()
                .inherit::<Armor>(|k| &k.armor)
                .overrides::<Ping, _, _>("absorb", |_, e| e.hops += 1)
                .rejected("shout", "expected one event parameter")
        }
    }

    #[test]
    fn test_inherited_decls_are_deeper() {
        let set = Knight::handlers();
        assert_eq!(set.len(), 3);
        let depths: Vec<_> = set.decls().iter().map(|d| d.depth()).collect();
        assert_eq!(depths, vec![1, 0, 0]);
        assert!(set.decls()[0].origin().ends_with("Armor"));
        assert!(matches!(set.decls()[2].kind(), DeclKind::Rejected { .. }));
    }

    #[test]
    fn test_inherited_invoke_projects_to_base() {
        let knight = Knight {
            armor: Armor {
                absorbed: Default::default(),
            },
        };
        let mut ping = Ping {
            state: EventState::new(),
            hops: 0,
        };
        let set = Knight::handlers();
        let DeclKind::Marked { invoke, .. } = set.decls()[0].kind() else {
            panic!("expected a marked declaration");
        };
        invoke(&knight, &mut ping).unwrap();
        assert_eq!(ping.hops, 10);
        assert_eq!(
            knight
                .armor
                .absorbed
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
