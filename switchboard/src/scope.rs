//! Sync-scope control: force synchronous delivery across a bounded scope.
//!
//! Test infrastructure needs asynchronous destinations to deliver
//! deterministically. A scope (one test class, one test method) marked with
//! a [`SyncDirective`] gets its caller's [`ProxyMode`] forced to
//! synchronous on entry and restored to the captured previous value on
//! exit — on every exit path, including panics, via the [`SyncScope`] RAII
//! guard.
//!
//! Restoration is deliberately asymmetric: a scope that resolved *no*
//! directive restores nothing on exit, leaving whatever an outer scope (or
//! the scope body itself) set. Nested scopes that do carry directives
//! restore in LIFO order, each to its own captured value.
//!
//! ```text
//! enter_scope:                      exit_scope:
//!   directive = locator.locate()      if directive was present:
//!   if present:                           mode.set(captured_previous)
//!       capture mode.is_force_sync()  else:
//!       mode.set_force_sync(true)         (no-op)
//! ```

use crate::proxy::ProxyMode;
use std::collections::HashSet;

/// Marker directive enabling forced-synchronous delivery for a scope.
///
/// Presence is the whole contract; the marker carries no attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncDirective;

/// Identity of a scope a directive may be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeTarget {
    /// A class-level scope (one test class).
    Class {
        /// Class name.
        class: String,
    },

    /// A method-level scope nested inside its class scope.
    Method {
        /// Enclosing class name.
        class: String,
        /// Method name.
        method: String,
    },
}

impl ScopeTarget {
    /// A class-level target.
    pub fn class(class: impl Into<String>) -> Self {
        ScopeTarget::Class {
            class: class.into(),
        }
    }

    /// A method-level target.
    pub fn method(class: impl Into<String>, method: impl Into<String>) -> Self {
        ScopeTarget::Method {
            class: class.into(),
            method: method.into(),
        }
    }
}

/// Collaborator resolving the directive for a scope target.
pub trait DirectiveLocator: Send + Sync {
    /// Resolve the directive governing `target`, if any. For method
    /// targets, a method-level entry takes precedence; absent that, the
    /// enclosing class-level entry applies.
    fn locate(&self, target: &ScopeTarget) -> Option<SyncDirective>;
}

/// Startup-registered directive table.
///
/// Replaces runtime annotation reflection with an explicit registration
/// table built at configuration time.
#[derive(Debug, Default)]
pub struct DirectiveTable {
    classes: HashSet<String>,
    methods: HashSet<(String, String)>,
}

impl DirectiveTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a class scope as sync-directed.
    pub fn mark_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    /// Mark a single method scope as sync-directed.
    pub fn mark_method(mut self, class: impl Into<String>, method: impl Into<String>) -> Self {
        self.methods.insert((class.into(), method.into()));
        self
    }
}

impl DirectiveLocator for DirectiveTable {
    fn locate(&self, target: &ScopeTarget) -> Option<SyncDirective> {
        let found = match target {
            ScopeTarget::Class { class } => self.classes.contains(class),
            ScopeTarget::Method { class, method } => {
                self.methods
                    .contains(&(class.clone(), method.clone()))
                    || self.classes.contains(class)
            }
        };
        found.then_some(SyncDirective)
    }
}

/// Captured state for one scope: the directive resolved at entry and the
/// proxy mode value to restore on exit.
///
/// Restoration only happens when a directive governed the scope; an
/// undirected scope leaves the context exactly as the scope body left it.
#[derive(Debug, Default)]
pub struct SyncHandler {
    directive: Option<SyncDirective>,
    previous_force_sync: bool,
}

impl SyncHandler {
    /// Record the directive resolved for this scope.
    pub fn set_directive(&mut self, directive: Option<SyncDirective>) {
        self.directive = directive;
    }

    /// Record the context value to restore on exit.
    pub fn set_previous_force_sync(&mut self, previous: bool) {
        self.previous_force_sync = previous;
    }

    /// Force synchronous delivery, if a directive governs this scope.
    pub fn enable_sync(&self, mode: &ProxyMode) {
        if self.directive.is_some() {
            mode.set_force_sync(true);
        }
    }

    /// Restore the captured value, if a directive governs this scope.
    pub fn restore_previous_sync(&self, mode: &ProxyMode) {
        if self.directive.is_some() {
            mode.set_force_sync(self.previous_force_sync);
        }
    }
}

/// Scope controller pairing a class-level and a method-level handler, for
/// wiring into test-runner lifecycle hooks.
///
/// The method scope nests inside the class scope and restores first.
///
/// # Example
///
/// ```rust,ignore
/// let mut controller = SyncScopeController::new(table, ctx.clone());
///
/// controller.enter_class_scope("SuggestServiceTest");
/// controller.enter_method_scope("SuggestServiceTest", "test_suggest");
/// // ... run the test body with ctx ...
/// controller.exit_method_scope();
/// controller.exit_class_scope();
/// ```
pub struct SyncScopeController<L: DirectiveLocator> {
    locator: L,
    mode: ProxyMode,
    class_handler: SyncHandler,
    method_handler: SyncHandler,
}

impl<L: DirectiveLocator> SyncScopeController<L> {
    /// A controller governing `mode` with directives resolved by `locator`.
    pub fn new(locator: L, mode: ProxyMode) -> Self {
        Self {
            locator,
            mode,
            class_handler: SyncHandler::default(),
            method_handler: SyncHandler::default(),
        }
    }

    /// Enter the class scope: resolve the class directive and, if present,
    /// capture the current context value and force synchronous delivery.
    pub fn enter_class_scope(&mut self, class: &str) {
        let directive = self.locator.locate(&ScopeTarget::class(class));
        self.class_handler
            .set_previous_force_sync(self.mode.is_force_sync());
        self.class_handler.set_directive(directive);
        self.class_handler.enable_sync(&self.mode);
    }

    /// Exit the class scope, restoring the captured value if the class
    /// directive was present.
    pub fn exit_class_scope(&mut self) {
        self.class_handler.restore_previous_sync(&self.mode);
    }

    /// Enter the method scope: the method-level directive wins, falling
    /// back to the class-level directive.
    pub fn enter_method_scope(&mut self, class: &str, method: &str) {
        let directive = self.locator.locate(&ScopeTarget::method(class, method));
        self.method_handler
            .set_previous_force_sync(self.mode.is_force_sync());
        self.method_handler.set_directive(directive);
        self.method_handler.enable_sync(&self.mode);
    }

    /// Exit the method scope, restoring the captured value if a directive
    /// governed it.
    pub fn exit_method_scope(&mut self) {
        self.method_handler.restore_previous_sync(&self.mode);
    }
}

/// RAII guard for one scope: restores the context on drop, so panics and
/// early returns cannot leak a forced state past the scope's exit.
///
/// Idempotent with an explicit [`exit`](SyncScope::exit).
#[derive(Debug)]
pub struct SyncScope {
    mode: ProxyMode,
    previous_force_sync: bool,
    directive_present: bool,
    restored: bool,
}

impl SyncScope {
    /// Enter a scope: resolve the directive for `target` and, if present,
    /// capture the current value and force synchronous delivery.
    pub fn enter(locator: &dyn DirectiveLocator, mode: &ProxyMode, target: ScopeTarget) -> Self {
        let directive = locator.locate(&target);
        let previous_force_sync = mode.is_force_sync();
        if directive.is_some() {
            mode.set_force_sync(true);
        }
        Self {
            mode: mode.clone(),
            previous_force_sync,
            directive_present: directive.is_some(),
            restored: false,
        }
    }

    /// Whether a directive governs this scope.
    pub fn directive_present(&self) -> bool {
        self.directive_present
    }

    /// Exit the scope explicitly, restoring the captured value if a
    /// directive was present.
    pub fn exit(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if self.directive_present {
            self.mode.set_force_sync(self.previous_force_sync);
        }
    }
}

impl Drop for SyncScope {
    fn drop(&mut self) {
        self.restore();
    }
}
