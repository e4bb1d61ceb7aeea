//! Capability interface for resolving and instantiating candidate callables.
//!
//! The core never touches language-level reflection: candidate modules are
//! materialized as registration tables built at load time, and everything
//! downstream depends only on the [`CallableResolver`] trait.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::errors::{PlugboardError, PlugboardResult};
use crate::kinds::Value;

/// A free candidate function.
pub type NativeFunction = Rc<dyn Fn(&[Value]) -> Result<Value, String>>;

/// A candidate method: borrows its instance state mutably for the call.
pub type NativeMethod = Rc<dyn Fn(&mut Value, &[Value]) -> Result<Value, String>>;

/// A candidate class constructor producing fresh instance state.
pub type NativeConstructor = Rc<dyn Fn(&[Value]) -> Result<Value, String>>;

/// A resolved callable, free or instance-bound.
#[derive(Clone)]
pub enum ResolvedCallable {
    Function(NativeFunction),
    Method(NativeMethod),
}

/// Resolution capability over one candidate module.
pub trait CallableResolver {
    fn module_name(&self) -> &str;

    /// Resolve a function or method by its qualified name.
    fn resolve_function(&self, qualified_name: &str) -> Option<ResolvedCallable>;

    /// Resolve a class constructor by class name.
    fn resolve_class(&self, class_name: &str) -> Option<NativeConstructor>;
}

// ---------------------------------------------------------------------------
// Static registration table
// ---------------------------------------------------------------------------

/// Registration-table resolver: callables are registered once at load time
/// and looked up by name afterwards.
#[derive(Default)]
pub struct StaticRegistry {
    name: String,
    functions: IndexMap<String, ResolvedCallable>,
    constructors: IndexMap<String, NativeConstructor>,
}

impl StaticRegistry {
    pub fn new(name: &str) -> Self {
        StaticRegistry {
            name: name.to_string(),
            ..StaticRegistry::default()
        }
    }

    pub fn function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + 'static,
    {
        self.functions
            .insert(name.to_string(), ResolvedCallable::Function(Rc::new(f)));
        self
    }

    /// Register a method under its class-qualified name.
    pub fn method<F>(mut self, class: &str, name: &str, f: F) -> Self
    where
        F: Fn(&mut Value, &[Value]) -> Result<Value, String> + 'static,
    {
        self.functions.insert(
            format!("{class}.{name}"),
            ResolvedCallable::Method(Rc::new(f)),
        );
        self
    }

    pub fn class<F>(mut self, name: &str, constructor: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + 'static,
    {
        self.constructors
            .insert(name.to_string(), Rc::new(constructor));
        self
    }
}

impl CallableResolver for StaticRegistry {
    fn module_name(&self) -> &str {
        &self.name
    }

    fn resolve_function(&self, qualified_name: &str) -> Option<ResolvedCallable> {
        self.functions.get(qualified_name).cloned()
    }

    fn resolve_class(&self, class_name: &str) -> Option<NativeConstructor> {
        self.constructors.get(class_name).cloned()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Catalog of loadable candidate modules, keyed by module name.
///
/// A load failure here is the fatal missing-module condition: the caller
/// aborts the whole execution pass rather than retrying per mapping.
#[derive(Default)]
pub struct RegistryCatalog {
    modules: IndexMap<String, Rc<dyn CallableResolver>>,
}

impl RegistryCatalog {
    pub fn new() -> Self {
        RegistryCatalog::default()
    }

    pub fn register(&mut self, resolver: Rc<dyn CallableResolver>) {
        let name = resolver.module_name().to_string();
        debug!(module = %name, "registered candidate module");
        self.modules.insert(name, resolver);
    }

    pub fn load(&self, module_name: &str) -> PlugboardResult<Rc<dyn CallableResolver>> {
        self.modules.get(module_name).cloned().ok_or_else(|| {
            PlugboardError::Resolution(format!("module `{module_name}` could not be loaded"))
        })
    }
}

// ---------------------------------------------------------------------------
// Failed-candidate tracking
// ---------------------------------------------------------------------------

/// Append-only set of candidate names that failed resolution or
/// instantiation during one execution pass.  Owned by the pass driver and
/// threaded through synthesis; shared across mappings, never across passes.
#[derive(Debug, Clone, Default)]
pub struct FailedCandidates(IndexSet<String>);

impl FailedCandidates {
    pub fn mark(&mut self, name: &str) {
        self.0.insert(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
