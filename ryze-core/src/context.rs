//! Variable scopes and the configure element registry of one session
//!
//! A [`Context`] is a stack of scopes. Lookups walk from the innermost scope
//! outwards and stop at the first match; writes land in the innermost scope
//! unless a scope index is given. Every executing element opens its own scope
//! through [`Context::scope`], which closes it again when the guard drops, so
//! a scope never outlives the element that opened it.

use crate::configure::ConfigureItem;
use crate::error::{ConfigureError, TemplateError};
use crate::functions::FunctionRegistry;
use crate::template;
use serde_json::{Map, Value};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::debug;

const ROOT_SCOPE: &str = "root";

/// One level of the scope stack
#[derive(Clone, Default)]
pub struct Scope {
    name: String,
    variables: Map<String, Value>,
    configs: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("variables", &self.variables)
            .field("configs", &self.configs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Nested variable scopes bound to one session
#[derive(Debug, Clone)]
pub struct Context {
    scopes: Vec<Scope>,
    functions: Arc<FunctionRegistry>,
    strict: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a context with a single root scope and the built-in functions
    pub fn new() -> Self {
        Self::with_functions(Arc::new(FunctionRegistry::with_builtins()))
    }

    /// Create a context sharing an existing function registry
    pub fn with_functions(functions: Arc<FunctionRegistry>) -> Self {
        Self {
            scopes: vec![Scope::new(ROOT_SCOPE)],
            functions,
            strict: true,
        }
    }

    /// Switch between strict (unresolved names fail) and lenient resolution
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Number of scopes on the stack, root included
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Index of the innermost scope
    pub fn current_index(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Scope names from the root inwards
    pub fn scope_names(&self) -> Vec<&str> {
        self.scopes.iter().map(|s| s.name.as_str()).collect()
    }

    /// Read a variable from the innermost scope that defines it
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variables.get(name))
    }

    /// Read a variable or a path below one, e.g. `user.roles[0]`
    pub fn lookup(&self, expr: &str) -> Option<Value> {
        template::lookup(self, expr)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Write a variable into the innermost scope
    pub fn put(&mut self, name: impl Into<String>, value: Value) {
        let index = self.current_index();
        self.put_at(index, name, value);
    }

    /// Write a variable into the scope at `index`, clamped to the innermost scope
    pub fn put_at(&mut self, index: usize, name: impl Into<String>, value: Value) {
        let index = index.min(self.current_index());
        let name = name.into();
        debug!(
            "Setting variable '{}' in scope '{}'",
            name, self.scopes[index].name
        );
        self.scopes[index].variables.insert(name, value);
    }

    /// Push a new innermost scope
    pub fn push_scope(&mut self, name: impl Into<String>) {
        self.scopes.push(Scope::new(name));
    }

    /// Pop the innermost scope; the root scope is never popped
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Open a scope that is closed when the returned guard drops
    pub fn scope(&mut self, name: impl Into<String>) -> ScopeGuard<'_> {
        let restore_depth = self.scopes.len();
        self.push_scope(name);
        ScopeGuard {
            ctx: self,
            restore_depth,
        }
    }

    /// All visible variables, inner scopes shadowing outer ones
    pub fn visible_variables(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for scope in &self.scopes {
            for (name, value) in &scope.variables {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    /// Flatten the visible state into a detached single-scope context.
    /// Writes to the snapshot never reach this context.
    pub fn snapshot(&self) -> Context {
        let mut root = Scope::new(ROOT_SCOPE);
        for scope in &self.scopes {
            root.variables
                .extend(scope.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
            root.configs
                .extend(scope.configs.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
        }
        Context {
            scopes: vec![root],
            functions: Arc::clone(&self.functions),
            strict: self.strict,
        }
    }

    /// Register a configure item in the innermost scope. When an item with
    /// the same reference is already visible, the new item is merged over it.
    pub fn register_config<C: ConfigureItem>(&mut self, item: C) {
        let ref_name = item.effective_ref().to_string();
        let effective = match self.lookup_config::<C>(&ref_name) {
            Ok(Some(existing)) => {
                debug!("Refining visible configure element '{}'", ref_name);
                item.merge(&existing)
            }
            _ => item,
        };
        let index = self.current_index();
        self.scopes[index]
            .configs
            .insert(ref_name, Arc::new(effective) as Arc<dyn Any + Send + Sync>);
    }

    /// Find the innermost visible configure item registered under `ref_name`
    pub fn lookup_config<C: ConfigureItem>(&self, ref_name: &str) -> Result<Option<C>, ConfigureError> {
        let Some(found) = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.configs.get(ref_name))
        else {
            return Ok(None);
        };

        found
            .downcast_ref::<C>()
            .cloned()
            .map(Some)
            .ok_or_else(|| ConfigureError::TypeMismatch {
                ref_name: ref_name.to_string(),
                expected: type_name::<C>(),
            })
    }

    pub fn has_config(&self, ref_name: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.configs.contains_key(ref_name))
    }

    /// Resolve a template using the context's variable policy
    pub fn resolve(&self, template: &str) -> Result<Value, TemplateError> {
        template::resolve(self, template, self.strict)
    }

    /// Resolve a template to text using the context's variable policy
    pub fn resolve_string(&self, template: &str) -> Result<String, TemplateError> {
        self.resolve(template).map(|v| template::value_to_text(&v))
    }

    /// Resolve every string inside a JSON value
    pub fn resolve_value(&self, value: &Value) -> Result<Value, TemplateError> {
        template::resolve_value(self, value, self.strict)
    }

    /// Resolve for display; unresolved placeholders are kept verbatim
    pub fn resolve_display(&self, template: &str) -> String {
        match template::resolve(self, template, false) {
            Ok(value) => template::value_to_text(&value),
            Err(_) => template.to_string(),
        }
    }
}

/// Guard that pops every scope above the depth it was created at
pub struct ScopeGuard<'a> {
    ctx: &'a mut Context,
    restore_depth: usize,
}

impl ScopeGuard<'_> {
    /// Index of the scope this guard owns
    pub fn index(&self) -> usize {
        self.restore_depth
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.ctx.scopes.truncate(self.restore_depth.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct DummyConfig {
        reference: Option<String>,
        host: Option<String>,
        port: Option<u16>,
    }

    impl ConfigureItem for DummyConfig {
        const DEFAULT_REF: &'static str = "__dummy_default__";

        fn ref_name(&self) -> Option<&str> {
            self.reference.as_deref()
        }

        fn merge(&self, other: &Self) -> Self {
            Self {
                reference: self.reference.clone().or_else(|| other.reference.clone()),
                host: self.host.clone().or_else(|| other.host.clone()),
                port: self.port.or(other.port),
            }
        }

        fn evaluate(&self, _ctx: &Context) -> Result<Self, TemplateError> {
            Ok(self.clone())
        }
    }

    #[derive(Debug, Clone, Default)]
    struct OtherConfig;

    impl ConfigureItem for OtherConfig {
        const DEFAULT_REF: &'static str = "__other_default__";

        fn ref_name(&self) -> Option<&str> {
            Some("shared")
        }

        fn merge(&self, _other: &Self) -> Self {
            self.clone()
        }

        fn evaluate(&self, _ctx: &Context) -> Result<Self, TemplateError> {
            Ok(self.clone())
        }
    }

    #[test]
    fn test_shadowing_and_pop() {
        let mut ctx = Context::new();
        ctx.put("a", json!(1));
        {
            let mut inner = ctx.scope("inner");
            assert_eq!(inner.get("a"), Some(&json!(1)));
            inner.put("a", json!(2));
            inner.put("b", json!("only inner"));
            assert_eq!(inner.get("a"), Some(&json!(2)));
            assert_eq!(inner.depth(), 2);
        }
        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert_eq!(ctx.get("b"), None);
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_put_at_enclosing_scope() {
        let mut ctx = Context::new();
        let mut outer = ctx.scope("outer");
        let outer_index = outer.current_index();
        {
            let mut inner = outer.scope("inner");
            inner.put_at(outer_index, "id", json!(7));
        }
        assert_eq!(outer.get("id"), Some(&json!(7)));
        drop(outer);
        assert_eq!(ctx.get("id"), None);
    }

    #[test]
    fn test_root_scope_is_never_popped() {
        let mut ctx = Context::new();
        assert!(ctx.pop_scope().is_none());
        ctx.push_scope("child");
        assert_eq!(ctx.pop_scope().map(|s| s.name().to_string()), Some("child".to_string()));
        assert_eq!(ctx.scope_names(), vec!["root"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut ctx = Context::new();
        ctx.put("a", json!(1));
        ctx.push_scope("child");
        ctx.put("a", json!(2));
        let mut snapshot = ctx.snapshot();
        assert_eq!(snapshot.get("a"), Some(&json!(2)));
        snapshot.put("c", json!(3));
        assert!(!ctx.contains("c"));
    }

    #[test]
    fn test_register_config_refines_visible_item() {
        let mut ctx = Context::new();
        ctx.register_config(DummyConfig {
            host: Some("127.0.0.1".to_string()),
            port: Some(80),
            ..Default::default()
        });
        {
            let mut inner = ctx.scope("inner");
            inner.register_config(DummyConfig {
                port: Some(8080),
                ..Default::default()
            });
            let found: DummyConfig = inner
                .lookup_config(DummyConfig::DEFAULT_REF)
                .unwrap()
                .unwrap();
            assert_eq!(found.host.as_deref(), Some("127.0.0.1"));
            assert_eq!(found.port, Some(8080));
        }
        let outer: DummyConfig = ctx.lookup_config(DummyConfig::DEFAULT_REF).unwrap().unwrap();
        assert_eq!(outer.port, Some(80));
    }

    #[test]
    fn test_lookup_config_type_mismatch() {
        let mut ctx = Context::new();
        ctx.register_config(OtherConfig);
        let result = ctx.lookup_config::<DummyConfig>("shared");
        assert!(matches!(result, Err(ConfigureError::TypeMismatch { .. })));
        assert_eq!(ctx.lookup_config::<DummyConfig>("absent").unwrap(), None);
    }

    #[test]
    fn test_resolve_display_is_lenient() {
        let ctx = Context::new();
        assert_eq!(ctx.resolve_display("hello ${who}"), "hello ${who}");
        assert!(ctx.resolve("hello ${who}").is_err());
        let lenient = Context::new().with_strict_variables(false);
        assert_eq!(lenient.resolve_string("hello ${who}").unwrap(), "hello ${who}");
    }
}
