use crate::error::ModelError;
use crate::object::Object;
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// Index of a class in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
}

impl ClassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Trait => "trait",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// A declared object property.
///
/// `accessible` starts out mirroring the visibility and can be forced open
/// once; there is no way back for the lifetime of the definition.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub default: Value,
    pub doc_comment: Option<String>,
    accessible: Cell<bool>,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, visibility: Visibility, default: Value) -> Self {
        let accessible = visibility.is_public();
        PropertyDef {
            name: name.into(),
            visibility,
            is_static: false,
            default,
            doc_comment: None,
            accessible: Cell::new(accessible),
        }
    }

    pub fn is_public(&self) -> bool {
        self.visibility.is_public()
    }

    /// True when the property may be read or written directly, either
    /// because it is public or because its visibility was forced open.
    pub fn is_accessible(&self) -> bool {
        self.accessible.get()
    }

    /// One-way visibility override.
    pub fn force_accessible(&self) {
        self.accessible.set(true);
    }
}

#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(name: impl Into<String>) -> Self {
        ParamDef {
            name: name.into(),
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: Value) -> Self {
        ParamDef {
            name: name.into(),
            default: Some(default),
        }
    }
}

/// Native method implementation.
pub type NativeBody = Rc<dyn Fn(&Object, &[Value]) -> Result<Value, ModelError>>;

#[derive(Clone)]
pub struct MethodDef {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub params: Vec<ParamDef>,
    pub doc_comment: Option<String>,
    body: NativeBody,
}

impl MethodDef {
    pub fn new(
        name: impl Into<String>,
        visibility: Visibility,
        params: Vec<ParamDef>,
        body: NativeBody,
    ) -> Self {
        MethodDef {
            name: name.into(),
            visibility,
            is_static: false,
            params,
            doc_comment: None,
            body,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn required_arity(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    pub fn invoke(&self, object: &Object, args: &[Value]) -> Result<Value, ModelError> {
        if args.len() < self.required_arity() {
            return Err(ModelError::ArgumentCount {
                method: self.name.clone(),
                expected: self.required_arity(),
                given: args.len(),
            });
        }
        (self.body)(object, args)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("params", &self.params.len())
            .finish()
    }
}

/// Free function descriptor. The registry only records the signature;
/// free functions carry no invokable body here.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub doc_comment: Option<String>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionDef {
            name: name.into(),
            params: Vec::new(),
            doc_comment: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub kind: ClassKind,
    pub name: String,
    pub parent: Option<ClassId>,
    pub properties: IndexMap<String, PropertyDef>,
    /// Keyed by lowercased method name; PHP method lookup is
    /// case-insensitive.
    methods: IndexMap<String, MethodDef>,
    pub constants: IndexMap<String, Value>,
    pub source_path: Option<PathBuf>,
}

impl ClassDef {
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Case-insensitive method lookup on this class only.
    pub fn own_method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.get(&name.to_ascii_lowercase())
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.values()
    }
}

/// Fluent builder used by embedders and tests to describe classes.
pub struct ClassBuilder {
    def: ClassDef,
}

impl ClassBuilder {
    pub fn new(kind: ClassKind, name: impl Into<String>) -> Self {
        ClassBuilder {
            def: ClassDef {
                kind,
                name: name.into(),
                parent: None,
                properties: IndexMap::new(),
                methods: IndexMap::new(),
                constants: IndexMap::new(),
                source_path: None,
            },
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(ClassKind::Class, name)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(ClassKind::Interface, name)
    }

    pub fn parent(mut self, parent: ClassId) -> Self {
        self.def.parent = Some(parent);
        self
    }

    pub fn property(mut self, property: PropertyDef) -> Self {
        self.def.properties.insert(property.name.clone(), property);
        self
    }

    pub fn public_property(self, name: &str, default: Value) -> Self {
        self.property(PropertyDef::new(name, Visibility::Public, default))
    }

    pub fn protected_property(self, name: &str, default: Value) -> Self {
        self.property(PropertyDef::new(name, Visibility::Protected, default))
    }

    pub fn private_property(self, name: &str, default: Value) -> Self {
        self.property(PropertyDef::new(name, Visibility::Private, default))
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.def
            .methods
            .insert(method.name.to_ascii_lowercase(), method);
        self
    }

    pub fn public_method(
        self,
        name: &str,
        params: Vec<ParamDef>,
        body: impl Fn(&Object, &[Value]) -> Result<Value, ModelError> + 'static,
    ) -> Self {
        self.method(MethodDef::new(
            name,
            Visibility::Public,
            params,
            Rc::new(body),
        ))
    }

    pub fn constant(mut self, name: &str, value: Value) -> Self {
        self.def.constants.insert(name.to_string(), value);
        self
    }

    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.def.source_path = Some(path.into());
        self
    }

    pub fn build(self) -> ClassDef {
        self.def
    }

    pub fn register(self, registry: &mut ClassRegistry) -> ClassId {
        registry.register(self.def)
    }
}

/// Process-local class arena with case-insensitive name lookup.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<ClassDef>,
    by_name: HashMap<String, ClassId>,
    functions: IndexMap<String, FunctionDef>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class definition. Re-registering a name rebinds it to
    /// the new definition (last wins).
    pub fn register(&mut self, def: ClassDef) -> ClassId {
        let id = ClassId(self.classes.len());
        self.by_name.insert(def.name.to_ascii_lowercase(), id);
        self.classes.push(def);
        id
    }

    pub fn register_function(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.clone(), def);
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name
            .get(&name.trim_start_matches('\\').to_ascii_lowercase())
            .copied()
    }

    pub fn class_exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn get(&self, id: ClassId) -> &ClassDef {
        &self.classes[id.0]
    }

    pub fn parent(&self, id: ClassId) -> Option<ClassId> {
        self.get(id).parent
    }

    /// The class itself followed by its ancestors, root last.
    pub fn ancestry(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Property lookup honoring language visibility: a private property is
    /// only found on the class declaring it.
    pub fn find_visible_property(
        &self,
        id: ClassId,
        name: &str,
    ) -> Option<(ClassId, &PropertyDef)> {
        for (depth, class_id) in self.ancestry(id).into_iter().enumerate() {
            if let Some(property) = self.get(class_id).property(name) {
                if depth == 0 || property.visibility != Visibility::Private {
                    return Some((class_id, property));
                }
                return None;
            }
        }
        None
    }

    /// Property lookup ignoring visibility, for callers that explicitly
    /// asked to see inherited private state.
    pub fn find_property_any(&self, id: ClassId, name: &str) -> Option<(ClassId, &PropertyDef)> {
        for class_id in self.ancestry(id) {
            if let Some(property) = self.get(class_id).property(name) {
                return Some((class_id, property));
            }
        }
        None
    }

    /// Case-insensitive method lookup on the class or any ancestor.
    pub fn find_method(&self, id: ClassId, name: &str) -> Option<(ClassId, &MethodDef)> {
        for class_id in self.ancestry(id) {
            if let Some(method) = self.get(class_id).own_method(name) {
                return Some((class_id, method));
            }
        }
        None
    }

    pub fn class_constant(&self, id: ClassId, name: &str) -> Option<&Value> {
        for class_id in self.ancestry(id) {
            if let Some(value) = self.get(class_id).constants.get(name) {
                return Some(value);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> (ClassRegistry, ClassId, ClassId) {
        let mut registry = ClassRegistry::new();
        let base = ClassBuilder::class("Base")
            .private_property("hidden", Value::Int(1))
            .public_property("shared", Value::Str("base".into()))
            .public_method("describe", vec![], |_, _| Ok(Value::Str("base".into())))
            .register(&mut registry);
        let derived = ClassBuilder::class("Derived")
            .parent(base)
            .public_property("extra", Value::Null)
            .register(&mut registry);
        (registry, base, derived)
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let (registry, base, _) = sample_registry();
        assert_eq!(registry.lookup("BASE"), Some(base));
        assert_eq!(registry.lookup("\\base"), Some(base));
        assert!(registry.lookup("Unknown").is_none());
    }

    #[test]
    fn private_parent_property_is_invisible_by_default() {
        let (registry, base, derived) = sample_registry();
        assert!(registry.find_visible_property(derived, "hidden").is_none());
        assert!(registry.find_property_any(derived, "hidden").is_some());
        // Public inherited property is visible.
        let (owner, _) = registry.find_visible_property(derived, "shared").unwrap();
        assert_eq!(owner, base);
    }

    #[test]
    fn method_lookup_walks_ancestors_case_insensitively() {
        let (registry, base, derived) = sample_registry();
        let (owner, method) = registry.find_method(derived, "DESCRIBE").unwrap();
        assert_eq!(owner, base);
        assert_eq!(method.name, "describe");
    }

    #[test]
    fn force_accessible_is_one_way() {
        let property = PropertyDef::new("secret", Visibility::Private, Value::Null);
        assert!(!property.is_accessible());
        property.force_accessible();
        assert!(property.is_accessible());
    }
}
