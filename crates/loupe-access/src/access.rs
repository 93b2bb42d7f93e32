use crate::binding::{BindingKind, MethodRef, PropertyBinding, PropertyRef};
use crate::error::AccessError;
use crate::flags::AccessFlags;
use indexmap::IndexMap;
use loupe_model::{ClassId, ClassRegistry, Object, Value};
use std::rc::Rc;

/// Field access service over a class registry.
///
/// Accessor discovery concatenates a prefix and the field name and relies
/// on the registry's case-insensitive method lookup, so `getenabled`,
/// `getEnabled` and `GetEnabled` all match a field named `enabled`.
pub struct ObjectAccess {
    registry: Rc<ClassRegistry>,
    read_prefixes: Vec<String>,
    write_prefixes: Vec<String>,
}

impl ObjectAccess {
    pub fn new(registry: Rc<ClassRegistry>) -> Self {
        ObjectAccess {
            registry,
            read_prefixes: vec!["get".to_string(), "is".to_string()],
            write_prefixes: vec!["set".to_string(), "is".to_string()],
        }
    }

    pub fn with_read_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_write_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn registry(&self) -> &Rc<ClassRegistry> {
        &self.registry
    }

    /// Resolve a field request against a class name instead of an id.
    pub fn class_binding(
        &self,
        class_name: &str,
        field: &str,
        flags: AccessFlags,
    ) -> Result<PropertyBinding, AccessError> {
        let class = self
            .registry
            .lookup(class_name)
            .ok_or_else(|| AccessError::NotFound(class_name.to_string()))?;
        self.binding(class, field, flags)
    }

    /// Decide how a field may be accessed under the given flags.
    ///
    /// Resolution order: a public field binds directly unless a force flag
    /// promotes a discovered accessor over it; a non-public or undeclared
    /// field binds to a discovered accessor when allowed; a declared field
    /// binds directly once `EXPOSE_HIDDEN` forces its visibility open.
    /// When none of that applies the request is unresolved, which is an
    /// error exactly when `READABLE` or `WRITABLE` made it a requirement.
    pub fn binding(
        &self,
        class: ClassId,
        field: &str,
        flags: AccessFlags,
    ) -> Result<PropertyBinding, AccessError> {
        let declared = if flags.contains(AccessFlags::EXPOSE_INHERITED) {
            self.registry.find_property_any(class, field)
        } else {
            self.registry.get(class).property(field).map(|p| (class, p))
        };
        let declaring = declared.map(|(owner, _)| owner);

        let read = if flags.contains(AccessFlags::ALLOW_READ_METHOD) {
            self.find_read_method(class, declaring, field, flags)
        } else {
            None
        };
        let write = if flags.contains(AccessFlags::ALLOW_WRITE_METHOD) {
            self.find_write_method(class, declaring, field, flags)
        } else {
            None
        };

        if let Some((owner, property)) = declared {
            let property_ref = PropertyRef {
                class: owner,
                name: property.name.clone(),
            };
            if flags.contains(AccessFlags::EXPOSE_HIDDEN) && !property.is_public() {
                property.force_accessible();
            }
            if property.is_public() {
                let forced_read =
                    flags.contains(AccessFlags::FORCE_READ_METHOD) && read.is_some();
                let forced_write =
                    flags.contains(AccessFlags::FORCE_WRITE_METHOD) && write.is_some();
                if forced_read || forced_write {
                    return Ok(PropertyBinding::new(
                        class,
                        field,
                        BindingKind::Accessor {
                            property: Some(property_ref),
                            read: if forced_read { read } else { None },
                            write: if forced_write { write } else { None },
                        },
                    ));
                }
                return Ok(PropertyBinding::new(
                    class,
                    field,
                    BindingKind::Direct(property_ref),
                ));
            }
            if read.is_some() || write.is_some() {
                return Ok(PropertyBinding::new(
                    class,
                    field,
                    BindingKind::Accessor {
                        property: Some(property_ref),
                        read,
                        write,
                    },
                ));
            }
            if property.is_accessible() {
                return Ok(PropertyBinding::new(
                    class,
                    field,
                    BindingKind::Direct(property_ref),
                ));
            }
            return self.unresolved(class, field, flags);
        }

        if read.is_some() || write.is_some() {
            return Ok(PropertyBinding::new(
                class,
                field,
                BindingKind::Accessor {
                    property: None,
                    read,
                    write,
                },
            ));
        }
        self.unresolved(class, field, flags)
    }

    fn unresolved(
        &self,
        class: ClassId,
        field: &str,
        flags: AccessFlags,
    ) -> Result<PropertyBinding, AccessError> {
        let class_name = || self.registry.get(class).name.clone();
        if flags.contains(AccessFlags::READABLE) {
            return Err(AccessError::NotReadable {
                class: class_name(),
                property: field.to_string(),
            });
        }
        if flags.contains(AccessFlags::WRITABLE) {
            return Err(AccessError::NotWritable {
                class: class_name(),
                property: field.to_string(),
            });
        }
        Ok(PropertyBinding::new(class, field, BindingKind::Unresolved))
    }

    /// Read a field's value, or `Ok(None)` when no readable path exists
    /// and none was required.
    pub fn get_value(
        &self,
        object: &Object,
        field: &str,
        flags: AccessFlags,
    ) -> Result<Option<Value>, AccessError> {
        let binding = self.binding(object.class(), field, flags)?;
        if !binding.is_resolved() {
            return Ok(None);
        }
        match binding.get_value(&self.registry, object) {
            Ok(value) => Ok(Some(value)),
            Err(AccessError::NotReadable { .. }) if !flags.contains(AccessFlags::READABLE) => {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Write a field. `Ok(false)` means no writable path existed and none
    /// was required.
    pub fn set_value(
        &self,
        object: &Object,
        field: &str,
        value: Value,
        flags: AccessFlags,
    ) -> Result<bool, AccessError> {
        let binding = self.binding(object.class(), field, flags)?;
        if !binding.is_resolved() {
            return Ok(false);
        }
        match binding.set_value(&self.registry, object, value) {
            Ok(()) => Ok(true),
            Err(AccessError::NotWritable { .. }) if !flags.contains(AccessFlags::WRITABLE) => {
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// Read every declared field the flags give access to, in declaration
    /// order. With `EXPOSE_INHERITED`, ancestor fields come first and are
    /// read with `EXPOSE_HIDDEN` added, so a parent's private state is
    /// included once inherited exposure was requested.
    pub fn get_values(&self, object: &Object, flags: AccessFlags) -> IndexMap<String, Value> {
        let mut values = IndexMap::new();
        self.collect_values(object, object.class(), flags, &mut values);
        values
    }

    fn collect_values(
        &self,
        object: &Object,
        class: ClassId,
        flags: AccessFlags,
        out: &mut IndexMap<String, Value>,
    ) {
        if flags.contains(AccessFlags::EXPOSE_INHERITED) {
            if let Some(parent) = self.registry.parent(class) {
                self.collect_values(object, parent, flags | AccessFlags::EXPOSE_HIDDEN, out);
            }
        }
        let fields: Vec<String> = self.registry.get(class).properties.keys().cloned().collect();
        for field in fields {
            match self.get_value(object, &field, flags) {
                Ok(Some(value)) => {
                    out.insert(field, value);
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::debug!(%error, field = %field, "skipping unreadable field");
                }
            }
        }
    }

    /// Best-effort batch write; a field that cannot be written is skipped
    /// and never aborts the batch. Returns how many fields were written.
    pub fn set_values<'a, I>(&self, object: &Object, values: I, flags: AccessFlags) -> usize
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut written = 0;
        for (field, value) in values {
            match self.set_value(object, field, value, flags) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::debug!(%error, field = %field, "skipping unwritable field");
                }
            }
        }
        written
    }

    /// First method matching a read prefix plus the field name. Classes
    /// take priority over prefixes: every prefix is tried on the most
    /// derived class before moving up the chain, so a leaf's `is` accessor
    /// beats an ancestor's `get`.
    fn find_read_method(
        &self,
        class: ClassId,
        declaring: Option<ClassId>,
        field: &str,
        flags: AccessFlags,
    ) -> Option<MethodRef> {
        let chain = self.search_chain(class, declaring, flags);
        for &class_id in &chain {
            for prefix in &self.read_prefixes {
                let candidate = format!("{}{}", prefix, field);
                if let Some(method) = self.registry.get(class_id).own_method(&candidate) {
                    return Some(MethodRef {
                        class: class_id,
                        name: method.name.clone(),
                    });
                }
            }
        }
        None
    }

    /// Like `find_read_method` for write prefixes. An `is`-prefixed
    /// candidate with no parameters is a boolean getter by convention and
    /// is rejected as a setter.
    fn find_write_method(
        &self,
        class: ClassId,
        declaring: Option<ClassId>,
        field: &str,
        flags: AccessFlags,
    ) -> Option<MethodRef> {
        let chain = self.search_chain(class, declaring, flags);
        for &class_id in &chain {
            for prefix in &self.write_prefixes {
                let candidate = format!("{}{}", prefix, field);
                if let Some(method) = self.registry.get(class_id).own_method(&candidate) {
                    if prefix == "is" && method.arity() == 0 {
                        continue;
                    }
                    return Some(MethodRef {
                        class: class_id,
                        name: method.name.clone(),
                    });
                }
            }
        }
        None
    }

    /// Most-derived class first, then the declaring class; the whole
    /// ancestor chain under `EXPOSE_INHERITED`.
    fn search_chain(
        &self,
        class: ClassId,
        declaring: Option<ClassId>,
        flags: AccessFlags,
    ) -> Vec<ClassId> {
        if flags.contains(AccessFlags::EXPOSE_INHERITED) {
            return self.registry.ancestry(class);
        }
        let mut chain = vec![class];
        if let Some(declaring) = declaring {
            if declaring != class {
                chain.push(declaring);
            }
        }
        chain
    }
}
