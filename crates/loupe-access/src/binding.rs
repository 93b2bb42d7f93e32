use crate::error::AccessError;
use loupe_model::{ClassId, ClassRegistry, MethodDef, ModelError, Object, PropertyDef, Value, Visibility};

/// A declared property, referenced by its declaring class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRef {
    pub class: ClassId,
    pub name: String,
}

/// An accessor method, referenced by its declaring class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub class: ClassId,
    pub name: String,
}

/// The access strategy chosen for one field request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// Plain field access; visibility was public or has been forced open.
    Direct(PropertyRef),
    /// Accessor methods, with the underlying property kept as a fallback
    /// for the direction that has no method.
    Accessor {
        property: Option<PropertyRef>,
        read: Option<MethodRef>,
        write: Option<MethodRef>,
    },
    /// No legal access path; only produced when neither `READABLE` nor
    /// `WRITABLE` was required.
    Unresolved,
}

/// The result of resolving one field request against the policy flags.
///
/// Every operation is an explicit match over the binding tag; there is no
/// open-ended forwarding.
#[derive(Debug, Clone)]
pub struct PropertyBinding {
    /// Class the request was made against (not necessarily the declaring
    /// class), kept for error messages.
    class: ClassId,
    field: String,
    kind: BindingKind,
}

impl PropertyBinding {
    pub(crate) fn new(class: ClassId, field: impl Into<String>, kind: BindingKind) -> Self {
        PropertyBinding {
            class,
            field: field.into(),
            kind,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.kind, BindingKind::Unresolved)
    }

    /// The underlying property, when the binding has one.
    pub fn property_ref(&self) -> Option<&PropertyRef> {
        match &self.kind {
            BindingKind::Direct(property) => Some(property),
            BindingKind::Accessor { property, .. } => property.as_ref(),
            BindingKind::Unresolved => None,
        }
    }

    pub fn visibility(&self, registry: &ClassRegistry) -> Option<Visibility> {
        let property = self.property_ref()?;
        property_def(registry, property).ok().map(|def| def.visibility)
    }

    pub fn is_public(&self, registry: &ClassRegistry) -> bool {
        self.visibility(registry) == Some(Visibility::Public)
    }

    pub fn doc_comment<'r>(&self, registry: &'r ClassRegistry) -> Option<&'r str> {
        let property = self.property_ref()?;
        property_def(registry, property)
            .ok()
            .and_then(|def| def.doc_comment.as_deref())
    }

    pub fn get_value(
        &self,
        registry: &ClassRegistry,
        object: &Object,
    ) -> Result<Value, AccessError> {
        match &self.kind {
            BindingKind::Direct(property) => self.read_field(registry, object, property),
            BindingKind::Accessor { read, property, .. } => match read {
                Some(method) => {
                    let def = method_def(registry, method)?;
                    Ok(def.invoke(object, &[])?)
                }
                None => match property {
                    Some(property) => self.read_field(registry, object, property),
                    None => Err(self.not_readable(registry)),
                },
            },
            BindingKind::Unresolved => Err(self.not_readable(registry)),
        }
    }

    pub fn set_value(
        &self,
        registry: &ClassRegistry,
        object: &Object,
        value: Value,
    ) -> Result<(), AccessError> {
        match &self.kind {
            BindingKind::Direct(property) => self.write_field(registry, object, property, value),
            BindingKind::Accessor {
                write, property, ..
            } => match write {
                Some(method) => {
                    let def = method_def(registry, method)?;
                    def.invoke(object, &[value])?;
                    Ok(())
                }
                None => match property {
                    Some(property) => self.write_field(registry, object, property, value),
                    None => Err(self.not_writable(registry)),
                },
            },
            BindingKind::Unresolved => Err(self.not_writable(registry)),
        }
    }

    fn read_field(
        &self,
        registry: &ClassRegistry,
        object: &Object,
        property: &PropertyRef,
    ) -> Result<Value, AccessError> {
        let def = property_def(registry, property)?;
        if !def.is_accessible() {
            return Err(self.not_readable(registry));
        }
        Ok(object
            .get(&property.name)
            .unwrap_or_else(|| def.default.clone()))
    }

    fn write_field(
        &self,
        registry: &ClassRegistry,
        object: &Object,
        property: &PropertyRef,
        value: Value,
    ) -> Result<(), AccessError> {
        let def = property_def(registry, property)?;
        if !def.is_accessible() {
            return Err(self.not_writable(registry));
        }
        object.set(&property.name, value);
        Ok(())
    }

    fn not_readable(&self, registry: &ClassRegistry) -> AccessError {
        AccessError::NotReadable {
            class: registry.get(self.class).name.clone(),
            property: self.field.clone(),
        }
    }

    fn not_writable(&self, registry: &ClassRegistry) -> AccessError {
        AccessError::NotWritable {
            class: registry.get(self.class).name.clone(),
            property: self.field.clone(),
        }
    }
}

fn property_def<'r>(
    registry: &'r ClassRegistry,
    property: &PropertyRef,
) -> Result<&'r PropertyDef, AccessError> {
    registry
        .get(property.class)
        .property(&property.name)
        .ok_or_else(|| {
            AccessError::Model(ModelError::PropertyNotFound(
                registry.get(property.class).name.clone(),
                property.name.clone(),
            ))
        })
}

fn method_def<'r>(
    registry: &'r ClassRegistry,
    method: &MethodRef,
) -> Result<&'r MethodDef, AccessError> {
    registry.get(method.class).own_method(&method.name).ok_or_else(|| {
        AccessError::Model(ModelError::MethodNotFound(
            registry.get(method.class).name.clone(),
            method.name.clone(),
        ))
    })
}
