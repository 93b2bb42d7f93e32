use crate::constant::{Constant, ConstantValue, evaluate_literal};
use crate::error::SourceError;
use crate::lexer::tokenize;
use crate::scope::Scope;
use crate::token::{Token, TokenKind};
use crate::visitor::{ScopeVisitor, VisitEvent, doc_comment_before, skip_whitespace};
use bitflags::bitflags;
use indexmap::IndexMap;
use loupe_model::{ClassId, ClassRegistry, FunctionDef};
use once_cell::unsync::OnceCell;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

bitflags! {
    /// File inspection options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FileFlags: u32 {
        /// Constant value expressions may be evaluated.
        const SAFE = 1 << 0;
        /// Declarations may be resolved against the class registry even
        /// though the file itself was not seen loading.
        const AUTOLOADABLE = 1 << 1;
        /// The file's declarations are known to be loaded into the
        /// registry.
        const LOADED = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeclarationKind {
    Namespace,
    Use,
    Const,
    Function,
    Interface,
    Trait,
    Class,
}

/// Structure kinds in fixed lookup priority order.
const STRUCTURE_KINDS: [DeclarationKind; 3] = [
    DeclarationKind::Interface,
    DeclarationKind::Trait,
    DeclarationKind::Class,
];

/// Default kind priority for name resolution.
const DEFAULT_LOOKUP_KINDS: [DeclarationKind; 5] = [
    DeclarationKind::Interface,
    DeclarationKind::Trait,
    DeclarationKind::Class,
    DeclarationKind::Function,
    DeclarationKind::Const,
];

/// A declared interface, trait or class: the plain qualified name, or a
/// registry handle when the file is resolved against a loaded registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureHandle {
    Name(String),
    Bound { name: String, class: ClassId },
}

impl StructureHandle {
    pub fn qualified_name(&self) -> &str {
        match self {
            StructureHandle::Name(name) => name,
            StructureHandle::Bound { name, .. } => name,
        }
    }

    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            StructureHandle::Name(_) => None,
            StructureHandle::Bound { class, .. } => Some(*class),
        }
    }
}

/// A declared free function, optionally bound to its registry descriptor.
#[derive(Debug, Clone)]
pub enum FunctionHandle {
    Name(String),
    Bound {
        name: String,
        function: FunctionDef,
    },
}

impl FunctionHandle {
    pub fn qualified_name(&self) -> &str {
        match self {
            FunctionHandle::Name(name) => name,
            FunctionHandle::Bound { name, .. } => name,
        }
    }
}

/// Name resolution options.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Fall back to a registry existence check when the file itself does
    /// not declare the name.
    pub global: bool,
    /// Namespaces to search instead of the namespaces declared in the
    /// file. They should be part of the file's namespaces.
    pub namespaces: Option<Vec<String>>,
}

#[derive(Debug, Default)]
struct DeclarationIndex {
    namespaces: Vec<(String, Scope)>,
    /// Imported name -> alias.
    uses: IndexMap<String, String>,
    /// Qualified name -> constant.
    constants: IndexMap<String, (Constant, Scope)>,
    functions: IndexMap<String, (FunctionHandle, Scope)>,
    interfaces: IndexMap<String, (StructureHandle, Scope)>,
    traits: IndexMap<String, (StructureHandle, Scope)>,
    classes: IndexMap<String, (StructureHandle, Scope)>,
}

impl DeclarationIndex {
    fn structure_bucket(&self, kind: DeclarationKind) -> &IndexMap<String, (StructureHandle, Scope)> {
        match kind {
            DeclarationKind::Interface => &self.interfaces,
            DeclarationKind::Trait => &self.traits,
            DeclarationKind::Class => &self.classes,
            _ => unreachable!("not a structure kind"),
        }
    }

    fn contains(&self, kind: DeclarationKind, name: &str) -> bool {
        match kind {
            DeclarationKind::Namespace => self.namespaces.iter().any(|(ns, _)| ns == name),
            DeclarationKind::Use => self.uses.contains_key(name),
            DeclarationKind::Const => self.constants.contains_key(name),
            DeclarationKind::Function => self.functions.contains_key(name),
            DeclarationKind::Interface | DeclarationKind::Trait | DeclarationKind::Class => {
                self.structure_bucket(kind).contains_key(name)
            }
        }
    }

    /// Exact lookup, then each declared namespace prefix for short names.
    fn find_in<'a, T>(&self, map: &'a IndexMap<String, T>, name: &str) -> Option<&'a T> {
        if let Some(entry) = map.get(name) {
            return Some(entry);
        }
        if name.contains('\\') {
            return None;
        }
        for (namespace, _) in &self.namespaces {
            if namespace.is_empty() {
                continue;
            }
            if let Some(entry) = map.get(&format!("{}\\{}", namespace, name)) {
                return Some(entry);
            }
        }
        None
    }
}

/// Captured declaration site, waiting for the naming pass.
#[derive(Debug, Clone, Copy)]
struct Captured {
    kind: DeclarationKind,
    scope: Scope,
    token: usize,
}

/// Structural information about one PHP source file.
///
/// Tokenization and index building are lazy and memoized; querying any
/// declaration triggers a single scanning pass over the whole file.
/// Rebuilding is not supported; construct a new instance to re-scan.
pub struct SourceFile {
    path: Option<PathBuf>,
    flags: FileFlags,
    registry: Option<Rc<ClassRegistry>>,
    source: OnceCell<String>,
    tokens: OnceCell<Vec<Token>>,
    index: OnceCell<DeclarationIndex>,
    structure_constants: RefCell<HashMap<String, IndexMap<String, Constant>>>,
}

impl SourceFile {
    /// Inspect a file on disk. Fails early when the path does not exist;
    /// the content is read on first query.
    pub fn open(path: impl AsRef<Path>, flags: FileFlags) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let path = path.canonicalize().map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(SourceFile {
            path: Some(path),
            flags,
            registry: None,
            source: OnceCell::new(),
            tokens: OnceCell::new(),
            index: OnceCell::new(),
            structure_constants: RefCell::new(HashMap::new()),
        })
    }

    /// Inspect in-memory source text.
    pub fn from_source(source: impl Into<String>, flags: FileFlags) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(source.into());
        SourceFile {
            path: None,
            flags,
            registry: None,
            source: cell,
            tokens: OnceCell::new(),
            index: OnceCell::new(),
            structure_constants: RefCell::new(HashMap::new()),
        }
    }

    /// Inspect the source file a registered class was declared in.
    /// Implies `LOADED`.
    pub fn for_class(
        registry: &Rc<ClassRegistry>,
        class: ClassId,
        flags: FileFlags,
    ) -> Result<Self, SourceError> {
        let def = registry.get(class);
        let Some(path) = def.source_path.clone() else {
            return Err(SourceError::InvalidArgument(format!(
                "class '{}' has no recorded source file",
                def.name
            )));
        };
        let file = Self::open(path, flags | FileFlags::LOADED)?;
        Ok(file.with_registry(Rc::clone(registry)))
    }

    /// Attach a class registry, enabling resolved-mode declaration
    /// handles and global name lookup.
    pub fn with_registry(mut self, registry: Rc<ClassRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn flags(&self) -> FileFlags {
        self.flags
    }

    fn source(&self) -> Result<&str, SourceError> {
        let source = self.source.get_or_try_init(|| {
            let path = self
                .path
                .as_ref()
                .expect("either a path or in-memory source is always present");
            std::fs::read_to_string(path).map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })
        })?;
        Ok(source)
    }

    fn tokens(&self) -> Result<&[Token], SourceError> {
        let tokens = self
            .tokens
            .get_or_try_init(|| Ok::<_, SourceError>(tokenize(self.source()?)))?;
        Ok(tokens)
    }

    fn index(&self) -> Result<&DeclarationIndex, SourceError> {
        self.index.get_or_try_init(|| self.build_index())
    }

    // ----- namespaces ---------------------------------------------------

    /// Names of the namespaces declared in the file, in index order.
    pub fn namespaces(&self) -> Result<Vec<&str>, SourceError> {
        Ok(self
            .index()?
            .namespaces
            .iter()
            .map(|(name, _)| name.as_str())
            .collect())
    }

    pub fn has_namespace(&self, name: &str) -> Result<bool, SourceError> {
        Ok(self.index()?.namespaces.iter().any(|(ns, _)| ns == name))
    }

    // ----- imports ------------------------------------------------------

    /// Map of `use` statements: imported qualified name -> local alias.
    pub fn use_aliases(&self) -> Result<&IndexMap<String, String>, SourceError> {
        Ok(&self.index()?.uses)
    }

    // ----- constants ----------------------------------------------------

    /// Constants declared at file or namespace level, in declaration
    /// order, keyed by qualified name.
    pub fn constants(&self) -> Result<Vec<(&str, &Constant)>, SourceError> {
        Ok(self
            .index()?
            .constants
            .iter()
            .map(|(name, (constant, _))| (name.as_str(), constant))
            .collect())
    }

    /// Qualified names of the file's constants, in declaration order.
    pub fn constant_names(&self) -> Result<Vec<&str>, SourceError> {
        Ok(self.index()?.constants.keys().map(String::as_str).collect())
    }

    pub fn has_constant(&self, name: &str) -> Result<bool, SourceError> {
        let index = self.index()?;
        Ok(index.find_in(&index.constants, name).is_some())
    }

    pub fn constant(&self, name: &str) -> Result<&Constant, SourceError> {
        let index = self.index()?;
        index
            .find_in(&index.constants, name)
            .map(|(constant, _)| constant)
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }

    /// A constant declared inside an interface, trait or class body.
    /// The structure's body is re-scanned on first request and the
    /// resulting table is cached.
    pub fn structure_constant(
        &self,
        structure: &str,
        name: &str,
    ) -> Result<Constant, SourceError> {
        let qualified =
            self.qualified_name(structure, Some(&STRUCTURE_KINDS), &LookupOptions::default())?;
        if !self.structure_constants.borrow().contains_key(&qualified) {
            let table = self.scan_structure_constants(&qualified)?;
            self.structure_constants
                .borrow_mut()
                .insert(qualified.clone(), table);
        }
        self.structure_constants
            .borrow()
            .get(&qualified)
            .and_then(|table| table.get(name))
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("{}::{}", qualified, name)))
    }

    fn scan_structure_constants(
        &self,
        qualified: &str,
    ) -> Result<IndexMap<String, Constant>, SourceError> {
        let index = self.index()?;
        let scope = STRUCTURE_KINDS
            .iter()
            .find_map(|kind| index.structure_bucket(*kind).get(qualified))
            .map(|(_, scope)| *scope)
            .ok_or_else(|| SourceError::NotFound(qualified.to_string()))?;

        let tokens = self.tokens()?;
        let mut table = IndexMap::new();
        let visitor = ScopeVisitor::with_range(tokens, scope.start, scope.end);
        for event in visitor {
            let VisitEvent::Token { index: at, token } = event else {
                continue;
            };
            if token.kind != TokenKind::Const {
                continue;
            }
            let doc = doc_comment_before(tokens, at.saturating_sub(1));
            let name_index = skip_whitespace(tokens, at + 1);
            let name_token = tokens.get(name_index).ok_or_else(|| {
                SourceError::malformed("name expected after const keyword", token.line)
            })?;
            if name_token.kind != TokenKind::Identifier {
                return Err(SourceError::malformed(
                    "name expected after const keyword",
                    name_token.line,
                ));
            }
            let value_index = skip_whitespace(tokens, name_index + 1);
            let (value, _) = self.read_constant_value(tokens, value_index)?;
            table.insert(
                name_token.text.clone(),
                Constant::new(name_token.text.clone(), value, doc),
            );
        }
        Ok(table)
    }

    // ----- functions ----------------------------------------------------

    /// Free functions, in declaration order, keyed by qualified name.
    pub fn functions(&self) -> Result<Vec<(&str, &FunctionHandle)>, SourceError> {
        Ok(self
            .index()?
            .functions
            .iter()
            .map(|(name, (handle, _))| (name.as_str(), handle))
            .collect())
    }

    pub fn has_function(&self, name: &str) -> Result<bool, SourceError> {
        let index = self.index()?;
        Ok(index.find_in(&index.functions, name).is_some())
    }

    pub fn function(&self, name: &str) -> Result<FunctionHandle, SourceError> {
        let index = self.index()?;
        index
            .find_in(&index.functions, name)
            .map(|(handle, _)| handle.clone())
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }

    // ----- structures ---------------------------------------------------

    pub fn interfaces(&self) -> Result<Vec<&StructureHandle>, SourceError> {
        self.structures_of(DeclarationKind::Interface)
    }

    pub fn traits(&self) -> Result<Vec<&StructureHandle>, SourceError> {
        self.structures_of(DeclarationKind::Trait)
    }

    pub fn classes(&self) -> Result<Vec<&StructureHandle>, SourceError> {
        self.structures_of(DeclarationKind::Class)
    }

    fn structures_of(&self, kind: DeclarationKind) -> Result<Vec<&StructureHandle>, SourceError> {
        Ok(self
            .index()?
            .structure_bucket(kind)
            .values()
            .map(|(handle, _)| handle)
            .collect())
    }

    pub fn interface_names(&self) -> Result<Vec<&str>, SourceError> {
        self.structure_names_of(DeclarationKind::Interface)
    }

    pub fn trait_names(&self) -> Result<Vec<&str>, SourceError> {
        self.structure_names_of(DeclarationKind::Trait)
    }

    pub fn class_names(&self) -> Result<Vec<&str>, SourceError> {
        self.structure_names_of(DeclarationKind::Class)
    }

    fn structure_names_of(&self, kind: DeclarationKind) -> Result<Vec<&str>, SourceError> {
        Ok(self
            .index()?
            .structure_bucket(kind)
            .keys()
            .map(String::as_str)
            .collect())
    }

    pub fn has_interface(&self, name: &str) -> Result<bool, SourceError> {
        self.has_structure_of(DeclarationKind::Interface, name)
    }

    pub fn has_trait(&self, name: &str) -> Result<bool, SourceError> {
        self.has_structure_of(DeclarationKind::Trait, name)
    }

    pub fn has_class(&self, name: &str) -> Result<bool, SourceError> {
        self.has_structure_of(DeclarationKind::Class, name)
    }

    fn has_structure_of(&self, kind: DeclarationKind, name: &str) -> Result<bool, SourceError> {
        let index = self.index()?;
        Ok(index.find_in(index.structure_bucket(kind), name).is_some())
    }

    pub fn interface(&self, name: &str) -> Result<StructureHandle, SourceError> {
        self.structure_of(DeclarationKind::Interface, name)
    }

    pub fn trait_(&self, name: &str) -> Result<StructureHandle, SourceError> {
        self.structure_of(DeclarationKind::Trait, name)
    }

    pub fn class(&self, name: &str) -> Result<StructureHandle, SourceError> {
        self.structure_of(DeclarationKind::Class, name)
    }

    fn structure_of(
        &self,
        kind: DeclarationKind,
        name: &str,
    ) -> Result<StructureHandle, SourceError> {
        let index = self.index()?;
        index
            .find_in(index.structure_bucket(kind), name)
            .map(|(handle, _)| handle.clone())
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }

    /// All interfaces, traits and classes: interfaces first, then traits,
    /// then classes, each group in declaration order.
    pub fn structures(&self) -> Result<Vec<&StructureHandle>, SourceError> {
        let mut all = Vec::new();
        for kind in STRUCTURE_KINDS {
            all.extend(self.structures_of(kind)?);
        }
        Ok(all)
    }

    /// Qualified names of all structures, grouped like `structures()`.
    pub fn structure_names(&self) -> Result<Vec<&str>, SourceError> {
        let mut all = Vec::new();
        for kind in STRUCTURE_KINDS {
            all.extend(self.structure_names_of(kind)?);
        }
        Ok(all)
    }

    pub fn has_structure(&self, name: &str) -> Result<bool, SourceError> {
        for kind in STRUCTURE_KINDS {
            if self.has_structure_of(kind, name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// First structure found under the given name, scanning interfaces,
    /// then traits, then classes.
    pub fn structure(&self, name: &str) -> Result<StructureHandle, SourceError> {
        for kind in STRUCTURE_KINDS {
            match self.structure_of(kind, name) {
                Ok(handle) => return Ok(handle),
                Err(SourceError::NotFound(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(SourceError::NotFound(name.to_string()))
    }

    /// Kind of the structure declared under the given name, if any.
    pub fn structure_kind(&self, name: &str) -> Result<Option<DeclarationKind>, SourceError> {
        for kind in STRUCTURE_KINDS {
            if self.has_structure_of(kind, name)? {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }

    // ----- name resolution ----------------------------------------------

    /// Resolve a local name to its qualified form.
    ///
    /// Strict resolution order: leading-separator absolute names are
    /// returned as-is (separator stripped); then the import table, alias
    /// to imported name; then each candidate namespace prefix against the
    /// file's declarations, kinds tried in fixed priority; then,
    /// opt-in, a registry existence check.
    pub fn qualified_name(
        &self,
        name: &str,
        kinds: Option<&[DeclarationKind]>,
        options: &LookupOptions,
    ) -> Result<String, SourceError> {
        if let Some(absolute) = name.strip_prefix('\\') {
            return Ok(absolute.to_string());
        }

        let index = self.index()?;
        for (imported, alias) in &index.uses {
            if alias == name {
                return Ok(imported.clone());
            }
        }

        let mut candidates = vec![name.to_string()];
        let namespaces: Vec<String> = match &options.namespaces {
            Some(list) => list.clone(),
            None => index
                .namespaces
                .iter()
                .map(|(ns, _)| ns.clone())
                .collect(),
        };
        for namespace in &namespaces {
            if !namespace.is_empty() {
                candidates.push(format!("{}\\{}", namespace, name));
            }
        }

        let kinds = kinds.unwrap_or(&DEFAULT_LOOKUP_KINDS);
        for candidate in &candidates {
            for kind in kinds {
                if index.contains(*kind, candidate) {
                    return Ok(candidate.clone());
                }
            }
        }

        if options.global {
            if let Some(registry) = &self.registry {
                for candidate in &candidates {
                    if registry.class_exists(candidate) {
                        return Ok(candidate.clone());
                    }
                }
            }
        }

        Err(SourceError::NotFound(name.to_string()))
    }

    /// Like `qualified_name` but with the namespace-root marker kept.
    pub fn fully_qualified_name(
        &self,
        name: &str,
        kinds: Option<&[DeclarationKind]>,
        options: &LookupOptions,
    ) -> Result<String, SourceError> {
        if name.starts_with('\\') {
            return Ok(name.to_string());
        }
        Ok(format!("\\{}", self.qualified_name(name, kinds, options)?))
    }

    // ----- index construction -------------------------------------------

    fn build_index(&self) -> Result<DeclarationIndex, SourceError> {
        let tokens = self.tokens()?;
        let mut captured: Vec<Captured> = Vec::new();

        let mut visitor = ScopeVisitor::new(tokens);
        while let Some(event) = visitor.next() {
            match event {
                VisitEvent::Token { index, token } => {
                    let kind = match token.kind {
                        TokenKind::Use => DeclarationKind::Use,
                        TokenKind::Const => DeclarationKind::Const,
                        _ => continue,
                    };
                    // Only file-level and namespace-level imports and
                    // constants; `use` of a trait inside a class body and
                    // class constants are someone else's business.
                    let Some(scope) = visitor.current_scope().copied() else {
                        continue;
                    };
                    let namespace_level = scope.level == 0
                        || scope
                            .decl
                            .map(|decl| tokens[decl].kind == TokenKind::Namespace)
                            .unwrap_or(false);
                    if namespace_level {
                        captured.push(Captured {
                            kind,
                            scope,
                            token: index,
                        });
                    }
                }
                VisitEvent::ScopeClosed(scope) => {
                    let Some(decl) = scope.decl else { continue };
                    let kind = match tokens[decl].kind {
                        TokenKind::Namespace => DeclarationKind::Namespace,
                        TokenKind::Function => DeclarationKind::Function,
                        TokenKind::Interface => DeclarationKind::Interface,
                        TokenKind::Trait => DeclarationKind::Trait,
                        TokenKind::Class => DeclarationKind::Class,
                        _ => continue,
                    };
                    captured.push(Captured {
                        kind,
                        scope,
                        token: decl,
                    });
                }
                VisitEvent::ScopeOpened(_) => {}
            }
        }

        let mut index = DeclarationIndex::default();
        for kind in [
            DeclarationKind::Namespace,
            DeclarationKind::Use,
            DeclarationKind::Const,
            DeclarationKind::Function,
            DeclarationKind::Interface,
            DeclarationKind::Trait,
            DeclarationKind::Class,
        ] {
            for entry in captured.iter().filter(|entry| entry.kind == kind) {
                self.index_declaration(tokens, entry, &mut index)?;
            }
        }
        Ok(index)
    }

    fn index_declaration(
        &self,
        tokens: &[Token],
        entry: &Captured,
        index: &mut DeclarationIndex,
    ) -> Result<(), SourceError> {
        let decl = entry.token;
        let mut name_start = skip_whitespace(tokens, decl + 1);
        if entry.kind == DeclarationKind::Use {
            // `use function f;` / `use const C;` imports.
            if let Some(token) = tokens.get(name_start) {
                if matches!(token.kind, TokenKind::Function | TokenKind::Const) {
                    name_start = skip_whitespace(tokens, name_start + 1);
                }
            }
        }
        let (name, after_name) = read_qualified_name(tokens, name_start);

        match entry.kind {
            DeclarationKind::Namespace => {
                index.namespaces.push((name, entry.scope));
            }
            DeclarationKind::Use => {
                // A group import like `use A\{B, C};` stops the name scan at
                // the brace, leaving only the shared prefix. Skip it rather
                // than record a dangling entry.
                if name.is_empty() || name.ends_with('\\') {
                    return Ok(());
                }
                let mut at = skip_whitespace(tokens, after_name);
                let alias = match tokens.get(at) {
                    Some(token) if token.kind == TokenKind::As => {
                        at = skip_whitespace(tokens, at + 1);
                        tokens
                            .get(at)
                            .map(|token| token.text.clone())
                            .unwrap_or_default()
                    }
                    _ => local_name(&name).to_string(),
                };
                if index.uses.insert(name.clone(), alias).is_some() {
                    tracing::debug!(name = %name, "duplicate import, last one wins");
                }
            }
            DeclarationKind::Const => {
                if name.is_empty() {
                    return Ok(());
                }
                let mut key = name.clone();
                if let Some(owner) = entry.scope.decl {
                    if tokens[owner].kind == TokenKind::Namespace {
                        let namespace = declared_namespace_name(tokens, owner);
                        if !namespace.is_empty() {
                            key = format!("{}\\{}", namespace, name);
                        }
                    }
                }
                let doc = doc_comment_before(tokens, decl.saturating_sub(1));
                let value_index = skip_whitespace(tokens, after_name);
                let (value, _) = self.read_constant_value(tokens, value_index)?;
                let constant = Constant::new(name, value, doc);
                if index
                    .constants
                    .insert(key.clone(), (constant, entry.scope))
                    .is_some()
                {
                    tracing::debug!(name = %key, "duplicate constant declaration, last one wins");
                }
            }
            DeclarationKind::Function => {
                // A function scope whose parent is a class or trait body
                // is a method, not a free function.
                if let Some(parent) = entry.scope.parent_decl {
                    if !matches!(
                        tokens[parent].kind,
                        TokenKind::OpenTag | TokenKind::Namespace
                    ) {
                        return Ok(());
                    }
                }
                // Anonymous functions carry no name and are not indexed.
                if name.is_empty() {
                    return Ok(());
                }
                let qualified = self.qualify(tokens, &entry.scope, &name);
                let handle = self.function_handle(&qualified);
                if index
                    .functions
                    .insert(qualified.clone(), (handle, entry.scope))
                    .is_some()
                {
                    tracing::debug!(name = %qualified, "duplicate function declaration, last one wins");
                }
            }
            DeclarationKind::Interface | DeclarationKind::Trait | DeclarationKind::Class => {
                if name.is_empty() {
                    return Ok(());
                }
                let qualified = self.qualify(tokens, &entry.scope, &name);
                let handle = self.structure_handle(&qualified);
                let bucket = match entry.kind {
                    DeclarationKind::Interface => &mut index.interfaces,
                    DeclarationKind::Trait => &mut index.traits,
                    _ => &mut index.classes,
                };
                if bucket
                    .insert(qualified.clone(), (handle, entry.scope))
                    .is_some()
                {
                    tracing::debug!(name = %qualified, "duplicate structure declaration, last one wins");
                }
            }
        }
        Ok(())
    }

    /// Prefix a declaration name with its enclosing namespace, if any.
    fn qualify(&self, tokens: &[Token], scope: &Scope, name: &str) -> String {
        if let Some(parent) = scope.parent_decl {
            if tokens[parent].kind == TokenKind::Namespace {
                let namespace = declared_namespace_name(tokens, parent);
                if !namespace.is_empty() {
                    return format!("{}\\{}", namespace, name);
                }
            }
        }
        name.to_string()
    }

    fn structure_handle(&self, qualified: &str) -> StructureHandle {
        if self
            .flags
            .intersects(FileFlags::LOADED | FileFlags::AUTOLOADABLE)
        {
            if let Some(registry) = &self.registry {
                if let Some(class) = registry.lookup(qualified) {
                    return StructureHandle::Bound {
                        name: qualified.to_string(),
                        class,
                    };
                }
            }
        }
        StructureHandle::Name(qualified.to_string())
    }

    fn function_handle(&self, qualified: &str) -> FunctionHandle {
        if self.flags.contains(FileFlags::LOADED) {
            if let Some(registry) = &self.registry {
                if let Some(function) = registry.function(qualified) {
                    return FunctionHandle::Bound {
                        name: qualified.to_string(),
                        function: function.clone(),
                    };
                }
            }
        }
        FunctionHandle::Name(qualified.to_string())
    }

    /// Read `= <expression> ;` after a constant name. The expression is
    /// kept as raw text unless the file is safe to evaluate and the
    /// expression is a recognizable literal.
    fn read_constant_value(
        &self,
        tokens: &[Token],
        at: usize,
    ) -> Result<(ConstantValue, usize), SourceError> {
        let token = tokens.get(at).ok_or_else(|| {
            let line = tokens.last().map(|token| token.line).unwrap_or(0);
            SourceError::malformed("expected \"=\" after constant name", line)
        })?;
        if !token.is_text("=") {
            return Err(SourceError::malformed(
                "expected \"=\" after constant name",
                token.line,
            ));
        }
        let mut at = skip_whitespace(tokens, at + 1);
        let mut text = String::new();
        let mut value_tokens: Vec<&Token> = Vec::new();
        while at < tokens.len() && !tokens[at].is_semicolon() {
            if !tokens[at].is_ignorable() {
                text.push_str(&tokens[at].text);
                value_tokens.push(&tokens[at]);
            }
            at += 1;
        }
        let value = if self.flags.contains(FileFlags::SAFE) {
            match evaluate_literal(&value_tokens) {
                Some(value) => ConstantValue::Evaluated(value),
                // Not a literal; evaluation of arbitrary expressions is
                // out of scope, keep the source text.
                None => ConstantValue::Raw(text),
            }
        } else {
            ConstantValue::Raw(text)
        };
        Ok((value, at))
    }
}

/// Read a contiguous identifier / namespace-separator run.
fn read_qualified_name(tokens: &[Token], mut at: usize) -> (String, usize) {
    let mut name = String::new();
    while at < tokens.len() {
        match tokens[at].kind {
            TokenKind::Identifier | TokenKind::NsSeparator => {
                name.push_str(&tokens[at].text);
            }
            _ => break,
        }
        at += 1;
    }
    (name, at)
}

/// Trailing segment of a qualified name.
fn local_name(qualified: &str) -> &str {
    qualified.rsplit('\\').next().unwrap_or(qualified)
}

/// Name declared by the namespace token at `at`.
fn declared_namespace_name(tokens: &[Token], at: usize) -> String {
    let start = skip_whitespace(tokens, at + 1);
    read_qualified_name(tokens, start).0
}
