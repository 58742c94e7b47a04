//! The statement parser: recursive descent over the reader's statement
//! stream with an explicit scope stack.
//!
//! Each scope kind whitelists the constructs it accepts; anything else is a
//! [`ParseError::UnexpectedConstruct`] that aborts the file. The parser
//! builds one [`EntityArena`] per file; name resolution is deferred
//! entirely to the correlation engine, so every cross-entity link leaves
//! here as an unresolved [`Ref`].

use std::mem;
use std::path::Path;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::warn;

use crate::base::fold_name;
use crate::error::ParseError;
use crate::model::entity::{
    ArgSlot, BoundProcedure, DerivedType, Entity, EntityKind, FinalProc, Interface, Module,
    ProcKind, Procedure, SourceFile, Submodule, Variable,
};
use crate::model::{EntityArena, EntityId, Permission, Ref, Use, UseItem};
use crate::reader::text::{mask_strings, paren_split, unmask_strings};
use crate::reader::{FortranReader, Statement};
use crate::settings::ProjectSettings;

use super::declarations::{implicit_type, parse_type, parse_variables};
use super::intrinsics::is_intrinsic;
use super::patterns;

/// The parse result for one source file: a private arena rooted at a
/// source-file entity, ready to be merged into the project arena.
#[derive(Debug)]
pub struct FileTree {
    pub arena: EntityArena,
    pub root: EntityId,
}

pub struct StatementParser<'s> {
    settings: &'s ProjectSettings,
}

impl<'s> StatementParser<'s> {
    pub fn new(settings: &'s ProjectSettings) -> Self {
        Self { settings }
    }

    /// Read and parse one file from disk.
    pub fn parse_file(&self, path: &Path) -> Result<FileTree, ParseError> {
        let reader = FortranReader::new(path, self.settings)?;
        self.run(path, reader)
    }

    /// Parse in-memory source. Fixed-form conversion still applies based on
    /// the extension of `path`.
    pub fn parse_text(&self, path: &Path, text: &str) -> Result<FileTree, ParseError> {
        let reader = FortranReader::from_text(path, text, self.settings);
        self.run(path, reader)
    }

    fn run(&self, path: &Path, reader: FortranReader<'_>) -> Result<FileTree, ParseError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut arena = EntityArena::new();
        let root = arena.alloc(Entity::new(
            name,
            Permission::Public,
            EntityKind::SourceFile(SourceFile::default()),
        ));

        let mut state = ParserState {
            arena,
            root,
            scopes: vec![Scope::new(Tag::File, Some(root), root, Permission::Public)],
            pending_doc: Vec::new(),
            last_targets: Vec::new(),
        };

        for stmt in reader {
            state.handle(stmt?)?;
        }
        if state.scopes.len() > 1 {
            return Err(ParseError::UnexpectedEof {
                scope: state.scope_desc(),
            });
        }

        Ok(FileTree {
            arena: state.arena,
            root,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    File,
    Module,
    Submodule,
    Program,
    Procedure,
    DerivedType,
    Interface,
}

/// One recorded attribute statement, applied at scope close.
struct AttribList {
    /// Normalized attribute text: lower-cased, whitespace removed.
    attr: String,
    /// Declared names, lower-cased, possibly carrying a `(dims)` suffix.
    names: Vec<String>,
}

struct Scope {
    tag: Tag,
    /// The entity this scope builds. `None` only for abstract and
    /// anonymous interface blocks, which dissolve at close.
    entity: Option<EntityId>,
    /// Nearest enclosing entity, used as parent for children declared here.
    owner: EntityId,
    /// Default permission for entities declared in this scope.
    ambient: Permission,
    in_contains: bool,
    /// Nesting depth of block/associate/enum constructs, inside which
    /// declarations are not ours to parse.
    block_level: usize,
    is_abstract: bool,
    attribs: Vec<AttribList>,
    /// Values from `parameter (name = value)` statements.
    params: FxHashMap<String, String>,
    /// Procedures from anonymous interface blocks, held for argument
    /// claiming and wrapped at close.
    iface_procs: Vec<EntityId>,
}

impl Scope {
    fn new(tag: Tag, entity: Option<EntityId>, owner: EntityId, ambient: Permission) -> Self {
        Self {
            tag,
            entity,
            owner,
            ambient,
            in_contains: false,
            block_level: 0,
            is_abstract: false,
            attribs: Vec::new(),
            params: FxHashMap::default(),
            iface_procs: Vec::new(),
        }
    }

    fn is_unit(&self) -> bool {
        matches!(
            self.tag,
            Tag::Module | Tag::Submodule | Tag::Program | Tag::Procedure
        )
    }
}

struct ParserState {
    arena: EntityArena,
    root: EntityId,
    scopes: Vec<Scope>,
    pending_doc: Vec<String>,
    /// Entities the next trailing doc statement attaches to.
    last_targets: Vec<EntityId>,
}

impl ParserState {
    fn current(&self) -> &Scope {
        self.scopes.last().expect("scope stack is never empty")
    }

    fn current_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn scope_desc(&self) -> String {
        let scope = self.current();
        match scope.entity {
            Some(id) if scope.tag != Tag::File => {
                let e = self.arena.get(id);
                format!("{} '{}'", e.kind_name(), e.name)
            }
            Some(_) => "file scope".to_string(),
            None => "interface block".to_string(),
        }
    }

    fn unexpected(&self, line: usize, statement: &str) -> ParseError {
        ParseError::UnexpectedConstruct {
            line,
            scope: self.scope_desc(),
            statement: statement.to_string(),
        }
    }

    /// Allocate an entity in the current scope: parent link, pending
    /// pre-documentation, and doc attachment all wired up.
    fn create(&mut self, mut entity: Entity, line: usize) -> EntityId {
        entity.line = line;
        entity.doc = mem::take(&mut self.pending_doc);
        let scope = self.current();
        entity.parent = Some(scope.entity.unwrap_or(scope.owner));
        let id = self.arena.alloc(entity);
        self.last_targets = vec![id];
        id
    }

    fn unit_mut(&mut self, id: EntityId) -> &mut crate::model::entity::CodeUnit {
        self.arena
            .get_mut(id)
            .unit_mut()
            .expect("scope entity is a code unit")
    }

    fn handle(&mut self, stmt: Statement) -> Result<(), ParseError> {
        match stmt {
            Statement::Doc { text, .. } => {
                if text.is_empty() {
                    self.last_targets.clear();
                } else if self.last_targets.is_empty() {
                    let owner = self.current().owner;
                    self.arena.get_mut(owner).doc.push(text);
                } else {
                    for id in self.last_targets.clone() {
                        self.arena.get_mut(id).doc.push(text.clone());
                    }
                }
                Ok(())
            }
            Statement::Predoc { text, .. } => {
                if text.is_empty() {
                    self.pending_doc.clear();
                } else {
                    self.pending_doc.push(text);
                }
                Ok(())
            }
            Statement::Code { text, line } => self.handle_code(&text, line),
        }
    }

    fn handle_code(&mut self, raw: &str, line: usize) -> Result<(), ParseError> {
        let (masked, strings) = mask_strings(raw.trim());
        let stmt = masked.trim();
        let lower = stmt.to_ascii_lowercase();
        let tag = self.current().tag;

        if lower == "contains" {
            return self.handle_contains(raw, line);
        }
        if let Ok(perm) = lower.parse::<Permission>() {
            self.current_mut().ambient = perm;
            if let Some(id) = self.current().entity {
                if let EntityKind::Module(m) = &mut self.arena.get_mut(id).kind {
                    m.default_permission = perm;
                }
            }
            return Ok(());
        }
        if lower == "sequence" {
            if let (Tag::DerivedType, Some(id)) = (tag, self.current().entity) {
                if let EntityKind::DerivedType(dt) = &mut self.arena.get_mut(id).kind {
                    dt.sequence = true;
                }
            }
            return Ok(());
        }
        if patterns::FORMAT_RE.is_match(stmt) || patterns::is_select_guard(stmt) {
            return Ok(());
        }
        if self.current().block_level == 0 {
            if let Some(caps) = patterns::ATTRIB_RE.captures(stmt) {
                return self.record_attribs(&caps, &strings, raw, line);
            }
        }
        if let Some(caps) = patterns::END_RE.captures(stmt) {
            return self.handle_end(&caps, raw, line);
        }
        if let Some(caps) = patterns::MODPROC_RE.captures(stmt) {
            if caps.name("module").is_some() || tag == Tag::Interface {
                return self.handle_modproc(&caps, raw, line);
            }
        }
        if patterns::BLOCK_DATA_RE.is_match(stmt)
            || patterns::BLOCK_RE.is_match(stmt)
            || patterns::ENUM_RE.is_match(stmt)
        {
            self.current_mut().block_level += 1;
            return Ok(());
        }
        if patterns::ASSOCIATE_RE.is_match(stmt) {
            // Association targets are still calls worth recording
            if let (true, Some(id)) = (self.current().is_unit(), self.current().entity) {
                self.collect_calls(stmt, id);
            }
            self.current_mut().block_level += 1;
            return Ok(());
        }
        if let Some(caps) = patterns::MODULE_RE.captures(stmt) {
            return self.open_module(&caps, raw, line);
        }
        if let Some(caps) = patterns::SUBMODULE_RE.captures(stmt) {
            return self.open_submodule(&caps, raw, line);
        }
        if let Some(caps) = patterns::PROGRAM_RE.captures(stmt) {
            return self.open_program(&caps, raw, line);
        }
        if let Some(caps) = patterns::SUBROUTINE_RE.captures(stmt) {
            return self.open_procedure(ProcKind::Subroutine, &caps, &strings, raw, line);
        }
        if let Some(caps) = patterns::FUNCTION_RE.captures(stmt) {
            return self.open_procedure(ProcKind::Function, &caps, &strings, raw, line);
        }
        if self.current().block_level == 0 {
            if let Some(caps) = patterns::TYPE_RE.captures(stmt) {
                return self.open_type(&caps, raw, line);
            }
            if let Some(caps) = patterns::INTERFACE_RE.captures(stmt) {
                return self.open_interface(&caps, raw, line);
            }
        }
        if self.current().in_contains && tag == Tag::DerivedType {
            if let Some(caps) = patterns::BOUNDPROC_RE.captures(stmt) {
                return self.handle_boundproc(&caps, line);
            }
            if let Some(caps) = patterns::FINAL_RE.captures(stmt) {
                return self.handle_final(&caps, line);
            }
        }
        if self.current().block_level == 0 && patterns::VARIABLE_RE.is_match(stmt) {
            return self.handle_variables(stmt, &strings, raw, line);
        }
        if let Some(caps) = patterns::USE_RE.captures(stmt) {
            return self.handle_use(&caps, raw, line);
        }
        if patterns::ARITH_GOTO_RE.is_match(stmt) {
            // Arithmetic GOTOs look like function references; skip them
            return Ok(());
        }
        let has_subcall = patterns::SUBCALL_RE.is_match(stmt);
        if has_subcall || patterns::CALL_START_RE.is_match(stmt) {
            if let (true, Some(id)) = (self.current().is_unit(), self.current().entity) {
                self.collect_calls(stmt, id);
            } else if has_subcall {
                return Err(self.unexpected(line, raw));
            }
        }
        Ok(())
    }

    fn handle_contains(&mut self, raw: &str, line: usize) -> Result<(), ParseError> {
        let (tag, seen) = {
            let scope = self.current();
            (scope.tag, scope.in_contains)
        };
        match tag {
            Tag::File | Tag::Interface => Err(self.unexpected(line, raw)),
            _ if seen => Err(ParseError::DuplicateContains {
                line,
                scope: self.scope_desc(),
            }),
            _ => {
                let scope = self.current_mut();
                scope.in_contains = true;
                if tag == Tag::DerivedType {
                    scope.ambient = Permission::Public;
                }
                Ok(())
            }
        }
    }

    fn record_attribs(
        &mut self,
        caps: &regex::Captures<'_>,
        strings: &[String],
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        let attr: String = caps["attr"]
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if attr == "data" {
            return Ok(());
        }
        match self.current().tag {
            Tag::File | Tag::Interface => return Err(self.unexpected(line, raw)),
            _ => {}
        }

        let names_str = caps["names"].trim().to_string();
        let mut names = Vec::new();
        if attr == "parameter" {
            let inner = names_str
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .unwrap_or(&names_str);
            for item in paren_split(inner, ',') {
                let parts = paren_split(&item, '=');
                let name = fold_name(parts[0].trim());
                if name.is_empty() {
                    continue;
                }
                if parts.len() > 1 {
                    let value = parts[1..].join("=").trim().to_string();
                    self.current_mut()
                        .params
                        .insert(name.clone(), unmask_strings(&value, strings));
                }
                names.push(name);
            }
        } else {
            for item in paren_split(&names_str, ',') {
                let item = item.trim().to_ascii_lowercase();
                if !item.is_empty() {
                    names.push(item);
                }
            }
        }
        self.current_mut().attribs.push(AttribList { attr, names });
        Ok(())
    }

    fn handle_end(
        &mut self,
        caps: &regex::Captures<'_>,
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        let kind: Option<String> = caps.name("kind").map(|m| {
            m.as_str()
                .to_ascii_lowercase()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect()
        });

        if matches!(
            kind.as_deref(),
            Some("block" | "associate" | "enum" | "blockdata")
        ) {
            let scope = self.current_mut();
            scope.block_level = scope.block_level.saturating_sub(1);
            return Ok(());
        }
        if self.current().block_level > 0 {
            // A bare END inside a block construct is not ours to close
            return Ok(());
        }
        if self.scopes.len() == 1 {
            return Err(ParseError::UnbalancedEnd { line });
        }

        let scope = self.current();
        let accepted: &[&str] = match scope.tag {
            Tag::Module => &["module"],
            Tag::Submodule => &["submodule"],
            Tag::Program => &["program"],
            Tag::DerivedType => &["type"],
            Tag::Interface => &["interface"],
            Tag::Procedure => match scope.entity.map(|id| &self.arena.get(id).kind) {
                Some(EntityKind::Procedure(p)) if p.proc_kind == ProcKind::Subroutine => {
                    &["subroutine", "procedure"]
                }
                Some(EntityKind::Procedure(p)) if p.proc_kind == ProcKind::Function => {
                    &["function", "procedure"]
                }
                _ => &["procedure", "subroutine", "function"],
            },
            Tag::File => &[],
        };
        if let Some(kind) = kind.as_deref() {
            if !accepted.contains(&kind) {
                return Err(ParseError::MismatchedEnd {
                    line,
                    expected: self.scope_desc(),
                    statement: raw.to_string(),
                });
            }
            if let (Some(m), Some(id)) = (caps.name("name"), scope.entity) {
                if fold_name(m.as_str()) != fold_name(&self.arena.get(id).name) {
                    return Err(ParseError::MismatchedEnd {
                        line,
                        expected: self.scope_desc(),
                        statement: raw.to_string(),
                    });
                }
            }
        }

        self.close_scope();
        self.last_targets.clear();
        Ok(())
    }

    fn open_module(
        &mut self,
        caps: &regex::Captures<'_>,
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        if self.current().tag != Tag::File {
            return Err(self.unexpected(line, raw));
        }
        let name = caps.name("name").map(|m| m.as_str()).unwrap_or("");
        let id = self.create(
            Entity::new(name, Permission::Public, EntityKind::Module(Module::default())),
            line,
        );
        if let EntityKind::SourceFile(sf) = &mut self.arena.get_mut(self.root).kind {
            sf.modules.push(id);
        }
        self.scopes
            .push(Scope::new(Tag::Module, Some(id), id, Permission::Public));
        Ok(())
    }

    fn open_submodule(
        &mut self,
        caps: &regex::Captures<'_>,
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        if self.current().tag != Tag::File {
            return Err(self.unexpected(line, raw));
        }
        let sub = Submodule {
            unit: Default::default(),
            ancestor_module: Ref::unresolved(&caps["ancestor"]),
            parent_submodule: caps.name("parent").map(|m| Ref::unresolved(m.as_str())),
        };
        let id = self.create(
            Entity::new(
                &caps["name"],
                Permission::Public,
                EntityKind::Submodule(sub),
            ),
            line,
        );
        if let EntityKind::SourceFile(sf) = &mut self.arena.get_mut(self.root).kind {
            sf.submodules.push(id);
        }
        // Everything in a submodule is private to it
        self.scopes
            .push(Scope::new(Tag::Submodule, Some(id), id, Permission::Private));
        Ok(())
    }

    fn open_program(
        &mut self,
        caps: &regex::Captures<'_>,
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        if self.current().tag != Tag::File {
            return Err(self.unexpected(line, raw));
        }
        let name = caps.name("name").map(|m| m.as_str()).unwrap_or("");
        let id = self.create(
            Entity::new(name, Permission::Public, EntityKind::Program(Default::default())),
            line,
        );
        if let EntityKind::SourceFile(sf) = &mut self.arena.get_mut(self.root).kind {
            sf.programs.push(id);
            if sf.programs.len() > 1 {
                warn!("multiple PROGRAM units in one source file");
            }
        }
        self.scopes
            .push(Scope::new(Tag::Program, Some(id), id, Permission::Public));
        Ok(())
    }

    fn open_procedure(
        &mut self,
        proc_kind: ProcKind,
        caps: &regex::Captures<'_>,
        strings: &[String],
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        let scope = self.current();
        match scope.tag {
            Tag::File | Tag::Interface => {}
            Tag::Module | Tag::Submodule | Tag::Program | Tag::Procedure
                if scope.in_contains => {}
            _ => return Err(self.unexpected(line, raw)),
        }

        let (attribs, leftover) =
            procedure_attributes(caps.name("attributes").map(|m| m.as_str()));
        let mut proc = Procedure::new(proc_kind);
        proc.is_module_proc = attribs.iter().any(|a| a == "module");
        proc.attribs = attribs;
        proc.args = parse_args(caps.name("arguments").map(|m| m.as_str()));

        if proc_kind == ProcKind::Function {
            let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
            proc.result_name = patterns::RESULT_RE
                .captures(rest)
                .map(|c| SmolStr::new(&c["result"]));
            proc.bindc = patterns::BIND_RE
                .captures(rest)
                .map(|c| unmask_strings(&c["bind"], strings));
            if !leftover.is_empty() {
                proc.result_type = parse_type(&format!("{leftover} ::"), strings)
                    .map(|spec| spec.parsed);
            }
        } else {
            proc.bindc = caps
                .name("bind")
                .map(|m| unmask_strings(m.as_str(), strings));
        }

        let ambient = self.current().ambient;
        let id = self.create(
            Entity::new(&caps["name"], ambient, EntityKind::Procedure(proc)),
            line,
        );

        // Attach to the enclosing collection
        match self.current().tag {
            Tag::File => {
                if let EntityKind::SourceFile(sf) = &mut self.arena.get_mut(self.root).kind {
                    sf.procedures.push(id);
                }
            }
            Tag::Interface => match self.current().entity {
                Some(iface) => {
                    if let EntityKind::Interface(i) = &mut self.arena.get_mut(iface).kind {
                        i.procs.push(id);
                    }
                }
                None => self.current_mut().iface_procs.push(id),
            },
            _ => {
                let owner = self.current().entity.expect("unit scope has an entity");
                let unit = self.unit_mut(owner);
                match proc_kind {
                    ProcKind::Function => unit.functions.push(id),
                    _ => unit.subroutines.push(id),
                }
            }
        }

        self.scopes
            .push(Scope::new(Tag::Procedure, Some(id), id, Permission::Public));
        Ok(())
    }

    fn handle_modproc(
        &mut self,
        caps: &regex::Captures<'_>,
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        match self.current().tag {
            Tag::Interface => {
                let entity = self.current().entity;
                let Some(iface) = entity else {
                    warn!("module procedure list in an unnamed interface; ignored");
                    return Ok(());
                };
                if let EntityKind::Interface(i) = &mut self.arena.get_mut(iface).kind {
                    for name in caps["names"].split(',') {
                        let name = name.trim();
                        if !name.is_empty() {
                            i.module_procs.push(Ref::unresolved(name));
                        }
                    }
                }
                self.last_targets.clear();
                Ok(())
            }
            Tag::Module | Tag::Submodule if caps.name("module").is_some() => {
                // Implementation of a separate module procedure; its
                // signature lives on the interface it implements.
                let name = caps["names"]
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let mut proc = Procedure::new(ProcKind::ModProcedure);
                proc.is_module_proc = true;
                let ambient = self.current().ambient;
                let id = self.create(
                    Entity::new(&name, ambient, EntityKind::Procedure(proc)),
                    line,
                );
                let owner = self.current().entity.expect("unit scope has an entity");
                self.unit_mut(owner).mod_procedures.push(id);
                self.scopes
                    .push(Scope::new(Tag::Procedure, Some(id), id, Permission::Public));
                Ok(())
            }
            _ => Err(self.unexpected(line, raw)),
        }
    }

    fn open_type(
        &mut self,
        caps: &regex::Captures<'_>,
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        if !self.current().is_unit() {
            return Err(self.unexpected(line, raw));
        }

        let mut dt = DerivedType::default();
        let mut permission = self.current().ambient;
        if let Some(attrs) = caps.name("attributes") {
            for attrib in paren_split(attrs.as_str(), ',') {
                let attrib = attrib.trim();
                if attrib.is_empty() {
                    continue;
                }
                if let Some(ext) = patterns::EXTENDS_RE.captures(attrib) {
                    dt.extends = Some(Ref::unresolved(&ext["base"]));
                } else if attrib.eq_ignore_ascii_case("abstract") {
                    dt.is_abstract = true;
                } else if let Ok(perm) = attrib.to_ascii_lowercase().parse::<Permission>() {
                    permission = perm;
                }
            }
        }
        if let Some(params) = caps.name("parameters") {
            dt.parameters = params
                .as_str()
                .trim_start_matches('(')
                .trim_end_matches(')')
                .split(',')
                .map(|p| SmolStr::new(p.trim()))
                .filter(|p| !p.is_empty())
                .collect();
        }

        let id = self.create(
            Entity::new(&caps["name"], permission, EntityKind::DerivedType(dt)),
            line,
        );
        let owner = self.current().entity.expect("unit scope has an entity");
        self.unit_mut(owner).types.push(id);
        // Components default to public even in a private module
        self.scopes
            .push(Scope::new(Tag::DerivedType, Some(id), id, Permission::Public));
        Ok(())
    }

    fn open_interface(
        &mut self,
        caps: &regex::Captures<'_>,
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        if !self.current().is_unit() {
            return Err(self.unexpected(line, raw));
        }
        let is_abstract = caps.name("abstract").is_some();
        let name = caps.name("name").map(|m| m.as_str().trim().to_string());

        let owner = self.current().entity.expect("unit scope has an entity");
        let ambient = self.current().ambient;

        if let (false, Some(name)) = (is_abstract, name) {
            let iface = Interface {
                is_generic: true,
                ..Default::default()
            };
            let id = self.create(
                Entity::new(name, ambient, EntityKind::Interface(iface)),
                line,
            );
            self.unit_mut(owner).interfaces.push(id);
            self.scopes
                .push(Scope::new(Tag::Interface, Some(id), owner, ambient));
        } else {
            let mut scope = Scope::new(Tag::Interface, None, owner, ambient);
            scope.is_abstract = is_abstract;
            self.scopes.push(scope);
            self.last_targets.clear();
        }
        Ok(())
    }

    fn handle_boundproc(
        &mut self,
        caps: &regex::Captures<'_>,
        line: usize,
    ) -> Result<(), ParseError> {
        let is_generic = caps["generic"].eq_ignore_ascii_case("generic");
        let proto = caps.name("prototype").map(|m| {
            m.as_str()
                .trim_start_matches('(')
                .trim_end_matches(')')
                .trim()
                .to_string()
        });

        let mut attribs: Vec<SmolStr> = Vec::new();
        let mut deferred = false;
        let mut permission = self.current().ambient;
        if let Some(attrs) = caps.name("attributes") {
            for attrib in paren_split(attrs.as_str(), ',') {
                let folded = attrib.trim().to_ascii_lowercase();
                match folded.as_str() {
                    "" => {}
                    "deferred" => deferred = true,
                    "public" => permission = Permission::Public,
                    "private" => permission = Permission::Private,
                    _ => attribs.push(SmolStr::new(attrib.trim())),
                }
            }
        }

        let names_str = caps["names"].trim().to_string();
        let items: Vec<String> = if is_generic {
            vec![names_str]
        } else {
            paren_split(&names_str, ',')
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let tid = self.current().entity.expect("type scope has an entity");
        let mut created = Vec::new();
        for item in items {
            let (name, bindings) = match item.split_once("=>") {
                Some((lhs, rhs)) => (
                    lhs.trim().to_string(),
                    paren_split(rhs, ',')
                        .into_iter()
                        .map(|b| Ref::unresolved(b.trim()))
                        .collect(),
                ),
                None => (item.trim().to_string(), vec![Ref::unresolved(item.trim())]),
            };
            let bp = BoundProcedure {
                is_generic,
                deferred,
                attribs: attribs.clone(),
                proto: proto.as_deref().map(Ref::unresolved),
                bindings,
            };
            let id = self.create(
                Entity::new(name, permission, EntityKind::BoundProcedure(bp)),
                line,
            );
            if let EntityKind::DerivedType(dt) = &mut self.arena.get_mut(tid).kind {
                dt.bound_procs.push(id);
            }
            created.push(id);
        }
        self.last_targets = created;
        Ok(())
    }

    fn handle_final(&mut self, caps: &regex::Captures<'_>, line: usize) -> Result<(), ParseError> {
        let tid = self.current().entity.expect("type scope has an entity");
        let mut created = Vec::new();
        for name in caps["names"].split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let id = self.create(
                Entity::new(
                    name,
                    Permission::Public,
                    EntityKind::FinalProc(FinalProc {
                        procedure: Ref::unresolved(name),
                    }),
                ),
                line,
            );
            if let EntityKind::DerivedType(dt) = &mut self.arena.get_mut(tid).kind {
                dt.final_procs.push(id);
            }
            created.push(id);
        }
        self.last_targets = created;
        Ok(())
    }

    fn handle_variables(
        &mut self,
        stmt: &str,
        strings: &[String],
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        let scope = self.current();
        if !scope.is_unit() && scope.tag != Tag::DerivedType {
            return Err(self.unexpected(line, raw));
        }
        let Some((vars, perms)) = parse_variables(stmt, strings, scope.ambient) else {
            warn!("could not parse declaration: {raw:?}");
            return Ok(());
        };

        let owner = scope.entity.expect("declaring scope has an entity");
        let doc = mem::take(&mut self.pending_doc);
        let mut created = Vec::new();
        for ((name, var), perm) in vars.into_iter().zip(perms) {
            let mut entity = Entity::new(name, perm, EntityKind::Variable(var));
            entity.parent = Some(owner);
            entity.line = line;
            entity.doc = doc.clone();
            let id = self.arena.alloc(entity);
            let parent = self.arena.get_mut(owner);
            if let EntityKind::DerivedType(dt) = &mut parent.kind {
                dt.variables.push(id);
            } else if let Some(unit) = parent.unit_mut() {
                unit.variables.push(id);
            }
            created.push(id);
        }
        self.last_targets = created;
        Ok(())
    }

    fn handle_use(
        &mut self,
        caps: &regex::Captures<'_>,
        raw: &str,
        line: usize,
    ) -> Result<(), ParseError> {
        if !self.current().is_unit() {
            return Err(self.unexpected(line, raw));
        }
        let use_ = parse_use(&caps["name"], caps.name("rest").map(|m| m.as_str()).unwrap_or(""));
        let owner = self.current().entity.expect("unit scope has an entity");
        self.unit_mut(owner).uses.push(use_);
        self.last_targets.clear();
        Ok(())
    }

    fn collect_calls(&mut self, stmt: &str, eid: EntityId) {
        let mut names: Vec<String> = Vec::new();
        if let Some(caps) = patterns::SUBCALL_RE.captures(stmt) {
            let chain: String = caps["chain"]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .replace("()", "");
            if let Some(last) = chain.rsplit('%').next() {
                names.push(last.to_ascii_lowercase());
            }
        }
        for caps in patterns::CALL_START_RE.captures_iter(stmt) {
            names.push(caps["name"].to_ascii_lowercase());
        }

        let Some(unit) = self.arena.get_mut(eid).unit_mut() else {
            return;
        };
        for name in names {
            if name.is_empty() || is_intrinsic(&name) {
                continue;
            }
            let seen = unit
                .calls
                .iter()
                .any(|r| matches!(r.pending_name(), Some(n) if fold_name(n) == name));
            if !seen {
                unit.calls.push(Ref::unresolved(name));
            }
        }
    }

    // -- scope finalization ------------------------------------------------

    fn close_scope(&mut self) {
        let Some(mut scope) = self.scopes.pop() else {
            return;
        };
        match scope.tag {
            Tag::Module | Tag::Submodule | Tag::Program => {
                self.apply_attribs(&scope);
                self.wrap_leftover_interfaces(&mut scope);
            }
            Tag::Procedure => {
                self.apply_attribs(&scope);
                self.finalize_function(&scope);
                self.claim_arguments(&mut scope);
                self.wrap_leftover_interfaces(&mut scope);
            }
            Tag::DerivedType => self.finalize_type(&scope),
            Tag::Interface => self.finalize_interface(scope),
            Tag::File => {}
        }
    }

    /// Apply recorded attribute statements to the named children, mirroring
    /// how standalone `public ::`, `dimension ::`, `intent(...) ::` and
    /// friends modify previously declared entities.
    fn apply_attribs(&mut self, scope: &Scope) {
        let Some(eid) = scope.entity else { return };
        let children = self.named_children(eid);

        let mut externals: Vec<EntityId> = Vec::new();
        for list in &scope.attribs {
            for raw_name in &list.names {
                let (name, dims) = match raw_name.find('(') {
                    Some(i) => (&raw_name[..i], Some(raw_name[i..].to_string())),
                    None => (raw_name.as_str(), None),
                };
                let folded = fold_name(name.trim());
                let target = children
                    .iter()
                    .copied()
                    .find(|&c| fold_name(&self.arena.get(c).name) == folded);
                match target {
                    Some(id) => {
                        self.apply_one_attrib(id, &list.attr, dims, &folded, scope);
                        if list.attr == "external" {
                            externals.push(id);
                        }
                    }
                    None if list.attr == "public" => {
                        if let Some(unit) = self.arena.get_mut(eid).unit_mut() {
                            unit.extra_public.push(SmolStr::new(&folded));
                        }
                    }
                    None => {}
                }
            }
        }

        // External declarations are interface facts, not variables
        if !externals.is_empty() {
            if let Some(unit) = self.arena.get_mut(eid).unit_mut() {
                unit.variables.retain(|v| !externals.contains(v));
            }
        }
    }

    fn apply_one_attrib(
        &mut self,
        id: EntityId,
        attr: &str,
        dims: Option<String>,
        folded: &str,
        scope: &Scope,
    ) {
        if let Ok(perm) = attr.parse::<Permission>() {
            self.arena.get_mut(id).permission = perm;
            return;
        }
        match &mut self.arena.get_mut(id).kind {
            EntityKind::Variable(var) => {
                if let Some(inner) = attr
                    .strip_prefix("intent(")
                    .and_then(|s| s.strip_suffix(')'))
                {
                    var.intent = Some(SmolStr::new(inner));
                } else if attr == "optional" {
                    var.optional = true;
                } else if attr == "parameter" {
                    var.parameter = true;
                    var.initial = scope.params.get(folded).cloned();
                } else if attr == "pointer" {
                    var.pointer = true;
                    if dims.is_some() {
                        var.dimension = dims;
                    }
                } else if attr == "dimension" {
                    var.dimension = dims;
                } else if attr == "allocatable" {
                    var.attribs.push("allocatable".into());
                    if dims.is_some() {
                        var.dimension = dims;
                    }
                } else {
                    var.attribs.push(SmolStr::new(attr));
                }
            }
            EntityKind::Procedure(proc) => {
                if let Some(inner) = attr
                    .strip_prefix("bind(")
                    .and_then(|s| s.strip_suffix(')'))
                {
                    proc.bindc = Some(inner.to_string());
                } else {
                    proc.attribs.push(SmolStr::new(attr));
                }
            }
            _ => {}
        }
    }

    /// Ids of every named child an attribute statement could refer to.
    fn named_children(&self, eid: EntityId) -> Vec<EntityId> {
        let entity = self.arena.get(eid);
        match &entity.kind {
            EntityKind::DerivedType(dt) => dt
                .variables
                .iter()
                .chain(&dt.bound_procs)
                .copied()
                .collect(),
            _ => match entity.unit() {
                Some(unit) => unit
                    .procedures()
                    .chain(unit.types.iter().copied())
                    .chain(unit.interfaces.iter().copied())
                    .chain(unit.abs_interfaces.iter().copied())
                    .chain(unit.variables.iter().copied())
                    .collect(),
                None => Vec::new(),
            },
        }
    }

    /// Resolve a function's result variable: an inline type in the prefix
    /// wins, then a local declaration of the result name, then implicit
    /// typing.
    fn finalize_function(&mut self, scope: &Scope) {
        let Some(pid) = scope.entity else { return };
        let (result_name, result_type, fname) = match &self.arena.get(pid).kind {
            EntityKind::Procedure(p) if p.proc_kind == ProcKind::Function => {
                (p.result_name.clone(), p.result_type.clone(), self.arena.get(pid).name.clone())
            }
            _ => return,
        };
        let target = result_name.unwrap_or(fname);
        let folded = fold_name(&target);

        let retvar = if let Some(ty) = result_type {
            let mut var = Entity::new(
                target,
                Permission::Public,
                EntityKind::Variable(Variable::new(ty)),
            );
            var.parent = Some(pid);
            Some(self.arena.alloc(var))
        } else {
            let locals: Vec<EntityId> = match self.arena.get(pid).unit() {
                Some(unit) => unit.variables.clone(),
                None => Vec::new(),
            };
            match locals
                .iter()
                .position(|&v| fold_name(&self.arena.get(v).name) == folded)
            {
                Some(pos) => {
                    let id = locals[pos];
                    if let EntityKind::Procedure(p) = &mut self.arena.get_mut(pid).kind {
                        p.unit.variables.remove(pos);
                    }
                    Some(id)
                }
                None => {
                    let mut var = Entity::new(
                        target.clone(),
                        Permission::Public,
                        EntityKind::Variable(Variable::new(implicit_type(&target))),
                    );
                    var.parent = Some(pid);
                    Some(self.arena.alloc(var))
                }
            }
        };

        if let EntityKind::Procedure(p) = &mut self.arena.get_mut(pid).kind {
            p.retvar = retvar;
        }
    }

    /// Claim each dummy argument: from the locally declared variables
    /// first, then from anonymous-interface procedures, and as a last
    /// resort synthesize an implicitly typed variable.
    fn claim_arguments(&mut self, scope: &mut Scope) {
        let Some(pid) = scope.entity else { return };
        let (slots, mut variables) = match &self.arena.get(pid).kind {
            EntityKind::Procedure(p) => (p.args.clone(), p.unit.variables.clone()),
            _ => return,
        };
        let mut iface = mem::take(&mut scope.iface_procs);

        let mut new_slots = Vec::with_capacity(slots.len());
        for slot in slots {
            let name = match slot {
                ArgSlot::Entity(id) => {
                    new_slots.push(ArgSlot::Entity(id));
                    continue;
                }
                ArgSlot::Name(name) => name,
            };
            let folded = fold_name(&name);
            if let Some(pos) = variables
                .iter()
                .position(|&v| fold_name(&self.arena.get(v).name) == folded)
            {
                new_slots.push(ArgSlot::Entity(variables.remove(pos)));
            } else if let Some(pos) = iface
                .iter()
                .position(|&p| fold_name(&self.arena.get(p).name) == folded)
            {
                let id = iface.remove(pos);
                self.arena.get_mut(id).parent = Some(pid);
                new_slots.push(ArgSlot::Entity(id));
            } else {
                let mut var = Entity::new(
                    name.clone(),
                    Permission::Public,
                    EntityKind::Variable(Variable::new(implicit_type(&name))),
                );
                var.parent = Some(pid);
                new_slots.push(ArgSlot::Entity(self.arena.alloc(var)));
            }
        }

        if let EntityKind::Procedure(p) = &mut self.arena.get_mut(pid).kind {
            p.args = new_slots;
            p.unit.variables = variables;
        }
        scope.iface_procs = iface;
    }

    /// Anonymous-interface procedures not claimed as arguments become
    /// non-generic interface declarations of the enclosing unit.
    fn wrap_leftover_interfaces(&mut self, scope: &mut Scope) {
        let Some(eid) = scope.entity else { return };
        for pid in mem::take(&mut scope.iface_procs) {
            let proc = self.arena.get(pid);
            let mut iface = Entity::new(
                proc.name.clone(),
                proc.permission,
                EntityKind::Interface(Interface {
                    procs: vec![pid],
                    ..Default::default()
                }),
            );
            iface.line = proc.line;
            iface.parent = Some(eid);
            let iid = self.arena.alloc(iface);
            if let Some(unit) = self.arena.get_mut(eid).unit_mut() {
                unit.interfaces.push(iid);
            }
        }
    }

    /// Type parameters declared as components move out of the component
    /// list; the parameter names on the type keep them discoverable.
    fn finalize_type(&mut self, scope: &Scope) {
        let Some(tid) = scope.entity else { return };
        let (params, variables) = match &self.arena.get(tid).kind {
            EntityKind::DerivedType(dt) => (dt.parameters.clone(), dt.variables.clone()),
            _ => return,
        };
        if params.is_empty() {
            return;
        }
        let folded: Vec<String> = params.iter().map(|p| fold_name(p)).collect();
        let kept: Vec<EntityId> = variables
            .into_iter()
            .filter(|&v| !folded.contains(&fold_name(&self.arena.get(v).name)))
            .collect();
        if let EntityKind::DerivedType(dt) = &mut self.arena.get_mut(tid).kind {
            dt.variables = kept;
        }
    }

    /// Dissolve a closing interface block: abstract interfaces hand their
    /// procedures to the enclosing unit as abstract-interface entries,
    /// anonymous ones queue them for argument claiming.
    fn finalize_interface(&mut self, scope: Scope) {
        if scope.entity.is_some() {
            return; // generic: procedures already attached
        }
        if scope.is_abstract {
            if let Some(unit) = self.arena.get_mut(scope.owner).unit_mut() {
                unit.abs_interfaces.extend(scope.iface_procs);
            }
        } else if let Some(parent) = self.scopes.last_mut() {
            parent.iface_procs.extend(scope.iface_procs);
        }
    }
}

/// Split a procedure prefix into its attribute keywords and whatever is
/// left over (for functions, the inline result type).
fn procedure_attributes(text: Option<&str>) -> (Vec<SmolStr>, String) {
    let Some(text) = text else {
        return (Vec::new(), String::new());
    };
    let mut remaining = text.to_ascii_lowercase();
    let mut attribs = Vec::new();
    for keyword in ["impure", "pure", "elemental", "non_recursive", "recursive", "module"] {
        if let Some(pos) = remaining.find(keyword) {
            attribs.push(SmolStr::new(keyword));
            remaining.replace_range(pos..pos + keyword.len(), "");
        }
    }
    (attribs, remaining.trim().to_string())
}

fn parse_args(text: Option<&str>) -> Vec<ArgSlot> {
    let Some(text) = text else { return Vec::new() };
    text.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| ArgSlot::Name(SmolStr::new(a)))
        .collect()
}

/// Parse the tail of a `use` statement: an `only:` list, or rename pairs.
fn parse_use(module: &str, rest: &str) -> Use {
    let mut parsed = Use {
        module: Ref::unresolved(module),
        only: None,
        renames: Vec::new(),
    };
    let Some(tail) = rest.trim().strip_prefix(',') else {
        return parsed;
    };
    let tail = tail.trim();

    let only_tail = tail
        .get(..4)
        .filter(|head| head.eq_ignore_ascii_case("only"))
        .and_then(|_| tail[4..].trim_start().strip_prefix(':'));

    let items = |list: &str| -> Vec<UseItem> {
        paren_split(list, ',')
            .into_iter()
            .filter_map(|item| {
                let item = item.trim().to_string();
                if item.is_empty() {
                    return None;
                }
                Some(match item.split_once("=>") {
                    Some((local, remote)) => UseItem::renamed(local.trim(), remote.trim()),
                    None => UseItem::plain(item.as_str()),
                })
            })
            .collect()
    };

    match only_tail {
        Some(list) => parsed.only = Some(items(list)),
        None => parsed.renames = items(tail),
    }
    parsed
}
