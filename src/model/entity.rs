//! Entity kinds for the parsed model.
//!
//! The original dynamic class hierarchy (module/program/procedure/type/...)
//! is a closed set, so it is collapsed into one [`Entity`] struct carrying
//! the fields common to every kind plus an [`EntityKind`] sum for the rest.
//! Ownership is strictly a tree: children are `EntityId` vectors on their
//! parent, and `parent` is a back-pointer only. All other entity-to-entity
//! links are non-owning [`Ref`] cells.

use smol_str::SmolStr;

use crate::base::FileId;

use super::arena::EntityId;
use super::permission::Permission;
use super::refs::{Ref, Use};

/// One node of the entity tree.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: SmolStr,
    pub permission: Permission,
    pub parent: Option<EntityId>,
    /// Raw documentation lines, in source order.
    pub doc: Vec<String>,
    /// First physical line of the defining statement, 1-based.
    pub line: usize,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(name: impl Into<SmolStr>, permission: Permission, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            permission,
            parent: None,
            doc: Vec::new(),
            line: 0,
            kind,
        }
    }

    /// Short human-readable kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            EntityKind::SourceFile(_) => "source file",
            EntityKind::Module(_) => "module",
            EntityKind::Submodule(_) => "submodule",
            EntityKind::Program(_) => "program",
            EntityKind::Procedure(p) => match p.proc_kind {
                ProcKind::Subroutine => "subroutine",
                ProcKind::Function => "function",
                ProcKind::ModProcedure => "module procedure",
            },
            EntityKind::Interface(i) => {
                if i.is_abstract {
                    "abstract interface"
                } else {
                    "interface"
                }
            }
            EntityKind::DerivedType(_) => "type",
            EntityKind::Variable(_) => "variable",
            EntityKind::BoundProcedure(_) => "bound procedure",
            EntityKind::FinalProc(_) => "final procedure",
        }
    }

    /// The nested-declaration container of this entity, for kinds that own
    /// one (modules, submodules, programs, procedures).
    pub fn unit(&self) -> Option<&CodeUnit> {
        match &self.kind {
            EntityKind::Module(m) => Some(&m.unit),
            EntityKind::Submodule(s) => Some(&s.unit),
            EntityKind::Program(u) => Some(u),
            EntityKind::Procedure(p) => Some(&p.unit),
            _ => None,
        }
    }

    pub fn unit_mut(&mut self) -> Option<&mut CodeUnit> {
        match &mut self.kind {
            EntityKind::Module(m) => Some(&mut m.unit),
            EntityKind::Submodule(s) => Some(&mut s.unit),
            EntityKind::Program(u) => Some(u),
            EntityKind::Procedure(p) => Some(&mut p.unit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    SourceFile(SourceFile),
    Module(Module),
    Submodule(Submodule),
    Program(CodeUnit),
    Procedure(Procedure),
    Interface(Interface),
    DerivedType(DerivedType),
    Variable(Variable),
    BoundProcedure(BoundProcedure),
    FinalProc(FinalProc),
}

/// Root of ownership for everything parsed from one file.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub file: Option<FileId>,
    pub modules: Vec<EntityId>,
    pub submodules: Vec<EntityId>,
    pub programs: Vec<EntityId>,
    /// Free-standing procedures at file scope.
    pub procedures: Vec<EntityId>,
}

/// Shared container payload for modules, submodules, programs, procedures.
#[derive(Debug, Clone, Default)]
pub struct CodeUnit {
    pub uses: Vec<Use>,
    /// Called procedure names, deduplicated per scope. Only explicit call
    /// syntax and function references are tracked.
    pub calls: Vec<Ref>,
    pub variables: Vec<EntityId>,
    pub types: Vec<EntityId>,
    pub subroutines: Vec<EntityId>,
    pub functions: Vec<EntityId>,
    /// Generic (named) interfaces.
    pub interfaces: Vec<EntityId>,
    /// Abstract interface entries, one per wrapped procedure.
    pub abs_interfaces: Vec<EntityId>,
    /// `module procedure` implementations (submodules only).
    pub mod_procedures: Vec<EntityId>,
    /// Names marked `public ::` that match no declared child. These are
    /// imported symbols being re-exported; the correlation engine respects
    /// them when building export tables.
    pub extra_public: Vec<SmolStr>,
}

impl CodeUnit {
    /// All procedure-like children, in declaration order.
    pub fn procedures(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.subroutines
            .iter()
            .chain(&self.functions)
            .chain(&self.mod_procedures)
            .copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub unit: CodeUnit,
    /// Ambient visibility of the module body, set by a bare `public` or
    /// `private` statement. Under the public default, use-associated names
    /// re-export through this module's export table.
    pub default_permission: Permission,
    /// Inverse edges: code units whose `use` of this module resolved.
    /// Filled after correlation for the presentation layer.
    pub used_by: Vec<EntityId>,
}

#[derive(Debug, Clone)]
pub struct Submodule {
    pub unit: CodeUnit,
    /// The module this submodule chain extends. Always present.
    pub ancestor_module: Ref,
    /// The direct parent submodule, when declared as `submodule (mod:parent)`.
    pub parent_submodule: Option<Ref>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcKind {
    Subroutine,
    Function,
    /// A `module procedure name` implementation inside a submodule, whose
    /// signature lives on the interface declaration it implements.
    ModProcedure,
}

/// One dummy-argument slot of a procedure: a raw name until scope
/// finalization claims a declared variable (or promotes an interface).
#[derive(Debug, Clone)]
pub enum ArgSlot {
    Name(SmolStr),
    Entity(EntityId),
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub unit: CodeUnit,
    pub proc_kind: ProcKind,
    /// pure / elemental / recursive / impure / non_recursive / module.
    pub attribs: Vec<SmolStr>,
    pub args: Vec<ArgSlot>,
    /// Explicit `result(name)`, functions only.
    pub result_name: Option<SmolStr>,
    /// Inline result type from the function prefix, functions only.
    pub result_type: Option<ParsedType>,
    /// The formal result variable, filled during scope finalization.
    pub retvar: Option<EntityId>,
    /// `bind(c)` label text, when present.
    pub bindc: Option<String>,
    /// Declared with the `module` prefix (separate module procedure).
    pub is_module_proc: bool,
    /// For `ModProcedure` implementations: the interface declaration this
    /// implements, resolved during correlation.
    pub implements: Option<Ref>,
}

impl Procedure {
    pub fn new(proc_kind: ProcKind) -> Self {
        Self {
            unit: CodeUnit::default(),
            proc_kind,
            attribs: Vec::new(),
            args: Vec::new(),
            result_name: None,
            result_type: None,
            retvar: None,
            bindc: None,
            is_module_proc: false,
            implements: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interface {
    /// Named interface aggregating several specific procedures.
    pub is_generic: bool,
    pub is_abstract: bool,
    /// Procedures declared inside the interface block itself.
    pub procs: Vec<EntityId>,
    /// `module procedure` forward references to procedures living elsewhere.
    pub module_procs: Vec<Ref>,
}

#[derive(Debug, Clone, Default)]
pub struct DerivedType {
    pub extends: Option<Ref>,
    pub is_abstract: bool,
    /// Type parameters (kind/len), names only.
    pub parameters: Vec<SmolStr>,
    pub variables: Vec<EntityId>,
    pub bound_procs: Vec<EntityId>,
    pub final_procs: Vec<EntityId>,
    /// Generic interface with the same name as the type, detected during
    /// correlation.
    pub constructor: Option<EntityId>,
    pub sequence: bool,
}

/// Semantic type descriptor of a variable (or function result).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedType {
    /// integer / real / character / complex / logical / type / class /
    /// procedure / double precision / ...
    pub vartype: SmolStr,
    pub kind: Option<String>,
    /// Character length expression.
    pub strlen: Option<String>,
    /// For `type(T)` / `class(T)` / `procedure(P)`: the named prototype.
    pub proto: Option<Ref>,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub var_type: ParsedType,
    /// Attributes not modelled as dedicated flags (target, save, ...).
    pub attribs: Vec<SmolStr>,
    pub intent: Option<SmolStr>,
    pub optional: bool,
    pub parameter: bool,
    pub pointer: bool,
    /// Per-name array spec, e.g. `(:,:)`.
    pub dimension: Option<String>,
    /// Initializer expression, kept as opaque text.
    pub initial: Option<String>,
}

impl Variable {
    pub fn new(var_type: ParsedType) -> Self {
        Self {
            var_type,
            attribs: Vec::new(),
            intent: None,
            optional: false,
            parameter: false,
            pointer: false,
            dimension: None,
            initial: None,
        }
    }
}

/// A type-bound procedure or generic binding.
#[derive(Debug, Clone, Default)]
pub struct BoundProcedure {
    pub is_generic: bool,
    pub deferred: bool,
    /// pass / nopass / non_overridable / ...
    pub attribs: Vec<SmolStr>,
    /// Explicit interface prototype, `procedure(proto) :: name`.
    pub proto: Option<Ref>,
    /// Target procedure name(s). For a generic binding these name other
    /// bound procedures of the same type.
    pub bindings: Vec<Ref>,
}

/// A `final :: proc` binding inside a derived type.
#[derive(Debug, Clone)]
pub struct FinalProc {
    pub procedure: Ref,
}
