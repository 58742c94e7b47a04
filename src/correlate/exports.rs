//! Per-module export tables.
//!
//! Once a module has been resolved, its export table records every name a
//! `use` of it can import: the module's own public and protected children,
//! imported names the module explicitly re-exports with a `public ::`
//! statement, and, when the module's default visibility is public, every
//! use-associated name as well. Tables are [`IndexMap`]s so iteration order
//! follows declaration order, and the first binding of a name wins.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::base::fold_name;
use crate::model::{EntityArena, EntityId, EntityKind, Ref};

/// Importable names of one module, folded name to resolution target.
pub type ExportTable = IndexMap<SmolStr, Ref>;

/// Names visible inside one scope during resolution.
pub type SymbolTable = IndexMap<SmolStr, Ref>;

/// Build the export table of a resolved module.
///
/// `visible` is the module's own symbol table, locals and imports both;
/// re-exports listed in `extra_public` are looked up through it, so a
/// name imported from a dependency and re-exported resolves transitively
/// to its original declaration. `imports` holds the use-associated names
/// alone, already filtered by only lists and renames; under the module's
/// default public visibility all of them re-export, so a chain of plain
/// `use` statements carries symbols any number of modules deep.
pub fn module_exports(
    arena: &EntityArena,
    module: EntityId,
    visible: &SymbolTable,
    imports: &SymbolTable,
) -> ExportTable {
    let mut table = ExportTable::new();
    let Some(unit) = arena.get(module).unit() else {
        return table;
    };

    let children = unit
        .procedures()
        .chain(unit.types.iter().copied())
        .chain(unit.interfaces.iter().copied())
        .chain(unit.abs_interfaces.iter().copied())
        .chain(unit.variables.iter().copied());
    for child in children {
        let entity = arena.get(child);
        if entity.permission.is_exported() {
            table
                .entry(SmolStr::new(fold_name(&entity.name)))
                .or_insert(Ref::Resolved(child));
        }
    }

    for name in &unit.extra_public {
        if let Some(target) = visible.get(name.as_str()) {
            table.entry(name.clone()).or_insert_with(|| target.clone());
        }
    }

    let default_public = match &arena.get(module).kind {
        EntityKind::Module(m) => m.default_permission.is_exported(),
        _ => false,
    };
    if default_public {
        for (name, target) in imports {
            table.entry(name.clone()).or_insert_with(|| target.clone());
        }
    }
    table
}
