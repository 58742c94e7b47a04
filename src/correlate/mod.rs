//! The correlation engine: whole-project name resolution.
//!
//! After every file is parsed, correlation connects the trees: submodules
//! to their ancestor modules, `use` statements to module export tables,
//! calls and prototypes to their declarations, derived types to their
//! parents and constructors. Modules are processed in dependency order so
//! every import reads a completed export table; programs and free
//! procedures follow.

mod exports;
mod intrinsics;
mod order;
mod prune;
mod resolver;

pub use exports::{ExportTable, SymbolTable};
pub use prune::prune;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::base::fold_name;
use crate::error::FortdocError;
use crate::model::{EntityArena, EntityId, EntityKind, Ref};
use crate::settings::ProjectSettings;

use resolver::Correlator;

/// Resolve every cross-entity reference in the project.
///
/// `files` are the source-file roots in the project arena. Fails on a
/// module dependency cycle or a duplicate program name; everything else
/// degrades to unresolved references.
pub fn correlate(
    arena: &mut EntityArena,
    files: &[EntityId],
    settings: &ProjectSettings,
) -> Result<(), FortdocError> {
    let mut modules: FxHashMap<SmolStr, EntityId> = FxHashMap::default();
    let mut submodules: FxHashMap<SmolStr, EntityId> = FxHashMap::default();
    let mut programs: FxHashMap<SmolStr, EntityId> = FxHashMap::default();
    let mut program_ids: Vec<EntityId> = Vec::new();
    let mut free_procs: Vec<EntityId> = Vec::new();

    for &file in files {
        let EntityKind::SourceFile(sf) = &arena.get(file).kind else {
            continue;
        };
        let sf = sf.clone();
        for &id in &sf.modules {
            let name = SmolStr::new(fold_name(&arena.get(id).name));
            if modules.contains_key(&name) {
                warn!(module = %name, "duplicate module definition; keeping the first");
            } else {
                modules.insert(name, id);
            }
        }
        for &id in &sf.submodules {
            let name = SmolStr::new(fold_name(&arena.get(id).name));
            if submodules.contains_key(&name) {
                warn!(submodule = %name, "duplicate submodule definition; keeping the first");
            } else {
                submodules.insert(name, id);
            }
        }
        for &id in &sf.programs {
            let name = SmolStr::new(fold_name(&arena.get(id).name));
            if programs.insert(name.clone(), id).is_some() {
                return Err(FortdocError::DuplicateProgram(name.to_string()));
            }
            program_ids.push(id);
        }
        free_procs.extend(sf.procedures.iter().copied());
    }
    debug!(
        modules = modules.len(),
        submodules = submodules.len(),
        programs = program_ids.len(),
        procedures = free_procs.len(),
        "correlating project"
    );

    // Ancestry first, so dependency ordering can follow submodule chains
    let submodule_ids: Vec<EntityId> = {
        let mut ids: Vec<EntityId> = submodules.values().copied().collect();
        ids.sort();
        ids
    };
    for sid in submodule_ids {
        let (ancestor, parent) = match &arena.get(sid).kind {
            EntityKind::Submodule(sub) => {
                (sub.ancestor_module.clone(), sub.parent_submodule.clone())
            }
            _ => continue,
        };
        let ancestor = resolve_in(&ancestor, &modules);
        let parent = parent.map(|p| resolve_in(&p, &submodules));
        if !ancestor.is_resolved() {
            warn!(
                submodule = %arena.get(sid).name,
                "ancestor module is not part of the project"
            );
        }
        if let EntityKind::Submodule(sub) = &mut arena.get_mut(sid).kind {
            sub.ancestor_module = ancestor;
            sub.parent_submodule = parent;
        }
    }

    let order = order::dependency_order(arena, &modules, &submodules)?;

    let mut globals = SymbolTable::new();
    for &pid in &free_procs {
        globals
            .entry(SmolStr::new(fold_name(&arena.get(pid).name)))
            .or_insert(Ref::Resolved(pid));
    }

    let mut correlator = Correlator {
        arena,
        settings,
        modules,
        exports: FxHashMap::default(),
        globals,
    };
    for id in order {
        correlator.resolve_module(id);
    }
    let empty = SymbolTable::new();
    for id in program_ids {
        correlator.resolve_scope(id, &empty);
    }
    for id in free_procs {
        correlator.resolve_scope(id, &empty);
    }
    correlator.check_extends_cycles();
    Ok(())
}

fn resolve_in(r: &Ref, map: &FxHashMap<SmolStr, EntityId>) -> Ref {
    match r.pending_name() {
        Some(name) => match map.get(fold_name(name).as_str()) {
            Some(&id) => Ref::Resolved(id),
            None => r.clone(),
        },
        None => r.clone(),
    }
}
