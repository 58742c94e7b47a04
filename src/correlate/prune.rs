//! Post-correlation pruning.
//!
//! Entities whose permission is not in the configured display set are
//! unlinked from their parents' child lists. The arena itself is never
//! compacted, so resolved handles held elsewhere stay valid; a pruned
//! entity is simply unreachable from the tree.

use crate::model::{EntityArena, EntityId, EntityKind};
use crate::settings::ProjectSettings;

pub fn prune(arena: &mut EntityArena, files: &[EntityId], settings: &ProjectSettings) {
    for &file in files {
        let children: Vec<EntityId> = match &arena.get(file).kind {
            EntityKind::SourceFile(sf) => sf
                .modules
                .iter()
                .chain(&sf.submodules)
                .chain(&sf.programs)
                .chain(&sf.procedures)
                .copied()
                .collect(),
            _ => continue,
        };
        for child in children {
            prune_entity(arena, child, settings);
        }
    }
}

fn displayed(arena: &EntityArena, ids: &[EntityId], settings: &ProjectSettings) -> Vec<EntityId> {
    ids.iter()
        .copied()
        .filter(|&id| settings.is_displayed(arena.get(id).permission))
        .collect()
}

fn prune_entity(arena: &mut EntityArena, id: EntityId, settings: &ProjectSettings) {
    if matches!(arena.get(id).kind, EntityKind::DerivedType(_)) {
        let (variables, bound_procs) = match &arena.get(id).kind {
            EntityKind::DerivedType(dt) => (
                displayed(arena, &dt.variables, settings),
                displayed(arena, &dt.bound_procs, settings),
            ),
            _ => return,
        };
        if let EntityKind::DerivedType(dt) = &mut arena.get_mut(id).kind {
            dt.variables = variables;
            dt.bound_procs = bound_procs;
        }
        return;
    }

    let Some(unit) = arena.get(id).unit() else { return };
    let variables = displayed(arena, &unit.variables, settings);
    let types = displayed(arena, &unit.types, settings);
    let subroutines = displayed(arena, &unit.subroutines, settings);
    let functions = displayed(arena, &unit.functions, settings);
    let mod_procedures = displayed(arena, &unit.mod_procedures, settings);
    let interfaces = displayed(arena, &unit.interfaces, settings);
    let abs_interfaces = displayed(arena, &unit.abs_interfaces, settings);

    if let Some(unit) = arena.get_mut(id).unit_mut() {
        unit.variables = variables;
        unit.types = types.clone();
        unit.subroutines = subroutines.clone();
        unit.functions = functions.clone();
        unit.mod_procedures = mod_procedures.clone();
        unit.interfaces = interfaces;
        unit.abs_interfaces = abs_interfaces;
    }

    for child in subroutines
        .into_iter()
        .chain(functions)
        .chain(mod_procedures)
        .chain(types)
    {
        prune_entity(arena, child, settings);
    }
}
