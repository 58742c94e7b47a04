//! Arena storage for entities.
//!
//! All entities of a project live in one `Vec`, addressed by stable
//! [`EntityId`] handles. Per-file parsing builds an independent arena on a
//! worker thread; [`EntityArena::merge`] rebases a file's ids when its tree
//! is adopted into the project arena. Handles never move after that, which
//! is what lets correlation rewrite [`Ref`] cells in place and later passes
//! read resolved handles without chasing ownership.

use super::entity::{ArgSlot, Entity, EntityKind};
use super::refs::Ref;

/// A stable handle to an entity in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn shifted(self, offset: u32) -> Self {
        Self(self.0 + offset)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    entities: Vec<Entity>,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, entity: Entity) -> EntityId {
        let id = EntityId::new(self.entities.len());
        self.entities.push(entity);
        id
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.index()]
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityId::new(i), e))
    }

    /// Adopt every entity of `other`, rebasing its handles past the end of
    /// this arena. Returns the rebased id of `root`.
    pub fn merge(&mut self, other: EntityArena, root: EntityId) -> EntityId {
        let offset = self.entities.len() as u32;
        for mut entity in other.entities {
            shift_entity(&mut entity, offset);
            self.entities.push(entity);
        }
        root.shifted(offset)
    }

    /// The name of an entity, for diagnostics on resolved refs.
    pub fn name_of(&self, id: EntityId) -> &str {
        &self.get(id).name
    }
}

fn shift_ref(r: &mut Ref, offset: u32) {
    if let Ref::Resolved(id) = r {
        *id = id.shifted(offset);
    }
}

fn shift_ids(ids: &mut [EntityId], offset: u32) {
    for id in ids {
        *id = id.shifted(offset);
    }
}

/// Rewrite every handle stored in `entity` by `offset`. Must visit every
/// `EntityId` and `Ref` field of every kind; a missed field would dangle
/// after a merge.
fn shift_entity(entity: &mut Entity, offset: u32) {
    if let Some(parent) = &mut entity.parent {
        *parent = parent.shifted(offset);
    }
    match &mut entity.kind {
        EntityKind::SourceFile(f) => {
            shift_ids(&mut f.modules, offset);
            shift_ids(&mut f.submodules, offset);
            shift_ids(&mut f.programs, offset);
            shift_ids(&mut f.procedures, offset);
        }
        EntityKind::Module(m) => {
            shift_unit(&mut m.unit, offset);
            shift_ids(&mut m.used_by, offset);
        }
        EntityKind::Submodule(s) => {
            shift_unit(&mut s.unit, offset);
            shift_ref(&mut s.ancestor_module, offset);
            if let Some(parent) = &mut s.parent_submodule {
                shift_ref(parent, offset);
            }
        }
        EntityKind::Program(u) => shift_unit(u, offset),
        EntityKind::Procedure(p) => {
            shift_unit(&mut p.unit, offset);
            for arg in &mut p.args {
                if let ArgSlot::Entity(id) = arg {
                    *id = id.shifted(offset);
                }
            }
            if let Some(retvar) = &mut p.retvar {
                *retvar = retvar.shifted(offset);
            }
            if let Some(rt) = &mut p.result_type {
                if let Some(proto) = &mut rt.proto {
                    shift_ref(proto, offset);
                }
            }
            if let Some(implements) = &mut p.implements {
                shift_ref(implements, offset);
            }
        }
        EntityKind::Interface(i) => {
            shift_ids(&mut i.procs, offset);
            for r in &mut i.module_procs {
                shift_ref(r, offset);
            }
        }
        EntityKind::DerivedType(t) => {
            if let Some(extends) = &mut t.extends {
                shift_ref(extends, offset);
            }
            shift_ids(&mut t.variables, offset);
            shift_ids(&mut t.bound_procs, offset);
            shift_ids(&mut t.final_procs, offset);
            if let Some(ctor) = &mut t.constructor {
                *ctor = ctor.shifted(offset);
            }
        }
        EntityKind::Variable(v) => {
            if let Some(proto) = &mut v.var_type.proto {
                shift_ref(proto, offset);
            }
        }
        EntityKind::BoundProcedure(b) => {
            if let Some(proto) = &mut b.proto {
                shift_ref(proto, offset);
            }
            for r in &mut b.bindings {
                shift_ref(r, offset);
            }
        }
        EntityKind::FinalProc(f) => shift_ref(&mut f.procedure, offset),
    }
}

fn shift_unit(unit: &mut super::entity::CodeUnit, offset: u32) {
    for u in &mut unit.uses {
        shift_ref(&mut u.module, offset);
    }
    for c in &mut unit.calls {
        shift_ref(c, offset);
    }
    shift_ids(&mut unit.variables, offset);
    shift_ids(&mut unit.types, offset);
    shift_ids(&mut unit.subroutines, offset);
    shift_ids(&mut unit.functions, offset);
    shift_ids(&mut unit.interfaces, offset);
    shift_ids(&mut unit.abs_interfaces, offset);
    shift_ids(&mut unit.mod_procedures, offset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{CodeUnit, Module};
    use crate::model::Permission;

    fn module(name: &str) -> Entity {
        Entity::new(name, Permission::Public, EntityKind::Module(Module::default()))
    }

    #[test]
    fn test_alloc_and_get() {
        let mut arena = EntityArena::new();
        let id = arena.alloc(module("m"));
        assert_eq!(arena.get(id).name, "m");
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_merge_rebases_handles() {
        let mut project = EntityArena::new();
        project.alloc(module("existing"));

        let mut file = EntityArena::new();
        let child = file.alloc(module("child"));
        let mut parent = Entity::new(
            "prog",
            Permission::Public,
            EntityKind::Program(CodeUnit::default()),
        );
        if let EntityKind::Program(unit) = &mut parent.kind {
            unit.uses.push(crate::model::Use {
                module: Ref::Resolved(child),
                only: None,
                renames: Vec::new(),
            });
        }
        let root = file.alloc(parent);

        let new_root = project.merge(file, root);
        assert_eq!(project.get(new_root).name, "prog");
        let unit = match &project.get(new_root).kind {
            EntityKind::Program(u) => u,
            _ => unreachable!(),
        };
        let shifted = unit.uses[0].module.resolved().unwrap();
        assert_eq!(project.get(shifted).name, "child");
    }
}
