//! Name resolution for one scope at a time.
//!
//! The correlator walks every code unit with a symbol table built from the
//! scope's own declarations, its use-associated imports, and its host
//! scope, in that precedence order. Each unresolved [`Ref`] is rewritten in
//! place; names that match nothing stay unresolved rather than failing the
//! run, since real projects call into libraries whose source is not part
//! of the documentation build.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::warn;

use crate::base::fold_name;
use crate::model::entity::ArgSlot;
use crate::model::{EntityArena, EntityId, EntityKind, Ref, Use};
use crate::settings::ProjectSettings;

use super::exports::{module_exports, ExportTable, SymbolTable};
use super::intrinsics;

pub(super) struct Correlator<'a> {
    pub arena: &'a mut EntityArena,
    pub settings: &'a ProjectSettings,
    pub modules: FxHashMap<SmolStr, EntityId>,
    pub exports: FxHashMap<EntityId, ExportTable>,
    /// Free procedures at file scope, callable from anywhere by external
    /// linkage. Lowest lookup precedence.
    pub globals: SymbolTable,
}

impl Correlator<'_> {
    /// Resolve one module or submodule and record its export table.
    /// Must be called in dependency order.
    pub fn resolve_module(&mut self, id: EntityId) {
        let mut table = SymbolTable::new();
        self.insert_locals(id, &mut table);

        // Use-imports live in their own table: under a public default
        // visibility they re-export through this module's export table.
        let mut imports = SymbolTable::new();
        self.apply_uses(id, &mut imports);
        for (name, target) in &imports {
            table
                .entry(name.clone())
                .or_insert_with(|| target.clone());
        }

        // Host association with the ancestor chain, locals included;
        // use-associated names take precedence over inherited ones.
        let mut ancestors = SymbolTable::new();
        self.insert_ancestors(id, &mut ancestors);
        for (name, target) in &ancestors {
            table
                .entry(name.clone())
                .or_insert_with(|| target.clone());
        }
        for (name, target) in &self.globals {
            table
                .entry(name.clone())
                .or_insert_with(|| target.clone());
        }

        self.resolve_unit(id, &table);
        self.link_constructors(id);
        self.resolve_children(id, &table);

        if let Some(unit) = self.arena.get(id).unit() {
            for pid in unit.mod_procedures.clone() {
                self.link_implementation(pid, &ancestors);
            }
        }

        if matches!(self.arena.get(id).kind, EntityKind::Module(_)) {
            let exports = module_exports(self.arena, id, &table, &imports);
            self.exports.insert(id, exports);
        }
    }

    /// Resolve a program, free procedure, or contained procedure, with
    /// `inherited` providing host association.
    pub fn resolve_scope(&mut self, id: EntityId, inherited: &SymbolTable) {
        let mut table = SymbolTable::new();
        self.insert_locals(id, &mut table);
        self.apply_uses(id, &mut table);
        for (name, target) in inherited {
            table
                .entry(name.clone())
                .or_insert_with(|| target.clone());
        }
        for (name, target) in &self.globals {
            table
                .entry(name.clone())
                .or_insert_with(|| target.clone());
        }
        self.resolve_unit(id, &table);
        self.link_constructors(id);
        self.resolve_children(id, &table);
    }

    fn insert_locals(&self, id: EntityId, table: &mut SymbolTable) {
        let entity = self.arena.get(id);
        if let EntityKind::Procedure(p) = &entity.kind {
            for arg in &p.args {
                if let ArgSlot::Entity(vid) = arg {
                    self.insert_named(*vid, table);
                }
            }
            if let Some(retvar) = p.retvar {
                self.insert_named(retvar, table);
            }
        }
        let Some(unit) = entity.unit() else { return };
        let children = unit
            .procedures()
            .chain(unit.types.iter().copied())
            .chain(unit.interfaces.iter().copied())
            .chain(unit.abs_interfaces.iter().copied())
            .chain(unit.variables.iter().copied());
        for child in children {
            self.insert_named(child, table);
        }
    }

    fn insert_named(&self, id: EntityId, table: &mut SymbolTable) {
        let name = SmolStr::new(fold_name(&self.arena.get(id).name));
        table.entry(name).or_insert(Ref::Resolved(id));
    }

    /// Walk the submodule ancestry and make every ancestor's declarations
    /// visible, private ones included. Imports of the ancestors are
    /// inherited as well, read back from their already-resolved `use`
    /// statements.
    fn insert_ancestors(&self, id: EntityId, table: &mut SymbolTable) {
        let mut seen = vec![id];
        let mut current = id;
        loop {
            let next = match &self.arena.get(current).kind {
                EntityKind::Submodule(sub) => sub
                    .parent_submodule
                    .as_ref()
                    .and_then(|r| r.resolved())
                    .or_else(|| sub.ancestor_module.resolved()),
                _ => None,
            };
            let Some(next) = next else { break };
            if seen.contains(&next) {
                break;
            }
            seen.push(next);
            self.insert_locals(next, table);
            if let Some(unit) = self.arena.get(next).unit() {
                for use_ in &unit.uses {
                    if let Some(mid) = use_.module.resolved() {
                        self.import_exports(mid, use_, table);
                    }
                }
            }
            current = next;
        }
    }

    /// Resolve every `use` of the unit and pull the imported names into the
    /// symbol table. Rewrites the stored `Use` refs and records the inverse
    /// used-by edges.
    fn apply_uses(&mut self, id: EntityId, table: &mut SymbolTable) {
        let Some(unit) = self.arena.get(id).unit() else { return };
        let mut uses = unit.uses.clone();
        let mut used: Vec<EntityId> = Vec::new();

        for use_ in &mut uses {
            let folded = match &use_.module {
                Ref::Unresolved(name) => SmolStr::new(fold_name(name)),
                Ref::Resolved(mid) => {
                    used.push(*mid);
                    self.import_exports(*mid, use_, table);
                    continue;
                }
                Ref::External { .. } => continue,
            };
            if let Some(&mid) = self.modules.get(&folded) {
                use_.module = Ref::Resolved(mid);
                used.push(mid);
                self.import_exports(mid, use_, table);
            } else if let Some(url) = intrinsics::module_url(&folded, self.settings) {
                if let Some(items) = &use_.only {
                    for item in items {
                        table
                            .entry(SmolStr::new(fold_name(&item.local)))
                            .or_insert_with(|| Ref::External {
                                name: SmolStr::new(fold_name(&item.remote)),
                                url: url.clone(),
                            });
                    }
                }
                use_.module = Ref::External { name: folded, url };
            } else if self.settings.warn {
                warn!(module = %folded, "used module is not part of the project");
            }
        }

        if let Some(unit) = self.arena.get_mut(id).unit_mut() {
            unit.uses = uses;
        }
        for mid in used {
            if let EntityKind::Module(m) = &mut self.arena.get_mut(mid).kind {
                if !m.used_by.contains(&id) {
                    m.used_by.push(id);
                }
            }
        }
    }

    /// Copy the exported names of `mid` into `table`, honoring the only
    /// list and renames of `use_`. Existing entries are never displaced.
    fn import_exports(&self, mid: EntityId, use_: &Use, table: &mut SymbolTable) {
        let Some(exports) = self.exports.get(&mid) else {
            return;
        };
        match &use_.only {
            Some(items) => {
                for item in items {
                    let remote = fold_name(&item.remote);
                    match exports.get(remote.as_str()) {
                        Some(target) => {
                            table
                                .entry(SmolStr::new(fold_name(&item.local)))
                                .or_insert_with(|| target.clone());
                        }
                        None => {
                            if self.settings.warn {
                                warn!(
                                    name = %item.remote,
                                    module = %self.arena.name_of(mid),
                                    "only-list name is not exported"
                                );
                            }
                        }
                    }
                }
            }
            None => {
                let renamed: Vec<SmolStr> = use_
                    .renames
                    .iter()
                    .map(|item| SmolStr::new(fold_name(&item.remote)))
                    .collect();
                for item in &use_.renames {
                    if let Some(target) = exports.get(fold_name(&item.remote).as_str()) {
                        table
                            .entry(SmolStr::new(fold_name(&item.local)))
                            .or_insert_with(|| target.clone());
                    }
                }
                for (name, target) in exports {
                    if !renamed.contains(name) {
                        table
                            .entry(name.clone())
                            .or_insert_with(|| target.clone());
                    }
                }
            }
        }
    }

    /// Rewrite the refs held directly by this unit: calls, variable
    /// prototypes, derived types, interfaces.
    fn resolve_unit(&mut self, id: EntityId, table: &SymbolTable) {
        let Some(unit) = self.arena.get(id).unit() else { return };
        let calls = unit.calls.clone();
        let var_ids = unit.variables.clone();
        let type_ids = unit.types.clone();
        let iface_ids: Vec<EntityId> = unit
            .interfaces
            .iter()
            .chain(&unit.abs_interfaces)
            .copied()
            .collect();

        let resolved: Vec<Ref> = calls.iter().map(|c| self.resolve_ref(c, table)).collect();
        if let Some(unit) = self.arena.get_mut(id).unit_mut() {
            unit.calls = resolved;
        }

        for vid in var_ids {
            self.resolve_var_proto(vid, table);
        }
        if let EntityKind::Procedure(p) = &self.arena.get(id).kind {
            let mut extra: Vec<EntityId> = p
                .args
                .iter()
                .filter_map(|a| match a {
                    ArgSlot::Entity(vid) => Some(*vid),
                    ArgSlot::Name(_) => None,
                })
                .collect();
            extra.extend(p.retvar);
            for vid in extra {
                self.resolve_var_proto(vid, table);
            }
        }
        let result_proto = match &self.arena.get(id).kind {
            EntityKind::Procedure(p) => {
                p.result_type.as_ref().and_then(|rt| rt.proto.clone())
            }
            _ => None,
        };
        if let Some(proto) = result_proto {
            let resolved = self.resolve_ref(&proto, table);
            if let EntityKind::Procedure(p) = &mut self.arena.get_mut(id).kind {
                if let Some(rt) = &mut p.result_type {
                    rt.proto = Some(resolved);
                }
            }
        }

        for tid in type_ids {
            self.resolve_type(tid, table);
        }
        for iid in iface_ids {
            self.resolve_interface(iid, table);
        }
    }

    fn resolve_var_proto(&mut self, vid: EntityId, table: &SymbolTable) {
        let proto = match &self.arena.get(vid).kind {
            EntityKind::Variable(v) => v.var_type.proto.clone(),
            _ => None,
        };
        let Some(proto) = proto else { return };
        let resolved = self.resolve_ref(&proto, table);
        if let EntityKind::Variable(v) = &mut self.arena.get_mut(vid).kind {
            v.var_type.proto = Some(resolved);
        }
    }

    fn resolve_type(&mut self, tid: EntityId, table: &SymbolTable) {
        let (extends, var_ids, bp_ids, fp_ids) = match &self.arena.get(tid).kind {
            EntityKind::DerivedType(dt) => (
                dt.extends.clone(),
                dt.variables.clone(),
                dt.bound_procs.clone(),
                dt.final_procs.clone(),
            ),
            _ => return,
        };

        if let Some(extends) = extends {
            let resolved = self.resolve_ref(&extends, table);
            if let EntityKind::DerivedType(dt) = &mut self.arena.get_mut(tid).kind {
                dt.extends = Some(resolved);
            }
        }
        for vid in var_ids {
            self.resolve_var_proto(vid, table);
        }

        // Generic bindings name specific bindings of the same type, not
        // module procedures.
        let by_name: FxHashMap<SmolStr, EntityId> = bp_ids
            .iter()
            .map(|&b| (SmolStr::new(fold_name(&self.arena.get(b).name)), b))
            .collect();
        for bid in bp_ids {
            let (is_generic, proto, bindings) = match &self.arena.get(bid).kind {
                EntityKind::BoundProcedure(bp) => {
                    (bp.is_generic, bp.proto.clone(), bp.bindings.clone())
                }
                _ => continue,
            };
            let proto = proto.map(|p| self.resolve_ref(&p, table));
            let bindings: Vec<Ref> = bindings
                .into_iter()
                .map(|binding| match binding.pending_name() {
                    Some(name) if is_generic => {
                        match by_name.get(fold_name(name).as_str()) {
                            Some(&target) => Ref::Resolved(target),
                            None => binding,
                        }
                    }
                    Some(_) => self.resolve_ref(&binding, table),
                    None => binding,
                })
                .collect();
            if let EntityKind::BoundProcedure(bp) = &mut self.arena.get_mut(bid).kind {
                bp.proto = proto;
                bp.bindings = bindings;
            }
        }

        for fid in fp_ids {
            let procedure = match &self.arena.get(fid).kind {
                EntityKind::FinalProc(fp) => fp.procedure.clone(),
                _ => continue,
            };
            let resolved = self.resolve_ref(&procedure, table);
            if let EntityKind::FinalProc(fp) = &mut self.arena.get_mut(fid).kind {
                fp.procedure = resolved;
            }
        }
    }

    fn resolve_interface(&mut self, iid: EntityId, table: &SymbolTable) {
        let refs = match &self.arena.get(iid).kind {
            EntityKind::Interface(i) => i.module_procs.clone(),
            _ => return,
        };
        if refs.is_empty() {
            return;
        }
        let resolved: Vec<Ref> = refs.iter().map(|r| self.resolve_ref(r, table)).collect();
        if let EntityKind::Interface(i) = &mut self.arena.get_mut(iid).kind {
            i.module_procs = resolved;
        }
    }

    /// A generic interface with the same name as a derived type in the same
    /// scope is that type's user-defined constructor.
    fn link_constructors(&mut self, id: EntityId) {
        let Some(unit) = self.arena.get(id).unit() else { return };
        let type_ids = unit.types.clone();
        let iface_ids = unit.interfaces.clone();
        for tid in type_ids {
            let tname = fold_name(&self.arena.get(tid).name);
            let ctor = iface_ids.iter().copied().find(|&iid| {
                fold_name(&self.arena.get(iid).name) == tname
                    && matches!(&self.arena.get(iid).kind,
                        EntityKind::Interface(i) if i.is_generic)
            });
            if let Some(ctor) = ctor {
                if let EntityKind::DerivedType(dt) = &mut self.arena.get_mut(tid).kind {
                    dt.constructor = Some(ctor);
                }
            }
        }
    }

    /// Link a `module procedure` implementation in a submodule back to the
    /// interface declared on its ancestor module.
    fn link_implementation(&mut self, pid: EntityId, ancestors: &SymbolTable) {
        let name = SmolStr::new(fold_name(&self.arena.get(pid).name));
        let Some(target) = ancestors.get(&name) else {
            if self.settings.warn {
                warn!(procedure = %name, "no interface found for module procedure");
            }
            return;
        };
        if target.resolved() == Some(pid) {
            return;
        }
        if let EntityKind::Procedure(p) = &mut self.arena.get_mut(pid).kind {
            p.implements = Some(target.clone());
        }
    }

    fn resolve_children(&mut self, id: EntityId, table: &SymbolTable) {
        let Some(unit) = self.arena.get(id).unit() else { return };
        let children: Vec<EntityId> = unit.procedures().collect();
        let iface_ids: Vec<EntityId> = unit
            .interfaces
            .iter()
            .chain(&unit.abs_interfaces)
            .copied()
            .collect();
        for child in children {
            self.resolve_scope(child, table);
        }
        for iid in iface_ids {
            let procs = match &self.arena.get(iid).kind {
                EntityKind::Interface(i) => i.procs.clone(),
                _ => continue,
            };
            for pid in procs {
                self.resolve_scope(pid, table);
            }
        }
    }

    fn resolve_ref(&self, r: &Ref, table: &SymbolTable) -> Ref {
        let Some(name) = r.pending_name() else {
            return r.clone();
        };
        match table.get(fold_name(name).as_str()) {
            Some(target) => target.clone(),
            None => {
                if self.settings.warn {
                    warn!(name = %name, "unresolved reference");
                }
                r.clone()
            }
        }
    }

    /// Break inheritance cycles: a type whose `extends` chain leads back to
    /// itself gets its parent link reverted to the bare name.
    pub fn check_extends_cycles(&mut self) {
        let type_ids: Vec<EntityId> = self
            .arena
            .iter()
            .filter(|(_, e)| matches!(e.kind, EntityKind::DerivedType(_)))
            .map(|(id, _)| id)
            .collect();
        for tid in type_ids {
            let mut seen = vec![tid];
            let mut current = tid;
            loop {
                let next = match &self.arena.get(current).kind {
                    EntityKind::DerivedType(dt) => {
                        dt.extends.as_ref().and_then(|r| r.resolved())
                    }
                    _ => None,
                };
                let Some(next) = next else { break };
                if next == tid {
                    let direct = match &self.arena.get(tid).kind {
                        EntityKind::DerivedType(dt) => {
                            dt.extends.as_ref().and_then(|r| r.resolved())
                        }
                        _ => None,
                    };
                    if let Some(direct) = direct {
                        let base = SmolStr::new(fold_name(&self.arena.get(direct).name));
                        warn!(
                            type_name = %self.arena.get(tid).name,
                            "inheritance cycle; parent left unresolved"
                        );
                        if let EntityKind::DerivedType(dt) =
                            &mut self.arena.get_mut(tid).kind
                        {
                            dt.extends = Some(Ref::Unresolved(base));
                        }
                    }
                    break;
                }
                if seen.contains(&next) {
                    break;
                }
                seen.push(next);
                current = next;
            }
        }
    }
}
