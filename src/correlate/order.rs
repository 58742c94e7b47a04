//! Correlation order for modules and submodules.
//!
//! A module's exported symbols must be known before any unit that uses it
//! is resolved, so modules and submodules are processed in topological
//! order of their `use` and ancestor dependencies. The ordering is
//! deterministic: among ready nodes, the lowest arena id goes first, which
//! keeps diagnostics and downstream output stable across runs.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::base::fold_name;
use crate::error::FortdocError;
use crate::model::{EntityArena, EntityId, EntityKind};

/// Topologically sort the given modules and submodules.
///
/// `modules` and `submodules` map folded names to arena ids; dependencies
/// on names outside these maps (intrinsic or truly external modules) do not
/// constrain the order. A dependency cycle is a fatal error carrying the
/// names of every node still stuck in the cycle.
pub fn dependency_order(
    arena: &EntityArena,
    modules: &FxHashMap<SmolStr, EntityId>,
    submodules: &FxHashMap<SmolStr, EntityId>,
) -> Result<Vec<EntityId>, FortdocError> {
    let mut nodes: Vec<EntityId> = modules.values().chain(submodules.values()).copied().collect();
    nodes.sort();

    let mut deps: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
    for &node in &nodes {
        let mut wanted: Vec<SmolStr> = Vec::new();
        collect_use_names(arena, node, &mut wanted);

        let mut edges: Vec<EntityId> = wanted
            .iter()
            .filter_map(|name| modules.get(name).copied())
            .filter(|&dep| dep != node)
            .collect();
        if let EntityKind::Submodule(sub) = &arena.get(node).kind {
            if let Some(ancestor) = sub.ancestor_module.resolved() {
                edges.push(ancestor);
            }
            if let Some(parent) = sub.parent_submodule.as_ref().and_then(|r| r.resolved()) {
                edges.push(parent);
            }
        }
        edges.sort();
        edges.dedup();
        deps.insert(node, edges);
    }

    // Kahn's algorithm over a BTreeSet so ready nodes come out id-ordered
    let mut indegree: FxHashMap<EntityId, usize> = nodes.iter().map(|&n| (n, 0)).collect();
    let mut dependents: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
    for (&node, edges) in &deps {
        for &dep in edges {
            if let Some(count) = indegree.get_mut(&node) {
                *count += 1;
            }
            dependents.entry(dep).or_default().push(node);
        }
    }

    let mut ready: BTreeSet<EntityId> = nodes
        .iter()
        .copied()
        .filter(|n| indegree.get(n).copied().unwrap_or(0) == 0)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(&next) = ready.iter().next() {
        ready.remove(&next);
        order.push(next);
        if let Some(users) = dependents.get(&next) {
            for &user in users {
                if let Some(count) = indegree.get_mut(&user) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(user);
                    }
                }
            }
        }
    }

    if order.len() != nodes.len() {
        let mut stuck: Vec<String> = nodes
            .iter()
            .filter(|n| !order.contains(n))
            .map(|&n| fold_name(&arena.get(n).name))
            .collect();
        stuck.sort();
        return Err(FortdocError::DependencyCycle(stuck));
    }
    Ok(order)
}

/// Collect the folded module names used anywhere in the subtree of `id`,
/// including `use` statements inside contained procedures and interface
/// bodies.
fn collect_use_names(arena: &EntityArena, id: EntityId, out: &mut Vec<SmolStr>) {
    let entity = arena.get(id);
    if let EntityKind::Interface(iface) = &entity.kind {
        for &proc in &iface.procs {
            collect_use_names(arena, proc, out);
        }
        return;
    }
    let Some(unit) = entity.unit() else { return };
    for use_ in &unit.uses {
        if let Some(name) = use_.module.pending_name() {
            out.push(SmolStr::new(fold_name(name)));
        }
    }
    for child in unit.procedures() {
        collect_use_names(arena, child, out);
    }
    for &iface in unit.interfaces.iter().chain(&unit.abs_interfaces) {
        collect_use_names(arena, iface, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{Entity, Module};
    use crate::model::{Permission, Ref, Use};

    fn module_using(arena: &mut EntityArena, name: &str, uses: &[&str]) -> EntityId {
        let mut module = Module::default();
        for used in uses {
            module.unit.uses.push(Use {
                module: Ref::unresolved(*used),
                only: None,
                renames: Vec::new(),
            });
        }
        arena.alloc(Entity::new(
            name,
            Permission::Public,
            EntityKind::Module(module),
        ))
    }

    #[test]
    fn test_dependencies_come_first() {
        let mut arena = EntityArena::new();
        let top = module_using(&mut arena, "app", &["base", "mid"]);
        let mid = module_using(&mut arena, "mid", &["base"]);
        let base = module_using(&mut arena, "base", &[]);

        let mut modules = FxHashMap::default();
        modules.insert(SmolStr::new("app"), top);
        modules.insert(SmolStr::new("mid"), mid);
        modules.insert(SmolStr::new("base"), base);

        let order = dependency_order(&arena, &modules, &FxHashMap::default()).unwrap();
        let pos = |id| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(base) < pos(mid));
        assert!(pos(mid) < pos(top));
    }

    #[test]
    fn test_external_uses_do_not_constrain() {
        let mut arena = EntityArena::new();
        let only = module_using(&mut arena, "solo", &["iso_c_binding", "not_here"]);
        let mut modules = FxHashMap::default();
        modules.insert(SmolStr::new("solo"), only);

        let order = dependency_order(&arena, &modules, &FxHashMap::default()).unwrap();
        assert_eq!(order, vec![only]);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut arena = EntityArena::new();
        let a = module_using(&mut arena, "alpha", &["beta"]);
        let b = module_using(&mut arena, "beta", &["alpha"]);
        let mut modules = FxHashMap::default();
        modules.insert(SmolStr::new("alpha"), a);
        modules.insert(SmolStr::new("beta"), b);

        let err = dependency_order(&arena, &modules, &FxHashMap::default()).unwrap_err();
        match err {
            FortdocError::DependencyCycle(names) => {
                assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
