//! Correlation Tests - Whole-Project Resolution
//!
//! Multi-file projects are assembled through [`Project`], correlated, and
//! the resolved links inspected: use association, export tables, submodule
//! implementations, constructors, inheritance and display pruning.

use std::path::Path;

use fortdoc::model::entity::EntityKind;
use fortdoc::{EntityId, FortdocError, Permission, Project, ProjectSettings, Ref};

/// Settings that keep private entities visible, so pruning does not get in
/// the way of link assertions.
fn full_display() -> ProjectSettings {
    ProjectSettings {
        display: vec![
            Permission::Public,
            Permission::Protected,
            Permission::Private,
        ],
        ..ProjectSettings::default()
    }
}

fn project_with(settings: ProjectSettings, sources: &[(&str, &str)]) -> Project {
    let mut project = Project::new(settings).expect("valid settings");
    for (name, text) in sources {
        project.add_source(Path::new(name), text).expect("parse");
    }
    project.correlate().expect("correlate");
    project
}

fn project(sources: &[(&str, &str)]) -> Project {
    project_with(full_display(), sources)
}

fn module(project: &Project, name: &str) -> EntityId {
    project
        .modules()
        .into_iter()
        .find(|&id| project.arena().get(id).name.eq_ignore_ascii_case(name))
        .unwrap_or_else(|| panic!("no module named {name}"))
}

fn subroutine(project: &Project, module_id: EntityId, name: &str) -> EntityId {
    let unit = project
        .arena()
        .get(module_id)
        .unit()
        .expect("module has a unit");
    *unit
        .subroutines
        .iter()
        .find(|&&id| project.arena().get(id).name.eq_ignore_ascii_case(name))
        .unwrap_or_else(|| panic!("no subroutine named {name}"))
}

const ALPHA: &str = "module alpha\n\
                     contains\n\
                     subroutine greet()\n\
                     end subroutine greet\n\
                     subroutine other()\n\
                     end subroutine other\n\
                     end module alpha\n";

// ============================================================================
// Use association
// ============================================================================

#[test]
fn test_use_resolves_calls_across_files() {
    let p = project(&[
        ("alpha.f90", ALPHA),
        (
            "beta.f90",
            "module beta\n\
             use alpha\n\
             contains\n\
             subroutine run()\n\
             call greet()\n\
             end subroutine run\n\
             end module beta\n",
        ),
    ]);
    let alpha = module(&p, "alpha");
    let beta = module(&p, "beta");
    let greet = subroutine(&p, alpha, "greet");

    let beta_unit = p.arena().get(beta).unit().expect("unit");
    assert_eq!(beta_unit.uses[0].module, Ref::Resolved(alpha));

    let run = subroutine(&p, beta, "run");
    let run_unit = p.arena().get(run).unit().expect("unit");
    assert_eq!(run_unit.calls, vec![Ref::Resolved(greet)]);

    match &p.arena().get(alpha).kind {
        EntityKind::Module(m) => assert_eq!(m.used_by, vec![beta]),
        other => panic!("alpha is not a module: {other:?}"),
    }
}

#[test]
fn test_only_list_restricts_imports() {
    let p = project(&[
        ("alpha.f90", ALPHA),
        (
            "beta.f90",
            "module beta\n\
             use alpha, only: greet\n\
             contains\n\
             subroutine run()\n\
             call greet()\n\
             call other()\n\
             end subroutine run\n\
             end module beta\n",
        ),
    ]);
    let alpha = module(&p, "alpha");
    let beta = module(&p, "beta");
    let greet = subroutine(&p, alpha, "greet");

    let run = subroutine(&p, beta, "run");
    let calls = &p.arena().get(run).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Resolved(greet));
    assert_eq!(calls[1], Ref::Unresolved("other".into()));
}

#[test]
fn test_rename_imports_under_local_name() {
    let p = project(&[
        ("alpha.f90", ALPHA),
        (
            "beta.f90",
            "module beta\n\
             use alpha, only: hi => greet\n\
             contains\n\
             subroutine run()\n\
             call hi()\n\
             call greet()\n\
             end subroutine run\n\
             end module beta\n",
        ),
    ]);
    let alpha = module(&p, "alpha");
    let beta = module(&p, "beta");
    let greet = subroutine(&p, alpha, "greet");

    let run = subroutine(&p, beta, "run");
    let calls = &p.arena().get(run).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Resolved(greet));
    // The remote name itself is not imported
    assert_eq!(calls[1], Ref::Unresolved("greet".into()));
}

#[test]
fn test_file_order_does_not_affect_resolution() {
    // The dependent file is adopted before its dependency
    let p = project(&[
        (
            "beta.f90",
            "module beta\n\
             use alpha\n\
             contains\n\
             subroutine run()\n\
             call greet()\n\
             end subroutine run\n\
             end module beta\n",
        ),
        ("alpha.f90", ALPHA),
    ]);
    let alpha = module(&p, "alpha");
    let beta = module(&p, "beta");
    let greet = subroutine(&p, alpha, "greet");

    let run = subroutine(&p, beta, "run");
    let calls = &p.arena().get(run).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Resolved(greet));
}

#[test]
fn test_local_declaration_shadows_import() {
    let p = project(&[
        ("alpha.f90", ALPHA),
        (
            "beta.f90",
            "module beta\n\
             use alpha\n\
             contains\n\
             subroutine greet()\n\
             end subroutine greet\n\
             subroutine run()\n\
             call greet()\n\
             end subroutine run\n\
             end module beta\n",
        ),
    ]);
    let beta = module(&p, "beta");
    let local_greet = subroutine(&p, beta, "greet");

    let run = subroutine(&p, beta, "run");
    let calls = &p.arena().get(run).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Resolved(local_greet));
}

#[test]
fn test_reexport_through_public_statement() {
    let p = project(&[
        ("alpha.f90", ALPHA),
        (
            "middle.f90",
            "module middle\n\
             use alpha, only: greet\n\
             private\n\
             public :: greet\n\
             end module middle\n",
        ),
        (
            "top.f90",
            "module top\n\
             use middle\n\
             contains\n\
             subroutine go()\n\
             call greet()\n\
             end subroutine go\n\
             end module top\n",
        ),
    ]);
    let alpha = module(&p, "alpha");
    let top = module(&p, "top");
    let greet = subroutine(&p, alpha, "greet");

    let go = subroutine(&p, top, "go");
    let calls = &p.arena().get(go).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Resolved(greet));
}

#[test]
fn test_plain_use_chain_reexports_by_default() {
    // No public statement anywhere in bridge: its default public
    // visibility alone carries alpha's symbols through to top.
    let p = project(&[
        ("alpha.f90", ALPHA),
        (
            "bridge.f90",
            "module bridge\n\
             use alpha\n\
             end module bridge\n",
        ),
        (
            "top.f90",
            "module top\n\
             use bridge\n\
             contains\n\
             subroutine go()\n\
             call greet()\n\
             end subroutine go\n\
             end module top\n",
        ),
    ]);
    let alpha = module(&p, "alpha");
    let top = module(&p, "top");
    let greet = subroutine(&p, alpha, "greet");

    let go = subroutine(&p, top, "go");
    let calls = &p.arena().get(go).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Resolved(greet));
}

#[test]
fn test_private_default_stops_reexport() {
    let p = project(&[
        ("alpha.f90", ALPHA),
        (
            "bridge.f90",
            "module bridge\n\
             use alpha\n\
             private\n\
             end module bridge\n",
        ),
        (
            "top.f90",
            "module top\n\
             use bridge\n\
             contains\n\
             subroutine go()\n\
             call greet()\n\
             end subroutine go\n\
             end module top\n",
        ),
    ]);
    let top = module(&p, "top");
    let go = subroutine(&p, top, "go");
    let calls = &p.arena().get(go).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Unresolved("greet".into()));
}

#[test]
fn test_intrinsic_module_becomes_external_link() {
    let p = project(&[(
        "c_api.f90",
        "module c_api\n\
         use iso_c_binding, only: c_int\n\
         end module c_api\n",
    )]);
    let c_api = module(&p, "c_api");
    let unit = p.arena().get(c_api).unit().expect("unit");
    match &unit.uses[0].module {
        Ref::External { name, url } => {
            assert_eq!(name, "iso_c_binding");
            assert!(url.starts_with("https://"));
        }
        other => panic!("expected an external link, got {other:?}"),
    }
}

// ============================================================================
// Submodules
// ============================================================================

#[test]
fn test_submodule_links_to_ancestor_interface() {
    let p = project(&[
        (
            "counters.f90",
            "module counters\n\
             interface\n\
             module subroutine inc(i)\n\
             integer, intent(inout) :: i\n\
             end subroutine inc\n\
             end interface\n\
             end module counters\n",
        ),
        (
            "impl.f90",
            "submodule (counters) counters_impl\n\
             contains\n\
             module procedure inc\n\
             i = i + 1\n\
             end procedure inc\n\
             end submodule counters_impl\n",
        ),
    ]);
    let counters = module(&p, "counters");
    let iface = p.arena().get(counters).unit().expect("unit").interfaces[0];
    assert_eq!(p.arena().get(iface).name, "inc");

    let sub = p.submodules()[0];
    match &p.arena().get(sub).kind {
        EntityKind::Submodule(s) => {
            assert_eq!(s.ancestor_module, Ref::Resolved(counters));
            let impl_proc = s.unit.mod_procedures[0];
            match &p.arena().get(impl_proc).kind {
                EntityKind::Procedure(proc) => {
                    assert_eq!(proc.implements, Some(Ref::Resolved(iface)));
                }
                other => panic!("not a procedure: {other:?}"),
            }
        }
        other => panic!("not a submodule: {other:?}"),
    }
}

#[test]
fn test_submodule_inherits_ancestor_symbols() {
    let p = project(&[
        ("alpha.f90", ALPHA),
        (
            "store.f90",
            "module store\n\
             use alpha, only: greet\n\
             integer :: total\n\
             interface\n\
             module subroutine bump()\n\
             end subroutine bump\n\
             end interface\n\
             end module store\n",
        ),
        (
            "store_impl.f90",
            "submodule (store) store_impl\n\
             contains\n\
             module procedure bump\n\
             total = total + 1\n\
             call greet()\n\
             end procedure bump\n\
             end submodule store_impl\n",
        ),
    ]);
    let alpha = module(&p, "alpha");
    let greet = subroutine(&p, alpha, "greet");

    let sub = p.submodules()[0];
    let bump = match &p.arena().get(sub).kind {
        EntityKind::Submodule(s) => s.unit.mod_procedures[0],
        other => panic!("not a submodule: {other:?}"),
    };
    // `greet` came through the ancestor's use statement
    let calls = &p.arena().get(bump).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Resolved(greet));
}

// ============================================================================
// Types
// ============================================================================

#[test]
fn test_constructor_interface_linked_to_type() {
    let p = project(&[(
        "vectors.f90",
        "module vectors\n\
         type :: vector\n\
         real :: x\n\
         end type vector\n\
         interface vector\n\
         module procedure new_vector\n\
         end interface vector\n\
         contains\n\
         function new_vector(x) result(v)\n\
         real, intent(in) :: x\n\
         type(vector) :: v\n\
         v%x = x\n\
         end function new_vector\n\
         end module vectors\n",
    )]);
    let vectors = module(&p, "vectors");
    let unit = p.arena().get(vectors).unit().expect("unit");
    let vector_t = unit.types[0];
    let ctor_iface = unit.interfaces[0];
    let new_vector = unit.functions[0];

    match &p.arena().get(vector_t).kind {
        EntityKind::DerivedType(dt) => assert_eq!(dt.constructor, Some(ctor_iface)),
        other => panic!("not a type: {other:?}"),
    }
    match &p.arena().get(ctor_iface).kind {
        EntityKind::Interface(i) => {
            assert_eq!(i.module_procs, vec![Ref::Resolved(new_vector)]);
        }
        other => panic!("not an interface: {other:?}"),
    }
    // The result variable's prototype resolved to the type
    match &p.arena().get(new_vector).kind {
        EntityKind::Procedure(proc) => {
            let ret = proc.retvar.expect("result variable");
            match &p.arena().get(ret).kind {
                EntityKind::Variable(v) => {
                    assert_eq!(v.var_type.proto, Some(Ref::Resolved(vector_t)));
                }
                other => panic!("not a variable: {other:?}"),
            }
        }
        other => panic!("not a procedure: {other:?}"),
    }
}

#[test]
fn test_extends_chain_resolves_two_levels() {
    let p = project(&[
        (
            "base.f90",
            "module base_mod\n\
             type :: base\n\
             integer :: id\n\
             end type base\n\
             end module base_mod\n",
        ),
        (
            "derived.f90",
            "module derived_mod\n\
             use base_mod\n\
             type, extends(base) :: derived\n\
             real :: extra\n\
             end type derived\n\
             end module derived_mod\n",
        ),
        (
            "leaf.f90",
            "module leaf_mod\n\
             use derived_mod\n\
             type, extends(derived) :: leaf\n\
             end type leaf\n\
             type :: holder\n\
             type(leaf) :: item\n\
             end type holder\n\
             end module leaf_mod\n",
        ),
    ]);
    let base_t = p
        .arena()
        .get(module(&p, "base_mod"))
        .unit()
        .expect("unit")
        .types[0];
    let derived_t = p
        .arena()
        .get(module(&p, "derived_mod"))
        .unit()
        .expect("unit")
        .types[0];
    let leaf_unit_types = &p
        .arena()
        .get(module(&p, "leaf_mod"))
        .unit()
        .expect("unit")
        .types;
    let leaf_t = leaf_unit_types[0];
    let holder_t = leaf_unit_types[1];

    let extends_of = |tid| match &p.arena().get(tid).kind {
        EntityKind::DerivedType(dt) => dt.extends.clone(),
        other => panic!("not a type: {other:?}"),
    };
    assert_eq!(extends_of(leaf_t), Some(Ref::Resolved(derived_t)));
    assert_eq!(extends_of(derived_t), Some(Ref::Resolved(base_t)));

    // A component typed with the leaf resolves to the same handle
    match &p.arena().get(holder_t).kind {
        EntityKind::DerivedType(dt) => {
            let item = dt.variables[0];
            match &p.arena().get(item).kind {
                EntityKind::Variable(v) => {
                    assert_eq!(v.var_type.proto, Some(Ref::Resolved(leaf_t)));
                }
                other => panic!("not a variable: {other:?}"),
            }
        }
        other => panic!("not a type: {other:?}"),
    }
}

#[test]
fn test_inheritance_cycle_is_broken() {
    let p = project(&[(
        "loopy.f90",
        "module loopy\n\
         type, extends(b) :: a\n\
         end type a\n\
         type, extends(a) :: b\n\
         end type b\n\
         end module loopy\n",
    )]);
    let loopy = module(&p, "loopy");
    let types = &p.arena().get(loopy).unit().expect("unit").types;
    let resolved = types
        .iter()
        .filter(|&&t| match &p.arena().get(t).kind {
            EntityKind::DerivedType(dt) => {
                dt.extends.as_ref().is_some_and(|r| r.is_resolved())
            }
            _ => false,
        })
        .count();
    // At least one edge of the cycle was reverted to a bare name
    assert!(resolved < types.len());
}

// ============================================================================
// Project-level failures and pruning
// ============================================================================

#[test]
fn test_module_dependency_cycle_is_fatal() {
    let mut p = Project::new(full_display()).expect("valid settings");
    p.add_source(Path::new("x.f90"), "module x\nuse y\nend module x\n")
        .expect("parse");
    p.add_source(Path::new("y.f90"), "module y\nuse x\nend module y\n")
        .expect("parse");
    match p.correlate() {
        Err(FortdocError::DependencyCycle(names)) => {
            assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
        }
        other => panic!("expected DependencyCycle, got {other:?}"),
    }
}

#[test]
fn test_duplicate_program_is_fatal() {
    let mut p = Project::new(full_display()).expect("valid settings");
    p.add_source(Path::new("a.f90"), "program main\nend program main\n")
        .expect("parse");
    p.add_source(Path::new("b.f90"), "program main\nend program main\n")
        .expect("parse");
    match p.correlate() {
        Err(FortdocError::DuplicateProgram(name)) => assert_eq!(name, "main"),
        other => panic!("expected DuplicateProgram, got {other:?}"),
    }
}

#[test]
fn test_free_procedures_resolve_by_external_linkage() {
    let p = project(&[
        (
            "util.f90",
            "subroutine util()\n\
             end subroutine util\n",
        ),
        (
            "m.f90",
            "module m\n\
             contains\n\
             subroutine run()\n\
             call util()\n\
             end subroutine run\n\
             end module m\n",
        ),
    ]);
    let util = p
        .procedures()
        .into_iter()
        .find(|&id| p.arena().get(id).name == "util")
        .expect("free procedure visible");

    let m = module(&p, "m");
    let run = subroutine(&p, m, "run");
    let calls = &p.arena().get(run).unit().expect("unit").calls;
    assert_eq!(calls[0], Ref::Resolved(util));
}

#[test]
fn test_default_display_prunes_private_entities() {
    let p = project_with(
        ProjectSettings::default(),
        &[(
            "m.f90",
            "module m\n\
             private\n\
             integer :: hidden\n\
             integer, public :: shown\n\
             type :: secret\n\
             integer :: inside\n\
             end type secret\n\
             end module m\n",
        )],
    );
    let m = module(&p, "m");
    let unit = p.arena().get(m).unit().expect("unit");
    assert_eq!(unit.variables.len(), 1);
    assert_eq!(p.arena().get(unit.variables[0]).name, "shown");
    // The private type is gone, children and all
    assert!(unit.types.is_empty());
}
