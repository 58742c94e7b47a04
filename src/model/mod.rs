//! The entity model: arena-allocated, typed tree of everything declared in
//! the project's source, from source files down to individual variables.
//!
//! The parser builds one tree per file; the correlation engine then rewrites
//! the tree's [`Ref`] cells from raw names to arena handles. After
//! correlation and pruning the model is read-only.

mod arena;
pub mod entity;
mod permission;
mod refs;

pub use arena::{EntityArena, EntityId};
pub use entity::{Entity, EntityKind};
pub use permission::Permission;
pub use refs::{Ref, Use, UseItem};

/// Build the stable identifier of an entity: its lower-cased name prefixed
/// by the lower-cased names of its enclosing code units, joined with `~`.
/// Suitable for building a filesystem path or URL fragment, and unique as
/// long as sibling names are unique.
pub fn ident(arena: &EntityArena, id: EntityId) -> String {
    let mut parts = vec![crate::base::fold_name(&arena.get(id).name)];
    let mut current = arena.get(id).parent;
    while let Some(pid) = current {
        let entity = arena.get(pid);
        // The source file is not part of an entity's identity
        if !matches!(entity.kind, EntityKind::SourceFile(_)) {
            parts.push(crate::base::fold_name(&entity.name));
        }
        current = entity.parent;
    }
    parts.reverse();
    parts.join("~")
}
