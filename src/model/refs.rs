use smol_str::SmolStr;

use super::arena::EntityId;

/// A reference from one entity to another, by name until correlation.
///
/// Every cross-entity link in the model (use targets, call targets,
/// `extends` parents, binding targets, interface members) starts life as
/// `Unresolved` carrying the bare name from the source, and is rewritten
/// exactly once by the correlation engine - either to a `Resolved` arena
/// handle or, for well-known intrinsic modules, to an `External` link.
/// References that never resolve (calls into libraries outside the project)
/// simply stay `Unresolved`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    Unresolved(SmolStr),
    Resolved(EntityId),
    External { name: SmolStr, url: String },
}

impl Ref {
    pub fn unresolved(name: impl Into<SmolStr>) -> Self {
        Self::Unresolved(name.into())
    }

    /// The raw name, if this reference has not been resolved.
    pub fn pending_name(&self) -> Option<&str> {
        match self {
            Self::Unresolved(name) => Some(name),
            _ => None,
        }
    }

    pub fn resolved(&self) -> Option<EntityId> {
        match self {
            Self::Resolved(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Display name regardless of resolution state. Resolved refs have
    /// their name looked up through the arena instead.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Unresolved(name) | Self::External { name, .. } => Some(name),
            Self::Resolved(_) => None,
        }
    }
}

/// One `use` statement, kept verbatim until correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Use {
    pub module: Ref,
    /// `Some` when an `only:` clause restricts the import.
    pub only: Option<Vec<UseItem>>,
    /// Renames outside an `only` clause (`use m, local => remote`).
    pub renames: Vec<UseItem>,
}

/// One item of an only-list or rename-list.
///
/// A plain `only: x` entry has `local == remote`; a rename
/// `only: x => y` imports `y` under the name `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseItem {
    pub local: SmolStr,
    pub remote: SmolStr,
}

impl UseItem {
    pub fn plain(name: impl Into<SmolStr>) -> Self {
        let name = name.into();
        Self {
            local: name.clone(),
            remote: name,
        }
    }

    pub fn renamed(local: impl Into<SmolStr>, remote: impl Into<SmolStr>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    pub fn is_rename(&self) -> bool {
        self.local != self.remote
    }
}
