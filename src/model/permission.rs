/// Visibility of a declared symbol.
///
/// A symbol with no explicit visibility keyword inherits the ambient
/// visibility of its enclosing scope at the point of declaration; the parser
/// tracks that ambient state and stamps each entity as it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Permission {
    #[default]
    Public,
    Private,
    /// Readable from outside the module but only writable inside it.
    /// Treated as exported for correlation purposes.
    Protected,
}

impl Permission {
    /// Whether a symbol with this permission is part of its module's
    /// exported symbol tables.
    pub fn is_exported(self) -> bool {
        matches!(self, Self::Public | Self::Protected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = ();

    /// Parses the lower-cased keyword form only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "protected" => Ok(Self::Protected),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
