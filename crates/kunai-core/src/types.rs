use serde::{Deserialize, Serialize};

/// Calendar folder type as reported by the folder resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderType {
    /// A user's personal calendar folder.
    Private,
    /// Another user's personal folder accessed through a share.
    Shared,
    /// A public folder not owned by any single calendar user.
    Public,
}

impl FolderType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Shared => "shared",
            Self::Public => "public",
        }
    }
}

impl std::fmt::Display for FolderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
