use std::collections::HashMap;

use super::{
    AGE_INODE, DIR_INODE, Dirent, HELLO_INODE, HELLO_WORLD, InodeAttributes, InodeId, InodeInfo,
    ROOT_INODE, WEEKDAY_INODE, WORLD_INODE,
};
use crate::error::{Error, Result};

/// Immutable inode id -> metadata map rooted at `ROOT_INODE`.
#[derive(Clone, Debug)]
pub struct InodeTable {
    nodes: HashMap<InodeId, InodeInfo>,
}

impl InodeTable {
    /// The namespace every process starts with:
    ///
    /// ```text
    /// /
    /// ├── hello
    /// ├── dir/
    /// │   └── world
    /// ├── age
    /// └── weekday
    /// ```
    pub fn standard() -> Self {
        InodeTableBuilder::new()
            .file(ROOT_INODE, HELLO_INODE, "hello", 0o444, 0)
            .dir(ROOT_INODE, DIR_INODE, "dir", 0o555)
            .file(DIR_INODE, WORLD_INODE, "world", 0o444, HELLO_WORLD.len() as u64)
            .file(ROOT_INODE, AGE_INODE, "age", 0o444, 0)
            .file(ROOT_INODE, WEEKDAY_INODE, "weekday", 0o444, 0)
            .build()
            .expect("standard inode table is well formed")
    }

    pub fn get(&self, ino: InodeId) -> Option<&InodeInfo> {
        self.nodes.get(&ino)
    }

    pub fn attributes_of(&self, ino: InodeId) -> Result<InodeAttributes> {
        self.get(ino)
            .map(|info| info.attributes)
            .ok_or(Error::InodeNotFound(ino))
    }

    /// First child of `parent` whose name is exactly `name`.
    pub fn resolve(&self, parent: InodeId, name: &str) -> Result<InodeId> {
        let not_found = || Error::NameNotFound {
            parent,
            name: name.to_string(),
        };
        let info = self.get(parent).ok_or_else(not_found)?;
        if !info.is_dir() {
            return Err(not_found());
        }
        info.children
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.ino)
            .ok_or_else(not_found)
    }

    pub fn children(&self, ino: InodeId) -> Result<&[Dirent]> {
        let info = self.get(ino).ok_or(Error::InodeNotFound(ino))?;
        if !info.is_dir() {
            return Err(Error::NotADirectory(ino));
        }
        Ok(&info.children)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builds an `InodeTable` one node at a time.
///
/// Nodes are attached to their parent as they are added, which keeps the
/// result a tree: no node without a parent, none with two. The first error
/// sticks and is returned from `build`.
#[derive(Debug)]
pub struct InodeTableBuilder {
    nodes: HashMap<InodeId, InodeInfo>,
    error: Option<Error>,
}

impl InodeTableBuilder {
    /// Starts from a read-only root directory.
    pub fn new() -> Self {
        Self::with_root(InodeAttributes::dir(0o555))
    }

    pub fn with_root(attributes: InodeAttributes) -> Self {
        let mut nodes = HashMap::new();
        let error = (!attributes.is_dir())
            .then(|| Error::InvalidTable("root inode must be a directory".into()));
        nodes.insert(
            ROOT_INODE,
            InodeInfo {
                attributes,
                children: Vec::new(),
            },
        );
        Self { nodes, error }
    }

    pub fn dir(self, parent: InodeId, ino: InodeId, name: &str, perm: u16) -> Self {
        self.add(parent, ino, name, InodeAttributes::dir(perm))
    }

    pub fn file(self, parent: InodeId, ino: InodeId, name: &str, perm: u16, size: u64) -> Self {
        self.add(parent, ino, name, InodeAttributes::file(perm, size))
    }

    pub fn add(
        mut self,
        parent: InodeId,
        ino: InodeId,
        name: &str,
        attributes: InodeAttributes,
    ) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.try_add(parent, ino, name, attributes) {
                self.error = Some(e);
            }
        }
        self
    }

    fn try_add(
        &mut self,
        parent: InodeId,
        ino: InodeId,
        name: &str,
        attributes: InodeAttributes,
    ) -> Result<()> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidTable(format!("bad entry name {name:?}")));
        }
        if self.nodes.contains_key(&ino) {
            return Err(Error::InvalidTable(format!("inode {ino} defined twice")));
        }
        let parent_info = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| Error::InvalidTable(format!("parent inode {parent} is unknown")))?;
        if !parent_info.is_dir() {
            return Err(Error::InvalidTable(format!(
                "parent inode {parent} is not a directory"
            )));
        }
        if parent_info.children.iter().any(|e| e.name == name) {
            return Err(Error::InvalidTable(format!(
                "inode {parent} already has an entry named {name:?}"
            )));
        }
        let offset = parent_info.children.len() as u64 + 1;
        parent_info.children.push(Dirent {
            offset,
            ino,
            name: name.to_string(),
            kind: attributes.kind,
        });
        self.nodes.insert(
            ino,
            InodeInfo {
                attributes,
                children: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn build(self) -> Result<InodeTable> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(InodeTable { nodes: self.nodes }),
        }
    }
}

impl Default for InodeTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
