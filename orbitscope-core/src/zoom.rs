use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::error::CoreError;

/// History of the regions zoomed into, root first.
///
/// Never empty: the root bounds stay at the bottom and cannot be popped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bounds>", into = "Vec<Bounds>")]
pub struct ZoomStack {
    entries: Vec<Bounds>,
}

impl ZoomStack {
    pub fn new(root: Bounds) -> Self {
        Self {
            entries: vec![root],
        }
    }

    pub fn from_entries(entries: Vec<Bounds>) -> crate::Result<Self> {
        if entries.is_empty() {
            return Err(CoreError::EmptyZoomStack);
        }
        Ok(Self { entries })
    }

    pub fn push(&mut self, bounds: Bounds) {
        self.entries.push(bounds);
    }

    /// Drop the current region and return it. The root is never popped.
    pub fn pop(&mut self) -> Option<Bounds> {
        if self.entries.len() > 1 {
            self.entries.pop()
        } else {
            None
        }
    }

    pub fn current(&self) -> Bounds {
        self.entries[self.entries.len() - 1]
    }

    pub fn root(&self) -> Bounds {
        self.entries[0]
    }

    /// Discard the history and start again from `root`.
    pub fn reset(&mut self, root: Bounds) {
        self.entries.clear();
        self.entries.push(root);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; present for symmetry with [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_at_root(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bounds> {
        self.entries.iter()
    }
}

impl TryFrom<Vec<Bounds>> for ZoomStack {
    type Error = CoreError;

    fn try_from(entries: Vec<Bounds>) -> crate::Result<Self> {
        Self::from_entries(entries)
    }
}

impl From<ZoomStack> for Vec<Bounds> {
    fn from(stack: ZoomStack) -> Self {
        stack.entries
    }
}
