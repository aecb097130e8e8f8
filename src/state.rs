// ABOUTME: Display state for the rotating panel
// ABOUTME: Tracks the current index and which images have finished loading

use std::collections::BTreeSet;

/// Which image is current and which ones are ready to paint.
///
/// `loaded` only grows for a given image set; a new set gets a new state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    len: usize,
    current_index: usize,
    loaded: BTreeSet<usize>,
}

impl DisplayState {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            current_index: 0,
            loaded: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The current index, or `None` for an empty set
    pub fn current_index(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.current_index)
        }
    }

    /// Record a finished load. Returns false when the index was already
    /// loaded or is out of range.
    pub fn mark_loaded(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.loaded.insert(index)
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        self.loaded.contains(&index)
    }

    pub fn loaded(&self) -> impl Iterator<Item = usize> + '_ {
        self.loaded.iter().copied()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// The index the next tick moves to
    pub fn next_index(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some((self.current_index + 1) % self.len)
        }
    }

    /// Move to the next index, wrapping at the end
    pub fn advance(&mut self) -> Option<usize> {
        let next = self.next_index()?;
        self.current_index = next;
        Some(next)
    }

    /// The index being painted, if the current image is ready
    pub fn visible_index(&self) -> Option<usize> {
        self.current_index().filter(|i| self.is_loaded(*i))
    }

    /// Opacity of a layer: only the current, loaded image is opaque
    pub fn layer_opacity(&self, index: usize) -> f32 {
        if self.visible_index() == Some(index) {
            1.0
        } else {
            0.0
        }
    }

    /// Stacking order of a layer among the image layers
    pub fn layer_z_index(&self, index: usize) -> u8 {
        if self.current_index() == Some(index) {
            1
        } else {
            0
        }
    }
}
