//! Texture-unit bookkeeping for one batch.
//!
//! The table maps each texture used by the pending batch to a sampler
//! slot. It issues no GPU calls itself: [`TextureUnitTable::bind`] reports
//! what the caller must do, and the compositor acts on it.
//!
//! Two views are tracked. Batch assignments are cleared on every flush.
//! Residency (which texture the GPU unit currently holds) survives flushes,
//! so a texture that lands on the same unit in the next batch needs no
//! rebind.

use std::collections::HashMap;

use crate::texture::TextureId;

/// Outcome of [`TextureUnitTable::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitBinding {
    /// Already assigned in this batch; nothing to do.
    Reused(usize),
    /// Newly assigned. When `needs_bind` is set the GPU unit holds a
    /// different texture and the caller must bind this one.
    Assigned { unit: usize, needs_bind: bool },
    /// Every unit is taken by this batch. Flush, then bind again.
    Exhausted,
}

impl UnitBinding {
    /// The unit index, unless exhausted.
    pub fn unit(self) -> Option<usize> {
        match self {
            UnitBinding::Reused(unit) | UnitBinding::Assigned { unit, .. } => Some(unit),
            UnitBinding::Exhausted => None,
        }
    }
}

#[derive(Debug)]
pub struct TextureUnitTable {
    batch: HashMap<TextureId, usize>,
    resident: Vec<Option<TextureId>>,
}

impl TextureUnitTable {
    /// Creates a table for `units` sampler slots (at least one).
    pub fn new(units: usize) -> Self {
        Self {
            batch: HashMap::new(),
            resident: vec![None; units.max(1)],
        }
    }

    /// Resolves the unit for `texture` in the current batch.
    ///
    /// Units are handed out in order `0, 1, 2, ...`; the same texture gets
    /// the same unit for the rest of the batch.
    pub fn bind(&mut self, texture: TextureId) -> UnitBinding {
        if let Some(&unit) = self.batch.get(&texture) {
            return UnitBinding::Reused(unit);
        }
        let unit = self.batch.len();
        if unit >= self.resident.len() {
            return UnitBinding::Exhausted;
        }
        self.batch.insert(texture, unit);
        let needs_bind = self.resident[unit] != Some(texture);
        self.resident[unit] = Some(texture);
        UnitBinding::Assigned { unit, needs_bind }
    }

    /// Clears batch assignments. Called right after a flush.
    pub fn reset(&mut self) {
        self.batch.clear();
    }

    /// Clears batch assignments and residency, as after a context loss.
    pub fn invalidate(&mut self) {
        self.batch.clear();
        self.resident.iter_mut().for_each(|slot| *slot = None);
    }

    /// Drops residency for a texture that no longer exists on the GPU.
    pub fn forget(&mut self, texture: TextureId) {
        for slot in self.resident.iter_mut().filter(|s| **s == Some(texture)) {
            *slot = None;
        }
    }

    /// The unit `texture` holds in the current batch.
    pub fn unit_of(&self, texture: TextureId) -> Option<usize> {
        self.batch.get(&texture).copied()
    }

    /// Units assigned in the current batch.
    pub fn assigned(&self) -> usize {
        self.batch.len()
    }

    pub fn capacity(&self) -> usize {
        self.resident.len()
    }
}
