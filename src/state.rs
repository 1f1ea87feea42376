// src/state.rs
use serde::Serialize;
use uuid::Uuid;

use crate::errors::BoothError;
use crate::models::{EncodedImage, GenerationSlot, PromptVariant, SlotStatus};
use crate::themes::TemplateKey;

pub const BATCH_RUNNING: &str = "A generation is already running.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    #[default]
    Idle,
    Validating,
    SettingUp,
    Running,
}

/// Slot array plus batch bookkeeping. Every transition replaces only the
/// targeted slot.
#[derive(Debug, Clone, Default)]
pub struct BatchState {
    pub id: Option<Uuid>,
    pub theme: Option<TemplateKey>,
    pub phase: BatchPhase,
    pub slots: Vec<GenerationSlot>,
    pub album_style: Option<String>,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.phase != BatchPhase::Idle
    }

    pub fn begin_validation(&mut self) -> Result<(), BoothError> {
        if self.is_busy() {
            return Err(BoothError::Validation(BATCH_RUNNING.to_string()));
        }
        self.phase = BatchPhase::Validating;
        Ok(())
    }

    /// Single-slot rerun of the current batch; skips validation and setup.
    pub fn begin_regeneration(&mut self) -> Result<(), BoothError> {
        if self.is_busy() {
            return Err(BoothError::Validation(BATCH_RUNNING.to_string()));
        }
        self.phase = BatchPhase::Running;
        Ok(())
    }

    /// Starts a new batch. Previous slots and album style are dropped.
    pub fn begin_setup(&mut self, id: Uuid, theme: TemplateKey) {
        self.id = Some(id);
        self.theme = Some(theme);
        self.album_style = None;
        self.slots.clear();
        self.phase = BatchPhase::SettingUp;
    }

    pub fn begin_run(&mut self, variants: &[PromptVariant]) {
        self.slots = variants
            .iter()
            .map(|variant| GenerationSlot::pending(variant.id.clone()))
            .collect();
        self.phase = BatchPhase::Running;
    }

    pub fn finish(&mut self) {
        self.phase = BatchPhase::Idle;
    }

    /// Drops every slot, e.g. after a new source photo.
    pub fn clear(&mut self) {
        self.id = None;
        self.theme = None;
        self.album_style = None;
        self.slots.clear();
    }

    fn pending_slot(&mut self, index: usize) -> Result<&mut GenerationSlot, BoothError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| BoothError::Validation(format!("No slot at position {}", index)))?;
        if slot.status != SlotStatus::Pending {
            return Err(BoothError::Validation(format!(
                "Slot {} is already {}",
                index, slot.status
            )));
        }
        Ok(slot)
    }

    pub fn mark_success(&mut self, index: usize, image: EncodedImage) -> Result<(), BoothError> {
        let slot = self.pending_slot(index)?;
        slot.status = SlotStatus::Success;
        slot.image = Some(image);
        slot.error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, index: usize, error: impl Into<String>) -> Result<(), BoothError> {
        let slot = self.pending_slot(index)?;
        slot.status = SlotStatus::Failed;
        slot.image = None;
        slot.error = Some(error.into());
        Ok(())
    }

    /// Puts one slot back to `pending` ahead of regeneration.
    pub fn reset_pending(&mut self, index: usize) -> Result<(), BoothError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| BoothError::Validation(format!("No slot at position {}", index)))?;
        slot.status = SlotStatus::Pending;
        slot.image = None;
        slot.error = None;
        Ok(())
    }

    pub fn count(&self, status: SlotStatus) -> usize {
        self.slots.iter().filter(|s| s.status == status).count()
    }

    /// Fraction of slots no longer pending, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        (self.slots.len() - self.count(SlotStatus::Pending)) as f64 / self.slots.len() as f64
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &EncodedImage)> {
        self.slots.iter().filter_map(|slot| match (&slot.status, &slot.image) {
            (SlotStatus::Success, Some(image)) => Some((slot.variant_id.as_str(), image)),
            _ => None,
        })
    }
}
