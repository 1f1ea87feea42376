// src/services/orchestrator.rs
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::BoothError;
use crate::models::{
    EncodedImage, GenerationOptions, GenerationSlot, LookbookStyle, PromptVariant, SlotStatus,
    SourceImage,
};
use crate::services::generation_client::GenerationClient;
use crate::services::image_processor::ImageProcessor;
use crate::services::packaging::filename_slug;
use crate::services::prompt_builder::build_instruction;
use crate::services::quota::{DailyQuota, QUOTA_EXHAUSTED};
use crate::state::BatchState;
use crate::themes::{TemplateKey, Theme, ThemeRequirement, find_theme};

pub const MISSING_SOURCE: &str = "Please upload a photo!";
pub const MISSING_THEME: &str = "Please select a theme!";
pub const MISSING_LOOKBOOK_STYLE: &str = "Please choose or enter a fashion style!";
pub const MISSING_HAIRSTYLE: &str = "Please select at least one hairstyle!";
pub const TOO_MANY_HAIRSTYLES: &str = "You can select a maximum of 6 styles.";
pub const TOO_MANY_HAIR_COLORS: &str = "You can choose at most 2 hair colors.";
pub const DUPLICATE_HAIRSTYLE: &str = "That custom style duplicates a selected hairstyle.";
pub const MISSING_CELEBRITY: &str = "Please enter the name of the celebrity!";
pub const REGENERATE_MISSING_PROMPT: &str = "Could not find the prompt to regenerate.";

pub const MAX_HAIRSTYLES: usize = 6;
pub const MAX_HAIR_COLORS: usize = 2;

/// Everything the presentation layer holds between calls.
#[derive(Debug, Clone, Default)]
pub struct BoothSession {
    pub source: Option<SourceImage>,
    pub theme: Option<TemplateKey>,
    pub options: GenerationOptions,
    pub batch: BatchState,
}

impl BoothSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the photo and drops every slot from the previous one.
    pub fn set_source(&mut self, source: SourceImage) {
        debug!("New source image {} ({}x{})", source.id, source.width, source.height);
        self.source = Some(source);
        self.batch.clear();
    }

    /// Selecting a theme starts from default options.
    pub fn select_theme(&mut self, key: TemplateKey) {
        self.theme = Some(key);
        self.options = GenerationOptions::default();
    }
}

/// Progress callbacks. All methods default to no-ops.
pub trait BatchObserver: Send {
    fn batch_started(&mut self, _batch_id: Uuid, _theme: &Theme, _total: usize) {}

    fn slot_updated(&mut self, _index: usize, _slot: &GenerationSlot, _progress: f64) {}
}

pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub theme: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub album_style: Option<String>,
}

/// The variants a batch runs for `theme` under the given options. Hairstyles
/// are narrowed to the selection (catalogue order) and the custom style, if
/// any, is appended.
pub fn active_variants(theme: &Theme, options: &GenerationOptions) -> Vec<PromptVariant> {
    match theme.requirement {
        ThemeRequirement::Hairstyle => {
            let mut variants: Vec<PromptVariant> = theme
                .prompts
                .iter()
                .filter(|p| options.selected_hairstyles.iter().any(|s| s == &p.id))
                .cloned()
                .collect();
            if let Some(custom) = options.custom_hairstyle() {
                variants.push(PromptVariant::new(custom, custom));
            }
            variants
        }
        _ => theme.prompts.clone(),
    }
}

fn reject(reason: &str) -> BoothError {
    BoothError::Validation(reason.to_string())
}

/// Checks the session has everything `theme` needs. No side effects.
pub fn validate_selection(session: &BoothSession) -> Result<&'static Theme, BoothError> {
    if session.source.is_none() {
        return Err(reject(MISSING_SOURCE));
    }
    let theme = session
        .theme
        .as_ref()
        .and_then(find_theme)
        .ok_or_else(|| reject(MISSING_THEME))?;
    let options = &session.options;

    match theme.requirement {
        ThemeRequirement::None => {}
        ThemeRequirement::LookbookStyle => match &options.lookbook_style {
            Some(LookbookStyle::Preset(style)) if theme.styles.contains(&style.as_str()) => {}
            Some(LookbookStyle::Custom(text)) if !text.trim().is_empty() => {}
            _ => return Err(reject(MISSING_LOOKBOOK_STYLE)),
        },
        ThemeRequirement::Hairstyle => {
            let variants = active_variants(theme, options);
            if variants.is_empty() {
                return Err(reject(MISSING_HAIRSTYLE));
            }
            if variants.len() > MAX_HAIRSTYLES {
                return Err(reject(TOO_MANY_HAIRSTYLES));
            }
            if options.hair_colors.len() > MAX_HAIR_COLORS {
                return Err(reject(TOO_MANY_HAIR_COLORS));
            }
            if let Some(custom) = options.custom_hairstyle() {
                let slug = filename_slug(custom);
                let collides = theme
                    .prompts
                    .iter()
                    .filter(|p| options.selected_hairstyles.contains(&p.id))
                    .any(|p| filename_slug(&p.id) == slug);
                if collides {
                    return Err(reject(DUPLICATE_HAIRSTYLE));
                }
            }
        }
        ThemeRequirement::CelebrityName => {
            if options.celebrity_name().is_none() {
                return Err(reject(MISSING_CELEBRITY));
            }
        }
    }
    Ok(theme)
}

pub struct Orchestrator {
    client: GenerationClient,
    quota: DailyQuota,
    processor: Arc<ImageProcessor>,
}

impl Orchestrator {
    pub fn new(client: GenerationClient, quota: DailyQuota, processor: Arc<ImageProcessor>) -> Self {
        Self {
            client,
            quota,
            processor,
        }
    }

    pub fn quota(&self) -> &DailyQuota {
        &self.quota
    }

    /// Validates, debits the quota, optionally fetches the shared style, then
    /// runs every slot in order. A credential rejection stops the loop and is
    /// returned as the error; the slots after it stay pending.
    pub async fn start_batch(
        &self,
        session: &mut BoothSession,
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchReport, BoothError> {
        session.batch.begin_validation()?;
        let result = self.run_batch(session, observer).await;
        session.batch.finish();
        result
    }

    async fn run_batch(
        &self,
        session: &mut BoothSession,
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchReport, BoothError> {
        if self.quota.remaining(Utc::now()).await? == 0 {
            return Err(reject(QUOTA_EXHAUSTED));
        }
        let theme = validate_selection(session)?;
        let source = session
            .source
            .clone()
            .ok_or_else(|| reject(MISSING_SOURCE))?;

        let quota = self.quota.debit(Utc::now()).await?;
        info!("Quota debited; {} generation(s) left today", quota.remaining);

        let batch_id = Uuid::new_v4();
        session.batch.begin_setup(batch_id, theme.key.clone());

        let mut options = session.options.clone();
        if let Some(brief) = theme.shared_style_brief {
            let style = self.client.describe(brief).await;
            debug!("Shared album style: {}", style);
            options.album_style = Some(style.clone());
            session.batch.album_style = Some(style);
        }

        let variants = active_variants(theme, &options);
        session.batch.begin_run(&variants);
        info!(
            "Starting batch {} for theme {} with {} slot(s)",
            batch_id,
            theme.key,
            variants.len()
        );
        observer.batch_started(batch_id, theme, variants.len());

        for (index, variant) in variants.iter().enumerate() {
            match self.run_slot(theme, variant, &options, &source).await {
                Ok(image) => session.batch.mark_success(index, image)?,
                Err(e) if e.is_fatal() => {
                    error!("Batch {} aborted at slot {}: {}", batch_id, index, e);
                    session.batch.mark_failed(index, e.notification())?;
                    observer.slot_updated(index, &session.batch.slots[index], session.batch.progress());
                    return Err(e);
                }
                Err(e) => session.batch.mark_failed(index, e.to_string())?,
            }
            let slot = &session.batch.slots[index];
            debug!("Slot {} ({}) -> {}", index, slot.variant_id, slot.status);
            observer.slot_updated(index, slot, session.batch.progress());
        }

        let report = BatchReport {
            batch_id,
            theme: theme.key.to_string(),
            total: variants.len(),
            succeeded: session.batch.count(SlotStatus::Success),
            failed: session.batch.count(SlotStatus::Failed),
            album_style: session.batch.album_style.clone(),
        };
        info!(
            "Batch {} finished: {} succeeded, {} failed",
            batch_id, report.succeeded, report.failed
        );
        Ok(report)
    }

    /// Reruns one slot against the current theme and options. Siblings are
    /// untouched and no quota is consumed. When the current options no longer
    /// yield the slot's variant at `index`, the slot fails without a call.
    pub async fn regenerate(
        &self,
        session: &mut BoothSession,
        index: usize,
        observer: &mut dyn BatchObserver,
    ) -> Result<GenerationSlot, BoothError> {
        session.batch.begin_regeneration()?;
        let result = self.rerun_slot(session, index, observer).await;
        session.batch.finish();
        result
    }

    async fn rerun_slot(
        &self,
        session: &mut BoothSession,
        index: usize,
        observer: &mut dyn BatchObserver,
    ) -> Result<GenerationSlot, BoothError> {
        session.batch.reset_pending(index)?;
        observer.slot_updated(index, &session.batch.slots[index], session.batch.progress());

        let expected_id = session.batch.slots[index].variant_id.clone();
        let mut options = session.options.clone();
        options.album_style = session.batch.album_style.clone();

        let theme = session.theme.as_ref().and_then(find_theme);
        let variant = theme.and_then(|theme| {
            active_variants(theme, &options)
                .into_iter()
                .nth(index)
                .filter(|variant| variant.id == expected_id)
                .map(|variant| (theme, variant))
        });

        let outcome = match (variant, session.source.as_ref()) {
            (Some((theme, variant)), Some(source)) => {
                debug!("Regenerating slot {} ({})", index, variant.id);
                Some(self.run_slot(theme, &variant, &options, source).await)
            }
            _ => None,
        };

        let fatal = match outcome {
            None => {
                session.batch.mark_failed(index, REGENERATE_MISSING_PROMPT)?;
                None
            }
            Some(Ok(image)) => {
                session.batch.mark_success(index, image)?;
                None
            }
            Some(Err(e)) if e.is_fatal() => {
                error!("Regeneration of slot {} rejected: {}", index, e);
                session.batch.mark_failed(index, e.notification())?;
                Some(e)
            }
            Some(Err(e)) => {
                session.batch.mark_failed(index, e.to_string())?;
                None
            }
        };

        let slot = session.batch.slots[index].clone();
        observer.slot_updated(index, &slot, session.batch.progress());
        match fatal {
            Some(e) => Err(e),
            None => Ok(slot),
        }
    }

    async fn run_slot(
        &self,
        theme: &Theme,
        variant: &PromptVariant,
        options: &GenerationOptions,
        source: &SourceImage,
    ) -> Result<EncodedImage, BoothError> {
        let instruction = build_instruction(&theme.key, variant, options);
        let generated = self.client.generate(&instruction, source).await?;
        self.processor.add_watermark(&generated)
    }
}
