// src/handlers.rs
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::cli::GenerateArgs;
use crate::config::BoothConfig;
use crate::errors::BoothError;
use crate::models::{GenerationSlot, SlotStatus};
use crate::services::gemini_service::GeminiService;
use crate::services::generation_client::GenerationClient;
use crate::services::image_processor::ImageProcessor;
use crate::services::orchestrator::{BatchObserver, BoothSession, Orchestrator};
use crate::services::packaging::{self, NOTHING_TO_PACKAGE};
use crate::services::quota::{DailyQuota, FileQuotaStore, QuotaStore};
use crate::services::redis_service::RedisQuotaStore;
use crate::services::typography::Typeface;
use crate::themes::{CATALOGUE, TemplateKey, Theme, find_theme};

/// Prints slot transitions as they happen.
pub struct ConsoleObserver;

impl BatchObserver for ConsoleObserver {
    fn batch_started(&mut self, batch_id: Uuid, theme: &Theme, total: usize) {
        println!("{} ({}): {} image(s), batch {}", theme.name, theme.key, total, batch_id);
    }

    fn slot_updated(&mut self, index: usize, slot: &GenerationSlot, progress: f64) {
        let detail = match (&slot.status, &slot.error) {
            (SlotStatus::Failed, Some(error)) => format!(" - {}", error),
            _ => String::new(),
        };
        println!(
            "[{:>3.0}%] #{} {}: {}{}",
            progress * 100.0,
            index + 1,
            slot.variant_id,
            slot.status,
            detail
        );
    }
}

pub async fn quota_store(config: &BoothConfig) -> Result<Arc<dyn QuotaStore>, BoothError> {
    match &config.redis_url {
        Some(url) => {
            info!("Using Redis for the daily quota");
            Ok(Arc::new(RedisQuotaStore::new(url).await?))
        }
        None => {
            let store = FileQuotaStore::new(&config.quota_file);
            debug!("Using {} for the daily quota", store.path().display());
            Ok(Arc::new(store))
        }
    }
}

pub fn list_themes() {
    for theme in CATALOGUE.iter() {
        let card = if theme.polaroid { " [polaroid]" } else { "" };
        println!("{:<18} {} - {}{}", theme.key, theme.name, theme.description, card);
        let variants: Vec<&str> = theme.prompts.iter().map(|p| p.id.as_str()).collect();
        println!("{:<18} variants: {}", "", variants.join(", "));
        if !theme.styles.is_empty() {
            println!("{:<18} styles: {}", "", theme.styles.join(", "));
        }
    }
}

pub async fn show_quota(config: &BoothConfig) -> Result<(), BoothError> {
    let quota = DailyQuota::new(quota_store(config).await?, config.daily_limit);
    let status = quota.status(Utc::now()).await?;
    println!("{} of {} generation(s) left today", status.remaining, quota.max());
    if let Some(at) = status.resets_at {
        println!("Resets at {}", at.to_rfc3339());
    }
    Ok(())
}

/// Runs one batch and saves what succeeded. The batch error, if any, is
/// returned after the successful images have been written.
pub async fn generate(config: &BoothConfig, args: &GenerateArgs) -> Result<(), BoothError> {
    let processor = Arc::new(ImageProcessor::new(
        Typeface::discover(config.font.as_deref())?,
        config.branding.clone(),
    ));
    let source = processor.read_upload(&args.photo)?;

    let backend = Arc::new(GeminiService::new(config)?);
    let client = GenerationClient::new(backend, config.retry);
    let quota = DailyQuota::new(quota_store(config).await?, config.daily_limit);
    let orchestrator = Orchestrator::new(client, quota, processor.clone());

    let mut session = BoothSession::new();
    session.set_source(source);
    let Ok(key) = args.theme.parse::<TemplateKey>();
    session.select_theme(key);
    session.options = args.options();

    let mut observer = ConsoleObserver;
    let mut outcome = orchestrator
        .start_batch(&mut session, &mut observer)
        .await
        .map(|report| {
            println!("{} succeeded, {} failed", report.succeeded, report.failed);
        });

    if outcome.is_ok() && args.retry_failed {
        outcome = retry_failed(&orchestrator, &mut session, &mut observer).await;
    }

    if let Some(theme) = session.theme.as_ref().and_then(find_theme) {
        save_outputs(config, &processor, theme, &session, args).await?;
    }
    outcome
}

async fn retry_failed(
    orchestrator: &Orchestrator,
    session: &mut BoothSession,
    observer: &mut ConsoleObserver,
) -> Result<(), BoothError> {
    let failed: Vec<usize> = session
        .batch
        .slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.status == SlotStatus::Failed)
        .map(|(index, _)| index)
        .collect();

    for index in failed {
        orchestrator.regenerate(session, index, observer).await?;
    }
    Ok(())
}

async fn save_outputs(
    config: &BoothConfig,
    processor: &ImageProcessor,
    theme: &Theme,
    session: &BoothSession,
    args: &GenerateArgs,
) -> Result<(), BoothError> {
    let prefix = &config.branding.file_prefix;

    for (variant_id, image) in session.batch.successes() {
        let label = theme.labelled_frame.then_some(variant_id);
        let download = packaging::single_download(processor, variant_id, image, args.frame, label)?;
        let path = config.out_dir.join(&download.file_name);
        packaging::write_output(&path, &download.image.data).await?;
        println!("Saved {}", path.display());
    }

    if args.album {
        match packaging::build_album(&session.batch.slots, prefix)? {
            Some(album) => {
                let path = config.out_dir.join(&album.file_name);
                packaging::write_output(&path, &album.bytes).await?;
                println!("Saved {} ({} image(s))", path.display(), album.entries.len());
            }
            None => warn!("{}", NOTHING_TO_PACKAGE),
        }
    }
    Ok(())
}
