#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use uuid::Uuid;

use themebooth::config::{Branding, RetryPolicy};
use themebooth::errors::BoothError;
use themebooth::models::{EncodedImage, GenerationOptions, GenerationSlot};
use themebooth::services::gemini_service::GenerationBackend;
use themebooth::services::generation_client::GenerationClient;
use themebooth::services::image_processor::ImageProcessor;
use themebooth::services::orchestrator::{BatchObserver, BoothSession, Orchestrator};
use themebooth::services::quota::{DailyQuota, MemoryQuotaStore};
use themebooth::services::typography::Typeface;
use themebooth::themes::{TemplateKey, Theme};

pub const INVALID_KEY: &str =
    "Gemini API error status 400 Bad Request: API key not valid. Please pass a valid API key.";

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)
        .unwrap();
    out
}

type ImageReply = dyn Fn(&str) -> Result<Vec<EncodedImage>, BoothError> + Send + Sync;
type TextReply = dyn Fn() -> Result<String, BoothError> + Send + Sync;

/// Backend whose replies are decided per instruction.
pub struct StubBackend {
    on_image: Box<ImageReply>,
    on_text: Box<TextReply>,
    pub image_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
    pub instructions: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn new(
        on_image: impl Fn(&str) -> Result<Vec<EncodedImage>, BoothError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_image: Box::new(on_image),
            on_text: Box::new(|| Ok("Neon pastel laser grid with chrome props.".to_string())),
            image_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            instructions: Mutex::new(Vec::new()),
        }
    }

    pub fn always_succeeds() -> Self {
        Self::new(|_| Ok(vec![generated()]))
    }

    pub fn with_text(
        mut self,
        on_text: impl Fn() -> Result<String, BoothError> + Send + Sync + 'static,
    ) -> Self {
        self.on_text = Box::new(on_text);
        self
    }

    pub fn calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst) + self.text_calls.load(Ordering::SeqCst)
    }

    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate_images(
        &self,
        instruction: &str,
        _source: &EncodedImage,
    ) -> Result<Vec<EncodedImage>, BoothError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.instructions
            .lock()
            .unwrap()
            .push(instruction.to_string());
        (self.on_image)(instruction)
    }

    async fn generate_text(&self, _prompt: &str) -> Result<String, BoothError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        (self.on_text)()
    }
}

pub fn generated() -> EncodedImage {
    EncodedImage::png(png(40, 30))
}

pub fn processor() -> Arc<ImageProcessor> {
    Arc::new(ImageProcessor::new(
        Typeface::bundled().unwrap(),
        Branding::default(),
    ))
}

pub fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
    }
}

pub struct Harness {
    pub backend: Arc<StubBackend>,
    pub store: Arc<MemoryQuotaStore>,
    pub orchestrator: Orchestrator,
}

pub fn harness(backend: StubBackend, store: MemoryQuotaStore, limit: u32) -> Harness {
    let backend = Arc::new(backend);
    let store = Arc::new(store);
    let client = GenerationClient::new(backend.clone(), quick_retry());
    let quota = DailyQuota::new(store.clone(), limit);
    let orchestrator = Orchestrator::new(client, quota, processor());
    Harness {
        backend,
        store,
        orchestrator,
    }
}

pub fn session(theme: TemplateKey, options: GenerationOptions) -> BoothSession {
    let mut session = BoothSession::new();
    let source = processor().decode_upload(&png(64, 48), Some("image/png")).unwrap();
    session.set_source(source);
    session.select_theme(theme);
    session.options = options;
    session
}

/// Records what the orchestrator reported.
#[derive(Default)]
pub struct Recorder {
    pub started: Option<(Uuid, usize)>,
    pub updates: Vec<(usize, GenerationSlot, f64)>,
}

impl BatchObserver for Recorder {
    fn batch_started(&mut self, batch_id: Uuid, _theme: &Theme, total: usize) {
        self.started = Some((batch_id, total));
    }

    fn slot_updated(&mut self, index: usize, slot: &GenerationSlot, progress: f64) {
        self.updates.push((index, slot.clone(), progress));
    }
}
