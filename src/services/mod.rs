// src/services/mod.rs
pub mod gemini_service;
pub mod generation_client;
pub mod image_processor;
pub mod orchestrator;
pub mod packaging;
pub mod prompt_builder;
pub mod quota;
pub mod redis_service;
pub mod typography;

pub use gemini_service::{GeminiService, GenerationBackend};
pub use generation_client::GenerationClient;
pub use image_processor::ImageProcessor;
pub use orchestrator::{BatchObserver, BatchReport, BoothSession, Orchestrator};
pub use quota::{DailyQuota, FileQuotaStore, MemoryQuotaStore, QuotaStore};
pub use redis_service::RedisQuotaStore;
