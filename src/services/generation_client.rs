// src/services/generation_client.rs
use std::sync::Arc;

use log::{debug, error, warn};
use tokio::time::sleep;

use crate::config::RetryPolicy;
use crate::errors::BoothError;
use crate::models::{EncodedImage, SourceImage};
use crate::services::gemini_service::GenerationBackend;
use crate::services::prompt_builder;

/// Shared descriptor used when the describe call yields nothing usable.
pub const DEFAULT_ALBUM_STYLE: &str = "A retro 80s studio background with laser beams, neon geometric shapes, fog, and dramatic backlighting.";

const CREDENTIAL_SIGNALS: &[&str] = &[
    "API key not valid",
    "API_KEY_INVALID",
    "PERMISSION_DENIED",
    "status 401",
    "status 403",
];

/// True when a backend error reports that the credential was rejected.
pub fn is_credential_rejection(message: &str) -> bool {
    CREDENTIAL_SIGNALS
        .iter()
        .any(|signal| message.contains(signal))
}

fn classify(err: BoothError) -> BoothError {
    match err {
        BoothError::FatalAuth(_) => err,
        other => {
            let message = other.to_string();
            if is_credential_rejection(&message) {
                BoothError::FatalAuth(message)
            } else {
                other
            }
        }
    }
}

#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    retry: RetryPolicy,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// One instruction against one source image, retried with backoff.
    /// Returns the first image payload of the first successful response.
    pub async fn generate(
        &self,
        instruction: &str,
        source: &SourceImage,
    ) -> Result<EncodedImage, BoothError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.backend.generate_images(instruction, &source.image).await {
                Ok(images) => match images.into_iter().next() {
                    Some(image) => {
                        debug!("Generation succeeded on attempt {}/{}", attempt, attempts);
                        return Ok(image);
                    }
                    None => last_error = "The response contained no image data".to_string(),
                },
                Err(e) => match classify(e) {
                    fatal @ BoothError::FatalAuth(_) => {
                        error!("Credential rejected by the generation backend; not retrying");
                        return Err(fatal);
                    }
                    other => last_error = other.to_string(),
                },
            }

            warn!(
                "Generation attempt {}/{} failed: {}",
                attempt, attempts, last_error
            );
            if attempt < attempts {
                sleep(self.retry.backoff_after(attempt)).await;
            }
        }

        Err(BoothError::Generation(format!(
            "Failed after {} attempts. Last error: {}",
            attempts, last_error
        )))
    }

    /// Produces the shared style descriptor for a batch. Single attempt.
    /// Never fails: any error or blank text yields [`DEFAULT_ALBUM_STYLE`].
    /// A rejected credential resurfaces on the first image call.
    pub async fn describe(&self, brief: &str) -> String {
        let request = prompt_builder::describe_request(brief);
        match self.backend.generate_text(&request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Describe returned no text; using the default album style");
                DEFAULT_ALBUM_STYLE.to_string()
            }
            Err(e) => {
                match classify(e) {
                    BoothError::FatalAuth(message) => error!(
                        "Credential rejected while describing the album style: {}",
                        message
                    ),
                    other => warn!("Describe failed, using the default album style: {}", other),
                }
                DEFAULT_ALBUM_STYLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;
    use uuid::Uuid;

    enum Reply {
        Image,
        Empty,
        Fail(&'static str),
    }

    struct Scripted {
        replies: Mutex<VecDeque<Reply>>,
        text: Mutex<Option<Result<String, BoothError>>>,
        calls: AtomicUsize,
        call_times: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                text: Mutex::new(None),
                calls: AtomicUsize::new(0),
                call_times: Mutex::new(Vec::new()),
            })
        }

        fn with_text(result: Result<String, BoothError>) -> Arc<Self> {
            let stub = Self::new(Vec::new());
            *stub.text.lock().unwrap() = Some(result);
            stub
        }
    }

    #[async_trait]
    impl GenerationBackend for Scripted {
        async fn generate_images(
            &self,
            _instruction: &str,
            _source: &EncodedImage,
        ) -> Result<Vec<EncodedImage>, BoothError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_times.lock().unwrap().push(Instant::now());
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Image) => Ok(vec![EncodedImage::png(vec![9u8, 9, 9])]),
                Some(Reply::Empty) => Ok(Vec::new()),
                Some(Reply::Fail(msg)) => Err(BoothError::LLM(msg.to_string())),
                None => Err(BoothError::LLM("script exhausted".to_string())),
            }
        }

        async fn generate_text(&self, _prompt: &str) -> Result<String, BoothError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(BoothError::LLM("no text scripted".to_string())))
        }
    }

    fn source() -> SourceImage {
        SourceImage {
            id: Uuid::new_v4(),
            image: EncodedImage::png(vec![1u8, 2, 3]),
            width: 1,
            height: 1,
            uploaded_at: Utc::now(),
        }
    }

    fn client(stub: Arc<Scripted>) -> GenerationClient {
        GenerationClient::new(stub, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_backoff() {
        let stub = Scripted::new(vec![
            Reply::Fail("503 Service Unavailable"),
            Reply::Empty,
            Reply::Image,
        ]);
        let image = client(stub.clone()).generate("go", &source()).await.unwrap();
        assert_eq!(image, EncodedImage::png(vec![9u8, 9, 9]));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);

        let times = stub.call_times.lock().unwrap();
        assert_eq!(times[1] - times[0], Duration::from_secs(1));
        assert_eq!(times[2] - times[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn credential_rejection_is_not_retried() {
        let stub = Scripted::new(vec![Reply::Fail(
            "Gemini API error status 400 Bad Request: API key not valid. Please pass a valid API key.",
        )]);
        let start = Instant::now();
        let err = client(stub.clone()).generate("go", &source()).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_carry_the_last_error() {
        let stub = Scripted::new(vec![
            Reply::Fail("timeout"),
            Reply::Fail("timeout"),
            Reply::Fail("internal error"),
        ]);
        let start = Instant::now();
        let err = client(stub.clone()).generate("go", &source()).await.unwrap_err();
        match err {
            BoothError::Generation(msg) => assert!(msg.contains("internal error")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        // 1 s + 2 s, nothing after the final attempt.
        assert_eq!(Instant::now() - start, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn describe_falls_back_on_ordinary_failure() {
        let stub = Scripted::with_text(Err(BoothError::LLM("status 500 Internal".into())));
        let style = client(stub.clone()).describe("80s mall").await;
        assert_eq!(style, DEFAULT_ALBUM_STYLE);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn describe_falls_back_on_blank_text() {
        let stub = Scripted::with_text(Ok("   ".to_string()));
        let style = client(stub).describe("80s mall").await;
        assert_eq!(style, DEFAULT_ALBUM_STYLE);
    }

    #[tokio::test]
    async fn describe_returns_trimmed_text() {
        let stub = Scripted::with_text(Ok(" Pastel laser grid. \n".to_string()));
        let style = client(stub).describe("80s mall").await;
        assert_eq!(style, "Pastel laser grid.");
    }

    #[tokio::test]
    async fn describe_falls_back_even_when_the_key_is_rejected() {
        let stub = Scripted::with_text(Err(BoothError::LLM(
            "Gemini API error status 403 Forbidden: PERMISSION_DENIED".into(),
        )));
        let style = client(stub.clone()).describe("80s mall").await;
        assert_eq!(style, DEFAULT_ALBUM_STYLE);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn credential_signals_are_recognised() {
        assert!(is_credential_rejection("reason: API_KEY_INVALID"));
        assert!(is_credential_rejection("Gemini API error status 401 Unauthorized: "));
        assert!(!is_credential_rejection("Gemini API error status 429 Too Many Requests"));
    }
}
