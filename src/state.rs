use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::cache::MediaCache;
use crate::db::DatabaseProxy;
use crate::hangul::quiz::QuizStore;
use crate::services::image_provider::ImageProvider;
use crate::services::lesson_service::LessonService;
use crate::services::speech_provider::SpeechProvider;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db_proxy: Option<Arc<DatabaseProxy>>,
    quizzes: Arc<QuizStore>,
    media_cache: Arc<MediaCache>,
    lesson_service: Arc<LessonService>,
    speech_provider: Arc<SpeechProvider>,
    image_provider: Arc<ImageProvider>,
}

impl AppState {
    pub fn new(db_proxy: Option<Arc<DatabaseProxy>>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db_proxy,
            quizzes: Arc::new(QuizStore::new()),
            media_cache: Arc::new(MediaCache::new()),
            lesson_service: Arc::new(LessonService::from_env()),
            speech_provider: Arc::new(SpeechProvider::from_env()),
            image_provider: Arc::new(ImageProvider::from_env()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db_proxy(&self) -> Option<Arc<DatabaseProxy>> {
        self.db_proxy.clone()
    }

    pub fn quizzes(&self) -> Arc<QuizStore> {
        Arc::clone(&self.quizzes)
    }

    pub fn media_cache(&self) -> Arc<MediaCache> {
        Arc::clone(&self.media_cache)
    }

    pub fn lesson_service(&self) -> Arc<LessonService> {
        Arc::clone(&self.lesson_service)
    }

    pub fn speech_provider(&self) -> Arc<SpeechProvider> {
        Arc::clone(&self.speech_provider)
    }

    pub fn image_provider(&self) -> Arc<ImageProvider> {
        Arc::clone(&self.image_provider)
    }
}
