use std::sync::Arc;
use std::time::Instant;

use crate::tutor::TutorEngine;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    engine: Arc<TutorEngine>,
}

impl AppState {
    pub fn new(engine: Arc<TutorEngine>) -> Self {
        Self {
            started_at: Instant::now(),
            engine,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn engine(&self) -> Arc<TutorEngine> {
        Arc::clone(&self.engine)
    }
}
