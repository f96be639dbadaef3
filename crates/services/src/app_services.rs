use std::sync::Arc;

use storage::repository::{SessionStoreRepository, Storage};

use crate::Clock;
use crate::capture::CaptureDevice;
use crate::error::AppServicesError;
use crate::generation::{
    GenerationGateway, GenerationLimits, GenerationUsageService, GenerativeClient,
    HttpGenerativeClient,
};
use crate::interview::InterviewLoopService;

/// Composition root: wires storage, the gateway, and the session controller.
#[derive(Clone)]
pub struct AppServices {
    interviews: Arc<InterviewLoopService>,
    gateway: Arc<GenerationGateway>,
    sessions: Arc<dyn SessionStoreRepository>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, with the HTTP generation
    /// client configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        device: Arc<dyn CaptureDevice>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::build(
            storage,
            clock,
            device,
            Arc::new(HttpGenerativeClient::from_env()),
            GenerationLimits::default(),
        ))
    }

    /// Build services on in-memory storage, for tests and prototyping.
    #[must_use]
    pub fn in_memory(clock: Clock, device: Arc<dyn CaptureDevice>) -> Self {
        Self::build(
            Storage::in_memory(),
            clock,
            device,
            Arc::new(HttpGenerativeClient::from_env()),
            GenerationLimits::default(),
        )
    }

    /// Build services with an explicit client and limits.
    #[must_use]
    pub fn with_client(
        storage: Storage,
        clock: Clock,
        device: Arc<dyn CaptureDevice>,
        client: Arc<dyn GenerativeClient>,
        limits: GenerationLimits,
    ) -> Self {
        Self::build(storage, clock, device, client, limits)
    }

    fn build(
        storage: Storage,
        clock: Clock,
        device: Arc<dyn CaptureDevice>,
        client: Arc<dyn GenerativeClient>,
        limits: GenerationLimits,
    ) -> Self {
        let usage = GenerationUsageService::new(
            clock,
            Arc::clone(&storage.usage),
            limits.daily_quota,
            limits.warn_ratio,
        );
        let gateway = Arc::new(GenerationGateway::new(client, usage, limits));
        let interviews = Arc::new(InterviewLoopService::new(
            clock,
            Arc::clone(&storage.sessions),
            Arc::clone(&gateway),
            device,
        ));

        Self {
            interviews,
            gateway,
            sessions: storage.sessions,
        }
    }

    #[must_use]
    pub fn interviews(&self) -> Arc<InterviewLoopService> {
        Arc::clone(&self.interviews)
    }

    #[must_use]
    pub fn gateway(&self) -> Arc<GenerationGateway> {
        Arc::clone(&self.gateway)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<dyn SessionStoreRepository> {
        Arc::clone(&self.sessions)
    }
}
