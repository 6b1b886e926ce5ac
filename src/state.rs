use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, CaptchaVerifier, ContentService, HttpObjectStorage, Mailer, MembershipService,
    MemoryObjectStorage, Notifier, ObjectStorage,
};

/// Build a shared HTTP client with reasonable defaults for outbound calls.
/// This client is reused across every HTTP-based service to enable
/// connection pooling and avoid socket exhaustion.
fn build_shared_http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent("Muralboard/1.0")
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub notifier: Arc<Notifier>,

    pub mailer: Arc<Mailer>,

    pub storage: Arc<dyn ObjectStorage>,

    pub auth: Arc<AuthService>,

    pub membership: Arc<MembershipService>,

    pub content: Arc<ContentService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = build_shared_http_client()?;
        let storage: Arc<dyn ObjectStorage> = if config.storage.backend == "http" {
            Arc::new(HttpObjectStorage::new(http_client.clone(), &config.storage))
        } else {
            Arc::new(MemoryObjectStorage::new())
        };
        Self::assemble(config, http_client, storage).await
    }

    /// Wire everything around a caller-supplied storage backend. Tests use
    /// this to keep a typed handle on the in-memory store and assert on the
    /// objects the content service leaves behind.
    pub async fn with_storage(
        config: Config,
        storage: Arc<dyn ObjectStorage>,
    ) -> anyhow::Result<Self> {
        let http_client = build_shared_http_client()?;
        Self::assemble(config, http_client, storage).await
    }

    async fn assemble(
        config: Config,
        http_client: reqwest::Client,
        storage: Arc<dyn ObjectStorage>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let notifier = Arc::new(Notifier::new(store.clone()));
        let mailer = Arc::new(Mailer::new(http_client.clone(), config.mail.clone()));
        let captcha = CaptchaVerifier::new(http_client, config.captcha.clone());

        let auth = Arc::new(AuthService::new(
            store.clone(),
            mailer.clone(),
            captcha,
            config.auth.clone(),
        ));
        let membership = Arc::new(MembershipService::new(store.clone(), notifier.clone()));
        let content = Arc::new(ContentService::new(store.clone(), storage.clone()));

        Ok(Self {
            config,
            store,
            notifier,
            mailer,
            storage,
            auth,
            membership,
            content,
        })
    }
}
