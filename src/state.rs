use std::sync::Arc;

use crate::{
    auth::jwt::JwtService, config::AppConfig, mailer::Mailer, pdf::PdfRenderer,
    storage::ObjectStorage, store::DataStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub pdf: Arc<dyn PdfRenderer>,
    pub jwt: JwtService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DataStore>,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
        pdf: Arc<dyn PdfRenderer>,
        jwt: JwtService,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            storage,
            mailer,
            pdf,
            jwt,
            config: Arc::new(config),
        }
    }
}
