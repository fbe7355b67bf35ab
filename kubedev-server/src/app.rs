use std::{ops::Deref, sync::Arc};

use kubedev_orchestrator::Orchestrator;

use crate::templates::TemplateClient;

pub struct AppStateInner {
    pub orchestrator: Orchestrator,
    pub templates: TemplateClient,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

impl Deref for AppState {
    type Target = AppStateInner;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, templates: TemplateClient) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                orchestrator,
                templates,
            }),
        }
    }
}
