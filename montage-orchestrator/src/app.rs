//! Application wiring
//!
//! Builds the dispatcher, services and router from a set of backends. The
//! binary passes Postgres, local storage and HTTP clients; tests pass the
//! in-memory stand-ins.

use axum::Router;
use montage_client::MediaFetcher;
use std::sync::Arc;

use crate::api::{self, AppState};
use crate::callback::CallbackProcessor;
use crate::executor::{Dispatcher, ExecutorContext, ExecutorSettings, Providers};
use crate::lifecycle::LifecycleTracker;
use crate::repository::Repository;
use crate::scheduler::Scheduler;
use crate::service::{NodeService, PipelineService};
use crate::storage::ObjectStorage;

pub struct Backends {
    pub repo: Arc<dyn Repository>,
    pub storage: Arc<dyn ObjectStorage>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub scheduler: Arc<dyn Scheduler>,
    pub providers: Providers,
}

pub struct App {
    pub state: AppState,
    pub dispatcher: Arc<Dispatcher>,
}

impl App {
    pub fn new(settings: ExecutorSettings, backends: Backends) -> Self {
        let Backends {
            repo,
            storage,
            fetcher,
            scheduler,
            providers,
        } = backends;
        let lifecycle = LifecycleTracker::new(repo.clone());

        let ctx = ExecutorContext {
            repo: repo.clone(),
            lifecycle: lifecycle.clone(),
            storage,
            fetcher,
            scheduler,
            settings,
        };
        let dispatcher = Arc::new(Dispatcher::new(ctx, providers));

        let state = AppState {
            nodes: Arc::new(NodeService::new(repo.clone(), dispatcher.clone())),
            pipelines: Arc::new(PipelineService::new(repo.clone())),
            callbacks: Arc::new(CallbackProcessor::new(repo, lifecycle)),
        };

        Self { state, dispatcher }
    }

    pub fn router(&self) -> Router {
        api::create_router(self.state.clone())
    }
}
