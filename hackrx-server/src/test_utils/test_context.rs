//! Helpers for running isolated webserver instances
use crate::{
    app_state::{AppState, AppStateBuilder},
    pipeline::{generator::ExtractiveGenerator, Pipeline},
    router::setup_app_router,
    settings,
    setups::test::{TestEventPublisher, TestNotifier, TestSetup},
    store::DocumentStore,
    test_utils::test_client,
};
use anyhow::Result;
use axum::{extract::connect_info::MockConnectInfo, Router};
use std::{net::SocketAddr, path::Path};
use tempfile::TempDir;

/// A reference to a hackrx server in an isolated test environment,
/// storing documents in its own temporary directory.
#[derive(Debug)]
pub struct TestContext {
    app: Router,
    app_state: AppState<TestSetup>,
    downloads_dir: TempDir,
}

impl TestContext {
    /// Create a new test context
    pub async fn new() -> Result<Self> {
        Self::new_with_state(|builder| builder).await
    }

    /// Create a new test context, mounted under `root_endpoint`
    pub async fn new_with_state<F>(f: F) -> Result<Self>
    where
        F: FnOnce(AppStateBuilder<TestSetup>) -> AppStateBuilder<TestSetup>,
    {
        Self::new_with_root(settings::Server::default().root_endpoint.as_str(), f).await
    }

    /// Create a new test context with routes nested under `root_endpoint`
    pub async fn new_with_root<F>(root_endpoint: &str, f: F) -> Result<Self>
    where
        F: FnOnce(AppStateBuilder<TestSetup>) -> AppStateBuilder<TestSetup>,
    {
        let downloads_dir = tempfile::tempdir()?;

        let builder = AppStateBuilder::default()
            .with_store(DocumentStore::new(downloads_dir.path(), test_client()))
            .with_pipeline(Pipeline::new(
                &settings::Pipeline::default(),
                ExtractiveGenerator,
            ))
            .with_notifier(TestNotifier::default())
            .with_event_publisher(TestEventPublisher::default());

        let app_state = f(builder).finalize()?;

        let server_settings = settings::Server {
            root_endpoint: root_endpoint.to_string(),
            ..Default::default()
        };

        let app = setup_app_router(app_state.clone(), &server_settings)
            .layer(MockConnectInfo(SocketAddr::from(([0, 0, 0, 0], 3000))));

        Ok(Self {
            app,
            app_state,
            downloads_dir,
        })
    }

    pub fn app(&self) -> Router {
        self.app.clone()
    }

    pub fn notifier(&self) -> &TestNotifier {
        &self.app_state.notifier
    }

    pub fn event_publisher(&self) -> &TestEventPublisher {
        &self.app_state.event_publisher
    }

    pub fn downloads_dir(&self) -> &Path {
        self.downloads_dir.path()
    }

    #[allow(unused)]
    pub fn app_state(&self) -> &AppState<TestSetup> {
        &self.app_state
    }
}
