use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use warden_client::auth::AuthStore;
use warden_client::catalog::{ApplicationCatalog, ReloadResult};
use warden_client::correlator::combine_theory_and_reality;
use warden_client::launcher::Launcher;
use warden_client::monitor;
use warden_common::constants::OUTPUT_HISTORY_LINES;
use warden_common::types::{ApplicationView, LiveProcess, Token};

/// Caller-visible operation outcomes. The supervisor is the only place
/// component failures are translated into these; the `Forbidden` and
/// `Conflict` variants never carry internal diagnostics.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("forbidden")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("service unavailable")]
    Unavailable(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Orchestrates the engine behind the authenticated operation surface.
pub struct Supervisor {
    auth: Arc<AuthStore>,
    catalog: ApplicationCatalog,
    /// Active launcher per application id. This mutex is also the coarse
    /// start-serialization lock: it is held across the whole
    /// check-then-act of `start_application`, for every application.
    launchers: Mutex<HashMap<i64, Launcher>>,
}

impl Supervisor {
    pub fn new(auth: AuthStore, catalog: ApplicationCatalog) -> Self {
        Supervisor {
            auth: Arc::new(auth),
            catalog,
            launchers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Token, OpError> {
        let auth = self.auth.clone();
        let (user, pass) = (username.to_string(), password.to_string());
        let ok = tokio::task::spawn_blocking(move || auth.auth(&user, &pass))
            .await
            .map_err(|err| OpError::Internal(err.into()))?
            .map_err(OpError::Internal)?;
        if !ok {
            return Err(OpError::Forbidden);
        }
        info!(username, "login");
        Ok(self.auth.create_token(username))
    }

    /// Every privileged operation starts here and short-circuits to
    /// `Forbidden` before touching anything else.
    fn authenticate(&self, token_id: &str) -> Result<Token, OpError> {
        self.auth
            .find_valid_token(token_id)
            .ok_or(OpError::Forbidden)
    }

    async fn scan() -> Result<Vec<LiveProcess>, OpError> {
        tokio::task::spawn_blocking(monitor::scan)
            .await
            .map_err(|err| OpError::Internal(err.into()))?
            .map_err(OpError::Internal)
    }

    pub async fn list_processes(&self, token_id: &str) -> Result<Vec<LiveProcess>, OpError> {
        self.authenticate(token_id)?;
        Self::scan().await
    }

    pub async fn delete_process(&self, token_id: &str, pid: i32) -> Result<(), OpError> {
        let token = self.authenticate(token_id)?;
        info!(user = %token.username, pid, "delete process");
        let found = monitor::kill(pid).map_err(OpError::Internal)?;
        if !found {
            return Err(OpError::NotFound(format!("no process on pid {pid}")));
        }
        Ok(())
    }

    pub async fn list_applications(&self, token_id: &str) -> Result<Vec<ApplicationView>, OpError> {
        self.authenticate(token_id)?;
        let definitions = self.catalog.find_all();
        let processes = Self::scan().await?;
        Ok(combine_theory_and_reality(&definitions, &processes))
    }

    async fn application_view(&self, id: i64) -> Result<ApplicationView, OpError> {
        let Some(definition) = self.catalog.find(id) else {
            return Err(OpError::NotFound(format!("no application on id {id}")));
        };
        let processes = Self::scan().await?;
        let mut views = combine_theory_and_reality(std::slice::from_ref(&definition), &processes);
        Ok(views.remove(0))
    }

    pub async fn start_application(
        &self,
        token_id: &str,
        id: i64,
    ) -> Result<ApplicationView, OpError> {
        let token = self.authenticate(token_id)?;
        info!(user = %token.username, id, "start application");

        // Keeping external execs away is the operator's duty; this lock
        // only prevents concurrent starts from racing each other.
        let mut launchers = self.launchers.lock().await;

        let view = self.application_view(id).await?;
        if !view.instances.is_empty() {
            return Err(OpError::Conflict(format!(
                "running duplicates {}",
                view.instances.len()
            )));
        }

        let launcher = Launcher::launch(&view.definition, OUTPUT_HISTORY_LINES)
            .await
            .map_err(|err| OpError::Unavailable(err.into()))?;
        if let Some(stale) = launchers.insert(id, launcher) {
            // Capture left over from an instance that already exited.
            stale.terminate();
        }

        self.application_view(id).await
    }

    pub async fn application_output(
        &self,
        token_id: &str,
        id: i64,
    ) -> Result<Vec<String>, OpError> {
        self.authenticate(token_id)?;
        let launchers = self.launchers.lock().await;
        let Some(launcher) = launchers.get(&id) else {
            return Err(OpError::NotFound(format!("no active launcher on id {id}")));
        };
        Ok(launcher.query().await)
    }

    pub async fn stop_capture(&self, token_id: &str, id: i64) -> Result<(), OpError> {
        let token = self.authenticate(token_id)?;
        info!(user = %token.username, id, "stop capture");
        let Some(launcher) = self.launchers.lock().await.remove(&id) else {
            return Err(OpError::NotFound(format!("no active launcher on id {id}")));
        };
        launcher.terminate();
        Ok(())
    }

    pub async fn reload_catalog(&self, token_id: &str) -> Result<ReloadResult, OpError> {
        let token = self.authenticate(token_id)?;
        let result = self
            .catalog
            .reload()
            .map_err(|err| OpError::Unavailable(err.into()))?;
        info!(
            user = %token.username,
            items = result.after.item_count,
            "catalog reloaded"
        );
        Ok(result)
    }
}
