use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use warden_client::auth::{parse_shadow, register, AuthStore};
use warden_client::catalog::ApplicationCatalog;
use warden_daemon::supervisor::{OpError, Supervisor};

fn sleeper_catalog(dir: &Path) -> String {
    // The compound command keeps the shell itself alive as the matched
    // root; a lone `sleep` would be exec-optimized away by the shell.
    format!(
        r#"- id: 1
  name: sleeper
  exec:
    workingDirectory: {dir}
    path: sleeper
    args: ["-c", "sleep 30; true"]
    redirectPath: sleeper.log
"#,
        dir = dir.display()
    )
}

/// A private copy of the shell: the catalog entry and the spawned
/// process then resolve to the same filesystem object, independent of
/// whether /bin/sh is a symlink on this host.
fn install_sleeper(dir: &Path) {
    std::fs::copy("/bin/sh", dir.join("sleeper")).unwrap();
}

fn supervisor_with(dir: &Path) -> Supervisor {
    install_sleeper(dir);
    let line = register("admin", "hunter2").unwrap();
    let auth = AuthStore::new(parse_shadow(&line).unwrap());
    let catalog_path = dir.join("apps.yaml");
    std::fs::write(&catalog_path, sleeper_catalog(dir)).unwrap();
    let catalog = ApplicationCatalog::load(catalog_path).unwrap();
    Supervisor::new(auth, catalog)
}

async fn wait_for_instances(supervisor: &Supervisor, token: &str, id: i64, want: usize) {
    for _ in 0..200 {
        let views = supervisor.list_applications(token).await.unwrap();
        let found = views
            .iter()
            .find(|view| view.definition.id == id)
            .map(|view| view.instances.len())
            .unwrap_or(0);
        if found == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("application {id} never reached {want} instances");
}

#[tokio::test]
async fn operations_require_a_valid_token() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = supervisor_with(dir.path());

    assert!(matches!(
        supervisor.login("admin", "wrong").await,
        Err(OpError::Forbidden)
    ));
    assert!(matches!(
        supervisor.login("ghost", "hunter2").await,
        Err(OpError::Forbidden)
    ));
    assert!(matches!(
        supervisor.list_processes("bogus").await,
        Err(OpError::Forbidden)
    ));
    assert!(matches!(
        supervisor.delete_process("bogus", 1).await,
        Err(OpError::Forbidden)
    ));
    assert!(matches!(
        supervisor.list_applications("bogus").await,
        Err(OpError::Forbidden)
    ));
    assert!(matches!(
        supervisor.start_application("bogus", 1).await,
        Err(OpError::Forbidden)
    ));
    assert!(matches!(
        supervisor.application_output("bogus", 1).await,
        Err(OpError::Forbidden)
    ));
    assert!(matches!(
        supervisor.stop_capture("bogus", 1).await,
        Err(OpError::Forbidden)
    ));
    assert!(matches!(
        supervisor.reload_catalog("bogus").await,
        Err(OpError::Forbidden)
    ));
}

#[tokio::test]
async fn start_conflict_kill_and_stop_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = supervisor_with(dir.path());

    let token = supervisor.login("admin", "hunter2").await.unwrap();

    assert!(matches!(
        supervisor.start_application(&token.id, 999).await,
        Err(OpError::NotFound(_))
    ));

    supervisor.start_application(&token.id, 1).await.unwrap();
    wait_for_instances(&supervisor, &token.id, 1, 1).await;

    // The instance is alive, so a second start must refuse.
    assert!(matches!(
        supervisor.start_application(&token.id, 1).await,
        Err(OpError::Conflict(_))
    ));

    // A sleeping shell prints nothing; the query itself must still work.
    assert_eq!(
        supervisor.application_output(&token.id, 1).await.unwrap(),
        Vec::<String>::new()
    );
    assert!(dir.path().join("sleeper.log").exists());

    let views = supervisor.list_applications(&token.id).await.unwrap();
    let view = views.iter().find(|view| view.definition.id == 1).unwrap();
    let pid = view.instances[0].process.pid;

    assert!(supervisor.delete_process(&token.id, pid).await.is_ok());
    wait_for_instances(&supervisor, &token.id, 1, 0).await;

    assert!(matches!(
        supervisor.delete_process(&token.id, i32::MAX).await,
        Err(OpError::NotFound(_))
    ));

    supervisor.stop_capture(&token.id, 1).await.unwrap();
    assert!(matches!(
        supervisor.stop_capture(&token.id, 1).await,
        Err(OpError::NotFound(_))
    ));
    assert!(matches!(
        supervisor.application_output(&token.id, 1).await,
        Err(OpError::NotFound(_))
    ));
}

#[tokio::test]
async fn concurrent_starts_yield_one_launcher_and_one_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(supervisor_with(dir.path()));
    let token = supervisor.login("admin", "hunter2").await.unwrap();

    let first = {
        let supervisor = supervisor.clone();
        let token = token.id.clone();
        tokio::spawn(async move { supervisor.start_application(&token, 1).await })
    };
    let second = {
        let supervisor = supervisor.clone();
        let token = token.id.clone();
        tokio::spawn(async move { supervisor.start_application(&token, 1).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let started = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Err(OpError::Conflict(_))))
        .count();
    assert_eq!((started, conflicts), (1, 1));

    // Cleanup: stop the sleeper so the tempdir can go away quietly.
    let views = supervisor.list_applications(&token.id).await.unwrap();
    if let Some(instance) = views
        .iter()
        .find(|view| view.definition.id == 1)
        .and_then(|view| view.instances.first())
    {
        let _ = supervisor.delete_process(&token.id, instance.process.pid).await;
    }
    let _ = supervisor.stop_capture(&token.id, 1).await;
}

#[tokio::test]
async fn reload_catalog_maps_failures_to_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = supervisor_with(dir.path());
    let token = supervisor.login("admin", "hunter2").await.unwrap();

    let result = supervisor.reload_catalog(&token.id).await.unwrap();
    assert_eq!(result.after.item_count, 1);

    std::fs::write(dir.path().join("apps.yaml"), "- id: [broken").unwrap();
    assert!(matches!(
        supervisor.reload_catalog(&token.id).await,
        Err(OpError::Unavailable(_))
    ));

    // Fail-open: the previous snapshot still serves.
    let views = supervisor.list_applications(&token.id).await.unwrap();
    assert_eq!(views.len(), 1);
}
