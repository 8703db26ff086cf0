//! End-to-end tests against a real compose runtime.
//!
//! Each test writes its compose file into a temp directory and drives it
//! through `Testkit`. Requires Docker with compose. Tests are `#[ignore]` and
//! run explicitly:
//!
//! ```sh
//! cargo test -p dct-core --test e2e_compose -- --ignored --test-threads=1
//! ```

use dct_config::TestkitConfig;
use dct_core::retry::poll_until;
use dct_core::{
    EnvironmentOptions, HealthProbe, HttpProbe, ResolveOptions, TcpProbe, Testkit,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const NGINX_COMPOSE: &str = r#"
services:
  nginx:
    image: nginx:alpine
    ports:
      - "80"
  nginx2:
    image: nginx:alpine
    ports:
      - "80"
    volumes:
      - ${CONTENT_FOLDER}:/usr/share/nginx/html:ro
  postgres:
    image: postgres:16-alpine
    environment:
      POSTGRES_PASSWORD: password
    ports:
      - "5432"
"#;

const PING_COMPOSE: &str = r#"
services:
  ping:
    image: alpine
    command: ping -c 3 host.docker.internal
    extra_hosts:
      - ${HOST_DOCKER_INTERNAL}
"#;

fn get_test_testkit() -> Option<Testkit> {
    let config = TestkitConfig::load().unwrap_or_default();
    match Testkit::new(config) {
        Ok(testkit) => Some(testkit),
        Err(e) => {
            eprintln!("Skipping test: compose unavailable: {}", e);
            None
        }
    }
}

/// Write a compose file and an nginx content folder into a fresh temp dir
fn create_workspace(compose: &str) -> (TempDir, PathBuf, PathBuf) {
    let temp = TempDir::new().expect("failed to create temp dir");
    let compose_path = temp.path().join("docker-compose.yml");
    std::fs::write(&compose_path, compose).expect("failed to write compose file");
    let content = temp.path().join("content");
    std::fs::create_dir_all(&content).expect("failed to create content dir");
    std::fs::write(
        content.join("index.html"),
        "This content will be available if the CONTENT_FOLDER was set",
    )
    .expect("failed to write index.html");
    (temp, compose_path, content)
}

fn content_env(content: &Path) -> EnvironmentOptions {
    EnvironmentOptions::new().env("CONTENT_FOLDER", content.to_string_lossy())
}

async fn fetch_text(address: &str) -> Result<String, reqwest::Error> {
    reqwest::Client::builder()
        .no_proxy()
        .build()?
        .get(format!("http://{}/", address))
        .send()
        .await?
        .text()
        .await
}

#[tokio::test]
#[ignore]
async fn test_reuse_recreate_and_teardown() {
    let Some(testkit) = get_test_testkit() else {
        return;
    };
    let (_temp, compose, content) = create_workspace(NGINX_COMPOSE);

    let first = testkit
        .create_environment(&compose, content_env(&content).force_recreate(true))
        .await
        .expect("first bring-up failed");
    let nginx = first.resolve_service("nginx").await.expect("nginx");
    let nginx2 = first.resolve_service("nginx2").await.expect("nginx2");
    first
        .resolve_address(
            "postgres",
            5432,
            ResolveOptions::new().probe(Arc::new(TcpProbe)),
        )
        .await
        .expect("postgres");

    assert!(fetch_text(&nginx).await.unwrap().contains("Welcome to nginx"));
    assert_eq!(
        fetch_text(&nginx2).await.unwrap(),
        "This content will be available if the CONTENT_FOLDER was set"
    );
    first.tear_down().await.unwrap();

    // Same inputs, no recreation: the running containers are reused
    let second = testkit
        .create_environment(&compose, content_env(&content))
        .await
        .expect("second bring-up failed");
    let reused = second.resolve_service("nginx").await.expect("nginx");
    assert_eq!(reused, nginx);
    second.tear_down().await.unwrap();

    // Forced recreation publishes a new port
    let third = testkit
        .create_environment(
            &compose,
            content_env(&content)
                .force_recreate(true)
                .container_cleanup(true),
        )
        .await
        .expect("third bring-up failed");
    let recreated = third.resolve_service("nginx").await.expect("nginx");
    assert_ne!(recreated, reused);
    assert!(HttpProbe::new().check(&reused).await.is_err());

    third.tear_down().await.unwrap();
    assert!(HttpProbe::new().check(&recreated).await.is_err());
}

#[tokio::test]
#[ignore]
async fn test_parallel_variations() {
    let Some(testkit) = get_test_testkit() else {
        return;
    };
    let (_temp, compose, content) = create_workspace(NGINX_COMPOSE);
    let other_content = content.with_file_name("content-2");
    std::fs::create_dir_all(&other_content).unwrap();

    let first = testkit
        .create_environment(
            &compose,
            content_env(&content)
                .force_recreate(true)
                .container_cleanup(true),
        )
        .await
        .unwrap();
    let second = testkit
        .create_environment(
            &compose,
            content_env(&other_content)
                .force_recreate(true)
                .container_cleanup(true),
        )
        .await
        .unwrap();
    let third = testkit
        .create_environment(
            &compose,
            content_env(&content)
                .variation("2")
                .force_recreate(true)
                .container_cleanup(true),
        )
        .await
        .unwrap();

    let (a, b, c) = tokio::join!(
        first.resolve_service("nginx"),
        second.resolve_service("nginx"),
        third.resolve_service("nginx"),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert_ne!(a, b);
    assert_ne!(a, c);

    third.tear_down().await.unwrap();
    second.tear_down().await.unwrap();
    first.tear_down().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_host_alias_and_logs() {
    let Some(testkit) = get_test_testkit() else {
        return;
    };
    let (_temp, compose, _content) = create_workspace(PING_COMPOSE);

    let environment = testkit
        .create_environment(&compose, EnvironmentOptions::new().container_cleanup(true))
        .await
        .unwrap();

    let handle = &environment;
    let logs = poll_until(Duration::from_secs(30), Duration::from_millis(500), move || async move {
        let logs = handle
            .fetch_logs("ping")
            .await
            .map_err(|e| e.to_string())?;
        if logs.contains("bytes from") {
            Ok(logs)
        } else {
            Err(format!("no ping replies yet: {}", logs))
        }
    })
    .await;
    assert!(logs.is_ok(), "ping never reached the host: {:?}", logs.err());

    environment.tear_down().await.unwrap();
}
