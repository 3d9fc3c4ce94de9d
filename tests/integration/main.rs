//! Integration tests for Tally

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Config isolated in a temp dir, with the counter file next to it
    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let counter = dir.path().join("countStore.json");
            std::fs::write(
                dir.path().join("config.toml"),
                format!("[counter]\npath = {:?}\n", counter),
            )
            .unwrap();
            Self { dir }
        }

        fn config_path(&self) -> PathBuf {
            self.dir.path().join("config.toml")
        }

        fn tally(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("tally");
            cmd.arg("--config")
                .arg(self.config_path())
                .arg("--no-local")
                .env_remove("TALLY_CONFIG");
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("tally")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("normalized queries and optimistic updates"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("tally")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("tally"));
    }

    #[test]
    fn config_path_follows_flag() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("base_url"));
    }

    #[test]
    fn config_set_then_show() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["config", "set", "api.timeout_secs", "3"])
            .assert()
            .success();
        sandbox
            .tally()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("timeout_secs = 3"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_config_reports_hint() {
        let sandbox = Sandbox::new();
        std::fs::write(sandbox.config_path(), "[cache\n").unwrap();
        sandbox
            .tally()
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn memory_list_starts_empty() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["--memory", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn memory_add_succeeds() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["--memory", "add", "buy", "milk"])
            .assert()
            .success()
            .stdout(predicate::str::contains("buy milk"));
    }

    #[test]
    fn blank_content_is_rejected() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["--memory", "add", "   "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("must not be empty"));
    }

    #[test]
    fn edit_without_fields_is_rejected() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["--memory", "edit", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Nothing to change"));
    }

    #[test]
    fn show_missing_todo_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["--memory", "show", "missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Fetch Failed"));
    }

    #[test]
    fn unreachable_server_is_a_service_error() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["config", "set", "api.base_url", "http://127.0.0.1:9"])
            .assert()
            .success();
        sandbox
            .tally()
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Fetch Failed"))
            .stderr(predicate::str::contains("--memory"));
    }

    #[test]
    fn status_with_memory_backend() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["--memory", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("memory"))
            .stdout(predicate::str::contains("Reachable"));
    }

    #[test]
    fn counter_persists_between_runs() {
        let sandbox = Sandbox::new();
        sandbox
            .tally()
            .args(["counter", "show"])
            .assert()
            .success()
            .stdout("0\n");
        sandbox.tally().args(["counter", "inc"]).assert().success();
        sandbox
            .tally()
            .args(["counter", "inc"])
            .assert()
            .success()
            .stdout("2\n");
        sandbox
            .tally()
            .args(["counter", "dec"])
            .assert()
            .success()
            .stdout("1\n");
        sandbox.tally().arg("counter").assert().success().stdout("1\n");

        assert!(sandbox.dir.path().join("countStore.json").exists());
    }
}

mod client_tests {
    use std::sync::Arc;
    use tally::client::{DetailMode, QueryOptions, TodoClient};
    use tally::service::{MemoryTodoService, Operation};
    use tally::todo::TodoPatch;

    fn setup() -> (Arc<MemoryTodoService>, TodoClient) {
        let service = Arc::new(MemoryTodoService::new().with_sequential_ids());
        let client = TodoClient::new(service.clone(), QueryOptions::default());
        (service, client)
    }

    #[tokio::test]
    async fn add_toggle_remove_keeps_both_views_consistent() {
        let (service, client) = setup();

        let first = client.create("write tests").await.unwrap();
        let second = client.create("ship it").await.unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");

        // Fresh client, cold cache: one list call fills every detail entry
        let client = TodoClient::new(service.clone(), QueryOptions::default());
        let ids = client.list().await.unwrap();
        assert_eq!(ids, vec!["1", "2"]);
        for id in &ids {
            client.detail(id, DetailMode::CacheOnly).await.unwrap();
        }
        assert_eq!(service.calls(Operation::Get), 0);

        let toggled = client.update("1", TodoPatch::done(true)).await.unwrap();
        assert!(toggled.is_done);
        assert_eq!(client.cached_todo("1"), Some(toggled));

        client.delete("2").await.unwrap();
        assert_eq!(client.cached_ids(), Some(vec!["1".to_string()]));
        assert!(client.cached_todo("2").is_none());
        assert!(client.detail("2", DetailMode::CacheOnly).await.is_err());
    }

    #[tokio::test]
    async fn failed_mutations_leave_cache_untouched() {
        let (service, client) = setup();
        client.create("a").await.unwrap();
        client.list().await.unwrap();
        let before = (client.cached_ids(), client.cached_todo("1"));

        service.fail_next(Operation::Create);
        service.fail_next(Operation::Update);
        service.fail_next(Operation::Delete);
        assert!(client.create("b").await.is_err());
        assert!(client.update("1", TodoPatch::content("z")).await.is_err());
        assert!(client.delete("1").await.is_err());

        assert_eq!((client.cached_ids(), client.cached_todo("1")), before);
    }

    #[tokio::test]
    async fn refetch_is_idempotent() {
        let (_service, client) = setup();
        client.create("a").await.unwrap();
        client.create("b").await.unwrap();

        let first = client.list().await.unwrap();
        let snapshot: Vec<_> = first.iter().map(|id| client.cached_todo(id)).collect();
        let second = client.list().await.unwrap();
        let again: Vec<_> = second.iter().map(|id| client.cached_todo(id)).collect();

        assert_eq!(first, second);
        assert_eq!(snapshot, again);
    }
}
