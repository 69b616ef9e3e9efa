//! Config search order and `init` behaviour, with HOME pointed at a temp dir.

use std::path::Path;

use serial_test::serial;

use commit_buddy::config::{
    BackendKind, Config, ConfigSource, DOTFILE_NAME, default_config_path, write_default_config,
};

/// Run `f` with HOME and XDG_CONFIG_HOME inside a fresh temp dir.
fn with_home<F: FnOnce(&Path)>(f: F) {
    let home = tempfile::tempdir().unwrap();
    let xdg = home.path().join(".config");
    temp_env::with_vars(
        [
            ("HOME", Some(home.path().as_os_str())),
            ("XDG_CONFIG_HOME", Some(xdg.as_os_str())),
        ],
        || f(home.path()),
    );
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
#[serial]
fn test_no_config_anywhere_uses_defaults() {
    with_home(|_| {
        let loaded = Config::load(None).unwrap();
        assert_eq!(loaded.source, ConfigSource::Defaults);
        assert_eq!(loaded.config, Config::default());
    });
}

#[test]
#[serial]
fn test_home_dotfile_is_found() {
    with_home(|home| {
        let path = home.join(DOTFILE_NAME);
        write(&path, "model: mistral\nendpoint: localhost:11434\n");

        let loaded = Config::load(None).unwrap();
        assert_eq!(loaded.source, ConfigSource::File(path));
        assert_eq!(loaded.config.model, "mistral");
        assert_eq!(loaded.config.resolved_backend(), BackendKind::Ollama);
    });
}

#[test]
#[serial]
fn test_home_dotfile_wins_over_xdg_config() {
    with_home(|home| {
        write(&home.join(DOTFILE_NAME), "n_threads: 2\n");
        write(
            &home.join(".config").join("commitbuddy").join("config.yaml"),
            "n_threads: 8\n",
        );

        let loaded = Config::load(None).unwrap();
        assert_eq!(loaded.config.n_threads, 2);
    });
}

#[test]
#[serial]
fn test_xdg_config_used_when_no_dotfile() {
    with_home(|home| {
        let path = home.join(".config").join("commitbuddy").join("config.yaml");
        write(&path, "commit_scopes: [api, cli]\n");

        let loaded = Config::load(None).unwrap();
        assert_eq!(loaded.source, ConfigSource::File(path));
        assert_eq!(loaded.config.commit_scopes, vec!["api", "cli"]);
        assert_eq!(loaded.config.commit_types, Config::default().commit_types);
    });
}

#[test]
#[serial]
fn test_broken_file_in_search_path_is_an_error() {
    with_home(|home| {
        write(&home.join(DOTFILE_NAME), "n_threads: [not a number\n");
        assert!(Config::load(None).is_err());
    });
}

#[test]
#[serial]
fn test_init_writes_file_that_load_finds() {
    with_home(|home| {
        let path = default_config_path().unwrap();
        assert!(path.starts_with(home));

        write_default_config(&path, false).unwrap();
        let loaded = Config::load(None).unwrap();
        assert_eq!(loaded.source, ConfigSource::File(path.clone()));
        assert_eq!(loaded.config, Config::default());

        assert!(write_default_config(&path, false).is_err());
        write_default_config(&path, true).unwrap();
    });
}

#[test]
#[serial]
fn test_model_path_tilde_expands_to_home() {
    with_home(|home| {
        let config = Config {
            model_path: "~/models/tiny.gguf".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.expanded_model_path(),
            home.join("models").join("tiny.gguf")
        );
    });
}
