//! End-to-end workflow runs against real git repositories.

mod common;

use common::{RecordingReporter, ScriptedBackend, ScriptedPrompter, TestRepo};

use commit_buddy::commit::is_conventional_commit_format;
use commit_buddy::config::Config;
use commit_buddy::error::{CommitError, GitError};
use commit_buddy::ui::Choice;
use commit_buddy::{CommitWorkflow, GitOps, WorkflowOptions};

const SPLIT_TWO_UNITS: &str = r#"Here are the units:
[
  {"name": "Parser fix", "files": ["src/parser.py"], "explanation": "Handle empty input in the parser", "should_split": true},
  {"name": "Docs", "files": ["README.md"], "explanation": "Describe the new install steps", "should_split": true},
]"#;

// =============================================================================
// Staged single-message flow
// =============================================================================

#[tokio::test]
async fn test_staged_readme_with_malformed_completion_commits_valid_message() {
    let repo = TestRepo::with_files(&[("README.md", "# Project\n")]);
    repo.write("README.md", "# Project\n\nInstall with pip.\n");
    repo.stage("README.md");

    let git = repo.git();
    let backend = ScriptedBackend::new(&["Updated the readme with install steps"]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::choices(&[Choice::Accept]);
    let config = Config::default();

    let workflow = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter);
    let summary = workflow.run(&WorkflowOptions::default()).await.unwrap();

    assert_eq!(summary.committed.len(), 1);
    let subjects = repo.subjects();
    assert_eq!(subjects.len(), 2);
    assert!(is_conventional_commit_format(&subjects[0]), "{}", subjects[0]);
    assert!(subjects[0].starts_with("docs: "));
    assert_eq!(repo.head_files(), vec!["README.md"]);
}

#[tokio::test]
async fn test_staged_flow_prompt_names_changed_files() {
    let repo = TestRepo::with_files(&[("app.py", "print('a')\n")]);
    repo.write("app.py", "print('b')\n");
    repo.stage("app.py");

    let git = repo.git();
    let backend = ScriptedBackend::new(&["fix: print b instead of a"]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::choices(&[Choice::Accept]);
    let config = Config::default();

    CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&WorkflowOptions::default())
        .await
        .unwrap();

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Files changed: app.py"));
    assert_eq!(repo.subjects()[0], "fix: print b instead of a");
}

#[tokio::test]
async fn test_backend_failure_falls_back_to_file_based_message() {
    let repo = TestRepo::with_files(&[("styles.css", "a {}\n")]);
    repo.write("styles.css", "a { color: red; }\n");
    repo.stage("styles.css");

    let git = repo.git();
    let backend = ScriptedBackend::new(&[]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::choices(&[Choice::Accept]);
    let config = Config::default();

    CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&WorkflowOptions::default())
        .await
        .unwrap();

    assert_eq!(repo.subjects()[0], "style: update styles.css");
}

#[tokio::test]
async fn test_abort_leaves_history_untouched() {
    let repo = TestRepo::with_files(&[("main.py", "x = 1\n")]);
    repo.write("main.py", "x = 2\n");
    repo.stage("main.py");

    let git = repo.git();
    let backend = ScriptedBackend::new(&["feat: bump x"]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::choices(&[Choice::Abort]);
    let config = Config::default();

    let summary = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&WorkflowOptions::default())
        .await
        .unwrap();

    assert!(summary.aborted);
    assert_eq!(repo.subjects().len(), 1);
}

#[tokio::test]
async fn test_nothing_staged_is_an_error() {
    let repo = TestRepo::with_files(&[("main.py", "x = 1\n")]);

    let git = repo.git();
    let backend = ScriptedBackend::new(&["feat: unused"]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::default();
    let config = Config::default();

    let err = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&WorkflowOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CommitError::Git(GitError::NoChanges { staged: true })));
    assert!(backend.prompts().is_empty());
}

// =============================================================================
// Unstaged multi-unit flow
// =============================================================================

fn two_file_repo() -> TestRepo {
    let repo = TestRepo::with_files(&[
        ("src/parser.py", "def parse(s):\n    return s.split()\n"),
        ("README.md", "# Tool\n"),
    ]);
    repo.write(
        "src/parser.py",
        "def parse(s):\n    if not s:\n        return []\n    return s.split()\n",
    );
    repo.write("README.md", "# Tool\n\nInstall with pip.\n");
    repo
}

#[tokio::test]
async fn test_unstaged_units_become_separate_commits() {
    let repo = two_file_repo();

    let git = repo.git();
    let backend = ScriptedBackend::new(&[
        "Two independent changes: a parser fix and docs.",
        SPLIT_TWO_UNITS,
        "fix(parser): handle empty input",
        "docs: describe install steps",
    ]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::default();
    let config = Config::default();

    let options = WorkflowOptions {
        include_unstaged: true,
        auto_commit: true,
        ..WorkflowOptions::default()
    };
    let summary = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&options)
        .await
        .unwrap();

    assert_eq!(
        summary.committed,
        vec!["fix(parser): handle empty input", "docs: describe install steps"]
    );
    assert_eq!(
        repo.subjects(),
        vec![
            "docs: describe install steps",
            "fix(parser): handle empty input",
            "chore: initial commit"
        ]
    );
    assert_eq!(repo.head_files(), vec!["README.md"]);
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn test_unit_with_already_processed_files_is_skipped() {
    let repo = two_file_repo();

    let split = r#"[
        {"name": "Everything", "files": ["src/parser.py", "README.md"], "explanation": "Parser fix and docs together"},
        {"name": "Same files again", "files": ["README.md", "src/parser.py"], "explanation": "Completely different wording here"}
    ]"#;
    let git = repo.git();
    let backend = ScriptedBackend::new(&["analysis", split, "feat: parser and docs"]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::default();
    let config = Config::default();

    let options = WorkflowOptions {
        include_unstaged: true,
        auto_commit: true,
        ..WorkflowOptions::default()
    };
    let summary = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&options)
        .await
        .unwrap();

    assert_eq!(summary.committed, vec!["feat: parser and docs"]);
    assert_eq!(summary.skipped, 1);
    assert!(
        reporter
            .notices
            .borrow()
            .iter()
            .any(|n| n.contains("Skipping unit 2/2: Same files again"))
    );
    assert_eq!(repo.subjects().len(), 2);
}

#[tokio::test]
async fn test_declined_unit_is_left_in_working_tree() {
    let repo = two_file_repo();

    let git = repo.git();
    let backend = ScriptedBackend::new(&[
        "analysis",
        SPLIT_TWO_UNITS,
        "fix(parser): handle empty input",
        "docs: describe install steps",
    ]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::confirms(&[false, true]);
    let config = Config::default();

    let options = WorkflowOptions {
        include_unstaged: true,
        ..WorkflowOptions::default()
    };
    let summary = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&options)
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.committed, vec!["docs: describe install steps"]);

    let statuses = repo.repo.statuses(None).unwrap();
    let modified: Vec<String> = statuses
        .iter()
        .filter_map(|s| s.path().map(str::to_string))
        .collect();
    assert_eq!(modified, vec!["src/parser.py"]);
}

#[tokio::test]
async fn test_non_ascii_file_name_is_committed_with_its_unit() {
    let repo = TestRepo::with_files(&[("café.md", "# Menu\n"), ("app.py", "print('hi')\n")]);
    repo.write("café.md", "# Menu\n\nEspresso\n");
    repo.write("app.py", "print('hello')\n");

    let git = repo.git();
    let backend = ScriptedBackend::new(&[
        "analysis",
        r#"[
  {"name": "Menu", "files": ["café.md"], "explanation": "Add espresso to the menu", "should_split": true},
  {"name": "Greeting", "files": ["app.py"], "explanation": "Longer greeting", "should_split": true}
]"#,
        "docs: add espresso to menu",
        "feat: greet with hello",
    ]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::default();
    let config = Config::default();

    let options = WorkflowOptions {
        include_unstaged: true,
        auto_commit: true,
        ..WorkflowOptions::default()
    };
    let summary = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&options)
        .await
        .unwrap();

    assert_eq!(
        summary.committed,
        vec!["docs: add espresso to menu", "feat: greet with hello"]
    );
    assert_eq!(reporter.units.borrow()[0].files, vec!["café.md"]);
    assert!(repo.repo.statuses(None).unwrap().is_empty());
    assert!(reporter.errors.borrow().is_empty());
}

#[tokio::test]
async fn test_unparsable_split_falls_back_to_extension_groups() {
    let repo = two_file_repo();

    let git = repo.git();
    let backend = ScriptedBackend::new(&[
        "analysis",
        "I think src/parser.py and README.md changed.",
        "fix: parser",
        "docs: readme",
    ]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::default();
    let config = Config::default();

    let options = WorkflowOptions {
        include_unstaged: true,
        auto_commit: true,
        ..WorkflowOptions::default()
    };
    let summary = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&options)
        .await
        .unwrap();

    assert!(
        reporter
            .notices
            .borrow()
            .iter()
            .any(|n| n.contains("Could not parse logical units"))
    );
    assert_eq!(reporter.units.borrow().len(), 2);
    assert_eq!(summary.committed.len(), 2);
    assert_eq!(repo.subjects().len(), 3);
}

// =============================================================================
// Analyze-only
// =============================================================================

#[tokio::test]
async fn test_analyze_only_shows_messages_and_commits_nothing() {
    let repo = two_file_repo();

    let git = repo.git();
    let backend = ScriptedBackend::new(&[
        "analysis",
        SPLIT_TWO_UNITS,
        "fix(parser): handle empty input",
        "docs: describe install steps",
    ]);
    let reporter = RecordingReporter::default();
    let prompter = ScriptedPrompter::default();
    let config = Config::default();

    let options = WorkflowOptions {
        include_unstaged: true,
        analyze_only: true,
        ..WorkflowOptions::default()
    };
    let summary = CommitWorkflow::new(&git, &backend, &config, &reporter, &prompter)
        .run(&options)
        .await
        .unwrap();

    assert!(summary.committed.is_empty());
    assert_eq!(reporter.messages.borrow().len(), 2);
    assert_eq!(repo.subjects().len(), 1);
    assert!(matches!(
        git.staged_diff(),
        Err(GitError::NoChanges { staged: true })
    ));
}
