//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use git2::{Repository, Signature};

use commit_buddy::commit::{GeneratedMessage, LogicalChangeUnit};
use commit_buddy::error::{BackendError, CommitError};
use commit_buddy::git::{ChangedFile, GitCli};
use commit_buddy::llm::CompletionBackend;
use commit_buddy::ui::{Choice, Prompter, Reporter};

/// A throwaway git repository with one initial commit.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a repository whose initial commit contains `files`.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");

        {
            let mut config = repo.config().expect("Failed to open repo config");
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
            config.set_bool("commit.gpgsign", false).unwrap();
        }

        let test_repo = Self { dir, repo };
        for (path, content) in files {
            test_repo.write(path, content);
        }
        test_repo.commit_all("chore: initial commit");
        test_repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `GitCli` running inside this repository.
    pub fn git(&self) -> GitCli {
        GitCli::new("git").with_workdir(self.path())
    }

    /// Write a file in the working tree, creating parent directories.
    pub fn write(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(full, content).expect("Failed to write file");
    }

    /// Stage a path through the index.
    pub fn stage(&self, path: &str) {
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(path)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Stage everything in the working tree and commit it.
    fn commit_all(&self, message: &str) {
        let mut index = self.repo.index().expect("Failed to get index");
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .expect("Failed to add files");
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let sig = Signature::now("Test User", "test@example.com").unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit");
    }

    /// Commit subjects, newest first.
    pub fn subjects(&self) -> Vec<String> {
        let mut walk = self.repo.revwalk().expect("Failed to create revwalk");
        walk.push_head().expect("Failed to push HEAD");
        walk.map(|oid| {
            let commit = self.repo.find_commit(oid.unwrap()).unwrap();
            commit.summary().unwrap_or_default().to_string()
        })
        .collect()
    }

    /// Files touched by the commit at HEAD.
    pub fn head_files(&self) -> Vec<String> {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        let parent = head.parent(0).ok().map(|p| p.tree().unwrap());
        let diff = self
            .repo
            .diff_tree_to_tree(parent.as_ref(), Some(&head.tree().unwrap()), None)
            .unwrap();
        diff.deltas()
            .filter_map(|d| d.new_file().path().map(|p| p.display().to_string()))
            .collect()
    }
}

/// Backend answering with queued completions, in order.
///
/// Once the queue is empty every call fails with `EmptyCompletion`.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(BackendError::EmptyCompletion)
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Reporter that keeps notices, errors and displayed messages.
#[derive(Default)]
pub struct RecordingReporter {
    pub notices: RefCell<Vec<String>>,
    pub errors: RefCell<Vec<String>>,
    pub messages: RefCell<Vec<String>>,
    pub units: RefCell<Vec<LogicalChangeUnit>>,
}

impl Reporter for RecordingReporter {
    fn step(&self, _message: &str) {}

    fn notice(&self, message: &str) {
        self.notices.borrow_mut().push(message.to_string());
    }

    fn success(&self, _message: &str) {}

    fn error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }

    fn files(&self, _files: &[ChangedFile]) {}

    fn analysis(&self, _analysis: &str, _verbose: bool) {}

    fn units(&self, units: &[LogicalChangeUnit]) {
        self.units.borrow_mut().extend_from_slice(units);
    }

    fn message(&self, message: &GeneratedMessage) {
        self.messages.borrow_mut().push(message.text.clone());
    }
}

/// Prompter replaying fixed answers. Running out of answers behaves like
/// an interrupted prompt.
#[derive(Default)]
pub struct ScriptedPrompter {
    choices: RefCell<VecDeque<Choice>>,
    confirms: RefCell<VecDeque<bool>>,
}

impl ScriptedPrompter {
    pub fn choices(choices: &[Choice]) -> Self {
        Self {
            choices: RefCell::new(choices.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn confirms(confirms: &[bool]) -> Self {
        Self {
            confirms: RefCell::new(confirms.iter().copied().collect()),
            ..Self::default()
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn choose(&self, _message: &GeneratedMessage) -> Result<Choice, CommitError> {
        self.choices
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommitError::PromptFailed("no scripted choice left".to_string()))
    }

    fn confirm_unit(
        &self,
        _unit: &LogicalChangeUnit,
        _message: &GeneratedMessage,
    ) -> Result<bool, CommitError> {
        self.confirms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommitError::PromptFailed("no scripted answer left".to_string()))
    }
}
