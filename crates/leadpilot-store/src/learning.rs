//! Edited-approval corpus.
//!
//! When a reviewer rewrites a proposed message before approving it, the
//! before/after pair is kept as a learning example for future prompt tuning.

use crate::persist;
use leadpilot_core::error::Result;
use leadpilot_core::types::LearningExample;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct LearningLog {
    path: PathBuf,
    examples: Mutex<Vec<LearningExample>>,
}

impl LearningLog {
    pub fn open(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let path = dir.join("learning_examples.json");
        let examples: Vec<LearningExample> = persist::read_json_or_default(&path);
        Self {
            path,
            examples: Mutex::new(examples),
        }
    }

    pub async fn append(&self, example: LearningExample) -> Result<()> {
        let mut examples = self.examples.lock().await;
        examples.push(example);
        persist::write_json(&self.path, &*examples)
    }

    pub async fn list(&self) -> Vec<LearningExample> {
        self.examples.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.examples.lock().await.len()
    }
}
