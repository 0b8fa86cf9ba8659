//! The generate pipeline
//!
//! `Idle → Diffing → Classifying → Emitting → Done`, with `Failed` reachable
//! from every stage that is not terminal. A pipeline runs once.

use crate::change::ChangeSet;
use crate::classify::classify;
use crate::config::Config;
use crate::diff::{DiffScope, diff_snapshots};
use crate::emit::{ChangelogEmitter, MigrationFile};
use crate::error::{Error, Result};
use crate::snapshot::{SchemaSnapshot, SnapshotLoader};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Diffing,
    Classifying,
    Emitting,
    Done,
    Failed,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Diffing => "diffing",
            Stage::Classifying => "classifying",
            Stage::Emitting => "emitting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful run
#[derive(Debug)]
pub enum Outcome {
    /// Snapshots are equivalent; nothing was written
    Unchanged,
    Emitted(MigrationFile),
}

impl Outcome {
    pub fn migration(&self) -> Option<&MigrationFile> {
        match self {
            Outcome::Unchanged => None,
            Outcome::Emitted(file) => Some(file),
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a Config,
    stage: Stage,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Load both snapshots and run to completion
    pub fn run(
        &mut self,
        previous: &impl SnapshotLoader,
        current: &impl SnapshotLoader,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        self.start()?;
        let result = self.execute(|| Ok((previous.load()?, current.load()?)), now);
        self.finish(result)
    }

    /// Run with snapshots already in memory
    pub fn run_snapshots(
        &mut self,
        old: &SchemaSnapshot,
        new: &SchemaSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        self.start()?;
        let result = self.execute(|| Ok((old.clone(), new.clone())), now);
        self.finish(result)
    }

    /// Diff and classify without writing anything
    pub fn plan(&self, old: &SchemaSnapshot, new: &SchemaSnapshot) -> Result<ChangeSet> {
        let scope = DiffScope::from_config(self.config);
        let changes = classify(diff_snapshots(old, new, &scope), old, &self.config.diff);
        self.check_ambiguities(&changes)?;
        Ok(changes)
    }

    fn start(&mut self) -> Result<()> {
        if self.stage != Stage::Idle {
            return Err(Error::Finished(self.stage));
        }
        Ok(())
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "pipeline stage");
        self.stage = stage;
    }

    fn execute(
        &mut self,
        load: impl FnOnce() -> Result<(SchemaSnapshot, SchemaSnapshot)>,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        self.config.validate()?;

        self.enter(Stage::Diffing);
        let (old, new) = load()?;
        let scope = DiffScope::from_config(self.config);
        let changes = diff_snapshots(&old, &new, &scope);

        self.enter(Stage::Classifying);
        let changes = classify(changes, &old, &self.config.diff);
        self.check_ambiguities(&changes)?;

        if changes.is_empty() {
            tracing::info!("no schema changes");
            return Ok(Outcome::Unchanged);
        }

        self.enter(Stage::Emitting);
        let file = ChangelogEmitter::new(self.config).emit(&changes, &new, now)?;
        Ok(Outcome::Emitted(file))
    }

    fn finish(&mut self, result: Result<Outcome>) -> Result<Outcome> {
        match &result {
            Ok(_) => self.enter(Stage::Done),
            Err(e) => {
                tracing::debug!(stage = %self.stage, error = %e, "pipeline failed");
                self.enter(Stage::Failed);
            }
        }
        result
    }

    fn check_ambiguities(&self, changes: &ChangeSet) -> Result<()> {
        if self.config.strict && !changes.ambiguities().is_empty() {
            return Err(Error::DiffAmbiguity(changes.ambiguities().to_vec()));
        }
        Ok(())
    }
}
