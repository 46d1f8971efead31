//! Console summaries for a migration or rollback run.

use offerwall_store::DocumentFailure;
use std::fmt;

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Documents in the collection before the run.
    pub total_documents: u64,
    /// Documents selected as not yet migrated.
    pub selected: usize,
    /// Updates the store accepted.
    pub migrated: u64,
    pub failures: Vec<DocumentFailure>,
    pub indexes_created: usize,
    pub indexes_existing: usize,
    pub index_warnings: Vec<String>,
    /// Documents carrying the full current layout after the run.
    pub validated: u64,
}

impl MigrationReport {
    /// Validated documents as a percentage of the pre-run total.
    /// An empty collection counts as fully migrated.
    pub fn success_rate(&self) -> f64 {
        if self.total_documents == 0 {
            return 100.0;
        }
        self.validated as f64 * 100.0 / self.total_documents as f64
    }

    pub fn is_complete(&self) -> bool {
        self.validated >= self.total_documents
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration summary")?;
        writeln!(f, "  Total documents:   {}", self.total_documents)?;
        writeln!(f, "  Selected:          {}", self.selected)?;
        writeln!(f, "  Migrated:          {}", self.migrated)?;
        writeln!(f, "  Failed:            {}", self.failures.len())?;
        writeln!(
            f,
            "  Indexes:           {} created, {} already present",
            self.indexes_created, self.indexes_existing
        )?;
        writeln!(f, "  Validated:         {}", self.validated)?;
        write!(f, "  Success rate:      {:.1}%", self.success_rate())?;
        for failure in &self.failures {
            write!(f, "\n  ! document {}: {}", failure.key, failure.reason)?;
        }
        for warning in &self.index_warnings {
            write!(f, "\n  ! index warning: {warning}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RollbackReport {
    pub reverted: u64,
}

impl fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rollback summary\n  Reverted documents: {}\n  Legacy fields are not restored.",
            self.reverted
        )
    }
}
