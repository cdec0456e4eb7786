//! Commit cadence and per-stage write accounting

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::time::Duration;
use tracing::warn;

use crate::session::{GraphSession, SessionResult};

/// When a batch loader commits its open transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit after every `size` ticks
    EveryN { size: usize },
    /// Commit with probability `1 / one_in` per tick
    Random { one_in: u32, seed: Option<u64> },
}

impl Default for CommitPolicy {
    fn default() -> Self {
        CommitPolicy::EveryN { size: 1000 }
    }
}

impl CommitPolicy {
    /// The legacy cadence: one commit in twenty ticks on average
    pub fn legacy(seed: Option<u64>) -> Self {
        CommitPolicy::Random { one_in: 20, seed }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            CommitPolicy::EveryN { size: 0 } => Err("commit batch size must be at least 1".into()),
            CommitPolicy::Random { one_in: 0, .. } => {
                Err("random commit ratio must be at least 1".into())
            }
            _ => Ok(()),
        }
    }
}

/// Outcome of one batch stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Writes that reached a commit
    pub inserted: usize,
    /// Writes intentionally not made
    pub skipped: usize,
    /// Writes lost to an error and the rollback that followed it
    pub failed: usize,
    /// Commits issued
    pub commits: usize,
}

impl AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.commits += other.commits;
    }
}

/// Milliseconds per record, or zero when nothing was loaded
pub fn ms_per_record(elapsed: Duration, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    elapsed.as_secs_f64() * 1000.0 / count as f64
}

enum Cadence {
    EveryN(usize),
    Random { one_in: u32, rng: StdRng },
}

/// Drives commits for one stage and keeps its [`BatchReport`].
///
/// Callers `record` every successful write, `tick` once per input item,
/// `fail` after a write error, and `finish` at the end of the stage.
pub struct Committer<'a, S: GraphSession + ?Sized> {
    session: &'a mut S,
    cadence: Cadence,
    ticks_since_commit: usize,
    pending: usize,
    report: BatchReport,
}

impl<'a, S: GraphSession + ?Sized> Committer<'a, S> {
    pub fn new(session: &'a mut S, policy: CommitPolicy) -> Self {
        let cadence = match policy {
            CommitPolicy::EveryN { size } => Cadence::EveryN(size.max(1)),
            CommitPolicy::Random { one_in, seed } => Cadence::Random {
                one_in: one_in.max(1),
                rng: match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                },
            },
        };
        Self {
            session,
            cadence,
            ticks_since_commit: 0,
            pending: 0,
            report: BatchReport::default(),
        }
    }

    pub fn session(&mut self) -> &mut S {
        &mut *self.session
    }

    /// A write went through; it counts as inserted once committed
    pub fn record(&mut self) {
        self.pending += 1;
    }

    pub fn skip(&mut self, n: usize) {
        self.report.skipped += n;
    }

    /// One input item is done; commit if the policy says so
    pub fn tick(&mut self) -> SessionResult<()> {
        self.ticks_since_commit += 1;
        let due = match &mut self.cadence {
            Cadence::EveryN(size) => self.ticks_since_commit >= *size,
            Cadence::Random { one_in, rng } => rng.gen_range(1..=*one_in) == 1,
        };
        if due {
            self.commit()?;
        }
        Ok(())
    }

    /// A write failed: roll back the open segment and count the failing
    /// write together with the writes lost with it
    pub fn fail(&mut self, what: &str, error: &dyn std::fmt::Display) -> SessionResult<()> {
        let lost = self.pending + 1;
        warn!(
            "Failed to write {}: {}; rolling back {} uncommitted writes",
            what, error, self.pending
        );
        self.session.rollback()?;
        self.report.failed += lost;
        self.pending = 0;
        Ok(())
    }

    fn commit(&mut self) -> SessionResult<()> {
        self.session.commit()?;
        self.report.inserted += self.pending;
        self.report.commits += 1;
        self.pending = 0;
        self.ticks_since_commit = 0;
        Ok(())
    }

    /// Final unconditional commit
    pub fn finish(mut self) -> SessionResult<BatchReport> {
        self.commit()?;
        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{property_map, Label};
    use crate::session::EmbeddedSession;

    fn user_session() -> EmbeddedSession {
        let mut session = EmbeddedSession::in_memory();
        session.create_vertex_type(&Label::new("User")).unwrap();
        session
    }

    fn add_user(committer: &mut Committer<'_, EmbeddedSession>, id: i64) {
        committer
            .session()
            .add_vertex(&Label::new("User"), property_map([("userId", id.into())]))
            .unwrap();
        committer.record();
    }

    #[test]
    fn test_every_n_commits_on_schedule() {
        let mut session = user_session();
        let mut committer = Committer::new(&mut session, CommitPolicy::EveryN { size: 3 });
        for id in 1..=7 {
            add_user(&mut committer, id);
            committer.tick().unwrap();
        }
        assert_eq!(committer.report.commits, 2);
        assert_eq!(committer.pending, 1);

        let report = committer.finish().unwrap();
        assert_eq!(report.inserted, 7);
        assert_eq!(report.commits, 3);
        assert_eq!(session.pending_writes(), 0);
    }

    #[test]
    fn test_fail_counts_rolled_back_writes() {
        let mut session = user_session();
        let mut committer = Committer::new(&mut session, CommitPolicy::EveryN { size: 10 });
        add_user(&mut committer, 1);
        add_user(&mut committer, 2);
        committer.fail("User 3", &"boom").unwrap();
        add_user(&mut committer, 4);

        let report = committer.finish().unwrap();
        assert_eq!(report.failed, 3);
        assert_eq!(report.inserted, 1);
        assert_eq!(session.count_vertices(&Label::new("User")).unwrap(), 1);
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let commits_for = |seed| {
            let mut session = user_session();
            let mut committer = Committer::new(&mut session, CommitPolicy::legacy(Some(seed)));
            for _ in 0..500 {
                committer.tick().unwrap();
            }
            committer.report.commits
        };

        let first = commits_for(7);
        assert_eq!(first, commits_for(7));
        // Roughly one in twenty
        assert!((5..=60).contains(&first), "got {} commits", first);
    }

    #[test]
    fn test_report_add_assign_and_rate() {
        let mut total = BatchReport::default();
        total += BatchReport { inserted: 2, skipped: 1, failed: 0, commits: 1 };
        total += BatchReport { inserted: 3, skipped: 0, failed: 4, commits: 2 };
        assert_eq!(total, BatchReport { inserted: 5, skipped: 1, failed: 4, commits: 3 });

        assert_eq!(ms_per_record(Duration::from_millis(500), 0), 0.0);
        assert_eq!(ms_per_record(Duration::from_millis(500), 250), 2.0);
    }

    #[test]
    fn test_policy_validation_and_serde() {
        assert!(CommitPolicy::EveryN { size: 0 }.validate().is_err());
        assert!(CommitPolicy::default().validate().is_ok());

        let policy: CommitPolicy = serde_yaml::from_str("mode: random\none_in: 20\nseed: 3").unwrap();
        assert_eq!(policy, CommitPolicy::legacy(Some(3)));
        let policy: CommitPolicy = serde_yaml::from_str("mode: every_n\nsize: 50").unwrap();
        assert_eq!(policy, CommitPolicy::EveryN { size: 50 });
    }
}
