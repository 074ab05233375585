// crates/core/src/sampler.rs
//! Commit-history metric sampling.
//!
//! Walks the commit DAG from HEAD, buckets commits into fixed-width time
//! sectors, and produces one `Metric` per non-empty sector. A second pass over
//! the same commit list aggregates per-contributor commit counts.
//!
//! Sectors are anchored at the first out-of-range commit rather than at the
//! previous sector's end, so long idle periods compress to zero sectors
//! instead of a run of empty ones.

use std::collections::HashMap;

use crate::error::IndexError;
use crate::sector::{CommitInfo, Sector, ONE_WEEK_SECS};

/// Summed patch totals for a pairwise diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffTotals {
    pub additions: i64,
    pub deletions: i64,
}

/// A repository's history as the sampler consumes it: the commit list from
/// HEAD in topological order, and pairwise diff totals by commit id.
pub trait History {
    /// All commits reachable from HEAD. An empty repository yields an empty
    /// list. Order does not matter; the sampler re-sorts by commit time.
    fn commits(&self) -> Result<Vec<CommitInfo>, IndexError>;

    /// Total additions and deletions introduced between `oldest` and `newest`
    /// (both inclusive of the commits' own changes).
    fn diff_totals(&self, newest: &str, oldest: &str) -> Result<DiffTotals, IndexError>;
}

/// One sampled record: repository activity within a single sector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    /// Id of the newest commit in the sector.
    pub anchor_commit_id: String,
    pub additions: i64,
    pub deletions: i64,
    pub commit_count: i64,
    pub activity: i64,
    /// Commit time of the oldest commit in the sector, Unix seconds.
    pub timestamp: i64,
}

/// A repository contributor, aggregated by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub name: String,
    pub email: String,
    pub count: i64,
}

/// Buckets commits into sectors and scores each one.
pub struct MetricSampler<'a, H: History> {
    history: &'a H,
    resolution: i64,
}

impl<'a, H: History> MetricSampler<'a, H> {
    pub fn new(history: &'a H) -> Self {
        Self::with_resolution(history, ONE_WEEK_SECS)
    }

    pub fn with_resolution(history: &'a H, resolution: i64) -> Self {
        Self {
            history,
            resolution,
        }
    }

    /// Sample the whole history: one `Metric` per non-empty sector, newest
    /// sector first.
    pub fn sample_all(&self) -> Result<Vec<Metric>, IndexError> {
        let commits = self.load_commits()?;
        let sectors = self.generate_sectors(commits);

        let mut samples = Vec::with_capacity(sectors.len());
        for sector in &sectors {
            if sector.is_empty() {
                continue;
            }
            samples.push(self.score(sector));
        }
        Ok(samples)
    }

    /// Aggregate contributors over the same commit list: email -> (name, count).
    pub fn contributors(&self) -> Result<Vec<Contributor>, IndexError> {
        let commits = self.history.commits()?;
        let mut by_email: HashMap<String, Contributor> = HashMap::new();
        for c in commits {
            by_email
                .entry(c.author_email.clone())
                .and_modify(|e| e.count += 1)
                .or_insert(Contributor {
                    name: c.author_name,
                    email: c.author_email,
                    count: 1,
                });
        }
        let mut contributors: Vec<Contributor> = by_email.into_values().collect();
        contributors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.email.cmp(&b.email)));
        Ok(contributors)
    }

    fn load_commits(&self) -> Result<Vec<CommitInfo>, IndexError> {
        let mut commits = self.history.commits()?;
        commits.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(commits)
    }

    /// Walk the (descending) commit list, opening a fresh sector anchored at
    /// each commit that falls outside the current one.
    fn generate_sectors(&self, commits: Vec<CommitInfo>) -> Vec<Sector> {
        let mut sectors = Vec::new();
        let mut current: Option<Sector> = None;

        for commit in commits {
            let accepted = match current.as_mut() {
                Some(sector) => sector.push(commit.clone()),
                None => false,
            };
            if !accepted {
                if let Some(done) = current.take() {
                    sectors.push(done);
                }
                let mut fresh = Sector::anchored_at(commit.time, self.resolution);
                fresh.push(commit);
                current = Some(fresh);
            }
        }

        // Close the last open sector.
        if let Some(done) = current {
            sectors.push(done);
        }
        sectors
    }

    /// Score one non-empty sector. Commits inside the sector are in
    /// descending time order: first is newest, last is oldest.
    fn score(&self, sector: &Sector) -> Metric {
        let commits = sector.commits();
        let count = commits.len() as i64;
        let newest = &commits[0];
        let oldest = &commits[commits.len() - 1];

        let (activity, additions, deletions) =
            match self.history.diff_totals(&newest.id, &oldest.id) {
                Ok(totals) => {
                    let changes = totals.additions + totals.deletions;
                    // Integer division: 1 for a lone commit, 0 otherwise.
                    (1 / count + changes, totals.additions, totals.deletions)
                }
                Err(err) => {
                    tracing::warn!(
                        anchor = %newest.id,
                        error = %err,
                        "diff failed for sector, emitting zeros"
                    );
                    (0, 0, 0)
                }
            };

        Metric {
            anchor_commit_id: newest.id.clone(),
            additions,
            deletions,
            commit_count: count,
            activity,
            timestamp: oldest.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted history: a fixed commit list plus per-pair diff totals.
    struct FakeHistory {
        commits: Vec<CommitInfo>,
        diffs: HashMap<(String, String), DiffTotals>,
        fail_diffs: bool,
    }

    impl FakeHistory {
        fn new(commits: Vec<CommitInfo>) -> Self {
            Self {
                commits,
                diffs: HashMap::new(),
                fail_diffs: false,
            }
        }

        fn with_diff(mut self, newest: &str, oldest: &str, additions: i64, deletions: i64) -> Self {
            self.diffs.insert(
                (newest.to_string(), oldest.to_string()),
                DiffTotals {
                    additions,
                    deletions,
                },
            );
            self
        }
    }

    impl History for FakeHistory {
        fn commits(&self) -> Result<Vec<CommitInfo>, IndexError> {
            Ok(self.commits.clone())
        }

        fn diff_totals(&self, newest: &str, oldest: &str) -> Result<DiffTotals, IndexError> {
            if self.fail_diffs {
                return Err(IndexError::ExternalSystem("bad id".into()));
            }
            Ok(self
                .diffs
                .get(&(newest.to_string(), oldest.to_string()))
                .copied()
                .unwrap_or_default())
        }
    }

    fn commit(id: &str, time: i64) -> CommitInfo {
        CommitInfo {
            id: id.to_string(),
            time,
            author_name: format!("author-{id}"),
            author_email: format!("{id}@example.com"),
        }
    }

    #[test]
    fn test_single_commit_repo() {
        // One commit at t=1000 with +10/-2.
        let history = FakeHistory::new(vec![commit("a", 1000)]).with_diff("a", "a", 10, 2);
        let metrics = MetricSampler::new(&history).sample_all().unwrap();

        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.commit_count, 1);
        assert_eq!(m.additions, 10);
        assert_eq!(m.deletions, 2);
        assert_eq!(m.activity, 1 + 10 + 2);
        assert_eq!(m.timestamp, 1000);
        assert_eq!(m.anchor_commit_id, "a");
    }

    #[test]
    fn test_two_commits_same_week() {
        // t=1000 (+5/-1), t=1200 (+3/-0): one sector, diff(newest, oldest).
        let history = FakeHistory::new(vec![commit("old", 1000), commit("new", 1200)])
            .with_diff("new", "old", 8, 1);
        let metrics = MetricSampler::new(&history).sample_all().unwrap();

        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.commit_count, 2);
        assert_eq!(m.additions, 8);
        assert_eq!(m.deletions, 1);
        // 1/2 truncates to 0
        assert_eq!(m.activity, 0 + 8 + 1);
        assert_eq!(m.anchor_commit_id, "new");
        assert_eq!(m.timestamp, 1000);
    }

    #[test]
    fn test_two_commits_one_week_apart() {
        let t0 = 1000;
        let t1 = 1000 + ONE_WEEK_SECS + 1;
        let history = FakeHistory::new(vec![commit("a", t0), commit("b", t1)])
            .with_diff("b", "b", 3, 0)
            .with_diff("a", "a", 2, 2);
        let metrics = MetricSampler::new(&history).sample_all().unwrap();

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].commit_count, 1);
        assert_eq!(metrics[1].commit_count, 1);
        assert_eq!(metrics[0].anchor_commit_id, "b");
        assert_eq!(metrics[1].anchor_commit_id, "a");
    }

    #[test]
    fn test_empty_repository_yields_no_sectors() {
        let history = FakeHistory::new(vec![]);
        let metrics = MetricSampler::new(&history).sample_all().unwrap();
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_idle_gap_produces_no_empty_sectors() {
        // Two bursts a year apart: exactly two sectors, not ~52.
        let year = 52 * ONE_WEEK_SECS;
        let history = FakeHistory::new(vec![
            commit("a", 1000),
            commit("b", 1100),
            commit("c", 1000 + year),
        ]);
        let metrics = MetricSampler::new(&history).sample_all().unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].commit_count, 1); // the lone newest commit
        assert_eq!(metrics[1].commit_count, 2);
    }

    #[test]
    fn test_sector_bounds_follow_anchor_commit() {
        // A commit just outside the current sector anchors the next one at its
        // own time, not at the previous sector's end.
        let t0 = 100_000;
        let t1 = t0 - ONE_WEEK_SECS - 50;
        let history = FakeHistory::new(vec![commit("new", t0), commit("old", t1)]);
        let metrics = MetricSampler::new(&history).sample_all().unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].timestamp, t1);
    }

    #[test]
    fn test_diff_failure_emits_zeros() {
        let mut history = FakeHistory::new(vec![commit("a", 1000)]);
        history.fail_diffs = true;
        let metrics = MetricSampler::new(&history).sample_all().unwrap();

        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!((m.activity, m.additions, m.deletions), (0, 0, 0));
        assert_eq!(m.commit_count, 1);
    }

    #[test]
    fn test_metric_invariants() {
        let history = FakeHistory::new(vec![
            commit("a", 1000),
            commit("b", 2000),
            commit("c", 3000 + ONE_WEEK_SECS),
        ])
        .with_diff("c", "c", 1, 1)
        .with_diff("b", "a", 4, 2);
        let metrics = MetricSampler::new(&history).sample_all().unwrap();
        for m in &metrics {
            assert!(m.additions >= 0);
            assert!(m.deletions >= 0);
            assert!(m.commit_count >= 1);
        }
    }

    #[test]
    fn test_contributors_aggregate_by_email() {
        let mut commits = vec![commit("a", 1000), commit("b", 2000), commit("c", 3000)];
        commits[1].author_email = "a@example.com".into();
        commits[1].author_name = "author-a".into();
        let history = FakeHistory::new(commits);

        let contributors = MetricSampler::new(&history).contributors().unwrap();
        assert_eq!(contributors.len(), 2);
        assert_eq!(contributors[0].email, "a@example.com");
        assert_eq!(contributors[0].count, 2);
        assert_eq!(contributors[1].count, 1);
    }
}
