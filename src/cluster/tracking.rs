//! Coordinated group tracking across sweep steps
//!
//! Raw communities are ranked by size (largest first, ties by ascending
//! label) and re-indexed as candidates. With no previous groups, every
//! candidate of at least `min_cardinality` members founds a group. With
//! previous groups, each candidate is matched to the previous group it
//! shares the most members with; on equal overlaps the lowest group id
//! wins. Group ids are not in candidate-rank order once splits have
//! founded groups, so this can differ from scanning the previous groups
//! in the order their candidates were ranked.
//!
//! When several candidates match the same previous group, the one with
//! the largest overlap continues it (equal overlaps go to the better
//! ranked candidate). The others are split-offs: they found a new group if
//! they have at least `min_cardinality` members and are dropped otherwise.
//! A continuing candidate keeps its group whatever its current size.

use crate::cluster::{
    Correspondence, CoordinatedGroups, GroupId, RawPartition, SweepRecord, TrackedRecord,
};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

/// What happened to one candidate during a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Continued an existing group
    Continued(GroupId),
    /// Matched a group claimed by a stronger candidate, founded a new one
    SplitOff(GroupId),
    /// Unmatched, founded a new group
    Founded(GroupId),
    /// Produced no group this step
    Dropped,
}

impl MatchOutcome {
    pub fn group(&self) -> Option<GroupId> {
        match *self {
            MatchOutcome::Continued(g) | MatchOutcome::SplitOff(g) | MatchOutcome::Founded(g) => {
                Some(g)
            }
            MatchOutcome::Dropped => None,
        }
    }
}

/// Diagnostics for one ranked candidate community
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMatch {
    /// Rank of the candidate, 0 = largest
    pub candidate: usize,
    /// Oracle label the candidate came from
    pub label: u32,
    pub size: usize,
    /// Previous group with the largest overlap, if any overlap exists
    pub matched: Option<GroupId>,
    pub overlap: usize,
    pub outcome: MatchOutcome,
}

/// Result of one tracker transition
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub groups: CoordinatedGroups,
    pub correspondences: BTreeMap<usize, Correspondence>,
    /// Previous groups matched by several candidates, winner first
    pub contested: BTreeMap<GroupId, Vec<usize>>,
    pub candidates: Vec<CandidateMatch>,
    /// Counter after this step: number of ids allocated so far
    pub already_found: GroupId,
}

/// Rank raw communities by size, largest first
///
/// Fails when a node belongs to more than one community.
fn rank_candidates(partition: &RawPartition) -> Result<Vec<(u32, &[String])>> {
    let mut seen: HashSet<&str> = HashSet::new();
    for (label, members) in partition {
        for member in members {
            if !seen.insert(member.as_str()) {
                return Err(Error::DataIntegrity(format!(
                    "node '{}' appears more than once (community {})",
                    member, label
                )));
            }
        }
    }

    let mut ranked: Vec<(u32, &[String])> = partition
        .iter()
        .map(|(&label, members)| (label, members.as_slice()))
        .collect();
    // stable: equal sizes keep ascending label order
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    Ok(ranked)
}

/// Previous group sharing the most members with `members`
fn best_overlap(
    members: &[String],
    owner: &HashMap<&str, GroupId>,
) -> Option<(GroupId, usize)> {
    let mut counts: BTreeMap<GroupId, usize> = BTreeMap::new();
    for member in members {
        if let Some(&group) = owner.get(member.as_str()) {
            *counts.entry(group).or_insert(0) += 1;
        }
    }

    // ascending ids, strict comparison: first maximum wins
    let mut best: Option<(GroupId, usize)> = None;
    for (group, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((group, count));
        }
    }
    best
}

/// Compute one step's coordinated groups
///
/// `already_found` is the number of identifiers allocated before this step;
/// the updated value is returned in the transition.
pub fn correspond(
    partition: &RawPartition,
    previous: Option<&CoordinatedGroups>,
    min_cardinality: usize,
    already_found: GroupId,
) -> Result<Transition> {
    let ranked = rank_candidates(partition)?;
    let mut next_id = already_found;
    let mut groups = CoordinatedGroups::new();
    let mut correspondences = BTreeMap::new();
    let mut candidates = Vec::with_capacity(ranked.len());

    let Some(previous) = previous else {
        for (candidate, &(label, members)) in ranked.iter().enumerate() {
            let outcome = if members.len() >= min_cardinality {
                let id = next_id;
                next_id += 1;
                groups.insert(id, members.to_vec());
                correspondences.insert(candidate, Correspondence::single(id, members.len()));
                MatchOutcome::Founded(id)
            } else {
                MatchOutcome::Dropped
            };
            candidates.push(CandidateMatch {
                candidate,
                label,
                size: members.len(),
                matched: None,
                overlap: 0,
                outcome,
            });
        }

        return Ok(Transition {
            groups,
            correspondences,
            contested: BTreeMap::new(),
            candidates,
            already_found: next_id,
        });
    };

    let owner: HashMap<&str, GroupId> = previous
        .iter()
        .flat_map(|(&group, members)| members.iter().map(move |m| (m.as_str(), group)))
        .collect();

    let matches: Vec<Option<(GroupId, usize)>> = ranked
        .iter()
        .map(|(_, members)| best_overlap(members, &owner))
        .collect();

    // Every candidate pointing at each previous group, in rank order
    let mut claims: BTreeMap<GroupId, Vec<usize>> = BTreeMap::new();
    for (candidate, matched) in matches.iter().enumerate() {
        if let Some((group, _)) = matched {
            claims.entry(*group).or_default().push(candidate);
        }
    }

    let mut contested = BTreeMap::new();
    let mut winners: HashMap<GroupId, usize> = HashMap::new();
    for (&group, claimants) in &claims {
        let overlap_of = |c: usize| matches[c].map_or(0, |(_, overlap)| overlap);
        let mut ordered = claimants.clone();
        // stable: equal overlaps keep rank order
        ordered.sort_by(|&a, &b| overlap_of(b).cmp(&overlap_of(a)));
        winners.insert(group, ordered[0]);
        if ordered.len() > 1 {
            log::debug!(
                "Group {} split across {} candidates, candidate {} continues it",
                group,
                ordered.len(),
                ordered[0]
            );
            contested.insert(group, ordered);
        }
    }

    for (candidate, &(label, members)) in ranked.iter().enumerate() {
        let size = members.len();
        let matched = matches[candidate];

        let outcome = match matched {
            Some((group, _)) if winners.get(&group) == Some(&candidate) => {
                groups.insert(group, members.to_vec());
                MatchOutcome::Continued(group)
            }
            Some(_) if size >= min_cardinality => {
                let id = next_id;
                next_id += 1;
                groups.insert(id, members.to_vec());
                MatchOutcome::SplitOff(id)
            }
            None if size >= min_cardinality => {
                let id = next_id;
                next_id += 1;
                groups.insert(id, members.to_vec());
                MatchOutcome::Founded(id)
            }
            _ => MatchOutcome::Dropped,
        };

        if let Some((group, overlap)) = matched {
            correspondences.insert(candidate, Correspondence::single(group, overlap));
        }

        candidates.push(CandidateMatch {
            candidate,
            label,
            size,
            matched: matched.map(|(g, _)| g),
            overlap: matched.map_or(0, |(_, o)| o),
            outcome,
        });
    }

    Ok(Transition {
        groups,
        correspondences,
        contested,
        candidates,
        already_found: next_id,
    })
}

/// Streaming tracker holding the state between transitions
#[derive(Debug, Clone)]
pub struct GroupTracker {
    min_cardinality: usize,
    previous: Option<CoordinatedGroups>,
    already_found: GroupId,
}

impl GroupTracker {
    pub fn new(min_cardinality: usize) -> Self {
        Self {
            min_cardinality,
            previous: None,
            already_found: 0,
        }
    }

    /// Number of group identifiers allocated so far
    pub fn already_found(&self) -> GroupId {
        self.already_found
    }

    /// Apply one step's partition and advance the state
    pub fn advance(&mut self, partition: &RawPartition) -> Result<Transition> {
        let transition = correspond(
            partition,
            self.previous.as_ref(),
            self.min_cardinality,
            self.already_found,
        )?;
        self.already_found = transition.already_found;
        self.previous = Some(transition.groups.clone());
        Ok(transition)
    }

    /// Advance on a sweep record and build its persisted form
    pub fn track(&mut self, record: SweepRecord) -> Result<TrackedRecord> {
        let transition = self.advance(&record.communities_raw)?;
        log::debug!(
            "Step {} (quantile {:.4}): {} raw communities, {} coordinated groups, {} ids allocated",
            record.step,
            record.quantile,
            record.communities_raw.len(),
            transition.groups.len(),
            transition.already_found
        );

        Ok(TrackedRecord {
            step: record.step,
            quantile: record.quantile,
            threshold: record.threshold,
            communities_raw: record.communities_raw,
            coordinated_groups: transition.groups,
            correspondences: transition.correspondences,
            contested: transition.contested,
        })
    }
}

/// Track a persisted partition stream from scratch
pub fn track_records(
    records: impl IntoIterator<Item = SweepRecord>,
    min_cardinality: usize,
) -> Result<(Vec<TrackedRecord>, GroupId)> {
    let mut tracker = GroupTracker::new(min_cardinality);
    let tracked = records
        .into_iter()
        .map(|record| tracker.track(record))
        .collect::<Result<Vec<_>>>()?;
    Ok((tracked, tracker.already_found()))
}
