//! Coordinated group detection module
//!
//! A threshold sweep re-partitions the similarity graph at increasingly
//! strict edge-weight quantiles. The tracker then maps each step's raw
//! communities onto persistent group identifiers, and the statistics pass
//! measures every group along its lineage.

pub mod oracle;
pub mod sweep;
pub mod tracking;
pub mod metrics;
pub mod lineage;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Persistent coordinated group identifier, allocated once per tracking run
pub type GroupId = u32;

/// Community label assigned by the partitioning oracle within one step
pub type CommunityLabel = u32;

/// Node id to community label, used as the seed for the next oracle call
pub type Assignment = HashMap<String, CommunityLabel>;

/// Oracle communities of one step: label to member node ids
pub type RawPartition = BTreeMap<CommunityLabel, Vec<String>>;

/// Coordinated groups of one step: persistent id to member node ids
pub type CoordinatedGroups = BTreeMap<GroupId, Vec<String>>;

/// Persisted correspondence of one raw candidate community
///
/// `to[0]` is the previous-step group sharing the most members with the
/// candidate and `intersection[0]` the size of that overlap. Several
/// candidates may point at the same group when it split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correspondence {
    pub to: Vec<GroupId>,
    pub intersection: Vec<usize>,
}

impl Correspondence {
    pub fn single(group: GroupId, overlap: usize) -> Self {
        Self {
            to: vec![group],
            intersection: vec![overlap],
        }
    }
}

/// Partition persisted for one sweep step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub step: usize,
    pub quantile: f64,
    pub threshold: f64,
    pub communities_raw: RawPartition,
}

/// Sweep record extended with the tracked coordinated groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRecord {
    pub step: usize,
    pub quantile: f64,
    pub threshold: f64,
    pub communities_raw: RawPartition,
    pub coordinated_groups: CoordinatedGroups,
    pub correspondences: BTreeMap<usize, Correspondence>,
    /// Groups matched by more than one candidate, winning candidate first
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contested: BTreeMap<GroupId, Vec<usize>>,
}

/// Group raw labels into a partition following node order
pub fn reverse_assignment<'a>(
    labels: impl IntoIterator<Item = (&'a str, CommunityLabel)>,
) -> RawPartition {
    let mut partition = RawPartition::new();
    for (node, label) in labels {
        partition.entry(label).or_default().push(node.to_string());
    }
    partition
}

/// Flatten a partition back into a node to label assignment
///
/// A node listed under several labels keeps the first label encountered.
pub fn flatten_partition(partition: &RawPartition) -> Assignment {
    let mut assignment = Assignment::new();
    for (&label, members) in partition {
        for member in members {
            assignment.entry(member.clone()).or_insert(label);
        }
    }
    assignment
}
