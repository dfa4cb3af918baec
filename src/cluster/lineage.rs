//! Last coordinated group each entity survives in

use crate::cluster::{GroupId, TrackedRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strictest step at which an entity still belongs to a coordinated group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survival {
    pub group: GroupId,
    pub step: usize,
    pub quantile: f64,
    pub threshold: f64,
}

/// Map every entity to the last step and group it survives in
///
/// Entities never part of a coordinated group are absent from the result.
pub fn last_surviving(records: &[TrackedRecord]) -> BTreeMap<String, Survival> {
    let mut survivals = BTreeMap::new();
    for record in records {
        for (&group, members) in &record.coordinated_groups {
            for member in members {
                survivals.insert(
                    member.clone(),
                    Survival {
                        group,
                        step: record.step,
                        quantile: record.quantile,
                        threshold: record.threshold,
                    },
                );
            }
        }
    }
    survivals
}
