use std::collections::BTreeMap;

use tracing::trace;

use super::errors::{ChainError, Result};
use crate::dns::{DomainName, ResourceRecord};

/// All records owned by one name of the chain, root first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub owner: DomainName,
    pub records: Vec<ResourceRecord>,
}

/// Group chain records into levels ordered from the root towards `target`.
///
/// Every owner must be `target` or one of its ancestors, so owners with the
/// same label count are the same name and sorting by label count follows the
/// ancestor relation.
pub fn partition(records: Vec<ResourceRecord>, target: &DomainName) -> Result<Vec<Level>> {
    let mut by_depth: BTreeMap<usize, Level> = BTreeMap::new();

    for record in records {
        if !record.name.is_ancestor_or_self(target) {
            return Err(ChainError::UnrelatedRecord {
                name: record.name,
                target: target.clone(),
            });
        }
        by_depth
            .entry(record.name.label_count())
            .or_insert_with(|| Level {
                owner: record.name.clone(),
                records: Vec::new(),
            })
            .records
            .push(record);
    }

    let levels: Vec<Level> = by_depth.into_values().collect();
    if levels.len() < 2 {
        return Err(ChainError::InsufficientLevels(levels.len()));
    }

    if let Some(deepest) = levels.last() {
        if &deepest.owner != target {
            return Err(ChainError::MissingTargetLevel {
                deepest: deepest.owner.clone(),
                target: target.clone(),
            });
        }
    }

    trace!(
        "Partitioned chain for {} into levels: {:?}",
        target,
        levels.iter().map(|l| l.owner.to_string()).collect::<Vec<_>>()
    );
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{RData, Tlsa};

    fn record(owner: &str, tag: u8) -> ResourceRecord {
        ResourceRecord::new(
            owner.parse().unwrap(),
            60,
            RData::Tlsa(Tlsa {
                usage: 3,
                selector: 1,
                matching_type: 1,
                data: vec![tag],
            }),
        )
    }

    #[test]
    fn test_levels_follow_hierarchy_not_input_order() {
        let target: DomainName = "_443._tcp.example.tld.".parse().unwrap();
        let levels = partition(
            vec![
                record("_443._tcp.example.tld.", 1),
                record(".", 2),
                record("TLD.", 3),
                record(".", 4),
                record("tld.", 5),
            ],
            &target,
        )
        .unwrap();

        let owners: Vec<String> = levels.iter().map(|l| l.owner.to_string()).collect();
        assert_eq!(owners, vec![".", "tld.", "_443._tcp.example.tld."]);
        assert_eq!(levels[0].records.len(), 2);
        assert_eq!(levels[1].records.len(), 2);
    }

    #[test]
    fn test_unrelated_owner_rejected() {
        let target: DomainName = "_443._tcp.example.tld.".parse().unwrap();
        let err = partition(vec![record(".", 1), record("other.", 2)], &target).unwrap_err();
        assert!(matches!(err, ChainError::UnrelatedRecord { .. }));
    }

    #[test]
    fn test_single_level_rejected() {
        let target: DomainName = "tld.".parse().unwrap();
        assert_eq!(
            partition(vec![record("tld.", 1)], &target),
            Err(ChainError::InsufficientLevels(1))
        );
        assert_eq!(partition(vec![], &target), Err(ChainError::InsufficientLevels(0)));
    }

    #[test]
    fn test_chain_must_reach_target() {
        let target: DomainName = "_443._tcp.example.tld.".parse().unwrap();
        let err = partition(vec![record(".", 1), record("tld.", 2)], &target).unwrap_err();
        assert!(matches!(err, ChainError::MissingTargetLevel { .. }));
    }
}
