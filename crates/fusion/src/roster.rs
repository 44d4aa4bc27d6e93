//! Member/observer state roster for donor classification.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{DonorStatus, FusedContributionRecord};
use crate::normalize::strip_footnotes;
use crate::reference::ReferenceTables;

#[derive(Debug, Clone)]
pub struct StateRoster {
    members: BTreeSet<String>,
    observers: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
    government_code: String,
}

impl StateRoster {
    pub fn new(tables: &ReferenceTables, government_code: &str) -> Self {
        let aliases: BTreeMap<String, String> = tables
            .state_aliases
            .iter()
            .map(|(k, v)| (strip_footnotes(k), strip_footnotes(v)))
            .collect();
        let canonical = |name: &String| -> String {
            let name = strip_footnotes(name);
            aliases.get(&name).cloned().unwrap_or(name)
        };
        let members = tables.member_states.iter().map(canonical).collect();
        let observers = tables.observer_states.iter().map(canonical).collect();
        Self {
            members,
            observers,
            aliases,
            government_code: government_code.to_string(),
        }
    }

    fn canonical(&self, name: &str) -> String {
        let name = strip_footnotes(name);
        match self.aliases.get(&name) {
            Some(c) => c.clone(),
            None => name,
        }
    }

    pub fn is_government(&self, record: &FusedContributionRecord) -> bool {
        record.contrib_code.is_code(&self.government_code)
    }

    /// Exactly one status per donor. Governments outside both lists are
    /// non-members; everything else is an organization.
    pub fn status(&self, donor: &str, government: bool) -> DonorStatus {
        if !government {
            return DonorStatus::Organization;
        }
        let name = self.canonical(donor);
        if self.members.contains(&name) {
            DonorStatus::Member
        } else if self.observers.contains(&name) {
            DonorStatus::Observer
        } else {
            DonorStatus::Nonmember
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> StateRoster {
        let mut tables = ReferenceTables::builtin();
        tables.member_states = ["Netherlands", "Japan"].iter().map(|s| s.to_string()).collect();
        tables.observer_states = ["Holy See"].iter().map(|s| s.to_string()).collect();
        StateRoster::new(&tables, "C01")
    }

    #[test]
    fn classifies_governments_by_roster() {
        let r = roster();
        assert_eq!(r.status("Japan", true), DonorStatus::Member);
        assert_eq!(r.status("Netherlands (Kingdom of the)", true), DonorStatus::Member);
        assert_eq!(r.status("Holy See*", true), DonorStatus::Observer);
        assert_eq!(r.status("Kosovo", true), DonorStatus::Nonmember);
    }

    #[test]
    fn non_government_is_organization() {
        assert_eq!(roster().status("Japan", false), DonorStatus::Organization);
    }
}
