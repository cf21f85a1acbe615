// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use crate::types::{AccessError, SlaveIdx, SlaveInfo, SlaveState};

/// Directory of the slaves found by the last successful scan.
/// Slaves are addressed `1..=count()`; index 0 is the master and never stored.
#[derive(Debug, Clone, Default)]
pub struct SlaveRegistry {
    slaves: Vec<SlaveInfo>,
}

impl SlaveRegistry {
    pub(crate) fn from_slaves(slaves: Vec<SlaveInfo>) -> Self {
        Self { slaves }
    }

    pub fn count(&self) -> u16 {
        self.slaves.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.slaves.is_empty()
    }

    pub fn get(&self, idx: SlaveIdx) -> Result<&SlaveInfo, AccessError> {
        (idx as usize)
            .checked_sub(1)
            .and_then(|i| self.slaves.get(i))
            .ok_or(AccessError::InvalidIndex {
                index: i64::from(idx),
                count: self.count(),
            })
    }

    /// Slaves with their 1-based index.
    pub fn iter(&self) -> impl Iterator<Item = (SlaveIdx, &SlaveInfo)> {
        self.slaves
            .iter()
            .enumerate()
            .map(|(i, s)| (i as SlaveIdx + 1, s))
    }

    pub(crate) fn set_state(&mut self, idx: SlaveIdx, state: SlaveState) {
        if let Some(slave) = (idx as usize)
            .checked_sub(1)
            .and_then(|i| self.slaves.get_mut(i))
        {
            slave.state = state;
        }
    }

    pub(crate) fn set_all_states(&mut self, state: SlaveState) {
        for slave in &mut self.slaves {
            slave.state = state;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slaves.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SlaveId;

    fn registry() -> SlaveRegistry {
        SlaveRegistry::from_slaves(vec![
            SlaveInfo::new("EK1100", SlaveId::new(2, 0x044c_2c52), 0x1001),
            SlaveInfo::new("EM3E", SlaveId::new(0x0539, 0x0001), 0x1002),
        ])
    }

    #[test]
    fn indices_are_one_based() {
        let reg = registry();
        assert_eq!(reg.count(), 2);
        assert_eq!(reg.get(1).unwrap().name, "EK1100");
        assert_eq!(reg.get(2).unwrap().name, "EM3E");
        assert_eq!(
            reg.get(0).unwrap_err(),
            AccessError::InvalidIndex { index: 0, count: 2 }
        );
        assert!(reg.get(3).is_err());
        let names: Vec<_> = reg.iter().map(|(i, s)| (i, s.name.as_str())).collect();
        assert_eq!(names, vec![(1, "EK1100"), (2, "EM3E")]);
    }

    #[test]
    fn states_are_tracked() {
        let mut reg = registry();
        reg.set_all_states(SlaveState::SafeOp);
        reg.set_state(2, SlaveState::PreOp);
        reg.set_state(9, SlaveState::Op);
        assert_eq!(reg.get(1).unwrap().state, SlaveState::SafeOp);
        assert_eq!(reg.get(2).unwrap().state, SlaveState::PreOp);
        reg.clear();
        assert!(reg.is_empty());
    }
}
