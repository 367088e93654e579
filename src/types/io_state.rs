//! IoState type for the device's digital input/output bytes

use serde::{Serialize, Serializer};

/// Eight digital lines packed into one status byte.
///
/// Bit 0 is line 1. Inputs and outputs share the representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoState(pub u8);

impl IoState {
    /// Number of lines carried per byte.
    pub const LINES: u8 = 8;

    /// Create a new IoState from the raw status byte.
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    /// Check whether a 1-based line is active. Lines outside 1..=8 are never active.
    pub fn is_active(&self, line: u8) -> bool {
        (1..=Self::LINES).contains(&line) && self.0 & (1 << (line - 1)) != 0
    }

    /// Every line state in order, line 1 first.
    pub fn lines(&self) -> [bool; 8] {
        std::array::from_fn(|bit| self.0 & (1 << bit) != 0)
    }

    /// 1-based numbers of the active lines.
    pub fn active_lines(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=Self::LINES).filter(move |line| self.is_active(*line))
    }

    /// Get the raw byte value.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Serialize for IoState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.lines().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_one_based_from_the_low_bit() {
        let state = IoState::new(0b0000_0101);
        assert!(state.is_active(1));
        assert!(!state.is_active(2));
        assert!(state.is_active(3));
        assert_eq!(state.active_lines().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn out_of_range_lines_are_inactive() {
        let state = IoState::new(0xFF);
        assert!(!state.is_active(0));
        assert!(!state.is_active(9));
        assert_eq!(state.lines(), [true; 8]);
    }

    #[test]
    fn serializes_as_line_array() {
        let json = serde_json::to_string(&IoState::new(0b1000_0001)).unwrap();
        assert_eq!(json, "[true,false,false,false,false,false,false,true]");
    }
}
