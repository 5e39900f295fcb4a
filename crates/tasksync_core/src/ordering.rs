//! crates/tasksync_core/src/ordering.rs
//!
//! Pure rules for the per-user order sequence.
//!
//! For every user the positions of their visible tasks (owned and shared to
//! them) are exactly `1..=N`. The storage adapter applies these rules inside
//! its transactions; nothing here touches the database.

use crate::ports::{PortError, PortResult};

/// Position a newly visible task receives when appended to a sequence of `visible` tasks.
pub fn append_position(visible: i64) -> i64 {
    visible + 1
}

/// Checks that a new entry may be inserted at `position` in a sequence of `visible` tasks.
pub fn check_insert(position: i64, visible: i64) -> PortResult<()> {
    if position < 1 || position > append_position(visible) {
        return Err(PortError::Validation(format!(
            "position {} is outside 1..={}",
            position,
            append_position(visible)
        )));
    }
    Ok(())
}

/// Checks that an existing entry may be moved to `position` in a sequence of `visible` tasks.
pub fn check_move(position: i64, visible: i64) -> PortResult<()> {
    if position < 1 || position > visible {
        return Err(PortError::Validation(format!(
            "position {} is outside 1..={}",
            position, visible
        )));
    }
    Ok(())
}

/// A swap only keeps the sequence dense when the task moving down sits directly
/// above the task moving up.
pub fn check_adjacent(position_up: i64, position_down: i64) -> PortResult<()> {
    if position_up + 1 != position_down {
        return Err(PortError::Validation(format!(
            "tasks at positions {} and {} are not adjacent",
            position_up, position_down
        )));
    }
    Ok(())
}

/// Shift applied to every entry whose position lies in `from..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeShift {
    pub from: i64,
    pub to: i64,
    pub delta: i64,
}

/// Plans the shift of the entries between `current` and `target` when one
/// entry moves from `current` to `target`. `None` when nothing moves.
pub fn plan_move(current: i64, target: i64) -> Option<RangeShift> {
    match target.cmp(&current) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Less => Some(RangeShift {
            from: target,
            to: current - 1,
            delta: 1,
        }),
        std::cmp::Ordering::Greater => Some(RangeShift {
            from: current + 1,
            to: target,
            delta: -1,
        }),
    }
}

/// True when `positions` is a permutation of `1..=positions.len()`.
pub fn is_dense(positions: &[i64]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .zip(1_i64..)
        .all(|(position, expected)| *position == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_goes_after_last_visible_task() {
        assert_eq!(append_position(0), 1);
        assert_eq!(append_position(4), 5);
    }

    #[test]
    fn insert_accepts_any_slot_up_to_the_end() {
        assert!(check_insert(1, 0).is_ok());
        assert!(check_insert(3, 2).is_ok());
        assert!(matches!(check_insert(0, 2), Err(PortError::Validation(_))));
        assert!(matches!(check_insert(4, 2), Err(PortError::Validation(_))));
    }

    #[test]
    fn move_rejects_positions_past_the_end() {
        assert!(check_move(2, 2).is_ok());
        assert!(matches!(check_move(3, 2), Err(PortError::Validation(_))));
        assert!(matches!(check_move(1, 0), Err(PortError::Validation(_))));
    }

    #[test]
    fn swap_requires_neighbours_in_order() {
        assert!(check_adjacent(2, 3).is_ok());
        assert!(check_adjacent(3, 2).is_err());
        assert!(check_adjacent(1, 3).is_err());
        assert!(check_adjacent(2, 2).is_err());
    }

    #[test]
    fn moving_up_pushes_the_range_down() {
        assert_eq!(
            plan_move(5, 2),
            Some(RangeShift {
                from: 2,
                to: 4,
                delta: 1
            })
        );
    }

    #[test]
    fn moving_down_pulls_the_range_up() {
        assert_eq!(
            plan_move(2, 5),
            Some(RangeShift {
                from: 3,
                to: 5,
                delta: -1
            })
        );
        assert_eq!(plan_move(3, 3), None);
    }

    #[test]
    fn density_detects_gaps_and_duplicates() {
        assert!(is_dense(&[]));
        assert!(is_dense(&[3, 1, 2]));
        assert!(!is_dense(&[1, 3]));
        assert!(!is_dense(&[1, 2, 2]));
        assert!(!is_dense(&[0, 1]));
    }
}
