//! # Waypoint cycle index
//!
//! Stateless selection of the next waypoint to visit.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::{CycleMode, Waypoint, WaypointSequence};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("The waypoint sequence is empty")]
    EmptySequence,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Index of the waypoint after `current` in a sequence of `len` waypoints.
///
/// `current` of `None` means the traversal is starting. Returns `Ok(None)` when a
/// [`CycleMode::LinearOnce`] traversal has passed the last waypoint. An index beyond the end of
/// the sequence is treated as having passed the last waypoint.
pub fn next_index(
    len: usize,
    current: Option<usize>,
    mode: CycleMode,
) -> Result<Option<usize>, CycleError> {
    if len == 0 {
        return Err(CycleError::EmptySequence);
    }

    let next = match current {
        None => 0,
        Some(i) => i.saturating_add(1),
    };

    if next < len {
        return Ok(Some(next));
    }

    match mode {
        CycleMode::LinearOnce => Ok(None),
        CycleMode::Loop => Ok(Some(0)),
    }
}

/// The waypoint after `current`, along with its index.
pub fn next(
    sequence: &WaypointSequence,
    current: Option<usize>,
    mode: CycleMode,
) -> Result<Option<(usize, &Waypoint)>, CycleError> {
    let index = next_index(sequence.len(), current, mode)?;

    Ok(index.and_then(|i| sequence.get(i).map(|w| (i, w))))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::waypoint::WaypointStatus;
    use chrono::NaiveDate;
    use nalgebra::Vector3;

    #[test]
    fn test_linear_once() {
        assert_eq!(next_index(3, None, CycleMode::LinearOnce), Ok(Some(0)));
        assert_eq!(next_index(3, Some(0), CycleMode::LinearOnce), Ok(Some(1)));
        assert_eq!(next_index(3, Some(1), CycleMode::LinearOnce), Ok(Some(2)));
        assert_eq!(next_index(3, Some(2), CycleMode::LinearOnce), Ok(None));
        assert_eq!(next_index(3, Some(7), CycleMode::LinearOnce), Ok(None));
    }

    #[test]
    fn test_loop() {
        let mut current = None;
        let mut visited = vec![];
        for _ in 0..7 {
            current = next_index(3, current, CycleMode::Loop).unwrap();
            visited.push(current.unwrap());
        }
        assert_eq!(visited, vec![0, 1, 2, 0, 1, 2, 0]);

        assert_eq!(next_index(3, Some(7), CycleMode::Loop), Ok(Some(0)));
        assert_eq!(next_index(1, Some(0), CycleMode::Loop), Ok(Some(0)));
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(
            next_index(0, None, CycleMode::Loop),
            Err(CycleError::EmptySequence)
        );
        assert_eq!(
            next(&WaypointSequence::new(), None, CycleMode::LinearOnce).err(),
            Some(CycleError::EmptySequence)
        );
    }

    #[test]
    fn test_next_waypoint() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let seq: WaypointSequence = (0..2)
            .map(|i| Waypoint::record(Vector3::new(i as f64, 0.0, 0.0), WaypointStatus::Success, t))
            .collect();

        let (i, wp) = next(&seq, Some(0), CycleMode::Loop).unwrap().unwrap();
        assert_eq!(i, 1);
        assert_eq!(wp.position_m, Vector3::new(1.0, 0.0, 0.0));

        assert!(next(&seq, Some(1), CycleMode::LinearOnce).unwrap().is_none());
    }
}
