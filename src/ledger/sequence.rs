// src/ledger/sequence.rs
//! Process-sequence table and the stage state machine.
//!
//! The same allowed-set computation runs in the client session before a
//! submission and in the backend when it re-validates, so both sides agree on
//! which forward moves exist.

use serde::Serialize;

use super::error::{LedgerError, LedgerResult};
use super::process::{Department, Process, ProductionStatus};

use Process::*;

/// Stages after Forging, in order.
pub const CANONICAL_SEQUENCE: [Process; 7] = [
    HeatTreatment,
    PreMachining,
    Machining,
    FinalInspection,
    Marking,
    Visual,
    Dispatch,
];

pub struct ProcessSequence;

impl ProcessSequence {
    /// Stages a department may send a batch to. Each entry is a suffix of
    /// [`CANONICAL_SEQUENCE`], except that Marking lists Final Inspection and
    /// Forging lists only the head of the sequence.
    pub fn for_department(department: Department) -> &'static [Process] {
        match department {
            Department::Admin => &CANONICAL_SEQUENCE,
            Department::Forging => &[HeatTreatment],
            Department::HeatTreatment => &[PreMachining, Machining, FinalInspection, Marking, Visual, Dispatch],
            Department::PreMachining => &[Machining, FinalInspection, Marking, Visual, Dispatch],
            Department::Cnc => &[FinalInspection, Marking, Visual, Dispatch],
            Department::FinalInspection => &[Marking, Visual, Dispatch],
            Department::Marking => &[FinalInspection, Visual, Dispatch],
            Department::Visual => &[Dispatch],
            Department::Dispatch => &[],
        }
    }

    /// Forward stages selectable from `current` for an `ok` outcome.
    pub fn allowed_next(department: Department, current: Process) -> LedgerResult<Vec<Process>> {
        check_owner(department, current)?;

        let allowed = Self::for_department(department)
            .iter()
            .copied()
            .filter(|next| is_forward(current, *next))
            .collect();

        Ok(allowed)
    }
}

fn check_owner(department: Department, current: Process) -> LedgerResult<()> {
    if department.can_record(current) {
        return Ok(());
    }
    Err(LedgerError::InvalidTransition {
        from: current,
        to: None,
        reason: format!("department {} cannot move batches out of {}", department, current),
    })
}

fn is_forward(current: Process, next: Process) -> bool {
    match (current, next) {
        // Forging hands over to heat treatment and nothing else.
        (Forging, _) => next == HeatTreatment,
        (Marking, FinalInspection) | (FinalInspection, Marking) => true,
        _ => next.position() > current.position(),
    }
}

// ==================== STATE MACHINE ====================

/// Where a unit of work stands after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "process", rename_all = "snake_case")]
pub enum StageState {
    At(Process),
    Reject(Process),
    Rework(Process),
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        match self {
            StageState::At(process) => *process == Dispatch,
            StageState::Reject(_) | StageState::Rework(_) => true,
        }
    }
}

/// Applies one operator decision at `current`.
///
/// `reject` and `rework` bypass the sequence. For `ok`, `next` must be chosen
/// from [`ProcessSequence::allowed_next`]; Dispatch accepts `ok` without a
/// next stage since it is the end of the line.
pub fn advance(
    department: Department,
    current: Process,
    status: ProductionStatus,
    next: Option<Process>,
) -> LedgerResult<StageState> {
    check_owner(department, current)?;

    match status {
        ProductionStatus::Reject => Ok(StageState::Reject(current)),
        ProductionStatus::Rework => Ok(StageState::Rework(current)),
        ProductionStatus::Ok => {
            let allowed = ProcessSequence::allowed_next(department, current)?;
            match next {
                None if current == Dispatch => Ok(StageState::At(Dispatch)),
                None => Err(LedgerError::InvalidTransition {
                    from: current,
                    to: None,
                    reason: "a next process must be selected".to_string(),
                }),
                Some(next) if allowed.contains(&next) => Ok(StageState::At(next)),
                Some(next) => Err(LedgerError::InvalidTransition {
                    from: current,
                    to: Some(next),
                    reason: rejection_reason(current, next),
                }),
            }
        }
    }
}

fn rejection_reason(current: Process, next: Process) -> String {
    if next == current {
        "batch is already at this stage".to_string()
    } else if next.position() < current.position() {
        "stage already passed".to_string()
    } else {
        "stage not reachable from here".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_sequences_are_canonical_suffixes() {
        for department in Department::iter() {
            let sequence = ProcessSequence::for_department(department);
            if matches!(department, Department::Marking | Department::Forging) || sequence.is_empty() {
                continue;
            }
            let start = CANONICAL_SEQUENCE.len() - sequence.len();
            assert_eq!(sequence, &CANONICAL_SEQUENCE[start..], "{}", department);
        }
    }

    #[test]
    fn test_forging_only_moves_to_heat_treatment() {
        let allowed = ProcessSequence::allowed_next(Department::Forging, Forging).unwrap();
        assert_eq!(allowed, vec![HeatTreatment]);

        let allowed = ProcessSequence::allowed_next(Department::Admin, Forging).unwrap();
        assert_eq!(allowed, vec![HeatTreatment]);
    }

    #[test]
    fn test_admin_sees_every_later_stage() {
        let allowed = ProcessSequence::allowed_next(Department::Admin, PreMachining).unwrap();
        assert_eq!(allowed, vec![Machining, FinalInspection, Marking, Visual, Dispatch]);

        let allowed = ProcessSequence::allowed_next(Department::Admin, Dispatch).unwrap();
        assert!(allowed.is_empty());
    }

    #[test]
    fn test_marking_and_final_inspection_reach_each_other() {
        let from_marking = ProcessSequence::allowed_next(Department::Marking, Marking).unwrap();
        assert_eq!(from_marking, vec![FinalInspection, Visual, Dispatch]);

        let from_fi = ProcessSequence::allowed_next(Department::FinalInspection, FinalInspection).unwrap();
        assert_eq!(from_fi, vec![Marking, Visual, Dispatch]);
    }

    #[test]
    fn test_department_cannot_act_on_foreign_stage() {
        let err = ProcessSequence::allowed_next(Department::Visual, Machining).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { from: Machining, to: None, .. }));
    }

    #[test]
    fn test_backward_move_is_invalid() {
        let err = advance(Department::Cnc, Machining, ProductionStatus::Ok, Some(PreMachining)).unwrap_err();
        match err {
            LedgerError::InvalidTransition { from, to, reason } => {
                assert_eq!(from, Machining);
                assert_eq!(to, Some(PreMachining));
                assert_eq!(reason, "stage already passed");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = advance(Department::Cnc, Machining, ProductionStatus::Ok, Some(Machining)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_ok_requires_next_except_at_dispatch() {
        assert!(advance(Department::Visual, Visual, ProductionStatus::Ok, None).is_err());

        let state = advance(Department::Dispatch, Dispatch, ProductionStatus::Ok, None).unwrap();
        assert_eq!(state, StageState::At(Dispatch));
        assert!(state.is_terminal());
    }

    #[test]
    fn test_reject_and_rework_bypass_sequence() {
        let state = advance(Department::Cnc, Machining, ProductionStatus::Reject, Some(Forging)).unwrap();
        assert_eq!(state, StageState::Reject(Machining));
        assert!(state.is_terminal());

        let state = advance(Department::Cnc, Machining, ProductionStatus::Rework, None).unwrap();
        assert_eq!(state, StageState::Rework(Machining));
        assert!(state.is_terminal());
    }

    #[test]
    fn test_forward_move_lands_on_selected_stage() {
        let state = advance(Department::HeatTreatment, HeatTreatment, ProductionStatus::Ok, Some(Machining)).unwrap();
        assert_eq!(state, StageState::At(Machining));
        assert!(!state.is_terminal());
    }
}
