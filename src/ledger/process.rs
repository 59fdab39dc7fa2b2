// src/ledger/process.rs
//! Process stages, departments and entry status.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

// ==================== PROCESS STAGES ====================

/// One stage of the plant's manufacturing chain, in chain-of-custody order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, sqlx::Type, Display, EnumString, AsRefStr, EnumIter,
)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum Process {
    #[strum(to_string = "forging")]
    Forging,
    #[strum(to_string = "heat_treatment", serialize = "ht")]
    #[serde(alias = "ht")]
    HeatTreatment,
    #[strum(to_string = "pre_machining")]
    PreMachining,
    #[strum(to_string = "machining", serialize = "cnc")]
    #[serde(alias = "cnc")]
    Machining,
    #[strum(to_string = "final_inspection", serialize = "fi")]
    #[serde(alias = "fi")]
    FinalInspection,
    #[strum(to_string = "marking")]
    Marking,
    #[strum(to_string = "visual")]
    Visual,
    #[strum(to_string = "dispatch")]
    Dispatch,
}

impl Process {
    /// Position in the canonical chain; Forging is 0, Dispatch is 7.
    pub fn position(&self) -> usize {
        match self {
            Process::Forging => 0,
            Process::HeatTreatment => 1,
            Process::PreMachining => 2,
            Process::Machining => 3,
            Process::FinalInspection => 4,
            Process::Marking => 5,
            Process::Visual => 6,
            Process::Dispatch => 7,
        }
    }

    /// Stage whose `ok` output feeds this one. Forging draws from the raw
    /// material issue instead.
    pub fn predecessor(&self) -> Option<Process> {
        match self {
            Process::Forging => None,
            Process::HeatTreatment => Some(Process::Forging),
            Process::PreMachining => Some(Process::HeatTreatment),
            Process::Machining => Some(Process::PreMachining),
            Process::FinalInspection => Some(Process::Machining),
            Process::Marking => Some(Process::FinalInspection),
            Process::Visual => Some(Process::Marking),
            Process::Dispatch => Some(Process::Visual),
        }
    }

    /// Stages where a batch's parent component has split into child components.
    pub fn is_child_scoped(&self) -> bool {
        matches!(
            self,
            Process::Machining | Process::FinalInspection | Process::Marking | Process::Visual
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Process::Forging => "Forging",
            Process::HeatTreatment => "Heat Treatment",
            Process::PreMachining => "Pre Machining",
            Process::Machining => "Machining",
            Process::FinalInspection => "Final Inspection",
            Process::Marking => "Marking",
            Process::Visual => "Visual",
            Process::Dispatch => "Dispatch",
        }
    }
}

// ==================== DEPARTMENTS ====================

/// Key into the process-sequence table. Every department except `Admin`
/// records production at exactly one stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, sqlx::Type, Display, EnumString, AsRefStr, EnumIter,
)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Department {
    Admin,
    Forging,
    HeatTreatment,
    PreMachining,
    #[serde(alias = "machining")]
    #[strum(to_string = "cnc", serialize = "machining")]
    Cnc,
    #[serde(alias = "fi")]
    #[strum(to_string = "final_inspection", serialize = "fi")]
    FinalInspection,
    Marking,
    Visual,
    Dispatch,
}

impl Department {
    pub fn own_stage(&self) -> Option<Process> {
        match self {
            Department::Admin => None,
            Department::Forging => Some(Process::Forging),
            Department::HeatTreatment => Some(Process::HeatTreatment),
            Department::PreMachining => Some(Process::PreMachining),
            Department::Cnc => Some(Process::Machining),
            Department::FinalInspection => Some(Process::FinalInspection),
            Department::Marking => Some(Process::Marking),
            Department::Visual => Some(Process::Visual),
            Department::Dispatch => Some(Process::Dispatch),
        }
    }

    pub fn for_stage(process: Process) -> Self {
        match process {
            Process::Forging => Department::Forging,
            Process::HeatTreatment => Department::HeatTreatment,
            Process::PreMachining => Department::PreMachining,
            Process::Machining => Department::Cnc,
            Process::FinalInspection => Department::FinalInspection,
            Process::Marking => Department::Marking,
            Process::Visual => Department::Visual,
            Process::Dispatch => Department::Dispatch,
        }
    }

    /// Whether this department may record production or tags at `process`.
    pub fn can_record(&self, process: Process) -> bool {
        match self.own_stage() {
            None => true,
            Some(stage) => stage == process,
        }
    }
}

// ==================== ENTRY STATUS ====================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
    Serialize, Deserialize, sqlx::Type, Display, EnumString, AsRefStr,
)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProductionStatus {
    #[default]
    Ok,
    Reject,
    Rework,
}

impl ProductionStatus {
    /// Only `ok` pieces move forward and count against availability.
    pub fn advances(&self) -> bool {
        matches!(self, ProductionStatus::Ok)
    }
}
