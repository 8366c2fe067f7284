use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::record::UsageRecord;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToiletType {
    #[serde(rename = "MALE PUBLIC", alias = "MALE_PUBLIC")]
    MalePublic,
    #[serde(rename = "FEMALE PUBLIC", alias = "FEMALE_PUBLIC")]
    FemalePublic,
    #[serde(rename = "MALE STAFF", alias = "MALE_STAFF")]
    MaleStaff,
    #[serde(rename = "FEMALE STAFF", alias = "FEMALE_STAFF")]
    FemaleStaff,
    #[serde(rename = "POWDER ROOM", alias = "POWDER_ROOM")]
    PowderRoom,
}

impl ToiletType {
    pub const ALL: [ToiletType; 5] = [
        ToiletType::MalePublic,
        ToiletType::FemalePublic,
        ToiletType::MaleStaff,
        ToiletType::FemaleStaff,
        ToiletType::PowderRoom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ToiletType::MalePublic => "MALE PUBLIC",
            ToiletType::FemalePublic => "FEMALE PUBLIC",
            ToiletType::MaleStaff => "MALE STAFF",
            ToiletType::FemaleStaff => "FEMALE STAFF",
            ToiletType::PowderRoom => "POWDER ROOM",
        }
    }

    /// Two-letter code used on paper logs and in the CLI.
    pub fn code(self) -> &'static str {
        match self {
            ToiletType::MalePublic => "MP",
            ToiletType::FemalePublic => "FP",
            ToiletType::MaleStaff => "MS",
            ToiletType::FemaleStaff => "FS",
            ToiletType::PowderRoom => "PR",
        }
    }
}

impl fmt::Display for ToiletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorConfig {
    pub floor: &'static str,
    pub types: &'static [ToiletType],
}

const ALL_FOUR: &[ToiletType] = &[
    ToiletType::MalePublic,
    ToiletType::FemalePublic,
    ToiletType::MaleStaff,
    ToiletType::FemaleStaff,
];

/// The building layout. Record order everywhere follows this table.
pub const FLOORS_CONFIG: &[FloorConfig] = &[
    FloorConfig { floor: "2", types: ALL_FOUR },
    FloorConfig { floor: "85", types: &[ToiletType::MalePublic, ToiletType::FemalePublic] },
    FloorConfig { floor: "86", types: &[ToiletType::FemalePublic] },
    FloorConfig { floor: "87", types: &[ToiletType::MalePublic] },
    FloorConfig { floor: "99", types: ALL_FOUR },
    FloorConfig { floor: "100", types: ALL_FOUR },
    FloorConfig { floor: "105", types: &[ToiletType::PowderRoom] },
    FloorConfig { floor: "107", types: &[ToiletType::PowderRoom] },
    FloorConfig { floor: "108", types: &[ToiletType::PowderRoom] },
];

pub fn floors() -> impl Iterator<Item = &'static str> {
    FLOORS_CONFIG.iter().map(|f| f.floor)
}

/// Every configured (floor, type) pair in record order.
pub fn configured_pairs() -> impl Iterator<Item = (&'static str, ToiletType)> {
    FLOORS_CONFIG
        .iter()
        .flat_map(|f| f.types.iter().map(move |t| (f.floor, *t)))
}

pub fn pair_index(floor: &str, kind: ToiletType) -> Option<usize> {
    configured_pairs().position(|(f, t)| f == floor && t == kind)
}

pub fn is_configured(floor: &str, kind: ToiletType) -> bool {
    pair_index(floor, kind).is_some()
}

pub fn initial_records() -> Vec<UsageRecord> {
    configured_pairs()
        .map(|(floor, kind)| UsageRecord::new(floor, kind))
        .collect()
}
