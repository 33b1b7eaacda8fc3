//! Detect overlaps between candidate ranges and existing bookings.
//!
//! A candidate conflicts with an occupying appointment or a block when the two
//! overlap as half-open ranges. Adjacent ranges (one ends exactly when the
//! other starts) are NOT conflicts. Cancelled, attended and no-show
//! appointments never conflict.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{Block, BlockType};
use crate::model::Appointment;
use crate::range::TimeRange;

/// What a candidate collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictSource {
    Appointment { id: Uuid },
    Block { id: Uuid, block_type: BlockType },
}

/// A detected conflict between a candidate and an existing range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub candidate: TimeRange,
    pub existing: TimeRange,
    pub source: ConflictSource,
    pub overlap_minutes: i64,
}

/// Overlap checks against a fixed set of appointments and blocks.
#[derive(Debug, Clone, Copy)]
pub struct ConflictChecker<'a> {
    appointments: &'a [Appointment],
    blocks: &'a [Block],
    exclude: Option<Uuid>,
}

impl<'a> ConflictChecker<'a> {
    pub fn new(appointments: &'a [Appointment], blocks: &'a [Block]) -> Self {
        Self {
            appointments,
            blocks,
            exclude: None,
        }
    }

    /// Ignore one appointment, typically the one being rescheduled.
    pub fn excluding(mut self, appointment_id: Option<Uuid>) -> Self {
        self.exclude = appointment_id;
        self
    }

    /// Every conflict for `candidate`, appointments first, then blocks.
    pub fn conflicts(&self, candidate: &TimeRange) -> Vec<Conflict> {
        let appointment_hits = self
            .appointments
            .iter()
            .filter(|a| a.is_occupying() && Some(a.id) != self.exclude)
            .map(|a| (a.range(), ConflictSource::Appointment { id: a.id }));

        let block_hits = self.blocks.iter().map(|b| {
            (
                b.range(),
                ConflictSource::Block {
                    id: b.id,
                    block_type: b.block_type,
                },
            )
        });

        appointment_hits
            .chain(block_hits)
            .filter(|(existing, _)| existing.overlaps(candidate))
            .map(|(existing, source)| Conflict {
                candidate: *candidate,
                existing,
                source,
                overlap_minutes: existing.overlap_minutes(candidate),
            })
            .collect()
    }

    pub fn has_conflict(&self, candidate: &TimeRange) -> bool {
        !self.conflicts(candidate).is_empty()
    }

    /// Indices of the candidates that conflict, in input order.
    pub fn check_many(&self, candidates: &[TimeRange]) -> Vec<usize> {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| self.has_conflict(c))
            .map(|(i, _)| i)
            .collect()
    }

    /// The first conflict of each conflicting candidate, keyed by index.
    ///
    /// Used for dry-run validation of a batch: nothing is mutated and every
    /// conflicting candidate is reported.
    pub fn first_conflicts(&self, candidates: &[TimeRange]) -> Vec<(usize, Conflict)> {
        candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| self.conflicts(c).into_iter().next().map(|conflict| (i, conflict)))
            .collect()
    }
}
