//! Staff-managed catalog: session types, availability windows, blocks.

use chrono::{NaiveTime, Weekday};
use rusqlite::Connection;
use slot_engine::{
    calendar::validate_window, AvailabilityWindow, Block, BlockType, SessionType, TimeRange,
    Unavailable,
};
use tracing::info;
use uuid::Uuid;

use super::{require_session_type, BookingEngine};
use crate::error::{BookingError, Result};
use crate::store::{appointments, catalog as catalog_store};

fn validate_session_type(name: &str, duration_minutes: u32, price_cents: i64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(BookingError::Validation("session type name is required".to_string()));
    }
    if duration_minutes == 0 {
        return Err(BookingError::Validation(
            "session duration must be greater than zero".to_string(),
        ));
    }
    if price_cents < 0 {
        return Err(BookingError::Validation("price cannot be negative".to_string()));
    }
    Ok(())
}

impl BookingEngine {
    // === Session types ===

    pub fn create_session_type(
        &self,
        name: &str,
        duration_minutes: u32,
        price_cents: i64,
    ) -> Result<SessionType> {
        validate_session_type(name, duration_minutes, price_cents)?;
        let session_type = SessionType {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            duration_minutes,
            price_cents,
            active: true,
        };
        self.write(|conn| catalog_store::insert_session_type(conn, &session_type))?;
        info!(session_type_id = %session_type.id, name = %session_type.name, "session type created");
        Ok(session_type)
    }

    /// Replace a session type's fields. Existing appointments keep the end
    /// time they were booked with.
    pub fn update_session_type(&self, session_type: &SessionType) -> Result<SessionType> {
        validate_session_type(
            &session_type.name,
            session_type.duration_minutes,
            session_type.price_cents,
        )?;
        self.write(|conn| {
            if !catalog_store::update_session_type(conn, session_type)? {
                return Err(BookingError::not_found("session type", session_type.id));
            }
            info!(session_type_id = %session_type.id, "session type updated");
            require_session_type(conn, session_type.id)
        })
    }

    /// Hide a session type from public booking.
    pub fn deactivate_session_type(&self, id: Uuid) -> Result<SessionType> {
        self.write(|conn| {
            let mut session_type = require_session_type(conn, id)?;
            session_type.active = false;
            catalog_store::update_session_type(conn, &session_type)?;
            info!(session_type_id = %id, "session type deactivated");
            Ok(session_type)
        })
    }

    pub fn session_type(&self, id: Uuid) -> Result<SessionType> {
        self.read(|conn| require_session_type(conn, id))
    }

    pub fn session_types(&self, include_inactive: bool) -> Result<Vec<SessionType>> {
        self.read(|conn| catalog_store::list_session_types(conn, include_inactive))
    }

    // === Availability windows ===

    pub fn create_window(
        &self,
        day_of_week: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<AvailabilityWindow> {
        let window = AvailabilityWindow::new(day_of_week, start_time, end_time)?;
        self.write(|conn| catalog_store::insert_window(conn, &window))?;
        info!(window_id = %window.id, day = %day_of_week, %start_time, %end_time, "window created");
        Ok(window)
    }

    pub fn update_window(&self, window: &AvailabilityWindow) -> Result<AvailabilityWindow> {
        validate_window(window.start_time, window.end_time)?;
        self.write(|conn| {
            if !catalog_store::update_window(conn, window)? {
                return Err(BookingError::not_found("availability window", window.id));
            }
            info!(window_id = %window.id, "window updated");
            Ok(window.clone())
        })
    }

    pub fn delete_window(&self, id: Uuid) -> Result<()> {
        self.write(|conn| {
            if !catalog_store::delete_window(conn, id)? {
                return Err(BookingError::not_found("availability window", id));
            }
            info!(window_id = %id, "window deleted");
            Ok(())
        })
    }

    pub fn windows(&self) -> Result<Vec<AvailabilityWindow>> {
        self.read(|conn| catalog_store::list_windows(conn))
    }

    // === Blocks ===

    /// Block out a range.
    ///
    /// # Errors
    /// `SlotUnavailable` if an occupying appointment overlaps the range; the
    /// appointment has to be cancelled or moved first.
    pub fn create_block(
        &self,
        range: TimeRange,
        block_type: BlockType,
        reason: Option<String>,
    ) -> Result<Block> {
        let block = Block::new(range, block_type, reason);
        self.write(|conn| {
            ensure_no_bookings(conn, &range)?;
            catalog_store::insert_block(conn, &block)
        })?;
        info!(block_id = %block.id, %block_type, start = %range.start, end = %range.end, "block created");
        Ok(block)
    }

    /// Move or retype a block. The new range is checked like a new block.
    pub fn update_block(
        &self,
        id: Uuid,
        range: TimeRange,
        block_type: BlockType,
        reason: Option<String>,
    ) -> Result<Block> {
        self.write(|conn| {
            if catalog_store::block(conn, id)?.is_none() {
                return Err(BookingError::not_found("block", id));
            }
            ensure_no_bookings(conn, &range)?;
            let block = Block {
                id,
                ..Block::new(range, block_type, reason)
            };
            catalog_store::update_block(conn, &block)?;
            info!(block_id = %id, %block_type, start = %range.start, end = %range.end, "block updated");
            Ok(block)
        })
    }

    pub fn delete_block(&self, id: Uuid) -> Result<()> {
        self.write(|conn| {
            if !catalog_store::delete_block(conn, id)? {
                return Err(BookingError::not_found("block", id));
            }
            info!(block_id = %id, "block deleted");
            Ok(())
        })
    }

    /// Blocks overlapping `range`, ordered by start.
    pub fn blocks(&self, range: &TimeRange) -> Result<Vec<Block>> {
        self.read(|conn| catalog_store::blocks_overlapping(conn, range))
    }
}

/// A block may not cover an occupying appointment.
fn ensure_no_bookings(conn: &Connection, range: &TimeRange) -> Result<()> {
    match appointments::occupying_overlapping(conn, range)?.first() {
        Some(existing) => Err(BookingError::SlotUnavailable {
            range: *range,
            reason: Unavailable::Booked {
                range: existing.range(),
            },
        }),
        None => Ok(()),
    }
}
