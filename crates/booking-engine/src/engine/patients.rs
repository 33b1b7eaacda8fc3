//! Patient records and their appointment history.

use slot_engine::Appointment;
use tracing::info;
use uuid::Uuid;

use super::{find_or_create_patient, normalized, require_patient, BookingEngine};
use crate::error::{BookingError, Result};
use crate::model::{Patient, PatientInfo};
use crate::store::{appointments, patients as patient_store};

impl BookingEngine {
    /// The patient with `info.phone`, created from `info` if none exists.
    pub fn find_or_create_patient(&self, info: &PatientInfo) -> Result<Patient> {
        let now = self.now();
        self.write(|conn| find_or_create_patient(conn, info, now))
    }

    pub fn patient(&self, id: Uuid) -> Result<Patient> {
        self.read(|conn| require_patient(conn, id))
    }

    /// Active patients ordered by name.
    pub fn active_patients(&self) -> Result<Vec<Patient>> {
        self.read(|conn| patient_store::active(conn))
    }

    /// Active patients whose name contains `name`, ignoring case.
    pub fn search_patients(&self, name: &str) -> Result<Vec<Patient>> {
        let name = name.trim();
        if name.is_empty() {
            return self.active_patients();
        }
        self.read(|conn| patient_store::search(conn, name))
    }

    /// Replace a patient's name, phone and email.
    ///
    /// # Errors
    /// `Validation` for a blank name or phone, or a phone that already
    /// belongs to another patient.
    pub fn update_patient(&self, id: Uuid, info: &PatientInfo) -> Result<Patient> {
        let (name, phone, email) = normalized(info)?;
        self.write(|conn| {
            let current = require_patient(conn, id)?;
            if let Some(other) = patient_store::by_phone(conn, phone)? {
                if other.id != id {
                    return Err(BookingError::Validation(format!(
                        "phone {} already belongs to another patient",
                        phone
                    )));
                }
            }

            let patient = Patient {
                name: name.to_string(),
                phone: phone.to_string(),
                email: email.map(str::to_string),
                ..current
            };
            patient_store::update(conn, &patient)?;
            info!(patient_id = %id, "patient updated");
            Ok(patient)
        })
    }

    /// Hide a patient from listings and search. Their appointments stay.
    pub fn deactivate_patient(&self, id: Uuid) -> Result<Patient> {
        self.write(|conn| {
            let patient = require_patient(conn, id)?;
            patient_store::set_active(conn, id, false)?;
            info!(patient_id = %id, "patient deactivated");
            Ok(Patient {
                active: false,
                ..patient
            })
        })
    }

    /// Every appointment of a patient, most recent first.
    pub fn patient_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>> {
        self.read(|conn| {
            require_patient(conn, patient_id)?;
            appointments::for_patient(conn, patient_id)
        })
    }
}
