use tracing::debug;

use schedule_cell::models::{DegreeRank, DoctorProfile};

use crate::models::AppointmentError;

/// Consultation price from the doctor's base price and academic rank.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingService;

impl PricingService {
    pub fn new() -> Self {
        Self
    }

    /// Rank multiplier in percent; integer math keeps prices exact.
    pub fn rank_multiplier_percent(&self, rank: DegreeRank) -> i64 {
        match rank {
            DegreeRank::Doctor => 100,
            DegreeRank::Master => 120,
            DegreeRank::SpecialistOne => 130,
            DegreeRank::SpecialistTwo => 150,
            DegreeRank::Phd => 160,
            DegreeRank::AssociateProfessor => 180,
            DegreeRank::Professor => 200,
        }
    }

    pub fn calculate_price(&self, doctor: &DoctorProfile) -> Result<i64, AppointmentError> {
        if doctor.base_price <= 0 {
            return Err(AppointmentError::Validation(format!(
                "Doctor {} has no consultation price configured", doctor.doctor_id
            )));
        }

        let percent = self.rank_multiplier_percent(doctor.degree_rank);
        let price = (doctor.base_price * percent + 50) / 100;
        debug!(
            "Price for doctor {}: {} x {}% = {}",
            doctor.doctor_id, doctor.base_price, percent, price
        );
        Ok(price)
    }
}
