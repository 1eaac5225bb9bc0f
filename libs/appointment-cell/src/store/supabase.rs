use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use tracing::debug;

use schedule_cell::models::ShiftKind;
use shared_database::{first_row, row_without_id, DatabaseError, SupabaseClient};

use crate::models::{Appointment, AppointmentQuery, AppointmentStatus, StateGuard};
use crate::store::AppointmentStore;

const TABLE: &str = "appointments";

fn status_in(statuses: &[AppointmentStatus]) -> String {
    let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
    format!("status=in.({})", names.join(","))
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, filters: &[String]) -> Result<Vec<Appointment>, DatabaseError> {
        let mut parts = filters.to_vec();
        parts.push("order=date.asc,time.asc,id.asc".to_string());
        let path = format!("/rest/v1/{}?{}", TABLE, parts.join("&"));
        self.supabase.request(Method::GET, &path, None, None).await
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DatabaseError> {
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            &format!("/rest/v1/{}", TABLE),
            None,
            Some(row_without_id(&appointment)?),
            Some(SupabaseClient::return_representation()),
        ).await?;
        first_row(rows, TABLE)
    }

    async fn get(&self, id: i64) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.fetch(&[format!("id=eq.{}", id)]).await?.into_iter().next())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Appointment>, DatabaseError> {
        let filter = format!("confirmation_code=eq.{}", urlencoding::encode(code));
        Ok(self.fetch(&[filter]).await?.into_iter().next())
    }

    async fn get_by_transaction_ref(&self, transaction_ref: &str) -> Result<Option<Appointment>, DatabaseError> {
        let filter = format!("transaction_ref=eq.{}", urlencoding::encode(transaction_ref));
        Ok(self.fetch(&[filter]).await?.into_iter().next())
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        let mut filters = Vec::new();
        if let Some(patient_id) = query.patient_id {
            filters.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            filters.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = query.status {
            filters.push(format!("status=eq.{}", status));
        }
        if let Some(date) = query.date {
            filters.push(format!("date=eq.{}", date));
        }
        self.fetch(&filters).await
    }

    async fn list_by_status(&self, statuses: &[AppointmentStatus]) -> Result<Vec<Appointment>, DatabaseError> {
        self.fetch(&[status_in(statuses)]).await
    }

    async fn update_if(
        &self,
        appointment: Appointment,
        guard: StateGuard,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!(
            "/rest/v1/{}?id=eq.{}&status=eq.{}&payment_status=eq.{}&rating_stars={}",
            TABLE,
            appointment.id,
            guard.status,
            guard.payment_status,
            if guard.rated { "not.is.null" } else { "is.null" }
        );
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(row_without_id(&appointment)?),
            Some(SupabaseClient::return_representation()),
        ).await?;
        if rows.is_empty() {
            debug!(
                "Appointment {} was no longer {}/{}",
                appointment.id, guard.status, guard.payment_status
            );
        }
        Ok(rows.into_iter().next())
    }

    async fn occupying_for_shift(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        shift: ShiftKind,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        self.fetch(&[
            format!("doctor_id=eq.{}", doctor_id),
            format!("date=eq.{}", date),
            format!("shift=eq.{}", shift),
            status_in(&AppointmentStatus::OCCUPYING),
        ])
        .await
    }

    async fn occupying_for_day(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        self.fetch(&[
            format!("doctor_id=eq.{}", doctor_id),
            format!("date=eq.{}", date),
            status_in(&AppointmentStatus::OCCUPYING),
        ])
        .await
    }
}
