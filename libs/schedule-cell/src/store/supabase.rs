use std::sync::Arc;

use async_trait::async_trait;
use chrono::Weekday;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_database::{first_row, row_without_id, DatabaseError, SupabaseClient};

use crate::models::{DoctorProfile, LeaveBalance, LeaveQuery, LeaveRequest, LeaveStatus, WorkShift};
use crate::store::{DoctorDirectory, LeaveStore, WorkShiftStore};

/// Leave rows keep every scope column so a scope change clears the columns it no longer uses.
fn leave_row(leave: &LeaveRequest) -> Result<Value, DatabaseError> {
    let mut value = row_without_id(leave)?;
    if let Some(object) = value.as_object_mut() {
        for column in ["date", "shift", "weekday"] {
            object.entry(column).or_insert(Value::Null);
        }
    }
    Ok(value)
}

pub struct SupabaseWorkShiftStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseWorkShiftStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl WorkShiftStore for SupabaseWorkShiftStore {
    async fn list_shifts(&self, weekday: Option<Weekday>) -> Result<Vec<WorkShift>, DatabaseError> {
        let mut path = "/rest/v1/work_shifts?order=id.asc".to_string();
        if let Some(weekday) = weekday {
            path.push_str(&format!("&weekday=eq.{}", weekday));
        }
        self.supabase.request(Method::GET, &path, None, None).await
    }

    async fn get_shift(&self, id: i64) -> Result<Option<WorkShift>, DatabaseError> {
        let path = format!("/rest/v1/work_shifts?id=eq.{}", id);
        let rows: Vec<WorkShift> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_shift(&self, shift: WorkShift) -> Result<WorkShift, DatabaseError> {
        let rows: Vec<WorkShift> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/work_shifts",
            None,
            Some(row_without_id(&shift)?),
            Some(SupabaseClient::return_representation()),
        ).await?;
        first_row(rows, "work_shifts")
    }

    async fn update_shift(&self, shift: WorkShift) -> Result<Option<WorkShift>, DatabaseError> {
        let path = format!("/rest/v1/work_shifts?id=eq.{}", shift.id);
        let rows: Vec<WorkShift> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(row_without_id(&shift)?),
            Some(SupabaseClient::return_representation()),
        ).await?;
        Ok(rows.into_iter().next())
    }
}

pub struct SupabaseLeaveStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseLeaveStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl LeaveStore for SupabaseLeaveStore {
    async fn insert_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, DatabaseError> {
        let rows: Vec<LeaveRequest> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/leave_requests",
            None,
            Some(leave_row(&leave)?),
            Some(SupabaseClient::return_representation()),
        ).await?;
        first_row(rows, "leave_requests")
    }

    async fn get_leave(&self, id: i64) -> Result<Option<LeaveRequest>, DatabaseError> {
        let path = format!("/rest/v1/leave_requests?id=eq.{}", id);
        let rows: Vec<LeaveRequest> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_leaves(&self, query: &LeaveQuery) -> Result<Vec<LeaveRequest>, DatabaseError> {
        let mut query_parts = vec!["order=id.asc".to_string()];
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        let path = format!("/rest/v1/leave_requests?{}", query_parts.join("&"));
        self.supabase.request(Method::GET, &path, None, None).await
    }

    async fn update_leave_if_status(
        &self,
        leave: LeaveRequest,
        expected: LeaveStatus,
    ) -> Result<Option<LeaveRequest>, DatabaseError> {
        let path = format!("/rest/v1/leave_requests?id=eq.{}&status=eq.{}", leave.id, expected);
        let rows: Vec<LeaveRequest> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(leave_row(&leave)?),
            Some(SupabaseClient::return_representation()),
        ).await?;
        if rows.is_empty() {
            debug!("Leave {} was no longer {}", leave.id, expected);
        }
        Ok(rows.into_iter().next())
    }

    async fn delete_leave_if_status(&self, id: i64, allowed: &[LeaveStatus]) -> Result<bool, DatabaseError> {
        let statuses: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
        let path = format!("/rest/v1/leave_requests?id=eq.{}&status=in.({})", id, statuses.join(","));
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            None,
            None,
            Some(SupabaseClient::return_representation()),
        ).await?;
        Ok(!rows.is_empty())
    }

    async fn get_balance(&self, doctor_id: i64) -> Result<Option<LeaveBalance>, DatabaseError> {
        let path = format!("/rest/v1/leave_balances?doctor_id=eq.{}", doctor_id);
        let rows: Vec<LeaveBalance> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_balance(&self, balance: LeaveBalance) -> Result<LeaveBalance, DatabaseError> {
        let rows: Vec<LeaveBalance> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/leave_balances",
            None,
            Some(serde_json::to_value(&balance)?),
            Some(SupabaseClient::return_representation()),
        ).await?;
        first_row(rows, "leave_balances")
    }

    async fn update_balance_if_version(
        &self,
        balance: LeaveBalance,
        expected_version: i64,
    ) -> Result<bool, DatabaseError> {
        let path = format!(
            "/rest/v1/leave_balances?doctor_id=eq.{}&version=eq.{}",
            balance.doctor_id, expected_version
        );
        let rows: Vec<LeaveBalance> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(serde_json::to_value(&balance)?),
            Some(SupabaseClient::return_representation()),
        ).await?;
        Ok(!rows.is_empty())
    }
}

pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn get_doctor(&self, doctor_id: i64) -> Result<Option<DoctorProfile>, DatabaseError> {
        let path = format!("/rest/v1/doctor_profiles?doctor_id=eq.{}", doctor_id);
        let rows: Vec<DoctorProfile> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }
}
