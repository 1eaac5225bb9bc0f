use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// The caller of an operation. Every service entry point takes one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: i64,
    pub role: Role,
}

impl ActorContext {
    pub fn new(actor_id: i64, role: Role) -> Self {
        Self { actor_id, role }
    }

    pub fn patient(actor_id: i64) -> Self {
        Self::new(actor_id, Role::Patient)
    }

    pub fn doctor(actor_id: i64) -> Self {
        Self::new(actor_id, Role::Doctor)
    }

    pub fn admin(actor_id: i64) -> Self {
        Self::new(actor_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_doctor(&self, doctor_id: i64) -> bool {
        self.role == Role::Doctor && self.actor_id == doctor_id
    }

    pub fn is_patient(&self, patient_id: i64) -> bool {
        self.role == Role::Patient && self.actor_id == patient_id
    }
}

impl TryFrom<&User> for ActorContext {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let actor_id = user
            .id
            .parse::<i64>()
            .map_err(|_| AppError::Auth(format!("Subject '{}' is not a valid actor id", user.id)))?;

        let role = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token carries no role".to_string()))?
            .parse::<Role>()
            .map_err(AppError::Auth)?;

        Ok(Self { actor_id, role })
    }
}
