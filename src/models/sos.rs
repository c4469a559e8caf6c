use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::geo::GeoPoint;

/// SOS lifecycle. Legal transitions are `Pending -> Assigned -> Completed`
/// and `Pending -> Failed`; everything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SosStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SosRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub location: GeoPoint,
    pub driver_id: Option<Uuid>,
    pub status: SosStatus,
    pub created_at: DateTime<Utc>,
}

impl SosRequest {
    pub fn new(requester_id: Uuid, location: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id,
            location,
            driver_id: None,
            status: SosStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Attaches the claimed driver and moves the request to `assigned`.
    /// The driver reference is write-once for the lifetime of the record.
    pub fn assign_driver(&mut self, driver_id: Uuid) -> Result<(), DispatchError> {
        if self.driver_id.is_some() {
            return Err(DispatchError::InvalidTransition {
                from: self.status,
                to: SosStatus::Assigned,
            });
        }
        self.transition(SosStatus::Assigned)?;
        self.driver_id = Some(driver_id);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), DispatchError> {
        self.transition(SosStatus::Completed)
    }

    pub fn fail(&mut self) -> Result<(), DispatchError> {
        self.transition(SosStatus::Failed)
    }

    fn transition(&mut self, to: SosStatus) -> Result<(), DispatchError> {
        let legal = matches!(
            (self.status, to),
            (SosStatus::Pending, SosStatus::Assigned)
                | (SosStatus::Assigned, SosStatus::Completed)
                | (SosStatus::Pending, SosStatus::Failed)
        );

        if !legal {
            return Err(DispatchError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        self.status = to;
        Ok(())
    }
}
