//! Repository boundary and its sled-backed implementation
use crate::ledger::{ApprovalAssignment, ApprovalLedger};
use crate::request::TimeOffRequest;
use crate::team::Team;
use crate::types::{RequestId, TeamId, User, UserId};
use sled::Batch;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(#[from] sled::Error),
    #[error("failed to decode a stored record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("failed to encode a record: {0}")]
    Encode(String),
}

/// The persistence collaborator. Every cross-entity read the engine needs
/// is an explicit query here; there are no lazily traversable object
/// graphs. All mutations a single method performs commit together.
pub trait Store: Send + Sync {
    /// Mints a fresh integer id, unique across all entity kinds.
    fn generate_id(&self) -> Result<u64, StoreError>;

    fn request(&self, id: RequestId) -> Result<Option<TimeOffRequest>, StoreError>;
    fn requests(&self) -> Result<Vec<TimeOffRequest>, StoreError>;
    fn requests_by_requester(&self, requester: UserId) -> Result<Vec<TimeOffRequest>, StoreError>;
    fn put_request(&self, request: &TimeOffRequest) -> Result<(), StoreError>;
    /// Removes the request together with its assignment record.
    fn remove_request(&self, id: RequestId) -> Result<(), StoreError>;
    /// Writes the request and its ledger in one atomic batch.
    fn save_request_with_ledger(
        &self,
        request: &TimeOffRequest,
        ledger: &ApprovalLedger,
    ) -> Result<(), StoreError>;

    fn ledger(&self, id: RequestId) -> Result<ApprovalLedger, StoreError>;
    fn put_ledger(&self, id: RequestId, ledger: &ApprovalLedger) -> Result<(), StoreError>;
    /// Every assignment held by the given approver, across all requests.
    fn assignments_by_approver(&self, approver: UserId)
    -> Result<Vec<ApprovalAssignment>, StoreError>;

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    fn put_user(&self, user: &User) -> Result<(), StoreError>;

    fn team(&self, id: TeamId) -> Result<Option<Team>, StoreError>;
    fn teams(&self) -> Result<Vec<Team>, StoreError>;
    fn put_team(&self, team: &Team) -> Result<(), StoreError>;
    fn remove_team(&self, id: TeamId) -> Result<(), StoreError>;

    /// Serializes read-modify-write cycles. Workflow transitions and
    /// membership effects race on the same assignment records, so every
    /// mutating operation holds this guard from first read to last write.
    fn write_guard(&self) -> MutexGuard<'_, ()>;
}

const REQUEST_PREFIX: &str = "req/";
const LEDGER_PREFIX: &str = "asg/";
const USER_PREFIX: &str = "usr/";
const TEAM_PREFIX: &str = "team/";

/// Embedded keyspace: zero-padded decimal keys under per-entity prefixes,
/// CBOR-encoded values.
pub struct SledStore {
    db: sled::Db,
    guard: Mutex<()>,
}

impl SledStore {
    pub fn new(db: sled::Db) -> Self {
        Self {
            db,
            guard: Mutex::new(()),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::new(sled::open(path)?))
    }

    fn key(prefix: &str, id: u64) -> Vec<u8> {
        format!("{prefix}{id:020}").into_bytes()
    }

    fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, StoreError> {
        minicbor::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn get<T: for<'b> minicbor::Decode<'b, ()>>(
        &self,
        key: &[u8],
    ) -> Result<Option<T>, StoreError> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: for<'b> minicbor::Decode<'b, ()>>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            records.push(minicbor::decode(&bytes)?);
        }
        Ok(records)
    }
}

impl Store for SledStore {
    fn generate_id(&self) -> Result<u64, StoreError> {
        // sled counts from zero; entity ids start at one
        Ok(self.db.generate_id()? + 1)
    }

    fn request(&self, id: RequestId) -> Result<Option<TimeOffRequest>, StoreError> {
        self.get(&Self::key(REQUEST_PREFIX, id.0))
    }

    fn requests(&self) -> Result<Vec<TimeOffRequest>, StoreError> {
        self.scan(REQUEST_PREFIX)
    }

    fn requests_by_requester(&self, requester: UserId) -> Result<Vec<TimeOffRequest>, StoreError> {
        let mut requests: Vec<TimeOffRequest> = self.scan(REQUEST_PREFIX)?;
        requests.retain(|r| r.requester == requester);
        Ok(requests)
    }

    fn put_request(&self, request: &TimeOffRequest) -> Result<(), StoreError> {
        self.db
            .insert(Self::key(REQUEST_PREFIX, request.id.0), Self::encode(request)?)?;
        Ok(())
    }

    fn remove_request(&self, id: RequestId) -> Result<(), StoreError> {
        let mut batch = Batch::default();
        batch.remove(Self::key(REQUEST_PREFIX, id.0));
        batch.remove(Self::key(LEDGER_PREFIX, id.0));
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn save_request_with_ledger(
        &self,
        request: &TimeOffRequest,
        ledger: &ApprovalLedger,
    ) -> Result<(), StoreError> {
        let mut batch = Batch::default();
        batch.insert(Self::key(REQUEST_PREFIX, request.id.0), Self::encode(request)?);
        batch.insert(
            Self::key(LEDGER_PREFIX, request.id.0),
            Self::encode(&ledger.assignments().to_vec())?,
        );
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn ledger(&self, id: RequestId) -> Result<ApprovalLedger, StoreError> {
        let assignments: Option<Vec<ApprovalAssignment>> =
            self.get(&Self::key(LEDGER_PREFIX, id.0))?;
        Ok(ApprovalLedger::from_assignments(
            assignments.unwrap_or_default(),
        ))
    }

    fn put_ledger(&self, id: RequestId, ledger: &ApprovalLedger) -> Result<(), StoreError> {
        self.db.insert(
            Self::key(LEDGER_PREFIX, id.0),
            Self::encode(&ledger.assignments().to_vec())?,
        )?;
        Ok(())
    }

    fn assignments_by_approver(
        &self,
        approver: UserId,
    ) -> Result<Vec<ApprovalAssignment>, StoreError> {
        let records: Vec<Vec<ApprovalAssignment>> = self.scan(LEDGER_PREFIX)?;
        Ok(records
            .into_iter()
            .flatten()
            .filter(|a| a.approver_id == approver)
            .collect())
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.get(&Self::key(USER_PREFIX, id.0))
    }

    fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.db
            .insert(Self::key(USER_PREFIX, user.id.0), Self::encode(user)?)?;
        Ok(())
    }

    fn team(&self, id: TeamId) -> Result<Option<Team>, StoreError> {
        self.get(&Self::key(TEAM_PREFIX, id.0))
    }

    fn teams(&self) -> Result<Vec<Team>, StoreError> {
        self.scan(TEAM_PREFIX)
    }

    fn put_team(&self, team: &Team) -> Result<(), StoreError> {
        self.db
            .insert(Self::key(TEAM_PREFIX, team.id.0), Self::encode(team)?)?;
        Ok(())
    }

    fn remove_team(&self, id: TeamId) -> Result<(), StoreError> {
        self.db.remove(Self::key(TEAM_PREFIX, id.0))?;
        Ok(())
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().expect("store write guard poisoned")
    }
}
