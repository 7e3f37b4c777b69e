//! Categories and units of measure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use retailpos_events::Event;

pub const AGGREGATE_TYPE: &str = "catalog.reference";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(pub AggregateId);

impl ReferenceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Category,
    /// Unit of measure ("Kilogram" / "kg").
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    id: ReferenceId,
    tenant_id: Option<TenantId>,
    kind: ReferenceKind,
    name: String,
    short_name: Option<String>,
    status: ReferenceStatus,
    version: u64,
    created: bool,
}

impl ReferenceEntry {
    pub fn empty(id: ReferenceId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: ReferenceKind::Category,
            name: String::new(),
            short_name: None,
            status: ReferenceStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    pub fn status(&self) -> ReferenceStatus {
        self.status
    }

    fn ensure_exists(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for ReferenceEntry {
    type Id = ReferenceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReference {
    pub tenant_id: TenantId,
    pub reference_id: ReferenceId,
    pub kind: ReferenceKind,
    pub name: String,
    pub short_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameReference {
    pub tenant_id: TenantId,
    pub reference_id: ReferenceId,
    pub name: String,
    pub short_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReference {
    pub tenant_id: TenantId,
    pub reference_id: ReferenceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReference {
    pub tenant_id: TenantId,
    pub reference_id: ReferenceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceCommand {
    Create(CreateReference),
    Rename(RenameReference),
    Archive(ArchiveReference),
    Restore(RestoreReference),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceEvent {
    Created {
        tenant_id: TenantId,
        reference_id: ReferenceId,
        kind: ReferenceKind,
        name: String,
        short_name: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Renamed {
        tenant_id: TenantId,
        reference_id: ReferenceId,
        name: String,
        short_name: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Archived {
        tenant_id: TenantId,
        reference_id: ReferenceId,
        occurred_at: DateTime<Utc>,
    },
    Restored {
        tenant_id: TenantId,
        reference_id: ReferenceId,
        occurred_at: DateTime<Utc>,
    },
}

impl ReferenceEvent {
    pub fn reference_id(&self) -> ReferenceId {
        match self {
            ReferenceEvent::Created { reference_id, .. }
            | ReferenceEvent::Renamed { reference_id, .. }
            | ReferenceEvent::Archived { reference_id, .. }
            | ReferenceEvent::Restored { reference_id, .. } => *reference_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            ReferenceEvent::Created { tenant_id, .. }
            | ReferenceEvent::Renamed { tenant_id, .. }
            | ReferenceEvent::Archived { tenant_id, .. }
            | ReferenceEvent::Restored { tenant_id, .. } => *tenant_id,
        }
    }
}

impl Event for ReferenceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReferenceEvent::Created { .. } => "catalog.reference.created",
            ReferenceEvent::Renamed { .. } => "catalog.reference.renamed",
            ReferenceEvent::Archived { .. } => "catalog.reference.archived",
            ReferenceEvent::Restored { .. } => "catalog.reference.restored",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReferenceEvent::Created { occurred_at, .. }
            | ReferenceEvent::Renamed { occurred_at, .. }
            | ReferenceEvent::Archived { occurred_at, .. }
            | ReferenceEvent::Restored { occurred_at, .. } => *occurred_at,
        }
    }
}

fn clean_names(
    kind: ReferenceKind,
    name: &str,
    short_name: Option<&str>,
) -> Result<(String, Option<String>), DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    let short_name = short_name.map(str::trim).filter(|s| !s.is_empty());
    if kind == ReferenceKind::Unit && short_name.is_none() {
        return Err(DomainError::validation("unit short name is required"));
    }
    Ok((name.to_string(), short_name.map(str::to_string)))
}

impl Aggregate for ReferenceEntry {
    type Command = ReferenceCommand;
    type Event = ReferenceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReferenceEvent::Created {
                tenant_id,
                reference_id,
                kind,
                name,
                short_name,
                ..
            } => {
                self.id = *reference_id;
                self.tenant_id = Some(*tenant_id);
                self.kind = *kind;
                self.name = name.clone();
                self.short_name = short_name.clone();
                self.status = ReferenceStatus::Active;
                self.created = true;
            }
            ReferenceEvent::Renamed { name, short_name, .. } => {
                self.name = name.clone();
                self.short_name = short_name.clone();
            }
            ReferenceEvent::Archived { .. } => self.status = ReferenceStatus::Archived,
            ReferenceEvent::Restored { .. } => self.status = ReferenceStatus::Active,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReferenceCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("reference entry already exists"));
                }
                let (name, short_name) = clean_names(cmd.kind, &cmd.name, cmd.short_name.as_deref())?;
                Ok(vec![ReferenceEvent::Created {
                    tenant_id: cmd.tenant_id,
                    reference_id: cmd.reference_id,
                    kind: cmd.kind,
                    name,
                    short_name,
                    occurred_at: cmd.occurred_at,
                }])
            }
            ReferenceCommand::Rename(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                let (name, short_name) = clean_names(self.kind, &cmd.name, cmd.short_name.as_deref())?;
                if name == self.name && short_name == self.short_name {
                    return Ok(vec![]);
                }
                Ok(vec![ReferenceEvent::Renamed {
                    tenant_id: cmd.tenant_id,
                    reference_id: cmd.reference_id,
                    name,
                    short_name,
                    occurred_at: cmd.occurred_at,
                }])
            }
            ReferenceCommand::Archive(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                if self.status == ReferenceStatus::Archived {
                    return Err(DomainError::conflict("already archived"));
                }
                Ok(vec![ReferenceEvent::Archived {
                    tenant_id: cmd.tenant_id,
                    reference_id: cmd.reference_id,
                    occurred_at: cmd.occurred_at,
                }])
            }
            ReferenceCommand::Restore(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                if self.status == ReferenceStatus::Active {
                    return Err(DomainError::conflict("not archived"));
                }
                Ok(vec![ReferenceEvent::Restored {
                    tenant_id: cmd.tenant_id,
                    reference_id: cmd.reference_id,
                    occurred_at: cmd.occurred_at,
                }])
            }
        }
    }
}
