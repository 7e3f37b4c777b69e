use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId};
use retailpos_events::Event;

pub const AGGREGATE_TYPE: &str = "parties.party";

/// Party identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub AggregateId);

impl PartyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ContactInfo {
    fn cleaned(&self) -> Result<ContactInfo, DomainError> {
        fn clean(v: &Option<String>) -> Option<String> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
        }
        let email = clean(&self.email);
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(DomainError::validation("invalid email format"));
            }
        }
        Ok(ContactInfo {
            email,
            phone: clean(&self.phone),
            address: clean(&self.address),
        })
    }
}

/// Aggregate root: Party (customer or supplier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    tenant_id: Option<TenantId>,
    kind: PartyKind,
    name: String,
    contact: ContactInfo,
    opening_balance: Money,
    status: PartyStatus,
    version: u64,
    created: bool,
}

impl Party {
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: PartyKind::Customer,
            name: String::new(),
            contact: ContactInfo::default(),
            opening_balance: Money::ZERO,
            status: PartyStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    /// Balance carried over from before the system was used (receivable for customers,
    /// payable for suppliers).
    pub fn opening_balance(&self) -> Money {
        self.opening_balance
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    /// Suspended parties cannot be put on new sales or purchases.
    pub fn can_transact(&self) -> bool {
        self.created && self.status == PartyStatus::Active
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub opening_balance: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    Register(RegisterParty),
    UpdateDetails(UpdateDetails),
    Suspend(SuspendParty),
    Reactivate(ReactivateParty),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub opening_balance: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdated {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySuspended {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyReactivated {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    Registered(PartyRegistered),
    Updated(PartyUpdated),
    Suspended(PartySuspended),
    Reactivated(PartyReactivated),
}

impl PartyEvent {
    pub fn party_id(&self) -> PartyId {
        match self {
            PartyEvent::Registered(e) => e.party_id,
            PartyEvent::Updated(e) => e.party_id,
            PartyEvent::Suspended(e) => e.party_id,
            PartyEvent::Reactivated(e) => e.party_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            PartyEvent::Registered(e) => e.tenant_id,
            PartyEvent::Updated(e) => e.tenant_id,
            PartyEvent::Suspended(e) => e.tenant_id,
            PartyEvent::Reactivated(e) => e.tenant_id,
        }
    }
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::Registered(_) => "parties.party.registered",
            PartyEvent::Updated(_) => "parties.party.updated",
            PartyEvent::Suspended(_) => "parties.party.suspended",
            PartyEvent::Reactivated(_) => "parties.party.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::Registered(e) => e.occurred_at,
            PartyEvent::Updated(e) => e.occurred_at,
            PartyEvent::Suspended(e) => e.occurred_at,
            PartyEvent::Reactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::Registered(e) => {
                self.id = e.party_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.opening_balance = e.opening_balance;
                self.status = PartyStatus::Active;
                self.created = true;
            }
            PartyEvent::Updated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
            }
            PartyEvent::Suspended(_) => self.status = PartyStatus::Suspended,
            PartyEvent::Reactivated(_) => self.status = PartyStatus::Active,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::Register(cmd) => self.handle_register(cmd),
            PartyCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            PartyCommand::Suspend(cmd) => self.handle_suspend(cmd),
            PartyCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Party {
    fn ensure_exists(&self, tenant_id: TenantId, party_id: PartyId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterParty) -> Result<Vec<PartyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("party already exists"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.opening_balance.is_negative() {
            return Err(DomainError::validation("opening balance cannot be negative"));
        }

        Ok(vec![PartyEvent::Registered(PartyRegistered {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            kind: cmd.kind,
            name: name.to_string(),
            contact: cmd.contact.cleaned()?,
            opening_balance: cmd.opening_balance,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.party_id)?;
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let contact = cmd.contact.cleaned()?;
        if name == self.name && contact == self.contact {
            return Ok(vec![]);
        }

        Ok(vec![PartyEvent::Updated(PartyUpdated {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            name: name.to_string(),
            contact,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.party_id)?;
        if self.status == PartyStatus::Suspended {
            return Err(DomainError::conflict("party is already suspended"));
        }

        Ok(vec![PartyEvent::Suspended(PartySuspended {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.party_id)?;
        if self.status == PartyStatus::Active {
            return Err(DomainError::conflict("party is already active"));
        }

        Ok(vec![PartyEvent::Reactivated(PartyReactivated {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_party_id() -> PartyId {
        PartyId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn register(kind: PartyKind, tenant_id: TenantId, party_id: PartyId) -> Party {
        let mut party = Party::empty(party_id);
        let events = party
            .handle(&PartyCommand::Register(RegisterParty {
                tenant_id,
                party_id,
                kind,
                name: " Corner Bakery ".into(),
                contact: ContactInfo {
                    phone: Some("555-0101".into()),
                    ..ContactInfo::default()
                },
                opening_balance: Money::from_minor(1_500),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            party.apply(e);
        }
        party
    }

    #[test]
    fn register_trims_name_and_keeps_opening_balance() {
        let party = register(PartyKind::Supplier, test_tenant_id(), test_party_id());
        assert_eq!(party.name(), "Corner Bakery");
        assert_eq!(party.kind(), PartyKind::Supplier);
        assert_eq!(party.opening_balance(), Money::from_minor(1_500));
        assert!(party.can_transact());
        assert_eq!(party.version(), 1);
    }

    #[test]
    fn register_rejects_negative_opening_balance_and_bad_email() {
        let party = Party::empty(test_party_id());
        let base = RegisterParty {
            tenant_id: test_tenant_id(),
            party_id: test_party_id(),
            kind: PartyKind::Customer,
            name: "Ann".into(),
            contact: ContactInfo::default(),
            opening_balance: Money::from_minor(-1),
            occurred_at: test_time(),
        };
        assert!(matches!(
            party.handle(&PartyCommand::Register(base.clone())),
            Err(DomainError::Validation(_))
        ));

        let bad_email = RegisterParty {
            opening_balance: Money::ZERO,
            contact: ContactInfo {
                email: Some("ann.example.com".into()),
                ..ContactInfo::default()
            },
            ..base
        };
        assert!(matches!(
            party.handle(&PartyCommand::Register(bad_email)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn suspend_blocks_transacting_until_reactivated() {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let mut party = register(PartyKind::Customer, tenant_id, party_id);

        for e in party
            .handle(&PartyCommand::Suspend(SuspendParty {
                tenant_id,
                party_id,
                reason: Some("bounced cheque".into()),
                occurred_at: test_time(),
            }))
            .unwrap()
        {
            party.apply(&e);
        }
        assert!(!party.can_transact());

        let again = party.handle(&PartyCommand::Suspend(SuspendParty {
            tenant_id,
            party_id,
            reason: None,
            occurred_at: test_time(),
        }));
        assert!(matches!(again, Err(DomainError::Conflict(_))));

        for e in party
            .handle(&PartyCommand::Reactivate(ReactivateParty {
                tenant_id,
                party_id,
                occurred_at: test_time(),
            }))
            .unwrap()
        {
            party.apply(&e);
        }
        assert!(party.can_transact());
    }

    #[test]
    fn update_with_same_data_is_a_no_op() {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let party = register(PartyKind::Customer, tenant_id, party_id);
        let events = party
            .handle(&PartyCommand::UpdateDetails(UpdateDetails {
                tenant_id,
                party_id,
                name: "Corner Bakery".into(),
                contact: party.contact().clone(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn update_unknown_party_is_not_found() {
        let party_id = test_party_id();
        let err = Party::empty(party_id)
            .handle(&PartyCommand::UpdateDetails(UpdateDetails {
                tenant_id: test_tenant_id(),
                party_id,
                name: "X".into(),
                contact: ContactInfo::default(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn handle_does_not_mutate_state(name in "[A-Za-z][A-Za-z ]{0,30}") {
                let tenant_id = test_tenant_id();
                let party_id = test_party_id();
                let party = register(PartyKind::Customer, tenant_id, party_id);
                let before = party.clone();
                let _ = party.handle(&PartyCommand::UpdateDetails(UpdateDetails {
                    tenant_id,
                    party_id,
                    name,
                    contact: ContactInfo::default(),
                    occurred_at: test_time(),
                }));
                prop_assert_eq!(party, before);
            }
        }
    }
}
