//! Role capability objects.
//!
//! Instead of hidden global role state, every privileged operation takes an
//! `AuthorizationContext` explicitly and checks the caller against it. Role
//! changes fan out to dependent components through `RoleRegistry::broadcast`,
//! which is all-or-nothing: every dependent is checked before any is updated.

use crate::error::{ProtocolError, Result};
use crate::types::Address;

#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    governor: Address,
    guardians: Vec<Address>,
}

impl AuthorizationContext {
    pub fn new(governor: Address) -> Self {
        Self {
            governor,
            guardians: Vec::new(),
        }
    }

    pub fn is_governor(&self, caller: Address) -> bool {
        caller == self.governor
    }

    /// The governor holds every guardian power as well.
    pub fn is_guardian(&self, caller: Address) -> bool {
        self.is_governor(caller) || self.guardians.contains(&caller)
    }

    pub fn require_governor(&self, caller: Address) -> Result<()> {
        if self.is_governor(caller) {
            Ok(())
        } else {
            Err(ProtocolError::Unauthorized)
        }
    }

    pub fn require_guardian(&self, caller: Address) -> Result<()> {
        if self.is_guardian(caller) {
            Ok(())
        } else {
            Err(ProtocolError::Unauthorized)
        }
    }

    pub fn add_guardian(&mut self, caller: Address, guardian: Address) -> Result<()> {
        self.require_governor(caller)?;
        if guardian.is_zero() {
            return Err(ProtocolError::ZeroAddress);
        }
        if !self.guardians.contains(&guardian) {
            self.guardians.push(guardian);
        }
        Ok(())
    }

    pub fn revoke_guardian(&mut self, caller: Address, guardian: Address) -> Result<()> {
        self.require_governor(caller)?;
        self.guardians.retain(|g| *g != guardian);
        Ok(())
    }
}

/// A role change pushed to dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleUpdate {
    SetGovernor(Address),
    AddGuardian(Address),
    RevokeGuardian(Address),
}

/// A component that mirrors the registry's roles.
pub trait RoleSink {
    /// Validate the update without applying it.
    fn check_role_update(&self, update: &RoleUpdate) -> Result<()>;

    /// Apply an update that passed `check_role_update`. Must not fail.
    fn apply_role_update(&mut self, update: &RoleUpdate);
}

impl RoleSink for AuthorizationContext {
    fn check_role_update(&self, update: &RoleUpdate) -> Result<()> {
        match update {
            RoleUpdate::SetGovernor(addr) | RoleUpdate::AddGuardian(addr) => {
                if addr.is_zero() {
                    Err(ProtocolError::ZeroAddress)
                } else {
                    Ok(())
                }
            }
            RoleUpdate::RevokeGuardian(_) => Ok(()),
        }
    }

    fn apply_role_update(&mut self, update: &RoleUpdate) {
        match update {
            RoleUpdate::SetGovernor(addr) => self.governor = *addr,
            RoleUpdate::AddGuardian(addr) => {
                if !self.guardians.contains(addr) {
                    self.guardians.push(*addr);
                }
            }
            RoleUpdate::RevokeGuardian(addr) => self.guardians.retain(|g| g != addr),
        }
    }
}

/// Registry of dependent components that must stay in role-sync.
#[derive(Default)]
pub struct RoleRegistry<'a> {
    dependents: Vec<&'a mut dyn RoleSink>,
}

impl<'a> RoleRegistry<'a> {
    pub fn new() -> Self {
        Self {
            dependents: Vec::new(),
        }
    }

    pub fn register(&mut self, dependent: &'a mut dyn RoleSink) {
        self.dependents.push(dependent);
    }

    /// Push one update to every dependent. All-or-nothing: a check pass
    /// over every dependent first, then an infallible apply pass, so a
    /// rejection leaves every dependent untouched.
    pub fn broadcast(&mut self, update: RoleUpdate) -> Result<()> {
        for dependent in self.dependents.iter() {
            dependent.check_role_update(&update)?;
        }
        for dependent in self.dependents.iter_mut() {
            dependent.apply_role_update(&update);
        }
        Ok(())
    }
}
