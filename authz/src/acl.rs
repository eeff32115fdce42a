//! Enumeration ACLs: principals mapped to the permissions granted to them.

use crate::permission::{Action, ImplicationTable, Permission};
use crate::principal::PrincipalRef;
use serde::Serialize;
use std::collections::HashSet;

/// One principal and the permissions granted to it on a page.
///
/// Permissions are stored as granted, never pre-expanded. Checks go through
/// the implication table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclEntry {
    principal: PrincipalRef,
    permissions: Vec<Permission>,
}

impl AclEntry {
    pub fn new(principal: PrincipalRef) -> Self {
        Self {
            principal,
            permissions: Vec::new(),
        }
    }

    pub fn principal(&self) -> &PrincipalRef {
        &self.principal
    }

    /// Permissions in the order they were granted.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    /// Adds a permission. Returns false if the identical permission was already held.
    pub fn add_permission(&mut self, permission: Permission) -> bool {
        if self.permissions.contains(&permission) {
            return false;
        }
        self.permissions.push(permission);
        true
    }

    /// Removes a permission. Returns false if it was not held.
    pub fn remove_permission(&mut self, permission: &Permission) -> bool {
        let before = self.permissions.len();
        self.permissions.retain(|held| held != permission);
        self.permissions.len() != before
    }

    /// True if any held permission implies `requested`.
    pub fn check_permission(&self, requested: &Permission, table: &ImplicationTable) -> bool {
        self.permissions
            .iter()
            .any(|held| held.implies(requested, table))
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    fn merge(&mut self, other: AclEntry) {
        for permission in other.permissions {
            self.add_permission(permission);
        }
    }
}

/// The ACL of one page: at most one entry per principal, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acl {
    page: String,
    entries: Vec<AclEntry>,
}

impl Acl {
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            entries: Vec::new(),
        }
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    /// Inserts an entry, merging permission sets if the principal already has one.
    pub fn add_entry(&mut self, entry: AclEntry) {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.principal == entry.principal)
        {
            Some(existing) => existing.merge(entry),
            None => self.entries.push(entry),
        }
    }

    /// Grants `action` on this page to `principal`.
    pub fn grant(&mut self, principal: PrincipalRef, action: Action) {
        let mut entry = AclEntry::new(principal);
        entry.add_permission(Permission::page(self.page.clone(), action));
        self.add_entry(entry);
    }

    /// Removes the principal's entry. Returns the removed entry, if any.
    pub fn remove_entry(&mut self, principal: &PrincipalRef) -> Option<AclEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.principal == principal)?;
        Some(self.entries.remove(index))
    }

    pub fn entry(&self, principal: &PrincipalRef) -> Option<&AclEntry> {
        self.entries.iter().find(|entry| &entry.principal == principal)
    }

    /// Principals whose permissions imply `action` on this page, in entry order.
    pub fn find_principals(&self, action: Action, table: &ImplicationTable) -> Vec<PrincipalRef> {
        let requested = Permission::page(self.page.clone(), action);
        self.entries
            .iter()
            .filter(|entry| entry.check_permission(&requested, table))
            .map(|entry| entry.principal.clone())
            .collect()
    }

    /// True if any of `names` holds a permission implying `action` on this page.
    pub fn is_granted(&self, names: &HashSet<String>, action: Action, table: &ImplicationTable) -> bool {
        let requested = Permission::page(self.page.clone(), action);
        self.entries.iter().any(|entry| {
            names.contains(entry.principal.name()) && entry.check_permission(&requested, table)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A snapshot of the entries. Later mutation of the ACL is not visible
    /// through an iterator that has already been handed out.
    pub fn entries(&self) -> std::vec::IntoIter<AclEntry> {
        self.entries.clone().into_iter()
    }

    /// Borrowing iterator over the entries.
    pub fn iter(&self) -> std::slice::Iter<'_, AclEntry> {
        self.entries.iter()
    }
}
