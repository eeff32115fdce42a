//! Parse-on-load, cache, check and save orchestration for page ACLs.
//!
//! Each page name owns one cache slot guarded by its own lock, so readers of
//! different pages never contend and a save only blocks readers of the page
//! being saved. A slot holds the ACL parsed for one page version together
//! with a SHA-256 hash of the text it came from; a changed text for the same
//! version is re-parsed.

use crate::config::AclConfig;
use crate::error::{AuthzError, Result, SaveError};
use crate::parser::{self, AclRepresentation, Dialect, ParsedAcl};
use crate::permission::{Action, ImplicationTable};
use crate::principal::PrincipalResolver;
use crate::printer;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// A stored page as seen by the ACL engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikiPage {
    pub name: String,
    pub version: u64,
    pub text: String,
}

impl WikiPage {
    pub fn new(name: impl Into<String>, version: u64, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            text: text.into(),
        }
    }
}

/// Persists page text. Called by [`AclManager::set_permissions`].
pub trait PageStore: Send + Sync {
    fn save(&self, page: &str, text: &str) -> std::result::Result<(), SaveError>;
}

#[derive(Debug)]
struct CachedAcl {
    version: u64,
    content_hash: String,
    parsed: Arc<ParsedAcl>,
}

type Slot = Arc<RwLock<Option<CachedAcl>>>;

/// Counters describing cache behaviour since the manager was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Same version, different text.
    pub reparses: u64,
    pub cached_pages: usize,
}

fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

pub struct AclManager {
    config: AclConfig,
    table: ImplicationTable,
    resolver: Arc<dyn PrincipalResolver>,
    store: Arc<dyn PageStore>,
    slots: RwLock<HashMap<String, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    reparses: AtomicU64,
}

impl AclManager {
    /// Fails only if the configuration's implication table is invalid.
    pub fn new(
        config: AclConfig,
        resolver: Arc<dyn PrincipalResolver>,
        store: Arc<dyn PageStore>,
    ) -> Result<Self> {
        let table = config.implication_table()?;
        info!(
            dialect = %config.dialect(),
            default_policy = ?config.default_policy(),
            "ACL manager initialized"
        );
        Ok(Self {
            config,
            table,
            resolver,
            store,
            slots: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            reparses: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect()
    }

    pub fn implication_table(&self) -> &ImplicationTable {
        &self.table
    }

    fn slot(&self, page: &str) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(page)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(page.to_string()).or_default())
    }

    fn parse_page(&self, page: &WikiPage) -> ParsedAcl {
        parser::parse(&page.name, &page.text, self.dialect(), self.resolver.as_ref())
    }

    /// Returns the cached entry if it is current for `page`, counting a
    /// re-parse when only the text differs.
    fn current(&self, cached: &Option<CachedAcl>, page: &WikiPage, hash: &str) -> Option<Arc<ParsedAcl>> {
        let entry = cached.as_ref()?;
        if entry.version != page.version {
            return None;
        }
        if entry.content_hash != hash {
            debug!(page = %page.name, version = page.version, "page text changed, re-parsing ACL");
            self.reparses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        Some(Arc::clone(&entry.parsed))
    }

    /// The ACL of `page`, parsed on first use and cached per version.
    pub fn get_permissions(&self, page: &WikiPage) -> Arc<ParsedAcl> {
        let slot = self.slot(&page.name);
        let hash = content_hash(&page.text);

        {
            let cached = slot.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cached.as_ref() {
                if entry.version == page.version && entry.content_hash == hash {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(page = %page.name, version = page.version, "ACL cache hit");
                    return Arc::clone(&entry.parsed);
                }
            }
        }

        let mut cached = slot.write().unwrap_or_else(PoisonError::into_inner);
        // Another reader may have filled the slot while we waited.
        if let Some(parsed) = self.current(&cached, page, &hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return parsed;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(page = %page.name, version = page.version, "ACL cache miss");

        let parsed = Arc::new(self.parse_page(page));
        *cached = Some(CachedAcl {
            version: page.version,
            content_hash: hash,
            parsed: Arc::clone(&parsed),
        });
        parsed
    }

    /// Decides whether any of `names` may perform `action` on `page`.
    ///
    /// `names` must already contain the subject's groups. A page without any
    /// ACL falls back to the configured default policy; a page with an ACL is
    /// deny-by-default.
    pub fn check_permission(&self, page: &WikiPage, names: &HashSet<String>, action: Action) -> bool {
        let parsed = self.get_permissions(page);
        let granted = if parsed.representation.is_empty() {
            self.config.default_policy().allows()
        } else {
            parsed.representation.is_granted(names, action, &self.table)
        };

        debug!(
            page = %page.name,
            action = %action,
            granted = granted,
            "ACL permission check"
        );
        granted
    }

    /// Writes `acl` into the page in canonical form and saves it.
    ///
    /// The cache is updated only after the store accepts the new text. On a
    /// save failure the previously cached ACL remains in place and the store's
    /// error is returned.
    pub fn set_permissions(&self, page: &WikiPage, acl: AclRepresentation) -> Result<WikiPage> {
        if acl.dialect() != self.dialect() {
            return Err(AuthzError::Configuration(format!(
                "cannot store a {} ACL when the engine is configured for {}",
                acl.dialect(),
                self.dialect()
            )));
        }
        if acl.page() != page.name {
            return Err(AuthzError::Configuration(format!(
                "ACL for page '{}' cannot be stored on page '{}'",
                acl.page(),
                page.name
            )));
        }

        let slot = self.slot(&page.name);
        let mut cached = slot.write().unwrap_or_else(PoisonError::into_inner);

        let hash = content_hash(&page.text);
        let existing = match self.current(&cached, page, &hash) {
            Some(parsed) => parsed,
            None => Arc::new(self.parse_page(page)),
        };
        let new_text = printer::embed_acl(&page.text, &existing, &acl);

        if let Err(err) = self.store.save(&page.name, &new_text) {
            warn!(page = %page.name, error = %err, "saving page ACL failed");
            return Err(AuthzError::Save(err));
        }

        let saved = WikiPage::new(page.name.clone(), page.version + 1, new_text);
        let parsed = Arc::new(self.parse_page(&saved));
        *cached = Some(CachedAcl {
            version: saved.version,
            content_hash: content_hash(&saved.text),
            parsed,
        });

        info!(page = %saved.name, version = saved.version, "page ACL saved");
        Ok(saved)
    }

    /// Drops the cached ACL of one page and forgets the page. Returns true if
    /// something was cached.
    pub fn invalidate(&self, page: &str) -> bool {
        let slot = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(page);
        match slot {
            Some(slot) => slot
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .is_some(),
            None => false,
        }
    }

    /// Drops every cached ACL. Returns the number of pages that were cached.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let count = slots
            .values()
            .filter(|slot| slot.read().unwrap_or_else(PoisonError::into_inner).is_some())
            .count();
        slots.clear();
        info!("Cleared {} cached page ACLs", count);
        count
    }

    pub fn stats(&self) -> CacheStats {
        let cached_pages = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.read().unwrap_or_else(PoisonError::into_inner).is_some())
            .count();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            reparses: self.reparses.load(Ordering::Relaxed),
            cached_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::NullResolver;

    struct AcceptAll;

    impl PageStore for AcceptAll {
        fn save(&self, _page: &str, _text: &str) -> std::result::Result<(), SaveError> {
            Ok(())
        }
    }

    fn manager() -> AclManager {
        AclManager::new(
            AclConfig::default(),
            Arc::new(NullResolver),
            Arc::new(AcceptAll),
        )
        .unwrap()
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = content_hash("[{ALLOW view Bob}]");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("[{ALLOW view Bob}]"));
        assert_ne!(hash, content_hash("[{ALLOW view Eve}]"));
    }

    #[test]
    fn test_second_lookup_is_a_hit() {
        let manager = manager();
        let page = WikiPage::new("Main", 1, "[{ALLOW view Bob}]");

        let first = manager.get_permissions(&page);
        let second = manager.get_permissions(&page);
        assert!(Arc::ptr_eq(&first, &second));

        let stats = manager.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.cached_pages, 1);
    }

    #[test]
    fn test_changed_text_same_version_reparses() {
        let manager = manager();
        let names: HashSet<String> = ["Bob".to_string()].into();

        let page = WikiPage::new("Main", 1, "[{ALLOW view Bob}]");
        assert!(manager.check_permission(&page, &names, Action::View));

        let edited = WikiPage::new("Main", 1, "[{ALLOW view Eve}]");
        assert!(!manager.check_permission(&edited, &names, Action::View));
        assert_eq!(manager.stats().reparses, 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let manager = manager();
        manager.get_permissions(&WikiPage::new("A", 1, ""));
        manager.get_permissions(&WikiPage::new("B", 1, ""));

        assert!(manager.invalidate("A"));
        assert_eq!(manager.slots.read().unwrap().len(), 1);
        assert!(!manager.invalidate("A"));
        assert!(!manager.invalidate("Missing"));
        assert_eq!(manager.slots.read().unwrap().len(), 1);
        assert_eq!(manager.clear(), 1);
        assert_eq!(manager.stats().cached_pages, 0);
    }

    #[test]
    fn test_dialect_mismatch_is_rejected() {
        let manager = manager();
        let page = WikiPage::new("Main", 1, "");
        let acl = AclRepresentation::Expression(crate::rule::AdvancedAcl::new("Main"));
        assert!(matches!(
            manager.set_permissions(&page, acl),
            Err(AuthzError::Configuration(_))
        ));
    }

    #[test]
    fn test_acl_for_another_page_is_rejected() {
        let manager = manager();
        let page = WikiPage::new("Main", 1, "[{ALLOW view Bob}]");
        let mut acl = crate::acl::Acl::new("Other");
        acl.grant(crate::principal::PrincipalRef::User("Eve".into()), Action::Edit);

        let err = manager
            .set_permissions(&page, AclRepresentation::Enumeration(acl))
            .unwrap_err();
        assert!(matches!(err, AuthzError::Configuration(ref msg) if msg.contains("'Other'")));

        let eve: HashSet<String> = ["Eve".to_string()].into();
        assert!(!manager.check_permission(&page, &eve, Action::Edit));
    }
}
