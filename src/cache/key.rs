//! Cache Key Module
//!
//! Opaque cache keys and the well-known resource kinds with their default TTLs.

use std::fmt;
use std::time::Duration;

const MINUTE_MS: u64 = 60 * 1000;

// == Resource Kind ==
/// Named resources the portal caches, each with its own default TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Announcements,
    CalendarEvents,
    Members,
    MemberActivities,
    RuleModifications,
    Resources,
    Newsletters,
    PublicNews,
    PublicTraining,
    PublicResources,
    PublicPages,
    Officials,
    ExecutiveTeam,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        ResourceKind::Announcements,
        ResourceKind::CalendarEvents,
        ResourceKind::Members,
        ResourceKind::MemberActivities,
        ResourceKind::RuleModifications,
        ResourceKind::Resources,
        ResourceKind::Newsletters,
        ResourceKind::PublicNews,
        ResourceKind::PublicTraining,
        ResourceKind::PublicResources,
        ResourceKind::PublicPages,
        ResourceKind::Officials,
        ResourceKind::ExecutiveTeam,
    ];

    /// The key string this resource is stored under.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Announcements => "announcements",
            ResourceKind::CalendarEvents => "calendarEvents",
            ResourceKind::Members => "members",
            ResourceKind::MemberActivities => "memberActivities",
            ResourceKind::RuleModifications => "ruleModifications",
            ResourceKind::Resources => "resources",
            ResourceKind::Newsletters => "newsletters",
            ResourceKind::PublicNews => "publicNews",
            ResourceKind::PublicTraining => "publicTraining",
            ResourceKind::PublicResources => "publicResources",
            ResourceKind::PublicPages => "publicPages",
            ResourceKind::Officials => "officials",
            ResourceKind::ExecutiveTeam => "executiveTeam",
        }
    }

    /// Frequently changing data gets a short TTL, reference data a long one.
    pub fn default_ttl(&self) -> Duration {
        let minutes = match self {
            ResourceKind::Announcements => 5,
            ResourceKind::CalendarEvents => 10,
            ResourceKind::Members => 15,
            ResourceKind::MemberActivities => 10,
            ResourceKind::RuleModifications => 30,
            ResourceKind::Resources => 30,
            ResourceKind::Newsletters => 60,
            ResourceKind::PublicNews => 10,
            ResourceKind::PublicTraining => 15,
            ResourceKind::PublicResources => 30,
            ResourceKind::PublicPages => 30,
            ResourceKind::Officials => 30,
            ResourceKind::ExecutiveTeam => 30,
        };
        Duration::from_millis(minutes * MINUTE_MS)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }
}

// == Cache Key ==
/// Opaque identifier of one cached slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The resource kind this key names, if it is a well-known one.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_key(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ResourceKind> for CacheKey {
    fn from(kind: ResourceKind) -> Self {
        Self(kind.as_str().to_string())
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(key: &CacheKey) -> Self {
        key.clone()
    }
}
