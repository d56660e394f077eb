//! Authorization decisions.
//!
//! The engine is built once per published snapshot. Construction resolves
//! every group's roles into `(path, action)` pairs; decisions afterwards are
//! pure, lock-free lookups against that index.
//!
//! # Example
//!
//! ```ignore
//! use warden_core::{Action, ObjectPath, ResourceRequest, Subject};
//! use warden_policy::{AuthorizationEngine, EngineConfig};
//!
//! let engine = AuthorizationEngine::new(view, EngineConfig::default());
//! let subject = Subject::new(["analysts"]);
//! let request = ResourceRequest::object(
//!     ObjectPath::for_table("server1", "sales", "orders"),
//!     Action::Select,
//! );
//! if engine.authorize(&subject, &request).is_allowed() {
//!     // run the statement
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use warden_core::{Action, Component, ObjectPath, Resource, ResourceRequest, Subject};

use crate::distributor::{DocumentScope, MergedPolicyView};
use crate::operation::OperationRequest;
use crate::resolver::{CanonicalPath, ResolvedGrant, resolve};

// =============================================================================
// Decision
// =============================================================================

/// Result of an authorization query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            Self::Allow => None,
        }
    }

    /// Returns `true` if the denial came from a fault rather than a missing grant.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.deny_reason()
            .is_some_and(|reason| reason.code != DenyCode::MissingPrivilege)
    }
}

/// Machine-readable denial category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyCode {
    /// The subject holds no grant that covers the request.
    MissingPrivilege,
    /// The per-database document covering the request failed to load.
    PolicyUnavailable,
    /// The operation request lacks something its privilege model needs.
    InvalidRequest,
}

impl DenyCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPrivilege => "missing-privilege",
            Self::PolicyUnavailable => "policy-unavailable",
            Self::InvalidRequest => "invalid-request",
        }
    }
}

impl fmt::Display for DenyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    pub code: DenyCode,

    /// Human-readable explanation.
    pub message: String,

    /// The resource that failed, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl DenyReason {
    #[must_use]
    pub fn missing_privilege(request: &ResourceRequest) -> Self {
        Self {
            code: DenyCode::MissingPrivilege,
            message: format!("No grant allows {request}"),
            resource: Some(request.resource.clone()),
            action: Some(request.action),
        }
    }

    #[must_use]
    pub fn no_privilege_on(path: &ObjectPath) -> Self {
        Self {
            code: DenyCode::MissingPrivilege,
            message: format!("No privilege on or below {path}"),
            resource: Some(Resource::Object(path.clone())),
            action: None,
        }
    }

    #[must_use]
    pub fn policy_unavailable(
        database: &str,
        reason: &str,
        resource: Resource,
        action: Option<Action>,
    ) -> Self {
        Self {
            code: DenyCode::PolicyUnavailable,
            message: format!("Policy for database `{database}` is unavailable: {reason}"),
            resource: Some(resource),
            action,
        }
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: DenyCode::InvalidRequest,
            message: message.into(),
            resource: None,
            action: None,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Server name used for server, database and URI requirements of
    /// operation requests and discovery helpers.
    pub server: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server: "server1".to_string(),
        }
    }
}

/// A resolved pair together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EffectiveGrant {
    #[serde(flatten)]
    pub grant: ResolvedGrant,
    pub role: String,
    pub source: DocumentScope,
}

/// Answers ALLOW/DENY against one merged policy view.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    view: Arc<MergedPolicyView>,
    server: Component,
    grants_by_group: HashMap<String, Vec<EffectiveGrant>>,
    unavailable: BTreeMap<String, String>,
}

impl AuthorizationEngine {
    #[must_use]
    pub fn new(view: Arc<MergedPolicyView>, config: EngineConfig) -> Self {
        let mut index: HashMap<String, BTreeSet<EffectiveGrant>> = HashMap::new();

        // Roles only resolve within the document that maps them.
        for (scope, document) in view.documents() {
            for (group, roles) in document.groups() {
                let grants = index.entry(group.clone()).or_default();
                for role in roles {
                    for permission in document.permissions_for_role(role) {
                        grants.extend(resolve(permission).into_iter().map(|grant| EffectiveGrant {
                            grant,
                            role: role.clone(),
                            source: scope.clone(),
                        }));
                    }
                }
            }
        }

        let grants_by_group: HashMap<String, Vec<EffectiveGrant>> = index
            .into_iter()
            .map(|(group, grants)| (group, grants.into_iter().collect()))
            .collect();

        let unavailable = view
            .unavailable_databases()
            .map(|(name, reason)| (name.to_string(), reason.to_string()))
            .collect();

        tracing::debug!(
            groups = grants_by_group.len(),
            grants = grants_by_group.values().map(Vec::len).sum::<usize>(),
            "Authorization engine built"
        );

        Self {
            view,
            server: Component::parse(&config.server),
            grants_by_group,
            unavailable,
        }
    }

    #[must_use]
    pub fn view(&self) -> &Arc<MergedPolicyView> {
        &self.view
    }

    #[must_use]
    pub fn server(&self) -> &Component {
        &self.server
    }

    fn grants_for<'a>(&'a self, subject: &'a Subject) -> impl Iterator<Item = &'a EffectiveGrant> {
        subject
            .groups()
            .iter()
            .filter_map(|group| self.grants_by_group.get(group))
            .flatten()
    }

    /// The failure reason if `resource` sits in a database whose document failed.
    fn unavailable_reason(&self, resource: &Resource) -> Option<(&str, &str)> {
        let database = resource.as_object()?.database_name()?;
        self.unavailable
            .get_key_value(database)
            .map(|(name, reason)| (name.as_str(), reason.as_str()))
    }

    /// Decide a single request. Never errors; the default is DENY.
    #[must_use]
    pub fn authorize(&self, subject: &Subject, request: &ResourceRequest) -> Decision {
        let requested = CanonicalPath::from_resource(&request.resource);
        let granted = self
            .grants_for(subject)
            .find(|effective| effective.grant.permits(&requested, request.action));

        if let Some(effective) = granted {
            tracing::trace!(
                request = %request,
                role = %effective.role,
                source = %effective.source,
                "Access allowed"
            );
            return Decision::Allow;
        }

        let reason = match self.unavailable_reason(&request.resource) {
            Some((database, failure)) => DenyReason::policy_unavailable(
                database,
                failure,
                request.resource.clone(),
                Some(request.action),
            ),
            None => DenyReason::missing_privilege(request),
        };
        tracing::debug!(
            request = %request,
            groups = ?subject.groups(),
            code = %reason.code,
            "Access denied"
        );
        Decision::Deny(reason)
    }

    /// Every request must be allowed; returns the first denial.
    pub fn authorize_all<'a>(
        &self,
        subject: &Subject,
        requests: impl IntoIterator<Item = &'a ResourceRequest>,
    ) -> Decision {
        for request in requests {
            let decision = self.authorize(subject, request);
            if decision.is_denied() {
                return decision;
            }
        }
        Decision::Allow
    }

    /// Decide a whole statement through the operation privilege model.
    #[must_use]
    pub fn authorize_operation(&self, subject: &Subject, operation: &OperationRequest) -> Decision {
        let requirements = match operation.expand(&self.server) {
            Ok(requirements) => requirements,
            Err(e) => {
                tracing::debug!(kind = %operation.kind, error = %e, "Invalid operation request");
                return Decision::Deny(DenyReason::invalid_request(e.to_string()));
            }
        };

        if let Some(path) = &requirements.any_privilege_on
            && !self.has_any_privilege(subject, path)
        {
            let resource = Resource::Object(path.clone());
            let reason = match self.unavailable_reason(&resource) {
                Some((database, failure)) => {
                    DenyReason::policy_unavailable(database, failure, resource, None)
                }
                None => DenyReason::no_privilege_on(path),
            };
            return Decision::Deny(reason);
        }

        self.authorize_all(subject, &requirements.requests)
    }

    /// Returns `true` if some object grant lies on, above or below `path`.
    #[must_use]
    pub fn has_any_privilege(&self, subject: &Subject, path: &ObjectPath) -> bool {
        let target = CanonicalPath::from_resource(&Resource::Object(path.clone()));
        self.grants_for(subject)
            .any(|effective| effective.grant.path.is_related(&target))
    }

    /// Filters database names down to those the subject may see.
    pub fn visible_databases<I, S>(&self, subject: &Subject, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| {
                let path = ObjectPath::for_database(self.server.clone(), name.as_ref());
                self.has_any_privilege(subject, &path)
            })
            .map(|name| name.as_ref().to_string())
            .collect()
    }

    /// Filters table names in `database` down to those the subject may see.
    pub fn visible_tables<I, S>(&self, subject: &Subject, database: &str, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| {
                let path = ObjectPath::for_table(self.server.clone(), database, name.as_ref());
                self.has_any_privilege(subject, &path)
            })
            .map(|name| name.as_ref().to_string())
            .collect()
    }

    /// Every resolved pair reachable from the subject's groups, sorted.
    #[must_use]
    pub fn effective_permissions(&self, subject: &Subject) -> Vec<EffectiveGrant> {
        let unique: BTreeSet<&EffectiveGrant> = self.grants_for(subject).collect();
        unique.into_iter().cloned().collect()
    }

    /// Returns `true` unless the database's own document failed to load.
    #[must_use]
    pub fn is_database_available(&self, database: &str) -> bool {
        !self.unavailable.contains_key(&database.to_ascii_lowercase())
    }
}
