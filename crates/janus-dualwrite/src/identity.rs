//! Request context and identity
//!
//! Both backing stores enforce authorization, so every storage call
//! carries an explicit context value: the requesting principal, the
//! namespace, external request info, and a cooperative cancel flag.
//! Identity is never global state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Kind of principal making a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityType {
    User,
    ServiceAccount,
}

impl IdentityType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityType::User => "user",
            IdentityType::ServiceAccount => "service-account",
        }
    }
}

/// Organization-level role of a principal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrgRole {
    Viewer,
    Editor,
    Admin,
}

/// The principal a storage call runs as.
///
/// Permissions map org id to action to the scopes the action is allowed
/// on; `"*"` wildcards match everything at their level.
#[derive(Clone, Debug)]
pub struct Requester {
    pub identity_type: IdentityType,
    pub user_id: i64,
    pub org_id: i64,
    pub login: String,
    pub role: OrgRole,
    /// Server-wide administrator, unrestricted by org role
    pub server_admin: bool,
    pub permissions: HashMap<i64, HashMap<String, Vec<String>>>,
}

impl Requester {
    /// The synthetic service-account principal the data syncer runs as.
    /// It must be able to read and write every resource in the org, so it
    /// carries wildcard permissions.
    #[must_use]
    pub fn sync_requester(org_id: i64) -> Self {
        let mut org_perms = HashMap::new();
        org_perms.insert("*".to_string(), vec!["*".to_string()]);
        let mut permissions = HashMap::new();
        permissions.insert(org_id, org_perms);

        Self {
            identity_type: IdentityType::ServiceAccount,
            user_id: 1,
            org_id,
            login: "admin".to_string(),
            role: OrgRole::Admin,
            server_admin: true,
            permissions,
        }
    }

    /// Whether this principal may perform `action` on `scope` in `org_id`
    #[must_use]
    pub fn has_permission(&self, org_id: i64, action: &str, scope: &str) -> bool {
        let Some(org_perms) = self.permissions.get(&org_id) else {
            return false;
        };
        for (allowed_action, scopes) in org_perms {
            if allowed_action != "*" && allowed_action != action {
                continue;
            }
            if scopes.iter().any(|s| s == "*" || s == scope) {
                return true;
            }
        }
        false
    }
}

/// External request info attached to a storage call
#[derive(Clone, Debug, Default)]
pub struct RequestInfo {
    pub api_group: String,
    pub resource: String,
    pub name: String,
    pub namespace: String,
}

impl RequestInfo {
    /// The same request info scoped to a single named object
    #[must_use]
    pub fn scoped_to(&self, name: impl Into<String>) -> Self {
        Self {
            api_group: self.api_group.clone(),
            resource: self.resource.clone(),
            name: name.into(),
            namespace: self.namespace.clone(),
        }
    }
}

/// Per-call context threaded through every storage operation.
///
/// Cloning is cheap; clones share the cancel flag, so cancelling any
/// clone cancels the whole call tree.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    requester: Option<Arc<Requester>>,
    namespace: Option<String>,
    request_info: Option<Arc<RequestInfo>>,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    /// An empty context with no principal attached
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a requesting principal
    #[must_use]
    pub fn with_requester(mut self, requester: Requester) -> Self {
        self.requester = Some(Arc::new(requester));
        self
    }

    /// Attach a namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Attach external request info
    #[must_use]
    pub fn with_request_info(mut self, info: RequestInfo) -> Self {
        self.request_info = Some(Arc::new(info));
        self
    }

    /// The requesting principal, if any
    #[must_use]
    pub fn requester(&self) -> Option<&Requester> {
        self.requester.as_deref()
    }

    /// The namespace, if any
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The request info, if any
    #[must_use]
    pub fn request_info(&self) -> Option<&RequestInfo> {
        self.request_info.as_deref()
    }

    /// Cancel this context and every clone sharing its flag
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether the context has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Namespace for the authz collaborator: cloud deployments key namespaces
/// by stack, on-prem deployments by org (org 1 is "default").
#[must_use]
pub fn namespace_for(stack_id: Option<&str>, org_id: i64) -> String {
    match stack_id {
        Some(stack) => format!("stacks-{stack}"),
        None if org_id == 1 => "default".to_string(),
        None => format!("org-{org_id}"),
    }
}
