//! In-memory resource store
//!
//! Reference `ResourceStore` implementation used by the test suites and
//! as a single-node backend. Assigns uuid UIDs and monotonic resource
//! versions, enforces optimistic concurrency, and supports label
//! selection and limit/continue pagination.

use async_trait::async_trait;
use chrono::Utc;
use janus_common::{
    CreateOptions, DeleteOptions, Error, GetOptions, ListMeta, ListOptions, ResourceList,
    ResourceObject, Result, Table, TableColumn, TableRow, UpdateOptions,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::identity::RequestContext;
use crate::store::{ObjectValidator, ResourceStore, UpdateValidator, UpdatedObjectInfo};

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<String, ResourceObject>,
    next_rv: u64,
}

impl StoreState {
    fn allocate_rv(&mut self) -> String {
        self.next_rv += 1;
        self.next_rv.to_string()
    }
}

/// In-memory store for a single resource type
#[derive(Debug)]
pub struct MemoryStore {
    kind: String,
    api_version: String,
    resource: String,
    singular: String,
    namespace_scoped: bool,
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store for the given resource type
    pub fn new(
        kind: impl Into<String>,
        api_version: impl Into<String>,
        resource: impl Into<String>,
        singular: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            api_version: api_version.into(),
            resource: resource.into(),
            singular: singular.into(),
            namespace_scoped: true,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().objects.len()
    }

    /// Whether the store holds no objects
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().objects.is_empty()
    }

    /// Snapshot of the named object, bypassing options (test helper)
    #[must_use]
    pub fn peek(&self, name: &str) -> Option<ResourceObject> {
        self.state.read().objects.get(name).cloned()
    }

    /// Insert an object directly, assigning bookkeeping (test helper)
    pub fn seed(&self, obj: ResourceObject) -> ResourceObject {
        let mut state = self.state.write();
        let mut obj = obj;
        obj.meta.uid = Uuid::new_v4().to_string();
        obj.meta.resource_version = state.allocate_rv();
        obj.meta.creation_timestamp = Some(Utc::now());
        state.objects.insert(obj.meta.name.clone(), obj.clone());
        obj
    }

    fn matches_selector(obj: &ResourceObject, selector: Option<&str>) -> bool {
        let Some(selector) = selector else {
            return true;
        };
        selector.split(',').filter(|s| !s.is_empty()).all(|pair| {
            match pair.split_once('=') {
                Some((k, v)) => obj.meta.labels.get(k.trim()).map(String::as_str) == Some(v.trim()),
                None => false,
            }
        })
    }

    fn select(&self, opts: &ListOptions) -> ResourceList {
        let state = self.state.read();
        let mut items = Vec::new();
        let mut continue_token = None;

        let after = opts.continue_token.as_deref();
        for (name, obj) in state.objects.iter() {
            if let Some(after) = after {
                if name.as_str() <= after {
                    continue;
                }
            }
            if !Self::matches_selector(obj, opts.label_selector.as_deref()) {
                continue;
            }
            if let Some(limit) = opts.limit {
                if items.len() == limit {
                    continue_token = items.last().map(|o: &ResourceObject| o.meta.name.clone());
                    break;
                }
            }
            items.push(obj.clone());
        }

        ResourceList {
            meta: ListMeta {
                resource_version: state.next_rv.to_string(),
                continue_token,
            },
            items,
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create(
        &self,
        ctx: &RequestContext,
        obj: ResourceObject,
        validate: Option<&ObjectValidator>,
        opts: &CreateOptions,
    ) -> Result<ResourceObject> {
        if obj.meta.name.is_empty() {
            return Err(Error::accessor("object has no name"));
        }
        if let Some(validate) = validate {
            validate(ctx, &obj)?;
        }
        if opts.dry_run {
            return Ok(obj);
        }

        let mut state = self.state.write();
        if state.objects.contains_key(&obj.meta.name) {
            return Err(Error::conflict(&obj.meta.name, "object already exists"));
        }
        let mut stored = obj;
        stored.meta.uid = Uuid::new_v4().to_string();
        stored.meta.resource_version = state.allocate_rv();
        stored.meta.creation_timestamp = Some(Utc::now());
        state.objects.insert(stored.meta.name.clone(), stored.clone());
        Ok(stored)
    }

    async fn get(
        &self,
        _ctx: &RequestContext,
        name: &str,
        _opts: &GetOptions,
    ) -> Result<ResourceObject> {
        self.state
            .read()
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(&self.resource, name))
    }

    async fn list(&self, _ctx: &RequestContext, opts: &ListOptions) -> Result<ResourceList> {
        Ok(self.select(opts))
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        obj_info: &dyn UpdatedObjectInfo,
        create_validate: Option<&ObjectValidator>,
        update_validate: Option<&UpdateValidator>,
        force_allow_create: bool,
        opts: &UpdateOptions,
    ) -> Result<(ResourceObject, bool)> {
        let old = self.state.read().objects.get(name).cloned();

        let updated = obj_info.updated_object(ctx, old.as_ref()).await?;

        match old {
            None => {
                if !force_allow_create {
                    return Err(Error::not_found(&self.resource, name));
                }
                if let Some(validate) = create_validate {
                    validate(ctx, &updated)?;
                }
                if opts.dry_run {
                    return Ok((updated, true));
                }
                let mut state = self.state.write();
                let mut stored = updated;
                stored.meta.name = name.to_string();
                stored.meta.uid = Uuid::new_v4().to_string();
                stored.meta.resource_version = state.allocate_rv();
                stored.meta.creation_timestamp = Some(Utc::now());
                state.objects.insert(name.to_string(), stored.clone());
                Ok((stored, true))
            }
            Some(old) => {
                if !updated.meta.resource_version.is_empty()
                    && updated.meta.resource_version != old.meta.resource_version
                {
                    return Err(Error::conflict(
                        name,
                        format!(
                            "resource version mismatch: have {}, want {}",
                            old.meta.resource_version, updated.meta.resource_version
                        ),
                    ));
                }
                if let Some(validate) = update_validate {
                    validate(ctx, &updated, Some(&old))?;
                }
                if opts.dry_run {
                    return Ok((updated, false));
                }
                let mut state = self.state.write();
                let mut stored = updated;
                stored.meta.name = name.to_string();
                stored.meta.uid = old.meta.uid;
                stored.meta.creation_timestamp = old.meta.creation_timestamp;
                stored.meta.resource_version = state.allocate_rv();
                stored.meta.update_timestamp = Some(Utc::now());
                state.objects.insert(name.to_string(), stored.clone());
                Ok((stored, false))
            }
        }
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        validate: Option<&ObjectValidator>,
        _opts: &DeleteOptions,
    ) -> Result<(Option<ResourceObject>, bool)> {
        let existing = self
            .state
            .read()
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(&self.resource, name))?;
        if let Some(validate) = validate {
            validate(ctx, &existing)?;
        }
        self.state.write().objects.remove(name);
        Ok((Some(existing), false))
    }

    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        validate: Option<&ObjectValidator>,
        opts: &DeleteOptions,
        list_opts: &ListOptions,
    ) -> Result<ResourceList> {
        let selected = self.select(list_opts);
        let mut deleted = Vec::new();
        for obj in selected.items {
            match self.delete(ctx, &obj.meta.name, validate, opts).await {
                Ok((Some(obj), _)) => deleted.push(obj),
                Ok((None, _)) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(ResourceList {
            meta: ListMeta {
                resource_version: self.state.read().next_rv.to_string(),
                continue_token: None,
            },
            items: deleted,
        })
    }

    fn destroy(&self) {
        self.state.write().objects.clear();
    }

    fn singular_name(&self) -> &str {
        &self.singular
    }

    fn namespace_scoped(&self) -> bool {
        self.namespace_scoped
    }

    fn new_object(&self) -> ResourceObject {
        ResourceObject::new(&self.kind, &self.api_version, "")
    }

    fn new_list(&self) -> ResourceList {
        ResourceList::default()
    }

    async fn convert_to_table(&self, _ctx: &RequestContext, list: &ResourceList) -> Result<Table> {
        let columns = vec![
            TableColumn {
                name: "Name".to_string(),
                column_type: "string".to_string(),
            },
            TableColumn {
                name: "Resource Version".to_string(),
                column_type: "string".to_string(),
            },
            TableColumn {
                name: "Created".to_string(),
                column_type: "date".to_string(),
            },
        ];
        let rows = list
            .items
            .iter()
            .map(|obj| TableRow {
                cells: vec![
                    serde_json::Value::String(obj.meta.name.clone()),
                    serde_json::Value::String(obj.meta.resource_version.clone()),
                    obj.meta
                        .creation_timestamp
                        .map(|t| serde_json::Value::String(t.to_rfc3339()))
                        .unwrap_or(serde_json::Value::Null),
                ],
            })
            .collect();
        Ok(Table { columns, rows })
    }
}
