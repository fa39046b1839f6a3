//! Resource store contract
//!
//! This module defines the storage trait both backing stores implement,
//! the validator function types, and the updated-object-info seam used
//! by update operations.

use async_trait::async_trait;
use janus_common::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ResourceList, ResourceObject, Result,
    Table, UpdateOptions,
};

use crate::identity::RequestContext;

/// Dual-writer variant. Only mode 2 is implemented; the others are the
/// remaining steps of the migration ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DualWriterMode {
    /// Write legacy only, read legacy
    Mode1,
    /// Write both, read legacy (storage overlay on list)
    Mode2,
    /// Write both, read storage
    Mode3,
    /// Write storage only, read storage
    Mode4,
}

impl DualWriterMode {
    /// Metric label value for this mode
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DualWriterMode::Mode1 => "1",
            DualWriterMode::Mode2 => "2",
            DualWriterMode::Mode3 => "3",
            DualWriterMode::Mode4 => "4",
        }
    }
}

/// Validates an object on create and delete paths
pub type ObjectValidator = dyn Fn(&RequestContext, &ResourceObject) -> Result<()> + Send + Sync;

/// Validates an updated object against the existing one
pub type UpdateValidator =
    dyn Fn(&RequestContext, &ResourceObject, Option<&ResourceObject>) -> Result<()> + Send + Sync;

/// Transforms an object inside an update, after the existing object is known
pub type TransformFn =
    dyn Fn(&RequestContext, ResourceObject) -> Result<ResourceObject> + Send + Sync;

/// Produces the object an update should persist, given the store's
/// current version of it (absent on force-allowed creates).
#[async_trait]
pub trait UpdatedObjectInfo: Send + Sync {
    async fn updated_object(
        &self,
        ctx: &RequestContext,
        old: Option<&ResourceObject>,
    ) -> Result<ResourceObject>;
}

/// Updated-object info backed by a prepared object plus an optional chain
/// of transform functions applied in order.
pub struct DefaultUpdatedObjectInfo {
    obj: ResourceObject,
    transformers: Vec<Box<TransformFn>>,
}

impl DefaultUpdatedObjectInfo {
    /// Wrap a prepared object
    #[must_use]
    pub fn new(obj: ResourceObject) -> Self {
        Self {
            obj,
            transformers: Vec::new(),
        }
    }

    /// Append a transform applied after the prepared object is cloned
    #[must_use]
    pub fn with_transform(
        mut self,
        f: impl Fn(&RequestContext, ResourceObject) -> Result<ResourceObject> + Send + Sync + 'static,
    ) -> Self {
        self.transformers.push(Box::new(f));
        self
    }
}

#[async_trait]
impl UpdatedObjectInfo for DefaultUpdatedObjectInfo {
    async fn updated_object(
        &self,
        ctx: &RequestContext,
        _old: Option<&ResourceObject>,
    ) -> Result<ResourceObject> {
        let mut obj = self.obj.clone();
        for f in &self.transformers {
            obj = f(ctx, obj)?;
        }
        Ok(obj)
    }
}

/// The resource-storage contract implemented by both backing stores and
/// by the dual writer itself.
///
/// Not-found is expressed through the error kind so callers can
/// distinguish it from backend failures.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Persist a new object. The store assigns uid and resource version.
    async fn create(
        &self,
        ctx: &RequestContext,
        obj: ResourceObject,
        validate: Option<&ObjectValidator>,
        opts: &CreateOptions,
    ) -> Result<ResourceObject>;

    /// Fetch a single object by name.
    async fn get(&self, ctx: &RequestContext, name: &str, opts: &GetOptions)
        -> Result<ResourceObject>;

    /// List objects, honoring selector, limit, and continuation options.
    async fn list(&self, ctx: &RequestContext, opts: &ListOptions) -> Result<ResourceList>;

    /// Update the named object. With `force_allow_create` the store
    /// creates the object when it does not exist. Returns the stored
    /// object and whether it was created.
    async fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        obj_info: &dyn UpdatedObjectInfo,
        create_validate: Option<&ObjectValidator>,
        update_validate: Option<&UpdateValidator>,
        force_allow_create: bool,
        opts: &UpdateOptions,
    ) -> Result<(ResourceObject, bool)>;

    /// Delete the named object. Returns the deleted snapshot and whether
    /// deletion completes asynchronously.
    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        validate: Option<&ObjectValidator>,
        opts: &DeleteOptions,
    ) -> Result<(Option<ResourceObject>, bool)>;

    /// Delete every object matched by `list_opts`. Returns the deleted objects.
    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        validate: Option<&ObjectValidator>,
        opts: &DeleteOptions,
        list_opts: &ListOptions,
    ) -> Result<ResourceList>;

    /// Release any resources held by the store.
    fn destroy(&self);

    /// Lowercase singular name of the resource (e.g. "savedview")
    fn singular_name(&self) -> &str;

    /// Whether objects of this resource live inside a namespace
    fn namespace_scoped(&self) -> bool;

    /// An empty object of this store's resource type
    fn new_object(&self) -> ResourceObject;

    /// An empty list of this store's resource type
    fn new_list(&self) -> ResourceList;

    /// Project a list of objects into a table for display
    async fn convert_to_table(&self, ctx: &RequestContext, list: &ResourceList) -> Result<Table>;
}
