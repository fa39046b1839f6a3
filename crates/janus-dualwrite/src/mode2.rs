//! Dual writer, mode 2
//!
//! Mode 2 mirrors writes to both stores and reads with legacy as the
//! authority: Get consults unified storage first and falls back to
//! legacy on not-found but always returns the legacy object, List
//! overlays unified-storage items onto the legacy list, and every
//! mutating operation returns the legacy result so callers observe
//! legacy identity. Divergence between the stores is counted and logged
//! but never fails the caller.

use async_trait::async_trait;
use janus_common::{
    CreateOptions, DeleteOptions, Error, GetOptions, ListOptions, ResourceList, ResourceObject,
    Result, Table, UpdateOptions,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::compare;
use crate::identity::RequestContext;
use crate::meta;
use crate::metrics::DualWriterMetrics;
use crate::store::{
    DualWriterMode, ObjectValidator, ResourceStore, UpdateValidator, UpdatedObjectInfo,
};

/// Dispatcher over the legacy and unified stores.
///
/// Immutable after construction; the only mutable state it touches is
/// the metrics recorder, so concurrent calls serialize nothing here.
pub struct DualWriter {
    legacy: Arc<dyn ResourceStore>,
    storage: Arc<dyn ResourceStore>,
    resource: String,
    metrics: Arc<DualWriterMetrics>,
}

impl DualWriter {
    /// Create a mode-2 dual writer over the two stores
    pub fn new(
        legacy: Arc<dyn ResourceStore>,
        storage: Arc<dyn ResourceStore>,
        metrics: Arc<DualWriterMetrics>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            legacy,
            storage,
            resource: resource.into(),
            metrics,
        }
    }

    /// The dual-writer variant this dispatcher implements
    #[must_use]
    pub fn mode(&self) -> DualWriterMode {
        DualWriterMode::Mode2
    }

    /// The metrics recorder shared with the data syncer
    #[must_use]
    pub fn metrics(&self) -> &Arc<DualWriterMetrics> {
        &self.metrics
    }
}

#[async_trait]
impl ResourceStore for DualWriter {
    async fn create(
        &self,
        ctx: &RequestContext,
        obj: ResourceObject,
        validate: Option<&ObjectValidator>,
        opts: &CreateOptions,
    ) -> Result<ResourceObject> {
        let method = "create";

        let start_legacy = Instant::now();
        let created_legacy = match self.legacy.create(ctx, obj.clone(), validate, opts).await {
            Ok(created) => {
                self.metrics.record_legacy_duration(false, method, start_legacy);
                created
            }
            Err(err) => {
                error!(
                    "unable to create {:?} in legacy storage: {}",
                    obj.meta.name, err
                );
                self.metrics.record_legacy_duration(true, method, start_legacy);
                return Err(err);
            }
        };

        // A uid on the way in means the caller is replaying a stored
        // object; unified storage is not touched.
        if !obj.meta.uid.is_empty() {
            return Err(Error::invalid_object(format!(
                "create carries a uid and it should not: {:?}",
                obj.meta.uid
            )));
        }

        let start_storage = Instant::now();
        let created_storage = match self.storage.create(ctx, obj, validate, opts).await {
            Ok(created) => {
                self.metrics
                    .record_storage_duration(false, method, start_storage);
                created
            }
            Err(err) => {
                error!(
                    "unable to create {:?} in unified storage: {}",
                    created_legacy.meta.name, err
                );
                self.metrics
                    .record_storage_duration(true, method, start_storage);
                return Err(err);
            }
        };

        let equal = compare::objects_match(&created_storage, &created_legacy);
        self.metrics
            .record_outcome(method, created_storage.name(), equal);
        if !equal {
            info!(
                "created object {:?} differs between legacy and unified storage",
                created_storage.name()
            );
        }

        Ok(created_legacy)
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        name: &str,
        opts: &GetOptions,
    ) -> Result<ResourceObject> {
        let method = "get";

        let start_storage = Instant::now();
        let obj_storage = match self.storage.get(ctx, name, opts).await {
            Ok(obj) => {
                self.metrics
                    .record_storage_duration(false, method, start_storage);
                Some(obj)
            }
            Err(err) if err.is_not_found() => {
                self.metrics
                    .record_storage_duration(true, method, start_storage);
                info!(
                    "object {:?} not found in unified storage, fetching from legacy",
                    name
                );
                None
            }
            Err(err) => {
                error!("unable to fetch {:?} from unified storage: {}", name, err);
                self.metrics
                    .record_storage_duration(true, method, start_storage);
                return Err(err);
            }
        };

        let start_legacy = Instant::now();
        let obj_legacy = match self.legacy.get(ctx, name, opts).await {
            Ok(obj) => {
                self.metrics.record_legacy_duration(false, method, start_legacy);
                obj
            }
            Err(err) => {
                error!("unable to fetch {:?} from legacy storage: {}", name, err);
                self.metrics.record_legacy_duration(true, method, start_legacy);
                return Err(err);
            }
        };

        if let Some(obj_storage) = obj_storage {
            let equal = compare::objects_match(&obj_storage, &obj_legacy);
            self.metrics.record_outcome(method, name, equal);
            if !equal {
                info!(
                    "object {:?} differs between legacy and unified storage",
                    name
                );
            }
        }

        // Always the legacy object, so callers observe legacy identity
        // and its resource version.
        Ok(obj_legacy)
    }

    async fn list(&self, ctx: &RequestContext, opts: &ListOptions) -> Result<ResourceList> {
        let method = "list";

        let start_legacy = Instant::now();
        let legacy_list = match self.legacy.list(ctx, opts).await {
            Ok(list) => {
                self.metrics.record_legacy_duration(false, method, start_legacy);
                list
            }
            Err(err) => {
                error!("unable to list from legacy storage: {}", err);
                self.metrics.record_legacy_duration(true, method, start_legacy);
                return Err(err);
            }
        };

        let ResourceList {
            meta: list_meta,
            mut items,
        } = legacy_list;

        // Index each legacy slot so an equivalent unified-storage object
        // can replace it.
        let mut index = HashMap::with_capacity(items.len());
        for (i, obj) in items.iter().enumerate() {
            index.insert(meta::object_name(obj)?.to_string(), i);
        }

        let start_storage = Instant::now();
        let storage_list = match self.storage.list(ctx, opts).await {
            Ok(list) => {
                self.metrics
                    .record_storage_duration(false, method, start_storage);
                list
            }
            Err(err) => {
                error!("unable to list from unified storage: {}", err);
                self.metrics
                    .record_storage_duration(true, method, start_storage);
                return Err(err);
            }
        };

        for obj_storage in storage_list.items {
            let name = meta::object_name(&obj_storage)?.to_string();
            if let Some(&i) = index.get(&name) {
                let equal = compare::objects_match(&obj_storage, &items[i]);
                self.metrics.record_outcome(method, &name, equal);
                if !equal {
                    info!(
                        "object {:?} differs between legacy and unified storage",
                        name
                    );
                }
                items[i] = obj_storage;
            }
        }

        // Legacy list metadata is preserved so continuation tokens keep
        // pointing into the legacy store.
        Ok(ResourceList {
            meta: list_meta,
            items,
        })
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
        let method = "update";

        let start_legacy = Instant::now();
        let (mut obj_legacy, created) = match self
            .legacy
            .update(
                ctx,
                name,
                obj_info,
                create_validate,
                update_validate,
                force_allow_create,
                opts,
            )
            .await
        {
            Ok(res) => {
                self.metrics.record_legacy_duration(false, method, start_legacy);
                res
            }
            Err(err) => {
                error!("could not update {:?} in legacy storage: {}", name, err);
                self.metrics.record_legacy_duration(true, method, start_legacy);
                return Err(err);
            }
        };

        let start_storage = Instant::now();
        let (obj_storage, _storage_created) = match self
            .storage
            .update(
                ctx,
                name,
                obj_info,
                create_validate,
                update_validate,
                force_allow_create,
                opts,
            )
            .await
        {
            Ok(res) => {
                self.metrics
                    .record_storage_duration(false, method, start_storage);
                res
            }
            Err(err) => {
                error!("could not update {:?} in unified storage: {}", name, err);
                self.metrics
                    .record_storage_duration(true, method, start_storage);
                return Err(err);
            }
        };

        let equal = compare::objects_match(&obj_storage, &obj_legacy);
        self.metrics.record_outcome(method, name, equal);
        if !equal {
            info!(
                "object {:?} differs between legacy and unified storage",
                name
            );
        }

        // The round-tripped object must be usable for optimistic writes
        // against unified storage, so it carries storage's resource
        // version.
        if let Err(err) = meta::align_resource_version(&mut obj_legacy, &obj_storage) {
            warn!("could not rewrite resource version on {:?}: {}", name, err);
        }

        Ok((obj_legacy, created))
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        validate: Option<&ObjectValidator>,
        opts: &DeleteOptions,
    ) -> Result<(Option<ResourceObject>, bool)> {
        let method = "delete";

        let start_storage = Instant::now();
        let deleted_storage = match self.storage.delete(ctx, name, validate, opts).await {
            Ok((snapshot, _async)) => {
                self.metrics
                    .record_storage_duration(false, method, start_storage);
                snapshot
            }
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                error!("could not delete {:?} from unified storage: {}", name, err);
                self.metrics
                    .record_storage_duration(true, method, start_storage);
                return Err(err);
            }
        };

        let start_legacy = Instant::now();
        let (deleted_legacy, async_flag) = match self.legacy.delete(ctx, name, validate, opts).await
        {
            Ok(res) => {
                self.metrics.record_legacy_duration(false, method, start_legacy);
                res
            }
            Err(err) if err.is_not_found() => (None, false),
            Err(err) => {
                error!("could not delete {:?} from legacy storage: {}", name, err);
                self.metrics.record_legacy_duration(true, method, start_legacy);
                return Err(err);
            }
        };

        let equal =
            compare::optional_objects_match(deleted_storage.as_ref(), deleted_legacy.as_ref());
        self.metrics.record_outcome(method, name, equal);
        if !equal {
            info!(
                "deleted object {:?} differs between legacy and unified storage",
                name
            );
        }

        Ok((deleted_legacy, async_flag))
    }

    async fn delete_collection(
        &self,
        ctx: &RequestContext,
        validate: Option<&ObjectValidator>,
        opts: &DeleteOptions,
        list_opts: &ListOptions,
    ) -> Result<ResourceList> {
        let method = "delete-collection";

        let start_legacy = Instant::now();
        let deleted_legacy = match self
            .legacy
            .delete_collection(ctx, validate, opts, list_opts)
            .await
        {
            Ok(list) => {
                self.metrics.record_legacy_duration(false, method, start_legacy);
                list
            }
            Err(err) => {
                error!(
                    "failed to delete collection from legacy storage: {}",
                    err
                );
                self.metrics.record_legacy_duration(true, method, start_legacy);
                return Err(err);
            }
        };

        // Only items deleted by the legacy call are the selection
        // authority; each must carry identity.
        for obj in &deleted_legacy.items {
            meta::object_name(obj)?;
        }

        let start_storage = Instant::now();
        let deleted_storage = match self
            .storage
            .delete_collection(ctx, validate, opts, list_opts)
            .await
        {
            Ok(list) => {
                self.metrics
                    .record_storage_duration(false, method, start_storage);
                list
            }
            Err(err) => {
                error!(
                    "failed to delete collection from unified storage: {}",
                    err
                );
                self.metrics
                    .record_storage_duration(true, method, start_storage);
                return Err(err);
            }
        };

        let equal = compare::lists_match(&deleted_storage, &deleted_legacy);
        self.metrics.record_outcome(method, &self.resource, equal);
        if !equal {
            info!("deleted collections differ between legacy and unified storage");
        }

        Ok(deleted_legacy)
    }

    fn destroy(&self) {
        self.storage.destroy();
        self.legacy.destroy();
    }

    fn singular_name(&self) -> &str {
        self.storage.singular_name()
    }

    fn namespace_scoped(&self) -> bool {
        self.storage.namespace_scoped()
    }

    fn new_object(&self) -> ResourceObject {
        self.storage.new_object()
    }

    fn new_list(&self) -> ResourceList {
        self.storage.new_list()
    }

    async fn convert_to_table(&self, ctx: &RequestContext, list: &ResourceList) -> Result<Table> {
        self.storage.convert_to_table(ctx, list).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemoryStore;
    use crate::store::DefaultUpdatedObjectInfo;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Store wrapper that fails selected operations with an injected error
    struct FailingStore {
        inner: Arc<MemoryStore>,
        failing: Mutex<HashSet<&'static str>>,
    }

    impl FailingStore {
        fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                failing: Mutex::new(HashSet::new()),
            }
        }

        fn fail_on(&self, op: &'static str) {
            self.failing.lock().insert(op);
        }

        fn check(&self, op: &str) -> Result<()> {
            if self.failing.lock().contains(op) {
                return Err(Error::unavailable(format!("injected {op} failure")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ResourceStore for FailingStore {
        async fn create(
            &self,
            ctx: &RequestContext,
            obj: ResourceObject,
            validate: Option<&ObjectValidator>,
            opts: &CreateOptions,
        ) -> Result<ResourceObject> {
            self.check("create")?;
            self.inner.create(ctx, obj, validate, opts).await
        }

        async fn get(
            &self,
            ctx: &RequestContext,
            name: &str,
            opts: &GetOptions,
        ) -> Result<ResourceObject> {
            self.check("get")?;
            self.inner.get(ctx, name, opts).await
        }

        async fn list(&self, ctx: &RequestContext, opts: &ListOptions) -> Result<ResourceList> {
            self.check("list")?;
            self.inner.list(ctx, opts).await
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
            self.check("update")?;
            self.inner
                .update(
                    ctx,
                    name,
                    obj_info,
                    create_validate,
                    update_validate,
                    force_allow_create,
                    opts,
                )
                .await
        }

        async fn delete(
            &self,
            ctx: &RequestContext,
            name: &str,
            validate: Option<&ObjectValidator>,
            opts: &DeleteOptions,
        ) -> Result<(Option<ResourceObject>, bool)> {
            self.check("delete")?;
            self.inner.delete(ctx, name, validate, opts).await
        }

        async fn delete_collection(
            &self,
            ctx: &RequestContext,
            validate: Option<&ObjectValidator>,
            opts: &DeleteOptions,
            list_opts: &ListOptions,
        ) -> Result<ResourceList> {
            self.check("delete_collection")?;
            self.inner
                .delete_collection(ctx, validate, opts, list_opts)
                .await
        }

        fn destroy(&self) {
            self.inner.destroy();
        }

        fn singular_name(&self) -> &str {
            self.inner.singular_name()
        }

        fn namespace_scoped(&self) -> bool {
            self.inner.namespace_scoped()
        }

        fn new_object(&self) -> ResourceObject {
            self.inner.new_object()
        }

        fn new_list(&self) -> ResourceList {
            self.inner.new_list()
        }

        async fn convert_to_table(
            &self,
            ctx: &RequestContext,
            list: &ResourceList,
        ) -> Result<Table> {
            self.inner.convert_to_table(ctx, list).await
        }
    }

    fn memstore() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(
            "SavedView",
            "views/v0alpha1",
            "savedviews",
            "savedview",
        ))
    }

    fn view(name: &str) -> ResourceObject {
        ResourceObject::new("SavedView", "views/v0alpha1", name)
            .with_namespace("default")
            .with_spec(serde_json::json!({"title": name}))
    }

    struct Fixture {
        legacy: Arc<MemoryStore>,
        storage: Arc<MemoryStore>,
        legacy_failing: Arc<FailingStore>,
        storage_failing: Arc<FailingStore>,
        writer: DualWriter,
    }

    fn fixture() -> Fixture {
        let legacy = memstore();
        let storage = memstore();
        let legacy_failing = Arc::new(FailingStore::new(legacy.clone()));
        let storage_failing = Arc::new(FailingStore::new(storage.clone()));
        let metrics = Arc::new(DualWriterMetrics::new(DualWriterMode::Mode2, "savedviews"));
        let writer = DualWriter::new(
            legacy_failing.clone(),
            storage_failing.clone(),
            metrics,
            "savedviews",
        );
        Fixture {
            legacy,
            storage,
            legacy_failing,
            storage_failing,
            writer,
        }
    }

    #[tokio::test]
    async fn test_create_mirrors_and_returns_legacy_identity() {
        let f = fixture();
        let ctx = RequestContext::new();

        let returned = f
            .writer
            .create(&ctx, view("a"), None, &CreateOptions::default())
            .await
            .unwrap();

        let in_legacy = f.legacy.peek("a").unwrap();
        let in_storage = f.storage.peek("a").unwrap();
        assert_eq!(returned.meta.uid, in_legacy.meta.uid);
        assert_eq!(returned.meta.resource_version, in_legacy.meta.resource_version);
        assert_ne!(in_legacy.meta.uid, in_storage.meta.uid);

        // Each store assigned its own uid, so the recorded outcome for
        // this create is a divergence even though the content agrees.
        let exported = f.writer.metrics().export_prometheus();
        assert!(exported.contains("method=\"create\",name=\"a\",outcome=\"diverged\"} 1"));
    }

    #[tokio::test]
    async fn test_create_rejects_uid_on_input() {
        let f = fixture();
        let ctx = RequestContext::new();

        let mut obj = view("a");
        obj.meta.uid = "caller-supplied".to_string();
        let err = f
            .writer
            .create(&ctx, obj, None, &CreateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidObject(_)));
        // The legacy write happens before the uid check; unified storage
        // is never touched.
        assert!(f.storage.peek("a").is_none());
    }

    #[tokio::test]
    async fn test_create_storage_error_surfaces_but_legacy_committed() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.storage_failing.fail_on("create");

        let err = f
            .writer
            .create(&ctx, view("a"), None, &CreateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert!(f.legacy.peek("a").is_some());
        assert!(f.storage.peek("a").is_none());
    }

    #[tokio::test]
    async fn test_create_legacy_error_skips_storage() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.legacy_failing.fail_on("create");

        let err = f
            .writer
            .create(&ctx, view("a"), None, &CreateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert!(f.storage.peek("a").is_none());
    }

    #[tokio::test]
    async fn test_get_returns_legacy_object_when_both_present() {
        let f = fixture();
        let ctx = RequestContext::new();
        // Advance the unified store's version counter so the two stores
        // report distinct resource versions for "a".
        f.storage.seed(view("z"));
        let in_legacy = f.legacy.seed(view("a").with_spec(serde_json::json!({"title": "legacy"})));
        let in_storage = f.storage.seed(view("a").with_spec(serde_json::json!({"title": "storage"})));
        assert_ne!(
            in_legacy.meta.resource_version,
            in_storage.meta.resource_version
        );

        // The caller sees the legacy object untouched, even though
        // unified storage served a copy first.
        let returned = f
            .writer
            .get(&ctx, "a", &GetOptions::default())
            .await
            .unwrap();
        assert_eq!(returned.spec, serde_json::json!({"title": "legacy"}));
        assert_eq!(returned.meta.uid, in_legacy.meta.uid);
        assert_eq!(
            returned.meta.resource_version,
            in_legacy.meta.resource_version
        );
    }

    #[tokio::test]
    async fn test_get_falls_back_to_legacy() {
        let f = fixture();
        let ctx = RequestContext::new();
        let in_legacy = f.legacy.seed(view("a"));

        let returned = f
            .writer
            .get(&ctx, "a", &GetOptions::default())
            .await
            .unwrap();
        assert_eq!(returned.meta.uid, in_legacy.meta.uid);
    }

    #[tokio::test]
    async fn test_get_present_only_in_storage_is_not_found() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.storage.seed(view("a"));

        let err = f
            .writer
            .get(&ctx, "a", &GetOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_storage_backend_error_aborts() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.legacy.seed(view("a"));
        f.storage_failing.fail_on("get");

        let err = f
            .writer
            .get(&ctx, "a", &GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_list_overlays_storage_items_and_keeps_legacy_meta() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.legacy.seed(view("a").with_spec(serde_json::json!({"title": "a-legacy"})));
        f.legacy.seed(view("b"));
        f.storage.seed(view("a").with_spec(serde_json::json!({"title": "a-storage"})));
        f.storage.seed(view("c"));

        let legacy_meta = f
            .legacy
            .list(&ctx, &ListOptions::default())
            .await
            .unwrap()
            .meta;

        let list = f
            .writer
            .list(&ctx, &ListOptions::default())
            .await
            .unwrap();

        // Names come from legacy; "c" exists only in unified storage and
        // is not reported.
        assert_eq!(list.names(), vec!["a", "b"]);
        // "a" was overlaid with the storage item, keeping its storage rv.
        let a = &list.items[0];
        assert_eq!(a.spec, serde_json::json!({"title": "a-storage"}));
        assert_eq!(a.meta.resource_version, f.storage.peek("a").unwrap().meta.resource_version);
        // List metadata is legacy's.
        assert_eq!(list.meta, legacy_meta);
        // The overlap on "a" is recorded as a per-item divergence.
        let exported = f.writer.metrics().export_prometheus();
        assert!(exported.contains("method=\"list\",name=\"a\",outcome=\"diverged\"} 1"));
    }

    #[tokio::test]
    async fn test_update_returns_legacy_object_with_storage_rv() {
        let f = fixture();
        let ctx = RequestContext::new();
        // Advance the unified store's version counter so its resource
        // versions differ from legacy's throughout.
        f.storage.seed(view("z"));
        f.writer
            .create(&ctx, view("a"), None, &CreateOptions::default())
            .await
            .unwrap();

        let mut next = view("a");
        next.spec = serde_json::json!({"title": "updated"});
        let info = DefaultUpdatedObjectInfo::new(next);
        let (returned, created) = f
            .writer
            .update(&ctx, "a", &info, None, None, false, &UpdateOptions::default())
            .await
            .unwrap();

        assert!(!created);
        let in_legacy = f.legacy.peek("a").unwrap();
        let in_storage = f.storage.peek("a").unwrap();
        assert_eq!(returned.meta.uid, in_legacy.meta.uid);
        assert_eq!(
            returned.meta.resource_version,
            in_storage.meta.resource_version
        );
        assert_eq!(in_storage.spec, serde_json::json!({"title": "updated"}));
    }

    #[tokio::test]
    async fn test_update_legacy_error_skips_storage() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.writer
            .create(&ctx, view("a"), None, &CreateOptions::default())
            .await
            .unwrap();
        f.legacy_failing.fail_on("update");

        let storage_before = f.storage.peek("a").unwrap();
        let info = DefaultUpdatedObjectInfo::new(view("a"));
        let err = f
            .writer
            .update(&ctx, "a", &info, None, None, false, &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(
            f.storage.peek("a").unwrap().meta.resource_version,
            storage_before.meta.resource_version
        );
    }

    #[tokio::test]
    async fn test_delete_storage_only_residual_succeeds_with_no_snapshot() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.storage.seed(view("a"));

        let (snapshot, async_flag) = f
            .writer
            .delete(&ctx, "a", None, &DeleteOptions::default())
            .await
            .unwrap();
        assert!(snapshot.is_none());
        assert!(!async_flag);
        assert!(f.storage.peek("a").is_none());
    }

    #[tokio::test]
    async fn test_delete_tolerates_storage_not_found() {
        let f = fixture();
        let ctx = RequestContext::new();
        let in_legacy = f.legacy.seed(view("a"));

        let (snapshot, _) = f
            .writer
            .delete(&ctx, "a", None, &DeleteOptions::default())
            .await
            .unwrap();
        assert_eq!(snapshot.unwrap().meta.uid, in_legacy.meta.uid);
        assert!(f.legacy.peek("a").is_none());
    }

    #[tokio::test]
    async fn test_delete_storage_backend_error_aborts() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.legacy.seed(view("a"));
        f.storage.seed(view("a"));
        f.storage_failing.fail_on("delete");

        let err = f
            .writer
            .delete(&ctx, "a", None, &DeleteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        // Legacy is not touched when storage fails hard.
        assert!(f.legacy.peek("a").is_some());
    }

    #[tokio::test]
    async fn test_delete_collection_mirrors_both() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.legacy.seed(view("a").with_label("team", "platform"));
        f.legacy.seed(view("b"));
        f.storage.seed(view("a").with_label("team", "platform"));
        f.storage.seed(view("b"));

        let list_opts = ListOptions {
            label_selector: Some("team=platform".to_string()),
            ..ListOptions::default()
        };
        let deleted = f
            .writer
            .delete_collection(&ctx, None, &DeleteOptions::default(), &list_opts)
            .await
            .unwrap();

        assert_eq!(deleted.names(), vec!["a"]);
        assert!(f.legacy.peek("a").is_none());
        assert!(f.storage.peek("a").is_none());
        assert!(f.legacy.peek("b").is_some());
        assert!(f.storage.peek("b").is_some());
    }

    #[tokio::test]
    async fn test_introspection_delegates_to_storage() {
        let f = fixture();
        assert_eq!(f.writer.singular_name(), "savedview");
        assert!(f.writer.namespace_scoped());
        assert_eq!(f.writer.mode(), DualWriterMode::Mode2);
        assert_eq!(f.writer.new_object().type_meta.kind, "SavedView");
        assert!(f.writer.new_list().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_destroys_both_stores() {
        let f = fixture();
        f.legacy.seed(view("a"));
        f.storage.seed(view("b"));

        f.writer.destroy();
        assert!(f.legacy.is_empty());
        assert!(f.storage.is_empty());
    }

    #[tokio::test]
    async fn test_divergence_is_counted_not_fatal() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.legacy.seed(view("a").with_spec(serde_json::json!({"title": "legacy"})));
        f.storage.seed(view("a").with_spec(serde_json::json!({"title": "storage"})));

        f.writer.get(&ctx, "a", &GetOptions::default()).await.unwrap();

        let exported = f.writer.metrics().export_prometheus();
        assert!(exported.contains("method=\"get\",name=\"a\",outcome=\"diverged\"} 1"));
    }
}
