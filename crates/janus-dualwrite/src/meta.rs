//! Meta accessor helpers
//!
//! Uniform read/write of identity and bookkeeping fields. Objects that
//! carry no identity (empty name) fail with an accessor error rather
//! than flowing through the mirroring protocol half-formed.

use janus_common::{Error, ObjectMeta, ResourceObject, Result};

/// Borrow the object's metadata, failing if it carries no identity
pub fn accessor(obj: &ResourceObject) -> Result<&ObjectMeta> {
    if obj.meta.name.is_empty() {
        return Err(Error::accessor("object has no name"));
    }
    Ok(&obj.meta)
}

/// Mutably borrow the object's metadata, failing if it carries no identity
pub fn accessor_mut(obj: &mut ResourceObject) -> Result<&mut ObjectMeta> {
    if obj.meta.name.is_empty() {
        return Err(Error::accessor("object has no name"));
    }
    Ok(&mut obj.meta)
}

/// The object's name, failing if it carries no identity
pub fn object_name(obj: &ResourceObject) -> Result<&str> {
    Ok(&accessor(obj)?.name)
}

/// Rewrite `dst`'s resource version to `src`'s, leaving everything else
/// untouched. Both objects must carry identity.
pub fn align_resource_version(dst: &mut ResourceObject, src: &ResourceObject) -> Result<()> {
    let rv = accessor(src)?.resource_version.clone();
    accessor_mut(dst)?.resource_version = rv;
    Ok(())
}

/// Copy `src`'s store bookkeeping (resource version and uid) onto `dst`
/// so a subsequent write against `src`'s store passes its optimistic
/// concurrency check.
pub fn copy_store_bookkeeping(dst: &mut ResourceObject, src: &ResourceObject) -> Result<()> {
    let src_meta = accessor(src)?;
    let rv = src_meta.resource_version.clone();
    let uid = src_meta.uid.clone();
    let dst_meta = accessor_mut(dst)?;
    dst_meta.resource_version = rv;
    dst_meta.uid = uid;
    Ok(())
}

/// Clear store bookkeeping so the receiving store allocates fresh values
pub fn clear_store_bookkeeping(obj: &mut ResourceObject) -> Result<()> {
    let meta = accessor_mut(obj)?;
    meta.resource_version.clear();
    meta.uid.clear();
    Ok(())
}
