//! # Base-Type Search
//!
//! "Search this type, then each ancestor nearest-first", shared by field and
//! description lookup. Base types are only discovered when the type itself
//! has no match.

use crate::observability::{log_event_with_fields, Event};
use crate::types::{BaseTypeCache, IntrospectionResult, TypeRef};

pub(crate) async fn search_including_base_types<T>(
    cache: &BaseTypeCache,
    ty: &TypeRef,
    lookup: impl Fn(&TypeRef) -> Option<T>,
) -> IntrospectionResult<Option<T>> {
    if let Some(hit) = lookup(ty) {
        return Ok(Some(hit));
    }

    let bases = match cache.base_types(ty).await {
        Ok(bases) => bases,
        Err(err) => {
            let type_name = ty.to_string();
            let reason = err.to_string();
            log_event_with_fields(
                Event::BaseTypesFailed,
                &[("type", type_name.as_str()), ("error", reason.as_str())],
            );
            return Err(err);
        }
    };
    Ok(bases.iter().find_map(|base| lookup(base)))
}
