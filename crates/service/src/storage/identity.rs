//! Record identifier allocation.

use tracing::warn;
use uuid::Uuid;

use crate::errors::ServiceError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// Source of opaque, random record identifiers.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random UUID v4 identifiers in their hyphenated text form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Draw identifiers from `source` until one is not taken.
///
/// Gives up with [`ServiceError::IdExhausted`] after `max_attempts` draws.
pub fn allocate_id<F>(source: &dyn IdSource, is_taken: F, max_attempts: u32) -> Result<String, ServiceError>
where
    F: Fn(&str) -> bool,
{
    for attempt in 1..=max_attempts {
        let id = source.next_id();
        if !is_taken(&id) {
            return Ok(id);
        }
        warn!(attempt, id = %id, "generated id already taken; retrying");
    }
    Err(ServiceError::IdExhausted(max_attempts))
}

/// Deterministic sources for tests and doc examples.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Replays a fixed list of ids, cycling back to the start when exhausted.
    pub struct ScriptedIds {
        ids: Vec<String>,
        cursor: Mutex<usize>,
    }

    impl ScriptedIds {
        pub fn new<I, S>(ids: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
            assert!(!ids.is_empty(), "ScriptedIds needs at least one id");
            Self { ids, cursor: Mutex::new(0) }
        }
    }

    impl IdSource for ScriptedIds {
        fn next_id(&self) -> String {
            let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
            let id = self.ids[*cursor % self.ids.len()].clone();
            *cursor += 1;
            id
        }
    }
}
