use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// A generated base execution shape for variable-arity closures. Every
/// variadic closure with the same required arity derives from the same
/// template instance, so arity-based fast paths can rely on identity.
#[derive(Debug, PartialEq, Eq)]
pub struct RestFnTemplate {
    required_arity: usize,
    name: SmolStr,
}

impl RestFnTemplate {
    // Pure function of the arity; competing threads may generate the
    // same template redundantly and all but one copy is discarded.
    fn generate(required_arity: usize) -> Arc<Self> {
        Arc::new(RestFnTemplate {
            required_arity,
            name: SmolStr::new(format!("RestFnImpl__{}", required_arity)),
        })
    }

    pub fn required_arity(&self) -> usize {
        self.required_arity
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

type TemplateMap = FxHashMap<usize, Arc<RestFnTemplate>>;

/// A grow-only mapping from required arity to dispatch template, shared
/// by every compilation in the process. Readers never block; writers race
/// through compare-and-swap on an immutable snapshot and the first
/// installed entry for an arity wins permanently.
pub struct TemplateCache {
    head: AtomicPtr<TemplateMap>,
}

impl TemplateCache {
    pub const fn new() -> Self {
        TemplateCache {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// A pure read of the current cache state.
    pub fn lookup(&self, required_arity: usize) -> Option<Arc<RestFnTemplate>> {
        let snapshot = self.head.load(Ordering::Acquire);
        if snapshot.is_null() {
            return None;
        }
        // Published snapshots are never deallocated while the cache is
        // live, so the map behind this pointer cannot dangle.
        unsafe { (*snapshot).get(&required_arity).cloned() }
    }

    /// Returns the canonical template for `required_arity`, installing a
    /// freshly generated one if no compilation has needed this arity yet.
    pub fn get_or_create(&self, required_arity: usize) -> Arc<RestFnTemplate> {
        loop {
            let snapshot = self.head.load(Ordering::Acquire);
            let installed =
                !snapshot.is_null() && unsafe { (*snapshot).contains_key(&required_arity) };
            if installed {
                break;
            }

            let mut next = if snapshot.is_null() {
                TemplateMap::default()
            } else {
                unsafe { (*snapshot).clone() }
            };
            next.insert(required_arity, RestFnTemplate::generate(required_arity));
            let candidate = Box::into_raw(Box::new(next));

            match self
                .head
                .compare_exchange(snapshot, candidate, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    // The replaced snapshot stays live: concurrent readers
                    // may still hold it. Snapshots are superseded at most
                    // once per newly seen arity, so the retained set stays
                    // small for the life of the process.
                    tracing::debug!("installed rest-dispatch template for arity {required_arity}");
                    break;
                }
                Err(_) => {
                    // Never published; safe to reclaim and retry.
                    unsafe {
                        drop(Box::from_raw(candidate));
                    }
                }
            }
        }

        // Re-read even after a successful install: a racing thread may
        // have won for this same arity, and its template is the one every
        // caller must agree on.
        self.lookup(required_arity)
            .expect("template installed by the loop above")
    }

    /// The number of arities with an installed template.
    pub fn len(&self) -> usize {
        let snapshot = self.head.load(Ordering::Acquire);
        if snapshot.is_null() {
            return 0;
        }
        unsafe { (*snapshot).len() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TemplateCache {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        if !head.is_null() {
            unsafe {
                drop(Box::from_raw(head));
            }
        }
    }
}

static REST_FN_TEMPLATES: TemplateCache = TemplateCache::new();

/// The process-wide cache consulted by every variadic closure emission.
pub fn rest_fn_templates() -> &'static TemplateCache {
    &REST_FN_TEMPLATES
}
