//! Per-receiver memoization for pure methods.
//!
//! [`MethodCache`] owns the wrapped function and a result cache shared by
//! every receiver of the method, which is why the receiver's identity is part
//! of the cache key. Binding the cache to one receiver with
//! [`MethodCache::bind`] yields a [`Bound`] value implementing [`Callable`],
//! the explicit interface callers use instead of introspecting the wrapped
//! function.
//!
//! Results are cached for the lifetime of the `MethodCache` and never
//! evicted; [`MethodCache::invalidate`] clears the cache explicitly and
//! [`MethodCache::set_enabled`] bypasses it without clearing. Correctness
//! relies on the wrapped function being a pure function of its receiver and
//! arguments: a side-effecting method observes its side effects only on the
//! first call per key.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};


/// Identity of the receiver a memoized call is keyed under.
///
/// Taken from the reference address, so two receivers alive at the same time
/// never collide. An address can be reused after a receiver is dropped;
/// callers holding a cache across receiver lifetimes should `invalidate` it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(usize);

impl InstanceId {
    pub fn of<T>(instance: &T) -> Self {
        Self(instance as *const T as usize)
    }
}

/// A callable with inspectable metadata.
///
/// Bound memoized methods implement this so call sites that previously
/// reached through to the wrapped function read the same name here.
pub trait Callable<A, R> {
    fn invoke(&self, args: A) -> R;

    /// Declared name of the underlying method.
    fn name(&self) -> &str;
}

/// Memoizing wrapper around a method `F: Fn(&I, &A) -> R`.
///
/// One `MethodCache` serves every receiver of type `I`; entries are keyed by
/// `(receiver identity, arguments)`. Arguments double as cache keys, hence
/// the `Hash + Eq + Clone` bound.
pub struct MethodCache<I, A, R, F> {
    func: F,
    name: &'static str,
    enabled: AtomicBool,
    entries: Mutex<HashMap<(InstanceId, A), R>>,
    _receiver: PhantomData<fn(&I)>,
}

impl<I, A, R, F> MethodCache<I, A, R, F>
where
    A: Hash + Eq + Clone,
    R: Clone,
    F: Fn(&I, &A) -> R,
{
    pub fn new(name: &'static str, func: F) -> Self {
        Self {
            func,
            name,
            enabled: AtomicBool::new(true),
            entries: Mutex::new(HashMap::new()),
            _receiver: PhantomData,
        }
    }

    /// Invoke the method through the cache.
    ///
    /// A miss runs the function and stores the result; a hit returns the
    /// stored result without re-invoking. The function runs outside the cache
    /// lock, so two threads missing on the same key both compute and the
    /// first insert wins. The wrapped function is required to be pure, which
    /// makes the lost update benign.
    pub fn call(&self, instance: &I, args: A) -> R {
        if !self.enabled.load(Ordering::Relaxed) {
            return (self.func)(instance, &args);
        }

        let key = (InstanceId::of(instance), args);
        if let Some(hit) = self.lock_entries().get(&key) {
            return hit.clone();
        }

        log::trace!("memo miss for {}", self.name);
        let value = (self.func)(instance, &key.1);
        self.lock_entries().entry(key).or_insert(value).clone()
    }

    /// Bind the method to one receiver.
    pub fn bind<'a>(&'a self, instance: &'a I) -> Bound<'a, I, A, R, F> {
        Bound {
            method: self,
            instance,
        }
    }

    /// The raw wrapped function; calling through it never touches the cache.
    pub fn func(&self) -> &F {
        &self.func
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// When disabled, every call re-invokes the function; cached entries are
    /// kept and served again once re-enabled.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        self.lock_entries().clear();
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<(InstanceId, A), R>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<I, A, R, F> fmt::Debug for MethodCache<I, A, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCache")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A memoized method bound to one receiver.
pub struct Bound<'a, I, A, R, F> {
    method: &'a MethodCache<I, A, R, F>,
    instance: &'a I,
}

impl<I, A, R, F> Bound<'_, I, A, R, F>
where
    A: Hash + Eq + Clone,
    R: Clone,
    F: Fn(&I, &A) -> R,
{
    pub fn call(&self, args: A) -> R {
        self.method.call(self.instance, args)
    }
}

impl<I, A, R, F> Callable<A, R> for Bound<'_, I, A, R, F>
where
    A: Hash + Eq + Clone,
    R: Clone,
    F: Fn(&I, &A) -> R,
{
    fn invoke(&self, args: A) -> R {
        self.call(args)
    }

    fn name(&self) -> &str {
        self.method.name()
    }
}
