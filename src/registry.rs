//! Identity and registry layer.
//!
//! Every tracked object carries a [`Membership`]: its [`Id`] plus a weak
//! back-reference to the [`IndexBase`] that currently tracks it. An index maps
//! ids to weak references of its members, so neither side owns the other and
//! relocation only rewrites table entries and back-references.
//!
//! An object is *managed* iff its back-reference is live and that index maps
//! the object's id back to it ([`IndexBase::check`]). All structural changes
//! keep the two directions in agreement while holding the table writer lock;
//! operations spanning two indices take both writers via
//! [`write_pair`](crate::commons::write_pair).
//!
//! The registry is generic over [`Member`], so any identity-bearing element
//! can use the same add/remove/move/swap/merge vocabulary. Graph vertices hook
//! [`Member::detach`] to sever their edges before they leave an index.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::commons::{write_pair, SharedLock, WriteScope};
use crate::error::RegistryError;
use crate::invariant_ppt::{
    assert_invariant, BACKREF_REPOINTED, FALLBACK_RELOCATION, ID_COLLISION_RESOLVED,
    MERGE_EMPTIES_SOURCE, MOVE_CONSERVES_MEMBERS, REGISTRY_BIJECTION, RELEASED_ON_DROP,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Unique identifier of a tracked object.
///
/// Fresh ids come from a process-wide monotonic counter and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(pub u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl Id {
    /// Draw the next id from the process-wide generator.
    pub fn next() -> Self {
        Id(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Table<E> = HashMap<Id, Weak<E>>;

/// The id/index pairing embedded in every tracked object.
pub struct Membership<E> {
    id: AtomicU64,
    index: Mutex<Weak<IndexBase<E>>>,
}

impl<E> Membership<E> {
    /// An unbound membership with the given id.
    pub fn new(id: Id) -> Self {
        Self {
            id: AtomicU64::new(id.0),
            index: Mutex::new(Weak::new()),
        }
    }

    /// An unbound membership with a fresh id.
    pub fn fresh() -> Self {
        Self::new(Id::next())
    }

    /// Current id. Changes only when an index has to re-key the object.
    #[inline]
    pub fn id(&self) -> Id {
        Id(self.id.load(Ordering::Acquire))
    }

    /// The index currently tracking this object, if it is still alive.
    pub fn index(&self) -> Option<Arc<IndexBase<E>>> {
        self.index.lock().upgrade()
    }

    /// True if the back-reference points at a live index.
    pub fn is_bound(&self) -> bool {
        self.index.lock().strong_count() > 0
    }

    /// True if the back-reference points at `base`.
    pub fn is_bound_to(&self, base: &IndexBase<E>) -> bool {
        std::ptr::eq(self.index.lock().as_ptr(), base)
    }

    fn bind(&self, id: Id, base: &Arc<IndexBase<E>>) {
        self.id.store(id.0, Ordering::Release);
        *self.index.lock() = Arc::downgrade(base);
    }

    fn unbind(&self) {
        *self.index.lock() = Weak::new();
    }
}

impl<E> Default for Membership<E> {
    fn default() -> Self {
        Self::fresh()
    }
}

impl<E> fmt::Debug for Membership<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Membership")
            .field("id", &self.id())
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// An identity-bearing element that an [`Index`] can track.
///
/// Indices hold members weakly; the application owns them through an
/// `Arc`. A member's `Drop` must not call back into the index that tracks it:
/// release it through [`release`] from an owning handle instead.
pub trait Member: Send + Sync + Sized + 'static {
    /// The embedded id/index pairing.
    fn membership(&self) -> &Membership<Self>;

    /// Hook run before the member leaves an index through removal, a single
    /// move, or a re-key. Never called while a table lock is held.
    fn detach(&self) {}

    /// Shorthand for `self.membership().id()`.
    fn member_id(&self) -> Id {
        self.membership().id()
    }
}

/// Settings for a new index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Name used in logs and errors.
    pub label: String,
    /// Upper bound on members admitted through `add` and `move_to`.
    /// Swap and merge move whole tables and do not check it.
    pub capacity: Option<usize>,
}

impl IndexConfig {
    /// Unbounded index with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            capacity: None,
        }
    }

    /// Bound the number of members.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new("index")
    }
}

/// Shared state of an index: the id → member table.
///
/// Members point back here weakly. Obtain one through [`Index`], which owns it
/// and enforces the drop-time relocation policy.
pub struct IndexBase<E> {
    label: String,
    capacity: Option<usize>,
    table: SharedLock<Table<E>>,
}

impl<E: Member> IndexBase<E> {
    fn new(config: IndexConfig) -> Self {
        Self {
            label: config.label,
            capacity: config.capacity,
            table: SharedLock::new(HashMap::new()),
        }
    }

    /// Name of this index.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Configured capacity, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of table entries.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// True if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// True if `id` maps to a live member.
    pub fn contains(&self, id: Id) -> bool {
        self.table
            .read()
            .get(&id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// The live member tracked under `id`.
    pub fn find(&self, id: Id) -> Option<Arc<E>> {
        self.table.read().get(&id).and_then(Weak::upgrade)
    }

    /// Tracked ids in ascending order.
    pub fn ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.table.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Live members in ascending id order.
    pub fn members(&self) -> Vec<Arc<E>> {
        let table = self.table.read();
        let mut members: Vec<(Id, Arc<E>)> = table
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|m| (*id, m)))
            .collect();
        drop(table);
        members.sort_unstable_by_key(|(id, _)| *id);
        members.into_iter().map(|(_, m)| m).collect()
    }

    /// Both directions of the pairing agree: this table maps `id` to
    /// `member`, and `member` reports `id` and points back here.
    pub fn check(&self, id: Id, member: &E) -> bool {
        let mapped = Self::maps(&self.table.read(), id, member);
        mapped && member.member_id() == id && member.membership().is_bound_to(self)
    }

    /// Drop table entries whose member no longer exists. Returns how many.
    pub fn purge(&self) -> usize {
        let mut table = self.table.write();
        let before = table.len();
        table.retain(|_, weak| weak.strong_count() > 0);
        before - table.len()
    }

    fn maps(table: &Table<E>, id: Id, member: &E) -> bool {
        table
            .get(&id)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), member))
    }

    fn room(&self, table: &Table<E>) -> Result<(), RegistryError> {
        match self.capacity {
            Some(capacity) if table.len() >= capacity => Err(RegistryError::Full {
                label: self.label.clone(),
                capacity,
            }),
            _ => Ok(()),
        }
    }

    /// Insert `member` into a locked table, re-keying it on collision, and
    /// point its back-reference here.
    fn place(self: &Arc<Self>, table: &mut Table<E>, member: &Arc<E>) -> Id {
        let mut id = member.member_id();
        let mut rekeyed = false;
        while table.contains_key(&id) {
            let fresh = Id::next();
            tracing::trace!("index_rekey: {id} taken in `{}`, using {fresh}", self.label);
            id = fresh;
            rekeyed = true;
        }
        table.insert(id, Arc::downgrade(member));
        member.membership().bind(id, self);
        if rekeyed {
            assert_invariant(
                ID_COLLISION_RESOLVED,
                member.member_id() == id,
                "re-keyed member reports its new id",
                Some("place"),
            );
        }
        assert_invariant(
            REGISTRY_BIJECTION,
            Self::maps(table, id, member) && member.membership().is_bound_to(self),
            "table entry and back-reference agree",
            Some("place"),
        );
        id
    }

    /// Join semantics: trivially true for a current member, otherwise
    /// register here and then deregister from the previous index.
    ///
    /// Retries when a concurrent move, swap or merge relocates the member
    /// between reading its back-reference and locking the tables.
    pub(crate) fn admit(self: &Arc<Self>, member: &Arc<E>) -> Result<Id, RegistryError> {
        loop {
            match member.membership().index() {
                Some(current) if Arc::ptr_eq(&current, self) => {
                    let mut table = self.table.write();
                    let id = member.member_id();
                    if Self::maps(&table, id, member) {
                        return Ok(id);
                    }
                    if !member.membership().is_bound_to(self) {
                        continue;
                    }
                    self.room(&table)?;
                    return Ok(self.place(&mut table, member));
                }
                Some(previous) => {
                    self.room(&self.table.read())?;
                    member.detach();
                    match self.transfer(&previous, member) {
                        Err(RegistryError::NotFound(_)) => continue,
                        outcome => return outcome,
                    }
                }
                None => {
                    let mut table = self.table.write();
                    if member.membership().is_bound() {
                        continue;
                    }
                    self.room(&table)?;
                    let id = self.place(&mut table, member);
                    tracing::debug!("index_add: {id} joined `{}`", self.label);
                    return Ok(id);
                }
            }
        }
    }

    /// Move `member` from `source` into this index under both writer locks.
    ///
    /// `NotFound` means the member is no longer in `source`.
    fn transfer(self: &Arc<Self>, source: &Arc<Self>, member: &Arc<E>) -> Result<Id, RegistryError> {
        let Some((mut from, mut to)) = write_pair(&source.table, &self.table) else {
            return Ok(member.member_id());
        };
        let old_id = member.member_id();
        if Self::maps(&to, old_id, member) {
            return Ok(old_id);
        }
        let tracked = Self::maps(&from, old_id, member);
        if !tracked && !member.membership().is_bound_to(source) {
            return Err(RegistryError::NotFound(old_id));
        }
        self.room(&to)?;
        let before = from.len() + to.len();
        if tracked {
            from.remove(&old_id);
        }
        let id = self.place(&mut to, member);
        assert_invariant(
            MOVE_CONSERVES_MEMBERS,
            from.len() + to.len() == before + usize::from(!tracked),
            "member count conserved across a move",
            Some("transfer"),
        );
        tracing::debug!(
            "index_move: {old_id} `{}` -> {id} `{}`",
            source.label,
            self.label
        );
        Ok(id)
    }

    fn evict(&self, id: Id, member: &E) -> bool {
        let mut table = self.table.write();
        if !Self::maps(&table, id, member) {
            return false;
        }
        table.remove(&id);
        member.membership().unbind();
        tracing::debug!("index_remove: {id} left `{}`", self.label);
        true
    }

    fn swap(self: &Arc<Self>, other: &Arc<Self>) {
        let Some((mut mine, mut theirs)) = write_pair(&self.table, &other.table) else {
            return;
        };
        std::mem::swap(&mut *mine, &mut *theirs);
        self.repoint(&mine);
        other.repoint(&theirs);
        tracing::debug!(
            "index_swap: `{}` ({} members) <-> `{}` ({} members)",
            self.label,
            mine.len(),
            other.label,
            theirs.len()
        );
    }

    fn repoint(self: &Arc<Self>, table: &WriteScope<'_, Table<E>>) {
        for (id, weak) in table.iter() {
            if let Some(member) = weak.upgrade() {
                member.membership().bind(*id, self);
            }
        }
        assert_invariant(
            BACKREF_REPOINTED,
            table.values().all(|weak| {
                weak.upgrade()
                    .map_or(true, |m| m.membership().is_bound_to(self))
            }),
            "every member points at its new index",
            Some("repoint"),
        );
    }

    fn merge_into(self: &Arc<Self>, dest: &Arc<Self>) {
        if Arc::ptr_eq(self, dest) {
            return;
        }
        // Members whose id is taken on the other side will be re-keyed, which
        // invalidates edges addressed to the old id.
        for member in self.members() {
            if dest.contains(member.member_id()) {
                member.detach();
            }
        }
        let Some((mut from, mut to)) = write_pair(&self.table, &dest.table) else {
            return;
        };
        let moved = from.len();
        for (_, weak) in from.drain() {
            if let Some(member) = weak.upgrade() {
                dest.place(&mut to, &member);
            }
        }
        assert_invariant(
            MERGE_EMPTIES_SOURCE,
            from.is_empty(),
            "source index is empty after a merge",
            Some("merge_into"),
        );
        tracing::debug!(
            "index_merge: {moved} members `{}` -> `{}`",
            self.label,
            dest.label
        );
    }

    fn orphan_all(&self) {
        for member in self.members() {
            member.detach();
        }
        let mut table = self.table.write();
        for (_, weak) in table.drain() {
            if let Some(member) = weak.upgrade() {
                member.membership().unbind();
            }
        }
    }
}

impl<E> fmt::Debug for IndexBase<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexBase")
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field("len", &self.table.read().len())
            .finish()
    }
}

/// Remove `member` from whichever index tracks it.
///
/// Follows the back-reference if a concurrent move or merge relocated the
/// member between reading it and locking the table. Returns false when the
/// member was not managed.
pub fn release<E: Member>(member: &E) -> bool {
    loop {
        let Some(base) = member.membership().index() else {
            return false;
        };
        if base.evict(member.member_id(), member) {
            assert_invariant(
                RELEASED_ON_DROP,
                !member.membership().is_bound(),
                "released member has no back-reference",
                Some("release"),
            );
            return true;
        }
        match member.membership().index() {
            Some(now) if !Arc::ptr_eq(&now, &base) => continue,
            _ => {
                member.membership().unbind();
                return false;
            }
        }
    }
}

/// Owning handle of a registry.
///
/// Dropping an `Index` relocates its remaining members into the fallback
/// index when one is configured and still alive; otherwise the members are
/// detached and left unmanaged.
pub struct Index<E: Member> {
    base: Arc<IndexBase<E>>,
    fallback: Option<Weak<IndexBase<E>>>,
}

impl<E: Member> Index<E> {
    /// An unbounded index with the default label.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// An index built from `config`.
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            base: Arc::new(IndexBase::new(config)),
            fallback: None,
        }
    }

    /// Relocate leftover members into `fallback` when this index is dropped.
    pub fn with_fallback(mut self, fallback: &Index<E>) -> Self {
        self.set_fallback(Some(fallback));
        self
    }

    /// Change or clear the drop-time fallback.
    pub fn set_fallback(&mut self, fallback: Option<&Index<E>>) {
        self.fallback = fallback
            .filter(|f| !Arc::ptr_eq(&f.base, &self.base))
            .map(|f| Arc::downgrade(&f.base));
    }

    /// Shared state, as seen by members.
    pub fn base(&self) -> &Arc<IndexBase<E>> {
        &self.base
    }

    /// True if both handles refer to the same index.
    pub fn same_as(&self, other: &Index<E>) -> bool {
        Arc::ptr_eq(&self.base, &other.base)
    }

    /// True if `member` is tracked here.
    pub fn tracks(&self, member: &E) -> bool {
        self.base.check(member.member_id(), member)
    }

    /// Name of this index.
    pub fn label(&self) -> &str {
        self.base.label()
    }

    /// Number of members.
    pub fn size(&self) -> usize {
        self.base.len()
    }

    /// Same as [`Index::size`].
    pub fn len(&self) -> usize {
        self.base.len()
    }

    /// True if no members are tracked.
    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// See [`IndexBase::contains`].
    pub fn contains(&self, id: Id) -> bool {
        self.base.contains(id)
    }

    /// See [`IndexBase::find`].
    pub fn find(&self, id: Id) -> Option<Arc<E>> {
        self.base.find(id)
    }

    /// See [`IndexBase::ids`].
    pub fn ids(&self) -> Vec<Id> {
        self.base.ids()
    }

    /// See [`IndexBase::members`].
    pub fn members(&self) -> Vec<Arc<E>> {
        self.base.members()
    }

    /// See [`IndexBase::check`].
    pub fn check(&self, id: Id, member: &E) -> bool {
        self.base.check(id, member)
    }

    /// See [`IndexBase::purge`].
    pub fn purge(&self) -> usize {
        self.base.purge()
    }

    /// Start tracking `member`. Returns its id, which differs from the
    /// requested one when that id was already taken here.
    ///
    /// A member of another index is detached and leaves that index. On error
    /// the member stays where it was, under its old id.
    pub fn try_add(&self, member: &Arc<E>) -> Result<Id, RegistryError> {
        self.base.admit(member)
    }

    /// Boolean form of [`Index::try_add`].
    pub fn add(&self, member: &Arc<E>) -> bool {
        self.try_add(member).is_ok()
    }

    /// Stop tracking `id`, running the member's detach hook first. The
    /// member is handed back, now unmanaged.
    pub fn try_remove(&self, id: Id) -> Result<Arc<E>, RegistryError> {
        let member = self.base.find(id).ok_or(RegistryError::NotFound(id))?;
        member.detach();
        if self.base.evict(id, &member) {
            Ok(member)
        } else {
            Err(RegistryError::NotFound(id))
        }
    }

    /// Boolean form of [`Index::try_remove`].
    pub fn remove(&self, id: Id) -> bool {
        self.try_remove(id).is_ok()
    }

    /// Relocate one member into `dest`, running its detach hook first.
    /// Returns the member's id in `dest`.
    pub fn try_move_to(&self, dest: &Index<E>, id: Id) -> Result<Id, RegistryError> {
        if self.same_as(dest) {
            return if self.contains(id) {
                Ok(id)
            } else {
                Err(RegistryError::NotFound(id))
            };
        }
        let member = self.base.find(id).ok_or(RegistryError::NotFound(id))?;
        dest.base.room(&dest.base.table.read())?;
        member.detach();
        dest.base.transfer(&self.base, &member)
    }

    /// Boolean form of [`Index::try_move_to`].
    pub fn move_to(&self, dest: &Index<E>, id: Id) -> bool {
        self.try_move_to(dest, id).is_ok()
    }

    /// Exchange the full membership of two indices. Members keep their ids
    /// and edges; only back-references change.
    pub fn swap_with(&self, other: &Index<E>) {
        self.base.swap(&other.base);
    }

    /// Move every member into `other`, leaving this index empty. Members keep
    /// their edges unless their id collides in `other` and has to change.
    pub fn merge_into(&self, other: &Index<E>) {
        self.base.merge_into(&other.base);
    }
}

impl<E: Member> Default for Index<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Member> Drop for Index<E> {
    fn drop(&mut self) {
        if self.base.is_empty() {
            return;
        }
        match self.fallback.as_ref().and_then(Weak::upgrade) {
            Some(fallback) => {
                let moving = self.base.len();
                self.base.merge_into(&fallback);
                assert_invariant(
                    FALLBACK_RELOCATION,
                    self.base.is_empty(),
                    "dropped index handed every member to its fallback",
                    Some("Index::drop"),
                );
                tracing::debug!(
                    "index_drop: `{}` relocated {moving} members to `{}`",
                    self.base.label,
                    fallback.label
                );
            }
            None => {
                tracing::warn!(
                    "index_drop: `{}` has no live fallback, orphaning {} members",
                    self.base.label,
                    self.base.len()
                );
                self.base.orphan_all();
            }
        }
    }
}

impl<E: Member> fmt::Debug for Index<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("base", &self.base)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}
