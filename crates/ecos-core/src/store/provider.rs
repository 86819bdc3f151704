// ── Reconciliation engine ──
//
// `DataProvider` owns the live entity collection and applies parsed
// blocks to it through an ordered handler chain. The first handler that
// claims a block wins. Handlers work on a staged copy of the entities
// they touch; nothing is committed unless the handler succeeds.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tokio::sync::{broadcast, watch};

use super::snapshot::Snapshot;
use crate::error::CoreError;
use crate::model::{
    BASE_OBJECT_ID, CentralStation, Entity, EntityKind, FEEDBACKS_ID, Item, LOCOMOTIVES_ID,
    ACCESSORIES_ID,
};
use crate::protocol::{Argument, Block, Command, CommandKind};

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Which session a provider serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DataProviderMode {
    #[default]
    Any,
    General,
    Feedback,
}

/// Outcome of one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Pass,
    Handled { modified: bool },
}

type Handler = fn(&mut Staged<'_>, &Block) -> Result<Claim, CoreError>;

/// Handler chain, evaluated in order.
const HANDLERS: [(&str, Handler); 5] = [
    ("event", handle_event),
    ("base", handle_base),
    ("get", handle_get),
    ("request", handle_request),
    ("query_objects", handle_query_objects),
];

/// Live model of one station session.
pub struct DataProvider {
    mode: DataProviderMode,
    objects: RwLock<IndexMap<i32, Entity>>,
    /// Version counter, bumped once per modifying call.
    modified: watch::Sender<u64>,
    /// Commands the model wants sent that belong to no entity.
    commands: broadcast::Sender<Arc<Vec<Command>>>,
}

impl DataProvider {
    pub fn new(mode: DataProviderMode) -> Self {
        let (modified, _) = watch::channel(0u64);
        let (commands, _) = broadcast::channel(COMMAND_CHANNEL_CAPACITY);

        Self {
            mode,
            objects: RwLock::new(IndexMap::new()),
            modified,
            commands,
        }
    }

    pub fn mode(&self) -> DataProviderMode {
        self.mode
    }

    /// Apply one block. Returns whether any handler claimed it.
    pub fn handle_data(&self, block: &Block) -> bool {
        tracing::debug!(
            mode = %self.mode,
            start = block.start_line(),
            entries = block.entries().len(),
            "handling block"
        );

        let mut emitted = Vec::new();
        let mut outcome = None;
        {
            let mut objects = self.write();
            for (name, handler) in HANDLERS {
                let mut staged = Staged::new(&objects);
                match handler(&mut staged, block) {
                    Ok(Claim::Pass) => {}
                    Ok(Claim::Handled { modified }) => {
                        let changes = staged.into_changes();
                        emitted = changes.apply(&mut objects);
                        outcome = Some(modified);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            handler = name,
                            error = %e,
                            block = block.start_line(),
                            "reconciliation failed"
                        );
                        return false;
                    }
                }
            }
        }

        let Some(modified) = outcome else {
            tracing::debug!(block = block.start_line(), "unhandled block");
            return false;
        };

        if modified {
            self.bump_version();
        }
        if !emitted.is_empty() {
            // No receivers is fine: nobody is listening for list changes.
            let _ = self.commands.send(Arc::new(emitted));
        }
        true
    }

    /// Receiver that observes a new version after every change.
    pub fn subscribe_modified(&self) -> watch::Receiver<u64> {
        self.modified.subscribe()
    }

    pub fn subscribe_commands(&self) -> broadcast::Receiver<Arc<Vec<Command>>> {
        self.commands.subscribe()
    }

    /// Current model version.
    pub fn version(&self) -> u64 {
        *self.modified.borrow()
    }

    /// Insert an entity, replacing any entity with the same id. Entities
    /// without a valid id are rejected.
    pub fn append(&self, entity: Entity) -> bool {
        let id = entity.object_id();
        if id <= 0 {
            return false;
        }
        {
            let mut objects = self.write();
            objects.shift_remove(&id);
            objects.insert(id, entity);
        }
        self.bump_version();
        true
    }

    pub fn get_object_by(&self, object_id: i32) -> Option<Entity> {
        if object_id <= -1 {
            return None;
        }
        self.read().get(&object_id).cloned()
    }

    /// Run `f` against the entity with `object_id`, e.g. to enqueue
    /// commands from automation code. The version is bumped only when the
    /// entity's snapshot fields changed; queued commands alone do not count.
    pub fn with_object_mut<R>(&self, object_id: i32, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        let (result, changed) = {
            let mut objects = self.write();
            let entity = objects.get_mut(&object_id)?;
            let before = snapshot_of(entity);
            let result = f(entity);
            (result, snapshot_of(entity) != before)
        };
        if changed {
            self.bump_version();
        }
        Some(result)
    }

    /// Clones of every entity, in insertion order.
    pub fn objects(&self) -> Vec<Entity> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drain every entity's pending commands in collection order.
    pub fn drain_commands(&self) -> Vec<Command> {
        self.read()
            .values()
            .flat_map(|e| e.commands().drain())
            .collect()
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot::from_entities(self.read().values())
    }

    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        self.to_snapshot().to_value()
    }

    /// Replace the collection with the snapshot's entities.
    pub fn load_snapshot(&self, snapshot: Snapshot) {
        {
            let mut objects = self.write();
            objects.clear();
            for entity in snapshot.into_entities() {
                let id = entity.object_id();
                if id <= 0 {
                    tracing::debug!(kind = %entity.kind(), "skipping snapshot entity without id");
                    continue;
                }
                objects.insert(id, entity);
            }
        }
        self.bump_version();
    }

    pub fn load_json(&self, text: &str) -> Result<(), CoreError> {
        self.load_snapshot(Snapshot::from_json(text)?);
        Ok(())
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<i32, Entity>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<i32, Entity>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_version(&self) {
        self.modified.send_modify(|v| *v += 1);
    }
}

impl Default for DataProvider {
    fn default() -> Self {
        Self::new(DataProviderMode::Any)
    }
}

/// Serialized fields of one entity, for change detection.
fn snapshot_of(entity: &Entity) -> Option<serde_json::Value> {
    Snapshot::from_entities(std::iter::once(entity)).to_value().ok()
}

// ── Staging ──────────────────────────────────────────────────────────

/// Copy-on-touch view of the collection for one handler run.
struct Staged<'a> {
    objects: &'a IndexMap<i32, Entity>,
    touched: IndexMap<i32, Entity>,
    removed: Vec<i32>,
    emitted: Vec<Command>,
}

struct Changes {
    touched: IndexMap<i32, Entity>,
    removed: Vec<i32>,
    emitted: Vec<Command>,
}

impl<'a> Staged<'a> {
    fn new(objects: &'a IndexMap<i32, Entity>) -> Self {
        Self {
            objects,
            touched: IndexMap::new(),
            removed: Vec::new(),
            emitted: Vec::new(),
        }
    }

    fn contains(&self, id: i32) -> bool {
        !self.removed.contains(&id) && (self.touched.contains_key(&id) || self.objects.contains_key(&id))
    }

    fn entity_mut(&mut self, id: i32) -> Option<&mut Entity> {
        if self.removed.contains(&id) {
            return None;
        }
        if !self.touched.contains_key(&id) {
            let original = self.objects.get(&id)?.clone();
            self.touched.insert(id, original);
        }
        self.touched.get_mut(&id)
    }

    fn insert(&mut self, entity: Entity) {
        let id = entity.object_id();
        self.removed.retain(|r| *r != id);
        self.touched.insert(id, entity);
    }

    fn remove(&mut self, id: i32) {
        self.touched.shift_remove(&id);
        if self.objects.contains_key(&id) {
            self.removed.push(id);
        }
    }

    fn emit(&mut self, command: Command) {
        self.emitted.push(command);
    }

    fn into_changes(self) -> Changes {
        Changes {
            touched: self.touched,
            removed: self.removed,
            emitted: self.emitted,
        }
    }
}

impl Changes {
    /// Commit into the collection; returns the commands to emit.
    fn apply(self, objects: &mut IndexMap<i32, Entity>) -> Vec<Command> {
        for id in self.removed {
            objects.shift_remove(&id);
        }
        for (id, entity) in self.touched {
            objects.insert(id, entity);
        }
        self.emitted
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

fn is_object_list(id: i32) -> bool {
    matches!(id, LOCOMOTIVES_ID | ACCESSORIES_ID | FEEDBACKS_ID)
}

/// `<EVENT 10>` / `10 msg[LIST_CHANGED]`
fn is_list_changed(block: &Block) -> bool {
    block.entries().first().is_some_and(|entry| {
        entry.arguments().iter().any(|arg| {
            arg.is("msg")
                && arg
                    .first()
                    .is_some_and(|m| m.eq_ignore_ascii_case("LIST_CHANGED"))
        })
    })
}

fn reply_of(block: &Block, kind: CommandKind) -> Option<&Command> {
    block.command().filter(|cmd| cmd.kind() == kind)
}

/// Events: list changes on the object lists, otherwise state pushes for
/// the subject object.
fn handle_event(staged: &mut Staged<'_>, block: &Block) -> Result<Claim, CoreError> {
    let Some(subject) = block.event_object_id() else {
        return Ok(Claim::Pass);
    };

    if is_object_list(subject) && is_list_changed(block) {
        let change = block.entries().get(1).ok_or_else(|| CoreError::MalformedBlock {
            context: "list change",
            reason: format!("event {subject} names no affected object"),
        })?;
        let action = change.arguments().first().map(Argument::name).unwrap_or_default();

        if action.eq_ignore_ascii_case("removed") {
            staged.remove(change.object_id());
        } else if action.eq_ignore_ascii_case("appended") {
            if let Some(query) = EntityKind::from_list_id(subject).and_then(EntityKind::list_query) {
                staged.emit(query);
            }
        } else {
            tracing::trace!(subject, action, "ignoring list change");
        }
        return Ok(Claim::Handled { modified: true });
    }

    let Some(entity) = staged.entity_mut(subject) else {
        tracing::trace!(subject, "event for unknown object");
        return Ok(Claim::Pass);
    };
    for entry in block.entries() {
        entity.parse(entry.arguments());
    }
    Ok(Claim::Handled { modified: true })
}

/// `get(1, ...)` replies: the central station itself.
fn handle_base(staged: &mut Staged<'_>, block: &Block) -> Result<Claim, CoreError> {
    if reply_of(block, CommandKind::Get).is_none() {
        return Ok(Claim::Pass);
    }
    let entries = block.entries();
    if entries.is_empty() || entries.iter().any(|e| e.object_id() != BASE_OBJECT_ID) {
        return Ok(Claim::Pass);
    }

    if !staged.contains(BASE_OBJECT_ID) {
        staged.insert(Entity::from(CentralStation::new()));
    }
    let station = staged
        .entity_mut(BASE_OBJECT_ID)
        .ok_or(CoreError::ObjectNotFound { object_id: BASE_OBJECT_ID })?;
    for entry in entries {
        station.parse(entry.arguments());
    }
    Ok(Claim::Handled { modified: true })
}

/// Any other `get` reply: each entry updates the object it names.
#[allow(clippy::unnecessary_wraps)]
fn handle_get(staged: &mut Staged<'_>, block: &Block) -> Result<Claim, CoreError> {
    if reply_of(block, CommandKind::Get).is_none() {
        return Ok(Claim::Pass);
    }

    for entry in block.entries() {
        let id = entry.object_id();
        if id == -1 {
            continue;
        }
        match staged.entity_mut(id) {
            Some(entity) => {
                entity.parse(entry.arguments());
            }
            None => tracing::trace!(object_id = id, "get reply for unknown object"),
        }
    }
    Ok(Claim::Handled { modified: true })
}

/// `request(...)` acknowledgements. Only the canonical OK terminal counts.
#[allow(clippy::unnecessary_wraps)]
fn handle_request(_staged: &mut Staged<'_>, block: &Block) -> Result<Claim, CoreError> {
    if reply_of(block, CommandKind::Request).is_none() || !block.is_ok() {
        return Ok(Claim::Pass);
    }
    Ok(Claim::Handled { modified: false })
}

/// `queryObjects(list, ...)` replies: create entities for unseen ids.
#[allow(clippy::unnecessary_wraps)]
fn handle_query_objects(staged: &mut Staged<'_>, block: &Block) -> Result<Claim, CoreError> {
    let Some(command) = reply_of(block, CommandKind::QueryObjects) else {
        return Ok(Claim::Pass);
    };
    let Some(kind) = EntityKind::from_list_id(command.object_id()) else {
        tracing::trace!(list = command.object_id(), "query on unknown object list");
        return Ok(Claim::Handled { modified: false });
    };

    for entry in block.entries() {
        let id = entry.object_id();
        if id <= 0 || staged.contains(id) {
            continue;
        }

        let mut entity = Entity::new(kind);
        if !entity.parse(entry.arguments()) {
            continue;
        }
        entity.set_object_id(id);
        entity.enable_view();
        entity.query_state();
        tracing::debug!(object_id = id, %kind, "discovered object");
        staged.insert(entity);
    }
    Ok(Claim::Handled { modified: true })
}
