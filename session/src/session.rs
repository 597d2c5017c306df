//! The session
//!
//! One session per logical unit of work. It owns exactly one
//! transaction from begin to commit/rollback; closing it without an
//! explicit commit rolls back (the underlying transaction rolls back
//! on drop). A failed statement rolls the transaction back before the
//! error is surfaced, so no partial flush is ever committed.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};

use query_builder::{
    compile_count, compile_select, compile_select_by_fk, compile_select_by_key,
    compile_select_by_keys, compile_select_via_join_table, CompiledQuery, Projection,
    QueryExpression, UnsupportedQueryError,
};
use schema_registry::{
    EntityDescriptor, IdentityKey, KeyValue, RelationshipKind, SchemaRegistry,
};
use sqlx::Row;
use type_coercion::PgValue;

use crate::errors::SessionError;
use crate::executor;
use crate::hydrate::{hydrate_record, HydrationMode};
use crate::identity::IdentityMap;
use crate::instance::InstanceRef;
use crate::query::{EntityQuery, Page};
use crate::raw::{decode_row_dynamic, rewrite_named_params};
use crate::savepoint::Savepoint;
use crate::unit_of_work::{plan_flush, PendingChanges, PlannedKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Committed,
    RolledBack,
}

pub struct Session {
    registry: Arc<SchemaRegistry>,
    tx: Option<Transaction<'static, Postgres>>,
    identity: IdentityMap,
    pending: PendingChanges,
    relation_cache: HashMap<(IdentityKey, String), Vec<IdentityKey>>,
    savepoint_counter: u32,
    state: SessionState,
}

impl Session {
    /// Open a session on its own transaction. The registry must be
    /// finalized; a pool acquire that times out surfaces as
    /// `PoolExhausted`.
    pub async fn begin(
        pool: &PgPool,
        registry: Arc<SchemaRegistry>,
    ) -> Result<Self, SessionError> {
        if !registry.is_finalized() {
            return Err(SessionError::Schema(
                schema_registry::SchemaError::NotFinalized,
            ));
        }
        let tx = pool.begin().await.map_err(executor::translate_db_error)?;
        tracing::debug!("session transaction opened");
        Ok(Self {
            registry,
            tx: Some(tx),
            identity: IdentityMap::new(),
            pending: PendingChanges::new(),
            relation_cache: HashMap::new(),
            savepoint_counter: 0,
            state: SessionState::Active,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    fn tx_mut(&mut self) -> Result<&mut Transaction<'static, Postgres>, SessionError> {
        self.tx.as_mut().ok_or(SessionError::Closed)
    }

    /// Roll back after a failed statement, then hand the error back.
    async fn fail(&mut self, err: SessionError) -> SessionError {
        if let Some(tx) = self.tx.take() {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed statement also failed");
            }
        }
        self.state = SessionState::RolledBack;
        self.pending.clear();
        err
    }

    async fn run_fetch_all(
        &mut self,
        compiled: &CompiledQuery,
    ) -> Result<Vec<sqlx::postgres::PgRow>, SessionError> {
        let result = {
            let tx = self.tx_mut()?;
            executor::fetch_all(tx, compiled).await
        };
        match result {
            Ok(rows) => Ok(rows),
            Err(err) => Err(self.fail(err).await),
        }
    }

    async fn run_fetch_optional(
        &mut self,
        compiled: &CompiledQuery,
    ) -> Result<Option<sqlx::postgres::PgRow>, SessionError> {
        let result = {
            let tx = self.tx_mut()?;
            executor::fetch_optional(tx, compiled).await
        };
        match result {
            Ok(row) => Ok(row),
            Err(err) => Err(self.fail(err).await),
        }
    }

    async fn run_execute(&mut self, compiled: &CompiledQuery) -> Result<u64, SessionError> {
        let result = {
            let tx = self.tx_mut()?;
            executor::execute(tx, compiled).await
        };
        match result {
            Ok(count) => Ok(count),
            Err(err) => Err(self.fail(err).await),
        }
    }

    /// Track a freshly hydrated record, or return the instance already
    /// loaded under the same key.
    fn track_record(
        &mut self,
        descriptor: &EntityDescriptor,
        record: std::collections::BTreeMap<String, PgValue>,
    ) -> InstanceRef {
        match descriptor.identify_record(&record) {
            Some(key) => {
                let identity_key = IdentityKey::new(&descriptor.entity, key);
                if let Some(existing) = self.identity.get(&identity_key) {
                    // Locally held state wins over a re-read of the
                    // same row.
                    return existing.clone();
                }
                let instance = InstanceRef::from_record(&descriptor.entity, record);
                self.identity.insert(identity_key, instance.clone());
                instance
            }
            None => InstanceRef::from_record(&descriptor.entity, record),
        }
    }

    /// Identity-mapped lookup by primary key. A hit never touches the
    /// database.
    pub async fn get(
        &mut self,
        entity: &str,
        key: impl Into<KeyValue>,
    ) -> Result<Option<InstanceRef>, SessionError> {
        self.ensure_active()?;
        let key = key.into();
        let identity_key = IdentityKey::new(entity, key.clone());
        if let Some(existing) = self.identity.get(&identity_key) {
            return Ok(Some(existing.clone()));
        }

        let registry = self.registry.clone();
        let descriptor = registry.resolve(entity)?;
        let compiled = compile_select_by_key(descriptor, &key)?;
        let row = self.run_fetch_optional(&compiled).await?;
        match row {
            Some(row) => {
                let record = hydrate_record(&row, descriptor, HydrationMode::Full)?;
                Ok(Some(self.track_record(descriptor, record)))
            }
            None => Ok(None),
        }
    }

    /// Batched lookup; the result preserves the order of `keys`.
    pub async fn get_many(
        &mut self,
        entity: &str,
        keys: &[KeyValue],
    ) -> Result<Vec<Option<InstanceRef>>, SessionError> {
        self.ensure_active()?;
        let registry = self.registry.clone();
        let descriptor = registry.resolve(entity)?;

        let mut missing: Vec<KeyValue> = Vec::new();
        for key in keys {
            let identity_key = IdentityKey::new(entity, key.clone());
            if !self.identity.contains(&identity_key) && !missing.contains(key) {
                missing.push(key.clone());
            }
        }

        if !missing.is_empty() {
            let compiled = compile_select_by_keys(descriptor, &missing)?;
            let rows = self.run_fetch_all(&compiled).await?;
            for row in rows {
                let record = hydrate_record(&row, descriptor, HydrationMode::Full)?;
                self.track_record(descriptor, record);
            }
        }

        Ok(keys
            .iter()
            .map(|key| {
                self.identity
                    .get(&IdentityKey::new(entity, key.clone()))
                    .cloned()
            })
            .collect())
    }

    /// Mark an instance for insertion at the next flush.
    pub fn add(&mut self, instance: InstanceRef) -> Result<(), SessionError> {
        self.ensure_active()?;
        let entity = instance.entity();
        self.registry.resolve(&entity)?;
        if self.pending.is_pending_insert(&instance) {
            return Ok(());
        }
        self.pending.inserts.push(instance);
        Ok(())
    }

    /// Mark an instance for deletion at the next flush. Deleting an
    /// instance that was only pending insertion cancels the insert.
    pub fn delete(&mut self, instance: InstanceRef) -> Result<(), SessionError> {
        self.ensure_active()?;
        let entity = instance.entity();
        self.registry.resolve(&entity)?;
        if self.pending.is_pending_insert(&instance) {
            self.pending
                .inserts
                .retain(|pending| !pending.same_instance(&instance));
            return Ok(());
        }
        if self.pending.is_pending_delete(&instance) {
            return Ok(());
        }
        self.pending.deletes.push(instance);
        Ok(())
    }

    /// Execute all pending changes inside the session's transaction.
    /// The statement order honors foreign-key dependencies; the first
    /// failure rolls everything back.
    pub async fn flush(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        let registry = self.registry.clone();
        let plan = plan_flush(&registry, &self.identity, &self.pending)?;
        if plan.is_empty() {
            return Ok(());
        }
        tracing::debug!(statements = plan.statements.len(), "flushing session");

        for statement in plan.statements {
            match statement.kind {
                PlannedKind::Insert | PlannedKind::Update => {
                    let row = {
                        let result = {
                            let tx = self.tx_mut()?;
                            executor::fetch_one(tx, &statement.query).await
                        };
                        match result {
                            Ok(row) => row,
                            Err(err) => return Err(self.fail(err).await),
                        }
                    };
                    let descriptor = registry.resolve(&statement.entity)?;
                    let record = match hydrate_record(&row, descriptor, HydrationMode::Full) {
                        Ok(record) => record,
                        Err(err) => return Err(self.fail(err.into()).await),
                    };
                    if let Some(instance) = statement.instance {
                        instance.reset_to(record.clone());
                        if statement.kind == PlannedKind::Insert {
                            if let Some(key) = descriptor.identify_record(&record) {
                                self.identity
                                    .insert(IdentityKey::new(&statement.entity, key), instance);
                            }
                        }
                    }
                }
                PlannedKind::Delete | PlannedKind::CascadeDelete => {
                    self.run_execute(&statement.query).await?;
                    if let Some(identity) = statement.identity {
                        self.identity.remove(&identity);
                    }
                }
            }
        }

        self.pending.clear();
        self.relation_cache.clear();
        Ok(())
    }

    /// Flush pending changes, commit the transaction, and close the
    /// session. Calling it again on a closed session is a no-op.
    pub async fn commit(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Active {
            return Ok(());
        }
        self.flush().await?;
        if let Some(tx) = self.tx.take() {
            if let Err(err) = tx.commit().await {
                self.state = SessionState::RolledBack;
                return Err(executor::translate_db_error(err));
            }
        }
        self.state = SessionState::Committed;
        tracing::debug!("session committed");
        Ok(())
    }

    /// Discard pending changes and roll back the transaction. The
    /// in-memory state of attached instances is left as-is, which may
    /// no longer match storage; discard the session afterwards.
    /// Calling it again on a closed session is a no-op.
    pub async fn rollback(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Active {
            return Ok(());
        }
        self.pending.clear();
        if let Some(tx) = self.tx.take() {
            if let Err(err) = tx.rollback().await {
                self.state = SessionState::RolledBack;
                return Err(executor::translate_db_error(err));
            }
        }
        self.state = SessionState::RolledBack;
        tracing::debug!("session rolled back");
        Ok(())
    }

    /// Create a savepoint; a nested transaction request inside the
    /// session's open transaction.
    pub async fn begin_nested(&mut self) -> Result<Savepoint, SessionError> {
        self.ensure_active()?;
        self.savepoint_counter += 1;
        let savepoint = Savepoint::new(self.savepoint_counter);
        let compiled = CompiledQuery {
            sql: format!("SAVEPOINT {}", savepoint.name()),
            binds: Vec::new(),
        };
        self.run_execute(&compiled).await?;
        Ok(savepoint)
    }

    /// Undo everything since the savepoint was created; the outer
    /// transaction stays open.
    pub async fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<(), SessionError> {
        self.ensure_active()?;
        let compiled = CompiledQuery {
            sql: format!("ROLLBACK TO SAVEPOINT {}", savepoint.name()),
            binds: Vec::new(),
        };
        self.run_execute(&compiled).await?;
        Ok(())
    }

    /// Release a savepoint, keeping the work done since it.
    pub async fn release(&mut self, savepoint: Savepoint) -> Result<(), SessionError> {
        self.ensure_active()?;
        let compiled = CompiledQuery {
            sql: format!("RELEASE SAVEPOINT {}", savepoint.name()),
            binds: Vec::new(),
        };
        self.run_execute(&compiled).await?;
        Ok(())
    }

    /// Start building a query over `entity` aliased as `alias`.
    pub fn query(&mut self, entity: &str, alias: &str) -> EntityQuery<'_> {
        EntityQuery::new(self, entity, alias)
    }

    /// Execute a compiled query expression and hydrate the rows.
    /// Full-projection rows merge through the identity map; partial
    /// projections produce untracked instances.
    pub async fn fetch(
        &mut self,
        expr: QueryExpression,
    ) -> Result<Vec<InstanceRef>, SessionError> {
        self.ensure_active()?;
        let registry = self.registry.clone();
        let compiled = compile_select(&registry, &expr)?;
        let rows = self.run_fetch_all(&compiled).await?;

        let descriptor = registry.resolve(&expr.entity)?;
        let mode = match expr.projection {
            Projection::All => HydrationMode::Full,
            Projection::Columns(_) => HydrationMode::Partial,
        };

        let mut instances = Vec::with_capacity(rows.len());
        for row in rows {
            let record = hydrate_record(&row, descriptor, mode)?;
            let instance = match mode {
                HydrationMode::Full => self.track_record(descriptor, record),
                HydrationMode::Partial => {
                    InstanceRef::from_record(&descriptor.entity, record)
                }
            };
            instances.push(instance);
        }
        Ok(instances)
    }

    pub async fn fetch_one(
        &mut self,
        expr: QueryExpression,
    ) -> Result<Option<InstanceRef>, SessionError> {
        let results = self.fetch(expr.limit(1)).await?;
        Ok(results.into_iter().next())
    }

    pub async fn count(&mut self, expr: QueryExpression) -> Result<i64, SessionError> {
        self.ensure_active()?;
        let registry = self.registry.clone();
        let compiled = compile_count(&registry, &expr)?;
        let row = {
            let result = {
                let tx = self.tx_mut()?;
                executor::fetch_one(tx, &compiled).await
            };
            match result {
                Ok(row) => row,
                Err(err) => return Err(self.fail(err).await),
            }
        };
        row.try_get::<i64, _>(0)
            .map_err(executor::translate_db_error)
    }

    /// Fetch one offset window, over-fetching a single row to learn
    /// whether more follow.
    pub async fn paginate(
        &mut self,
        expr: QueryExpression,
        page_size: i64,
        offset: i64,
    ) -> Result<Page, SessionError> {
        let probe = expr.limit(page_size + 1).offset(offset);
        let mut items = self.fetch(probe).await?;
        let has_next_page = items.len() as i64 > page_size;
        if has_next_page {
            items.truncate(page_size as usize);
        }
        Ok(Page {
            items,
            has_previous_page: offset > 0,
            has_next_page,
        })
    }

    /// Traverse a declared relationship from a loaded instance. The
    /// related rows are fetched lazily, on first traversal, and the
    /// key set is cached for the rest of the session.
    pub async fn load_related(
        &mut self,
        instance: &InstanceRef,
        relationship: &str,
    ) -> Result<Vec<InstanceRef>, SessionError> {
        self.ensure_active()?;
        let registry = self.registry.clone();
        let entity = instance.entity();
        let descriptor = registry.resolve(&entity)?;
        let rel = descriptor.relationship(relationship).ok_or_else(|| {
            SessionError::Query(UnsupportedQueryError::UnknownRelationship {
                entity: entity.clone(),
                relationship: relationship.to_string(),
            })
        })?;

        match &rel.kind {
            RelationshipKind::ManyToOne { fk_field } => {
                let value = instance.get(fk_field).unwrap_or(PgValue::Null);
                if value.is_null() {
                    return Ok(Vec::new());
                }
                let key = KeyValue::from_value(&value).ok_or_else(|| {
                    SessionError::MissingPrimaryKey {
                        entity: rel.target.clone(),
                    }
                })?;
                Ok(self.get(&rel.target, key).await?.into_iter().collect())
            }
            RelationshipKind::OneToMany { fk_field } => {
                let parent_key = descriptor
                    .identify_record(&instance.snapshot())
                    .ok_or_else(|| SessionError::MissingPrimaryKey {
                        entity: entity.clone(),
                    })?;
                let target = registry.resolve(&rel.target)?;
                let compiled = compile_select_by_fk(target, fk_field, &parent_key)?;
                self.load_children(target, &entity, relationship, parent_key, compiled)
                    .await
            }
            RelationshipKind::ManyToMany {
                join_table,
                left_fk,
                right_fk,
            } => {
                let parent_key = descriptor
                    .identify_record(&instance.snapshot())
                    .ok_or_else(|| SessionError::MissingPrimaryKey {
                        entity: entity.clone(),
                    })?;
                let target = registry.resolve(&rel.target)?;
                let compiled = compile_select_via_join_table(
                    target, join_table, left_fk, right_fk, &parent_key,
                )?;
                self.load_children(target, &entity, relationship, parent_key, compiled)
                    .await
            }
        }
    }

    async fn load_children(
        &mut self,
        target: &EntityDescriptor,
        entity: &str,
        relationship: &str,
        parent_key: KeyValue,
        compiled: CompiledQuery,
    ) -> Result<Vec<InstanceRef>, SessionError> {
        let cache_key = (
            IdentityKey::new(entity, parent_key),
            relationship.to_string(),
        );
        if let Some(keys) = self.relation_cache.get(&cache_key) {
            return Ok(keys
                .iter()
                .filter_map(|key| self.identity.get(key).cloned())
                .collect());
        }

        let rows = self.run_fetch_all(&compiled).await?;
        let mut children = Vec::with_capacity(rows.len());
        let mut child_keys = Vec::with_capacity(rows.len());
        for row in rows {
            let record = hydrate_record(&row, target, HydrationMode::Full)?;
            let key = target.identify_record(&record);
            let child = self.track_record(target, record);
            if let Some(key) = key {
                child_keys.push(IdentityKey::new(&target.entity, key));
            }
            children.push(child);
        }
        self.relation_cache.insert(cache_key, child_keys);
        Ok(children)
    }

    /// Run a hand-written statement with `:name` parameters. Values
    /// are bound positionally after rewriting; rows come back as
    /// column/value records.
    pub async fn raw_fetch(
        &mut self,
        sql: &str,
        params: &[(&str, PgValue)],
    ) -> Result<Vec<std::collections::BTreeMap<String, PgValue>>, SessionError> {
        self.ensure_active()?;
        let compiled = rewrite_named_params(sql, params)?;
        let rows = self.run_fetch_all(&compiled).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(decode_row_dynamic(&row)?);
        }
        Ok(records)
    }

    /// Run a hand-written statement that returns no rows; yields the
    /// affected row count.
    pub async fn raw_execute(
        &mut self,
        sql: &str,
        params: &[(&str, PgValue)],
    ) -> Result<u64, SessionError> {
        self.ensure_active()?;
        let compiled = rewrite_named_params(sql, params)?;
        self.run_execute(&compiled).await
    }

    /// Number of instances currently tracked by the identity map.
    pub fn tracked_count(&self) -> usize {
        self.identity.len()
    }
}
