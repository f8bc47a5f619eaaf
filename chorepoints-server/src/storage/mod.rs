pub mod models;
pub mod schema;

use std::sync::Arc;

use chorepoints_shared::domain::{self, RecordStatus};
use chorepoints_shared::ledger::{Decision, MAX_ENTRY_POINTS, PointsAccount, Submission};
use chorepoints_shared::milestones::{MilestoneTable, ReachedMilestone};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::DatabaseErrorKind;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{
    Child, Chore, ChoreChanges, ChoreLog, ChoreLogView, NewChild, NewChore,
    NewChoreLog, NewPointAdjustment, NewRedemption, NewReward, NewSession, PointAdjustment,
    Redemption, RedemptionView, Reward, RewardChanges,
};
use tracing::{debug, trace};

/// Longest reason text accepted for a manual adjustment.
pub const MAX_REASON_LEN: usize = 255;

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Which records a listing covers.
#[derive(Debug, Clone)]
pub enum RecordScope {
    /// Every child owned by this parent.
    Parent(String),
    Child(i32),
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
    milestones: Arc<MilestoneTable>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store {
            pool,
            milestones: Arc::new(MilestoneTable::default()),
        })
    }

    /// Replaces the milestone table used when crediting points.
    pub fn with_milestones(mut self, table: MilestoneTable) -> Self {
        self.milestones = Arc::new(table);
        self
    }

    pub fn milestones(&self) -> &MilestoneTable {
        &self.milestones
    }

    pub async fn seed_from_config(
        &self,
        cfg_children: &[domain::Child],
        cfg_chores: &[domain::Chore],
        cfg_rewards: &[domain::Reward],
    ) -> Result<(), StorageError> {
        use schema::children;

        let pool = self.pool.clone();
        let children_owned = cfg_children.to_owned();
        let chores_owned = cfg_chores.to_owned();
        let rewards_owned = cfg_rewards.to_owned();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;

            conn.immediate_transaction(|conn| -> Result<(), StorageError> {
                // Balances are never seeded; an existing account keeps its points.
                for c in &children_owned {
                    let new_child = NewChild {
                        parent: &c.parent,
                        display_name: &c.display_name,
                        pin_hash: &c.pin_hash,
                        avatar_emoji: c.avatar_emoji.as_deref(),
                        map_theme: c.map_theme.as_str(),
                    };
                    diesel::insert_into(children::table)
                        .values(&new_child)
                        .on_conflict((children::parent, children::display_name))
                        .do_update()
                        .set((
                            children::pin_hash.eq(new_child.pin_hash),
                            children::avatar_emoji.eq(new_child.avatar_emoji),
                            children::map_theme.eq(new_child.map_theme),
                        ))
                        .execute(conn)?;
                }
                for c in &chores_owned {
                    upsert_chore(conn, c)?;
                }
                for r in &rewards_owned {
                    upsert_reward(conn, r)?;
                }
                Ok(())
            })
        })
        .await?
    }

    /// Creates or updates chore and reward definitions keyed by
    /// (parent, title). Returns how many of each were written.
    pub async fn import_catalog(
        &self,
        chores_in: &[domain::Chore],
        rewards_in: &[domain::Reward],
    ) -> Result<(usize, usize), StorageError> {
        for c in chores_in {
            check_entry_points(c.points, &format!("chore '{}' points", c.title))?;
        }
        for r in rewards_in {
            check_entry_points(r.cost_points, &format!("reward '{}' cost", r.title))?;
        }
        let pool = self.pool.clone();
        let chores_owned = chores_in.to_owned();
        let rewards_owned = rewards_in.to_owned();
        tokio::task::spawn_blocking(move || -> Result<(usize, usize), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<(usize, usize), StorageError> {
                let mut chore_count = 0;
                for c in &chores_owned {
                    chore_count += upsert_chore(conn, c)?;
                }
                let mut reward_count = 0;
                for r in &rewards_owned {
                    reward_count += upsert_reward(conn, r)?;
                }
                Ok((chore_count, reward_count))
            })
        })
        .await?
    }

    // Children

    pub async fn list_children(&self, parent_: &str) -> Result<Vec<Child>, StorageError> {
        use schema::children::dsl::*;
        let pool = self.pool.clone();
        let p = parent_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<Child>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(children
                .filter(parent.eq(&p))
                .order(display_name.asc())
                .select(Child::as_select())
                .load(&mut conn)?)
        })
        .await?
    }

    pub async fn get_child(&self, child_id: i32) -> Result<Option<Child>, StorageError> {
        use schema::children::dsl::*;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<Child>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(children
                .find(child_id)
                .select(Child::as_select())
                .first(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn create_child(
        &self,
        parent_: &str,
        name: &str,
        pin_hash_: &str,
        avatar: Option<&str>,
        theme: domain::MapTheme,
    ) -> Result<Child, StorageError> {
        use schema::children;
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StorageError::InvalidInput("display_name is empty".into()));
        }
        let pool = self.pool.clone();
        let p = parent_.to_string();
        let hash = pin_hash_.to_string();
        let avatar = avatar.map(str::to_string);
        tokio::task::spawn_blocking(move || -> Result<Child, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new_child = NewChild {
                parent: &p,
                display_name: &name,
                pin_hash: &hash,
                avatar_emoji: avatar.as_deref(),
                map_theme: theme.as_str(),
            };
            diesel::insert_into(children::table)
                .values(&new_child)
                .returning(Child::as_returning())
                .get_result(&mut conn)
                .map_err(|e| unique_conflict(e, format!("child '{name}' already exists")))
        })
        .await?
    }

    pub async fn set_pin_hash(&self, child_id: i32, hash: &str) -> Result<bool, StorageError> {
        use schema::children::dsl::*;
        let pool = self.pool.clone();
        let h = hash.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let updated = diesel::update(children.find(child_id))
                .set(pin_hash.eq(&h))
                .execute(&mut conn)?;
            Ok(updated > 0)
        })
        .await?
    }

    // Chore and reward definitions

    pub async fn list_chores(
        &self,
        parent_: &str,
        only_active: bool,
    ) -> Result<Vec<Chore>, StorageError> {
        use schema::chores::dsl::*;
        let pool = self.pool.clone();
        let p = parent_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<Chore>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let mut query = chores
                .filter(parent.eq(&p))
                .order((title.asc(), id.asc()))
                .select(Chore::as_select())
                .into_boxed();
            if only_active {
                query = query.filter(active.eq(true));
            }
            Ok(query.load(&mut conn)?)
        })
        .await?
    }

    pub async fn create_chore(
        &self,
        parent_: &str,
        title_: &str,
        points_: i32,
        icon: Option<&str>,
    ) -> Result<Chore, StorageError> {
        use schema::chores;
        let t = title_.trim().to_string();
        if t.is_empty() {
            return Err(StorageError::InvalidInput("title is empty".into()));
        }
        check_entry_points(points_, "points")?;
        let pool = self.pool.clone();
        let p = parent_.to_string();
        let icon = icon.map(str::to_string);
        tokio::task::spawn_blocking(move || -> Result<Chore, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new_chore = NewChore {
                parent: &p,
                title: &t,
                points: points_,
                icon_emoji: icon.as_deref(),
            };
            diesel::insert_into(chores::table)
                .values(&new_chore)
                .returning(Chore::as_returning())
                .get_result(&mut conn)
                .map_err(|e| unique_conflict(e, format!("chore '{t}' already exists")))
        })
        .await?
    }

    /// Applies `changes` to a chore owned by `parent_`. Records already
    /// submitted keep their snapshot of the old point value.
    pub async fn update_chore(
        &self,
        parent_: &str,
        chore_id: i32,
        changes: ChoreChanges,
    ) -> Result<Option<Chore>, StorageError> {
        use schema::chores::dsl::*;
        if let Some(v) = changes.points {
            check_entry_points(v, "points")?;
        }
        if changes.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(StorageError::InvalidInput("title is empty".into()));
        }
        let pool = self.pool.clone();
        let p = parent_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Chore>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let target = chores.filter(id.eq(chore_id)).filter(parent.eq(&p));
            if changes.is_noop() {
                return Ok(target
                    .select(Chore::as_select())
                    .first(&mut conn)
                    .optional()?);
            }
            diesel::update(target)
                .set(&changes)
                .returning(Chore::as_returning())
                .get_result(&mut conn)
                .optional()
                .map_err(|e| unique_conflict(e, "chore title already in use".into()))
        })
        .await?
    }

    pub async fn list_rewards(
        &self,
        parent_: &str,
        only_active: bool,
    ) -> Result<Vec<Reward>, StorageError> {
        use schema::rewards::dsl::*;
        let pool = self.pool.clone();
        let p = parent_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<Reward>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let mut query = rewards
                .filter(parent.eq(&p))
                .order((cost_points.asc(), title.asc()))
                .select(Reward::as_select())
                .into_boxed();
            if only_active {
                query = query.filter(active.eq(true));
            }
            Ok(query.load(&mut conn)?)
        })
        .await?
    }

    pub async fn create_reward(
        &self,
        parent_: &str,
        title_: &str,
        cost: i32,
        icon: Option<&str>,
    ) -> Result<Reward, StorageError> {
        use schema::rewards;
        let t = title_.trim().to_string();
        if t.is_empty() {
            return Err(StorageError::InvalidInput("title is empty".into()));
        }
        check_entry_points(cost, "cost_points")?;
        let pool = self.pool.clone();
        let p = parent_.to_string();
        let icon = icon.map(str::to_string);
        tokio::task::spawn_blocking(move || -> Result<Reward, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new_reward = NewReward {
                parent: &p,
                title: &t,
                cost_points: cost,
                icon_emoji: icon.as_deref(),
            };
            diesel::insert_into(rewards::table)
                .values(&new_reward)
                .returning(Reward::as_returning())
                .get_result(&mut conn)
                .map_err(|e| unique_conflict(e, format!("reward '{t}' already exists")))
        })
        .await?
    }

    pub async fn update_reward(
        &self,
        parent_: &str,
        reward_id: i32,
        changes: RewardChanges,
    ) -> Result<Option<Reward>, StorageError> {
        use schema::rewards::dsl::*;
        if let Some(v) = changes.cost_points {
            check_entry_points(v, "cost_points")?;
        }
        if changes.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(StorageError::InvalidInput("title is empty".into()));
        }
        let pool = self.pool.clone();
        let p = parent_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Reward>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let target = rewards.filter(id.eq(reward_id)).filter(parent.eq(&p));
            if changes.is_noop() {
                return Ok(target
                    .select(Reward::as_select())
                    .first(&mut conn)
                    .optional()?);
            }
            diesel::update(target)
                .set(&changes)
                .returning(Reward::as_returning())
                .get_result(&mut conn)
                .optional()
                .map_err(|e| unique_conflict(e, "reward title already in use".into()))
        })
        .await?
    }

    // Submissions

    /// Records a chore completion as Pending with the chore's current point
    /// value. Returns `None` when the child is inactive or unknown, or the
    /// chore is inactive or belongs to another parent.
    pub async fn submit_chore(
        &self,
        child: i32,
        chore: i32,
    ) -> Result<Option<Submission<ChoreLogView>>, StorageError> {
        use schema::{chore_logs, chores};
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(
            move || -> Result<Option<Submission<ChoreLogView>>, StorageError> {
                let mut conn = pool.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.immediate_transaction(|conn| {
                    let Some((owner, child_name)) = active_child(conn, child)? else {
                        return Ok(None);
                    };
                    let chore_row: Option<(i32, String)> = chores::table
                        .filter(chores::id.eq(chore))
                        .filter(chores::parent.eq(&owner))
                        .filter(chores::active.eq(true))
                        .select((chores::points, chores::title))
                        .first(conn)
                        .optional()?;
                    let Some((points, chore_title)) = chore_row else {
                        return Ok(None);
                    };
                    let view = |log| ChoreLogView {
                        log,
                        child_name: child_name.clone(),
                        chore_title: chore_title.clone(),
                    };

                    let existing = chore_logs::table
                        .filter(chore_logs::child_id.eq(child))
                        .filter(chore_logs::chore_id.eq(chore))
                        .filter(chore_logs::status.eq(RecordStatus::Pending.as_str()))
                        .select(ChoreLog::as_select())
                        .first(conn)
                        .optional()?;
                    if let Some(log) = existing {
                        debug!(
                            child_id = child,
                            chore_id = chore,
                            log_id = log.id,
                            "chore already pending"
                        );
                        return Ok(Some(Submission::AlreadyPending(view(log))));
                    }

                    let new_log = NewChoreLog {
                        child_id: child,
                        chore_id: chore,
                        points_awarded: points,
                        status: RecordStatus::Pending.as_str(),
                        submitted_at: Utc::now().naive_utc(),
                    };
                    let log = diesel::insert_into(chore_logs::table)
                        .values(&new_log)
                        .returning(ChoreLog::as_returning())
                        .get_result(conn)?;
                    Ok(Some(Submission::Created(view(log))))
                })
            },
        )
        .await?
    }

    /// Records a redemption request as Pending with the reward's current
    /// cost. The balance is checked only at approval.
    pub async fn submit_redemption(
        &self,
        child: i32,
        reward: i32,
    ) -> Result<Option<Submission<RedemptionView>>, StorageError> {
        use schema::{redemptions, rewards};
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(
            move || -> Result<Option<Submission<RedemptionView>>, StorageError> {
                let mut conn = pool.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.immediate_transaction(|conn| {
                    let Some((owner, child_name)) = active_child(conn, child)? else {
                        return Ok(None);
                    };
                    let reward_row: Option<(i32, String)> = rewards::table
                        .filter(rewards::id.eq(reward))
                        .filter(rewards::parent.eq(&owner))
                        .filter(rewards::active.eq(true))
                        .select((rewards::cost_points, rewards::title))
                        .first(conn)
                        .optional()?;
                    let Some((cost, reward_title)) = reward_row else {
                        return Ok(None);
                    };
                    let view = |redemption| RedemptionView {
                        redemption,
                        child_name: child_name.clone(),
                        reward_title: reward_title.clone(),
                    };

                    let existing = redemptions::table
                        .filter(redemptions::child_id.eq(child))
                        .filter(redemptions::reward_id.eq(reward))
                        .filter(redemptions::status.eq(RecordStatus::Pending.as_str()))
                        .select(Redemption::as_select())
                        .first(conn)
                        .optional()?;
                    if let Some(r) = existing {
                        debug!(
                            child_id = child,
                            reward_id = reward,
                            redemption_id = r.id,
                            "redemption already pending"
                        );
                        return Ok(Some(Submission::AlreadyPending(view(r))));
                    }

                    let new_row = NewRedemption {
                        child_id: child,
                        reward_id: reward,
                        cost_points: cost,
                        status: RecordStatus::Pending.as_str(),
                        submitted_at: Utc::now().naive_utc(),
                    };
                    let r = diesel::insert_into(redemptions::table)
                        .values(&new_row)
                        .returning(Redemption::as_returning())
                        .get_result(conn)?;
                    Ok(Some(Submission::Created(view(r))))
                })
            },
        )
        .await?
    }

    // Decisions

    /// Approves a pending chore completion: credits balance and position,
    /// then awards every milestone crossed by the move.
    pub async fn approve_chore_log(
        &self,
        parent: &str,
        log_id: i32,
    ) -> Result<Decision, StorageError> {
        self.decide_chore_log(parent, log_id, true).await
    }

    pub async fn reject_chore_log(
        &self,
        parent: &str,
        log_id: i32,
    ) -> Result<Decision, StorageError> {
        self.decide_chore_log(parent, log_id, false).await
    }

    async fn decide_chore_log(
        &self,
        parent_: &str,
        log_id: i32,
        approve: bool,
    ) -> Result<Decision, StorageError> {
        use schema::{chore_logs, children};
        let pool = self.pool.clone();
        let table = Arc::clone(&self.milestones);
        let p = parent_.to_string();
        trace!(log_id, approve, "decide_chore_log starting");
        tokio::task::spawn_blocking(move || -> Result<Decision, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| {
                let row = chore_logs::table
                    .inner_join(children::table)
                    .filter(chore_logs::id.eq(log_id))
                    .filter(children::parent.eq(&p))
                    .select((ChoreLog::as_select(), Child::as_select()))
                    .first::<(ChoreLog, Child)>(conn)
                    .optional()?;
                let Some((log, child)) = row else {
                    return Ok(Decision::NotFound);
                };
                if !log.status().is_pending() {
                    return Ok(Decision::NotPending);
                }
                if !approve {
                    finish_chore_log(conn, log.id, RecordStatus::Rejected)?;
                    return Ok(Decision::Rejected);
                }

                let mut account = child.points();
                let milestones = account
                    .apply_chore(&table, log.points_awarded)
                    .map_err(|e| StorageError::InvalidInput(e.to_string()))?;
                save_account(conn, child.id, &account)?;
                finish_chore_log(conn, log.id, RecordStatus::Approved)?;
                Ok(Decision::Approved {
                    account,
                    milestones,
                })
            })
        })
        .await?
    }

    /// Approves a pending redemption if the balance covers its cost.
    /// Otherwise the record stays Pending.
    pub async fn approve_redemption(
        &self,
        parent: &str,
        redemption_id: i32,
    ) -> Result<Decision, StorageError> {
        self.decide_redemption(parent, redemption_id, true).await
    }

    pub async fn reject_redemption(
        &self,
        parent: &str,
        redemption_id: i32,
    ) -> Result<Decision, StorageError> {
        self.decide_redemption(parent, redemption_id, false).await
    }

    async fn decide_redemption(
        &self,
        parent_: &str,
        redemption_id: i32,
        approve: bool,
    ) -> Result<Decision, StorageError> {
        use schema::{children, redemptions};
        let pool = self.pool.clone();
        let p = parent_.to_string();
        trace!(redemption_id, approve, "decide_redemption starting");
        tokio::task::spawn_blocking(move || -> Result<Decision, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| {
                let row = redemptions::table
                    .inner_join(children::table)
                    .filter(redemptions::id.eq(redemption_id))
                    .filter(children::parent.eq(&p))
                    .select((Redemption::as_select(), Child::as_select()))
                    .first::<(Redemption, Child)>(conn)
                    .optional()?;
                let Some((redemption, child)) = row else {
                    return Ok(Decision::NotFound);
                };
                if !redemption.status().is_pending() {
                    return Ok(Decision::NotPending);
                }
                if !approve {
                    finish_redemption(conn, redemption.id, RecordStatus::Rejected)?;
                    return Ok(Decision::Rejected);
                }

                let mut account = child.points();
                if let Err(short) = account.apply_redemption(redemption.cost_points) {
                    return Ok(Decision::InsufficientBalance(short));
                }
                save_account(conn, child.id, &account)?;
                finish_redemption(conn, redemption.id, RecordStatus::Approved)?;
                Ok(Decision::Approved {
                    account,
                    milestones: Vec::new(),
                })
            })
        })
        .await?
    }

    // Manual adjustments

    /// Records a signed manual adjustment and applies it to the child's
    /// account in the same transaction. Returns `None` when the child does
    /// not belong to `parent_`.
    pub async fn create_adjustment(
        &self,
        parent_: &str,
        child: i32,
        points_: i32,
        reason_: &str,
    ) -> Result<Option<(PointAdjustment, PointsAccount, Vec<ReachedMilestone>)>, StorageError>
    {
        use schema::{children, point_adjustments};
        let reason_owned = reason_.trim().to_string();
        if reason_owned.chars().count() > MAX_REASON_LEN {
            return Err(StorageError::InvalidInput(format!(
                "reason longer than {MAX_REASON_LEN} characters"
            )));
        }
        if points_.unsigned_abs() > MAX_ENTRY_POINTS.unsigned_abs() {
            return Err(StorageError::InvalidInput(format!(
                "points must be between -{MAX_ENTRY_POINTS} and {MAX_ENTRY_POINTS}"
            )));
        }
        let pool = self.pool.clone();
        let table = Arc::clone(&self.milestones);
        let p = parent_.to_string();
        type Applied = (PointAdjustment, PointsAccount, Vec<ReachedMilestone>);
        tokio::task::spawn_blocking(move || -> Result<Option<Applied>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| {
                let child_row = children::table
                    .filter(children::id.eq(child))
                    .filter(children::parent.eq(&p))
                    .select(Child::as_select())
                    .first(conn)
                    .optional()?;
                let Some(child_row) = child_row else {
                    return Ok(None);
                };

                let new_row = NewPointAdjustment {
                    parent: &p,
                    child_id: child,
                    points: points_,
                    reason: &reason_owned,
                    created_at: Utc::now().naive_utc(),
                };
                let adjustment = diesel::insert_into(point_adjustments::table)
                    .values(&new_row)
                    .returning(PointAdjustment::as_returning())
                    .get_result(conn)?;

                let mut account = child_row.points();
                let milestones = account
                    .apply_adjustment(&table, points_)
                    .map_err(|e| StorageError::InvalidInput(e.to_string()))?;
                save_account(conn, child_row.id, &account)?;
                Ok(Some((adjustment, account, milestones)))
            })
        })
        .await?
    }

    pub async fn list_adjustments(&self, child: i32) -> Result<Vec<PointAdjustment>, StorageError> {
        use schema::point_adjustments::dsl::*;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<PointAdjustment>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(point_adjustments
                .filter(child_id.eq(child))
                .order((created_at.desc(), id.desc()))
                .select(PointAdjustment::as_select())
                .load(&mut conn)?)
        })
        .await?
    }

    // Listings

    /// Chore records in `scope` with the given status, newest first: pending
    /// records by submission time, processed ones by decision time.
    pub async fn list_chore_logs(
        &self,
        scope: RecordScope,
        status_: RecordStatus,
        limit: Option<i64>,
    ) -> Result<Vec<ChoreLogView>, StorageError> {
        use schema::{children, chore_logs, chores};
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<ChoreLogView>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let mut query = chore_logs::table
                .inner_join(children::table)
                .inner_join(chores::table)
                .filter(chore_logs::status.eq(status_.as_str()))
                .select((ChoreLog::as_select(), children::display_name, chores::title))
                .into_boxed();
            query = match &scope {
                RecordScope::Parent(p) => query.filter(children::parent.eq(p.clone())),
                RecordScope::Child(c) => query.filter(chore_logs::child_id.eq(*c)),
            };
            query = if status_ == RecordStatus::Pending {
                query.order((chore_logs::submitted_at.desc(), chore_logs::id.desc()))
            } else {
                query.order((chore_logs::processed_at.desc(), chore_logs::id.desc()))
            };
            if let Some(n) = limit {
                query = query.limit(n);
            }
            let rows = query.load::<(ChoreLog, String, String)>(&mut conn)?;
            Ok(rows
                .into_iter()
                .map(|(log, child_name, chore_title)| ChoreLogView {
                    log,
                    child_name,
                    chore_title,
                })
                .collect())
        })
        .await?
    }

    /// Redemption records in `scope` with the given status, newest first: pending
    /// records by submission time, processed ones by decision time.
    pub async fn list_redemptions(
        &self,
        scope: RecordScope,
        status_: RecordStatus,
        limit: Option<i64>,
    ) -> Result<Vec<RedemptionView>, StorageError> {
        use schema::{children, redemptions, rewards};
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<RedemptionView>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let mut query = redemptions::table
                .inner_join(children::table)
                .inner_join(rewards::table)
                .filter(redemptions::status.eq(status_.as_str()))
                .select((
                    Redemption::as_select(),
                    children::display_name,
                    rewards::title,
                ))
                .into_boxed();
            query = match &scope {
                RecordScope::Parent(p) => query.filter(children::parent.eq(p.clone())),
                RecordScope::Child(c) => query.filter(redemptions::child_id.eq(*c)),
            };
            query = if status_ == RecordStatus::Pending {
                query.order((redemptions::submitted_at.desc(), redemptions::id.desc()))
            } else {
                query.order((redemptions::processed_at.desc(), redemptions::id.desc()))
            };
            if let Some(n) = limit {
                query = query.limit(n);
            }
            let rows = query.load::<(Redemption, String, String)>(&mut conn)?;
            Ok(rows
                .into_iter()
                .map(|(redemption, child_name, reward_title)| RedemptionView {
                    redemption,
                    child_name,
                    reward_title,
                })
                .collect())
        })
        .await?
    }

    /// Pending (chore, redemption) counts across a parent's children.
    pub async fn pending_counts(&self, parent_: &str) -> Result<(i64, i64), StorageError> {
        use schema::{children, chore_logs, redemptions};
        let pool = self.pool.clone();
        let p = parent_.to_string();
        tokio::task::spawn_blocking(move || -> Result<(i64, i64), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let pending = RecordStatus::Pending.as_str();
            let chores_n = chore_logs::table
                .inner_join(children::table)
                .filter(children::parent.eq(&p))
                .filter(chore_logs::status.eq(pending))
                .count()
                .get_result::<i64>(&mut conn)?;
            let redemptions_n = redemptions::table
                .inner_join(children::table)
                .filter(children::parent.eq(&p))
                .filter(redemptions::status.eq(pending))
                .count()
                .get_result::<i64>(&mut conn)?;
            Ok((chores_n, redemptions_n))
        })
        .await?
    }

    /// Whether any record of the child was approved after `since`.
    pub async fn approved_since(
        &self,
        child: i32,
        since: NaiveDateTime,
    ) -> Result<bool, StorageError> {
        use schema::{chore_logs, redemptions};
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let approved = RecordStatus::Approved.as_str();
            let chores_n = chore_logs::table
                .filter(chore_logs::child_id.eq(child))
                .filter(chore_logs::status.eq(approved))
                .filter(chore_logs::processed_at.gt(since))
                .count()
                .get_result::<i64>(&mut conn)?;
            if chores_n > 0 {
                return Ok(true);
            }
            let redemptions_n = redemptions::table
                .filter(redemptions::child_id.eq(child))
                .filter(redemptions::status.eq(approved))
                .filter(redemptions::processed_at.gt(since))
                .count()
                .get_result::<i64>(&mut conn)?;
            Ok(redemptions_n > 0)
        })
        .await?
    }

    // Session helpers for JWT inactivity windows
    pub async fn create_session(&self, jti_: &str, username_: &str) -> Result<(), StorageError> {
        use schema::sessions;
        let pool = self.pool.clone();
        let j = jti_.to_string();
        let u = username_.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new = NewSession {
                jti: &j,
                username: &u,
            };
            diesel::insert_into(sessions::table)
                .values(&new)
                .on_conflict_do_nothing()
                .execute(&mut conn)?;
            Ok(())
        })
        .await?
    }

    pub async fn delete_session(&self, jti_: &str) -> Result<bool, StorageError> {
        use schema::sessions::dsl::*;
        let pool = self.pool.clone();
        let j = jti_.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let deleted = diesel::delete(sessions.filter(jti.eq(&j))).execute(&mut conn)?;
            Ok(deleted > 0)
        })
        .await?
    }

    /// Refreshes `last_used_at` only when the session was used at or after
    /// `cutoff`. Returns `false` for unknown or idle-expired sessions.
    pub async fn touch_session_with_cutoff(
        &self,
        jti_: &str,
        cutoff: NaiveDateTime,
    ) -> Result<bool, StorageError> {
        use schema::sessions::dsl::*;
        let pool = self.pool.clone();
        let j = jti_.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            let updated =
                diesel::update(sessions.filter(jti.eq(&j)).filter(last_used_at.ge(cutoff)))
                    .set(last_used_at.eq(now))
                    .execute(&mut conn)?;
            Ok(updated > 0)
        })
        .await?
    }
}

/// Chore values and reward costs lie in `0..=MAX_ENTRY_POINTS`.
fn check_entry_points(value: i32, what: &str) -> Result<(), StorageError> {
    if (0..=MAX_ENTRY_POINTS).contains(&value) {
        return Ok(());
    }
    Err(StorageError::InvalidInput(format!(
        "{what} must be between 0 and {MAX_ENTRY_POINTS}"
    )))
}

/// (parent, display_name) of an active child.
fn active_child(
    conn: &mut SqliteConnection,
    child: i32,
) -> Result<Option<(String, String)>, diesel::result::Error> {
    use schema::children;
    children::table
        .filter(children::id.eq(child))
        .filter(children::active.eq(true))
        .select((children::parent, children::display_name))
        .first(conn)
        .optional()
}

fn save_account(
    conn: &mut SqliteConnection,
    child: i32,
    account: &PointsAccount,
) -> Result<(), diesel::result::Error> {
    use schema::children::dsl::*;
    diesel::update(children.find(child))
        .set((
            points_balance.eq(account.points_balance),
            map_position.eq(account.map_position),
            highest_milestone.eq(account.highest_milestone),
        ))
        .execute(conn)?;
    Ok(())
}

fn finish_chore_log(
    conn: &mut SqliteConnection,
    log_id: i32,
    outcome: RecordStatus,
) -> Result<(), diesel::result::Error> {
    use schema::chore_logs::dsl::*;
    diesel::update(
        chore_logs
            .filter(id.eq(log_id))
            .filter(status.eq(RecordStatus::Pending.as_str())),
    )
    .set((
        status.eq(outcome.as_str()),
        processed_at.eq(Some(Utc::now().naive_utc())),
    ))
    .execute(conn)?;
    Ok(())
}

fn finish_redemption(
    conn: &mut SqliteConnection,
    redemption_id: i32,
    outcome: RecordStatus,
) -> Result<(), diesel::result::Error> {
    use schema::redemptions::dsl::*;
    diesel::update(
        redemptions
            .filter(id.eq(redemption_id))
            .filter(status.eq(RecordStatus::Pending.as_str())),
    )
    .set((
        status.eq(outcome.as_str()),
        processed_at.eq(Some(Utc::now().naive_utc())),
    ))
    .execute(conn)?;
    Ok(())
}

fn upsert_chore(
    conn: &mut SqliteConnection,
    c: &domain::Chore,
) -> Result<usize, diesel::result::Error> {
    use schema::chores;
    let new_chore = NewChore {
        parent: &c.parent,
        title: &c.title,
        points: c.points,
        icon_emoji: c.icon_emoji.as_deref(),
    };
    diesel::insert_into(chores::table)
        .values(&new_chore)
        .on_conflict((chores::parent, chores::title))
        .do_update()
        .set((
            chores::points.eq(new_chore.points),
            chores::icon_emoji.eq(new_chore.icon_emoji),
            chores::active.eq(true),
        ))
        .execute(conn)
}

fn upsert_reward(
    conn: &mut SqliteConnection,
    r: &domain::Reward,
) -> Result<usize, diesel::result::Error> {
    use schema::rewards;
    let new_reward = NewReward {
        parent: &r.parent,
        title: &r.title,
        cost_points: r.cost_points,
        icon_emoji: r.icon_emoji.as_deref(),
    };
    diesel::insert_into(rewards::table)
        .values(&new_reward)
        .on_conflict((rewards::parent, rewards::title))
        .do_update()
        .set((
            rewards::cost_points.eq(new_reward.cost_points),
            rewards::icon_emoji.eq(new_reward.icon_emoji),
            rewards::active.eq(true),
        ))
        .execute(conn)
}

fn unique_conflict(err: diesel::result::Error, msg: String) -> StorageError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StorageError::Conflict(msg)
        }
        other => StorageError::Database(other),
    }
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // WAL lets readers proceed while an immediate transaction holds the
    // write lock; the busy timeout makes competing writers wait, not fail.
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    Ok(())
}
