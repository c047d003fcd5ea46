use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionError, TransactionTrait,
};
use serde_json::Value as JsonValue;

use crate::entity::{comment, post, profile, user};
use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    User,
    Post,
    Comment,
    Profile,
}

impl Kind {
    pub fn table(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Post => "posts",
            Self::Comment => "comments",
            Self::Profile => "profiles",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Profile => "profile",
        };
        f.write_str(name)
    }
}

/// An entity the store can address generically by its integer id.
pub trait Table: EntityTrait {
    const KIND: Kind;

    fn id_column() -> Self::Column;

    fn id_of(model: &Self::Model) -> i32;
}

impl Table for user::Entity {
    const KIND: Kind = Kind::User;

    fn id_column() -> Self::Column {
        user::Column::Id
    }

    fn id_of(model: &user::Model) -> i32 {
        model.id
    }
}

impl Table for post::Entity {
    const KIND: Kind = Kind::Post;

    fn id_column() -> Self::Column {
        post::Column::Id
    }

    fn id_of(model: &post::Model) -> i32 {
        model.id
    }
}

impl Table for comment::Entity {
    const KIND: Kind = Kind::Comment;

    fn id_column() -> Self::Column {
        comment::Column::Id
    }

    fn id_of(model: &comment::Model) -> i32 {
        model.id
    }
}

impl Table for profile::Entity {
    const KIND: Kind = Kind::Profile;

    fn id_column() -> Self::Column {
        profile::Column::Id
    }

    fn id_of(model: &profile::Model) -> i32 {
        model.id
    }
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct NewPost {
    pub user_id: i32,
    pub title: String,
    pub content: String,
}

#[derive(Clone, Debug)]
pub struct NewComment {
    pub post_id: i32,
    pub user_id: i32,
    pub content: String,
}

#[derive(Clone, Debug, Default)]
pub struct NewProfile {
    pub user_id: i32,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// A user row with the number of posts they wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct UserPostCount {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub post_count: i64,
}

/// Handle over the relational tables.
///
/// Every call is one logical operation against the database and is counted,
/// so callers can observe how many round trips a fetch strategy needed.
/// Clones share the same counter; build a fresh handle per request.
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
    ops: Arc<AtomicUsize>,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            ops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn operation_count(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    fn record(&self, op: &str, kind: Kind) {
        let n = self.ops.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("store op #{}: {} {}", n, op, kind.table());
    }

    pub async fn fetch_all<E: Table>(&self) -> Result<Vec<E::Model>, AppError> {
        self.record("fetch_all", E::KIND);
        let rows = E::find()
            .order_by_asc(E::id_column())
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn fetch_by_id<E: Table>(&self, id: i32) -> Result<Option<E::Model>, AppError> {
        self.record("fetch_by_id", E::KIND);
        let row = E::find()
            .filter(E::id_column().eq(id))
            .one(&self.db)
            .await?;
        Ok(row)
    }

    /// All rows whose `column` is one of `ids`, in insertion order, as one query.
    pub async fn fetch_by_foreign_key<E: Table>(
        &self,
        column: E::Column,
        ids: &[i32],
    ) -> Result<Vec<E::Model>, AppError> {
        self.record("fetch_by_foreign_key", E::KIND);
        let rows = E::find()
            .filter(column.is_in(ids.iter().copied()))
            .order_by_asc(E::id_column())
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Child count per parent id for every parent row, zero included.
    pub async fn count_grouped(
        &self,
        parent: Kind,
        child: Kind,
        foreign_key: &str,
    ) -> Result<Vec<(i32, i64)>, AppError> {
        self.record("count_grouped", parent);
        let sql = format!(
            "SELECT p.id AS id, COUNT(c.id) AS cnt FROM {} p LEFT JOIN {} c ON c.{} = p.id GROUP BY p.id ORDER BY p.id",
            parent.table(),
            child.table(),
            foreign_key
        );
        let backend = self.db.get_database_backend();
        let rows = self.db.query_all(Statement::from_string(backend, sql)).await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i32 = row.try_get("", "id")?;
            let cnt: i64 = row.try_get("", "cnt")?;
            counts.push((id, cnt));
        }
        Ok(counts)
    }

    /// Every user with its post count in one grouped query, zero included.
    pub async fn user_post_counts(&self) -> Result<Vec<UserPostCount>, AppError> {
        self.record("count_grouped", Kind::User);
        let sql = "SELECT u.id AS id, u.name AS name, u.email AS email, COUNT(p.id) AS post_count \
                   FROM users u LEFT JOIN posts p ON p.user_id = u.id \
                   GROUP BY u.id, u.name, u.email ORDER BY u.id";
        let backend = self.db.get_database_backend();
        let rows = self
            .db
            .query_all(Statement::from_string(backend, sql.to_string()))
            .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            counts.push(UserPostCount {
                id: row.try_get("", "id")?,
                name: row.try_get("", "name")?,
                email: row.try_get("", "email")?,
                post_count: row.try_get("", "post_count")?,
            });
        }
        Ok(counts)
    }

    pub async fn project<E: Table>(&self, columns: &[E::Column]) -> Result<Vec<JsonValue>, AppError> {
        self.record("project", E::KIND);
        let rows = E::find()
            .select_only()
            .columns(columns.iter().copied())
            .order_by_asc(E::id_column())
            .into_json()
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn count_users(&self) -> Result<u64, AppError> {
        self.record("count", Kind::User);
        Ok(user::Entity::find().count(&self.db).await?)
    }

    pub async fn create_user(&self, input: NewUser) -> Result<user::Model, AppError> {
        self.record("create", Kind::User);
        Ok(new_user_model(input).insert(&self.db).await?)
    }

    /// Inserts all users or none of them.
    pub async fn create_users(&self, inputs: Vec<NewUser>) -> Result<Vec<user::Model>, AppError> {
        self.record("bulk_create", Kind::User);
        self.db
            .transaction::<_, Vec<user::Model>, AppError>(move |txn| {
                Box::pin(async move {
                    let mut created = Vec::with_capacity(inputs.len());
                    for input in inputs {
                        created.push(new_user_model(input).insert(txn).await?);
                    }
                    Ok(created)
                })
            })
            .await
            .map_err(map_tx_error)
    }

    pub async fn create_post(&self, input: NewPost) -> Result<post::Model, AppError> {
        self.record("create", Kind::Post);
        let now = Utc::now();
        let active = post::ActiveModel {
            title: Set(input.title),
            content: Set(input.content),
            user_id: Set(input.user_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active
            .insert(&self.db)
            .await
            .map_err(|e| AppError::from(e).with_foreign_key("posts.user_id -> users.id"))
    }

    pub async fn create_comment(&self, input: NewComment) -> Result<comment::Model, AppError> {
        self.record("create", Kind::Comment);
        let active = comment::ActiveModel {
            content: Set(input.content),
            post_id: Set(input.post_id),
            user_id: Set(input.user_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active.insert(&self.db).await.map_err(|e| {
            AppError::from(e).with_foreign_key("comments.post_id -> posts.id, comments.user_id -> users.id")
        })
    }

    pub async fn create_profile(&self, input: NewProfile) -> Result<profile::Model, AppError> {
        self.record("create", Kind::Profile);
        let active = profile::ActiveModel {
            bio: Set(input.bio),
            avatar_url: Set(input.avatar_url),
            birth_date: Set(input.birth_date),
            user_id: Set(input.user_id),
            ..Default::default()
        };
        active
            .insert(&self.db)
            .await
            .map_err(|e| AppError::from(e).with_foreign_key("profiles.user_id -> users.id"))
    }

    pub async fn update_user(&self, id: i32, changes: UserChanges) -> Result<user::Model, AppError> {
        self.record("update", Kind::User);
        let mut active = user::ActiveModel {
            id: Set(id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        user::Entity::update(active)
            .exec(&self.db)
            .await
            .map_err(|e| not_found_or(e, Kind::User, id))
    }

    pub async fn update_post(&self, id: i32, changes: PostChanges) -> Result<post::Model, AppError> {
        self.record("update", Kind::Post);
        let mut active = post::ActiveModel {
            id: Set(id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(content) = changes.content {
            active.content = Set(content);
        }
        post::Entity::update(active)
            .exec(&self.db)
            .await
            .map_err(|e| not_found_or(e, Kind::Post, id))
    }

    /// Deletes one row; dependent rows go with it through `ON DELETE CASCADE`.
    pub async fn delete<E: Table>(&self, id: i32) -> Result<(), AppError> {
        self.record("delete", E::KIND);
        let res = E::delete_many()
            .filter(E::id_column().eq(id))
            .exec(&self.db)
            .await?;
        if res.rows_affected == 0 {
            return Err(AppError::NotFound(format!("{} {}", E::KIND, id)));
        }
        Ok(())
    }
}

fn new_user_model(input: NewUser) -> user::ActiveModel {
    let now = Utc::now();
    user::ActiveModel {
        name: Set(input.name),
        email: Set(input.email),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

fn not_found_or(err: DbErr, kind: Kind, id: i32) -> AppError {
    match err {
        DbErr::RecordNotUpdated => AppError::NotFound(format!("{} {}", kind, id)),
        other => other.into(),
    }
}

fn map_tx_error(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(e) => e.into(),
        TransactionError::Transaction(app) => app,
    }
}
