//! Relation loading strategies.
//!
//! Every strategy reads through a [`Store`] and performs a fixed, countable
//! sequence of operations. Nothing is loaded lazily: a relation is present on
//! a [`Loaded`] parent only because a strategy fetched it.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use sea_orm::{IdenStatic, Iterable};
use serde_json::{Map, Value as JsonValue};

use crate::entity::{comment, post, profile};
use crate::error::AppError;
use crate::store::{Kind, Store, Table};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    UserPosts,
    UserComments,
    UserProfile,
    PostComments,
}

impl Relation {
    pub fn parse(parent: Kind, name: &str) -> Result<Self, AppError> {
        match (parent, name.trim()) {
            (Kind::User, "posts") => Ok(Self::UserPosts),
            (Kind::User, "comments") => Ok(Self::UserComments),
            (Kind::User, "profile") => Ok(Self::UserProfile),
            (Kind::Post, "comments") => Ok(Self::PostComments),
            (_, other) => Err(AppError::InvalidField(format!(
                "{} has no relation '{}'",
                parent, other
            ))),
        }
    }

    /// Comma separated names; blanks are skipped and repeats collapse.
    pub fn parse_list(parent: Kind, names: &str) -> Result<Vec<Self>, AppError> {
        let mut relations = Vec::new();
        for name in names.split(',').filter(|n| !n.trim().is_empty()) {
            let relation = Self::parse(parent, name)?;
            if !relations.contains(&relation) {
                relations.push(relation);
            }
        }
        Ok(relations)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::UserPosts => "posts",
            Self::UserComments | Self::PostComments => "comments",
            Self::UserProfile => "profile",
        }
    }

    pub fn parent(self) -> Kind {
        match self {
            Self::UserPosts | Self::UserComments | Self::UserProfile => Kind::User,
            Self::PostComments => Kind::Post,
        }
    }

    pub fn child(self) -> Kind {
        match self {
            Self::UserPosts => Kind::Post,
            Self::UserComments | Self::PostComments => Kind::Comment,
            Self::UserProfile => Kind::Profile,
        }
    }

    fn foreign_key(self) -> &'static str {
        match self {
            Self::PostComments => "post_id",
            _ => "user_id",
        }
    }

    fn empty(self) -> Related {
        match self {
            Self::UserPosts => Related::Posts(Vec::new()),
            Self::UserComments | Self::PostComments => Related::Comments(Vec::new()),
            Self::UserProfile => Related::Profile(None),
        }
    }

    /// One store lookup for all of `ids`, grouped by the owning parent id.
    async fn load(self, store: &Store, ids: &[i32]) -> Result<HashMap<i32, Related>, AppError> {
        let grouped = match self {
            Self::UserPosts => {
                let rows = store
                    .fetch_by_foreign_key::<post::Entity>(post::Column::UserId, ids)
                    .await?;
                group_by(rows, |p| p.user_id, Related::Posts)
            }
            Self::UserComments => {
                let rows = store
                    .fetch_by_foreign_key::<comment::Entity>(comment::Column::UserId, ids)
                    .await?;
                group_by(rows, |c| c.user_id, Related::Comments)
            }
            Self::PostComments => {
                let rows = store
                    .fetch_by_foreign_key::<comment::Entity>(comment::Column::PostId, ids)
                    .await?;
                group_by(rows, |c| c.post_id, Related::Comments)
            }
            Self::UserProfile => store
                .fetch_by_foreign_key::<profile::Entity>(profile::Column::UserId, ids)
                .await?
                .into_iter()
                .map(|p| (p.user_id, Related::Profile(Some(p))))
                .collect(),
        };
        Ok(grouped)
    }
}

fn group_by<M, K, W>(rows: Vec<M>, key: K, wrap: W) -> HashMap<i32, Related>
where
    K: Fn(&M) -> i32,
    W: Fn(Vec<M>) -> Related,
{
    let mut groups: HashMap<i32, Vec<M>> = HashMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups.into_iter().map(|(id, rows)| (id, wrap(rows))).collect()
}

/// Rows resolved for one parent and one relation.
#[derive(Clone, Debug, PartialEq)]
pub enum Related {
    Posts(Vec<post::Model>),
    Comments(Vec<comment::Model>),
    Profile(Option<profile::Model>),
}

#[cfg(test)]
impl Related {
    pub fn len(&self) -> usize {
        match self {
            Self::Posts(rows) => rows.len(),
            Self::Comments(rows) => rows.len(),
            Self::Profile(row) => usize::from(row.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Loaded<M> {
    pub parent: M,
    pub related: BTreeMap<Relation, Related>,
}

#[cfg(test)]
impl<M> Loaded<M> {
    pub fn get(&self, relation: Relation) -> Option<&Related> {
        self.related.get(&relation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// One lookup per parent per relation.
    Naive,
    /// One lookup per relation for all parents.
    Batch,
}

impl Strategy {
    pub fn from_optimized(optimized: bool) -> Self {
        if optimized {
            Self::Batch
        } else {
            Self::Naive
        }
    }
}

pub async fn fetch<P: Table>(
    store: &Store,
    strategy: Strategy,
    relations: &[Relation],
) -> Result<Vec<Loaded<P::Model>>, AppError> {
    match strategy {
        Strategy::Naive => fetch_naive::<P>(store, relations).await,
        Strategy::Batch => fetch_batch::<P>(store, relations).await,
    }
}

/// `1 + parents * relations` store operations.
pub async fn fetch_naive<P: Table>(
    store: &Store,
    relations: &[Relation],
) -> Result<Vec<Loaded<P::Model>>, AppError> {
    check_parent::<P>(relations)?;
    let parents = store.fetch_all::<P>().await?;

    let mut loaded = Vec::with_capacity(parents.len());
    for parent in parents {
        let id = P::id_of(&parent);
        let mut related = BTreeMap::new();
        for &relation in relations {
            let mut grouped = relation.load(store, &[id]).await?;
            let rows = grouped.remove(&id).unwrap_or_else(|| relation.empty());
            related.insert(relation, rows);
        }
        loaded.push(Loaded { parent, related });
    }
    debug!(
        "naive fetch of {} {} rows took {} store ops",
        loaded.len(),
        P::KIND,
        store.operation_count()
    );
    Ok(loaded)
}

/// `1 + relations` store operations, however many parents there are.
pub async fn fetch_batch<P: Table>(
    store: &Store,
    relations: &[Relation],
) -> Result<Vec<Loaded<P::Model>>, AppError> {
    check_parent::<P>(relations)?;
    let parents = store.fetch_all::<P>().await?;
    let ids: Vec<i32> = parents.iter().map(P::id_of).collect();

    let mut groups = Vec::with_capacity(relations.len());
    for &relation in relations {
        groups.push((relation, relation.load(store, &ids).await?));
    }

    let loaded: Vec<_> = parents
        .into_iter()
        .map(|parent| {
            let id = P::id_of(&parent);
            let related = groups
                .iter_mut()
                .map(|(relation, grouped)| {
                    let rows = grouped.remove(&id).unwrap_or_else(|| relation.empty());
                    (*relation, rows)
                })
                .collect();
            Loaded { parent, related }
        })
        .collect();
    debug!(
        "batch fetch of {} {} rows took {} store ops",
        loaded.len(),
        P::KIND,
        store.operation_count()
    );
    Ok(loaded)
}

/// A single parent with its relations, or `None` when the id is unknown.
pub async fn fetch_one<P: Table>(
    store: &Store,
    id: i32,
    relations: &[Relation],
) -> Result<Option<Loaded<P::Model>>, AppError> {
    check_parent::<P>(relations)?;
    let Some(parent) = store.fetch_by_id::<P>(id).await? else {
        return Ok(None);
    };

    let mut related = BTreeMap::new();
    for &relation in relations {
        let mut grouped = relation.load(store, &[id]).await?;
        related.insert(relation, grouped.remove(&id).unwrap_or_else(|| relation.empty()));
    }
    Ok(Some(Loaded { parent, related }))
}

/// Parent id to number of related rows, one grouped query, zeros included.
pub async fn count_related(store: &Store, relation: Relation) -> Result<BTreeMap<i32, i64>, AppError> {
    let counts = store
        .count_grouped(relation.parent(), relation.child(), relation.foreign_key())
        .await?;
    Ok(counts.into_iter().collect())
}

/// Only the named columns of every `E` row, no hydration and no relations.
pub async fn project<E: Table>(
    store: &Store,
    fields: &[&str],
) -> Result<Vec<Map<String, JsonValue>>, AppError> {
    if fields.is_empty() {
        return Err(AppError::InvalidField("no fields requested".to_string()));
    }

    let mut columns: Vec<E::Column> = Vec::with_capacity(fields.len());
    for field in fields {
        let field = field.trim();
        let column = E::Column::iter()
            .find(|c| c.as_str() == field || camel_case(c.as_str()) == field)
            .ok_or_else(|| AppError::InvalidField(format!("{} has no field '{}'", E::KIND, field)))?;
        if !columns.iter().any(|c| c.as_str() == column.as_str()) {
            columns.push(column);
        }
    }

    let rows = store.project::<E>(&columns).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match row {
            JsonValue::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

/// `created_at` -> `createdAt`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn check_parent<P: Table>(relations: &[Relation]) -> Result<(), AppError> {
    match relations.iter().find(|r| r.parent() != P::KIND) {
        Some(r) => Err(AppError::InvalidField(format!(
            "{} has no relation '{}'",
            P::KIND,
            r.name()
        ))),
        None => Ok(()),
    }
}
