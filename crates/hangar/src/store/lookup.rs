//! Run-scoped lookup maps.
//!
//! Each index is loaded with a single query at the start of a category and then consulted
//! in memory for every record, so foreign-key resolution never issues a query per row.

use std::collections::HashMap;

use sea_orm::{ConnectionTrait, EntityTrait, QuerySelect};
use uuid::Uuid;

use crate::entity::prelude::*;
use crate::resolve::{AliasTable, Candidate, Resolver, normalize};
use crate::source::{GameVersionRef, ManufacturerRef};

use super::errors::Result;

/// Manufacturer ids by external uuid and by normalized slug.
#[derive(Debug, Clone, Default)]
pub struct ManufacturerIndex {
    by_uuid: HashMap<String, Uuid>,
    by_slug: HashMap<String, Uuid>,
    uuids: HashMap<Uuid, String>,
}

impl ManufacturerIndex {
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self> {
        let rows = Manufacturer::find()
            .select_only()
            .column(ManufacturerColumn::Id)
            .column(ManufacturerColumn::Uuid)
            .column(ManufacturerColumn::Slug)
            .into_tuple::<(Uuid, Option<String>, String)>()
            .all(conn)
            .await?;

        let mut index = Self::default();
        for (id, uuid, slug) in rows {
            index.insert(id, uuid.as_deref(), &slug);
        }
        Ok(index)
    }

    pub fn insert(&mut self, id: Uuid, uuid: Option<&str>, slug: &str) {
        if let Some(uuid) = uuid {
            self.by_uuid.insert(uuid.to_string(), id);
            self.uuids.insert(id, uuid.to_string());
        }
        self.by_slug.insert(slug.to_string(), id);
    }

    pub fn by_uuid(&self, uuid: &str) -> Option<Uuid> {
        self.by_uuid.get(uuid).copied()
    }

    pub fn by_slug(&self, slug: &str) -> Option<Uuid> {
        self.by_slug.get(slug).copied()
    }

    /// External uuid last recorded for a row.
    pub fn uuid_of(&self, id: Uuid) -> Option<&str> {
        self.uuids.get(&id).map(String::as_str)
    }

    /// Resolve a reference: external uuid first, then slug, then the normalized name.
    pub fn resolve(&self, reference: &ManufacturerRef) -> Option<Uuid> {
        reference
            .uuid
            .as_deref()
            .and_then(|u| self.by_uuid(u))
            .or_else(|| {
                reference
                    .slug
                    .as_deref()
                    .and_then(|s| self.by_slug(&normalize(s)))
            })
            .or_else(|| {
                reference
                    .name
                    .as_deref()
                    .and_then(|n| self.by_slug(&normalize(n)))
            })
    }
}

/// Game version ids by external uuid and by code.
#[derive(Debug, Clone, Default)]
pub struct GameVersionIndex {
    by_uuid: HashMap<String, Uuid>,
    by_code: HashMap<String, Uuid>,
}

impl GameVersionIndex {
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self> {
        let rows = GameVersion::find()
            .select_only()
            .column(GameVersionColumn::Id)
            .column(GameVersionColumn::Uuid)
            .column(GameVersionColumn::Code)
            .into_tuple::<(Uuid, Option<String>, String)>()
            .all(conn)
            .await?;

        let mut index = Self::default();
        for (id, uuid, code) in rows {
            index.insert(id, uuid.as_deref(), &code);
        }
        Ok(index)
    }

    pub fn insert(&mut self, id: Uuid, uuid: Option<&str>, code: &str) {
        if let Some(uuid) = uuid {
            self.by_uuid.insert(uuid.to_string(), id);
        }
        self.by_code.insert(code.to_string(), id);
    }

    pub fn by_uuid(&self, uuid: &str) -> Option<Uuid> {
        self.by_uuid.get(uuid).copied()
    }

    pub fn by_code(&self, code: &str) -> Option<Uuid> {
        self.by_code.get(code).copied()
    }

    pub fn resolve(&self, reference: &GameVersionRef) -> Option<Uuid> {
        reference
            .uuid()
            .and_then(|u| self.by_uuid(u))
            .or_else(|| reference.code().and_then(|c| self.by_code(c)))
    }
}

/// Vehicles by slug, plus the candidate set for the resolver.
#[derive(Debug, Clone, Default)]
pub struct VehicleIndex {
    by_slug: HashMap<String, Uuid>,
    by_id: HashMap<Uuid, usize>,
    candidates: Vec<Candidate>,
}

impl VehicleIndex {
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self> {
        let rows = Vehicle::find()
            .select_only()
            .column(VehicleColumn::Id)
            .column(VehicleColumn::Slug)
            .column(VehicleColumn::Name)
            .into_tuple::<(Uuid, String, String)>()
            .all(conn)
            .await?;

        let by_slug = rows.iter().map(|(id, slug, _)| (slug.clone(), *id)).collect();
        let by_id = rows.iter().enumerate().map(|(i, (id, _, _))| (*id, i)).collect();
        let candidates = rows
            .into_iter()
            .map(|(id, slug, name)| Candidate { id, slug, name })
            .collect();
        Ok(Self {
            by_slug,
            by_id,
            candidates,
        })
    }

    pub fn by_slug(&self, slug: &str) -> Option<Uuid> {
        self.by_slug.get(slug).copied()
    }

    /// The loaded vehicle with this id.
    pub fn get(&self, id: Uuid) -> Option<&Candidate> {
        self.by_id.get(&id).map(|&i| &self.candidates[i])
    }

    /// Build a resolver over the loaded vehicles.
    pub fn resolver(&self, aliases: AliasTable) -> Resolver {
        Resolver::new(self.candidates.clone(), aliases)
    }
}

/// Paint ids by class name.
#[derive(Debug, Clone, Default)]
pub struct PaintIndex {
    by_class_name: HashMap<String, Uuid>,
}

impl PaintIndex {
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self> {
        let rows = Paint::find()
            .select_only()
            .column(PaintColumn::Id)
            .column(PaintColumn::ClassName)
            .into_tuple::<(Uuid, String)>()
            .all(conn)
            .await?;
        Ok(Self {
            by_class_name: rows.into_iter().map(|(id, class)| (class, id)).collect(),
        })
    }

    pub fn get(&self, class_name: &str) -> Option<Uuid> {
        self.by_class_name.get(class_name).copied()
    }
}
