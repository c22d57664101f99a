use uuid::Uuid;

use crate::database::entity::{Entity, Population};
use crate::database::store::Session;
use crate::filter::{Paging, Projection, Sort};

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOption {
    /// The entity's `default_join()`.
    Default,
    With(Vec<Population>),
}

impl JoinOption {
    pub fn resolve<T: Entity>(join: Option<&JoinOption>) -> Vec<Population> {
        match join {
            None => Vec::new(),
            Some(JoinOption::Default) => T::default_join(),
            Some(JoinOption::With(populations)) => populations.clone(),
        }
    }
}

/// `with_deleted` switches reads from live documents to soft-deleted ones.
#[derive(Debug, Clone, Default)]
pub struct FindAllOptions {
    pub with_deleted: bool,
    pub select: Option<Projection>,
    pub paging: Option<Paging>,
    pub sort: Sort,
    pub join: Option<JoinOption>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Default)]
pub struct FindOneOptions {
    pub with_deleted: bool,
    pub select: Option<Projection>,
    pub sort: Sort,
    pub join: Option<JoinOption>,
    pub session: Option<Session>,
}

impl FindOneOptions {
    pub fn join() -> Self {
        Self { join: Some(JoinOption::Default), ..Default::default() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseOptions {
    pub with_deleted: bool,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Default)]
pub struct ExistsOptions {
    pub with_deleted: bool,
    pub exclude_id: Vec<Uuid>,
    pub session: Option<Session>,
}

impl ExistsOptions {
    pub fn excluding(ids: Vec<Uuid>) -> Self {
        Self { exclude_id: ids, ..Default::default() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub id: Option<Uuid>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateManyOptions {
    pub session: Option<Session>,
}

/// Options for single-document mutations; `join` shapes the returned document.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub join: Option<JoinOption>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Default)]
pub struct ManyOptions {
    pub session: Option<Session>,
}
