use crate::{
    access::{Permission, PermissionController},
    db::{Store, lookup_key},
    entity::Entity,
    error::Error,
    filter::Criteria,
    model::EntityModel,
    types::uuid::UuidOptions,
};

///
/// GuardedStore
///
/// Store wrapper that asks the calling thread's [`PermissionController`]
/// before delegating. Record-level operations name the primary key as the
/// resource; collection reads and keyless inserts name the entity.
///

#[derive(Clone, Debug)]
pub struct GuardedStore<S> {
    inner: S,
}

impl<S: Store> GuardedStore<S> {
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn require(&self, permission: Permission, resource: Option<&str>) -> Result<(), Error> {
        let resource = resource.unwrap_or(self.inner.model().entity_name);

        PermissionController::must_have_permission(permission, resource)
    }
}

impl<S: Store> Store for GuardedStore<S> {
    fn model(&self) -> &'static EntityModel {
        self.inner.model()
    }

    fn uuid_options(&self) -> UuidOptions {
        self.inner.uuid_options()
    }

    fn get(&self, pk: &str) -> Result<Option<Entity>, Error> {
        self.require(Permission::CanRead, Some(&lookup_key(pk)))?;

        self.inner.get(pk)
    }

    fn scan(&self) -> Result<Vec<Entity>, Error> {
        self.require(Permission::CanRead, None)?;

        self.inner.scan()
    }

    fn filter(&self, criteria: &Criteria) -> Result<Vec<Entity>, Error> {
        self.require(Permission::CanRead, None)?;

        self.inner.filter(criteria)
    }

    fn insert(&self, entity: Entity) -> Result<Entity, Error> {
        self.require(Permission::CanCreate, entity.pk())?;

        self.inner.insert(entity)
    }

    fn update(&self, entity: Entity) -> Result<Entity, Error> {
        self.require(Permission::CanUpdate, entity.pk())?;

        self.inner.update(entity)
    }

    fn patch(&self, entity: Entity) -> Result<Entity, Error> {
        self.require(Permission::CanUpdate, entity.pk())?;

        self.inner.patch(entity)
    }

    fn delete(&self, pk: &str) -> Result<(), Error> {
        self.require(Permission::CanDelete, Some(&lookup_key(pk)))?;

        self.inner.delete(pk)
    }
}
