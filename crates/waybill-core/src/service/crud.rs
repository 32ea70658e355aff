//! Generic create/read/update/delete over live tables.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::{Page, References};
use crate::entity::{row, Versioned};
use crate::error::{WaybillError, WaybillResult};
use crate::models::{
    CreatePayload, Delivery, DeliveryCreate, DeliveryUpdate, UpdatePayload, Zone, ZoneCreate,
    ZoneUpdate,
};
use crate::uow::{Database, UnitOfWork};
use crate::versioning::{HistoryRecord, HistoryStore, HistorySummary};

/// CRUD operations for one entity type.
///
/// Every mutation runs in its own unit of work, so versioned types get their
/// history captured without the service knowing about it. The entity's
/// [`References`] are checked in that same unit of work.
pub struct CrudService<E, C, U> {
    db: Arc<Database>,
    _marker: PhantomData<fn() -> (E, C, U)>,
}

impl<E, C, U> Clone for CrudService<E, C, U> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E, C, U> CrudService<E, C, U>
where
    E: References,
    C: CreatePayload<E>,
    U: UpdatePayload<E>,
{
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            _marker: PhantomData,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn get(&self, id: Uuid) -> WaybillResult<Option<E>> {
        self.db.read(|uow| uow.get(id))
    }

    pub fn list(&self, page: Page) -> WaybillResult<Vec<E>> {
        let Some(offset) = page.offset() else {
            return Ok(Vec::new());
        };
        self.db.read(|uow| uow.list(offset, page.limit()))
    }

    pub fn create(&self, payload: C) -> WaybillResult<E> {
        payload.validate()?;
        let entity = payload.into_entity();
        self.db.transaction(|uow| {
            entity.check_references(uow)?;
            uow.insert(&entity)
        })?;
        info!(entity = E::NAME, id = %entity.id(), "Created");
        Ok(entity)
    }

    /// Apply `payload` to a live entity; `NotFound` if it does not exist.
    pub fn update(&self, id: Uuid, payload: &U) -> WaybillResult<E> {
        payload.validate()?;
        self.db.transaction(|uow| update_in(uow, id, payload))
    }

    /// Delete a live entity, returning its last state.
    ///
    /// Fails while other live entities still point at it.
    pub fn remove(&self, id: Uuid) -> WaybillResult<Option<E>> {
        let removed = self.db.transaction(|uow| {
            E::check_unreferenced(uow, id)?;
            uow.delete::<E>(id)
        })?;
        if removed.is_some() {
            info!(entity = E::NAME, %id, "Removed");
        }
        Ok(removed)
    }
}

/// Apply an update payload inside an open unit of work.
///
/// Metadata is only touched when a business field actually changed.
pub(crate) fn update_in<E, U>(uow: &mut UnitOfWork<'_>, id: Uuid, payload: &U) -> WaybillResult<E>
where
    E: References,
    U: UpdatePayload<E>,
{
    let mut entity: E = uow
        .get(id)?
        .ok_or_else(|| WaybillError::not_found(E::NAME, id))?;
    let before = row::to_row(&entity)?;

    payload.apply(&mut entity);
    if row::to_row(&entity)? != before {
        entity.check_references(uow)?;
        entity.metadata_mut().touch(payload.actor());
        uow.update(&entity)?;
    }
    Ok(entity)
}

impl<E, C, U> CrudService<E, C, U>
where
    E: Versioned,
    C: CreatePayload<E>,
    U: UpdatePayload<E>,
{
    /// Every captured version, oldest first.
    pub fn history(&self, id: Uuid) -> WaybillResult<Vec<HistoryRecord>> {
        self.db.with_history::<E, _, _>(|h| h.history_of(id))
    }

    pub fn at_version(&self, id: Uuid, version: u32) -> WaybillResult<Option<HistoryRecord>> {
        self.db.with_history::<E, _, _>(|h| h.at_version(id, version))
    }

    pub fn latest(&self, id: Uuid) -> WaybillResult<Option<HistoryRecord>> {
        self.db.with_history::<E, _, _>(|h| h.latest(id))
    }

    /// State as of a point in time.
    pub fn at_time(&self, id: Uuid, timestamp: DateTime<Utc>) -> WaybillResult<Option<HistoryRecord>> {
        self.db.with_history::<E, _, _>(|h| h.at_time(id, timestamp))
    }

    pub fn summary(&self, id: Uuid) -> WaybillResult<Option<HistorySummary>> {
        self.db.with_history::<E, _, _>(|h| h.summary(id))
    }
}

pub type DeliveryService = CrudService<Delivery, DeliveryCreate, DeliveryUpdate>;
pub type ZoneService = CrudService<Zone, ZoneCreate, ZoneUpdate>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::{Order, OrderCreate, OrderUpdate};
    use crate::versioning::Operation;

    fn zones() -> ZoneService {
        ZoneService::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn deliveries(db: Arc<Database>) -> DeliveryService {
        DeliveryService::new(db)
    }

    /// A delivery payload whose order and zone exist in `db`.
    fn delivery_payload(db: &Arc<Database>) -> DeliveryCreate {
        let zone = ZoneService::new(db.clone())
            .create(zone_payload("north"))
            .unwrap();
        let order = CrudService::<Order, OrderCreate, OrderUpdate>::new(db.clone())
            .create(OrderCreate {
                customer_id: Uuid::new_v4(),
                courier_id: Uuid::new_v4(),
                delivery_date: Utc::now(),
                description: None,
                status: Default::default(),
                created_by: "dispatcher".into(),
            })
            .unwrap();
        DeliveryCreate {
            order_id: order.id,
            zone_id: zone.id,
            longitude: 37.62,
            latitude: 55.75,
            created_by: "dispatcher".into(),
        }
    }

    fn zone_payload(name: &str) -> ZoneCreate {
        ZoneCreate {
            name: name.into(),
            coordinates: vec![37.6, 55.7],
            created_by: "dispatcher".into(),
        }
    }

    #[test]
    fn test_create_get_list() {
        let service = zones();
        let north = service.create(zone_payload("north")).unwrap();
        service.create(zone_payload("south")).unwrap();

        assert_eq!(service.get(north.id).unwrap().unwrap(), north);
        assert!(service.get(Uuid::new_v4()).unwrap().is_none());

        let all = service.list(Page::default()).unwrap();
        assert_eq!(all.len(), 2);
        let second = service.list(Page::new(1, 1)).unwrap();
        assert_eq!(second[0].name, "south");
    }

    #[test]
    fn test_create_rejects_invalid_payload() {
        let service = zones();
        let err = service.create(zone_payload(" ")).unwrap_err();
        assert!(matches!(err, WaybillError::Validation { .. }));
        assert!(service.list(Page::default()).unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let service = zones();
        let update = ZoneUpdate {
            name: Some("east".into()),
            updated_by: "dispatcher".into(),
            ..Default::default()
        };
        assert!(service.update(Uuid::new_v4(), &update).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_touches_metadata() {
        let service = zones();
        let zone = service.create(zone_payload("north")).unwrap();
        let update = ZoneUpdate {
            name: Some("north-east".into()),
            updated_by: "planner".into(),
            ..Default::default()
        };

        let updated = service.update(zone.id, &update).unwrap();
        assert_eq!(updated.name, "north-east");
        assert_eq!(updated.metadata.created_by, "dispatcher");
        assert_eq!(updated.metadata.updated_by.as_deref(), Some("planner"));
        assert_eq!(service.get(zone.id).unwrap().unwrap(), updated);
    }

    #[test]
    fn test_versioned_service_exposes_history() {
        let db = Arc::new(Database::in_memory().unwrap());
        let service = deliveries(db.clone());
        let delivery = service.create(delivery_payload(&db)).unwrap();

        // A no-op update writes nothing.
        let same = DeliveryUpdate {
            longitude: Some(37.62),
            updated_by: "courier-7".into(),
            ..Default::default()
        };
        service.update(delivery.id, &same).unwrap();

        let moved = DeliveryUpdate {
            latitude: Some(55.76),
            updated_by: "courier-7".into(),
            ..Default::default()
        };
        service.update(delivery.id, &moved).unwrap();
        service.remove(delivery.id).unwrap();

        let history = service.history(delivery.id).unwrap();
        let ops: Vec<_> = history.iter().map(|r| (r.version, r.operation)).collect();
        assert_eq!(
            ops,
            vec![
                (1, Operation::Insert),
                (2, Operation::Update),
                (3, Operation::Delete)
            ]
        );
        assert_eq!(service.latest(delivery.id).unwrap().unwrap().version, 3);
        assert!(service.at_version(delivery.id, 4).unwrap().is_none());
        assert!(service.summary(delivery.id).unwrap().unwrap().is_deleted());
        assert!(service.remove(delivery.id).unwrap().is_none());
    }

    #[test]
    fn test_delivery_needs_live_order_and_zone() {
        let db = Arc::new(Database::in_memory().unwrap());
        let service = deliveries(db.clone());
        let valid = delivery_payload(&db);

        let mut no_order = valid.clone();
        no_order.order_id = Uuid::new_v4();
        let WaybillError::Validation { details, .. } = service.create(no_order).unwrap_err() else {
            panic!("a missing order must be a validation error");
        };
        assert!(details.contains_key("order_id"));

        let mut no_zone = valid.clone();
        no_zone.zone_id = Uuid::new_v4();
        let WaybillError::Validation { details, .. } = service.create(no_zone).unwrap_err() else {
            panic!("a missing zone must be a validation error");
        };
        assert!(details.contains_key("zone_id"));

        assert!(service.list(Page::default()).unwrap().is_empty());
        service.create(valid).unwrap();
    }

    #[test]
    fn test_one_delivery_per_order() {
        let db = Arc::new(Database::in_memory().unwrap());
        let service = deliveries(db.clone());
        let payload = delivery_payload(&db);
        service.create(payload.clone()).unwrap();

        let err = service.create(payload).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConflictIntegrity);
        assert_eq!(service.list(Page::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_delivery_cannot_move_to_unknown_zone() {
        let db = Arc::new(Database::in_memory().unwrap());
        let service = deliveries(db.clone());
        let delivery = service.create(delivery_payload(&db)).unwrap();

        let err = service
            .update(
                delivery.id,
                &DeliveryUpdate {
                    zone_id: Some(Uuid::new_v4()),
                    updated_by: "courier-7".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, WaybillError::Validation { .. }));
        assert_eq!(service.get(delivery.id).unwrap().unwrap().zone_id, delivery.zone_id);
        assert_eq!(service.history(delivery.id).unwrap().len(), 1);
    }

    #[test]
    fn test_zone_in_use_cannot_be_removed() {
        let db = Arc::new(Database::in_memory().unwrap());
        let delivery = deliveries(db.clone()).create(delivery_payload(&db)).unwrap();
        let zones = ZoneService::new(db.clone());

        let err = zones.remove(delivery.zone_id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConflictIntegrity);
        assert!(zones.get(delivery.zone_id).unwrap().is_some());

        deliveries(db).remove(delivery.id).unwrap();
        assert!(zones.remove(delivery.zone_id).unwrap().is_some());
    }

    #[test]
    fn test_order_with_delivery_cannot_be_removed_alone() {
        let db = Arc::new(Database::in_memory().unwrap());
        let delivery = deliveries(db.clone()).create(delivery_payload(&db)).unwrap();
        let orders = CrudService::<Order, OrderCreate, OrderUpdate>::new(db);

        let err = orders.remove(delivery.order_id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConflictIntegrity);
        assert!(orders.get(delivery.order_id).unwrap().is_some());
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let service = zones();
        service.create(zone_payload("north")).unwrap();
        assert!(service.list(Page::new(usize::MAX, 2)).unwrap().is_empty());
        assert!(service.list(Page::new(5, 10)).unwrap().is_empty());
    }
}
