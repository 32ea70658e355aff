//! Services over the unit of work: generic CRUD, order cascades and the
//! reference rules between orders, deliveries and zones.

mod crud;
mod order;
mod page;
mod references;

pub use crud::{CrudService, DeliveryService, ZoneService};
pub use order::{DeliveryPlacement, OrderDetails, OrderService, OrderWithDeliveryCreate};
pub use page::Page;
pub use references::References;
