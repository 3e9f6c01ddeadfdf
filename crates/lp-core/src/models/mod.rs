//! Domain entities of the lab request portal.

pub mod capability;
pub mod equipment;
pub mod io;
pub mod location;
pub mod request;
pub mod sample;
pub mod test_method;
pub mod user;

pub use capability::{is_valid_short_name, Capability, CapabilityFilter, CapabilityUpdate};
pub use equipment::{Equipment, EquipmentFilter, EquipmentStatus, EquipmentUpdate};
pub use io::{Io, IoFilter, IoUpdate};
pub use location::{Location, LocationFilter, LocationUpdate};
pub use request::{
    Priority, Request, RequestFilter, RequestStatus, RequestType, RequestWithSamples,
};
pub use sample::{SampleFilter, SampleStatus, TestingSample};
pub use test_method::{TestMethod, TestMethodFilter, TestMethodUpdate};
pub use user::{Role, User, UserFilter, UserUpdate};
