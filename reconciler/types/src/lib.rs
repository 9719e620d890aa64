// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types describing the desired and observed state of vSphere entities.
//!
//! Desired specs are authored by the caller and treat every `None` field as
//! "not managed". Observed states are whatever the management endpoint
//! reports. Neither carries behavior beyond structural equality; deciding
//! whether the two agree is the job of `vsphere-reconciler`.

pub mod advanced;
pub mod change;
pub mod cluster;
pub mod datetime;
pub mod dns;
pub mod identity;
pub mod perf;
pub mod service;
pub mod storage;
pub mod syslog;
pub mod vswitch;

pub use change::ChangeOp;
pub use change::ChangeRequest;
pub use change::NotCreatable;
pub use identity::ClusterPath;
pub use identity::Ensure;
pub use identity::EntityId;
pub use identity::HostRef;
pub use identity::HostSwitchPath;
pub use identity::ManagedObjectRef;
pub use identity::PerfIntervalId;
