// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change requests submitted to the management endpoint.

use serde::Serialize;
use std::fmt;

/// What must be mutated to converge an entity.
///
/// `C` is the construction payload and `U` the update payload of a given
/// resource kind. Kinds that cannot be created use an uninhabited `C`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum ChangeRequest<C, U> {
    Create(C),
    Update(U),
    Delete,
}

impl<C, U> ChangeRequest<C, U> {
    pub fn op(&self) -> ChangeOp {
        match self {
            ChangeRequest::Create(_) => ChangeOp::Create,
            ChangeRequest::Update(_) => ChangeOp::Update,
            ChangeRequest::Delete => ChangeOp::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeOp::Create => "create",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        })
    }
}

/// Uninhabited construction payload for entities that cannot be created
/// through reconciliation (host singletons, existing switches' policies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotCreatable {}
