/// Router Module Index
///
/// Splits the HTTP surface by who may call it. Access control is attached per
/// module in `create_router` with a role-gate `route_layer`, so a handler can
/// never be mounted without its gate.

/// Routes open to anonymous clients: health, identity, challenges and the
/// public submission API.
pub mod public;

/// Routes under `/admin`, gated on the `admin` role.
pub mod admin;

/// Routes under `/judge`, gated on the `judge` role.
pub mod judge;

/// Routes under `/participant`, gated on the `participant` role.
pub mod participant;
