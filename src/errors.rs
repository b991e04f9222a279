use snafu::Snafu;

use crate::modules::models::heat::{HeatAction, HeatState};

/// Errors surfaced by the heat lifecycle core.
///
/// Everything here is returned to the immediate caller. `Conflict` is the
/// only kind a caller is expected to retry, after re-reading state.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RaceError {
    /// The requested transition is not legal from the heat's current state,
    /// or its precondition failed. The heat is left unchanged.
    #[snafu(display(
        "cannot apply {:?} to heat {} in state {}",
        action,
        heat,
        state.label()
    ))]
    InvalidTransition {
        heat: i32,
        state: HeatState,
        action: HeatAction,
    },

    /// A concurrent write won the race for the same record.
    #[snafu(display("concurrent write conflict on {} {}", entity, id))]
    Conflict { entity: &'static str, id: i32 },

    #[snafu(display("{} {} not found", entity, id))]
    NotFound { entity: &'static str, id: i32 },

    /// A stored value fell outside its closed catalog. Unexpected and fatal
    /// for the record in question; never coerced to a default.
    #[snafu(display("data integrity error: {}", detail))]
    DataIntegrity { detail: String },
}
