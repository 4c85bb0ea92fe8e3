//! Shared type definitions for the Audience Showcase presentation.
//!
//! This crate is the single source of truth for every type that crosses a
//! boundary: the sequencer's snapshots, the stage catalog and the echo
//! channel's replies. Types flow downstream to `TypeScript` via `ts-rs`
//! for the browser front-end.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers
//! - [`enums`] -- Visual layers and completion signals
//! - [`structs`] -- Stages, playback state, particles, snapshots, events
//! - [`protocol`] -- Echo channel replies

pub mod enums;
pub mod ids;
pub mod protocol;
pub mod structs;

pub use enums::{LayerId, SignalId, UnknownSignal};
pub use ids::ConnectionId;
pub use protocol::{INVALID_JSON_MESSAGE, ServerMessage};
pub use structs::{
    Particle, PlaybackSnapshot, PlaybackState, SequencerEvent, Stage, StageAction,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Calling export_all writes the bindings to `bindings/` relative
        // to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::ConnectionId::export_all();

        let _ = crate::enums::LayerId::export_all();
        let _ = crate::enums::SignalId::export_all();

        let _ = crate::structs::StageAction::export_all();
        let _ = crate::structs::Stage::export_all();
        let _ = crate::structs::PlaybackState::export_all();
        let _ = crate::structs::Particle::export_all();
        let _ = crate::structs::PlaybackSnapshot::export_all();
        let _ = crate::structs::SequencerEvent::export_all();

        let _ = crate::protocol::ServerMessage::export_all();
    }
}
