//! Stage sequencing and playback for the Audience Showcase.
//!
//! This crate owns everything that moves the presentation forward: the
//! timeline sequencer, the completion signals panels report through, the
//! panels themselves and the runner that ties them to wall-clock time.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `showcase-config.yaml` into
//!   strongly-typed structs.
//! - [`catalog`] -- The validated, ordered list of stages.
//! - [`signals`] -- Completion signal registry and the panel signal bus.
//! - [`particles`] -- Bounded per-layer particle sets and their layouts.
//! - [`panels`] -- The [`Panel`] trait and the five visual layers.
//! - [`sequencer`] -- The gated stage state machine.
//! - [`scheduler`] -- Single owner of the tick interval and restart delay.
//! - [`presentation`] -- The async runner and its control handle.
//!
//! [`Panel`]: panels::Panel

pub mod catalog;
pub mod config;
pub mod panels;
pub mod particles;
pub mod presentation;
pub mod scheduler;
pub mod sequencer;
pub mod signals;
