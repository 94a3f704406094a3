//! Domain services for the chama engine.
//!
//! Pure rules and collaborator seams; all I/O lives in the outer crates.

pub mod authorization;
pub mod collaborators;
pub mod notification;

pub use collaborators::{
    CalendarEvent, CalendarService, CollaboratorResult, MockCalendarService, RandomRoomIds,
    RoomIdGenerator,
};
