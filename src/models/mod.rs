//! Data shapes shared by the media-source engines and the HTTP layer.
//!
//! `object` maps to the SQLite `objects` table via `sqlx::FromRow`; the rest
//! serialize as the JSON the manager UI consumes.

pub mod entry;
pub mod menu;
pub mod object;
pub mod upload;
