pub mod initialize;
pub mod reconcile;
pub mod verify;
pub mod webhook;
