pub mod config;

pub mod events;

pub mod period;

pub mod roster;

pub mod side;

pub mod stats;

pub mod store;
