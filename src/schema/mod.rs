pub mod component;
pub mod entity;
pub mod quest;
pub mod target;
pub mod task;
pub mod world;
pub mod world_state;
