pub mod game;
pub mod merge;
pub mod pick;
pub mod player;
pub mod snapshot;
pub mod words;
