pub mod constants;
pub mod pocket_table;
pub mod shared_card_game;
pub mod shared_event;
pub mod shared_wheel_game;
pub mod validation;

pub use pocket_table::{Pocket, PocketTable, PocketTableConfig};
pub use shared_card_game::*;
pub use shared_event::*;
pub use shared_wheel_game::*;
