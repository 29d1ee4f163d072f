mod health;
mod identity;
mod items;
mod messages;

pub use health::health_check;
pub use identity::me;
pub use items::get_item;
pub use messages::create_message;
