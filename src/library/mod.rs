pub mod assign;
pub mod identifier;
pub mod inventory;
pub mod links;
pub mod pipeline;
