// Core data models for immocrm
// These structs represent the rows owned by the backend

pub mod activity;
pub mod contact;
pub mod deal;
pub mod organization;
pub mod stage;
pub mod template;
pub mod tenant;
pub mod validate;

pub use activity::*;
pub use contact::*;
pub use deal::*;
pub use organization::*;
pub use stage::*;
pub use template::*;
pub use tenant::*;
