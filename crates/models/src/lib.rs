pub mod ids;
pub mod events;
pub mod predictions;
pub mod settlement;
pub mod error;

pub use ids::*;
pub use events::*;
pub use predictions::*;
pub use settlement::*;
pub use error::*;
