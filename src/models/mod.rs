pub mod claim;
pub mod document;
pub mod enums;
pub mod feedback;
pub mod fingerprint;
pub mod metric;
pub mod score;

pub use claim::*;
pub use document::*;
pub use enums::*;
pub use feedback::*;
pub use fingerprint::*;
pub use metric::*;
pub use score::*;
