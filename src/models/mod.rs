pub mod queue_item;
pub mod recipient;
pub mod sequence;
pub mod template;

pub use queue_item::{QueueItem, QueueStatus, RecipientRef};
pub use recipient::{ProfileKind, Recipient};
pub use sequence::SequenceStep;
pub use template::EmailTemplate;
