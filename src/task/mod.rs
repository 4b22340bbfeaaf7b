pub mod countdown;
pub mod deadline;
pub mod entity;
pub mod record;
pub mod span;

pub use countdown::CountdownTask;
pub use deadline::DeadlineTask;
pub use entity::{Completable, Identifiable, TaskEntity};
pub use span::Span;
