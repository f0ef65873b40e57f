pub mod auxiliary;
pub mod cancel;
pub mod deleter;
pub mod enumerator;
pub mod evictor;
pub mod runner;
pub mod summary;

pub use auxiliary::{AuxiliaryCleaner, IndexPolicy};
pub use cancel::CancelToken;
pub use deleter::BatchDeleter;
pub use enumerator::{KeyBatch, KeyEnumerator};
pub use evictor::{EvictionPhase, NamespaceEvictor};
pub use runner::EvictionRunner;
pub use summary::{AuxiliaryReport, EvictionStatus, EvictionSummary, IndexOutcome};
