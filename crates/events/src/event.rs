use chrono::{DateTime, Utc};

/// A recorded business fact (a sale completed, stock received, a day of attendance marked).
///
/// Events are never edited after they are appended. Corrections are new events.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, `<context>.<aggregate>.<fact>` (e.g. `"sales.sale.completed"`).
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    /// Business time of the fact, as supplied by the command.
    fn occurred_at(&self) -> DateTime<Utc>;
}
