pub mod dispatch;
pub mod ptu;

pub use dispatch::DispatchRow;
pub use ptu::PtuRow;

use time::{Duration, OffsetDateTime};

/// A flattened row as seen by the aggregation engine.
///
/// `start` drives every temporal grouping; `volume` is the magnitude summed
/// and summarised. A row without a volume still counts towards its group.
pub trait Observation {
    fn start(&self) -> OffsetDateTime;
    fn end(&self) -> OffsetDateTime;
    fn volume(&self) -> Option<f64>;

    /// Money spent on the row, for tables that carry one.
    fn cost(&self) -> Option<f64> {
        None
    }

    fn duration(&self) -> Duration {
        self.end() - self.start()
    }
}

impl<T: Observation + ?Sized> Observation for &T {
    fn start(&self) -> OffsetDateTime {
        (**self).start()
    }

    fn end(&self) -> OffsetDateTime {
        (**self).end()
    }

    fn volume(&self) -> Option<f64> {
        (**self).volume()
    }

    fn cost(&self) -> Option<f64> {
        (**self).cost()
    }
}
