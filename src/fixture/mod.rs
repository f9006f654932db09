pub mod mount;
pub mod page;
pub mod state;

pub use mount::{Fixture, wait_for_elem};
pub use page::{MemoryPage, Page};
pub use state::{Direction, FixtureError, FixtureOptions, FixtureResult, MediaType, PageState, Viewport};
