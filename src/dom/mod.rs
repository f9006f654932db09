pub mod host;
pub mod node;
pub mod settle;
pub mod tree;
pub mod types;

pub use host::{BrowserHost, PendingRequests, RequestQueue, TokioHost};
pub use node::MemoryElement;
pub use settle::{CustomAwaiter, SettleOptions, structural_snapshot, wait_until_settled};
pub use tree::{ComposedTree, composed_children};
pub use types::{Element, ElementRef, Loadable, Rect, SettleError, SettleResult, ShadowRoot, Updatable};
