//! Services module
//!
//! Application logic that coordinates between the screens and the backend.

pub mod dashboard;
pub mod family;
pub mod memories;
pub mod session;
pub mod session_cache;

pub use dashboard::{DashboardData, DashboardService};
pub use family::{FamilyService, MemberDetails};
pub use memories::{MemoriesService, MemoryDraft, MemoryForm};
pub use session::{Session, SessionEvent, SessionState, SessionStore};
pub use session_cache::SessionCache;
