//! Dynamic query building
//!
//! Provides the pieces repositories compose into parameterized statements:
//! - [FieldValue] / [TypeTag]: closed set of bindable scalars
//! - [FieldMap]: the fields a caller explicitly set
//! - [build_shape], [build_filter], [build_order]: SQL fragments
//! - [PageWindow] / [Paginated]: the offset/limit contract for list queries
//!
//! ```rust,ignore
//! let mut filter = FieldMap::new();
//! filter.insert("owner__id", user.id);
//!
//! let page = db
//!     .items()
//!     .get_multi(&filter, Some("-title"), PageWindow::new(0, 20))
//!     .await?;
//! ```

mod builder;
mod pagination;
mod value;

pub use builder::*;
pub use pagination::*;
pub use value::*;
