//! # orderly
//!
//! Persistent ordered maps and sets whose order is defined by a
//! user-supplied comparator instead of the key type's `Ord` instance.
//!
//! ## Overview
//!
//! The standard ordered collections can only arrange keys by their built-in
//! ordering. This library pairs a persistent red-black tree with a stored
//! [`Comparator`](comparator::Comparator), so arbitrary types, including
//! structured records, can be indexed under any total order:
//!
//! - **Comparators**: closures, function pointers, [`NaturalOrder`](comparator::NaturalOrder)
//!   and [`Reversed`](comparator::Reversed)
//! - **Persistent Data Structures**: [`PersistentTreeMap`](persistent::PersistentTreeMap)
//!   and [`PersistentTreeSet`](persistent::PersistentTreeSet)
//!
//! Every operation returns a new container and shares unmodified structure
//! with its input; nothing is mutated in place.
//!
//! ## Feature Flags
//!
//! - `arc`: Use `Arc` instead of `Rc` for shared nodes, making containers
//!   `Send + Sync` when their contents and comparator are
//!
//! ## Example
//!
//! ```rust
//! use orderly::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Employee {
//!     name: String,
//!     age: u32,
//! }
//!
//! let by_age = |left: &Employee, right: &Employee| left.age.cmp(&right.age);
//! let staff = PersistentTreeSet::new_by(by_age)
//!     .insert(Employee { name: "Ada".into(), age: 36 })
//!     .insert(Employee { name: "Grace".into(), age: 29 });
//!
//! let names: Vec<&str> = staff.iter().map(|employee| employee.name.as_str()).collect();
//! assert_eq!(names, vec!["Grace", "Ada"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use orderly::prelude::*;
/// ```
pub mod prelude {
    pub use crate::comparator::*;
    pub use crate::persistent::*;
}

pub mod comparator;
pub mod persistent;
