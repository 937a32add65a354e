//! Tessera Kernel
//! ==============
//!
//! Typed, string-convertible algorithm properties and the rules that accept
//! or reject their values. Algorithms declare their parameters as
//! [`Property`] values inside a [`PropertyManager`]; every property can be
//! set from its canonical string form, which is what the command line,
//! histories and JSON property maps exchange.
//!
//! The kernel also defines the opaque [`Workspace`] trait so that workspace
//! properties can hold shared data handles without knowing their payload.

mod error;
mod manager;
mod property;
mod validator;
mod workspace;

pub use error::PropertyError;
pub use manager::{FromPropertyValue, PropertyManager};
pub use property::{Direction, Property, PropertyKind, PropertyValue};
pub use validator::{
    ArrayLengthValidator, BoundedValidator, CompositeValidator, ListValidator,
    MandatoryValidator, Relation, Validator,
};
pub use workspace::{downcast_workspace, Workspace, WorkspaceHandle};

/// Common imports for algorithm authors declaring properties.
pub mod prelude {
    pub use crate::{
        ArrayLengthValidator, BoundedValidator, CompositeValidator, Direction, ListValidator,
        MandatoryValidator, Property, PropertyKind, PropertyManager, PropertyValue, Validator,
        Workspace, WorkspaceHandle,
    };
}
